//! Window runtime for the terminal host.
//!
//! The host terminal is the only window: a session window is a
//! [`SessionWindow`] wired to a [`ProcessEngine`] and stdout, and it is
//! started as soon as it is created.

use std::sync::mpsc::Sender;

use tracing::info;

use super::agent::ProcessAgentConnector;
use super::process::ProcessEngine;
use super::terminal::StdoutSink;
use crate::agent::{AgentConnector, AgentEvent, NoAgent};
use crate::app::WindowRuntime;
use crate::config::Config;
use crate::engine::EngineEvent;
use crate::error::WindowError;
use crate::session::{ConnectionArgs, SessionOptions, SessionWindow};
use crate::settings::SettingsStore;

pub struct TerminalRuntime {
    config: Config,
    settings: SettingsStore,
    engine_events: Sender<EngineEvent>,
    connector: Box<dyn AgentConnector>,
    restart: Option<String>,
}

impl TerminalRuntime {
    pub fn new(
        config: Config,
        settings: SettingsStore,
        engine_events: Sender<EngineEvent>,
        agent_events: Sender<AgentEvent>,
    ) -> Self {
        let connector: Box<dyn AgentConnector> = match &config.agent.command {
            Some(command) => Box::new(ProcessAgentConnector::new(command.clone(), agent_events)),
            None => Box::new(NoAgent),
        };
        Self {
            config,
            settings,
            engine_events,
            connector,
            restart: None,
        }
    }

    /// Version a restart was requested for, if any.
    pub fn restart_requested(&self) -> Option<&str> {
        self.restart.as_deref()
    }
}

impl WindowRuntime for TerminalRuntime {
    type Handle = SessionWindow;

    fn create_session_window(&mut self, id: &str, args: ConnectionArgs) -> Result<SessionWindow, WindowError> {
        let engine = ProcessEngine::new(
            self.config.engine.command.clone(),
            self.config.engine.args.clone(),
            self.engine_events.clone(),
        );
        let options = SessionOptions {
            variant: self.config.engine_variant,
            agent_endpoint: self.config.agent.app_id.clone(),
        };
        let mut window = SessionWindow::new(
            id,
            args,
            options,
            self.settings.clone(),
            Box::new(engine),
            Box::new(StdoutSink::new()),
        );
        window.start(self.connector.as_mut());
        Ok(window)
    }

    fn close_setup_window(&mut self) {
        info!("Setup complete");
    }

    fn notify_setup_windows(&mut self, banner: &str) {
        // No setup window is open while a session runs.
        info!("{}", banner);
    }

    fn restart(&mut self, version: &str) {
        info!("Restart requested for v{}", version);
        self.restart = Some(version.to_string());
    }
}
