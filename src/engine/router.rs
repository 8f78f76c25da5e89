//! Engine message router.
//!
//! Every inbound message is decoded once and handled by exactly one arm.
//! Malformed or unknown input is logged and contained here; nothing the
//! engine sends can fail the caller.

use std::sync::mpsc::Sender;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::message::{normalize_newlines, EngineMessage};
use super::TerminalSink;
use crate::agent::AgentRelay;
use crate::settings::{self, SettingRead, SettingsStore};

/// Log target for text the engine asks to log.
pub const ENGINE_LOG_TARGET: &str = "moshterm::engine";

/// Collaborators a dispatch may touch.
pub struct RouterIo<'a> {
    pub terminal: &'a mut dyn TerminalSink,
    pub relay: &'a mut AgentRelay,
}

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Handled,
    /// Engine reported a clean exit.
    Exit,
    /// Unknown, malformed or rejected; logged and otherwise ignored.
    Ignored,
}

pub struct EngineRouter {
    settings: SettingsStore,
    completions: Sender<SettingRead>,
}

impl EngineRouter {
    /// `completions` receives settings reads; the session replies to the
    /// engine when it drains them.
    pub fn new(settings: SettingsStore, completions: Sender<SettingRead>) -> Self {
        Self {
            settings,
            completions,
        }
    }

    pub fn dispatch(&mut self, raw: &Value, io: RouterIo<'_>) -> Routed {
        let message = match EngineMessage::decode(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!("{}", e);
                return Routed::Ignored;
            }
        };
        self.handle(message, io)
    }

    pub fn handle(&mut self, message: EngineMessage, io: RouterIo<'_>) -> Routed {
        match message {
            EngineMessage::Display(text) => {
                io.terminal.print(&text);
                Routed::Handled
            }
            EngineMessage::Log(text) => {
                info!(target: ENGINE_LOG_TARGET, "{}", text);
                Routed::Handled
            }
            EngineMessage::Error(text) => {
                let output = normalize_newlines(&text);
                io.terminal.print(&format!("{}\r\n", output));
                error!(target: ENGINE_LOG_TARGET, "{}", output);
                Routed::Handled
            }
            EngineMessage::GetSetting { scope, name } => {
                match self.settings.read_into(scope, &name, &self.completions) {
                    Ok(()) => Routed::Handled,
                    Err(e) => {
                        error!("Reading '{}' for engine failed: {}", name, e);
                        Routed::Ignored
                    }
                }
            }
            EngineMessage::SetSetting { scope, name, data } => {
                let result = settings::normalize(&name, &data)
                    .and_then(|value| self.settings.set(scope, &name, value));
                match result {
                    Ok(()) => {
                        debug!("Engine stored '{}' ({:?})", name, scope);
                        Routed::Handled
                    }
                    Err(e) => {
                        error!("Storing '{}' for engine failed: {}", name, e);
                        Routed::Ignored
                    }
                }
            }
            EngineMessage::SshAgent(data) => match io.relay.relay(data) {
                Ok(()) => Routed::Handled,
                Err(e) => {
                    error!("Dropping agent traffic from engine: {}", e);
                    Routed::Ignored
                }
            },
            EngineMessage::Exit => Routed::Exit,
            EngineMessage::Unknown { kind, data } => {
                info!("Unknown message type: {} ({})", kind, data);
                Routed::Ignored
            }
        }
    }
}
