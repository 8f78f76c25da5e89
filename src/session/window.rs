//! Session window controller.
//!
//! One `SessionWindow` per open session. It owns the engine host, the
//! terminal sink, the agent relay and the lifecycle, and is driven entirely
//! by events: agent events, engine events, keyboard and resize input, and
//! settings-read completions drained by [`SessionWindow::poll`].

use std::sync::mpsc::{self, Receiver};

use tracing::{debug, error, info, warn};

use super::args::{flag_attribute, ConnectionArgs, LaunchFlags, CREDENTIAL_ATTRIBUTES};
use super::lifecycle::{KeyDisposition, Lifecycle, LifecycleEvent, LifecycleState, TransitionAction};
use crate::agent::{AgentConnector, AgentEvent, AgentRelay, RelayOutcome};
use crate::engine::message::{encode_window_change, Outbound};
use crate::engine::progress::render_progress;
use crate::engine::{EngineEvent, EngineHost, EngineRouter, EngineVariant, Routed, RouterIo, TerminalSink};
use crate::settings::{SettingRead, SettingsStore};

pub const LOADING_BANNER: &str = "Loading NaCl module (takes a while the first time after an update).\r\n";
pub const LOADED_BANNER: &str = "\r\nLoaded.\r\n";
pub const EXIT_MESSAGE: &str = "Mosh has exited.";
pub const CRASH_MESSAGE: &str = "Mosh NaCl crashed.";
pub const CLOSE_PROMPT: &str = "Press \"x\" to close the window.\r\n";

/// Static options for a session window.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub variant: EngineVariant,
    /// Agent endpoint id to probe.
    pub agent_endpoint: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            variant: EngineVariant::default(),
            agent_endpoint: crate::agent::DEFAULT_AGENT_ID.to_string(),
        }
    }
}

/// Request from the window to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRequest {
    None,
    /// The user asked to close; the host closes the window and reports it.
    Close,
}

pub struct SessionWindow {
    id: String,
    args: Option<ConnectionArgs>,
    options: SessionOptions,
    lifecycle: Lifecycle,
    flags: LaunchFlags,
    engine: Box<dyn EngineHost>,
    terminal: Box<dyn TerminalSink>,
    relay: AgentRelay,
    router: EngineRouter,
    settings: SettingsStore,
    completions: Option<Receiver<SettingRead>>,
}

impl SessionWindow {
    pub fn new(
        id: impl Into<String>,
        args: ConnectionArgs,
        options: SessionOptions,
        settings: SettingsStore,
        engine: Box<dyn EngineHost>,
        terminal: Box<dyn TerminalSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            id: id.into(),
            args: Some(args),
            options,
            lifecycle: Lifecycle::new(),
            flags: LaunchFlags::empty(),
            engine,
            terminal,
            relay: AgentRelay::new(),
            router: EngineRouter::new(settings.clone(), tx),
            settings,
            completions: Some(rx),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn flags(&self) -> LaunchFlags {
        self.flags
    }

    /// Attach connection arguments to the engine and start the agent probe.
    pub fn start(&mut self, connector: &mut dyn AgentConnector) {
        let Some(args) = self.args.take() else {
            warn!("Session {} already started", self.id);
            return;
        };
        info!("Starting session {} ({:?})", self.id, args);
        for (name, value) in args.to_attributes() {
            self.engine.set_attribute(name, &value);
        }
        self.flags = args.base_flags();
        // `args` (and the credential in it) is dropped here.
        drop(args);

        match self.settings.term_init_string() {
            Ok(Some(init)) => self.terminal.print(&init),
            Ok(None) => {}
            Err(e) => warn!("Could not read terminal init string: {}", e),
        }

        if self.transition(LifecycleEvent::ArgsAttached) == Some(TransitionAction::StartAgentProbe) {
            let endpoint = self.options.agent_endpoint.clone();
            if let Some(available) = self.relay.start_probe(connector, &endpoint) {
                self.finish_init(available);
            }
        }
    }

    fn finish_init(&mut self, agent_available: bool) {
        if agent_available {
            self.flags |= LaunchFlags::USE_AGENT;
        }
        self.engine
            .set_attribute("use-agent", flag_attribute(self.flags, LaunchFlags::USE_AGENT));
        self.engine
            .set_attribute("trust-sshfp", flag_attribute(self.flags, LaunchFlags::TRUST_SSHFP));

        if self.transition(LifecycleEvent::AgentResolved) == Some(TransitionAction::InsertEngine) {
            if self.options.variant == EngineVariant::Portable {
                self.terminal.print(LOADING_BANNER);
            }
            if let Err(e) = self.engine.insert() {
                error!("Engine insert failed for {}: {}", self.id, e);
                self.on_engine_event(EngineEvent::Crashed);
            }
        }
    }

    pub fn on_agent_event(&mut self, event: AgentEvent) {
        if self.lifecycle.state().is_closed() {
            return;
        }
        match self.relay.on_event(event) {
            RelayOutcome::Resolved(available) => self.finish_init(available),
            RelayOutcome::Forward(data) => self.post(Outbound::SshAgent(data)),
            RelayOutcome::Ignored => {}
        }
    }

    pub fn on_engine_event(&mut self, event: EngineEvent) {
        if self.lifecycle.state().is_closed() {
            debug!("Session {} closed; dropping engine event", self.id);
            return;
        }
        match event {
            EngineEvent::Loaded => {
                if self.transition(LifecycleEvent::EngineLoaded) == Some(TransitionAction::ScrubCredentials) {
                    for name in CREDENTIAL_ATTRIBUTES {
                        self.engine.remove_attribute(name);
                    }
                    if self.options.variant == EngineVariant::Portable {
                        self.terminal.print(LOADED_BANNER);
                    }
                }
            }
            EngineEvent::Crashed => {
                if self.transition(LifecycleEvent::EngineCrashed) == Some(TransitionAction::ShowCrashPrompt) {
                    self.show_exit(CRASH_MESSAGE);
                }
            }
            EngineEvent::Progress { loaded, total } => {
                if self.options.variant != EngineVariant::Portable {
                    return;
                }
                if let Some(bar) = render_progress(loaded, total) {
                    self.terminal.print(&bar);
                }
            }
            EngineEvent::Message(raw) => {
                let routed = self.router.dispatch(
                    &raw,
                    RouterIo {
                        terminal: self.terminal.as_mut(),
                        relay: &mut self.relay,
                    },
                );
                if routed == Routed::Exit
                    && self.transition(LifecycleEvent::EngineExited) == Some(TransitionAction::ShowExitPrompt)
                {
                    self.show_exit(EXIT_MESSAGE);
                }
            }
        }
    }

    fn show_exit(&mut self, message: &str) {
        self.terminal.print(&format!("\r\n{}\r\n", message));
        info!("Session {}: {}", self.id, message);
        self.terminal.print(CLOSE_PROMPT);
    }

    /// Keyboard input from the terminal.
    pub fn on_keyboard(&mut self, text: &str) -> WindowRequest {
        match self.lifecycle.gate_key(text) {
            KeyDisposition::Forward => {
                self.post(Outbound::keyboard(text));
                WindowRequest::None
            }
            KeyDisposition::Close => WindowRequest::Close,
            KeyDisposition::Drop => WindowRequest::None,
        }
    }

    /// Report a new size; ignored unless the session is running.
    pub fn on_resize(&mut self, width: u16, height: u16) {
        if self.lifecycle.state() != LifecycleState::Running {
            return;
        }
        self.post(Outbound::WindowChange(encode_window_change(width, height)));
    }

    /// Complete pending settings reads, replying to the engine in order.
    ///
    /// Returns the number of replies posted.
    pub fn poll(&mut self) -> usize {
        let reads: Vec<SettingRead> = match &self.completions {
            Some(rx) => rx.try_iter().collect(),
            None => return 0,
        };
        let mut posted = 0;
        for read in reads {
            if self.lifecycle.state().is_closed() {
                break;
            }
            self.post(Outbound::Setting {
                name: read.name,
                value: read.value,
            });
            posted += 1;
        }
        posted
    }

    /// Tear the window down. Safe to call in any state and more than once.
    ///
    /// Returns `true` the first time.
    pub fn close(&mut self) -> bool {
        if self.transition(LifecycleEvent::CloseRequested) != Some(TransitionAction::Teardown) {
            return false;
        }
        info!("Closing session {}", self.id);
        self.relay.detach();
        self.engine.detach();
        self.completions = None;
        true
    }

    fn post(&mut self, message: Outbound) {
        if let Err(e) = self.engine.post(&message.to_value()) {
            error!("Posting to engine failed for {}: {}", self.id, e);
        }
    }

    fn transition(&mut self, event: LifecycleEvent) -> Option<TransitionAction> {
        match self.lifecycle.apply(event) {
            Ok(action) => Some(action),
            Err(e) => {
                debug!("Session {}: {}", self.id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::RecordingConnector;
    use crate::agent::{NoAgent, AGENT_PROTOCOL_TAG};
    use crate::error::EngineError;
    use crate::session::args::Mode;
    use crate::settings::Scope;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct EngineLog {
        attributes: BTreeMap<String, String>,
        posted: Vec<Value>,
        inserted: bool,
        detached: bool,
    }

    struct FakeEngine(Rc<RefCell<EngineLog>>);

    impl EngineHost for FakeEngine {
        fn set_attribute(&mut self, name: &str, value: &str) {
            self.0.borrow_mut().attributes.insert(name.to_string(), value.to_string());
        }
        fn remove_attribute(&mut self, name: &str) {
            self.0.borrow_mut().attributes.remove(name);
        }
        fn attribute(&self, name: &str) -> Option<String> {
            self.0.borrow().attributes.get(name).cloned()
        }
        fn insert(&mut self) -> Result<(), EngineError> {
            self.0.borrow_mut().inserted = true;
            Ok(())
        }
        fn post(&mut self, message: &Value) -> Result<(), EngineError> {
            self.0.borrow_mut().posted.push(message.clone());
            Ok(())
        }
        fn detach(&mut self) {
            self.0.borrow_mut().detached = true;
        }
    }

    struct FakeScreen(Rc<RefCell<String>>);

    impl TerminalSink for FakeScreen {
        fn print(&mut self, text: &str) {
            self.0.borrow_mut().push_str(text);
        }
    }

    struct Harness {
        window: SessionWindow,
        engine: Rc<RefCell<EngineLog>>,
        screen: Rc<RefCell<String>>,
        settings: SettingsStore,
    }

    fn harness(variant: EngineVariant) -> Harness {
        let engine = Rc::new(RefCell::new(EngineLog::default()));
        let screen = Rc::new(RefCell::new(String::new()));
        let settings = SettingsStore::in_memory();
        let mut args = ConnectionArgs::new(Mode::Manual, "10.0.0.1");
        args.credential = Some("SESSIONKEY".to_string());
        let window = SessionWindow::new(
            "mosh_window_manual_@10.0.0.1:60001",
            args,
            SessionOptions {
                variant,
                ..SessionOptions::default()
            },
            settings.clone(),
            Box::new(FakeEngine(engine.clone())),
            Box::new(FakeScreen(screen.clone())),
        );
        Harness {
            window,
            engine,
            screen,
            settings,
        }
    }

    fn running(variant: EngineVariant) -> Harness {
        let mut h = harness(variant);
        h.window.start(&mut NoAgent);
        h.window.on_engine_event(EngineEvent::Loaded);
        assert_eq!(h.window.state(), LifecycleState::Running);
        h
    }

    #[test]
    fn test_start_without_agent_inserts_engine() {
        let mut h = harness(EngineVariant::Portable);
        h.window.start(&mut NoAgent);

        assert_eq!(h.window.state(), LifecycleState::Loading);
        let engine = h.engine.borrow();
        assert!(engine.inserted);
        assert_eq!(engine.attributes["use-agent"], "false");
        assert_eq!(engine.attributes["key"], "SESSIONKEY");
        assert_eq!(engine.attributes["port"], "60001");
        assert!(h.screen.borrow().contains("Loading NaCl module"));
    }

    #[test]
    fn test_engine_waits_for_agent_probe() {
        let mut h = harness(EngineVariant::Native);
        let mut connector = RecordingConnector::default();
        h.window.start(&mut connector);

        assert_eq!(h.window.state(), LifecycleState::Initializing);
        assert!(!h.engine.borrow().inserted);

        h.window.on_agent_event(AgentEvent::Message(json!({"type": AGENT_PROTOCOL_TAG, "data": []})));
        assert_eq!(h.window.state(), LifecycleState::Loading);
        assert!(h.engine.borrow().inserted);
        assert_eq!(h.engine.borrow().attributes["use-agent"], "true");
        assert!(h.window.flags().contains(LaunchFlags::USE_AGENT));
    }

    #[test]
    fn test_agent_replies_reach_engine() {
        let mut h = harness(EngineVariant::Native);
        let mut connector = RecordingConnector::default();
        h.window.start(&mut connector);
        h.window.on_agent_event(AgentEvent::Message(json!({})));
        h.window.on_engine_event(EngineEvent::Loaded);

        h.window.on_engine_event(EngineEvent::Message(json!({"type": "ssh-agent", "data": [11]})));
        assert_eq!(
            connector.posted.borrow().last().cloned(),
            Some(json!({"type": AGENT_PROTOCOL_TAG, "data": [11]}))
        );

        h.window.on_agent_event(AgentEvent::Message(json!({"type": AGENT_PROTOCOL_TAG, "data": [12]})));
        assert_eq!(
            h.engine.borrow().posted.last().cloned(),
            Some(json!({"ssh_agent": [12]}))
        );
    }

    #[test]
    fn test_load_scrubs_credentials() {
        let h = running(EngineVariant::Portable);
        let engine = h.engine.borrow();
        assert!(!engine.attributes.contains_key("key"));
        assert_eq!(engine.attributes["addr"], "10.0.0.1");
        assert!(h.screen.borrow().ends_with(LOADED_BANNER));
    }

    #[test]
    fn test_keyboard_gating() {
        let mut h = harness(EngineVariant::Native);
        h.window.start(&mut NoAgent);
        assert_eq!(h.window.on_keyboard("a"), WindowRequest::None);
        assert!(h.engine.borrow().posted.is_empty());

        h.window.on_engine_event(EngineEvent::Loaded);
        h.window.on_keyboard("a");
        assert_eq!(h.engine.borrow().posted, vec![json!({"keyboard": [97]})]);

        h.window.on_engine_event(EngineEvent::Message(json!({"type": "exit", "data": ""})));
        assert_eq!(h.window.state(), LifecycleState::Exited);
        assert_eq!(h.window.on_keyboard("a"), WindowRequest::None);
        assert_eq!(h.window.on_keyboard("x"), WindowRequest::Close);
        assert_eq!(h.engine.borrow().posted.len(), 1);
    }

    #[test]
    fn test_exit_prompt() {
        let mut h = running(EngineVariant::Native);
        h.window.on_engine_event(EngineEvent::Message(json!({"type": "exit", "data": ""})));
        let screen = h.screen.borrow();
        assert!(screen.contains("\r\nMosh has exited.\r\n"));
        assert!(screen.ends_with(CLOSE_PROMPT));
    }

    #[test]
    fn test_crash_while_loading() {
        let mut h = harness(EngineVariant::Native);
        h.window.start(&mut NoAgent);
        h.window.on_engine_event(EngineEvent::Crashed);
        assert_eq!(h.window.state(), LifecycleState::Crashed);
        assert!(h.screen.borrow().contains(CRASH_MESSAGE));
    }

    #[test]
    fn test_resize_encoding() {
        let mut h = harness(EngineVariant::Native);
        h.window.start(&mut NoAgent);
        h.window.on_resize(80, 24);
        assert!(h.engine.borrow().posted.is_empty());

        h.window.on_engine_event(EngineEvent::Loaded);
        h.window.on_resize(800, 24);
        assert_eq!(
            h.engine.borrow().posted.last().cloned(),
            Some(json!({"window_change": (800u32 << 16) + 24}))
        );

        h.window.on_engine_event(EngineEvent::Message(json!({"type": "exit"})));
        let posted = h.engine.borrow().posted.len();
        h.window.on_resize(100, 30);
        assert_eq!(h.engine.borrow().posted.len(), posted);
    }

    #[test]
    fn test_progress_only_for_portable() {
        let mut native = harness(EngineVariant::Native);
        native.window.start(&mut NoAgent);
        native.window.on_engine_event(EngineEvent::Progress { loaded: 5, total: Some(10) });
        assert!(!native.screen.borrow().contains('['));

        let mut portable = harness(EngineVariant::Portable);
        portable.window.start(&mut NoAgent);
        portable.window.on_engine_event(EngineEvent::Progress { loaded: 5, total: Some(10) });
        portable.window.on_engine_event(EngineEvent::Progress { loaded: 10, total: Some(10) });
        assert!(portable.screen.borrow().ends_with("\r[...............]"));
    }

    #[test]
    fn test_settings_read_replies_on_poll() {
        let mut h = running(EngineVariant::Native);
        h.settings.set(Scope::Local, "ssh_key", json!("PRIVATE")).unwrap();

        h.window.on_engine_event(EngineEvent::Message(json!({"type": "get_ssh_key", "data": null})));
        assert!(h.engine.borrow().posted.is_empty());

        assert_eq!(h.window.poll(), 1);
        assert_eq!(h.engine.borrow().posted, vec![json!({"ssh_key": "PRIVATE"})]);
    }

    #[test]
    fn test_read_after_close_is_dropped() {
        let mut h = running(EngineVariant::Native);
        h.window.on_engine_event(EngineEvent::Message(json!({"type": "get_known_hosts", "data": null})));
        assert!(h.window.close());
        assert!(h.engine.borrow().detached);

        assert_eq!(h.window.poll(), 0);
        h.window.on_engine_event(EngineEvent::Message(json!({"type": "get_ssh_key", "data": null})));
        assert_eq!(h.window.poll(), 0);
        assert!(h.engine.borrow().posted.is_empty());
        assert!(!h.window.close());
    }

    #[test]
    fn test_term_init_string_printed_on_start() {
        let mut h = harness(EngineVariant::Native);
        h.settings
            .set(Scope::Synced, "term_init_string", json!("\x1b[?1h"))
            .unwrap();
        h.window.start(&mut NoAgent);
        assert!(h.screen.borrow().starts_with("\x1b[?1h"));
    }
}
