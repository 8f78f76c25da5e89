//! Credential-agent relay.
//!
//! Before the engine is inserted, the session probes for an external agent:
//! it opens a port and posts one probe message. The first response means an
//! agent is there; a disconnect means it is not. Either way the outcome is
//! final for the session and is handed to the engine as the `use-agent`
//! launch attribute.
//!
//! Payloads are opaque. Both directions wrap them as
//! `{type: "auth-agent@openssh.com", data: ...}`.

use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::error::RelayError;

/// Protocol tag for probe and relay messages.
pub const AGENT_PROTOCOL_TAG: &str = "auth-agent@openssh.com";

/// Default agent endpoint id.
pub const DEFAULT_AGENT_ID: &str = "beknehfpfkghjoafdifaflglpjkojoco";

/// Open channel to an agent.
pub trait AgentPort {
    fn post(&mut self, message: &Value) -> Result<(), RelayError>;
    fn disconnect(&mut self) {}
}

/// Opens agent ports.
pub trait AgentConnector {
    /// `None` when no channel could be opened at all.
    fn connect(&mut self, endpoint: &str) -> Option<Box<dyn AgentPort>>;
}

/// Connector for hosts without any agent support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAgent;

impl AgentConnector for NoAgent {
    fn connect(&mut self, _endpoint: &str) -> Option<Box<dyn AgentPort>> {
        None
    }
}

/// Events delivered from an agent port.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Message(Value),
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    #[default]
    NotStarted,
    Probing,
    Available,
    Unavailable,
}

impl RelayState {
    fn name(self) -> &'static str {
        match self {
            RelayState::NotStarted => "NotStarted",
            RelayState::Probing => "Probing",
            RelayState::Available => "Available",
            RelayState::Unavailable => "Unavailable",
        }
    }
}

/// What the session should do with an agent event.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Probe finished; `true` when an agent is available.
    Resolved(bool),
    /// Payload to forward to the engine.
    Forward(Value),
    Ignored,
}

/// Per-session relay state.
#[derive(Default)]
pub struct AgentRelay {
    state: RelayState,
    port: Option<Box<dyn AgentPort>>,
}

impl AgentRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Open a port to `endpoint` and post the probe.
    ///
    /// Returns `Some(false)` when the probe could not even be sent; the relay
    /// is then already `Unavailable`. Otherwise returns `None` and the outcome
    /// arrives through [`AgentRelay::on_event`].
    pub fn start_probe(&mut self, connector: &mut dyn AgentConnector, endpoint: &str) -> Option<bool> {
        if self.state != RelayState::NotStarted {
            debug!("Agent probe already started ({})", self.state.name());
            return None;
        }
        let Some(mut port) = connector.connect(endpoint) else {
            info!("No agent at {}", endpoint);
            self.state = RelayState::Unavailable;
            return Some(false);
        };
        let probe = json!({ "type": AGENT_PROTOCOL_TAG, "data": [0] });
        if let Err(e) = port.post(&probe) {
            info!("Agent probe failed: {}", e);
            port.disconnect();
            self.state = RelayState::Unavailable;
            return Some(false);
        }
        self.port = Some(port);
        self.state = RelayState::Probing;
        None
    }

    pub fn on_event(&mut self, event: AgentEvent) -> RelayOutcome {
        match (self.state, event) {
            (RelayState::Probing, AgentEvent::Message(_)) => {
                info!("Agent available");
                self.state = RelayState::Available;
                RelayOutcome::Resolved(true)
            }
            (RelayState::Probing, AgentEvent::Disconnected) => {
                info!("Agent unavailable");
                self.port = None;
                self.state = RelayState::Unavailable;
                RelayOutcome::Resolved(false)
            }
            (RelayState::Available, AgentEvent::Message(message)) => {
                if message.get("type").and_then(Value::as_str) != Some(AGENT_PROTOCOL_TAG) {
                    error!("Got unexpected message from agent: {}", message);
                    return RelayOutcome::Ignored;
                }
                RelayOutcome::Forward(message.get("data").cloned().unwrap_or(Value::Null))
            }
            (RelayState::Available, AgentEvent::Disconnected) => {
                // Outcome is final; later relay calls fail on the closed port.
                info!("Agent disconnected");
                self.port = None;
                RelayOutcome::Ignored
            }
            (state, event) => {
                debug!("Ignoring agent event {:?} in state {}", event, state.name());
                RelayOutcome::Ignored
            }
        }
    }

    /// Forward an engine payload to the agent.
    pub fn relay(&mut self, payload: Value) -> Result<(), RelayError> {
        if self.state != RelayState::Available {
            return Err(RelayError::InvalidState(self.state.name()));
        }
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| RelayError::Channel("agent disconnected".to_string()))?;
        port.post(&json!({ "type": AGENT_PROTOCOL_TAG, "data": payload }))
    }

    /// Drop the port; used on window teardown.
    pub fn detach(&mut self) {
        if let Some(mut port) = self.port.take() {
            port.disconnect();
        }
    }
}
