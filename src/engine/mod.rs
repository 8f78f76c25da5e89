//! Embedded engine channel.
//!
//! The engine is opaque: it is configured through launch attributes, then
//! talks to the shell through tagged `{type, data}` messages. This module
//! holds the collaborator traits and the typed view of that channel.
//!
//! - **message**: decoding inbound messages, encoding outbound ones
//! - **router**: dispatch of decoded messages to their effects
//! - **progress**: load-progress bar rendering

pub mod message;
pub mod progress;
pub mod router;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use message::{EngineMessage, Outbound};
pub use router::{EngineRouter, Routed, RouterIo};

use crate::error::EngineError;

/// Element hosting the engine.
pub trait EngineHost {
    fn set_attribute(&mut self, name: &str, value: &str);
    fn remove_attribute(&mut self, name: &str);
    fn attribute(&self, name: &str) -> Option<String>;
    /// Start loading the engine with the attributes set so far.
    fn insert(&mut self) -> Result<(), EngineError>;
    fn post(&mut self, message: &Value) -> Result<(), EngineError>;
    /// Stop delivering events and release the engine.
    fn detach(&mut self) {}
}

/// Terminal output collaborator.
pub trait TerminalSink {
    fn print(&mut self, text: &str);
}

/// Which engine binary is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineVariant {
    /// Portable build, compiled on first load; slow enough to show progress.
    #[default]
    Portable,
    /// Native build, loads essentially instantly.
    Native,
}

/// Events delivered by the engine host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Loaded,
    Crashed,
    Progress { loaded: u64, total: Option<u64> },
    Message(Value),
}
