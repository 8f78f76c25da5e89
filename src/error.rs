//! Error types for the session shell.
//!
//! Each component owns one error enum. Errors that cross into window or
//! registry code are limited to the ones listed here; malformed engine input
//! is contained by the router and only ever logged.

use thiserror::Error;

use crate::session::lifecycle::LifecycleState;
use crate::settings::Scope;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session id already registered: {0}")]
    DuplicateId(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidState {
        from: LifecycleState,
        to: LifecycleState,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Agent relay used in state {0}")]
    InvalidState(&'static str),

    #[error("Agent channel closed: {0}")]
    Channel(String),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings backend failed for {scope:?} key '{key}': {message}")]
    Backend {
        scope: Scope,
        key: String,
        message: String,
    },

    #[error("Failed to normalize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read settings file: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to parse settings file: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Failed to write settings file: {0}")]
    Encode(#[source] toml::ser::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Malformed engine message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is not inserted")]
    NotInserted,

    #[error("Failed to start engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to write to engine: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to encode engine message: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum WindowError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to save connection fields: {0}")]
    Settings(#[from] SettingsError),

    #[error("Window runtime failed: {0}")]
    Runtime(String),
}
