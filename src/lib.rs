//! moshterm - session windows for an embedded mosh engine
//!
//! The engine (terminal protocol, transport and crypto) is an opaque
//! collaborator reached through a tagged `{type, data}` message channel.
//! This crate is everything around it: session ids, the window registry and
//! its restart-to-update policy, the credential-agent relay, routing of
//! engine messages, the session lifecycle and persisted settings.
//!
//! # Architecture
//!
//! ```text
//! App
//! ├── WindowRegistry (session id -> window, update policy)
//! └── WindowRuntime (hosts windows)
//!     └── SessionWindow
//!         ├── Lifecycle
//!         ├── EngineRouter -> SettingsStore
//!         ├── AgentRelay
//!         ├── EngineHost
//!         └── TerminalSink
//! ```

pub mod agent;
pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod session;
pub mod settings;
pub mod setup;
pub mod wm;

pub use app::{App, WindowRuntime};
pub use config::Config;
pub use session::{SessionWindow, WindowRequest};
pub use settings::SettingsStore;
pub use setup::SetupForm;
