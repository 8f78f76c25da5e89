//! Session windows.
//!
//! - **id**: session identifiers derived from connection parameters
//! - **args**: connection arguments and launch attributes
//! - **lifecycle**: engine lifecycle state machine and key gating
//! - **window**: the per-window controller tying them together
//!
//! # Architecture
//!
//! ```text
//! SessionWindow
//! ├── Lifecycle (state + transition actions)
//! ├── EngineHost (attributes, insert, post)
//! ├── EngineRouter (inbound message dispatch)
//! ├── AgentRelay (probe + opaque payload relay)
//! └── TerminalSink (output)
//! ```

pub mod args;
pub mod id;
pub mod lifecycle;
pub mod window;

pub use args::{ConnectionArgs, LaunchFlags, Mode};
pub use id::make_id;
pub use lifecycle::{KeyDisposition, Lifecycle, LifecycleEvent, LifecycleState, TransitionAction};
pub use window::{SessionOptions, SessionWindow, WindowRequest};
