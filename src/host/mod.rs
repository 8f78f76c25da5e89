//! Process host for the `moshterm` binary.
//!
//! - **process**: engine child process speaking JSON lines
//! - **agent**: credential-agent bridge child process
//! - **terminal**: stdout sink and raw mode
//! - **keys**: key events to engine input text
//! - **marker**: update notices from a marker file
//! - **runtime**: `WindowRuntime` over the host terminal
//!
//! Child stdout is read on dedicated threads that only forward decoded
//! lines into channels; all state stays on the main loop.

pub mod agent;
pub mod keys;
pub mod marker;
pub mod process;
pub mod runtime;
pub mod terminal;

pub use keys::key_to_text;
pub use marker::UpdateMarker;
pub use runtime::TerminalRuntime;
pub use terminal::{RawModeGuard, StdoutSink};
