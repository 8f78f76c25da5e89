//! Window tracking.
//!
//! - **registry**: `WindowRegistry` (session id -> window handle)
//! - **update**: restart-when-idle policy for pending updates
//!
//! ```text
//! wm/
//! ├── mod.rs       - Module exports
//! ├── registry.rs  - WindowRegistry
//! └── update.rs    - UpdatePolicy, ReloadCheck
//! ```

pub mod registry;
pub mod update;

pub use registry::WindowRegistry;
pub use update::{update_banner, ReloadCheck, UpdatePolicy};
