//! Background app controller.
//!
//! Owns the window registry and is the only code that mutates it. Launch
//! requests, window-close notices and update notices all arrive here; the
//! window-hosting environment is reached through [`WindowRuntime`].

use tracing::info;

use crate::error::WindowError;
use crate::session::args::ConnectionArgs;
use crate::session::id::make_id;
use crate::settings::SettingsStore;
use crate::setup::SetupForm;
use crate::wm::{update_banner, ReloadCheck, WindowRegistry};

/// Environment that actually hosts windows.
pub trait WindowRuntime {
    type Handle;

    /// Create a session window under `id` and hand it `args`.
    fn create_session_window(&mut self, id: &str, args: ConnectionArgs) -> Result<Self::Handle, WindowError>;
    fn close_setup_window(&mut self);
    /// Show the restart-to-update banner in every open setup window.
    fn notify_setup_windows(&mut self, banner: &str);
    /// Restart the app to apply `version`.
    fn restart(&mut self, version: &str);
}

pub struct App<R: WindowRuntime> {
    runtime: R,
    registry: WindowRegistry<R::Handle>,
    settings: SettingsStore,
}

impl<R: WindowRuntime> App<R> {
    pub fn new(runtime: R, settings: SettingsStore) -> Self {
        Self {
            runtime,
            registry: WindowRegistry::new(),
            settings,
        }
    }

    pub fn registry(&self) -> &WindowRegistry<R::Handle> {
        &self.registry
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn window_mut(&mut self, id: &str) -> Option<&mut R::Handle> {
        self.registry.get_mut(id)
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Open a session window for `args`; returns its id.
    pub fn launch(&mut self, args: ConnectionArgs) -> Result<String, WindowError> {
        let registry = &self.registry;
        let id = make_id(args.mode.as_str(), &args.user, &args.address, &args.port, |id| {
            registry.contains(id)
        });
        info!("Launching {}", id);
        let handle = self.runtime.create_session_window(&id, args)?;
        self.registry.register(id.clone(), handle)?;
        Ok(id)
    }

    /// Save the form, launch its session and close the setup window.
    pub fn connect(&mut self, form: &SetupForm) -> Result<String, WindowError> {
        form.save(&self.settings)?;
        let id = self.launch(form.to_args())?;
        self.runtime.close_setup_window();
        Ok(id)
    }

    /// A session window closed, for any reason.
    pub fn on_session_window_closed(&mut self, id: &str) {
        let check = self.registry.unregister(id);
        self.apply(check);
    }

    pub fn on_update_available(&mut self, version: &str) {
        info!("Update available: v{}", version);
        self.runtime.notify_setup_windows(&update_banner(version));
        let check = self.registry.set_pending_update(version);
        self.apply(check);
    }

    /// Banner for a setup window opened after the update arrived.
    pub fn update_banner(&self) -> Option<String> {
        self.registry.pending_update().map(update_banner)
    }

    fn apply(&mut self, check: ReloadCheck) {
        if let ReloadCheck::Reload { version } = check {
            info!("No session windows open; restarting for v{}", version);
            self.runtime.restart(&version);
        }
    }
}
