//! Restart-to-update policy.
//!
//! An available update is held until no session windows are open. The
//! pending version is taken when the reload fires, so one update produces
//! exactly one reload no matter how many times the condition is evaluated.

use tracing::info;

/// Result of evaluating the reload condition.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadCheck {
    /// Restart now to apply `version`.
    Reload { version: String },
    Stay,
}

impl ReloadCheck {
    pub fn is_reload(&self) -> bool {
        matches!(self, ReloadCheck::Reload { .. })
    }
}

#[derive(Debug, Default)]
pub struct UpdatePolicy {
    pending: Option<String>,
}

impl UpdatePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version waiting to be applied.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Record an available update. A newer notice replaces an older one.
    pub fn set_pending(&mut self, version: impl Into<String>) {
        let version = version.into();
        info!("Update to v{} is pending", version);
        self.pending = Some(version);
    }

    /// Reload when an update is pending and `open_sessions` is zero.
    pub fn evaluate(&mut self, open_sessions: usize) -> ReloadCheck {
        if open_sessions > 0 {
            return ReloadCheck::Stay;
        }
        match self.pending.take() {
            Some(version) => ReloadCheck::Reload { version },
            None => ReloadCheck::Stay,
        }
    }
}

/// Text shown in setup windows while an update is pending.
pub fn update_banner(version: &str) -> String {
    format!(
        "Update to v{} is available. Close all Mosh windows to update.",
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_update_never_reloads() {
        let mut policy = UpdatePolicy::new();
        assert_eq!(policy.evaluate(0), ReloadCheck::Stay);
    }

    #[test]
    fn test_waits_for_sessions_to_close() {
        let mut policy = UpdatePolicy::new();
        policy.set_pending("0.5.0");
        assert_eq!(policy.evaluate(2), ReloadCheck::Stay);
        assert_eq!(policy.pending(), Some("0.5.0"));
        assert_eq!(
            policy.evaluate(0),
            ReloadCheck::Reload {
                version: "0.5.0".to_string()
            }
        );
        // Taken on reload.
        assert_eq!(policy.evaluate(0), ReloadCheck::Stay);
        assert_eq!(policy.pending(), None);
    }

    #[test]
    fn test_banner_text() {
        assert_eq!(
            update_banner("1.2.3"),
            "Update to v1.2.3 is available. Close all Mosh windows to update."
        );
    }
}
