//! Update notices from a marker file.
//!
//! Whatever installs a new build writes its version into the marker file.
//! The main loop polls it and reports each new version once.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum time between reads of the marker file.
pub const MARKER_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct UpdateMarker {
    path: Option<PathBuf>,
    current_version: String,
    announced: Option<String>,
    last_check: Option<Instant>,
}

impl UpdateMarker {
    pub fn new(path: Option<PathBuf>, current_version: impl Into<String>) -> Self {
        Self {
            path,
            current_version: current_version.into(),
            announced: None,
            last_check: None,
        }
    }

    /// Poll if the interval has passed.
    pub fn poll(&mut self) -> Option<String> {
        if let Some(last) = self.last_check {
            if last.elapsed() < MARKER_POLL_INTERVAL {
                return None;
            }
        }
        self.last_check = Some(Instant::now());
        self.check()
    }

    /// Read the marker now. Returns a version the first time it is seen.
    pub fn check(&mut self) -> Option<String> {
        let path = self.path.as_ref()?;
        let content = fs::read_to_string(path).ok()?;
        let version = content.trim();
        if version.is_empty()
            || version == self.current_version
            || self.announced.as_deref() == Some(version)
        {
            return None;
        }
        debug!("Update marker names v{}", version);
        self.announced = Some(version.to_string());
        self.announced.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_each_version_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update");
        let mut marker = UpdateMarker::new(Some(path.clone()), "0.4.0");

        assert_eq!(marker.check(), None);
        fs::write(&path, "0.4.0\n").unwrap();
        assert_eq!(marker.check(), None);

        fs::write(&path, "0.5.0\n").unwrap();
        assert_eq!(marker.check().as_deref(), Some("0.5.0"));
        assert_eq!(marker.check(), None);

        fs::write(&path, "0.6.0").unwrap();
        assert_eq!(marker.check().as_deref(), Some("0.6.0"));
    }

    #[test]
    fn test_no_marker_configured() {
        let mut marker = UpdateMarker::new(None, "0.4.0");
        assert_eq!(marker.poll(), None);
    }
}
