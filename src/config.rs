//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for the presentation surface
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Polling and delay settings
    pub timings: Timings,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("clipslots");

        let socket_path = std::env::var_os("CLIPSLOTS_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        Ok(Self {
            socket_path,
            data_dir,
            timings: Timings::from_env(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Delays and retry bounds used by the arbiter, controller and clipboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Interval between key-state polls while waiting for a chord release
    pub release_poll: Duration,
    /// Give up waiting for the release after this long
    pub release_timeout: Duration,
    /// Clipboard reads after an injected copy before settling
    pub copy_poll_attempts: u32,
    /// Pause between those reads
    pub copy_poll_interval: Duration,
    /// How long the refreshed popup stays up after a copy
    pub copy_hold: Duration,
    /// Attempts per clipboard access
    pub clipboard_retries: u32,
    /// Base pause between clipboard access attempts
    pub clipboard_backoff: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            release_poll: Duration::from_millis(10),
            release_timeout: Duration::from_millis(2000),
            copy_poll_attempts: 20,
            copy_poll_interval: Duration::from_millis(10),
            copy_hold: Duration::from_millis(500),
            clipboard_retries: 5,
            clipboard_backoff: Duration::from_millis(20),
        }
    }
}

impl Timings {
    /// Defaults overridden by `CLIPSLOTS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |name: &str, default: Duration| {
            read_u64(&lookup, name)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        let count = |name: &str, default: u32| {
            read_u64(&lookup, name)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default)
        };

        Self {
            release_poll: millis("CLIPSLOTS_RELEASE_POLL_MS", defaults.release_poll),
            release_timeout: millis("CLIPSLOTS_RELEASE_TIMEOUT_MS", defaults.release_timeout),
            copy_poll_attempts: count("CLIPSLOTS_COPY_POLL_ATTEMPTS", defaults.copy_poll_attempts),
            copy_poll_interval: millis("CLIPSLOTS_COPY_POLL_MS", defaults.copy_poll_interval),
            copy_hold: millis("CLIPSLOTS_COPY_HOLD_MS", defaults.copy_hold),
            clipboard_retries: count("CLIPSLOTS_CLIPBOARD_RETRIES", defaults.clipboard_retries),
            clipboard_backoff: millis("CLIPSLOTS_CLIPBOARD_BACKOFF_MS", defaults.clipboard_backoff),
        }
    }

    /// No waiting anywhere; for tests
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            release_poll: Duration::ZERO,
            release_timeout: Duration::ZERO,
            copy_poll_attempts: 3,
            copy_poll_interval: Duration::ZERO,
            copy_hold: Duration::ZERO,
            clipboard_retries: 1,
            clipboard_backoff: Duration::ZERO,
        }
    }
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, value = %raw, "ignoring malformed setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.data_dir.to_string_lossy().contains("clipslots"));
    }

    #[test]
    fn test_timing_defaults() {
        let timings = Timings::from_lookup(|_| None);
        assert_eq!(timings, Timings::default());
        assert_eq!(timings.copy_hold, Duration::from_millis(500));
    }

    #[test]
    fn test_timing_overrides() {
        let env: HashMap<&str, &str> = [
            ("CLIPSLOTS_COPY_HOLD_MS", "250"),
            ("CLIPSLOTS_CLIPBOARD_RETRIES", " 9 "),
            ("CLIPSLOTS_RELEASE_TIMEOUT_MS", "soon"),
        ]
        .into_iter()
        .collect();
        let timings = Timings::from_lookup(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(timings.copy_hold, Duration::from_millis(250));
        assert_eq!(timings.clipboard_retries, 9);
        assert_eq!(timings.release_timeout, Timings::default().release_timeout);
    }
}
