//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory day partitions are stored in. Supports `~`-relative
    /// paths.
    pub storage_dir: PathBuf,

    /// Location of a legacy single-file store, for `wl migrate`.
    pub legacy_store_path: Option<PathBuf>,

    /// Start a session automatically on the first activity event.
    pub auto_track: bool,

    /// Inactivity duration before idle is signaled, in seconds.
    pub idle_threshold_secs: u64,

    /// Dismiss a pending idle prompt when activity resumes.
    pub auto_dismiss_idle: bool,

    /// Cadence of the display-only duration refresh, in seconds.
    pub refresh_interval_secs: u64,

    /// Webhook destination for completed-session events.
    pub webhook_url: Option<String>,

    /// Signing secret for webhook payloads.
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("storage_dir", &self.storage_dir)
            .field("legacy_store_path", &self.legacy_store_path)
            .field("auto_track", &self.auto_track)
            .field("idle_threshold_secs", &self.idle_threshold_secs)
            .field("auto_dismiss_idle", &self.auto_dismiss_idle)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("webhook_url", &self.webhook_url)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            storage_dir: data_dir.join("partitions"),
            legacy_store_path: None,
            auto_track: false,
            idle_threshold_secs: 600,
            auto_dismiss_idle: true,
            refresh_interval_secs: 1,
            webhook_url: None,
            webhook_secret: None,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WL_*)
        figment = figment.merge(Env::prefixed("WL_"));

        figment.extract()
    }

    /// The storage directory with `~` expanded.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        expand_tilde(&self.storage_dir)
    }

    /// The legacy store path for migration: the configured one, or
    /// `time-tracking.csv` next to the storage directory.
    #[must_use]
    pub fn legacy_store_path(&self) -> PathBuf {
        self.legacy_store_path.as_deref().map_or_else(
            || {
                let storage = self.storage_dir();
                storage
                    .parent()
                    .unwrap_or(&storage)
                    .join("time-tracking.csv")
            },
            expand_tilde,
        )
    }
}

/// Expands a leading `~` or `~/` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if s == "~" {
        return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
    }
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Returns the platform-specific config directory for wl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wl"))
}

/// Returns the platform-specific data directory for wl.
///
/// On Linux: `~/.local/share/wl`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("wl"))
}
