//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use vp_core::{ConfigError, DailyWindow, DurationFormat, FailurePolicy, GroupBy};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Attendance API endpoint used by `vp push`.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Shared secret sent with every API request.
    #[serde(default)]
    pub security_code: Option<String>,
    /// Daily window start, `HH:MM[:SS]` UTC.
    pub window_start: String,
    /// Daily window end, `HH:MM[:SS]` UTC.
    pub window_end: String,
    pub duration_format: DurationFormat,
    pub group_by: GroupBy,
    pub failure_policy: FailurePolicy,
    /// Default clan scope.
    #[serde(default)]
    pub clan_id: Option<i64>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("api_url", &self.api_url)
            .field(
                "security_code",
                &self.security_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("window_start", &self.window_start)
            .field("window_end", &self.window_end)
            .field("duration_format", &self.duration_format)
            .field("group_by", &self.group_by)
            .field("failure_policy", &self.failure_policy)
            .field("clan_id", &self.clan_id)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("vp.db"),
            api_url: None,
            security_code: None,
            window_start: "03:00".to_string(),
            window_end: "05:00".to_string(),
            duration_format: DurationFormat::default(),
            group_by: GroupBy::default(),
            failure_policy: FailurePolicy::default(),
            clan_id: None,
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

        // Load from environment variables (VP_*)
        figment = figment.merge(Env::prefixed("VP_"));

        figment.extract()
    }

    /// Validates and returns the configured daily window.
    pub fn window(&self) -> Result<DailyWindow, ConfigError> {
        DailyWindow::from_clock(&self.window_start, &self.window_end)
    }
}

/// Returns the platform-specific config directory for vp.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vp"))
}

/// Returns the platform-specific data directory for vp.
///
/// On Linux: `~/.local/share/vp`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("vp"))
}
