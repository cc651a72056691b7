//! Configuration management for the dashboard.
//! Handles loading and saving the dashboard.json file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::ProgramId;
use crate::error::ConfigError;
use crate::locale::Locale;

const CONFIG_FILE_NAME: &str = "dashboard.json";

/// How log panes are kept current after the initial load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Server-sent events on `/logs/stream`.
    #[default]
    Stream,
    /// `?since=<cursor>` requests on a fixed interval.
    Poll,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Stream => write!(f, "stream"),
            DeliveryMode::Poll => write!(f, "poll"),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Window title
    #[serde(default = "default_title")]
    pub title: String,
    /// Supervisor base URL, e.g. `http://127.0.0.1:5000`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_programs")]
    pub programs: Vec<ProgramId>,
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_alert_timeout_ms")]
    pub alert_timeout_ms: u64,
}

fn default_title() -> String {
    "Program Dashboard".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_programs() -> Vec<ProgramId> {
    (1..=4).map(ProgramId).collect()
}

fn default_status_interval_ms() -> u64 {
    3_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_alert_timeout_ms() -> u64 {
    5_000
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_url: default_base_url(),
            programs: default_programs(),
            delivery: DeliveryMode::default(),
            locale: Locale::default(),
            status_interval_ms: default_status_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            alert_timeout_ms: default_alert_timeout_ms(),
        }
    }
}

impl DashboardConfig {
    /// Get the path to the config file: next to the executable, or the
    /// platform config directory when that is not writable.
    pub fn config_path() -> PathBuf {
        let exe_path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        let exe_dir = exe_path.parent().unwrap_or_else(|| Path::new("."));
        let beside_exe = exe_dir.join(CONFIG_FILE_NAME);
        if beside_exe.exists() {
            return beside_exe;
        }

        let writable = fs::metadata(exe_dir)
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false);
        if writable {
            return beside_exe;
        }

        dirs::config_dir()
            .map(|dir| dir.join("program-dashboard").join(CONFIG_FILE_NAME))
            .unwrap_or(beside_exe)
    }

    /// Load config from `path`, creating a default file if none exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => info!(path = %path.display(), "wrote default config"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not write default config"),
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.programs.is_empty() {
            return Err(invalid("programs list is empty"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.programs.iter().find(|id| !seen.insert(**id)) {
            return Err(invalid(format!("program {dup} is listed twice")));
        }

        for (name, value) in [
            ("status_interval_ms", self.status_interval_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
            ("alert_timeout_ms", self.alert_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(format!("{name} must be greater than zero")));
            }
        }

        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(invalid(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            ))),
            Err(e) => Err(invalid(format!("base_url '{}' is not a URL: {e}", self.base_url))),
        }
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alert_timeout_ms)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
