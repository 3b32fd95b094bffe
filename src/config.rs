// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Settings are persisted as TOML through `confy`. Every field has a serde
//! default, so a partial or missing file still loads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sync_monitor::cli::{CliConfig, DEFAULT_PROGRAM};
use sync_monitor::{MonitorConfig, PollIntervals, DEFAULT_QUOTA_WARNING_PERCENT};

const APP_NAME: &str = "jotta-tray";
const CONFIG_NAME: &str = "config";

/// Status polling settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MonitoringConfig {
    /// Path or name of the `jotta-cli` executable
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Seconds before a status query is abandoned
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Poll interval in seconds while syncing
    #[serde(default = "default_poll_active")]
    pub poll_interval_active: u64,

    /// Poll interval in seconds when idle, paused or in error
    #[serde(default = "default_poll_idle")]
    pub poll_interval_idle: u64,

    /// Poll interval in seconds while the daemon is offline
    #[serde(default = "default_poll_offline")]
    pub poll_interval_offline: u64,
}

/// Which state transitions are reported.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Report when a sync run finishes
    #[serde(default = "default_true")]
    pub notify_on_sync_complete: bool,

    /// Report when the daemon goes offline
    #[serde(default = "default_true")]
    pub notify_on_daemon_offline: bool,

    /// Report when storage usage crosses the warning threshold
    #[serde(default = "default_true")]
    pub notify_on_quota_warning: bool,

    /// Quota warning threshold (percentage)
    #[serde(default = "default_quota_threshold")]
    pub quota_warning_threshold: f64,
}

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

// Default value functions for serde
fn default_cli_path() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_query_timeout() -> u64 {
    5
}

fn default_poll_active() -> u64 {
    2
}

fn default_poll_idle() -> u64 {
    10
}

fn default_poll_offline() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_quota_threshold() -> f64 {
    DEFAULT_QUOTA_WARNING_PERCENT
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            query_timeout_secs: default_query_timeout(),
            poll_interval_active: default_poll_active(),
            poll_interval_idle: default_poll_idle(),
            poll_interval_offline: default_poll_offline(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_on_sync_complete: true,
            notify_on_daemon_offline: true,
            notify_on_quota_warning: true,
            quota_warning_threshold: default_quota_threshold(),
        }
    }
}

/// Zero would mean a busy loop, so every interval is at least one second.
fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, confy::ConfyError> {
        confy::load_path(path)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Settings for the `jotta-cli` status source
    #[must_use]
    pub fn cli_config(&self) -> CliConfig {
        CliConfig {
            program: self.monitoring.cli_path.clone(),
            timeout: secs(self.monitoring.query_timeout_secs),
        }
    }

    /// Settings for the status monitor
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            intervals: PollIntervals {
                active: secs(self.monitoring.poll_interval_active),
                idle: secs(self.monitoring.poll_interval_idle),
                offline: secs(self.monitoring.poll_interval_offline),
            },
            query_timeout: secs(self.monitoring.query_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_polling_table() {
        let config = AppConfig::default().monitor_config();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut config = AppConfig::default();
        config.monitoring.poll_interval_active = 0;
        assert_eq!(
            config.monitor_config().intervals.active,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_cli_config_uses_path_and_timeout() {
        let mut config = AppConfig::default();
        config.monitoring.cli_path = "/opt/jotta/bin/jotta-cli".to_string();
        config.monitoring.query_timeout_secs = 8;

        let cli = config.cli_config();
        assert_eq!(cli.program, "/opt/jotta/bin/jotta-cli");
        assert_eq!(cli.timeout, Duration::from_secs(8));
    }
}
