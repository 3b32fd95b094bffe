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

//! Alerts raised by notable state transitions.

use std::fmt;

use sync_monitor::{SyncSnapshot, SyncState};

use crate::config::NotificationConfig;

/// A transition worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Transfers finished and the daemon is idle again.
    SyncComplete,
    /// The daemon stopped answering.
    DaemonOffline,
    /// Storage usage crossed the warning threshold.
    QuotaWarning { percent: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncComplete => f.write_str("Sync complete"),
            Self::DaemonOffline => f.write_str("Jotta daemon is offline"),
            Self::QuotaWarning { percent } => write!(f, "Storage is {percent:.0}% full"),
        }
    }
}

/// Remembers what the user was last told so alerts fire once per transition.
#[derive(Debug, Default)]
pub struct AlertTracker {
    previous_state: Option<SyncState>,
    /// Warning state from the last snapshot that carried usage.
    quota_warned: bool,
}

impl AlertTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts for the change to `next`, filtered by `config`.
    ///
    /// The tracker is updated even when notifications are disabled, so turning
    /// them on later does not replay old transitions.
    pub fn observe(&mut self, next: &SyncSnapshot, config: &NotificationConfig) -> Vec<Alert> {
        let previous_state = self.previous_state.replace(next.state());

        // Offline and error snapshots carry no usage; keep the last known state.
        let was_warned = self.quota_warned;
        let percent = next.usage_percent();
        if percent.is_some() {
            self.quota_warned = next.quota_warning(config.quota_warning_threshold);
        }

        if !config.enabled {
            return Vec::new();
        }

        let mut alerts = Vec::new();

        if config.notify_on_sync_complete
            && previous_state == Some(SyncState::Syncing)
            && next.state() == SyncState::Idle
        {
            alerts.push(Alert::SyncComplete);
        }

        if config.notify_on_daemon_offline
            && next.state() == SyncState::Offline
            && previous_state != Some(SyncState::Offline)
        {
            alerts.push(Alert::DaemonOffline);
        }

        if config.notify_on_quota_warning && self.quota_warned && !was_warned {
            if let Some(percent) = percent {
                alerts.push(Alert::QuotaWarning { percent });
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(state: SyncState) -> SyncSnapshot {
        SyncSnapshot::new(state, Utc::now())
    }

    fn usage(used: u64) -> SyncSnapshot {
        snapshot(SyncState::Idle).with_usage(Some(used), Some(100))
    }

    #[test]
    fn test_sync_complete() {
        let config = NotificationConfig::default();
        let mut tracker = AlertTracker::new();

        assert!(tracker.observe(&snapshot(SyncState::Syncing), &config).is_empty());
        assert_eq!(
            tracker.observe(&snapshot(SyncState::Idle), &config),
            vec![Alert::SyncComplete]
        );
        assert!(tracker.observe(&snapshot(SyncState::Idle), &config).is_empty());
    }

    #[test]
    fn test_offline_only_on_entry() {
        let config = NotificationConfig::default();
        let offline = SyncSnapshot::offline(Utc::now());
        let mut tracker = AlertTracker::new();

        assert_eq!(tracker.observe(&offline, &config), vec![Alert::DaemonOffline]);
        assert!(tracker.observe(&offline, &config).is_empty());
    }

    #[test]
    fn test_quota_warning_on_crossing() {
        let config = NotificationConfig::default();
        let mut tracker = AlertTracker::new();

        assert!(tracker.observe(&usage(80), &config).is_empty());
        let alerts = tracker.observe(&usage(95), &config);
        assert!(matches!(alerts.as_slice(), [Alert::QuotaWarning { percent }] if (*percent - 95.0).abs() < 0.01));
        assert!(tracker.observe(&usage(95), &config).is_empty());

        // Dropping below and crossing again warns again.
        assert!(tracker.observe(&usage(50), &config).is_empty());
        assert_eq!(tracker.observe(&usage(95), &config).len(), 1);
    }

    #[test]
    fn test_quota_warning_survives_offline() {
        let config = NotificationConfig::default();
        let mut tracker = AlertTracker::new();

        assert_eq!(tracker.observe(&usage(95), &config).len(), 1);
        assert_eq!(
            tracker.observe(&SyncSnapshot::offline(Utc::now()), &config),
            vec![Alert::DaemonOffline]
        );
        assert!(tracker.observe(&usage(95), &config).is_empty());
    }

    #[test]
    fn test_disabled_notifications() {
        let config = NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        };
        let mut tracker = AlertTracker::new();

        tracker.observe(&snapshot(SyncState::Syncing), &config);
        assert!(tracker.observe(&snapshot(SyncState::Idle), &config).is_empty());
    }
}
