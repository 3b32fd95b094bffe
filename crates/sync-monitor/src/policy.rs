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

//! Adaptive polling interval policy.

use std::time::Duration;

use crate::snapshot::SyncState;
use crate::source::Classification;

/// Poll interval while transfers are running.
pub const ACTIVE_INTERVAL: Duration = Duration::from_secs(2);
/// Poll interval for idle, paused and error states.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(10);
/// Poll interval while the daemon is unreachable.
pub const OFFLINE_INTERVAL: Duration = Duration::from_secs(30);

/// Interval table keyed on the outcome of the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub active: Duration,
    pub idle: Duration,
    pub offline: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            active: ACTIVE_INTERVAL,
            idle: IDLE_INTERVAL,
            offline: OFFLINE_INTERVAL,
        }
    }
}

impl PollIntervals {
    /// Interval to wait before the next poll.
    #[must_use]
    pub fn next_interval(&self, classification: &Classification) -> Duration {
        match classification {
            Classification::Success(snapshot) => match snapshot.state() {
                SyncState::Syncing => self.active,
                SyncState::Offline => self.offline,
                SyncState::Idle | SyncState::Paused | SyncState::Error => self.idle,
            },
            Classification::Offline => self.offline,
            Classification::Error(_) => self.idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SyncSnapshot;
    use chrono::Utc;

    fn success(state: SyncState) -> Classification {
        Classification::Success(SyncSnapshot::new(state, Utc::now()))
    }

    #[test]
    fn test_interval_table() {
        let intervals = PollIntervals::default();

        assert_eq!(intervals.next_interval(&success(SyncState::Syncing)), ACTIVE_INTERVAL);
        assert_eq!(intervals.next_interval(&success(SyncState::Idle)), IDLE_INTERVAL);
        assert_eq!(intervals.next_interval(&success(SyncState::Paused)), IDLE_INTERVAL);
        assert_eq!(intervals.next_interval(&success(SyncState::Error)), IDLE_INTERVAL);
        assert_eq!(intervals.next_interval(&Classification::Offline), OFFLINE_INTERVAL);
        assert_eq!(
            intervals.next_interval(&Classification::Error("timeout".to_string())),
            IDLE_INTERVAL
        );
    }

    #[test]
    fn test_interval_sequence() {
        let intervals = PollIntervals::default();
        let sequence = [
            success(SyncState::Syncing),
            success(SyncState::Syncing),
            Classification::Offline,
            success(SyncState::Idle),
        ];

        let chosen: Vec<u64> = sequence
            .iter()
            .map(|class| intervals.next_interval(class).as_secs())
            .collect();

        assert_eq!(chosen, vec![2, 2, 30, 10]);
    }
}
