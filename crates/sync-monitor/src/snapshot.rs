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

//! Sync state snapshots.
//!
//! A [`SyncSnapshot`] is one immutable observation of the daemon. Snapshots are
//! compared with [`SyncSnapshot::differs_from`], which ignores the observation
//! timestamp so that an unchanged daemon does not produce a change on every poll.

use std::fmt;

use chrono::{DateTime, Utc};

/// Usage percentage at which the quota is considered nearly full.
pub const DEFAULT_QUOTA_WARNING_PERCENT: f64 = 90.0;

/// High-level sync state reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Nothing to transfer.
    Idle,
    /// Files are being uploaded or downloaded.
    Syncing,
    /// Sync has been paused by the user.
    Paused,
    /// The daemon reported a failure, or the query itself failed.
    Error,
    /// The daemon could not be contacted.
    Offline,
}

impl SyncState {
    /// Whether transfers are in progress.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Syncing)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of the sync daemon.
///
/// Optional fields are `None` when the value is unknown, which is different
/// from zero. Offline snapshots never carry usage, rate or file counts, and
/// only error snapshots carry a message; the constructors enforce both.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    state: SyncState,
    bytes_used: Option<u64>,
    bytes_quota: Option<u64>,
    transfer_rate: Option<i64>,
    files_pending: Option<u64>,
    uploading: Option<u64>,
    downloading: Option<u64>,
    error_message: Option<String>,
    observed_at: DateTime<Utc>,
}

impl SyncSnapshot {
    /// Create a snapshot in a reachable state with no details filled in.
    ///
    /// `Offline` and `Error` are accepted for completeness, but
    /// [`SyncSnapshot::offline`] and [`SyncSnapshot::error`] should be
    /// preferred since they keep the field invariants.
    #[must_use]
    pub fn new(state: SyncState, observed_at: DateTime<Utc>) -> Self {
        Self {
            state,
            bytes_used: None,
            bytes_quota: None,
            transfer_rate: None,
            files_pending: None,
            uploading: None,
            downloading: None,
            error_message: None,
            observed_at,
        }
    }

    /// Snapshot for an unreachable daemon.
    #[must_use]
    pub fn offline(observed_at: DateTime<Utc>) -> Self {
        Self::new(SyncState::Offline, observed_at)
    }

    /// Snapshot for a failed query or a daemon-reported error.
    #[must_use]
    pub fn error(message: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(SyncState::Error, observed_at)
        }
    }

    /// Set storage usage. Ignored on offline snapshots.
    #[must_use]
    pub fn with_usage(mut self, used: Option<u64>, quota: Option<u64>) -> Self {
        if self.state != SyncState::Offline {
            self.bytes_used = used;
            self.bytes_quota = quota;
        }
        self
    }

    /// Set the transfer rate in bytes per second. Ignored on offline snapshots.
    #[must_use]
    pub fn with_transfer_rate(mut self, rate: Option<i64>) -> Self {
        if self.state != SyncState::Offline {
            self.transfer_rate = rate;
        }
        self
    }

    /// Set the pending file count directly. Ignored on offline snapshots.
    #[must_use]
    pub fn with_files_pending(mut self, pending: Option<u64>) -> Self {
        if self.state != SyncState::Offline {
            self.files_pending = pending;
        }
        self
    }

    /// Set per-direction transfer counts; `files_pending` becomes their sum.
    #[must_use]
    pub fn with_transfers(mut self, uploading: u64, downloading: u64) -> Self {
        if self.state != SyncState::Offline {
            self.uploading = Some(uploading);
            self.downloading = Some(downloading);
            self.files_pending = Some(uploading.saturating_add(downloading));
        }
        self
    }

    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub const fn bytes_used(&self) -> Option<u64> {
        self.bytes_used
    }

    #[must_use]
    pub const fn bytes_quota(&self) -> Option<u64> {
        self.bytes_quota
    }

    /// Transfer rate in bytes per second.
    #[must_use]
    pub const fn transfer_rate(&self) -> Option<i64> {
        self.transfer_rate
    }

    #[must_use]
    pub const fn files_pending(&self) -> Option<u64> {
        self.files_pending
    }

    /// Files currently uploading, when the source reports directions.
    #[must_use]
    pub const fn uploading(&self) -> Option<u64> {
        self.uploading
    }

    /// Files currently downloading, when the source reports directions.
    #[must_use]
    pub const fn downloading(&self) -> Option<u64> {
        self.downloading
    }

    /// Failure description. Only present when the state is `Error`.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Whether `self` is a meaningful change compared to `previous`.
    ///
    /// Compares state, bytes used, transfer rate and pending files. The
    /// observation time is never compared. For error snapshots the message is
    /// compared as well, so a different failure is reported.
    #[must_use]
    pub fn differs_from(&self, previous: &Self) -> bool {
        self.state != previous.state
            || self.bytes_used != previous.bytes_used
            || self.transfer_rate != previous.transfer_rate
            || self.files_pending != previous.files_pending
            || (self.state == SyncState::Error && self.error_message != previous.error_message)
    }

    /// Storage usage as a percentage of the quota.
    ///
    /// Returns `None` when either value is unknown or the quota is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "byte counts well below 2^52 in practice")]
    pub fn usage_percent(&self) -> Option<f64> {
        match (self.bytes_used, self.bytes_quota) {
            (Some(used), Some(quota)) if quota > 0 => Some(used as f64 / quota as f64 * 100.0),
            _ => None,
        }
    }

    /// Whether usage is at or above `threshold_percent` of the quota.
    #[must_use]
    pub fn quota_warning(&self, threshold_percent: f64) -> bool {
        self.usage_percent()
            .is_some_and(|percent| percent >= threshold_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_offline_drops_details() {
        let snapshot = SyncSnapshot::offline(at())
            .with_usage(Some(10), Some(100))
            .with_transfer_rate(Some(5))
            .with_transfers(1, 2);

        assert_eq!(snapshot.state(), SyncState::Offline);
        assert!(snapshot.bytes_used().is_none());
        assert!(snapshot.bytes_quota().is_none());
        assert!(snapshot.transfer_rate().is_none());
        assert!(snapshot.files_pending().is_none());
        assert!(snapshot.error_message().is_none());
    }

    #[test]
    fn test_error_carries_message() {
        let snapshot = SyncSnapshot::error("boom", at());
        assert_eq!(snapshot.state(), SyncState::Error);
        assert_eq!(snapshot.error_message(), Some("boom"));

        let idle = SyncSnapshot::new(SyncState::Idle, at());
        assert!(idle.error_message().is_none());
    }

    #[test]
    fn test_observed_at_ignored_for_change_detection() {
        let first = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(1000), Some(5000));
        let later = SyncSnapshot::new(SyncState::Idle, at() + chrono::Duration::seconds(30))
            .with_usage(Some(1000), Some(5000));

        assert!(!later.differs_from(&first));
    }

    #[test]
    fn test_quota_change_alone_is_not_a_change() {
        let first = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(1000), Some(5000));
        let second = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(1000), Some(9000));

        assert!(!second.differs_from(&first));
    }

    #[test]
    fn test_tracked_fields_trigger_change() {
        let base = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(1000), Some(5000));

        let state = SyncSnapshot::new(SyncState::Syncing, at()).with_usage(Some(1000), Some(5000));
        assert!(state.differs_from(&base));

        let used = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(2000), Some(5000));
        assert!(used.differs_from(&base));

        let rate = base.clone().with_transfer_rate(Some(204_800));
        assert!(rate.differs_from(&base));

        let pending = base.clone().with_transfers(3, 0);
        assert!(pending.differs_from(&base));
    }

    #[test]
    fn test_new_error_message_is_a_change() {
        let first = SyncSnapshot::error("timed out", at());
        let same = SyncSnapshot::error("timed out", at());
        let other = SyncSnapshot::error("bad json", at());

        assert!(!same.differs_from(&first));
        assert!(other.differs_from(&first));
    }

    #[test]
    fn test_transfers_sum_into_pending() {
        let snapshot = SyncSnapshot::new(SyncState::Syncing, at()).with_transfers(2, 3);
        assert_eq!(snapshot.uploading(), Some(2));
        assert_eq!(snapshot.downloading(), Some(3));
        assert_eq!(snapshot.files_pending(), Some(5));
    }

    #[test]
    fn test_quota_warning() {
        let nearly_full = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(95), Some(100));
        assert!(nearly_full.quota_warning(DEFAULT_QUOTA_WARNING_PERCENT));

        let roomy = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(10), Some(100));
        assert!(!roomy.quota_warning(DEFAULT_QUOTA_WARNING_PERCENT));

        let unknown = SyncSnapshot::new(SyncState::Idle, at()).with_usage(Some(10), Some(0));
        assert!(unknown.usage_percent().is_none());
        assert!(!unknown.quota_warning(DEFAULT_QUOTA_WARNING_PERCENT));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SyncState::Syncing.to_string(), "syncing");
        assert!(SyncState::Syncing.is_active());
        assert!(!SyncState::Paused.is_active());
    }
}
