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

//! Status source contract and result classification.
//!
//! A [`StatusSource`] performs one blocking query against the sync daemon. The
//! monitor never calls a source twice concurrently, and it enforces its own
//! timeout around each call.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::snapshot::SyncSnapshot;

/// Errors a status query can produce.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The daemon could not be contacted. Treated as the offline steady state.
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    #[error("status query timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// The source produced output that could not be interpreted.
    #[error("unexpected status output: {0}")]
    Protocol(String),

    #[error("status command failed: {0}")]
    Command(String),

    /// A timed-out query has not returned yet, so no new query was issued.
    #[error("previous status query is still running")]
    Stalled,

    /// The status tool itself is missing.
    #[error("status tool not found: {0}")]
    NotFound(String),
}

/// A synchronous query for the current sync state.
///
/// Implementations must return a snapshot whose state is not `Offline`;
/// an unreachable daemon is reported as [`SourceError::Unreachable`].
pub trait StatusSource: Send + Sync {
    fn query(&self) -> Result<SyncSnapshot, SourceError>;
}

impl<F> StatusSource for F
where
    F: Fn() -> Result<SyncSnapshot, SourceError> + Send + Sync,
{
    fn query(&self) -> Result<SyncSnapshot, SourceError> {
        self()
    }
}

/// Outcome of one poll, used to pick the next interval.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success(SyncSnapshot),
    Offline,
    Error(String),
}

impl Classification {
    /// Classify a raw query result.
    #[must_use]
    pub fn from_result(result: Result<SyncSnapshot, SourceError>) -> Self {
        match result {
            Ok(snapshot) => Self::Success(snapshot),
            Err(SourceError::Unreachable(_)) => Self::Offline,
            Err(SourceError::Protocol(raw)) => Self::Error(raw),
            Err(err) => Self::Error(err.to_string()),
        }
    }

    /// The snapshot delivered to observers for this outcome.
    #[must_use]
    pub fn into_snapshot(self, observed_at: DateTime<Utc>) -> SyncSnapshot {
        match self {
            Self::Success(snapshot) => snapshot,
            Self::Offline => SyncSnapshot::offline(observed_at),
            Self::Error(message) => SyncSnapshot::error(message, observed_at),
        }
    }
}
