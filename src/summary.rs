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

//! Human-readable status text, equivalent to the tray tooltip.

use sync_monitor::format::{format_file_count, format_quota, format_transfer_rate};
use sync_monitor::{SyncSnapshot, SyncState};

/// Lines describing a snapshot: storage first, then the state.
#[must_use]
pub fn summary_lines(snapshot: &SyncSnapshot) -> Vec<String> {
    let storage = match (snapshot.bytes_used(), snapshot.bytes_quota()) {
        (Some(used), Some(quota)) => format_quota(used, quota).0,
        _ => "Unknown quota".to_string(),
    };

    let mut lines = vec![format!("Storage: {storage}")];

    match snapshot.state() {
        SyncState::Syncing => {
            let uploading = snapshot.uploading().unwrap_or(0);
            let downloading = snapshot.downloading().unwrap_or(0);
            if uploading > 0 {
                lines.push(format!("Uploading {}", format_file_count(uploading)));
            }
            if downloading > 0 {
                lines.push(format!("Downloading {}", format_file_count(downloading)));
            }
            if uploading == 0 && downloading == 0 {
                lines.push(match snapshot.files_pending() {
                    Some(pending) => format!("Syncing {}", format_file_count(pending)),
                    None => "Syncing".to_string(),
                });
            }
            if let Some(rate) = snapshot.transfer_rate() {
                lines.push(format!("Speed: {}", format_transfer_rate(rate)));
            }
        }
        SyncState::Idle => lines.push("All backed up".to_string()),
        SyncState::Paused => lines.push("Backup paused".to_string()),
        SyncState::Error => lines.push(match snapshot.error_message() {
            Some(message) => format!("Sync error: {message}"),
            None => "Sync error".to_string(),
        }),
        SyncState::Offline => lines.push("Daemon offline".to_string()),
    }

    lines
}
