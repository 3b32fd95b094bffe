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

//! Human-readable formatting for byte counts, quotas and transfer rates.

const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
const RATE_UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];

fn scale(value: f64, units: &[&str]) -> String {
    let mut value = value;
    let mut unit = 0;

    while value >= 1024.0 && unit < units.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", value.trunc(), units[0])
    } else {
        format!("{value:.1} {}", units[unit])
    }
}

/// Format a byte count using binary units, e.g. `1.5 KB` or `45.2 GB`.
#[must_use]
#[allow(clippy::cast_precision_loss, reason = "display only")]
pub fn format_bytes(bytes: u64) -> String {
    scale(bytes as f64, &BYTE_UNITS)
}

/// Format storage usage as `"used / total (pct%)"` with the raw percentage.
///
/// Returns `("Unknown quota", 0.0)` when the total is zero.
#[must_use]
#[allow(clippy::cast_precision_loss, reason = "display only")]
pub fn format_quota(used: u64, total: u64) -> (String, f64) {
    if total == 0 {
        return ("Unknown quota".to_string(), 0.0);
    }

    let percent = used as f64 / total as f64 * 100.0;
    let text = format!(
        "{} / {} ({percent:.0}%)",
        format_bytes(used),
        format_bytes(total)
    );
    (text, percent)
}

/// Format a transfer rate in bytes per second. Negative rates show as `0 B/s`.
#[must_use]
#[allow(clippy::cast_precision_loss, reason = "display only")]
pub fn format_transfer_rate(bytes_per_second: i64) -> String {
    if bytes_per_second < 0 {
        return "0 B/s".to_string();
    }
    scale(bytes_per_second as f64, &RATE_UNITS)
}

/// `"1 file"` or `"N files"`.
#[must_use]
pub fn format_file_count(count: u64) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{count} files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_073_741_824), "1.0 GB");
    }

    #[test]
    fn test_format_quota() {
        let (text, percent) = format_quota(48_318_382_080, 107_374_182_400);
        assert_eq!(text, "45.0 GB / 100.0 GB (45%)");
        assert!((percent - 45.0).abs() < 0.01);

        assert_eq!(format_quota(10, 0), ("Unknown quota".to_string(), 0.0));
    }

    #[test]
    fn test_format_transfer_rate() {
        assert_eq!(format_transfer_rate(1_048_576), "1.0 MB/s");
        assert_eq!(format_transfer_rate(204_800), "200.0 KB/s");
        assert_eq!(format_transfer_rate(-5), "0 B/s");
    }

    #[test]
    fn test_format_file_count() {
        assert_eq!(format_file_count(1), "1 file");
        assert_eq!(format_file_count(0), "0 files");
        assert_eq!(format_file_count(42), "42 files");
    }
}
