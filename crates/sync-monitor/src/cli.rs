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

//! `jotta-cli` status source.
//!
//! Runs `jotta-cli status --json` and maps its output onto a [`SyncSnapshot`].
//! Also wraps the daemon controls the widget exposes (pause, resume, log file).

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::snapshot::{SyncSnapshot, SyncState};
use crate::source::{SourceError, StatusSource};

/// Default status tool, looked up on `PATH`.
pub const DEFAULT_PROGRAM: &str = "jotta-cli";
/// Default per-command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for invoking the status tool.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path or name of the executable.
    pub program: String,
    /// Maximum run time for one command before it is killed.
    pub timeout: Duration,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Output of a finished command.
#[derive(Debug)]
struct CommandOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

// Subset of `jotta-cli status --json`. Every key is optional, and the daemon
// writes empty sections and maps as `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct StatusReport {
    #[serde(deserialize_with = "null_as_default")]
    user: UserSection,
    #[serde(deserialize_with = "null_as_default")]
    sync: SyncSection,
    #[serde(deserialize_with = "null_as_default")]
    state: StateSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct UserSection {
    #[serde(deserialize_with = "null_as_default")]
    account_info: AccountInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct AccountInfo {
    usage: Option<u64>,
    capacity: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SyncSection {
    /// Missing means enabled.
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct StateSection {
    #[serde(deserialize_with = "null_as_default")]
    uploading: HashMap<String, serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    downloading: HashMap<String, serde_json::Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse `status --json` output into a snapshot.
pub fn parse_status(json: &str) -> Result<SyncSnapshot, SourceError> {
    let report: StatusReport =
        serde_json::from_str(json).map_err(|e| SourceError::Protocol(e.to_string()))?;

    let uploading = report.state.uploading.len() as u64;
    let downloading = report.state.downloading.len() as u64;

    let state = if !report.sync.enabled.unwrap_or(true) {
        SyncState::Paused
    } else if uploading > 0 || downloading > 0 {
        SyncState::Syncing
    } else {
        SyncState::Idle
    };

    let account = report.user.account_info;
    Ok(SyncSnapshot::new(state, Utc::now())
        .with_usage(account.usage, account.capacity)
        .with_transfers(uploading, downloading))
}

fn is_offline_message(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("connection refused") || lower.contains("not running")
}

/// Handle to the `jotta-cli` tool.
#[derive(Debug, Clone, Default)]
pub struct JottaCli {
    config: CliConfig,
}

impl JottaCli {
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Query the daemon status.
    pub fn status(&self) -> Result<SyncSnapshot, SourceError> {
        let output = self.run(&["status", "--json"])?;

        if !output.status.success() {
            let stderr = output.stderr.trim();
            if is_offline_message(stderr) {
                return Err(SourceError::Unreachable(stderr.to_string()));
            }
            return Err(SourceError::Command(stderr.to_string()));
        }

        let snapshot = parse_status(&output.stdout).inspect_err(|e| {
            debug!("Raw status output: {}", output.stdout);
            warn!("Failed to parse status output: {e}");
        })?;
        debug!("Status retrieved: {}", snapshot.state());
        Ok(snapshot)
    }

    /// Pause backup and sync.
    pub fn pause(&self) -> Result<(), SourceError> {
        self.run_checked(&["pause"])?;
        info!("Backup paused");
        Ok(())
    }

    /// Resume backup and sync.
    pub fn resume(&self) -> Result<(), SourceError> {
        self.run_checked(&["resume"])?;
        info!("Backup resumed");
        Ok(())
    }

    /// Location of the daemon log file, if it exists.
    pub fn logfile(&self) -> Result<Option<PathBuf>, SourceError> {
        let output = self.run_checked(&["logfile"])?;
        let Some(line) = output.stdout.lines().next().map(str::trim) else {
            return Ok(None);
        };

        let path = PathBuf::from(line);
        if !line.is_empty() && path.exists() {
            Ok(Some(path))
        } else {
            warn!("Log file not found at: {line}");
            Ok(None)
        }
    }

    /// Whether the tool is installed and the daemon answers.
    ///
    /// Other failures mean the tool exists, so they count as available.
    #[must_use]
    pub fn check_available(&self) -> bool {
        match self.status() {
            Ok(_) => true,
            Err(SourceError::NotFound(_) | SourceError::Unreachable(_)) => false,
            Err(e) => {
                debug!("Status tool present but query failed: {e}");
                true
            }
        }
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, SourceError> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(SourceError::Command(format!(
                "{} {}: {}",
                self.config.program,
                args.join(" "),
                output.stderr.trim()
            )))
        }
    }

    /// Run a command, killing it if it exceeds the configured timeout.
    ///
    /// Callers are synchronous, so each command gets its own small runtime.
    fn run(&self, args: &[&str]) -> Result<CommandOutput, SourceError> {
        debug!("Running command: {} {}", self.config.program, args.join(" "));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SourceError::Command(format!("failed to create command runtime: {e}")))?;

        runtime.block_on(self.run_async(args))
    }

    async fn run_async(&self, args: &[&str]) -> Result<CommandOutput, SourceError> {
        let mut child = Command::new(&self.config.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => SourceError::NotFound(self.config.program.clone()),
                _ => SourceError::Command(e.to_string()),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = async {
            // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
            let (stdout, stderr, status) =
                tokio::join!(read_pipe(stdout), read_pipe(stderr), child.wait());
            status.map(|status| CommandOutput {
                status,
                stdout,
                stderr,
            })
        };
        let result = tokio::time::timeout(self.config.timeout, finished).await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(SourceError::Command(e.to_string())),
            Err(_elapsed) => {
                warn!(
                    "Command timed out after {}s, killing it",
                    self.config.timeout.as_secs_f32()
                );
                // Kills and reaps so the process does not linger as a zombie.
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out command: {e}");
                }
                Err(SourceError::Timeout(self.config.timeout))
            }
        }
    }
}

impl StatusSource for JottaCli {
    fn query(&self) -> Result<SyncSnapshot, SourceError> {
        self.status()
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_string(&mut buf).await {
            debug!("Failed to read command output: {e}");
        }
    }
    buf
}
