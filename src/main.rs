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

//! Jotta Cloud status widget.
//!
//! Runs a [`StatusMonitor`] against `jotta-cli` and reports every change on the
//! main task. The monitor thread hands snapshots over through a channel, so
//! nothing here runs on the polling thread.

mod alerts;
mod config;
mod summary;

use std::error::Error;
use std::path::Path;

use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use mimalloc::MiMalloc;
use sync_monitor::{JottaCli, SourceError, StatusMonitor, SyncSnapshot};

use crate::alerts::{Alert, AlertTracker};
use crate::config::{AppConfig, NotificationConfig};
use crate::summary::summary_lines;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Jotta Cloud sync status widget
#[derive(Parser, Debug)]
#[command(name = "jotta-tray", version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Load configuration from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Monitor the daemon and report status changes (default)
    Watch,
    /// Query the daemon once and print its status
    Status,
    /// Pause backup and sync
    Pause,
    /// Resume backup and sync
    Resume,
    /// Print the daemon log file location
    Logfile,
    /// Print the configuration file location
    ConfigPath,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    debug!("Debug logging enabled");
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, confy::ConfyError> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.debug);

    let command = args.command.unwrap_or(Command::Watch);
    if command == Command::ConfigPath {
        println!("{}", AppConfig::get_config_path()?.display());
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    let cli = JottaCli::new(config.cli_config());

    match command {
        Command::Watch => watch(cli, config).await,
        Command::Status => {
            let snapshot = blocking(move || cli.status()).await?;
            println!("Jotta Cloud: {}", snapshot.state());
            for line in summary_lines(&snapshot) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Pause => Ok(blocking(move || cli.pause()).await?),
        Command::Resume => Ok(blocking(move || cli.resume()).await?),
        Command::Logfile => {
            match blocking(move || cli.logfile()).await? {
                Some(path) => println!("{}", path.display()),
                None => warn!("No log file reported by jotta-cli"),
            }
            Ok(())
        }
        Command::ConfigPath => Ok(()),
    }
}

/// Run a blocking `jotta-cli` call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, Box<dyn Error>>
where
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

async fn watch(cli: JottaCli, config: AppConfig) -> Result<(), Box<dyn Error>> {
    info!("Starting Jotta Cloud Tray Widget");

    let probe = cli.clone();
    match tokio::task::spawn_blocking(move || probe.status()).await? {
        Err(SourceError::NotFound(program)) => {
            error!("{program} not found in PATH");
            return Err(format!(
                "{program} is not installed or not in PATH; install Jotta CLI before using this widget"
            )
            .into());
        }
        Err(SourceError::Unreachable(_)) => {
            // The widget shows the offline state until the daemon comes up.
            warn!("jotta-cli is available but the daemon is offline");
        }
        Err(e) => warn!("Initial status query failed: {e}"),
        Ok(_) => debug!("jotta-cli is available"),
    }

    let monitor = StatusMonitor::new(cli, config.monitor_config());
    let (_subscription, mut updates) = monitor.subscribe_channel();
    monitor.start()?;
    info!("Application started successfully");

    let mut alerts = AlertTracker::new();
    let mut signals = Signals::new()?;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(snapshot) => {
                    report(&mut alerts, &snapshot, &config.notifications);
                }
                None => break,
            },
            signal = signals.next() => match signal {
                Signal::Shutdown => {
                    info!("Received shutdown signal, shutting down...");
                    break;
                }
                Signal::Refresh => {
                    info!("Refreshing status");
                    monitor.force_refresh();
                }
                Signal::TogglePause => {
                    if monitor.is_paused() {
                        monitor.resume();
                    } else {
                        monitor.pause();
                    }
                }
            },
        }
    }

    // Joining waits for an in-flight query, which may take up to its timeout.
    tokio::task::spawn_blocking(move || monitor.stop()).await?;
    info!("Shutdown complete");
    Ok(())
}

fn report(alerts: &mut AlertTracker, snapshot: &SyncSnapshot, notifications: &NotificationConfig) {
    info!(
        "Jotta Cloud: {} | {}",
        snapshot.state(),
        summary_lines(snapshot).join(" | ")
    );

    for alert in alerts.observe(snapshot, notifications) {
        match alert {
            Alert::SyncComplete => info!("{alert}"),
            Alert::DaemonOffline | Alert::QuotaWarning { .. } => warn!("{alert}"),
        }
    }
}

/// Process signals the widget reacts to.
#[cfg_attr(
    not(unix),
    allow(dead_code, reason = "only shutdown is delivered off unix")
)]
enum Signal {
    Shutdown,
    /// SIGUSR1: poll now.
    Refresh,
    /// SIGUSR2: pause or resume polling.
    TogglePause,
}

#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    refresh: tokio::signal::unix::Signal,
    toggle: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            refresh: signal(SignalKind::user_defined1())?,
            toggle: signal(SignalKind::user_defined2())?,
        })
    }

    async fn next(&mut self) -> Signal {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => Signal::Shutdown,
            _ = self.terminate.recv() => Signal::Shutdown,
            _ = self.refresh.recv() => Signal::Refresh,
            _ = self.toggle.recv() => Signal::TogglePause,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    #[allow(clippy::unnecessary_wraps, reason = "matches the unix constructor")]
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> Signal {
        let _ = tokio::signal::ctrl_c().await;
        Signal::Shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_watch() {
        let args = Args::try_parse_from(["jotta-tray", "--debug"]).unwrap();
        assert!(args.debug);
        assert_eq!(args.command.unwrap_or(Command::Watch), Command::Watch);

        let args = Args::try_parse_from(["jotta-tray", "config-path"]).unwrap();
        assert_eq!(args.command, Some(Command::ConfigPath));
    }
}
