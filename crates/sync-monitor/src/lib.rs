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

//! Status polling and change notification for desktop sync widgets.
//!
//! This library mirrors the state of an external sync daemon for a consumer
//! such as a tray icon. It is split into layers that can be used on their own:
//!
//! - **Snapshot layer**: [`SyncSnapshot`] values and the change rule used to
//!   decide whether an observation is worth reporting
//! - **Source layer**: the [`StatusSource`] contract, result classification,
//!   and [`JottaCli`], a source backed by the `jotta-cli` tool
//! - **Monitor layer**: [`StatusMonitor`], which polls a source on a background
//!   thread at an interval adapted to the daemon state and notifies observers
//!
//! # Quick Start
//!
//! ```no_run
//! use sync_monitor::{JottaCli, MonitorConfig, StatusMonitor, SyncSnapshot};
//!
//! let monitor = StatusMonitor::new(JottaCli::default(), MonitorConfig::default());
//!
//! // Observers run on the monitor thread and must return quickly.
//! monitor.subscribe(|snapshot: SyncSnapshot| {
//!     println!("sync state is now {}", snapshot.state());
//! });
//!
//! monitor.start().expect("monitor thread");
//! // ...
//! monitor.stop();
//! ```
//!
//! # Handing Updates to Another Thread
//!
//! Consumers with their own event loop should take updates through a channel
//! instead of doing work inside the callback:
//!
//! ```no_run
//! # use sync_monitor::{JottaCli, MonitorConfig, StatusMonitor};
//! # async fn example() {
//! let monitor = StatusMonitor::new(JottaCli::default(), MonitorConfig::default());
//! let (_handle, mut updates) = monitor.subscribe_channel();
//! monitor.start().expect("monitor thread");
//!
//! while let Some(snapshot) = updates.recv().await {
//!     println!("{}", snapshot.state());
//! }
//! # }
//! ```

pub mod cli;
pub mod format;
pub mod monitor;
pub mod observer;
pub mod policy;
pub mod snapshot;
pub mod source;

pub use cli::{CliConfig, JottaCli};
pub use monitor::{MonitorConfig, MonitorError, StatusMonitor};
pub use observer::{ChannelObserver, ObserverRegistry, StatusObserver, SubscriptionHandle};
pub use policy::PollIntervals;
pub use snapshot::{SyncSnapshot, SyncState, DEFAULT_QUOTA_WARNING_PERCENT};
pub use source::{Classification, SourceError, StatusSource};
