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

//! Background status polling with change notification.
//!
//! [`StatusMonitor`] owns one dedicated thread running a small tokio runtime.
//! That thread is the only writer of the monitor state: it queries the
//! [`StatusSource`], picks the next interval from the result, and notifies
//! observers when the snapshot changed. Control calls from other threads go
//! through a channel and a cancellation token, so none of them block for long.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::observer::{dispatch, ChannelObserver, ObserverRegistry, StatusObserver, SubscriptionHandle};
use crate::policy::PollIntervals;
use crate::snapshot::{SyncSnapshot, SyncState};
use crate::source::{Classification, SourceError, StatusSource};

/// Default bound on a single status query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for a stuck blocking query before abandoning it.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "status-monitor";

/// Errors returned by [`StatusMonitor::start`].
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("status monitor is already running")]
    AlreadyRunning,

    /// The background thread or its runtime could not be created.
    #[error("failed to start status monitor: {0}")]
    Startup(#[from] io::Error),
}

/// Monitor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub intervals: PollIntervals,
    /// Upper bound on one status query.
    pub query_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            intervals: PollIntervals::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Refresh,
    Pause,
    Resume,
}

/// Values the poll loop publishes for readers on other threads.
#[derive(Debug, Clone)]
struct Published {
    snapshot: Option<SyncSnapshot>,
    interval: Duration,
    paused: bool,
}

/// State owned by the poll loop.
#[derive(Debug)]
struct MonitorState {
    last_snapshot: Option<SyncSnapshot>,
    current_interval: Duration,
    paused: bool,
}

impl MonitorState {
    fn new(initial_interval: Duration) -> Self {
        Self {
            last_snapshot: None,
            current_interval: initial_interval,
            paused: false,
        }
    }

    /// Fold one poll outcome into the state.
    ///
    /// Returns the snapshot to deliver when it differs from the last one, or
    /// when nothing was known before.
    fn record(
        &mut self,
        classification: Classification,
        intervals: &PollIntervals,
        observed_at: DateTime<Utc>,
    ) -> Option<SyncSnapshot> {
        let next = intervals.next_interval(&classification);
        if next != self.current_interval {
            debug!(
                "Adjusting polling interval: {}s -> {}s",
                self.current_interval.as_secs_f32(),
                next.as_secs_f32()
            );
            self.current_interval = next;
        }

        let snapshot = classification.into_snapshot(observed_at);
        let changed = match &self.last_snapshot {
            Some(previous) => snapshot.differs_from(previous),
            None => true,
        };

        // Stored every poll so observed_at stays current for readers.
        self.last_snapshot = Some(snapshot.clone());
        changed.then_some(snapshot)
    }

    /// Classification for a poll skipped because a query is still running.
    ///
    /// An existing error is repeated so one stuck query is reported once.
    fn stalled(&self) -> Classification {
        match &self.last_snapshot {
            Some(last) if last.state() == SyncState::Error => {
                Classification::Error(last.error_message().unwrap_or_default().to_string())
            }
            _ => Classification::from_result(Err(SourceError::Stalled)),
        }
    }

    fn published(&self) -> Published {
        Published {
            snapshot: self.last_snapshot.clone(),
            interval: self.current_interval,
            paused: self.paused,
        }
    }
}

/// Why the loop woke from its interval sleep.
enum Wake {
    Elapsed,
    Refresh,
    Cancelled,
}

/// The polling task. Runs on the monitor thread.
struct PollLoop {
    source: Arc<dyn StatusSource>,
    config: MonitorConfig,
    observers: Arc<Mutex<ObserverRegistry>>,
    published: Arc<watch::Sender<Published>>,
    in_flight: Arc<AtomicBool>,
    cancel: CancellationToken,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl PollLoop {
    async fn run(mut self) {
        debug!("Monitor loop started");

        let mut state = MonitorState::new(self.config.intervals.idle);

        while !self.cancel.is_cancelled() {
            if state.paused {
                if self.wait_for_resume(&mut state).await {
                    continue;
                }
                break;
            }

            let result = self.query().await;

            // Refreshes requested while the query ran are dropped.
            while let Ok(control) = self.control_rx.try_recv() {
                self.apply(control, &mut state);
            }

            if self.cancel.is_cancelled() {
                break;
            }

            let classification = match result {
                Err(SourceError::Stalled) => state.stalled(),
                result => Classification::from_result(result),
            };
            let changed = state.record(classification, &self.config.intervals, Utc::now());
            self.published.send_replace(state.published());

            if let Some(snapshot) = changed {
                info!("Status changed: {}", snapshot.state());
                let observers = lock(&self.observers).snapshot();
                dispatch(&observers, &snapshot);
            }

            if state.paused {
                continue;
            }

            match self.sleep(&mut state).await {
                Wake::Elapsed => {}
                Wake::Refresh => debug!("Refresh requested, polling now"),
                Wake::Cancelled => break,
            }
        }

        debug!("Monitor loop exited");
    }

    /// Run one query on the blocking pool, bounded by the configured timeout.
    ///
    /// A query that outlives its timeout keeps the in-flight flag until it
    /// returns, so no second query starts alongside it, even across restarts.
    async fn query(&self) -> Result<SyncSnapshot, SourceError> {
        let Some(guard) = InFlight::acquire(&self.in_flight) else {
            warn!("Previous status query still running, skipping this poll");
            return Err(SourceError::Stalled);
        };

        let source = Arc::clone(&self.source);
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            source.query()
        });

        match tokio::time::timeout(self.config.query_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!("Status query panicked: {join_error}");
                Err(SourceError::Command(format!("status query panicked: {join_error}")))
            }
            Err(_elapsed) => {
                warn!(
                    "Status query timed out after {}s",
                    self.config.query_timeout.as_secs_f32()
                );
                Err(SourceError::Timeout(self.config.query_timeout))
            }
        }
    }

    /// Sleep for the current interval unless refreshed, paused or cancelled.
    async fn sleep(&mut self, state: &mut MonitorState) -> Wake {
        let sleep = tokio::time::sleep(state.current_interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return Wake::Elapsed,
                () = self.cancel.cancelled() => return Wake::Cancelled,
                control = self.control_rx.recv() => match control {
                    Some(Control::Refresh) => return Wake::Refresh,
                    Some(control) => {
                        self.apply(control, state);
                        if state.paused {
                            // Back to the top of the loop, which parks until resumed.
                            return Wake::Elapsed;
                        }
                    }
                    None => return Wake::Cancelled,
                },
            }
        }
    }

    /// Park until resumed. Returns false if the loop should exit.
    async fn wait_for_resume(&mut self, state: &mut MonitorState) -> bool {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return false,
                control = self.control_rx.recv() => match control {
                    Some(Control::Refresh) => debug!("Monitor paused, ignoring refresh"),
                    Some(control) => {
                        self.apply(control, state);
                        if !state.paused {
                            return true;
                        }
                    }
                    None => return false,
                },
            }
        }
    }

    fn apply(&self, control: Control, state: &mut MonitorState) {
        match control {
            Control::Refresh => {}
            Control::Pause if !state.paused => {
                info!("Status polling paused");
                state.paused = true;
            }
            Control::Resume if state.paused => {
                info!("Status polling resumed");
                state.paused = false;
            }
            Control::Pause | Control::Resume => return,
        }
        self.published.send_replace(state.published());
    }
}

/// Holds the shared in-flight flag for one source call.
///
/// Dropped when the call returns or unwinds, or when the blocking task is
/// discarded before it runs.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Worker {
    cancel: CancellationToken,
    control_tx: mpsc::UnboundedSender<Control>,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }

    fn send(&self, control: Control) {
        if self.control_tx.send(control).is_err() {
            debug!("Monitor loop has exited, dropping {control:?}");
        }
    }
}

/// Polls a [`StatusSource`] in the background and notifies observers on change.
///
/// All methods take `&self` and may be called from any thread, including from
/// inside an observer callback.
pub struct StatusMonitor {
    source: Arc<dyn StatusSource>,
    config: MonitorConfig,
    observers: Arc<Mutex<ObserverRegistry>>,
    published: Arc<watch::Sender<Published>>,
    in_flight: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for StatusMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusMonitor")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("observers", &lock(&self.observers).len())
            .finish_non_exhaustive()
    }
}

impl StatusMonitor {
    /// Create a stopped monitor for `source`.
    #[must_use]
    pub fn new(source: impl StatusSource + 'static, config: MonitorConfig) -> Self {
        Self::with_shared_source(Arc::new(source), config)
    }

    /// Create a stopped monitor over an already shared source.
    #[must_use]
    pub fn with_shared_source(source: Arc<dyn StatusSource>, config: MonitorConfig) -> Self {
        let (published, _) = watch::channel(Published {
            snapshot: None,
            interval: config.intervals.idle,
            paused: false,
        });

        Self {
            source,
            config,
            observers: Arc::new(Mutex::new(ObserverRegistry::new())),
            published: Arc::new(published),
            in_flight: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Launch the background poll loop.
    ///
    /// Fails with [`MonitorError::AlreadyRunning`] if the loop is active, and
    /// with [`MonitorError::Startup`] if the thread or runtime cannot be created.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut worker = lock(&self.worker);
        if worker.as_ref().is_some_and(Worker::is_alive) {
            warn!("StatusMonitor already running");
            return Err(MonitorError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let cancel = CancellationToken::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        self.published.send_replace(Published {
            snapshot: None,
            interval: self.config.intervals.idle,
            paused: false,
        });

        let poll_loop = PollLoop {
            source: Arc::clone(&self.source),
            config: self.config,
            observers: Arc::clone(&self.observers),
            published: Arc::clone(&self.published),
            in_flight: Arc::clone(&self.in_flight),
            cancel: cancel.clone(),
            control_rx,
        };

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                runtime.block_on(poll_loop.run());
                // Don't wait on a query stuck past its timeout.
                runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
            })?;

        *worker = Some(Worker {
            cancel,
            control_tx,
            thread,
        });

        info!("StatusMonitor started");
        Ok(())
    }

    /// Stop the poll loop and wait for the background thread to exit.
    ///
    /// An in-flight query is allowed to finish (bounded by the query timeout)
    /// and its result is discarded. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };

        info!("Stopping StatusMonitor...");
        worker.cancel.cancel();

        if worker.thread.thread().id() == thread::current().id() {
            // Called from an observer; the loop exits once the callback returns.
            debug!("stop() called on the monitor thread, not joining");
            return;
        }

        if worker.thread.join().is_err() {
            error!("StatusMonitor thread panicked");
        }
        info!("StatusMonitor stopped");
    }

    /// Poll now instead of waiting out the current interval.
    ///
    /// Does nothing if a query is already in flight or the monitor is stopped.
    pub fn force_refresh(&self) {
        if self.in_flight.load(Ordering::Acquire) {
            debug!("Status query in flight, ignoring refresh");
            return;
        }
        if let Some(worker) = lock(&self.worker).as_ref() {
            worker.send(Control::Refresh);
        }
    }

    /// Suspend polling without stopping the loop.
    pub fn pause(&self) {
        if let Some(worker) = lock(&self.worker).as_ref() {
            worker.send(Control::Pause);
        }
    }

    /// Resume polling after [`pause`](Self::pause); the next poll runs immediately.
    pub fn resume(&self) {
        if let Some(worker) = lock(&self.worker).as_ref() {
            worker.send(Control::Resume);
        }
    }

    /// Register an observer. It is called on the monitor thread for every change.
    pub fn subscribe(&self, observer: impl StatusObserver + 'static) -> SubscriptionHandle {
        let handle = lock(&self.observers).subscribe(Arc::new(observer));
        debug!("Registered observer {handle}");
        handle
    }

    /// Register a channel observer and return its receiving end.
    ///
    /// This is the handoff for consumers with their own event loop: they read
    /// snapshots from the receiver on their own thread.
    pub fn subscribe_channel(
        &self,
    ) -> (SubscriptionHandle, mpsc::UnboundedReceiver<SyncSnapshot>) {
        let (observer, rx) = ChannelObserver::channel();
        (self.subscribe(observer), rx)
    }

    /// Remove an observer. Returns false if the handle is unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = lock(&self.observers).unsubscribe(handle);
        if removed {
            debug!("Unregistered observer {handle}");
        }
        removed
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.worker).as_ref().is_some_and(Worker::is_alive)
    }

    /// Whether polling is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.published.borrow().paused
    }

    /// Most recent snapshot, or `None` before the first poll completes.
    #[must_use]
    pub fn last_snapshot(&self) -> Option<SyncSnapshot> {
        self.published.borrow().snapshot.clone()
    }

    /// Interval the loop will wait before its next poll.
    #[must_use]
    pub fn current_interval(&self) -> Duration {
        self.published.borrow().interval
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
