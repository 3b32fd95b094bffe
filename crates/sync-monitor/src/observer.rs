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

//! Observer registration and dispatch.
//!
//! Observers run on the monitor's own thread. They must return quickly: either
//! do trivial work or hand the snapshot to their own execution context (a UI
//! event queue, a channel) and return. A blocked observer stalls all polling.
//! [`ChannelObserver`] is the ready-made handoff.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error};
use tokio::sync::mpsc;

use crate::snapshot::SyncSnapshot;

/// Consumer of sync state changes.
pub trait StatusObserver: Send + Sync {
    /// Called once per meaningful change, with the new snapshot by value.
    fn on_status_changed(&self, snapshot: SyncSnapshot);
}

impl<F> StatusObserver for F
where
    F: Fn(SyncSnapshot) + Send + Sync,
{
    fn on_status_changed(&self, snapshot: SyncSnapshot) {
        self(snapshot);
    }
}

/// Handle returned by subscribe, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observer that forwards snapshots into an unbounded channel.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncSnapshot>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<SyncSnapshot>) -> Self {
        Self { tx }
    }

    /// Create an observer together with the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl StatusObserver for ChannelObserver {
    fn on_status_changed(&self, snapshot: SyncSnapshot) {
        if self.tx.send(snapshot).is_err() {
            debug!("Status receiver dropped, discarding update");
        }
    }
}

/// Registered observer paired with its handle.
pub(crate) type Registered = (SubscriptionHandle, Arc<dyn StatusObserver>);

/// Ordered set of observers.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Registered>,
    next_id: u64,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer at the end of the dispatch order.
    pub fn subscribe(&mut self, observer: Arc<dyn StatusObserver>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;
        self.observers.push((handle, observer));
        handle
    }

    /// Remove an observer. Returns false if the handle was not registered.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(h, _)| *h != handle);
        self.observers.len() != before
    }

    /// Stable copy of the current observers, in subscription order.
    #[must_use]
    pub(crate) fn snapshot(&self) -> Vec<Registered> {
        self.observers.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Deliver `snapshot` to every observer in order.
///
/// A panicking observer is logged and skipped; the rest of the round still runs.
pub(crate) fn dispatch(observers: &[Registered], snapshot: &SyncSnapshot) {
    for (handle, observer) in observers {
        let delivery = snapshot.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            observer.on_status_changed(delivery);
        }));
        if result.is_err() {
            error!("Observer {handle} panicked while handling a status update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SyncState;
    use chrono::Utc;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Arc<dyn StatusObserver> {
        let log = Arc::clone(log);
        Arc::new(move |_snapshot: SyncSnapshot| log.lock().unwrap().push(name))
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.subscribe(recorder(&log, "first"));
        registry.subscribe(recorder(&log, "second"));
        registry.subscribe(recorder(&log, "third"));

        dispatch(
            &registry.snapshot(),
            &SyncSnapshot::new(SyncState::Idle, Utc::now()),
        );

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_by_handle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        let first = registry.subscribe(recorder(&log, "first"));
        registry.subscribe(recorder(&log, "second"));

        assert!(registry.unsubscribe(first));
        assert!(!registry.unsubscribe(first));
        assert_eq!(registry.len(), 1);

        dispatch(
            &registry.snapshot(),
            &SyncSnapshot::new(SyncState::Idle, Utc::now()),
        );
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_panicking_observer_does_not_stop_round() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.subscribe(Arc::new(|_snapshot: SyncSnapshot| panic!("observer failure")));
        registry.subscribe(recorder(&log, "after"));

        dispatch(
            &registry.snapshot(),
            &SyncSnapshot::new(SyncState::Idle, Utc::now()),
        );
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_status_changed(SyncSnapshot::new(SyncState::Syncing, Utc::now()));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.state(), SyncState::Syncing);
    }
}
