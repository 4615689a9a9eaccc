//! Connectivity tracking.
//!
//! The monitor holds nothing platform-specific: the embedding shell feeds
//! transitions in through [`NetworkStatusMonitor::set_online`] and interested
//! parties subscribe. `SyncManager` wires the reconnect trigger that drains a
//! queued sync.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;

/// Handle returned by [`NetworkStatusMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSubscription(u64);

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

pub struct NetworkStatusMonitor {
    online: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
}

impl NetworkStatusMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feeds a connectivity reading. Listeners are notified only on an
    /// actual transition, not on repeated readings of the same status.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }
        info!(
            "[NetworkMonitor] Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        let listeners: Vec<Listener> = self.lock().values().cloned().collect();
        for listener in listeners {
            listener(online);
        }
    }

    /// Registers a listener and immediately replays the current status to it,
    /// so subscribers never start with a stale view.
    pub fn subscribe(&self, listener: impl Fn(bool) + Send + Sync + 'static) -> NetworkSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let listener: Listener = Arc::new(listener);
        listener(self.is_online());
        self.lock().insert(id, listener);
        NetworkSubscription(id)
    }

    pub fn unsubscribe(&self, subscription: NetworkSubscription) -> bool {
        self.lock().remove(&subscription.0).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NetworkStatusMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[test]
    fn subscribe_replays_current_status() {
        let monitor = NetworkStatusMonitor::new(false);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.subscribe(move |online| sink.lock().unwrap().push(online));

        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn notifies_only_on_transitions() {
        let monitor = NetworkStatusMonitor::new(true);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        // replay
        assert_eq!(count.load(Ordering::SeqCst), 1);

        monitor.set_online(true); // no transition
        monitor.set_online(false);
        monitor.set_online(false); // no transition
        monitor.set_online(true);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(monitor.is_online());
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let monitor = NetworkStatusMonitor::new(true);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let subscription = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(monitor.unsubscribe(subscription));
        monitor.set_online(false);
        assert_eq!(count.load(Ordering::SeqCst), 1); // replay only
    }
}
