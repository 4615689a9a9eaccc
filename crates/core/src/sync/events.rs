//! Typed event bus for sync lifecycle notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sync::model::SyncResult;

#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A cycle finished, successfully or not; carries the full result.
    SyncCompleted(SyncResult),
}

/// Handle returned by [`SyncEventBus::subscribe`]; pass it back to
/// [`SyncEventBus::unsubscribe`] to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSubscription(u64);

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
pub struct SyncEventBus {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
}

impl SyncEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(id, Arc::new(listener));
        EventSubscription(id)
    }

    pub fn unsubscribe(&self, subscription: EventSubscription) -> bool {
        self.lock().remove(&subscription.0).is_some()
    }

    /// Delivers the event to every listener. Listeners run on the emitting
    /// task outside the registry lock, so they may subscribe or unsubscribe
    /// reentrantly.
    pub fn emit(&self, event: SyncEvent) {
        let listeners: Vec<Listener> = self.lock().values().cloned().collect();
        for listener in listeners {
            listener(&event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
