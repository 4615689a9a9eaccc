//! The sync subsystem's context object.
//!
//! `SyncManager` owns every moving part (engine, monitor, scheduler task,
//! event bus, conflict ledger, configuration) so embedders hold one handle
//! and tests can stand up fully independent instances. Nothing in this module
//! is process-global.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::errors::{Error, Result};
use crate::sync::engine::SyncEngine;
use crate::sync::events::{EventSubscription, SyncEvent, SyncEventBus};
use crate::sync::ledger::{ConflictEntry, ConflictLedger, ConflictWinner};
use crate::sync::model::{
    EntityKind, SharedConfig, SyncConfig, SyncResult, SyncStateSnapshot, SyncStatus, SyncTrigger,
};
use crate::sync::monitor::{NetworkStatusMonitor, NetworkSubscription};
use crate::sync::record::SyncRecord;
use crate::sync::resolver::ConflictStrategy;
use crate::sync::scheduler;
use crate::sync::store::{EntityStores, SyncStateStore, SyncStores};

pub struct SyncManager {
    stores: SyncStores,
    state: Arc<dyn SyncStateStore>,
    engine: Arc<SyncEngine>,
    monitor: Arc<NetworkStatusMonitor>,
    events: Arc<SyncEventBus>,
    ledger: Arc<ConflictLedger>,
    config: SharedConfig,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
    monitor_subscription: Mutex<Option<NetworkSubscription>>,
}

impl SyncManager {
    /// Wires the engine against the given stores. Call [`SyncManager::init`]
    /// afterwards (from within the tokio runtime) to load persisted
    /// configuration and start the background pieces.
    pub fn new(stores: SyncStores, state: Arc<dyn SyncStateStore>) -> Arc<Self> {
        let config = SharedConfig::new(SyncConfig::default());
        let monitor = Arc::new(NetworkStatusMonitor::default());
        let events = Arc::new(SyncEventBus::new());
        let ledger = Arc::new(ConflictLedger::new());
        let engine = Arc::new(SyncEngine::new(
            stores.clone(),
            Arc::clone(&state),
            Arc::clone(&ledger),
            Arc::clone(&events),
            config.clone(),
        ));
        Arc::new(Self {
            stores,
            state,
            engine,
            monitor,
            events,
            ledger,
            config,
            scheduler_task: Mutex::new(None),
            monitor_subscription: Mutex::new(None),
        })
    }

    /// Loads persisted configuration, hooks the reconnect trigger and starts
    /// the scheduler when auto-sync is on. The reconnect subscription replays
    /// the current status, so a queued sync left over from the previous run
    /// is drained right away when the device comes up online. The hook spawns
    /// onto this runtime's handle, so connectivity readings may be pushed
    /// into [`SyncManager::monitor`] from any thread.
    pub async fn init(self: &Arc<Self>) -> Result<()> {
        match self.state.get_config().await? {
            Some(stored) => self.config.set(stored.normalized()),
            None => self.state.set_config(&self.config.get()).await?,
        }

        let weak = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::current();
        let subscription = self.monitor.subscribe(move |online| {
            if !online {
                return;
            }
            if let Some(manager) = weak.upgrade() {
                runtime.spawn(async move {
                    manager.handle_reconnect().await;
                });
            }
        });
        *self.lock_subscription() = Some(subscription);

        let config = self.config.get();
        if config.auto_sync && config.enable_background_sync {
            self.start_scheduler();
        }
        info!(
            "[SyncManager] Initialized (auto_sync={}, interval={}ms, attempts={})",
            config.auto_sync, config.sync_interval_ms, config.retry_attempts
        );
        Ok(())
    }

    /// Stops the scheduler and detaches the reconnect hook. The manager can
    /// be re-initialized afterwards.
    pub fn shutdown(&self) {
        self.stop_scheduler();
        if let Some(subscription) = self.lock_subscription().take() {
            self.monitor.unsubscribe(subscription);
        }
        info!("[SyncManager] Shut down");
    }

    /// Manual sync trigger. While offline this persists the queued flag and
    /// returns [`Error::Offline`]; the monitor drains the queue on reconnect.
    /// Rejected with [`Error::CycleInFlight`] when a cycle is running.
    pub async fn sync_now(&self) -> Result<SyncResult> {
        if !self.monitor.is_online() {
            self.state.set_queued(true).await?;
            info!("[SyncManager] Offline; sync queued for reconnect");
            return Err(Error::Offline);
        }
        self.engine.run_cycle(SyncTrigger::Manual).await
    }

    /// Stuck-state recovery: clears the in-flight guard, then syncs.
    pub async fn force_sync(&self) -> Result<SyncResult> {
        warn!("[SyncManager] Force sync requested; resetting in-flight guard");
        self.engine.reset_in_flight();
        if !self.monitor.is_online() {
            self.state.set_queued(true).await?;
            return Err(Error::Offline);
        }
        self.engine.run_cycle(SyncTrigger::Forced).await
    }

    /// Applies and persists a new configuration. Toggling auto-sync off
    /// cancels the timer; toggling it on restarts the timer and fires one
    /// immediate cycle (skipped silently while offline).
    pub async fn update_config(&self, config: SyncConfig) -> Result<SyncConfig> {
        let config = config.normalized();
        let previous = self.config.get();
        self.config.set(config.clone());
        self.state.set_config(&config).await?;

        let run_background = config.auto_sync && config.enable_background_sync;
        let ran_background = previous.auto_sync && previous.enable_background_sync;
        if run_background != ran_background {
            if run_background {
                self.start_scheduler();
                let engine = Arc::clone(&self.engine);
                let monitor = Arc::clone(&self.monitor);
                tokio::spawn(async move {
                    if !monitor.is_online() {
                        debug!("[SyncManager] Skipping kick-off cycle, offline");
                        return;
                    }
                    if let Err(err) = engine.run_cycle(SyncTrigger::Scheduled).await {
                        debug!("[SyncManager] Kick-off cycle skipped: {err}");
                    }
                });
            } else {
                self.stop_scheduler();
            }
        }
        info!(
            "[SyncManager] Config updated (auto_sync={}, interval={}ms)",
            config.auto_sync, config.sync_interval_ms
        );
        Ok(config)
    }

    pub fn config(&self) -> SyncConfig {
        self.config.get()
    }

    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.engine.strategy()
    }

    pub fn set_conflict_strategy(&self, strategy: ConflictStrategy) {
        self.engine.set_strategy(strategy);
    }

    /// The connectivity feed; embedders push platform readings into it.
    pub fn monitor(&self) -> Arc<NetworkStatusMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn subscribe_events(
        &self,
        listener: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> EventSubscription {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe_events(&self, subscription: EventSubscription) -> bool {
        self.events.unsubscribe(subscription)
    }

    pub async fn status(&self) -> Result<SyncStateSnapshot> {
        Ok(SyncStateSnapshot {
            online: self.monitor.is_online(),
            queued: self.state.is_queued().await?,
            in_flight: self.engine.is_in_flight(),
            last_result: self.state.get_last_result().await?,
            pending_conflicts: self.ledger.pending_count(),
        })
    }

    pub fn pending_conflicts(&self) -> Vec<ConflictEntry> {
        self.ledger.pending()
    }

    /// Resolves a ledger entry by applying the chosen side to the local
    /// store under the revision guard. The entry stays parked until the
    /// write goes through, so a failed apply is simply retried.
    pub async fn resolve_conflict(
        &self,
        entity: EntityKind,
        id: &str,
        winner: ConflictWinner,
    ) -> Result<()> {
        let entry = self
            .ledger
            .get(entity, id)
            .ok_or_else(|| Error::validation(format!("No pending conflict for {entity} '{id}'")))?;
        let version = match winner {
            ConflictWinner::Local => entry.local_version,
            ConflictWinner::Remote => entry.remote_version,
        };
        info!("[SyncManager] Resolving {entity} '{id}' conflict, keeping {winner:?} version");
        match entity {
            EntityKind::Product => self.apply_resolved(&self.stores.products, version).await?,
            EntityKind::Sale => self.apply_resolved(&self.stores.sales, version).await?,
            EntityKind::Category => self.apply_resolved(&self.stores.categories, version).await?,
            EntityKind::PartyPurchase => {
                self.apply_resolved(&self.stores.party_purchases, version)
                    .await?
            }
        }
        self.ledger.resolve(entity, id);
        Ok(())
    }

    async fn apply_resolved<T: SyncRecord>(
        &self,
        stores: &EntityStores<T>,
        version: Value,
    ) -> Result<()> {
        let mut record: T = serde_json::from_value(version)?;
        if let Some(current) = stores.local.get(record.id()).await? {
            record.set_revision(current.revision());
        }
        stores.local.put(record).await?;
        Ok(())
    }

    async fn handle_reconnect(self: Arc<Self>) {
        match self.state.is_queued().await {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                warn!("[SyncManager] Could not read queued flag on reconnect: {err}");
                return;
            }
        }
        info!("[SyncManager] Back online with a queued sync, starting cycle");
        match self.engine.run_cycle(SyncTrigger::Reconnect).await {
            Ok(result) if result.status == SyncStatus::Success => {
                if let Err(err) = self.state.set_queued(false).await {
                    warn!("[SyncManager] Could not clear queued flag: {err}");
                }
            }
            Ok(result) => debug!(
                "[SyncManager] Queued sync finished with {} error(s); flag stays set",
                result.total_errors
            ),
            Err(err) => debug!("[SyncManager] Queued sync skipped: {err}"),
        }
    }

    fn start_scheduler(&self) {
        let mut slot = self.lock_scheduler();
        if let Some(task) = slot.take() {
            task.abort();
        }
        *slot = Some(scheduler::spawn(
            Arc::clone(&self.engine),
            Arc::clone(&self.monitor),
            self.config.clone(),
        ));
    }

    fn stop_scheduler(&self) {
        if let Some(task) = self.lock_scheduler().take() {
            task.abort();
            info!("[SyncScheduler] Background sync loop stopped");
        }
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.scheduler_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<NetworkSubscription>> {
        self.monitor_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        if let Some(task) = self.lock_scheduler().take() {
            task.abort();
        }
    }
}
