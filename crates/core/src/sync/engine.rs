//! Bidirectional sync cycle orchestration.
//!
//! One cycle walks the entity kinds in fixed order (products, sales,
//! categories, party purchases) and for each pushes dirty local records, then
//! pulls and reconciles remote changes. Record-level failures are counted and
//! the batch continues; a cycle-level failure aborts the attempt and is
//! retried with linear backoff up to the configured attempt count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};

use crate::errors::{Error, Result};
use crate::sync::events::{SyncEvent, SyncEventBus};
use crate::sync::ledger::ConflictLedger;
use crate::sync::model::{
    EntityCounters, SharedConfig, SyncDirection, SyncResult, SyncStats, SyncStatus, SyncTrigger,
};
use crate::sync::record::SyncRecord;
use crate::sync::resolver::{has_conflict, resolve, ConflictStrategy};
use crate::sync::store::{EntityStores, SyncStateStore, SyncStores};

pub struct SyncEngine {
    stores: SyncStores,
    state: Arc<dyn SyncStateStore>,
    ledger: Arc<ConflictLedger>,
    events: Arc<SyncEventBus>,
    config: SharedConfig,
    strategy: RwLock<ConflictStrategy>,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag when the cycle ends, on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(
        stores: SyncStores,
        state: Arc<dyn SyncStateStore>,
        ledger: Arc<ConflictLedger>,
        events: Arc<SyncEventBus>,
        config: SharedConfig,
    ) -> Self {
        Self {
            stores,
            state,
            ledger,
            events,
            config,
            strategy: RwLock::new(ConflictStrategy::LastWriteWins),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Default strategy applied when the pull side hits a diverged record.
    pub fn strategy(&self) -> ConflictStrategy {
        *self.strategy.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_strategy(&self, strategy: ConflictStrategy) {
        *self.strategy.write().unwrap_or_else(PoisonError::into_inner) = strategy;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Clears a stuck in-flight flag. Only the "force" path uses this; a
    /// running cycle keeps going and both cycles then race on watermarks,
    /// which stay consistent because every advance is monotonic.
    pub fn reset_in_flight(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard(&self.in_flight))
    }

    /// Runs one full cycle, retrying it on cycle-level failure. Returns
    /// `Error::CycleInFlight` without touching anything when a cycle is
    /// already running; callers decide whether that is a rejection (manual)
    /// or a silent skip (scheduled). Every completed run, clean or not,
    /// yields a persisted [`SyncResult`] and a `SyncCompleted` event.
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> Result<SyncResult> {
        let _guard = self.try_begin().ok_or(Error::CycleInFlight)?;
        info!("[SyncEngine] Starting sync cycle (trigger={trigger})");

        let config = self.config.get();
        let strategy = self.strategy();
        let attempts = config.retry_attempts.max(1);
        let started = Instant::now();

        let mut stats = SyncStats::default();
        let mut cycle_error: Option<Error> = None;
        for attempt in 1..=attempts {
            let (attempt_stats, error) = self.run_once(strategy).await;
            // Batches completed by a failed attempt stay synced (their
            // watermarks advanced), so their counters fold into the result.
            stats.merge(attempt_stats);
            cycle_error = error;
            match &cycle_error {
                None => break,
                Some(err) => {
                    warn!("[SyncEngine] Cycle attempt {attempt}/{attempts} failed: {err}");
                    if attempt < attempts {
                        let delay_ms = config.retry_delay_ms.saturating_mul(u64::from(attempt));
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        Ok(self.finish(trigger, started, stats, cycle_error).await)
    }

    async fn run_once(&self, strategy: ConflictStrategy) -> (SyncStats, Option<Error>) {
        let mut stats = SyncStats::default();
        let stores = self.stores.clone();

        // Fixed entity order; an aborted attempt keeps the watermarks already
        // advanced for completed batches, the retry simply finds less to do.
        if let Err(err) = self.sync_entity(&stores.products, strategy, &mut stats).await {
            return (stats, Some(err));
        }
        if let Err(err) = self.sync_entity(&stores.sales, strategy, &mut stats).await {
            return (stats, Some(err));
        }
        if let Err(err) = self
            .sync_entity(&stores.categories, strategy, &mut stats)
            .await
        {
            return (stats, Some(err));
        }
        if let Err(err) = self
            .sync_entity(&stores.party_purchases, strategy, &mut stats)
            .await
        {
            return (stats, Some(err));
        }
        (stats, None)
    }

    async fn sync_entity<T: SyncRecord>(
        &self,
        stores: &EntityStores<T>,
        strategy: ConflictStrategy,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let counters = stats.counters_mut(T::KIND);
        self.push_entity(stores, counters).await?;
        self.pull_entity(stores, strategy, counters).await?;
        Ok(())
    }

    /// Pushes records whose change timestamp lies strictly past the push
    /// watermark. Per-record failures are counted; the watermark advances to
    /// now once at least one record went through, so a partially failed batch
    /// is not re-pushed wholesale.
    async fn push_entity<T: SyncRecord>(
        &self,
        stores: &EntityStores<T>,
        counters: &mut EntityCounters,
    ) -> Result<()> {
        let watermark = self.state.get_watermark(T::KIND, SyncDirection::Push).await?;
        let changed = stores.local.find_changed_since(watermark).await?;
        if changed.is_empty() {
            debug!("[SyncEngine] Nothing to push for {}", T::KIND);
            return Ok(());
        }
        debug!("[SyncEngine] Pushing {} {} record(s)", changed.len(), T::KIND);

        let mut pushed = 0u64;
        for record in &changed {
            match stores.remote.upsert(record).await {
                Ok(()) => pushed += 1,
                Err(err) => {
                    counters.errors += 1;
                    let err = Error::record_sync(T::KIND, record.id(), err.to_string());
                    warn!("[SyncEngine] {err}");
                }
            }
        }
        counters.push += pushed;

        if pushed > 0 {
            self.state
                .set_watermark(T::KIND, SyncDirection::Push, Utc::now())
                .await?;
        }
        Ok(())
    }

    /// Pulls remote rows changed since the pull watermark and reconciles them
    /// into the local store. A failing range query aborts the attempt (cycle
    /// error); per-record reconcile failures are counted and the batch
    /// continues.
    async fn pull_entity<T: SyncRecord>(
        &self,
        stores: &EntityStores<T>,
        strategy: ConflictStrategy,
        counters: &mut EntityCounters,
    ) -> Result<()> {
        let watermark = self.state.get_watermark(T::KIND, SyncDirection::Pull).await?;
        let rows = stores
            .remote
            .select_since(watermark)
            .await
            .map_err(|err| Error::cycle(format!("{} pull query failed: {err}", T::KIND)))?;
        if rows.is_empty() {
            debug!("[SyncEngine] Nothing to pull for {}", T::KIND);
            return Ok(());
        }
        debug!("[SyncEngine] Pulling {} {} record(s)", rows.len(), T::KIND);

        for remote in rows {
            let id = remote.id().to_string();
            match self.apply_remote(stores, strategy, remote).await {
                Ok(true) => counters.pull += 1,
                Ok(false) => {} // own echo, already identical
                Err(err) => {
                    counters.errors += 1;
                    let err = Error::record_sync(T::KIND, id, err.to_string());
                    warn!("[SyncEngine] {err}");
                }
            }
        }

        // Advance even when every row was an echo, otherwise the same rows
        // would be re-fetched on every future cycle.
        self.state
            .set_watermark(T::KIND, SyncDirection::Pull, Utc::now())
            .await?;
        Ok(())
    }

    /// Writes one remote row into the local store. Returns false when the
    /// local copy is already the same write (equal change timestamps).
    async fn apply_remote<T: SyncRecord>(
        &self,
        stores: &EntityStores<T>,
        strategy: ConflictStrategy,
        remote: T,
    ) -> Result<bool> {
        match stores.local.get(remote.id()).await? {
            None => {
                stores.local.put(remote).await?;
                Ok(true)
            }
            Some(local) => {
                if !has_conflict(&local, &remote) {
                    return Ok(false);
                }
                let mut resolved = match resolve(&local, &remote, strategy) {
                    Ok(winner) => winner,
                    Err(err @ Error::ManualResolutionRequired { .. }) => {
                        self.ledger.record(&local, &remote)?;
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                };
                // Carry the local revision so the guarded update applies; a
                // concurrent local write wins the race and this pull records
                // an error instead of clobbering it.
                resolved.set_revision(local.revision());
                stores.local.put(resolved).await?;
                Ok(true)
            }
        }
    }

    async fn finish(
        &self,
        trigger: SyncTrigger,
        started: Instant,
        stats: SyncStats,
        cycle_error: Option<Error>,
    ) -> SyncResult {
        let status = if cycle_error.is_some() || stats.total_errors() > 0 {
            SyncStatus::Error
        } else {
            SyncStatus::Success
        };
        let result = SyncResult {
            status,
            timestamp: Utc::now(),
            stats,
            total_synced: stats.total_synced(),
            total_errors: stats.total_errors() + u64::from(cycle_error.is_some()),
            duration_ms: started.elapsed().as_millis() as u64,
            error: cycle_error.map(|err| err.to_string()),
        };

        if let Err(err) = self.state.set_last_result(&result).await {
            warn!("[SyncEngine] Failed to persist cycle result: {err}");
        }
        info!(
            "[SyncEngine] Cycle finished (trigger={}): status={} synced={} errors={} duration={}ms",
            trigger, result.status, result.total_synced, result.total_errors, result.duration_ms
        );
        self.events.emit(SyncEvent::SyncCompleted(result.clone()));
        result
    }
}
