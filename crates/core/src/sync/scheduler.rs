//! Background sync scheduling: interval constants and the periodic timer task.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use tokio::task::JoinHandle;

use crate::sync::engine::SyncEngine;
use crate::sync::model::{SharedConfig, SyncTrigger};
use crate::sync::monitor::NetworkStatusMonitor;

/// Default periodic sync interval when auto-sync is enabled (5 minutes).
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 300_000;

/// Floor for configured intervals; anything lower is clamped.
pub const MIN_SYNC_INTERVAL_MS: u64 = 10_000;

/// Default number of attempts for one cycle before it is reported as failed.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between cycle retries; scaled linearly by the attempt number.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound for the random jitter added to every timer tick so that
/// co-located instances do not sync in lockstep.
pub const SCHEDULE_JITTER_MS: u64 = 5_000;

/// Spawns the periodic sync loop. Each tick sleeps the configured interval
/// plus jitter, then triggers a cycle unless auto-sync was turned off, the
/// device is offline or a cycle is already in flight. The task runs until
/// aborted by `SyncManager`.
pub(crate) fn spawn(
    engine: Arc<SyncEngine>,
    monitor: Arc<NetworkStatusMonitor>,
    config: SharedConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("[SyncScheduler] Background sync loop started");
        loop {
            let interval_ms = config.get().sync_interval_ms.max(MIN_SYNC_INTERVAL_MS);
            let jitter_ms = rand::thread_rng().gen_range(0..=SCHEDULE_JITTER_MS);
            tokio::time::sleep(Duration::from_millis(interval_ms + jitter_ms)).await;

            if !config.get().auto_sync {
                debug!("[SyncScheduler] Auto-sync disabled, skipping tick");
                continue;
            }
            if !monitor.is_online() {
                debug!("[SyncScheduler] Offline, skipping scheduled sync");
                continue;
            }
            if engine.is_in_flight() {
                debug!("[SyncScheduler] Cycle already in flight, skipping tick");
                continue;
            }

            match engine.run_cycle(SyncTrigger::Scheduled).await {
                Ok(result) => debug!(
                    "[SyncScheduler] Scheduled cycle finished: status={} synced={} errors={}",
                    result.status, result.total_synced, result.total_errors
                ),
                Err(err) => debug!("[SyncScheduler] Scheduled cycle skipped: {err}"),
            }
        }
    })
}
