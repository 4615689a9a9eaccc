//! Storage abstractions consumed by the sync engine.
//!
//! The SQLite implementations live in `stockroom-storage-sqlite`, the HTTP
//! remote client in `stockroom-remote-store`; engine tests use in-memory
//! fakes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::categories::Category;
use crate::errors::Result;
use crate::party_purchases::PartyPurchase;
use crate::products::Product;
use crate::sales::Sale;
use crate::sync::model::{EntityKind, SyncConfig, SyncDirection, SyncResult};
use crate::sync::record::SyncRecord;

/// Local, offline-capable document store for one entity kind. The single
/// source of truth while the device is offline; writes are visible to
/// subsequent reads immediately.
#[async_trait]
pub trait LocalRecordStore<T: SyncRecord>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Inserts or updates. A record whose id has no row is inserted (an empty
    /// id is assigned first) with revision 1. Updating an existing row
    /// requires the caller's `revision` to match the stored one; a stale
    /// revision fails with `Error::Conflict` and writes nothing. Returns the
    /// stored record with its new revision.
    async fn put(&self, record: T) -> Result<T>;

    /// Removes the row. Purely local: deletions are never propagated to the
    /// remote store, so a previously synced record can reappear on a later
    /// pull.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list_all(&self) -> Result<Vec<T>>;

    /// Records whose change timestamp is strictly greater than `since`,
    /// ascending.
    async fn find_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<T>>;
}

/// Authoritative remote backend for one entity kind, reachable while online.
#[async_trait]
pub trait RemoteRecordStore<T: SyncRecord>: Send + Sync {
    /// Blind upsert keyed on the record id; replaying the same record is
    /// harmless.
    async fn upsert(&self, record: &T) -> Result<()>;

    /// Rows whose change timestamp is strictly greater than `since`,
    /// ascending.
    async fn select_since(&self, since: DateTime<Utc>) -> Result<Vec<T>>;
}

/// Persisted sync bookkeeping: watermarks, the queued flag, the last cycle
/// result and the sync configuration. All writes are idempotent upserts.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Epoch zero when the watermark was never set.
    async fn get_watermark(
        &self,
        entity: EntityKind,
        direction: SyncDirection,
    ) -> Result<DateTime<Utc>>;

    /// Monotonic: an older timestamp never overwrites a newer stored one.
    async fn set_watermark(
        &self,
        entity: EntityKind,
        direction: SyncDirection,
        ts: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_last_result(&self) -> Result<Option<SyncResult>>;

    async fn set_last_result(&self, result: &SyncResult) -> Result<()>;

    async fn is_queued(&self) -> Result<bool>;

    async fn set_queued(&self, queued: bool) -> Result<()>;

    async fn get_config(&self) -> Result<Option<SyncConfig>>;

    async fn set_config(&self, config: &SyncConfig) -> Result<()>;
}

/// Local + remote store pair for one entity kind.
pub struct EntityStores<T: SyncRecord> {
    pub local: Arc<dyn LocalRecordStore<T>>,
    pub remote: Arc<dyn RemoteRecordStore<T>>,
}

impl<T: SyncRecord> EntityStores<T> {
    pub fn new(local: Arc<dyn LocalRecordStore<T>>, remote: Arc<dyn RemoteRecordStore<T>>) -> Self {
        Self { local, remote }
    }
}

impl<T: SyncRecord> Clone for EntityStores<T> {
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            remote: Arc::clone(&self.remote),
        }
    }
}

/// The four store pairs wired into the engine.
#[derive(Clone)]
pub struct SyncStores {
    pub products: EntityStores<Product>,
    pub sales: EntityStores<Sale>,
    pub categories: EntityStores<Category>,
    pub party_purchases: EntityStores<PartyPurchase>,
}
