//! Contract every synchronized record satisfies.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::sync::model::EntityKind;
use crate::sync::resolver::MergePolicy;

/// Implemented by the four entity types. Gives the engine, resolver and
/// conflict ledger uniform access to identity, the change timestamp and the
/// local revision counter without knowing the concrete record shape.
pub trait SyncRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Timestamp used for dirty detection, pull ordering and last-write-wins
    /// comparison: `updated_at` where the kind has one, `created_at` for the
    /// append-mostly kinds.
    fn change_timestamp(&self) -> DateTime<Utc>;

    /// Local optimistic-concurrency counter. Never serialized, so records
    /// deserialized from the remote store come back with revision zero.
    fn revision(&self) -> i64;

    fn set_revision(&mut self, revision: i64);

    /// Field-level merge policy layered on top of the caller's strategy.
    fn merge_policy() -> MergePolicy;
}
