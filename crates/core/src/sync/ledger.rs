//! In-memory ledger of conflicts awaiting manual resolution.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;
use crate::sync::model::EntityKind;
use crate::sync::record::SyncRecord;

/// One conflict detected under the manual strategy. Both versions are kept
/// as their JSON forms so the ledger stays untyped across entity kinds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub entity: EntityKind,
    pub entity_id: String,
    pub local_version: Value,
    pub remote_version: Value,
    pub detected_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Which side to keep when resolving a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictWinner {
    Local,
    Remote,
}

/// Conflicts live only for the process lifetime; unresolved entries are
/// re-detected on the next pull of the same diverged record.
#[derive(Debug, Default)]
pub struct ConflictLedger {
    entries: Mutex<HashMap<(EntityKind, String), ConflictEntry>>,
}

impl ConflictLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a detected conflict, replacing any earlier entry for the same
    /// record with the fresher version pair.
    pub fn record<T: SyncRecord>(&self, local: &T, remote: &T) -> Result<()> {
        let entry = ConflictEntry {
            entity: T::KIND,
            entity_id: local.id().to_string(),
            local_version: serde_json::to_value(local)?,
            remote_version: serde_json::to_value(remote)?,
            detected_at: Utc::now(),
            resolved: false,
            resolved_at: None,
        };
        self.lock()
            .insert((T::KIND, entry.entity_id.clone()), entry);
        Ok(())
    }

    /// Unresolved conflicts, oldest first.
    pub fn pending(&self) -> Vec<ConflictEntry> {
        let mut entries: Vec<ConflictEntry> = self
            .lock()
            .values()
            .filter(|entry| !entry.resolved)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.detected_at);
        entries
    }

    pub fn pending_count(&self) -> usize {
        self.lock().values().filter(|entry| !entry.resolved).count()
    }

    pub fn contains(&self, entity: EntityKind, id: &str) -> bool {
        self.lock().contains_key(&(entity, id.to_string()))
    }

    /// The parked version pair for one record, left in place. The ledger
    /// holds the only copy of the remote version once the pull watermark has
    /// moved past the row, so callers apply from this copy and only then
    /// [`ConflictLedger::resolve`] the entry.
    pub fn get(&self, entity: EntityKind, id: &str) -> Option<ConflictEntry> {
        self.lock().get(&(entity, id.to_string())).cloned()
    }

    /// Marks the entry resolved, stamps it and drops it from future listings.
    pub fn resolve(&self, entity: EntityKind, id: &str) -> Option<ConflictEntry> {
        let mut entry = self.lock().remove(&(entity, id.to_string()))?;
        entry.resolved = true;
        entry.resolved_at = Some(Utc::now());
        Some(entry)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(EntityKind, String), ConflictEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
