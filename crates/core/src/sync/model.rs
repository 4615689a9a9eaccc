//! Sync domain model: entity kinds, cycle results and configuration.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::scheduler::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS, DEFAULT_SYNC_INTERVAL_MS, MIN_SYNC_INTERVAL_MS,
};

/// The four record kinds tracked by the sync engine, in no particular order.
/// Cycle ordering is fixed by [`EntityKind::ORDERED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Sale,
    Category,
    PartyPurchase,
}

impl EntityKind {
    /// Fixed processing order for every sync cycle.
    pub const ORDERED: [EntityKind; 4] = [
        EntityKind::Product,
        EntityKind::Sale,
        EntityKind::Category,
        EntityKind::PartyPurchase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Sale => "sale",
            EntityKind::Category => "category",
            EntityKind::PartyPurchase => "party_purchase",
        }
    }

    /// Namespace prefix carried by every record id of this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Sale => "sale",
            EntityKind::Category => "category",
            EntityKind::PartyPurchase => "party",
        }
    }

    /// Backing table on the remote record store.
    pub fn remote_table(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Sale => "sales",
            EntityKind::Category => "categories",
            EntityKind::PartyPurchase => "party_purchases",
        }
    }

    /// Column used for dirty detection, pull ordering and last-write-wins.
    /// Sales and categories are append-mostly and keyed on creation time.
    pub fn timestamp_field(&self) -> &'static str {
        match self {
            EntityKind::Product | EntityKind::PartyPurchase => "updated_at",
            EntityKind::Sale | EntityKind::Category => "created_at",
        }
    }

    /// New namespaced record id, `{prefix}_{uuid}`.
    pub fn new_id(&self) -> String {
        format!("{}_{}", self.id_prefix(), Uuid::new_v4())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Push,
    Pull,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Push => "push",
            SyncDirection::Pull => "pull",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a cycle; used for logging and for the in-flight guard policy
/// (manual triggers are rejected when busy, scheduled ones skip silently).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Manual,
    Scheduled,
    Reconnect,
    Forced,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Scheduled => "scheduled",
            SyncTrigger::Reconnect => "reconnect",
            SyncTrigger::Forced => "forced",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity counters for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounters {
    pub push: u64,
    pub pull: u64,
    pub errors: u64,
}

impl EntityCounters {
    pub fn merge(&mut self, other: EntityCounters) {
        self.push += other.push;
        self.pull += other.pull;
        self.errors += other.errors;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub product: EntityCounters,
    pub sale: EntityCounters,
    pub category: EntityCounters,
    pub party_purchase: EntityCounters,
}

impl SyncStats {
    pub fn counters(&self, kind: EntityKind) -> &EntityCounters {
        match kind {
            EntityKind::Product => &self.product,
            EntityKind::Sale => &self.sale,
            EntityKind::Category => &self.category,
            EntityKind::PartyPurchase => &self.party_purchase,
        }
    }

    pub fn counters_mut(&mut self, kind: EntityKind) -> &mut EntityCounters {
        match kind {
            EntityKind::Product => &mut self.product,
            EntityKind::Sale => &mut self.sale,
            EntityKind::Category => &mut self.category,
            EntityKind::PartyPurchase => &mut self.party_purchase,
        }
    }

    /// Records moved in either direction across all entities.
    pub fn total_synced(&self) -> u64 {
        EntityKind::ORDERED
            .iter()
            .map(|kind| {
                let c = self.counters(*kind);
                c.push + c.pull
            })
            .sum()
    }

    pub fn total_errors(&self) -> u64 {
        EntityKind::ORDERED
            .iter()
            .map(|kind| self.counters(*kind).errors)
            .sum()
    }

    /// Folds another attempt's counters into this aggregate.
    pub fn merge(&mut self, other: SyncStats) {
        for kind in EntityKind::ORDERED {
            self.counters_mut(kind).merge(*other.counters(kind));
        }
    }
}

/// Immutable outcome of one sync cycle. Only the most recent result is
/// retained (see `SyncStateStore::set_last_result`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub status: SyncStatus,
    pub timestamp: DateTime<Utc>,
    pub stats: SyncStats,
    pub total_synced: u64,
    pub total_errors: u64,
    /// Wall-clock milliseconds across all retry attempts.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runtime sync configuration, persisted through the sync state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub auto_sync: bool,
    #[serde(rename = "syncInterval")]
    pub sync_interval_ms: u64,
    pub retry_attempts: u32,
    #[serde(rename = "retryDelay")]
    pub retry_delay_ms: u64,
    pub enable_background_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            enable_background_sync: true,
        }
    }
}

impl SyncConfig {
    /// Clamps nonsensical values back to usable ones. Zero attempts would
    /// never run a cycle and sub-floor intervals would busy-loop the timer.
    pub fn normalized(mut self) -> Self {
        if self.sync_interval_ms < MIN_SYNC_INTERVAL_MS {
            self.sync_interval_ms = if self.sync_interval_ms == 0 {
                DEFAULT_SYNC_INTERVAL_MS
            } else {
                MIN_SYNC_INTERVAL_MS
            };
        }
        if self.retry_attempts == 0 {
            self.retry_attempts = 1;
        }
        if self.retry_delay_ms == 0 {
            self.retry_delay_ms = DEFAULT_RETRY_DELAY_MS;
        }
        self
    }
}

/// Shared, mutation-safe view of the active [`SyncConfig`].
#[derive(Clone, Default)]
pub struct SharedConfig(Arc<RwLock<SyncConfig>>);

impl SharedConfig {
    pub fn new(config: SyncConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn get(&self) -> SyncConfig {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, config: SyncConfig) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

/// Point-in-time view of the sync subsystem for status surfaces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStateSnapshot {
    pub online: bool,
    pub queued: bool,
    pub in_flight: bool,
    pub last_result: Option<SyncResult>,
    pub pending_conflicts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EntityKind::PartyPurchase).unwrap(),
            "\"party_purchase\""
        );
        assert_eq!(
            serde_json::from_str::<EntityKind>("\"product\"").unwrap(),
            EntityKind::Product
        );
    }

    #[test]
    fn new_ids_carry_the_kind_prefix() {
        assert!(EntityKind::Product.new_id().starts_with("product_"));
        assert!(EntityKind::PartyPurchase.new_id().starts_with("party_"));
        assert_ne!(EntityKind::Sale.new_id(), EntityKind::Sale.new_id());
    }

    #[test]
    fn timestamp_field_matches_append_mostly_kinds() {
        assert_eq!(EntityKind::Product.timestamp_field(), "updated_at");
        assert_eq!(EntityKind::PartyPurchase.timestamp_field(), "updated_at");
        assert_eq!(EntityKind::Sale.timestamp_field(), "created_at");
        assert_eq!(EntityKind::Category.timestamp_field(), "created_at");
    }

    #[test]
    fn stats_totals_sum_both_directions() {
        let mut stats = SyncStats::default();
        stats.counters_mut(EntityKind::Product).push = 3;
        stats.counters_mut(EntityKind::Product).pull = 2;
        stats.counters_mut(EntityKind::Product).errors = 1;
        assert_eq!(stats.total_synced(), 5);
        assert_eq!(stats.total_errors(), 1);
    }

    #[test]
    fn stats_merge_accumulates_per_entity() {
        let mut total = SyncStats::default();
        total.counters_mut(EntityKind::Product).push = 2;

        let mut attempt = SyncStats::default();
        attempt.counters_mut(EntityKind::Product).pull = 3;
        attempt.counters_mut(EntityKind::Sale).push = 1;
        attempt.counters_mut(EntityKind::Sale).errors = 1;
        total.merge(attempt);

        assert_eq!(total.product.push, 2);
        assert_eq!(total.product.pull, 3);
        assert_eq!(total.sale.push, 1);
        assert_eq!(total.total_synced(), 6);
        assert_eq!(total.total_errors(), 1);
    }

    #[test]
    fn config_surface_uses_camel_case_keys() {
        let json = serde_json::to_value(SyncConfig::default()).unwrap();
        assert!(json.get("autoSync").is_some());
        assert!(json.get("syncInterval").is_some());
        assert!(json.get("retryAttempts").is_some());
        assert!(json.get("retryDelay").is_some());
        assert!(json.get("enableBackgroundSync").is_some());
    }

    #[test]
    fn normalized_clamps_zero_values() {
        let config = SyncConfig {
            auto_sync: true,
            sync_interval_ms: 0,
            retry_attempts: 0,
            retry_delay_ms: 0,
            enable_background_sync: true,
        }
        .normalized();
        assert_eq!(config.sync_interval_ms, DEFAULT_SYNC_INTERVAL_MS);
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.retry_delay_ms, DEFAULT_RETRY_DELAY_MS);

        let low = SyncConfig {
            sync_interval_ms: 1,
            ..SyncConfig::default()
        }
        .normalized();
        assert_eq!(low.sync_interval_ms, MIN_SYNC_INTERVAL_MS);
    }
}
