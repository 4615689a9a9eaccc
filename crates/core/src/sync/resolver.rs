//! Conflict detection and resolution.
//!
//! Resolution is pure: given a local and a remote version of the same record
//! and a strategy, [`resolve`] returns the winning version without touching
//! any store. Entity-specific behavior is expressed as a [`MergePolicy`]
//! (a bias plus a field-rule table) evaluated by one generic merge function,
//! never as per-entity resolver code.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result};
use crate::sync::record::SyncRecord;

/// How competing local and remote versions of a record are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    LocalWins,
    RemoteWins,
    /// The side with the strictly newer change timestamp wins; ties resolve
    /// to the remote version.
    LastWriteWins,
    /// Never resolves automatically; the conflict is parked in the ledger.
    Manual,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::LocalWins => "local-wins",
            ConflictStrategy::RemoteWins => "remote-wins",
            ConflictStrategy::LastWriteWins => "last-write-wins",
            ConflictStrategy::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a merged field comes from, or how both sides combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldRule {
    TakeLocal,
    TakeRemote,
    TakeMax,
    TakeMin,
    TakeSum,
}

/// Which side supplies the fields a rule table does not list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeBias {
    /// The side picked by the caller's strategy.
    StrategyWinner,
    /// Remote, unless the caller explicitly asked for local-wins.
    RemoteUnlessLocalWins,
}

/// One side of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    Local,
    Remote,
}

/// Per-entity merge behavior: the bias for unlisted fields plus the field
/// rules evaluated by [`merge_records`].
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    pub bias: MergeBias,
    pub rules: &'static [(&'static str, FieldRule)],
}

impl MergePolicy {
    /// Whole-record policy: the strategy winner is taken as-is.
    pub const fn strategy_winner() -> Self {
        Self {
            bias: MergeBias::StrategyWinner,
            rules: &[],
        }
    }

    /// Whole-record policy favoring remote; local only on explicit local-wins.
    pub const fn remote_unless_local_wins() -> Self {
        Self {
            bias: MergeBias::RemoteUnlessLocalWins,
            rules: &[],
        }
    }

    pub const fn with_rules(
        bias: MergeBias,
        rules: &'static [(&'static str, FieldRule)],
    ) -> Self {
        Self { bias, rules }
    }
}

/// True when the two copies have diverged. Equal change timestamps mean the
/// same write observed on both sides, never a conflict.
pub fn has_conflict<T: SyncRecord>(local: &T, remote: &T) -> bool {
    local.change_timestamp() != remote.change_timestamp()
}

/// Produces the winning version of a diverged record.
///
/// The manual strategy always raises [`Error::ManualResolutionRequired`] so
/// the caller can park the pair in the conflict ledger. Otherwise the
/// entity's [`MergePolicy`] decides: the bias picks the base side and the
/// rule table overrides individual fields.
pub fn resolve<T: SyncRecord>(local: &T, remote: &T, strategy: ConflictStrategy) -> Result<T> {
    if strategy == ConflictStrategy::Manual {
        return Err(Error::ManualResolutionRequired {
            entity: T::KIND,
            id: local.id().to_string(),
        });
    }

    let policy = T::merge_policy();
    let base = match policy.bias {
        MergeBias::StrategyWinner => strategy_winner(local, remote, strategy),
        MergeBias::RemoteUnlessLocalWins => {
            if strategy == ConflictStrategy::LocalWins {
                MergeSide::Local
            } else {
                MergeSide::Remote
            }
        }
    };

    if policy.rules.is_empty() {
        return Ok(match base {
            MergeSide::Local => local.clone(),
            MergeSide::Remote => remote.clone(),
        });
    }
    merge_records(local, remote, base, policy.rules)
}

fn strategy_winner<T: SyncRecord>(local: &T, remote: &T, strategy: ConflictStrategy) -> MergeSide {
    match strategy {
        ConflictStrategy::LocalWins => MergeSide::Local,
        ConflictStrategy::RemoteWins => MergeSide::Remote,
        // Manual returned early in resolve(); treat like last-write-wins.
        ConflictStrategy::LastWriteWins | ConflictStrategy::Manual => {
            if local.change_timestamp() > remote.change_timestamp() {
                MergeSide::Local
            } else {
                MergeSide::Remote
            }
        }
    }
}

/// Evaluates a field-rule table over two versions of a record. Both sides
/// are viewed as JSON objects; the base side supplies every field the table
/// does not list.
pub fn merge_records<T: SyncRecord>(
    local: &T,
    remote: &T,
    base: MergeSide,
    rules: &[(&str, FieldRule)],
) -> Result<T> {
    let local_map = to_object(local)?;
    let remote_map = to_object(remote)?;
    let mut merged = match base {
        MergeSide::Local => local_map.clone(),
        MergeSide::Remote => remote_map.clone(),
    };

    for (field, rule) in rules {
        if let Some(value) = apply_rule(*rule, local_map.get(*field), remote_map.get(*field)) {
            merged.insert((*field).to_string(), value);
        }
    }

    Ok(serde_json::from_value(Value::Object(merged))?)
}

fn to_object<T: SyncRecord>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::validation(format!(
            "{} record did not serialize to an object",
            T::KIND
        ))),
    }
}

fn apply_rule(rule: FieldRule, local: Option<&Value>, remote: Option<&Value>) -> Option<Value> {
    match rule {
        FieldRule::TakeLocal => local.cloned(),
        FieldRule::TakeRemote => remote.cloned(),
        FieldRule::TakeMax => pick_extreme(local, remote, Ordering::Greater),
        FieldRule::TakeMin => pick_extreme(local, remote, Ordering::Less),
        FieldRule::TakeSum => sum_values(local, remote),
    }
}

fn pick_extreme(local: Option<&Value>, remote: Option<&Value>, keep: Ordering) -> Option<Value> {
    match (local, remote) {
        (Some(l), Some(r)) => match compare_values(l, r) {
            Some(ordering) if ordering == keep => Some(l.clone()),
            // Equal or incomparable pairs resolve to remote, matching the
            // last-write-wins tie rule.
            _ => Some(r.clone()),
        },
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(r.clone()),
        (None, None) => None,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return Some(xi.cmp(&yi));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sum_values(local: Option<&Value>, remote: Option<&Value>) -> Option<Value> {
    match (local, remote) {
        (Some(l), Some(r)) => {
            if let (Some(x), Some(y)) = (l.as_i64(), r.as_i64()) {
                return Some(Value::from(x + y));
            }
            Some(Value::from(l.as_f64()? + r.as_f64()?))
        }
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::categories::Category;
    use crate::party_purchases::PartyPurchase;
    use crate::products::Product;
    use crate::sales::Sale;

    fn ts(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, min, 0).unwrap()
    }

    fn product(stock: i64, changed: DateTime<Utc>) -> Product {
        let mut p = Product::new("Rice 5kg", dec!(40), dec!(55), stock);
        p.id = "product_a1".to_string();
        p.created_at = ts(8, 0);
        p.updated_at = changed;
        p
    }

    #[test]
    fn conflict_requires_differing_timestamps() {
        let local = product(80, ts(10, 0));
        let remote = product(95, ts(10, 0));
        assert!(!has_conflict(&local, &remote));

        let remote_later = product(95, ts(10, 1));
        assert!(has_conflict(&local, &remote_later));
    }

    #[test]
    fn product_stock_merge_takes_max_in_both_directions() {
        let local = product(80, ts(10, 0));
        let remote = product(95, ts(11, 0));
        let winner = resolve(&local, &remote, ConflictStrategy::LastWriteWins).unwrap();
        assert_eq!(winner.stock_quantity, 95);

        // Swapped counts, local side newer: the max still wins.
        let local = product(95, ts(11, 0));
        let remote = product(80, ts(10, 0));
        let winner = resolve(&local, &remote, ConflictStrategy::LastWriteWins).unwrap();
        assert_eq!(winner.stock_quantity, 95);
        // Base fields come from the newer (local) side.
        assert_eq!(winner.updated_at, ts(11, 0));
    }

    #[test]
    fn last_write_wins_tie_resolves_to_remote() {
        let mut local = Category::new("Grains");
        local.id = "category_c1".to_string();
        local.created_at = ts(9, 0);
        let mut remote = local.clone();
        remote.name = "Cereals".to_string();

        let winner = resolve(&local, &remote, ConflictStrategy::LastWriteWins).unwrap();
        assert_eq!(winner.name, "Cereals");
    }

    #[test]
    fn last_write_wins_prefers_strictly_newer_local() {
        let mut local = Category::new("Grains");
        local.id = "category_c1".to_string();
        local.created_at = ts(9, 30);
        let mut remote = local.clone();
        remote.name = "Cereals".to_string();
        remote.created_at = ts(9, 0);

        let winner = resolve(&local, &remote, ConflictStrategy::LastWriteWins).unwrap();
        assert_eq!(winner.name, "Grains");
    }

    #[test]
    fn sale_favors_remote_unless_explicit_local_wins() {
        let product = product(10, ts(8, 0));
        let mut local = Sale::new(&product, 2, dec!(55)).unwrap();
        local.id = "sale_s1".to_string();
        local.created_at = ts(12, 0);
        let mut remote = local.clone();
        remote.quantity = 3;
        remote.created_at = ts(11, 0);

        // Local is newer, but sales still favor the remote copy.
        let winner = resolve(&local, &remote, ConflictStrategy::LastWriteWins).unwrap();
        assert_eq!(winner.quantity, 3);

        let winner = resolve(&local, &remote, ConflictStrategy::LocalWins).unwrap();
        assert_eq!(winner.quantity, 2);
    }

    #[test]
    fn party_purchase_fields_favor_remote() {
        let mut local = PartyPurchase::new("Sharma Traders", "Sugar 1kg", dec!(30), dec!(38), 50);
        local.id = "party_p1".to_string();
        local.updated_at = ts(15, 0);
        let mut remote = local.clone();
        remote.remaining_quantity = 20;
        remote.selling_price = dec!(39);
        remote.updated_at = ts(14, 0);

        // Remote is older yet still supplies every field.
        let winner = resolve(&local, &remote, ConflictStrategy::LastWriteWins).unwrap();
        assert_eq!(winner.remaining_quantity, 20);
        assert_eq!(winner.selling_price, dec!(39));
    }

    #[test]
    fn manual_strategy_raises_for_the_caller() {
        let local = product(80, ts(10, 0));
        let remote = product(95, ts(11, 0));
        let err = resolve(&local, &remote, ConflictStrategy::Manual).unwrap_err();
        assert!(matches!(err, Error::ManualResolutionRequired { .. }));
    }

    #[test]
    fn rule_table_supports_min_and_sum() {
        let mut local = product(80, ts(10, 0));
        local.min_stock_level = 5;
        let mut remote = product(95, ts(11, 0));
        remote.min_stock_level = 8;

        let merged: Product = merge_records(
            &local,
            &remote,
            MergeSide::Remote,
            &[
                ("stock_quantity", FieldRule::TakeMin),
                ("min_stock_level", FieldRule::TakeSum),
            ],
        )
        .unwrap();
        assert_eq!(merged.stock_quantity, 80);
        assert_eq!(merged.min_stock_level, 13);
    }

    #[test]
    fn take_local_and_take_remote_pick_sides() {
        let local = product(80, ts(10, 0));
        let mut remote = product(95, ts(11, 0));
        remote.name = "Rice 5kg (new pack)".to_string();

        let merged: Product = merge_records(
            &local,
            &remote,
            MergeSide::Remote,
            &[("name", FieldRule::TakeLocal)],
        )
        .unwrap();
        assert_eq!(merged.name, "Rice 5kg");
        assert_eq!(merged.stock_quantity, 95);
    }
}
