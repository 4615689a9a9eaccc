//! Bulk purchases from supplier parties, held until transferred into the
//! product catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::sync::{
    EntityKind, FieldRule, LocalRecordStore, MergeBias, MergePolicy, SyncRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyPurchase {
    pub id: String,
    pub party_name: String,
    pub item_name: String,
    pub barcode: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub purchased_quantity: i64,
    /// Units not yet transferred into the catalog; never exceeds
    /// `purchased_quantity`.
    pub remaining_quantity: i64,
    pub purchase_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub revision: i64,
}

impl PartyPurchase {
    pub fn new(
        party_name: impl Into<String>,
        item_name: impl Into<String>,
        purchase_price: Decimal,
        selling_price: Decimal,
        purchased_quantity: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityKind::PartyPurchase.new_id(),
            party_name: party_name.into(),
            item_name: item_name.into(),
            barcode: None,
            purchase_price,
            selling_price,
            purchased_quantity,
            remaining_quantity: purchased_quantity,
            purchase_date: now,
            notes: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Moves `quantity` units out of this purchase into the catalog.
    pub fn transfer(&mut self, quantity: i64) -> Result<()> {
        if quantity <= 0 || quantity > self.remaining_quantity {
            return Err(Error::validation(format!(
                "Cannot transfer {quantity} of {} remaining",
                self.remaining_quantity
            )));
        }
        self.remaining_quantity -= quantity;
        self.touch();
        Ok(())
    }

    /// Reverses a transfer, putting units back into this purchase.
    pub fn revert_transfer(&mut self, quantity: i64) -> Result<()> {
        if quantity <= 0 || self.remaining_quantity + quantity > self.purchased_quantity {
            return Err(Error::validation(format!(
                "Cannot revert {quantity} onto {} of {} remaining",
                self.remaining_quantity, self.purchased_quantity
            )));
        }
        self.remaining_quantity += quantity;
        self.touch();
        Ok(())
    }
}

impl SyncRecord for PartyPurchase {
    const KIND: EntityKind = EntityKind::PartyPurchase;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn change_timestamp(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn set_revision(&mut self, revision: i64) {
        self.revision = revision;
    }

    /// Every mutable field takes the remote side; supplier ledgers are
    /// reconciled centrally, so the backend copy is authoritative.
    fn merge_policy() -> MergePolicy {
        MergePolicy::with_rules(
            MergeBias::StrategyWinner,
            &[
                ("party_name", FieldRule::TakeRemote),
                ("item_name", FieldRule::TakeRemote),
                ("barcode", FieldRule::TakeRemote),
                ("purchase_price", FieldRule::TakeRemote),
                ("selling_price", FieldRule::TakeRemote),
                ("purchased_quantity", FieldRule::TakeRemote),
                ("remaining_quantity", FieldRule::TakeRemote),
                ("purchase_date", FieldRule::TakeRemote),
                ("notes", FieldRule::TakeRemote),
                ("updated_at", FieldRule::TakeRemote),
            ],
        )
    }
}

#[async_trait]
pub trait PartyPurchaseRepositoryTrait: LocalRecordStore<PartyPurchase> {
    /// Case-insensitive substring match on the supplier party name.
    async fn find_by_party_name_contains(&self, needle: &str) -> Result<Vec<PartyPurchase>>;

    /// Purchases with untransferred units left.
    async fn find_with_remaining(&self) -> Result<Vec<PartyPurchase>>;
}
