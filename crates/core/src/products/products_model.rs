//! Catalog products: the stocked items sold over the counter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::sync::{
    EntityKind, FieldRule, LocalRecordStore, MergeBias, MergePolicy, SyncRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    /// Units on hand; never negative. Mutated by sale completion, stock
    /// additions and direct edits only.
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub revision: i64,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        purchase_price: Decimal,
        selling_price: Decimal,
        stock_quantity: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityKind::Product.new_id(),
            name: name.into(),
            barcode: None,
            category_id: None,
            purchase_price,
            selling_price,
            stock_quantity,
            min_stock_level: 0,
            description: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Stamps the record as changed, making it eligible for the next push.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_level
    }
}

impl SyncRecord for Product {
    const KIND: EntityKind = EntityKind::Product;

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

    /// Strategy picks the base side; the stock count always merges to the
    /// max so counted inventory is never silently lost.
    fn merge_policy() -> MergePolicy {
        MergePolicy::with_rules(
            MergeBias::StrategyWinner,
            &[("stock_quantity", FieldRule::TakeMax)],
        )
    }
}

/// Product store surface used by the catalog and POS flows, on top of the
/// generic record store contract.
#[async_trait]
pub trait ProductRepositoryTrait: LocalRecordStore<Product> {
    /// Case-insensitive substring match on the product name.
    async fn find_by_name_contains(&self, needle: &str) -> Result<Vec<Product>>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>>;

    async fn find_by_category(&self, category_id: &str) -> Result<Vec<Product>>;

    /// Products at or below their minimum stock level.
    async fn find_low_stock(&self) -> Result<Vec<Product>>;
}
