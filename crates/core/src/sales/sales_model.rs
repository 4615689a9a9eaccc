//! Completed sales. Append-mostly: rows are created at the till and rarely
//! edited afterwards, so creation time doubles as the change timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::products::Product;
use crate::sync::{EntityKind, LocalRecordStore, MergePolicy, SyncRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Always `quantity * unit_price`; re-derived on the rare edit.
    pub total_amount: Decimal,
    /// `total_amount` minus the product's purchase cost at sale time.
    pub profit: Decimal,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub revision: i64,
}

impl Sale {
    /// Builds a sale line for `quantity` units of `product`, deriving the
    /// total and the profit against the product's current purchase price.
    pub fn new(product: &Product, quantity: i64, unit_price: Decimal) -> Result<Self> {
        if quantity <= 0 {
            return Err(Error::validation(format!(
                "Sale quantity must be positive, got {quantity}"
            )));
        }
        let units = Decimal::from(quantity);
        let total_amount = unit_price * units;
        let now = Utc::now();
        Ok(Self {
            id: EntityKind::Sale.new_id(),
            product_id: product.id.clone(),
            quantity,
            unit_price,
            total_amount,
            profit: total_amount - product.purchase_price * units,
            sale_date: now,
            created_at: now,
            revision: 0,
        })
    }

    /// Re-derives the amount columns after an edit to quantity or price.
    pub fn rederive(&mut self, purchase_price: Decimal) {
        let units = Decimal::from(self.quantity);
        self.total_amount = self.unit_price * units;
        self.profit = self.total_amount - purchase_price * units;
    }
}

impl SyncRecord for Sale {
    const KIND: EntityKind = EntityKind::Sale;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn change_timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn set_revision(&mut self, revision: i64) {
        self.revision = revision;
    }

    /// Receipts are facts: the remote copy wins unless the caller explicitly
    /// asked for local-wins.
    fn merge_policy() -> MergePolicy {
        MergePolicy::remote_unless_local_wins()
    }
}

#[async_trait]
pub trait SaleRepositoryTrait: LocalRecordStore<Sale> {
    async fn find_by_product(&self, product_id: &str) -> Result<Vec<Sale>>;

    /// Sales whose `sale_date` falls within `[from, to]`, ascending.
    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sale>>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn new_sale_derives_total_and_profit() {
        let product = Product::new("Oil 1L", dec!(120), dec!(150), 30);
        let sale = Sale::new(&product, 3, dec!(150)).unwrap();
        assert_eq!(sale.total_amount, dec!(450));
        assert_eq!(sale.profit, dec!(90));
        assert!(sale.id.starts_with("sale_"));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let product = Product::new("Oil 1L", dec!(120), dec!(150), 30);
        assert!(Sale::new(&product, 0, dec!(150)).is_err());
        assert!(Sale::new(&product, -2, dec!(150)).is_err());
    }

    #[test]
    fn rederive_refreshes_amounts() {
        let product = Product::new("Oil 1L", dec!(120), dec!(150), 30);
        let mut sale = Sale::new(&product, 2, dec!(150)).unwrap();
        sale.quantity = 4;
        sale.rederive(product.purchase_price);
        assert_eq!(sale.total_amount, dec!(600));
        assert_eq!(sale.profit, dec!(120));
    }
}
