//! Database row for the `sales` table.

use diesel::prelude::*;

use stockroom_core::errors::{Error, Result};
use stockroom_core::sales::Sale;

use crate::db::{format_timestamp, parse_decimal, parse_timestamp};

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = crate::schema::sales)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SaleDB {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: String,
    pub total_amount: String,
    pub profit: String,
    pub sale_date: String,
    pub created_at: String,
    pub revision: i64,
}

impl From<&Sale> for SaleDB {
    fn from(sale: &Sale) -> Self {
        Self {
            id: sale.id.clone(),
            product_id: sale.product_id.clone(),
            quantity: sale.quantity,
            unit_price: sale.unit_price.to_string(),
            total_amount: sale.total_amount.to_string(),
            profit: sale.profit.to_string(),
            sale_date: format_timestamp(sale.sale_date),
            created_at: format_timestamp(sale.created_at),
            revision: sale.revision,
        }
    }
}

impl TryFrom<SaleDB> for Sale {
    type Error = Error;

    fn try_from(row: SaleDB) -> Result<Self> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: parse_decimal(&row.unit_price, "sales.unit_price")?,
            total_amount: parse_decimal(&row.total_amount, "sales.total_amount")?,
            profit: parse_decimal(&row.profit, "sales.profit")?,
            sale_date: parse_timestamp(&row.sale_date, "sales.sale_date")?,
            created_at: parse_timestamp(&row.created_at, "sales.created_at")?,
            revision: row.revision,
        })
    }
}
