//! Database row for the `products` table.
//!
//! Money is stored as TEXT in canonical decimal form and timestamps as
//! fixed-width RFC3339 TEXT, so reading a row back is fallible.

use diesel::prelude::*;

use stockroom_core::errors::{Error, Result};
use stockroom_core::products::Product;

use crate::db::{format_timestamp, parse_decimal, parse_timestamp};

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductDB {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub purchase_price: String,
    pub selling_price: String,
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub revision: i64,
}

impl From<&Product> for ProductDB {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            barcode: product.barcode.clone(),
            category_id: product.category_id.clone(),
            purchase_price: product.purchase_price.to_string(),
            selling_price: product.selling_price.to_string(),
            stock_quantity: product.stock_quantity,
            min_stock_level: product.min_stock_level,
            description: product.description.clone(),
            created_at: format_timestamp(product.created_at),
            updated_at: format_timestamp(product.updated_at),
            revision: product.revision,
        }
    }
}

impl TryFrom<ProductDB> for Product {
    type Error = Error;

    fn try_from(row: ProductDB) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            barcode: row.barcode,
            category_id: row.category_id,
            purchase_price: parse_decimal(&row.purchase_price, "products.purchase_price")?,
            selling_price: parse_decimal(&row.selling_price, "products.selling_price")?,
            stock_quantity: row.stock_quantity,
            min_stock_level: row.min_stock_level,
            description: row.description,
            created_at: parse_timestamp(&row.created_at, "products.created_at")?,
            updated_at: parse_timestamp(&row.updated_at, "products.updated_at")?,
            revision: row.revision,
        })
    }
}
