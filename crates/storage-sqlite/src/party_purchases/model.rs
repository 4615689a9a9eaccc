//! Database row for the `party_purchases` table.

use diesel::prelude::*;

use stockroom_core::errors::{Error, Result};
use stockroom_core::party_purchases::PartyPurchase;

use crate::db::{format_timestamp, parse_decimal, parse_timestamp};

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = crate::schema::party_purchases)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PartyPurchaseDB {
    pub id: String,
    pub party_name: String,
    pub item_name: String,
    pub barcode: Option<String>,
    pub purchase_price: String,
    pub selling_price: String,
    pub purchased_quantity: i64,
    pub remaining_quantity: i64,
    pub purchase_date: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub revision: i64,
}

impl From<&PartyPurchase> for PartyPurchaseDB {
    fn from(purchase: &PartyPurchase) -> Self {
        Self {
            id: purchase.id.clone(),
            party_name: purchase.party_name.clone(),
            item_name: purchase.item_name.clone(),
            barcode: purchase.barcode.clone(),
            purchase_price: purchase.purchase_price.to_string(),
            selling_price: purchase.selling_price.to_string(),
            purchased_quantity: purchase.purchased_quantity,
            remaining_quantity: purchase.remaining_quantity,
            purchase_date: format_timestamp(purchase.purchase_date),
            notes: purchase.notes.clone(),
            created_at: format_timestamp(purchase.created_at),
            updated_at: format_timestamp(purchase.updated_at),
            revision: purchase.revision,
        }
    }
}

impl TryFrom<PartyPurchaseDB> for PartyPurchase {
    type Error = Error;

    fn try_from(row: PartyPurchaseDB) -> Result<Self> {
        Ok(Self {
            id: row.id,
            party_name: row.party_name,
            item_name: row.item_name,
            barcode: row.barcode,
            purchase_price: parse_decimal(&row.purchase_price, "party_purchases.purchase_price")?,
            selling_price: parse_decimal(&row.selling_price, "party_purchases.selling_price")?,
            purchased_quantity: row.purchased_quantity,
            remaining_quantity: row.remaining_quantity,
            purchase_date: parse_timestamp(&row.purchase_date, "party_purchases.purchase_date")?,
            notes: row.notes,
            created_at: parse_timestamp(&row.created_at, "party_purchases.created_at")?,
            updated_at: parse_timestamp(&row.updated_at, "party_purchases.updated_at")?,
            revision: row.revision,
        })
    }
}
