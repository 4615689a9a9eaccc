//! Database rows for the sync bookkeeping tables.
//!
//! `sync_status` and `sync_settings` are single-row tables keyed on
//! `id = 1`; `sync_watermarks` holds one row per (entity, direction) pair.

use diesel::prelude::*;

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(entity, direction))]
#[diesel(table_name = crate::schema::sync_watermarks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncWatermarkDB {
    pub entity: String,
    pub direction: String,
    pub ts: String,
    pub updated_at: String,
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = crate::schema::sync_status)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncStatusDB {
    pub id: i32,
    pub queued: i32,
    pub last_result: Option<String>,
    pub updated_at: String,
}

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = crate::schema::sync_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncSettingsDB {
    pub id: i32,
    pub config: String,
    pub updated_at: String,
}
