//! SQLite-backed party purchase repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;

use stockroom_core::errors::{Error, Result};
use stockroom_core::party_purchases::{PartyPurchase, PartyPurchaseRepositoryTrait};
use stockroom_core::sync::{EntityKind, LocalRecordStore};

use super::model::PartyPurchaseDB;
use crate::db::{format_timestamp, get_connection, like_pattern, WriteHandle};
use crate::errors::StorageError;
use crate::schema::party_purchases;

pub struct PartyPurchaseRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PartyPurchaseRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn rows_to_purchases(rows: Vec<PartyPurchaseDB>) -> Result<Vec<PartyPurchase>> {
    rows.into_iter().map(PartyPurchase::try_from).collect()
}

#[async_trait]
impl LocalRecordStore<PartyPurchase> for PartyPurchaseRepository {
    async fn get(&self, id: &str) -> Result<Option<PartyPurchase>> {
        let mut conn = get_connection(&self.pool)?;
        let row = party_purchases::table
            .find(id)
            .first::<PartyPurchaseDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(PartyPurchase::try_from).transpose()
    }

    async fn put(&self, record: PartyPurchase) -> Result<PartyPurchase> {
        self.writer
            .exec(move |conn| {
                let mut record = record;
                if record.id.is_empty() {
                    record.id = EntityKind::PartyPurchase.new_id();
                }
                let existing = party_purchases::table
                    .find(&record.id)
                    .first::<PartyPurchaseDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                match existing {
                    None => {
                        record.revision = 1;
                        let row = PartyPurchaseDB::from(&record);
                        diesel::insert_into(party_purchases::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    Some(stored) => {
                        if stored.revision != record.revision {
                            return Err(Error::conflict(EntityKind::PartyPurchase, record.id));
                        }
                        record.revision = stored.revision + 1;
                        let row = PartyPurchaseDB::from(&record);
                        diesel::update(party_purchases::table.find(&record.id))
                            .set(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }
                Ok(record)
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let affected = diesel::delete(party_purchases::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn list_all(&self) -> Result<Vec<PartyPurchase>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = party_purchases::table
            .order(party_purchases::purchase_date.desc())
            .load::<PartyPurchaseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_purchases(rows)
    }

    async fn find_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<PartyPurchase>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = party_purchases::table
            .filter(party_purchases::updated_at.gt(format_timestamp(since)))
            .order(party_purchases::updated_at.asc())
            .load::<PartyPurchaseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_purchases(rows)
    }
}

#[async_trait]
impl PartyPurchaseRepositoryTrait for PartyPurchaseRepository {
    async fn find_by_party_name_contains(&self, needle: &str) -> Result<Vec<PartyPurchase>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = party_purchases::table
            .filter(party_purchases::party_name.like(like_pattern(needle)).escape('\\'))
            .order(party_purchases::purchase_date.desc())
            .load::<PartyPurchaseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_purchases(rows)
    }

    async fn find_with_remaining(&self) -> Result<Vec<PartyPurchase>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = party_purchases::table
            .filter(party_purchases::remaining_quantity.gt(0i64))
            .order(party_purchases::purchase_date.desc())
            .load::<PartyPurchaseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_purchases(rows)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    use crate::db::{create_pool, init, run_migrations, spawn_writer};

    use super::*;

    fn setup() -> PartyPurchaseRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("run migrations");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        PartyPurchaseRepository::new(pool, writer)
    }

    #[tokio::test]
    async fn transfer_persists_and_drops_out_of_remaining() {
        let repo = setup();

        let stored = repo
            .put(PartyPurchase::new(
                "Sharma Traders",
                "Detergent 1kg",
                dec!(85),
                dec!(105),
                50,
            ))
            .await
            .unwrap();
        assert_eq!(stored.remaining_quantity, 50);

        let mut transferred = stored.clone();
        transferred.transfer(50).unwrap();
        let transferred = repo.put(transferred).await.unwrap();
        assert_eq!(transferred.revision, 2);

        let fetched = repo.get(&transferred.id).await.unwrap().unwrap();
        assert_eq!(fetched.remaining_quantity, 0);
        assert!(repo.find_with_remaining().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn party_name_search_matches_substring() {
        let repo = setup();

        repo.put(PartyPurchase::new(
            "Sharma Traders",
            "Detergent 1kg",
            dec!(85),
            dec!(105),
            50,
        ))
        .await
        .unwrap();
        repo.put(PartyPurchase::new(
            "Gupta & Sons",
            "Biscuits",
            dec!(10),
            dec!(12),
            200,
        ))
        .await
        .unwrap();

        let found = repo.find_by_party_name_contains("sharma").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].party_name, "Sharma Traders");
    }
}
