//! SQLite-backed sale repository. Sales are append-mostly, so `created_at`
//! doubles as the change timestamp for sync.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;

use stockroom_core::errors::{Error, Result};
use stockroom_core::sales::{Sale, SaleRepositoryTrait};
use stockroom_core::sync::{EntityKind, LocalRecordStore};

use super::model::SaleDB;
use crate::db::{format_timestamp, get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sales;

pub struct SaleRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SaleRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn rows_to_sales(rows: Vec<SaleDB>) -> Result<Vec<Sale>> {
    rows.into_iter().map(Sale::try_from).collect()
}

#[async_trait]
impl LocalRecordStore<Sale> for SaleRepository {
    async fn get(&self, id: &str) -> Result<Option<Sale>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sales::table
            .find(id)
            .first::<SaleDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(Sale::try_from).transpose()
    }

    async fn put(&self, record: Sale) -> Result<Sale> {
        self.writer
            .exec(move |conn| {
                let mut record = record;
                if record.id.is_empty() {
                    record.id = EntityKind::Sale.new_id();
                }
                let existing = sales::table
                    .find(&record.id)
                    .first::<SaleDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                match existing {
                    None => {
                        record.revision = 1;
                        let row = SaleDB::from(&record);
                        diesel::insert_into(sales::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    Some(stored) => {
                        if stored.revision != record.revision {
                            return Err(Error::conflict(EntityKind::Sale, record.id));
                        }
                        record.revision = stored.revision + 1;
                        let row = SaleDB::from(&record);
                        diesel::update(sales::table.find(&record.id))
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
                let affected = diesel::delete(sales::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn list_all(&self) -> Result<Vec<Sale>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sales::table
            .order(sales::sale_date.desc())
            .load::<SaleDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_sales(rows)
    }

    async fn find_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Sale>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sales::table
            .filter(sales::created_at.gt(format_timestamp(since)))
            .order(sales::created_at.asc())
            .load::<SaleDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_sales(rows)
    }
}

#[async_trait]
impl SaleRepositoryTrait for SaleRepository {
    async fn find_by_product(&self, product_id: &str) -> Result<Vec<Sale>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sales::table
            .filter(sales::product_id.eq(product_id))
            .order(sales::sale_date.desc())
            .load::<SaleDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_sales(rows)
    }

    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sale>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sales::table
            .filter(sales::sale_date.ge(format_timestamp(from)))
            .filter(sales::sale_date.le(format_timestamp(to)))
            .order(sales::sale_date.asc())
            .load::<SaleDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_sales(rows)
    }
}
