//! SQLite-backed product repository.
//!
//! Reads go straight to the pool; every mutation runs on the single writer
//! so the revision check and the write it guards are one atomic step.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;

use stockroom_core::errors::{Error, Result};
use stockroom_core::products::{Product, ProductRepositoryTrait};
use stockroom_core::sync::{EntityKind, LocalRecordStore};

use super::model::ProductDB;
use crate::db::{format_timestamp, get_connection, like_pattern, WriteHandle};
use crate::errors::StorageError;
use crate::schema::products;

pub struct ProductRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ProductRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn rows_to_products(rows: Vec<ProductDB>) -> Result<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

#[async_trait]
impl LocalRecordStore<Product> for ProductRepository {
    async fn get(&self, id: &str) -> Result<Option<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let row = products::table
            .find(id)
            .first::<ProductDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(Product::try_from).transpose()
    }

    async fn put(&self, record: Product) -> Result<Product> {
        self.writer
            .exec(move |conn| {
                let mut record = record;
                if record.id.is_empty() {
                    record.id = EntityKind::Product.new_id();
                }
                let existing = products::table
                    .find(&record.id)
                    .first::<ProductDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                match existing {
                    None => {
                        record.revision = 1;
                        let row = ProductDB::from(&record);
                        diesel::insert_into(products::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    Some(stored) => {
                        if stored.revision != record.revision {
                            return Err(Error::conflict(EntityKind::Product, record.id));
                        }
                        record.revision = stored.revision + 1;
                        let row = ProductDB::from(&record);
                        diesel::update(products::table.find(&record.id))
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
                let affected = diesel::delete(products::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = products::table
            .order(products::name.asc())
            .load::<ProductDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_products(rows)
    }

    async fn find_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = products::table
            .filter(products::updated_at.gt(format_timestamp(since)))
            .order(products::updated_at.asc())
            .load::<ProductDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_products(rows)
    }
}

#[async_trait]
impl ProductRepositoryTrait for ProductRepository {
    async fn find_by_name_contains(&self, needle: &str) -> Result<Vec<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = products::table
            .filter(products::name.like(like_pattern(needle)).escape('\\'))
            .order(products::name.asc())
            .load::<ProductDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_products(rows)
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let row = products::table
            .filter(products::barcode.eq(barcode))
            .first::<ProductDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(Product::try_from).transpose()
    }

    async fn find_by_category(&self, category_id: &str) -> Result<Vec<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = products::table
            .filter(products::category_id.eq(category_id))
            .order(products::name.asc())
            .load::<ProductDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_products(rows)
    }

    async fn find_low_stock(&self) -> Result<Vec<Product>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = products::table
            .filter(products::stock_quantity.le(products::min_stock_level))
            .order(products::name.asc())
            .load::<ProductDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_products(rows)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    use crate::db::{create_pool, init, run_migrations, spawn_writer};

    use super::*;

    fn setup() -> ProductRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("run migrations");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        ProductRepository::new(pool, writer)
    }

    #[tokio::test]
    async fn put_assigns_first_revision_and_roundtrips() {
        let repo = setup();

        let mut product = Product::new("Atta 10kg", dec!(380), dec!(430), 100);
        product.barcode = Some("8901234567890".to_string());
        let stored = repo.put(product).await.unwrap();
        assert_eq!(stored.revision, 1);

        let fetched = repo.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Atta 10kg");
        assert_eq!(fetched.barcode.as_deref(), Some("8901234567890"));
        assert_eq!(fetched.purchase_price, dec!(380));
        assert_eq!(fetched.selling_price, dec!(430));
        assert_eq!(fetched.stock_quantity, 100);
        assert_eq!(fetched.revision, 1);
    }

    #[tokio::test]
    async fn empty_id_gets_a_namespaced_one() {
        let repo = setup();

        let mut product = Product::new("Sugar 1kg", dec!(42), dec!(48), 25);
        product.id = String::new();
        let stored = repo.put(product).await.unwrap();

        assert!(stored.id.starts_with("product_"));
        assert!(repo.get(&stored.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_revision_update_is_rejected_and_writes_nothing() {
        let repo = setup();

        let stored = repo
            .put(Product::new("Rice 5kg", dec!(300), dec!(350), 40))
            .await
            .unwrap();

        let mut fresh = stored.clone();
        fresh.selling_price = dec!(360);
        let updated = repo.put(fresh).await.unwrap();
        assert_eq!(updated.revision, 2);

        // Still carries revision 1.
        let mut stale = stored;
        stale.selling_price = dec!(999);
        let err = repo.put(stale).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let current = repo.get(&updated.id).await.unwrap().unwrap();
        assert_eq!(current.selling_price, dec!(360));
        assert_eq!(current.revision, 2);
    }

    #[tokio::test]
    async fn changed_since_is_strict_and_ascending() {
        let repo = setup();

        let first = repo
            .put(Product::new("Salt 1kg", dec!(18), dec!(22), 60))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo
            .put(Product::new("Tea 500g", dec!(210), dec!(245), 15))
            .await
            .unwrap();

        let all = repo
            .find_changed_since(DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);

        // Strictly greater: the row stamped exactly at the cutoff stays out.
        let after_first = repo.find_changed_since(first.updated_at).await.unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].id, second.id);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let repo = setup();

        let stored = repo
            .put(Product::new("Soap Bar", dec!(28), dec!(35), 80))
            .await
            .unwrap();

        assert!(repo.delete(&stored.id).await.unwrap());
        assert!(repo.get(&stored.id).await.unwrap().is_none());
        assert!(!repo.delete(&stored.id).await.unwrap());
    }

    #[tokio::test]
    async fn catalog_queries_filter_as_expected() {
        let repo = setup();

        let mut atta = Product::new("Atta 10kg", dec!(380), dec!(430), 100);
        atta.category_id = Some("category_grocery".to_string());
        let mut oil = Product::new("Mustard Oil 1L", dec!(130), dec!(155), 3);
        oil.min_stock_level = 5;
        oil.barcode = Some("8900000000017".to_string());
        repo.put(atta).await.unwrap();
        let oil = repo.put(oil).await.unwrap();

        let matches = repo.find_by_name_contains("atta").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Atta 10kg");

        let by_barcode = repo.find_by_barcode("8900000000017").await.unwrap();
        assert_eq!(by_barcode.map(|p| p.id), Some(oil.id.clone()));

        let grocery = repo.find_by_category("category_grocery").await.unwrap();
        assert_eq!(grocery.len(), 1);

        let low = repo.find_low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, oil.id);
    }

    #[tokio::test]
    async fn name_search_treats_wildcards_literally() {
        let repo = setup();

        repo.put(Product::new("Dettol 100% Original", dec!(45), dec!(55), 30))
            .await
            .unwrap();
        repo.put(Product::new("Dettol 100g Soap", dec!(40), dec!(48), 20))
            .await
            .unwrap();

        // An unescaped needle would match both rows via the % wildcard.
        let matches = repo.find_by_name_contains("100%").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Dettol 100% Original");

        // Same for the single-character wildcard.
        let underscore = repo.find_by_name_contains("100_").await.unwrap();
        assert!(underscore.is_empty());
    }
}
