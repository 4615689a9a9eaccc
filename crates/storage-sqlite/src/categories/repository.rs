//! SQLite-backed category repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;

use stockroom_core::categories::{Category, CategoryRepositoryTrait};
use stockroom_core::errors::{Error, Result};
use stockroom_core::sync::{EntityKind, LocalRecordStore};

use super::model::CategoryDB;
use crate::db::{format_timestamp, get_connection, like_pattern, WriteHandle};
use crate::errors::StorageError;
use crate::schema::categories;

pub struct CategoryRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl CategoryRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn rows_to_categories(rows: Vec<CategoryDB>) -> Result<Vec<Category>> {
    rows.into_iter().map(Category::try_from).collect()
}

#[async_trait]
impl LocalRecordStore<Category> for CategoryRepository {
    async fn get(&self, id: &str) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let row = categories::table
            .find(id)
            .first::<CategoryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(Category::try_from).transpose()
    }

    async fn put(&self, record: Category) -> Result<Category> {
        self.writer
            .exec(move |conn| {
                let mut record = record;
                if record.id.is_empty() {
                    record.id = EntityKind::Category.new_id();
                }
                let existing = categories::table
                    .find(&record.id)
                    .first::<CategoryDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                match existing {
                    None => {
                        record.revision = 1;
                        let row = CategoryDB::from(&record);
                        diesel::insert_into(categories::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    Some(stored) => {
                        if stored.revision != record.revision {
                            return Err(Error::conflict(EntityKind::Category, record.id));
                        }
                        record.revision = stored.revision + 1;
                        let row = CategoryDB::from(&record);
                        diesel::update(categories::table.find(&record.id))
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
                let affected = diesel::delete(categories::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn list_all(&self) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categories::table
            .order(categories::name.asc())
            .load::<CategoryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_categories(rows)
    }

    async fn find_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categories::table
            .filter(categories::created_at.gt(format_timestamp(since)))
            .order(categories::created_at.asc())
            .load::<CategoryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_categories(rows)
    }
}

#[async_trait]
impl CategoryRepositoryTrait for CategoryRepository {
    async fn find_by_name_contains(&self, needle: &str) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = categories::table
            .filter(categories::name.like(like_pattern(needle)).escape('\\'))
            .order(categories::name.asc())
            .load::<CategoryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows_to_categories(rows)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::db::{create_pool, init, run_migrations, spawn_writer};

    use super::*;

    fn setup() -> CategoryRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("run migrations");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        CategoryRepository::new(pool, writer)
    }

    #[tokio::test]
    async fn roundtrip_and_name_search() {
        let repo = setup();

        let mut grocery = Category::new("Grocery");
        grocery.description = Some("Dry goods and staples".to_string());
        let grocery = repo.put(grocery).await.unwrap();
        repo.put(Category::new("Cosmetics")).await.unwrap();

        let fetched = repo.get(&grocery.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Grocery");
        assert_eq!(fetched.description.as_deref(), Some("Dry goods and staples"));

        let found = repo.find_by_name_contains("groc").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, grocery.id);

        assert_eq!(repo.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let repo = setup();

        let stored = repo.put(Category::new("Household")).await.unwrap();

        let mut fresh = stored.clone();
        fresh.name = "Household Goods".to_string();
        repo.put(fresh).await.unwrap();

        let mut stale = stored;
        stale.name = "Overwritten".to_string();
        let err = repo.put(stale).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }
}
