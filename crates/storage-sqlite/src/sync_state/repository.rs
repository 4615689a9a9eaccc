//! SQLite implementation of the sync bookkeeping store.
//!
//! Watermark writes run on the single writer so the monotonic check and the
//! upsert it guards cannot interleave with another watermark write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;

use stockroom_core::errors::Result;
use stockroom_core::sync::{EntityKind, SyncConfig, SyncDirection, SyncResult, SyncStateStore};

use super::model::{SyncSettingsDB, SyncStatusDB, SyncWatermarkDB};
use crate::db::{format_timestamp, get_connection, parse_timestamp, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{sync_settings, sync_status, sync_watermarks};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub struct SyncStateRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncStateRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn read_status(&self) -> Result<Option<SyncStatusDB>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_status::table
            .find(1)
            .first::<SyncStatusDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row)
    }

    async fn write_status(&self, queued: Option<bool>, last_result: Option<String>) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let now = format_timestamp(Utc::now());
                let current = sync_status::table
                    .find(1)
                    .first::<SyncStatusDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                let mut row = current.unwrap_or_else(|| SyncStatusDB {
                    id: 1,
                    queued: 0,
                    last_result: None,
                    updated_at: now.clone(),
                });
                if let Some(flag) = queued {
                    row.queued = i32::from(flag);
                }
                if let Some(result) = last_result {
                    row.last_result = Some(result);
                }
                row.updated_at = now;

                diesel::insert_into(sync_status::table)
                    .values(&row)
                    .on_conflict(sync_status::id)
                    .do_update()
                    .set((
                        sync_status::queued.eq(row.queued),
                        sync_status::last_result.eq(row.last_result.clone()),
                        sync_status::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl SyncStateStore for SyncStateRepository {
    async fn get_watermark(
        &self,
        entity: EntityKind,
        direction: SyncDirection,
    ) -> Result<DateTime<Utc>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_watermarks::table
            .find((enum_to_db(&entity)?, enum_to_db(&direction)?))
            .first::<SyncWatermarkDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        match row {
            Some(row) => parse_timestamp(&row.ts, "sync_watermarks.ts"),
            None => Ok(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    async fn set_watermark(
        &self,
        entity: EntityKind,
        direction: SyncDirection,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        let entity_value = enum_to_db(&entity)?;
        let direction_value = enum_to_db(&direction)?;
        self.writer
            .exec(move |conn| {
                let existing = sync_watermarks::table
                    .find((&entity_value, &direction_value))
                    .first::<SyncWatermarkDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                if let Some(row) = &existing {
                    let stored = parse_timestamp(&row.ts, "sync_watermarks.ts")?;
                    // Never move a watermark backwards.
                    if ts <= stored {
                        return Ok(());
                    }
                }

                let row = SyncWatermarkDB {
                    entity: entity_value,
                    direction: direction_value,
                    ts: format_timestamp(ts),
                    updated_at: format_timestamp(Utc::now()),
                };
                diesel::insert_into(sync_watermarks::table)
                    .values(&row)
                    .on_conflict((sync_watermarks::entity, sync_watermarks::direction))
                    .do_update()
                    .set((
                        sync_watermarks::ts.eq(row.ts.clone()),
                        sync_watermarks::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn get_last_result(&self) -> Result<Option<SyncResult>> {
        let row = self.read_status()?;
        match row.and_then(|r| r.last_result) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_last_result(&self, result: &SyncResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.write_status(None, Some(json)).await
    }

    async fn is_queued(&self) -> Result<bool> {
        Ok(self.read_status()?.map(|r| r.queued != 0).unwrap_or(false))
    }

    async fn set_queued(&self, queued: bool) -> Result<()> {
        self.write_status(Some(queued), None).await
    }

    async fn get_config(&self) -> Result<Option<SyncConfig>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_settings::table
            .find(1)
            .first::<SyncSettingsDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.config)?)),
            None => Ok(None),
        }
    }

    async fn set_config(&self, config: &SyncConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.writer
            .exec(move |conn| {
                let row = SyncSettingsDB {
                    id: 1,
                    config: json,
                    updated_at: format_timestamp(Utc::now()),
                };
                diesel::insert_into(sync_settings::table)
                    .values(&row)
                    .on_conflict(sync_settings::id)
                    .do_update()
                    .set((
                        sync_settings::config.eq(row.config.clone()),
                        sync_settings::updated_at.eq(row.updated_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use stockroom_core::sync::{SyncStats, SyncStatus};

    use crate::db::{create_pool, init, run_migrations, spawn_writer};

    use super::*;

    fn setup() -> SyncStateRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("run migrations");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        SyncStateRepository::new(pool, writer)
    }

    #[tokio::test]
    async fn watermarks_default_to_epoch_and_never_regress() {
        let repo = setup();

        let initial = repo
            .get_watermark(EntityKind::Product, SyncDirection::Push)
            .await
            .unwrap();
        assert_eq!(initial, DateTime::<Utc>::UNIX_EPOCH);

        let newer = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();

        repo.set_watermark(EntityKind::Product, SyncDirection::Push, newer)
            .await
            .unwrap();
        repo.set_watermark(EntityKind::Product, SyncDirection::Push, older)
            .await
            .unwrap();

        let stored = repo
            .get_watermark(EntityKind::Product, SyncDirection::Push)
            .await
            .unwrap();
        assert_eq!(stored, newer);
    }

    #[tokio::test]
    async fn watermarks_are_keyed_per_entity_and_direction() {
        let repo = setup();

        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        repo.set_watermark(EntityKind::Sale, SyncDirection::Pull, ts)
            .await
            .unwrap();

        assert_eq!(
            repo.get_watermark(EntityKind::Sale, SyncDirection::Pull)
                .await
                .unwrap(),
            ts
        );
        assert_eq!(
            repo.get_watermark(EntityKind::Sale, SyncDirection::Push)
                .await
                .unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );
        assert_eq!(
            repo.get_watermark(EntityKind::Category, SyncDirection::Pull)
                .await
                .unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );
    }

    #[tokio::test]
    async fn queued_flag_and_last_result_live_side_by_side() {
        let repo = setup();

        assert!(!repo.is_queued().await.unwrap());
        repo.set_queued(true).await.unwrap();
        assert!(repo.is_queued().await.unwrap());

        let result = SyncResult {
            status: SyncStatus::Success,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            stats: SyncStats::default(),
            total_synced: 3,
            total_errors: 0,
            duration_ms: 42,
            error: None,
        };
        repo.set_last_result(&result).await.unwrap();

        assert_eq!(repo.get_last_result().await.unwrap(), Some(result));
        // Writing the result must not clobber the queued flag.
        assert!(repo.is_queued().await.unwrap());

        repo.set_queued(false).await.unwrap();
        assert!(!repo.is_queued().await.unwrap());
        assert!(repo.get_last_result().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn config_roundtrips_and_overwrites() {
        let repo = setup();

        assert!(repo.get_config().await.unwrap().is_none());

        let mut config = SyncConfig {
            sync_interval_ms: 60_000,
            ..SyncConfig::default()
        };
        repo.set_config(&config).await.unwrap();
        assert_eq!(repo.get_config().await.unwrap(), Some(config.clone()));

        config.auto_sync = false;
        repo.set_config(&config).await.unwrap();
        let stored = repo.get_config().await.unwrap().unwrap();
        assert!(!stored.auto_sync);
        assert_eq!(stored.sync_interval_ms, 60_000);
    }
}
