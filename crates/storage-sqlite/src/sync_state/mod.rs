//! SQLite storage for sync bookkeeping (watermarks, queued flag, last
//! result, configuration).

pub mod model;
pub mod repository;

pub use model::{SyncSettingsDB, SyncStatusDB, SyncWatermarkDB};
pub use repository::SyncStateRepository;
