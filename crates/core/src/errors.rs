use thiserror::Error;

use crate::sync::EntityKind;

/// Storage-layer failures surfaced through the repository traits.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// A local write carried a stale revision. The caller must re-read the
    /// record and retry; the store never retries on its own.
    #[error("Stale revision for {entity} '{id}'")]
    Conflict { entity: EntityKind, id: String },

    /// A single record failed to push or pull. Counted against the cycle,
    /// the rest of the batch continues.
    #[error("Record sync failed for {entity} '{id}': {message}")]
    RecordSync {
        entity: EntityKind,
        id: String,
        message: String,
    },

    /// The whole cycle failed before completing its batches.
    #[error("Sync cycle failed: {0}")]
    Cycle(String),

    /// Raised by the resolver under the manual strategy; the conflict is
    /// parked in the ledger for out-of-band resolution.
    #[error("Manual resolution required for {entity} '{id}'")]
    ManualResolutionRequired { entity: EntityKind, id: String },

    /// The device is offline. Manual sync requests set the queued flag before
    /// returning this.
    #[error("Device is offline")]
    Offline,

    /// Another cycle is already running. Manual triggers surface this,
    /// scheduled ones skip silently.
    #[error("A sync cycle is already in flight")]
    CycleInFlight,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl Error {
    pub fn conflict(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            id: id.into(),
        }
    }

    pub fn record_sync(
        entity: EntityKind,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RecordSync {
            entity,
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::Cycle(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
