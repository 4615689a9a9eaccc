//! Product grouping labels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::sync::{EntityKind, LocalRecordStore, MergePolicy, SyncRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub revision: i64,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityKind::Category.new_id(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
            revision: 0,
        }
    }
}

impl SyncRecord for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn change_timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn set_revision(&mut self, revision: i64) {
        self.revision = revision;
    }

    /// Plain strategy resolution, last-write-wins by default.
    fn merge_policy() -> MergePolicy {
        MergePolicy::strategy_winner()
    }
}

#[async_trait]
pub trait CategoryRepositoryTrait: LocalRecordStore<Category> {
    /// Case-insensitive substring match on the category name.
    async fn find_by_name_contains(&self, needle: &str) -> Result<Vec<Category>>;
}
