//! Database row for the `categories` table.

use diesel::prelude::*;

use stockroom_core::categories::Category;
use stockroom_core::errors::{Error, Result};

use crate::db::{format_timestamp, parse_timestamp};

#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone,
)]
#[diesel(primary_key(id))]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryDB {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub revision: i64,
}

impl From<&Category> for CategoryDB {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            created_at: format_timestamp(category.created_at),
            revision: category.revision,
        }
    }
}

impl TryFrom<CategoryDB> for Category {
    type Error = Error;

    fn try_from(row: CategoryDB) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: parse_timestamp(&row.created_at, "categories.created_at")?,
            revision: row.revision,
        })
    }
}
