//! SQLite storage for product categories.

pub mod model;
pub mod repository;

pub use model::CategoryDB;
pub use repository::CategoryRepository;

// Re-export domain model from core
pub use stockroom_core::categories::Category;
