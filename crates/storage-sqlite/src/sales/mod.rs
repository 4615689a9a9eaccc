//! SQLite storage for completed sales.

pub mod model;
pub mod repository;

pub use model::SaleDB;
pub use repository::SaleRepository;

// Re-export domain model from core
pub use stockroom_core::sales::Sale;
