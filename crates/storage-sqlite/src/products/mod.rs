//! SQLite storage for catalog products.

pub mod model;
pub mod repository;

pub use model::ProductDB;
pub use repository::ProductRepository;

// Re-export domain model from core
pub use stockroom_core::products::Product;
