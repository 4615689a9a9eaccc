//! SQLite persistence for the stockroom domain.
//!
//! Implements the `stockroom-core` store traits on top of Diesel, with an
//! r2d2 pool for reads and a single writer thread serializing every
//! mutation. Call [`db::init`] and [`db::run_migrations`] once at startup,
//! then hand the pool plus a [`db::WriteHandle`] to each repository.

pub mod categories;
pub mod db;
pub mod errors;
pub mod party_purchases;
pub mod products;
pub mod sales;
pub mod schema;
pub mod sync_state;

pub use categories::CategoryRepository;
pub use errors::StorageError;
pub use party_purchases::PartyPurchaseRepository;
pub use products::ProductRepository;
pub use sales::SaleRepository;
pub use sync_state::SyncStateRepository;
