//! SQLite storage for bulk purchases from supplier parties.

pub mod model;
pub mod repository;

pub use model::PartyPurchaseDB;
pub use repository::PartyPurchaseRepository;

// Re-export domain model from core
pub use stockroom_core::party_purchases::PartyPurchase;
