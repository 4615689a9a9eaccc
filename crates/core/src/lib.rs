//! Offline-first synchronization core for the Stockroom inventory system.
//!
//! This crate holds the domain entities, the conflict resolution policy and the
//! sync engine. Storage and transport are abstracted behind the traits in
//! [`sync`]; the SQLite and HTTP implementations live in sibling crates.

pub mod categories;
pub mod errors;
pub mod party_purchases;
pub mod products;
pub mod sales;
pub mod sync;
