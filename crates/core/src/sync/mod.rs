//! Sync domain models and services.

mod engine;
mod events;
mod ledger;
mod manager;
mod model;
mod monitor;
mod record;
mod resolver;
mod scheduler;
mod store;

pub use engine::*;
pub use events::*;
pub use ledger::*;
pub use manager::*;
pub use model::*;
pub use monitor::*;
pub use record::*;
pub use resolver::*;
pub use scheduler::*;
pub use store::*;
