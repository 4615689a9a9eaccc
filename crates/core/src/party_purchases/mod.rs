mod party_purchases_model;

pub use party_purchases_model::*;
