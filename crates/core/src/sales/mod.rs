mod sales_model;

pub use sales_model::*;
