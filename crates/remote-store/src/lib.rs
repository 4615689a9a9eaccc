//! Remote record store client for the stockroom sync layer.
//!
//! Implements the `stockroom-core` remote store contract over the hosted
//! PostgREST backend: blind id-keyed upserts on push, strictly-after
//! timestamp windows on pull.

pub mod client;
pub mod error;

pub use client::RemoteStoreClient;
pub use error::{ApiRetryClass, RemoteStoreError};
