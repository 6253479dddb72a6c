//! Cluster inventory client.
//!
//! Lists indexes over the `_cat/indices` API, resolves each one's size and
//! creation time, and deletes indexes on request.

mod client;
mod types;

pub use client::{ElasticsearchClient, RequestError, RequestResult};
pub use types::*;
