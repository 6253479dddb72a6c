//! Elasticsearch index retention.
//!
//! Lists the indexes matching a pattern, decides which ones break an age
//! and/or total size limit, and deletes them oldest first. Runs are dry runs
//! unless deletion is explicitly enabled.

pub mod cli;
pub mod config;
pub mod elasticsearch;
pub mod format;
pub mod observability;
pub mod report;
pub mod retention;
pub mod trimmer;
pub mod units;
