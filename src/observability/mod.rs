//! Logging setup.
//!
//! Library code only talks to the `tracing` facade; the binary decides where
//! events go by installing a subscriber once at startup.

mod tracing_init;

pub use tracing_init::*;
