//! Retention decisions and their execution.
//!
//! [`analyze`] classifies an inventory snapshot under a [`RetentionPolicy`]
//! without touching the cluster. [`DeletionExecutor`] applies the resulting
//! plan when the run is not a dry run.

mod executor;
mod policy;

pub use executor::{DeletionExecutor, DeletionFailure, DeletionReport, IndexDeleter};
pub use policy::{AnalysisResult, DeletionReason, RetentionPolicy, analyze};
