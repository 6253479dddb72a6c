//! One end-to-end trimming run: validate, inventory, analyze, delete.

use chrono::{DateTime, Utc};

use crate::{
    config::{ConfigError, TrimmerConfig},
    elasticsearch::{ClusterHealth, ElasticsearchClient, EnrichmentWarning, RequestError},
    retention::{AnalysisResult, DeletionExecutor, DeletionReport, RetentionPolicy},
};

/// Errors that stop a run before any deletion is attempted.
#[derive(Debug, thiserror::Error)]
pub enum TrimmerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Elasticsearch request failed: {0}")]
    Request(#[from] RequestError),
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub policy: RetentionPolicy,
    /// `None` when the health check was skipped.
    pub health: Option<ClusterHealth>,
    pub warnings: Vec<EnrichmentWarning>,
    pub analysis: AnalysisResult,
    /// `None` for a dry run or when nothing needed deleting.
    pub deletion: Option<DeletionReport>,
    pub dry_run: bool,
}

impl RunOutcome {
    /// 0 on success, 2 when any deletion failed.
    pub fn exit_code(&self) -> u8 {
        match &self.deletion {
            Some(report) if !report.is_success() => 2,
            _ => 0,
        }
    }
}

/// Run once against the cluster described by `config`, as of now.
pub async fn run(config: &TrimmerConfig) -> Result<RunOutcome, TrimmerError> {
    run_at(config, Utc::now()).await
}

/// Run once with an explicit reference time for the age cutoff.
pub async fn run_at(config: &TrimmerConfig, now: DateTime<Utc>) -> Result<RunOutcome, TrimmerError> {
    let policy = config.validate()?;
    let dry_run = !config.delete_indexes;

    tracing::info!(
        component = "trimmer",
        operation = "run",
        host = %config.host,
        index_pattern = %config.index_pattern,
        max_age = config.max_age.as_deref().unwrap_or(""),
        max_size = config.max_size.as_deref().unwrap_or(""),
        dry_run,
        "Starting log trimmer"
    );

    let client = ElasticsearchClient::new(config)?;

    let health = if config.health_check {
        Some(client.cluster_health().await?)
    } else {
        None
    };

    let inventory = client.list_indexes(&config.index_pattern).await?;
    let analysis = policy.analyze(inventory.records, now);

    let deletion = if !analysis.has_deletions() {
        tracing::info!(
            component = "trimmer",
            operation = "run",
            "No indexes need to be deleted"
        );
        None
    } else if dry_run {
        tracing::info!(
            component = "trimmer",
            operation = "run",
            count = analysis.to_delete.len(),
            "Dry run mode - would delete indexes"
        );
        None
    } else {
        let report = DeletionExecutor::new(&client, config.max_concurrent_requests)
            .execute(&analysis.to_delete)
            .await;
        Some(report)
    };

    Ok(RunOutcome {
        policy,
        health,
        warnings: inventory.warnings,
        analysis,
        deletion,
        dry_run,
    })
}
