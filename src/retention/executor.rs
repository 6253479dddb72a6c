//! Applies a deletion plan against the cluster.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde::Serialize;

use crate::elasticsearch::{ElasticsearchClient, IndexRecord, RequestError};

/// Anything that can delete an index by name.
#[async_trait]
pub trait IndexDeleter: Send + Sync {
    async fn delete_index(&self, name: &str) -> Result<(), RequestError>;
}

#[async_trait]
impl IndexDeleter for ElasticsearchClient {
    async fn delete_index(&self, name: &str) -> Result<(), RequestError> {
        ElasticsearchClient::delete_index(self, name).await
    }
}

/// One index that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionFailure {
    pub index: String,
    /// HTTP status, if the cluster answered.
    pub status: Option<u16>,
    pub reason: String,
}

/// Outcome of applying a deletion plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    /// Deleted index names, in plan order.
    pub deleted: Vec<String>,
    /// Failures, in plan order.
    pub failed: Vec<DeletionFailure>,
    /// Sum of the sizes of successfully deleted indexes.
    pub freed_bytes: u64,
}

impl DeletionReport {
    pub fn succeeded_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }

    /// True only if every attempted deletion succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes the indexes chosen by the retention analysis.
///
/// Failures are recorded and never stop the batch. Up to
/// `max_concurrent_requests` deletions are in flight at once; the report
/// keeps plan order regardless.
pub struct DeletionExecutor<'a, D: IndexDeleter + ?Sized> {
    deleter: &'a D,
    max_concurrent_requests: usize,
}

impl<'a, D: IndexDeleter + ?Sized> DeletionExecutor<'a, D> {
    pub fn new(deleter: &'a D, max_concurrent_requests: usize) -> Self {
        Self {
            deleter,
            max_concurrent_requests: max_concurrent_requests.max(1),
        }
    }

    pub async fn execute(&self, targets: &[IndexRecord]) -> DeletionReport {
        tracing::info!(
            component = "deletion",
            operation = "execute",
            count = targets.len(),
            "Starting index deletion"
        );

        let outcomes: Vec<(&IndexRecord, Result<(), RequestError>)> = stream::iter(targets)
            .map(|record| async move { (record, self.deleter.delete_index(&record.name).await) })
            .buffered(self.max_concurrent_requests)
            .collect()
            .await;

        let mut report = DeletionReport::default();
        for (record, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    report.deleted.push(record.name.clone());
                    report.freed_bytes = report.freed_bytes.saturating_add(record.effective_size());
                }
                Err(e) => {
                    tracing::warn!(
                        component = "deletion",
                        operation = "execute",
                        index = %record.name,
                        error = %e,
                        "Index deletion failed, continuing with the rest"
                    );
                    report.failed.push(DeletionFailure {
                        index: record.name.clone(),
                        status: e.status().map(|s| s.as_u16()),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_success() {
            tracing::info!(
                component = "deletion",
                operation = "execute",
                deleted = report.succeeded_count(),
                freed_bytes = report.freed_bytes,
                "Deletion complete"
            );
        } else {
            tracing::error!(
                component = "deletion",
                operation = "execute",
                deleted = report.succeeded_count(),
                failed = report.failed_count(),
                "Deletion finished with failures"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reqwest::{Method, StatusCode};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::config::TrimmerConfig;

    /// Records every call; fails for the configured names.
    #[derive(Default)]
    struct FakeDeleter {
        fail: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IndexDeleter for FakeDeleter {
        async fn delete_index(&self, name: &str) -> Result<(), RequestError> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.fail.iter().any(|f| *f == name) {
                return Err(RequestError::Status {
                    method: Method::DELETE,
                    url: format!("http://fake/{name}"),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "shard failure".into(),
                });
            }
            Ok(())
        }
    }

    fn targets(names: &[&str]) -> Vec<IndexRecord> {
        names
            .iter()
            .map(|n| IndexRecord::named(*n).with_size(100))
            .collect()
    }

    #[tokio::test]
    async fn test_middle_failure_does_not_stop_batch() {
        let deleter = FakeDeleter {
            fail: vec!["b"],
            ..Default::default()
        };
        let report = DeletionExecutor::new(&deleter, 1)
            .execute(&targets(&["a", "b", "c"]))
            .await;

        assert_eq!(*deleter.calls.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(report.succeeded_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.deleted, ["a", "c"]);
        assert_eq!(report.failed[0].index, "b");
        assert_eq!(report.failed[0].status, Some(500));
        assert!(report.failed[0].reason.contains("shard failure"));
        assert_eq!(report.freed_bytes, 200);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let deleter = FakeDeleter::default();
        let report = DeletionExecutor::new(&deleter, 4)
            .execute(&targets(&["a", "b", "c", "d", "e"]))
            .await;

        assert!(report.is_success());
        assert_eq!(report.deleted, ["a", "b", "c", "d", "e"]);
        assert_eq!(deleter.calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_report_keeps_plan_order() {
        let deleter = FakeDeleter {
            fail: vec!["b", "d"],
            ..Default::default()
        };
        let report = DeletionExecutor::new(&deleter, 3)
            .execute(&targets(&["a", "b", "c", "d", "e"]))
            .await;

        assert_eq!(report.deleted, ["a", "c", "e"]);
        let failed: Vec<_> = report.failed.iter().map(|f| f.index.as_str()).collect();
        assert_eq!(failed, ["b", "d"]);
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let deleter = FakeDeleter::default();
        let report = DeletionExecutor::new(&deleter, 0).execute(&[]).await;
        assert_eq!(report, DeletionReport::default());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_against_cluster() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/logs-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/logs-2"))
            .respond_with(ResponseTemplate::new(404).set_body_string("index_not_found_exception"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/logs-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let config = TrimmerConfig {
            host: server.uri(),
            ..Default::default()
        };
        let client = ElasticsearchClient::new(&config).unwrap();
        let report = DeletionExecutor::new(&client, 2)
            .execute(&targets(&["logs-1", "logs-2", "logs-3"]))
            .await;

        assert_eq!(report.deleted, ["logs-1", "logs-3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].status, Some(404));
        assert!(report.failed[0].reason.contains("index_not_found_exception"));
    }

    #[tokio::test]
    async fn test_deletions_respect_concurrency_limit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"acknowledged": true}))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .expect(6)
            .mount(&server)
            .await;

        let config = TrimmerConfig {
            host: server.uri(),
            ..Default::default()
        };
        let client = ElasticsearchClient::new(&config).unwrap();

        let started = std::time::Instant::now();
        let report = DeletionExecutor::new(&client, 2)
            .execute(&targets(&["a", "b", "c", "d", "e", "f"]))
            .await;
        let elapsed = started.elapsed();

        assert_eq!(report.deleted, ["a", "b", "c", "d", "e", "f"]);
        // Three waves of two.
        assert!(elapsed >= std::time::Duration::from_millis(850), "took {elapsed:?}");
        assert!(elapsed < std::time::Duration::from_millis(1700), "took {elapsed:?}");
    }
}
