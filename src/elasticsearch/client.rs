//! HTTP client for the cluster's administrative API.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{CatIndex, ClusterHealth, Enrichment, EnrichmentIssue, IndexRecord, Inventory};
use crate::{config::TrimmerConfig, units::parse_store_size};

/// Error type for cluster requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("{method} {url} timed out")]
    Timeout { method: Method, url: String },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RequestError {
    fn from_reqwest(method: &Method, url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                method: method.clone(),
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                method: method.clone(),
                url: url.to_string(),
                source,
            }
        }
    }

    /// HTTP status, when the cluster answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type RequestResult<T> = Result<T, RequestError>;

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Client for an Elasticsearch-compatible cluster.
///
/// Every request carries the configured timeout and, if both a username and
/// password are configured, basic credentials.
///
/// # Example
/// ```ignore
/// let client = ElasticsearchClient::new(&config)?;
/// let inventory = client.list_indexes("logs-*").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http_client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    max_concurrent_requests: usize,
}

impl ElasticsearchClient {
    /// Create a client from a validated configuration.
    pub fn new(config: &TrimmerConfig) -> RequestResult<Self> {
        let mut builder = Client::builder().timeout(config.request_timeout());

        if config.skip_tls_verify {
            tracing::warn!(
                component = "elasticsearch",
                operation = "new_client",
                host = %config.host,
                "TLS certificate verification is DISABLED for this cluster; \
                 connections are open to interception"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http_client = builder
            .build()
            .map_err(|e| RequestError::Client(e.to_string()))?;

        let base_url = Url::parse(config.host.trim())
            .map_err(|e| RequestError::Client(format!("invalid host '{}': {e}", config.host)))?;
        if base_url.cannot_be_a_base() {
            return Err(RequestError::Client(format!(
                "host '{}' cannot be used as a base URL",
                config.host
            )));
        }

        let credentials = config
            .credentials()
            .map(|(username, password)| Credentials {
                username: username.to_string(),
                password: password.to_string(),
            });

        Ok(Self {
            http_client,
            base_url,
            credentials,
            max_concurrent_requests: config.max_concurrent_requests.max(1),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn uses_basic_auth(&self) -> bool {
        self.credentials.is_some()
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, method: Method, url: Url) -> RequestResult<Response> {
        tracing::debug!(
            component = "elasticsearch",
            operation = "request",
            method = %method,
            url = %url,
            "Sending request"
        );

        let mut request = self.http_client.request(method.clone(), url.clone());
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(&method, &url, e))?;

        tracing::debug!(
            component = "elasticsearch",
            operation = "response",
            method = %method,
            url = %url,
            status = response.status().as_u16(),
            "Received response"
        );

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        Err(RequestError::Status {
            method,
            url: url.to_string(),
            status,
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> RequestResult<T> {
        let response = self.send(Method::GET, url.clone()).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::from_reqwest(&Method::GET, &url, e))?;
        serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch cluster name, status and node count.
    pub async fn cluster_health(&self) -> RequestResult<ClusterHealth> {
        tracing::info!(
            component = "elasticsearch",
            operation = "cluster_health",
            "Retrieving cluster health information"
        );

        let health: ClusterHealth = self
            .get_json(self.endpoint(&["_cluster", "health"]))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    component = "elasticsearch",
                    operation = "cluster_health",
                    error = %e,
                    "Failed to get cluster health"
                );
            })?;

        tracing::info!(
            component = "elasticsearch",
            operation = "cluster_health",
            cluster_name = %health.cluster_name,
            status = %health.status,
            node_count = health.number_of_nodes,
            "Retrieved cluster health"
        );

        Ok(health)
    }

    /// List the raw `_cat/indices` rows matching `pattern`.
    pub async fn cat_indices(&self, pattern: &str) -> RequestResult<Vec<CatIndex>> {
        let mut url = self.endpoint(&["_cat", "indices", pattern]);
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("bytes", "b");

        self.get_json(url).await
    }

    /// Look up an index's creation time from its settings.
    ///
    /// Returns `Ok(None)` when the settings answer but carry no usable
    /// `index.creation_date`.
    pub async fn index_creation_time(&self, index: &str) -> RequestResult<Option<DateTime<Utc>>> {
        let settings: serde_json::Value = self.get_json(self.endpoint(&[index, "_settings"])).await?;
        Ok(creation_time_from_settings(&settings, index))
    }

    /// Resolve size and creation time for one listed index.
    ///
    /// Never fails: whatever cannot be resolved is reported as an issue and
    /// left unset on the record.
    pub async fn enrich(&self, row: CatIndex) -> Enrichment {
        let mut issues = Vec::new();

        let size_bytes = match row.store_size.as_deref() {
            Some(raw) => match parse_store_size(raw) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    issues.push(EnrichmentIssue::SizeUnparseable {
                        raw: raw.to_string(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            None => {
                issues.push(EnrichmentIssue::SizeMissing);
                None
            }
        };

        let creation_time = match self.index_creation_time(&row.index).await {
            Ok(Some(created)) => Some(created),
            Ok(None) => {
                issues.push(EnrichmentIssue::CreationDateMissing);
                None
            }
            Err(e) => {
                issues.push(EnrichmentIssue::SettingsUnavailable(e.to_string()));
                None
            }
        };

        let record = IndexRecord {
            health: row.health,
            status: row.status,
            primary_shards: parse_count(row.pri.as_deref()).and_then(|n| u32::try_from(n).ok()),
            replica_shards: parse_count(row.rep.as_deref()).and_then(|n| u32::try_from(n).ok()),
            doc_count: parse_count(row.docs_count.as_deref()).unwrap_or(0),
            deleted_doc_count: parse_count(row.docs_deleted.as_deref()).unwrap_or(0),
            size_bytes,
            primary_size_bytes: row
                .pri_store_size
                .as_deref()
                .and_then(|raw| parse_store_size(raw).ok()),
            creation_time,
            uuid: row.uuid,
            name: row.index,
        };

        Enrichment { record, issues }
    }

    /// List every index matching `pattern` and enrich each one.
    ///
    /// A failed listing aborts the call. Enrichment runs with at most
    /// `max_concurrent_requests` settings lookups in flight, and one index's
    /// failure never affects another's. Records keep listing order.
    pub async fn list_indexes(&self, pattern: &str) -> RequestResult<Inventory> {
        tracing::info!(
            component = "elasticsearch",
            operation = "get_indexes",
            pattern = %pattern,
            "Retrieving indexes"
        );

        let rows = self.cat_indices(pattern).await.inspect_err(|e| {
            tracing::error!(
                component = "elasticsearch",
                operation = "get_indexes",
                pattern = %pattern,
                error = %e,
                "Failed to get indexes"
            );
        })?;

        tracing::info!(
            component = "elasticsearch",
            operation = "get_indexes",
            pattern = %pattern,
            count = rows.len(),
            "Found indexes"
        );

        let inventory: Inventory = stream::iter(rows)
            .map(|row| self.enrich(row))
            .buffered(self.max_concurrent_requests)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        for warning in &inventory.warnings {
            tracing::warn!(
                component = "elasticsearch",
                operation = "enrich_index",
                index = %warning.index,
                issue = %warning.issue,
                "Index enrichment incomplete"
            );
        }

        Ok(inventory)
    }

    /// Delete one index.
    pub async fn delete_index(&self, index: &str) -> RequestResult<()> {
        tracing::info!(
            component = "elasticsearch",
            operation = "delete_index",
            index = %index,
            "Deleting index"
        );

        match self.send(Method::DELETE, self.endpoint(&[index])).await {
            Ok(_) => {
                tracing::info!(
                    component = "elasticsearch",
                    operation = "delete_index",
                    index = %index,
                    "Deleted index"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    component = "elasticsearch",
                    operation = "delete_index",
                    index = %index,
                    status = e.status().map(|s| s.as_u16()),
                    error = %e,
                    "Failed to delete index"
                );
                Err(e)
            }
        }
    }
}

fn parse_count(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Pull `{index}.settings.index.creation_date` out of a `_settings` response.
///
/// The date is a millisecond epoch, sent as a string by current clusters and
/// as a number by some older ones. When the response is keyed by a different
/// name (an alias resolved to its backing index) and holds a single entry,
/// that entry is used.
fn creation_time_from_settings(settings: &serde_json::Value, index: &str) -> Option<DateTime<Utc>> {
    let entry = settings.get(index).or_else(|| {
        let object = settings.as_object()?;
        if object.len() == 1 {
            object.values().next()
        } else {
            None
        }
    })?;

    let raw = entry.pointer("/settings/index/creation_date")?;
    let millis = match raw {
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok()?,
        serde_json::Value::Number(n) => n.as_i64()?,
        _ => return None,
    };

    DateTime::from_timestamp_millis(millis)
}
