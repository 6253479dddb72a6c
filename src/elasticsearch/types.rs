use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Index health as reported by `_cat/indices`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexHealth {
    Green,
    Yellow,
    Red,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Index open/closed state as reported by `_cat/indices`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Open,
    Close,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Cluster status from `_cluster/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Green,
    Yellow,
    Red,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Subset of the `_cluster/health` response used for the pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterHealth {
    pub cluster_name: String,
    #[serde(default)]
    pub status: ClusterStatus,
    #[serde(default)]
    pub number_of_nodes: u32,
}

/// One row of `_cat/indices?format=json&bytes=b`.
///
/// Every column is a string (or null for closed indexes) on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatIndex {
    pub index: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub health: IndexHealth,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: IndexStatus,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub pri: Option<String>,
    #[serde(default)]
    pub rep: Option<String>,
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
    #[serde(rename = "docs.deleted", default)]
    pub docs_deleted: Option<String>,
    #[serde(rename = "store.size", default)]
    pub store_size: Option<String>,
    #[serde(rename = "pri.store.size", default)]
    pub pri_store_size: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An index in the inventory snapshot.
///
/// `size_bytes` and `creation_time` are `None` when enrichment could not
/// resolve them. An unresolved creation time is never treated as old.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    pub name: String,
    pub health: IndexHealth,
    pub status: IndexStatus,
    pub uuid: Option<String>,
    pub primary_shards: Option<u32>,
    pub replica_shards: Option<u32>,
    pub doc_count: u64,
    pub deleted_doc_count: u64,
    pub size_bytes: Option<u64>,
    pub primary_size_bytes: Option<u64>,
    pub creation_time: Option<DateTime<Utc>>,
}

impl IndexRecord {
    /// A bare record with nothing but a name; mostly useful in tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health: IndexHealth::Unknown,
            status: IndexStatus::Unknown,
            uuid: None,
            primary_shards: None,
            replica_shards: None,
            doc_count: 0,
            deleted_doc_count: 0,
            size_bytes: None,
            primary_size_bytes: None,
            creation_time: None,
        }
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }

    pub fn with_creation_time(mut self, created: DateTime<Utc>) -> Self {
        self.creation_time = Some(created);
        self
    }

    /// Size used for totals and the size cap; unresolved counts as zero.
    pub fn effective_size(&self) -> u64 {
        self.size_bytes.unwrap_or(0)
    }
}

/// Something enrichment could not resolve for one index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichmentIssue {
    #[error("store size not reported")]
    SizeMissing,

    #[error("unrecognized store size '{raw}': {reason}")]
    SizeUnparseable { raw: String, reason: String },

    #[error("creation date not present in index settings")]
    CreationDateMissing,

    #[error("index settings unavailable: {0}")]
    SettingsUnavailable(String),
}

/// Outcome of enriching one listed index: whatever resolved, plus what didn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub record: IndexRecord,
    pub issues: Vec<EnrichmentIssue>,
}

impl Enrichment {
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A single enrichment problem, tagged with the index it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentWarning {
    pub index: String,
    pub issue: EnrichmentIssue,
}

/// Enriched listing of every index matching a pattern, taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub records: Vec<IndexRecord>,
    pub warnings: Vec<EnrichmentWarning>,
}

impl FromIterator<Enrichment> for Inventory {
    fn from_iter<I: IntoIterator<Item = Enrichment>>(iter: I) -> Self {
        let mut inventory = Inventory::default();
        for enrichment in iter {
            let index = &enrichment.record.name;
            inventory
                .warnings
                .extend(enrichment.issues.into_iter().map(|issue| EnrichmentWarning {
                    index: index.clone(),
                    issue,
                }));
            inventory.records.push(enrichment.record);
        }
        inventory
    }
}
