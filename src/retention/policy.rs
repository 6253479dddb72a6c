//! Pure classification of an inventory snapshot into keep/delete.

use std::{cmp::Ordering, collections::HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::elasticsearch::IndexRecord;

/// Age and/or size limits for one run. At least one limit is always set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    age_cutoff: Option<Duration>,
    size_cap: Option<u64>,
}

impl RetentionPolicy {
    /// Build a policy, or `None` if neither limit is given.
    pub fn new(age_cutoff: Option<Duration>, size_cap: Option<u64>) -> Option<Self> {
        if age_cutoff.is_none() && size_cap.is_none() {
            return None;
        }
        Some(Self {
            age_cutoff,
            size_cap,
        })
    }

    pub fn by_age(age_cutoff: Duration) -> Self {
        Self {
            age_cutoff: Some(age_cutoff),
            size_cap: None,
        }
    }

    pub fn by_size(size_cap: u64) -> Self {
        Self {
            age_cutoff: None,
            size_cap: Some(size_cap),
        }
    }

    pub fn age_cutoff(&self) -> Option<Duration> {
        self.age_cutoff
    }

    pub fn size_cap(&self) -> Option<u64> {
        self.size_cap
    }

    /// Classify `inventory` as of `now`. See [`analyze`].
    pub fn analyze(&self, inventory: Vec<IndexRecord>, now: DateTime<Utc>) -> AnalysisResult {
        analyze(inventory, self, now)
    }
}

/// Why an index was chosen for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    /// Older than the age cutoff.
    Age,
    /// Needed to bring the total under the size cap.
    Size,
}

/// Outcome of classifying one inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    /// Number of indexes in the snapshot.
    pub total_indexes: usize,
    /// Sum of all index sizes in the snapshot (unresolved sizes count as 0).
    pub total_size_bytes: u64,
    /// Indexes to delete, oldest first, each name at most once.
    pub to_delete: Vec<IndexRecord>,
    /// Why each entry of `to_delete` was chosen, index for index.
    pub reasons: Vec<DeletionReason>,
    /// Sum of the sizes of `to_delete`.
    pub deleted_size_bytes: u64,
    /// Creation times strictly before this are age-eligible.
    pub cutoff_time: Option<DateTime<Utc>>,
    /// How far the snapshot exceeded the size cap, 0 when within it.
    pub excess_bytes: u64,
    /// Indexes whose size could not be resolved.
    pub unresolved_sizes: usize,
    /// Indexes whose creation time could not be resolved.
    pub unresolved_creation_times: usize,
}

impl AnalysisResult {
    pub fn has_deletions(&self) -> bool {
        !self.to_delete.is_empty()
    }

    /// Indexes that remain after the planned deletions.
    pub fn remaining_indexes(&self) -> usize {
        self.total_indexes - self.to_delete.len()
    }

    /// Total size that remains after the planned deletions.
    pub fn remaining_size_bytes(&self) -> u64 {
        self.total_size_bytes.saturating_sub(self.deleted_size_bytes)
    }

    pub fn count_by(&self, reason: DeletionReason) -> usize {
        self.reasons.iter().filter(|r| **r == reason).count()
    }

    /// Planned deletions paired with their reasons.
    pub fn planned(&self) -> impl Iterator<Item = (&IndexRecord, DeletionReason)> {
        self.to_delete.iter().zip(self.reasons.iter().copied())
    }
}

/// Oldest first; unresolved creation times last; name breaks ties.
fn oldest_first(a: &IndexRecord, b: &IndexRecord) -> Ordering {
    a.creation_time
        .is_none()
        .cmp(&b.creation_time.is_none())
        .then(a.creation_time.cmp(&b.creation_time))
        .then_with(|| a.name.cmp(&b.name))
}

/// Decide which indexes violate the policy.
///
/// 1. Sort oldest first (unresolved creation times last).
/// 2. Age pass: every index created strictly before `now - age_cutoff`.
/// 3. Size pass: if the total exceeds the cap, keep adding the oldest
///    not-yet-selected indexes until the selected size covers the excess.
///    Age selections count toward the excess.
///
/// The size pass may overshoot the cap by at most one index, since an index
/// is deleted whole or not at all.
pub fn analyze(
    mut inventory: Vec<IndexRecord>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> AnalysisResult {
    inventory.sort_by(oldest_first);

    let total_indexes = inventory.len();
    let total_size_bytes = inventory
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.effective_size()));
    let unresolved_sizes = inventory.iter().filter(|r| r.size_bytes.is_none()).count();
    let unresolved_creation_times = inventory
        .iter()
        .filter(|r| r.creation_time.is_none())
        .count();

    tracing::info!(
        component = "analysis",
        operation = "current_state",
        total_indexes,
        total_size = total_size_bytes,
        "Analyzing indexes for deletion"
    );

    if unresolved_sizes > 0 {
        tracing::warn!(
            component = "analysis",
            operation = "current_state",
            count = unresolved_sizes,
            "Indexes with unresolved size are counted as 0 bytes"
        );
    }

    let mut selected: HashSet<String> = HashSet::new();
    let mut picks: Vec<(usize, DeletionReason)> = Vec::new();
    let mut deleted_size_bytes = 0u64;

    let cutoff_time = policy
        .age_cutoff
        .and_then(|age| now.checked_sub_signed(age));

    if let Some(cutoff) = cutoff_time {
        for (i, record) in inventory.iter().enumerate() {
            let Some(created) = record.creation_time else {
                continue;
            };
            if created < cutoff && selected.insert(record.name.clone()) {
                picks.push((i, DeletionReason::Age));
                deleted_size_bytes = deleted_size_bytes.saturating_add(record.effective_size());
            }
        }

        tracing::info!(
            component = "analysis",
            operation = "age_filter",
            cutoff_time = %cutoff,
            age_deletes = picks.len(),
            "Applied age filter"
        );
    }

    let mut excess_bytes = 0;
    if let Some(cap) = policy.size_cap
        && total_size_bytes > cap
    {
        excess_bytes = total_size_bytes - cap;
        tracing::warn!(
            component = "analysis",
            operation = "size_filter",
            total_size = total_size_bytes,
            max_size = cap,
            excess_size = excess_bytes,
            "Total size exceeds limit"
        );

        for (i, record) in inventory.iter().enumerate() {
            if deleted_size_bytes >= excess_bytes {
                break;
            }
            if selected.insert(record.name.clone()) {
                picks.push((i, DeletionReason::Size));
                deleted_size_bytes = deleted_size_bytes.saturating_add(record.effective_size());
            }
        }
    }

    // Restore oldest-first order across both passes.
    picks.sort_by_key(|(i, _)| *i);
    let reasons = picks.iter().map(|(_, reason)| *reason).collect();
    let mut keep_idx = picks.iter().map(|(i, _)| *i).peekable();
    let to_delete = inventory
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| {
            if keep_idx.peek() == Some(&i) {
                keep_idx.next();
                Some(record)
            } else {
                None
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(
        component = "analysis",
        operation = "result",
        total_indexes,
        indexes_to_delete = to_delete.len(),
        size_to_delete = deleted_size_bytes,
        "Analysis complete"
    );

    AnalysisResult {
        total_indexes,
        total_size_bytes,
        to_delete,
        reasons,
        deleted_size_bytes,
        cutoff_time,
        excess_bytes,
        unresolved_sizes,
        unresolved_creation_times,
    }
}
