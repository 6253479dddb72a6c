//! Human-readable run report printed to stdout.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    elasticsearch::IndexRecord,
    format::{format_age, format_bytes, format_number},
    retention::{AnalysisResult, DeletionReason, DeletionReport},
    trimmer::RunOutcome,
};

/// Full report for a finished run.
pub struct RunReport<'a> {
    outcome: &'a RunOutcome,
    now: DateTime<Utc>,
}

impl<'a> RunReport<'a> {
    pub fn new(outcome: &'a RunOutcome, now: DateTime<Utc>) -> Self {
        Self { outcome, now }
    }
}

impl fmt::Display for RunReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = self.outcome;

        if let Some(health) = &outcome.health {
            writeln!(
                f,
                "Cluster {} is {} ({} nodes)",
                health.cluster_name, health.status, health.number_of_nodes
            )?;
        }

        write!(f, "{}", Summary(&outcome.analysis))?;

        if !outcome.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for warning in &outcome.warnings {
                writeln!(f, "  {}: {}", warning.index, warning.issue)?;
            }
        }

        if !outcome.analysis.has_deletions() {
            return writeln!(f, "\nNo indexes need to be deleted.");
        }

        let heading = if outcome.dry_run {
            "Would delete (dry run, pass --delete to apply):"
        } else {
            "Planned deletions:"
        };
        writeln!(f, "\n{heading}")?;
        write!(f, "{}", Plan { analysis: &outcome.analysis, now: self.now })?;

        if let Some(report) = &outcome.deletion {
            write!(f, "\n{}", Deletion(report))?;
        }
        Ok(())
    }
}

struct Summary<'a>(&'a AnalysisResult);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        writeln!(
            f,
            "Indexes: {} totalling {}",
            a.total_indexes,
            format_bytes(a.total_size_bytes)
        )?;
        if let Some(cutoff) = a.cutoff_time {
            writeln!(f, "Age cutoff: created before {}", cutoff.to_rfc3339())?;
        }
        if a.excess_bytes > 0 {
            writeln!(f, "Over size cap by {}", format_bytes(a.excess_bytes))?;
        }
        writeln!(
            f,
            "To delete: {} ({} by age, {} by size) freeing {}",
            a.to_delete.len(),
            a.count_by(DeletionReason::Age),
            a.count_by(DeletionReason::Size),
            format_bytes(a.deleted_size_bytes)
        )?;
        writeln!(
            f,
            "Remaining: {} totalling {}",
            a.remaining_indexes(),
            format_bytes(a.remaining_size_bytes())
        )?;
        if a.unresolved_sizes > 0 || a.unresolved_creation_times > 0 {
            writeln!(
                f,
                "Unresolved: {} sizes, {} creation times",
                a.unresolved_sizes, a.unresolved_creation_times
            )?;
        }
        Ok(())
    }
}

struct Plan<'a> {
    analysis: &'a AnalysisResult,
    now: DateTime<Utc>,
}

impl fmt::Display for Plan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (record, reason) in self.analysis.planned() {
            writeln!(
                f,
                "  {:<40} {:>10} {:>10} docs  {:<12} {}",
                record.name,
                size_column(record),
                format_number(record.doc_count),
                age_column(record, self.now),
                reason_label(reason)
            )?;
        }
        Ok(())
    }
}

struct Deletion<'a>(&'a DeletionReport);

impl fmt::Display for Deletion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(
            f,
            "Deleted {} of {} indexes, freed {}",
            report.succeeded_count(),
            report.attempted(),
            format_bytes(report.freed_bytes)
        )?;
        for failure in &report.failed {
            writeln!(f, "  FAILED {}: {}", failure.index, failure.reason)?;
        }
        Ok(())
    }
}

fn size_column(record: &IndexRecord) -> String {
    record
        .size_bytes
        .map(format_bytes)
        .unwrap_or_else(|| "?".to_string())
}

fn age_column(record: &IndexRecord, now: DateTime<Utc>) -> String {
    record
        .creation_time
        .map(|created| format_age(now - created))
        .unwrap_or_else(|| "unknown".to_string())
}

fn reason_label(reason: DeletionReason) -> &'static str {
    match reason {
        DeletionReason::Age => "age",
        DeletionReason::Size => "size",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{
        elasticsearch::{ClusterHealth, ClusterStatus, EnrichmentIssue, EnrichmentWarning},
        retention::{DeletionFailure, RetentionPolicy},
        units::MIB,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 25, 12, 0, 0).unwrap()
    }

    fn outcome(deletion: Option<DeletionReport>) -> RunOutcome {
        let policy = RetentionPolicy::new(Some(Duration::days(7)), Some(3 * MIB)).unwrap();
        let records = vec![
            IndexRecord::named("logs-a")
                .with_size(2 * MIB)
                .with_creation_time(now() - Duration::days(10)),
            IndexRecord::named("logs-b")
                .with_size(2 * MIB)
                .with_creation_time(now() - Duration::days(5)),
            IndexRecord::named("logs-c").with_size(2 * MIB),
        ];
        RunOutcome {
            policy,
            health: Some(ClusterHealth {
                cluster_name: "logs".into(),
                status: ClusterStatus::Green,
                number_of_nodes: 3,
            }),
            warnings: vec![EnrichmentWarning {
                index: "logs-c".into(),
                issue: EnrichmentIssue::CreationDateMissing,
            }],
            analysis: policy.analyze(records, now()),
            dry_run: deletion.is_none(),
            deletion,
        }
    }

    #[test]
    fn test_dry_run_report() {
        let text = RunReport::new(&outcome(None), now()).to_string();

        assert!(text.contains("Cluster logs is green (3 nodes)"));
        assert!(text.contains("Indexes: 3 totalling 6.0 MB"));
        assert!(text.contains("To delete: 2 (1 by age, 1 by size) freeing 4.0 MB"));
        assert!(text.contains("Unresolved: 0 sizes, 1 creation times"));
        assert!(text.contains("logs-c: creation date not present in index settings"));
        assert!(text.contains("dry run"));
        assert!(text.contains("10d 0h ago"));
        assert!(!text.contains("Deleted"));

        let a = text.find("logs-a").unwrap();
        let b = text.rfind("logs-b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_deletion_report() {
        let report = DeletionReport {
            deleted: vec!["logs-b".into()],
            failed: vec![DeletionFailure {
                index: "logs-a".into(),
                status: Some(500),
                reason: "boom".into(),
            }],
            freed_bytes: 2 * MIB,
        };
        let text = RunReport::new(&outcome(Some(report)), now()).to_string();

        assert!(text.contains("Planned deletions:"));
        assert!(text.contains("Deleted 1 of 2 indexes, freed 2.0 MB"));
        assert!(text.contains("FAILED logs-a: boom"));
    }

    #[test]
    fn test_nothing_to_delete() {
        let policy = RetentionPolicy::by_size(100 * MIB);
        let outcome = RunOutcome {
            policy,
            health: None,
            warnings: vec![],
            analysis: policy.analyze(vec![IndexRecord::named("logs-a").with_size(MIB)], now()),
            deletion: None,
            dry_run: true,
        };
        let text = RunReport::new(&outcome, now()).to_string();

        assert!(!text.contains("Cluster"));
        assert!(text.contains("No indexes need to be deleted."));
        assert!(text.contains("Remaining: 1 totalling 1.0 MB"));
    }

    #[test]
    fn test_unresolved_columns() {
        let record = IndexRecord::named("x");
        assert_eq!(size_column(&record), "?");
        assert_eq!(age_column(&record, now()), "unknown");
    }
}
