use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auditor::{EntryReport, EntryStatus};

/// Immutable counters over a set of audited entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    /// Entries for which a report was produced, found or not.
    pub entries_processed: usize,
    /// Entries whose overall verdict was valid.
    pub entries_valid: usize,
    /// Entries absent from every source.
    pub not_found: usize,
    /// Entries whose fetch failed for another reason.
    pub fetch_failed: usize,
    /// Reproduced digests that matched.
    pub hashes_valid: usize,
    /// Reproduced digests that did not match or could not be computed.
    pub hashes_invalid: usize,
    /// Signatures that passed.
    pub signatures_valid: usize,
    /// Signatures that failed.
    pub signatures_invalid: usize,
    /// Entries with at least one compliance violation.
    pub compliance_violations: usize,
    /// Entries whose state transition check failed.
    pub state_failures: usize,
    /// Sum of per-entry processing time.
    pub total_latency: Duration,
}

/// Running statistics, updated once per entry.
///
/// Accumulators are plain values: parallel batches give each worker its own
/// and [`merge`](Self::merge) them at the end.
#[derive(Debug, Clone, Default)]
pub struct AuditAccumulator {
    stats: AuditStats,
}

impl AuditAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one entry report into the counters.
    pub fn record(&mut self, report: &EntryReport) {
        let s = &mut self.stats;
        s.entries_processed += 1;
        s.total_latency += report.latency;
        if report.valid {
            s.entries_valid += 1;
        }

        match report.status {
            EntryStatus::NotFound => s.not_found += 1,
            EntryStatus::FetchFailed => s.fetch_failed += 1,
            EntryStatus::Checked => {}
        }

        if let Some(hash) = &report.hash {
            if hash.valid {
                s.hashes_valid += 1;
            } else {
                s.hashes_invalid += 1;
            }
        }
        if let Some(signature) = &report.signature {
            if signature.valid {
                s.signatures_valid += 1;
            } else {
                s.signatures_invalid += 1;
            }
        }
        if report.compliance.as_ref().is_some_and(|c| !c.compliant) {
            s.compliance_violations += 1;
        }
        if report.state.as_ref().is_some_and(|t| !t.valid) {
            s.state_failures += 1;
        }
    }

    /// Adds another accumulator's counters to this one.
    pub fn merge(&mut self, other: &AuditAccumulator) {
        let s = &mut self.stats;
        let o = &other.stats;
        s.entries_processed += o.entries_processed;
        s.entries_valid += o.entries_valid;
        s.not_found += o.not_found;
        s.fetch_failed += o.fetch_failed;
        s.hashes_valid += o.hashes_valid;
        s.hashes_invalid += o.hashes_invalid;
        s.signatures_valid += o.signatures_valid;
        s.signatures_invalid += o.signatures_invalid;
        s.compliance_violations += o.compliance_violations;
        s.state_failures += o.state_failures;
        s.total_latency += o.total_latency;
    }

    /// Current counters.
    pub fn snapshot(&self) -> AuditStats {
        self.stats
    }
}
