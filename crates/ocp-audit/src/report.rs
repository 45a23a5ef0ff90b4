use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auditor::EntryReport;
use crate::errors::AuditError;
use crate::stats::AuditStats;

/// Batch-level counts and rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Ids the batch was asked to audit.
    pub requested: usize,
    /// Entries actually processed before completion or cancellation.
    pub processed: usize,
    /// Entries with a valid verdict.
    pub valid: usize,
    /// Entries with an invalid verdict, missing ones included.
    pub invalid: usize,
    /// Entries absent from every source.
    pub not_found: usize,
    /// Entries whose digest did not reproduce.
    pub hash_failures: usize,
    /// Entries whose signature failed.
    pub signature_failures: usize,
    /// Entries with compliance violations.
    pub compliance_failures: usize,
    /// Entries whose state transition failed.
    pub state_failures: usize,
    /// `valid / processed`, zero for an empty batch.
    pub compliance_rate: f64,
    /// `hashes valid / processed`, zero for an empty batch.
    pub hash_integrity_rate: f64,
    /// Mean per-entry processing time.
    pub average_latency: Duration,
    /// True when the batch stopped early.
    pub cancelled: bool,
}

impl AuditSummary {
    /// Derives a summary from accumulated statistics.
    pub fn from_stats(requested: usize, stats: &AuditStats, cancelled: bool) -> Self {
        let processed = stats.entries_processed;
        let rate = |count: usize| {
            if processed == 0 {
                0.0
            } else {
                count as f64 / processed as f64
            }
        };
        let average_latency = u32::try_from(processed)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| stats.total_latency / n);

        Self {
            requested,
            processed,
            valid: stats.entries_valid,
            invalid: processed - stats.entries_valid,
            not_found: stats.not_found,
            hash_failures: stats.hashes_invalid,
            signature_failures: stats.signatures_invalid,
            compliance_failures: stats.compliance_violations,
            state_failures: stats.state_failures,
            compliance_rate: rate(stats.entries_valid),
            hash_integrity_rate: rate(stats.hashes_valid),
            average_latency,
            cancelled,
        }
    }
}

/// Destination for audit output (printer, file, collector).
pub trait ReportSink {
    /// Receives one entry report, in batch order.
    fn entry(&mut self, report: &EntryReport) -> Result<(), AuditError>;

    /// Receives the batch summary after all entries.
    fn summary(&mut self, summary: &AuditSummary) -> Result<(), AuditError>;
}

/// Sink that keeps everything it receives.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    /// Entry reports in arrival order.
    pub reports: Vec<EntryReport>,
    /// Summaries in arrival order.
    pub summaries: Vec<AuditSummary>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for CollectingSink {
    fn entry(&mut self, report: &EntryReport) -> Result<(), AuditError> {
        self.reports.push(report.clone());
        Ok(())
    }

    fn summary(&mut self, summary: &AuditSummary) -> Result<(), AuditError> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}
