//! Entry and batch auditing.
//!
//! For every entry the auditor performs one fetch, then four independent
//! checks whose conjunction is the verdict:
//!
//! 1. the stored semantic hash reproduces from the entry's projection
//! 2. the signature has the declared format, and verifies when a
//!    [`SignatureVerifier`] is configured
//! 3. the entry passes the compliance schema
//! 4. the state transition is plausible (pre and post digests present and
//!    different unless the action is read-only)
//!
//! A missing or unfetchable entry yields a failed report, never an error, so
//! one bad id cannot abort a batch.

use chrono::{DateTime, Utc};
use ocp_canonical::{canonicalize_record, Record, Value};
use ocp_core::{RecordValidator, Violation};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::{AuditConfig, AuditWindow};
use crate::errors::{AuditError, SourceError};
use crate::report::{AuditSummary, ReportSink};
use crate::reproducer::reproduce_projected;
use crate::signature::{KeyResolver, SignatureVerifier};
use crate::source::DataSource;
use crate::stats::{AuditAccumulator, AuditStats};

/// How far an entry got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Fetched and checked.
    Checked,
    /// Absent from every source.
    NotFound,
    /// The source failed for another reason.
    FetchFailed,
}

/// Hash reproduction outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCheck {
    /// Stored and recomputed digests agree.
    pub valid: bool,
    /// Digest stored with the entry.
    pub original: Option<String>,
    /// Recomputed digest, `0x`-prefixed; absent when encoding failed.
    pub recomputed: Option<String>,
    /// Why the check failed.
    pub error: Option<String>,
}

/// Signature outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCheck {
    /// The signature passed every configured check.
    pub valid: bool,
    /// A verifier confirmed the signature cryptographically.
    pub verified: bool,
    /// Why the check failed.
    pub error: Option<String>,
}

impl SignatureCheck {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            verified: false,
            error: Some(error.into()),
        }
    }
}

/// Compliance outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    /// No violations.
    pub compliant: bool,
    /// Violations found by the compliance schema.
    pub violations: Vec<Violation>,
}

/// State transition outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCheck {
    /// The transition is plausible.
    pub valid: bool,
    /// Why the check failed.
    pub error: Option<String>,
}

/// Complete result for one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReport {
    /// Audited id.
    pub entry_id: String,
    /// Fetch outcome.
    pub status: EntryStatus,
    /// Conjunction of all checks; false when the entry was not fetched.
    pub valid: bool,
    /// Hash reproduction, when fetched.
    pub hash: Option<HashCheck>,
    /// Signature check, when fetched.
    pub signature: Option<SignatureCheck>,
    /// Compliance check, when fetched.
    pub compliance: Option<ComplianceCheck>,
    /// State transition check, when fetched.
    pub state: Option<StateCheck>,
    /// Fetch failure description.
    pub error: Option<String>,
    /// Time spent on the entry, fetch included.
    pub latency: Duration,
}

impl EntryReport {
    fn unfetched(entry_id: &str, status: EntryStatus, error: String, latency: Duration) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            status,
            valid: false,
            hash: None,
            signature: None,
            compliance: None,
            state: None,
            error: Some(error),
            latency,
        }
    }
}

/// Reports, statistics and summary of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAudit {
    /// Entry reports in input order.
    pub reports: Vec<EntryReport>,
    /// Accumulated counters.
    pub stats: AuditStats,
    /// Derived summary.
    pub summary: AuditSummary,
}

impl BatchAudit {
    /// Sends every report, then the summary, to a sink.
    pub fn publish<K: ReportSink + ?Sized>(&self, sink: &mut K) -> Result<(), AuditError> {
        for report in &self.reports {
            sink.entry(report)?;
        }
        sink.summary(&self.summary)
    }
}

struct Verification {
    verifier: Box<dyn SignatureVerifier>,
    keys: Box<dyn KeyResolver>,
}

/// Audits archive entries fetched from a [`DataSource`].
///
/// # Example
///
/// ```rust
/// use ocp_audit::{Auditor, EntryStatus, MemorySource};
///
/// let auditor = Auditor::new(MemorySource::new())?;
/// let report = auditor.validate_entry("entry-404");
/// assert!(!report.valid);
/// assert_eq!(report.status, EntryStatus::NotFound);
/// # Ok::<(), ocp_audit::AuditError>(())
/// ```
pub struct Auditor<S> {
    source: S,
    config: AuditConfig,
    compliance: RecordValidator,
    signature_pattern: Regex,
    verification: Option<Verification>,
}

impl<S: DataSource> Auditor<S> {
    /// Auditor with the default configuration.
    pub fn new(source: S) -> Result<Self, AuditError> {
        Self::with_config(source, AuditConfig::default())
    }

    /// Auditor with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Fails when the compliance schema or signature pattern does not compile.
    pub fn with_config(source: S, config: AuditConfig) -> Result<Self, AuditError> {
        let compliance = RecordValidator::new(&config.compliance_schema)?;
        let signature_pattern = Regex::new(&config.signature_pattern)?;
        Ok(Self {
            source,
            config,
            compliance,
            signature_pattern,
            verification: None,
        })
    }

    /// Enables cryptographic signature verification.
    pub fn with_verifier<V, K>(mut self, verifier: V, keys: K) -> Self
    where
        V: SignatureVerifier + 'static,
        K: KeyResolver + 'static,
    {
        self.verification = Some(Verification {
            verifier: Box::new(verifier),
            keys: Box::new(keys),
        });
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Underlying data source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches and checks one entry.
    pub fn validate_entry(&self, id: &str) -> EntryReport {
        let started = Instant::now();
        let report = match self.source.get_entry(id) {
            Ok(entry) => {
                let mut report = self.check_entry(id, &entry);
                report.latency = started.elapsed();
                report
            }
            Err(SourceError::NotFound(_)) => {
                debug!(entry_id = id, "entry not found");
                EntryReport::unfetched(
                    id,
                    EntryStatus::NotFound,
                    "entry not found".to_string(),
                    started.elapsed(),
                )
            }
            Err(err) => {
                warn!(entry_id = id, error = %err, "entry fetch failed");
                EntryReport::unfetched(
                    id,
                    EntryStatus::FetchFailed,
                    err.to_string(),
                    started.elapsed(),
                )
            }
        };
        debug!(entry_id = id, valid = report.valid, "entry audited");
        report
    }

    /// Checks an already fetched entry.
    pub fn check_entry(&self, id: &str, entry: &Record) -> EntryReport {
        let started = Instant::now();
        let projected = self.config.projection.extract(entry);

        let hash = self.check_hash(id, entry, &projected);
        let signature = self.check_signature(entry, &projected);
        let validation = self.compliance.validate(entry);
        let compliance = ComplianceCheck {
            compliant: validation.is_valid(),
            violations: validation.into_violations(),
        };
        let state = self.check_state(entry);

        let valid = hash.valid && signature.valid && compliance.compliant && state.valid;
        EntryReport {
            entry_id: id.to_string(),
            status: EntryStatus::Checked,
            valid,
            hash: Some(hash),
            signature: Some(signature),
            compliance: Some(compliance),
            state: Some(state),
            error: None,
            latency: started.elapsed(),
        }
    }

    /// Audits ids in order, stopping early when `cancel` fires.
    pub fn audit_ids<T: AsRef<str>>(&self, ids: &[T], cancel: &CancelToken) -> BatchAudit {
        let mut acc = AuditAccumulator::new();
        let mut reports = Vec::with_capacity(ids.len());
        let mut cancelled = false;
        for id in ids {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let report = self.validate_entry(id.as_ref());
            acc.record(&report);
            reports.push(report);
        }
        finish(ids.len(), reports, &acc, cancelled)
    }

    /// Audits the entries the source lists between two ids, inclusive.
    ///
    /// # Errors
    ///
    /// Fails only when the source cannot list the range.
    pub fn audit_range(
        &self,
        start: &str,
        end: &str,
        cancel: &CancelToken,
    ) -> Result<BatchAudit, AuditError> {
        let ids = self.source.list_range(start, end)?;
        info!(start, end, entries = ids.len(), "auditing range");
        Ok(self.audit_ids(&ids, cancel))
    }

    /// Audits an agent's entries written within `window` before `now`.
    ///
    /// # Errors
    ///
    /// Fails only when the source cannot list the agent's entries.
    pub fn audit_agent(
        &self,
        agent_id: &str,
        window: AuditWindow,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<BatchAudit, AuditError> {
        let since = now - window.duration();
        let ids = self.source.list_ids(agent_id, since)?;
        info!(agent_id, %window, %since, entries = ids.len(), "auditing agent");
        Ok(self.audit_ids(&ids, cancel))
    }

    /// Audits ids on the rayon pool.
    ///
    /// Reports keep input order. Each worker accumulates separately and the
    /// partial statistics are merged at the end. Once `cancel` fires no new
    /// fetches start; the summary counts exactly the entries processed.
    pub fn audit_ids_parallel<T>(&self, ids: &[T], cancel: &CancelToken) -> BatchAudit
    where
        T: AsRef<str> + Sync,
        S: Sync,
    {
        let outcomes: Vec<Option<EntryReport>> = ids
            .par_iter()
            .map(|id| (!cancel.is_cancelled()).then(|| self.validate_entry(id.as_ref())))
            .collect();
        let cancelled = outcomes.iter().any(Option::is_none);
        let reports: Vec<EntryReport> = outcomes.into_iter().flatten().collect();

        let acc = reports
            .par_iter()
            .fold(AuditAccumulator::new, |mut acc, report| {
                acc.record(report);
                acc
            })
            .reduce(AuditAccumulator::new, |mut left, right| {
                left.merge(&right);
                left
            });
        finish(ids.len(), reports, &acc, cancelled)
    }

    fn check_hash(&self, id: &str, entry: &Record, projected: &Record) -> HashCheck {
        let stored = self.config.projection.stored_digest(entry);
        match reproduce_projected(projected, stored, self.config.algorithm) {
            Ok(reproduction) => {
                let error = match (&reproduction.original, reproduction.matches) {
                    (_, true) => None,
                    (None, false) => Some("no stored digest".to_string()),
                    (Some(_), false) => Some("hash mismatch".to_string()),
                };
                HashCheck {
                    valid: reproduction.matches,
                    original: reproduction.original,
                    recomputed: Some(reproduction.recomputed.prefixed()),
                    error,
                }
            }
            Err(err) => {
                warn!(entry_id = id, error = %err, "hash reproduction failed");
                HashCheck {
                    valid: false,
                    original: stored.map(str::to_string),
                    recomputed: None,
                    error: Some(format!("hash reproduction failed: {}", err)),
                }
            }
        }
    }

    fn check_signature(&self, entry: &Record, projected: &Record) -> SignatureCheck {
        let Some(signature) = self.config.signature_field.resolve(entry).and_then(Value::as_str)
        else {
            return SignatureCheck::failed("missing signature");
        };
        if !self.signature_pattern.is_match(signature) {
            return SignatureCheck::failed("signature format is invalid");
        }
        let Some(verification) = &self.verification else {
            return SignatureCheck {
                valid: true,
                verified: false,
                error: None,
            };
        };

        let Some(agent_id) = self.config.agent_field.resolve(entry).and_then(Value::as_str) else {
            return SignatureCheck::failed("missing agent id");
        };
        let Some(public_key) = verification.keys.public_key(agent_id) else {
            return SignatureCheck::failed(format!("no public key for agent {}", agent_id));
        };
        let message = match canonicalize_record(projected) {
            Ok(form) => form.into_bytes(),
            Err(err) => {
                return SignatureCheck::failed(format!(
                    "signed message could not be encoded: {}",
                    err
                ))
            }
        };

        if verification.verifier.verify(&message, signature, &public_key) {
            SignatureCheck {
                valid: true,
                verified: true,
                error: None,
            }
        } else {
            SignatureCheck::failed("signature does not verify")
        }
    }

    fn check_state(&self, entry: &Record) -> StateCheck {
        let present = |value: Option<&Value>| value.filter(|v| !v.is_empty()).cloned();
        let pre = present(self.config.pre_state_field.resolve(entry));
        let post = present(self.config.post_state_field.resolve(entry));

        let error = match (pre, post) {
            (None, _) => Some(format!("missing {}", self.config.pre_state_field)),
            (_, None) => Some(format!("missing {}", self.config.post_state_field)),
            (Some(pre), Some(post)) if pre == post => {
                let action = self
                    .config
                    .action_field
                    .resolve(entry)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                (!self.config.is_read_only(action))
                    .then(|| format!("state unchanged by non-read-only action '{}'", action))
            }
            _ => None,
        };
        StateCheck {
            valid: error.is_none(),
            error,
        }
    }
}

fn finish(
    requested: usize,
    reports: Vec<EntryReport>,
    acc: &AuditAccumulator,
    cancelled: bool,
) -> BatchAudit {
    let stats = acc.snapshot();
    let summary = AuditSummary::from_stats(requested, &stats, cancelled);
    info!(
        requested,
        processed = summary.processed,
        valid = summary.valid,
        not_found = summary.not_found,
        cancelled,
        "audit batch complete"
    );
    BatchAudit {
        reports,
        stats,
        summary,
    }
}
