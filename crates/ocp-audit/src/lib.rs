//! Hash reproduction and integrity auditing for constitutional archive entries.
//!
//! This crate provides:
//! - [`reproduce`]: recompute an entry's semantic hash from its projection
//! - [`Auditor`]: per-entry verdicts (hash, signature, compliance, state
//!   transition) and batch audits over id lists, ranges and agent windows
//! - [`AuditAccumulator`] / [`AuditSummary`]: running and final statistics
//! - Collaborator traits: [`DataSource`], [`SignatureVerifier`],
//!   [`KeyResolver`], [`ReportSink`]
//!
//! Storage, transport and report formatting stay outside the crate.
//!
#![deny(missing_docs)]

/// Entry and batch auditing.
pub mod auditor;
/// Cooperative batch cancellation.
pub mod cancel;
/// Auditor configuration.
pub mod config;
/// Hashing projection of an entry.
pub mod entry;
/// Error types for sources and audits.
pub mod errors;
/// Summaries and report sinks.
pub mod report;
/// Semantic hash reproduction.
pub mod reproducer;
/// Signature verification capability.
pub mod signature;
/// Entry sources.
pub mod source;
/// Running audit statistics.
pub mod stats;

pub use auditor::{
    Auditor, BatchAudit, ComplianceCheck, EntryReport, EntryStatus, HashCheck, SignatureCheck,
    StateCheck,
};
pub use cancel::CancelToken;
pub use config::{AuditConfig, AuditWindow};
pub use entry::Projection;
pub use errors::{AuditError, SourceError};
pub use report::{AuditSummary, CollectingSink, ReportSink};
pub use reproducer::{reproduce, Reproduction};
pub use signature::{Ed25519Verifier, KeyResolver, SignatureVerifier, StaticKeys};
pub use source::{DataSource, LocalFirst, MemorySource};
pub use stats::{AuditAccumulator, AuditStats};
