//! Schema-driven, staged validation of constitutional archive records.
//!
//! This crate provides:
//! - [`RecordSchema`] / [`SchemaSet`]: declarative rules per record type
//! - [`RecordValidator`]: the four-stage pipeline (structural, format,
//!   logical, cryptographic)
//! - [`ValidationResult`]: ordered [`Violation`]s tagged with their [`Stage`]
//!
//! Core invariants:
//! - Validation is pure: no I/O, no mutation of the record
//! - A stage runs only when every earlier stage reported no violations
//! - Violations within a stage are all reported, in rule order
//!
#![deny(missing_docs)]

/// Schema loading and compilation errors.
pub mod errors;
/// Dotted field paths.
pub mod path;
/// Rule declarations and built-in schemas.
pub mod schema;
/// The staged validator.
pub mod validator;
/// Stages, violations and results.
pub mod violation;

pub use errors::SchemaError;
pub use path::FieldPath;
pub use schema::{
    CryptoRules, EnumRule, FormatRules, HashRule, LogicRule, PatternRule, RecordSchema,
    SchemaSet, SignatureRule, ZEROED_SENTINEL,
};
pub use validator::RecordValidator;
pub use violation::{Stage, ValidationResult, Violation, ViolationKind};
