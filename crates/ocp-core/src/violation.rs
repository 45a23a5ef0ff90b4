use serde::{Deserialize, Serialize};
use std::fmt;

/// One phase of the validation pipeline, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Required fields are present.
    Structural,
    /// Timestamps, identifiers, hashes and enums are well formed.
    Format,
    /// Cross-field rules hold.
    Logical,
    /// Digest sentinels and signature format.
    Cryptographic,
}

impl Stage {
    /// All stages in evaluation order.
    pub const ALL: [Stage; 4] = [
        Stage::Structural,
        Stage::Format,
        Stage::Logical,
        Stage::Cryptographic,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Structural => "structural",
            Stage::Format => "format",
            Stage::Logical => "logical",
            Stage::Cryptographic => "cryptographic",
        };
        f.write_str(name)
    }
}

/// Stable classification of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent.
    MissingField,
    /// A field that must carry a value is null or empty.
    EmptyField,
    /// A timestamp field is not ISO-8601.
    InvalidTimestamp,
    /// A text field does not match its declared pattern.
    PatternMismatch,
    /// A hash field is not `0x` + hex of the declared length.
    InvalidHash,
    /// A value is not in its enumerated set.
    NotInEnum,
    /// A two-way conditional between fields does not hold.
    ConditionalMismatch,
    /// A dependent field is empty although its condition holds.
    MissingDependent,
    /// A numeric field is outside its closed interval.
    OutOfRange,
    /// A field expected to be numeric is not.
    NotNumeric,
    /// A digest field holds a zeroed placeholder.
    ZeroedSentinel,
    /// The signature does not follow the declared format.
    InvalidSignatureFormat,
}

/// One failure of a single validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stage that produced the finding.
    pub stage: Stage,
    /// Rule classification.
    pub kind: ViolationKind,
    /// Dotted path of the offending field.
    pub field_path: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    /// Creates a violation.
    pub fn new(
        stage: Stage,
        kind: ViolationKind,
        field_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            kind,
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.field_path, self.message)
    }
}

/// Ordered findings of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    violations: Vec<Violation>,
    stages_run: Vec<Stage>,
}

impl ValidationResult {
    pub(crate) fn record_stage(&mut self, stage: Stage, found: Vec<Violation>) {
        self.stages_run.push(stage);
        self.violations.extend(found);
    }

    /// True when no rule was violated.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations in discovery order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations produced by one stage.
    pub fn violations_in(&self, stage: Stage) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.stage == stage)
    }

    /// Stages that were evaluated, in order.
    pub fn stages_run(&self) -> &[Stage] {
        &self.stages_run
    }

    /// Stage whose violations stopped the pipeline, if any.
    pub fn halted_at(&self) -> Option<Stage> {
        self.violations.first().map(|v| v.stage)
    }

    /// Consumes the result, returning its violations.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}
