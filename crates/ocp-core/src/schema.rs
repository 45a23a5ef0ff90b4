//! Record schemas: the immutable rule declarations consumed by the validator.
//!
//! Schemas are plain configuration. They deserialize from JSON, are shared
//! read-only, and never name storage locations:
//!
//! ```json
//! {
//!   "schemas": [{
//!     "record_type": "crms",
//!     "required": ["record_id", "audit_data.cryptographic_signature"],
//!     "format": { "timestamps": ["timestamp"] },
//!     "logic": [
//!       { "rule": "range", "field": "audit_data.reputation_index.R_d", "min": 0.0, "max": 1.0 }
//!     ],
//!     "crypto": { "zeroed_fields": ["transaction_state.pre_state_hash"] }
//!   }]
//! }
//! ```

use ocp_canonical::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::SchemaError;
use crate::path::FieldPath;
use crate::validator::RecordValidator;

/// Rule declarations for one record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSchema {
    /// Record type this schema applies to.
    pub record_type: String,
    /// Field paths that must be present (structural stage).
    #[serde(default)]
    pub required: Vec<FieldPath>,
    /// Field paths that must hold a non-empty value (structural stage).
    /// Null, `""`, `[]` and `{}` are empty.
    #[serde(default)]
    pub non_empty: Vec<FieldPath>,
    /// Format stage rules.
    #[serde(default)]
    pub format: FormatRules,
    /// Logical stage rules.
    #[serde(default)]
    pub logic: Vec<LogicRule>,
    /// Cryptographic stage rules.
    #[serde(default)]
    pub crypto: CryptoRules,
}

/// Format stage declarations. Absent fields are skipped here; presence is
/// the structural stage's concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatRules {
    /// Fields that must hold ISO-8601 timestamps.
    #[serde(default)]
    pub timestamps: Vec<FieldPath>,
    /// Identifier and other pattern-constrained text fields.
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
    /// Fields that must hold `0x`-prefixed digests.
    #[serde(default)]
    pub hashes: Vec<HashRule>,
    /// Fields restricted to an enumerated value set.
    #[serde(default)]
    pub enums: Vec<EnumRule>,
}

/// A text field constrained by a regular expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Field to check.
    pub field: FieldPath,
    /// Regular expression the value must match.
    pub pattern: String,
    /// Skip the check when the value is empty.
    #[serde(default)]
    pub allow_empty: bool,
}

/// A digest field: `0x` followed by the algorithm's hex length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashRule {
    /// Field to check.
    pub field: FieldPath,
    /// Algorithm whose digest length is expected.
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

/// A field restricted to a fixed set of string values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumRule {
    /// Field to check.
    pub field: FieldPath,
    /// Allowed values.
    pub values: Vec<String>,
}

/// Cross-field rules evaluated by the logical stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum LogicRule {
    /// `status_field == trigger` if and only if `dependent_field` is non-empty.
    Biconditional {
        /// Field holding the status.
        status_field: FieldPath,
        /// Status value that requires the dependent field.
        trigger: String,
        /// Field that must be non-empty exactly when triggered.
        dependent_field: FieldPath,
    },
    /// Numeric field inside the closed interval `[min, max]`.
    Range {
        /// Field to check.
        field: FieldPath,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// When `field` holds one of `values`, `dependent_field` must be non-empty.
    RequiredWhen {
        /// Field holding the condition value.
        field: FieldPath,
        /// Values that trigger the requirement.
        values: Vec<String>,
        /// Field that must be non-empty.
        dependent_field: FieldPath,
    },
}

/// Cryptographic stage declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CryptoRules {
    /// Digest fields that must not hold a zeroed placeholder.
    #[serde(default)]
    pub zeroed_fields: Vec<FieldPath>,
    /// Literal placeholders treated as zeroed, besides all-zero hex.
    #[serde(default)]
    pub zeroed_sentinels: Vec<String>,
    /// Signature field format convention.
    #[serde(default)]
    pub signature: Option<SignatureRule>,
}

/// Declared signature format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRule {
    /// Field holding the signature.
    pub field: FieldPath,
    /// Regular expression the signature must match.
    pub pattern: String,
}

/// Placeholder digest used by submitters before the real value is known.
pub const ZEROED_SENTINEL: &str = "0x0000...0000";

fn paths(items: &[&str]) -> Vec<FieldPath> {
    items.iter().map(|p| FieldPath::from(*p)).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RecordSchema {
    /// Creates an empty schema for a record type.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            required: Vec::new(),
            non_empty: Vec::new(),
            format: FormatRules::default(),
            logic: Vec::new(),
            crypto: CryptoRules::default(),
        }
    }

    /// Built-in schema for CRMS records submitted to the archive.
    pub fn crms() -> Self {
        Self {
            record_type: "crms".to_string(),
            required: paths(&[
                "record_id",
                "version",
                "timestamp",
                "agent_id",
                "agent_domain",
                "action_classification",
                "transaction_state",
                "deliberation_status",
                "audit_data",
                "evidence_submitted",
                "transaction_state.pre_state_hash",
                "transaction_state.post_state_hash",
                "transaction_state.semantic_hash_content",
                "deliberation_status.proposal_id",
                "deliberation_status.constitutional_citations",
                "deliberation_status.consensus_status",
                "deliberation_status.agent_vote",
                "deliberation_status.human_override_citation",
                "audit_data.reputation_index",
                "audit_data.cryptographic_signature",
            ]),
            non_empty: Vec::new(),
            format: FormatRules {
                timestamps: paths(&["timestamp"]),
                patterns: vec![PatternRule {
                    field: "record_id".into(),
                    pattern: r"^CRMS-\d{8}-[a-fA-F0-9-]+$".to_string(),
                    allow_empty: false,
                }],
                hashes: [
                    "transaction_state.pre_state_hash",
                    "transaction_state.post_state_hash",
                    "transaction_state.semantic_hash_content",
                ]
                .iter()
                .map(|field| HashRule {
                    field: FieldPath::from(*field),
                    algorithm: HashAlgorithm::Sha3_256,
                })
                .collect(),
                enums: vec![
                    EnumRule {
                        field: "action_classification".into(),
                        values: strings(&[
                            "EASILY_REVERSIBLE",
                            "PARTIALLY_REVERSIBLE",
                            "IRREVERSIBLE",
                        ]),
                    },
                    EnumRule {
                        field: "deliberation_status.consensus_status".into(),
                        values: strings(&["PENDING", "REACHED", "OVERRIDDEN"]),
                    },
                    EnumRule {
                        field: "deliberation_status.agent_vote".into(),
                        values: strings(&["SUPPORT", "OPPOSE", "ABSTAIN"]),
                    },
                ],
            },
            logic: vec![
                LogicRule::Biconditional {
                    status_field: "deliberation_status.consensus_status".into(),
                    trigger: "OVERRIDDEN".to_string(),
                    dependent_field: "deliberation_status.human_override_citation".into(),
                },
                LogicRule::Range {
                    field: "audit_data.reputation_index.R_d".into(),
                    min: 0.0,
                    max: 1.0,
                },
            ],
            crypto: CryptoRules {
                zeroed_fields: paths(&["transaction_state.pre_state_hash"]),
                zeroed_sentinels: strings(&[ZEROED_SENTINEL]),
                signature: Some(SignatureRule {
                    field: "audit_data.cryptographic_signature".into(),
                    pattern: r"^SIG-\S+$".to_string(),
                }),
            },
        }
    }

    /// Built-in compliance schema for committed archive entries.
    pub fn archive_entry() -> Self {
        let fields = paths(&[
            "action_type",
            "agent_id",
            "constitutional_citation",
            "evidence_pointers",
        ]);
        Self {
            record_type: "archive_entry".to_string(),
            required: fields.clone(),
            non_empty: fields,
            format: FormatRules {
                patterns: vec![PatternRule {
                    field: "constitutional_citation".into(),
                    pattern: "^Article".to_string(),
                    allow_empty: true,
                }],
                ..FormatRules::default()
            },
            logic: vec![LogicRule::RequiredWhen {
                field: "action_type".into(),
                values: strings(&["contract_proposal", "fraud_proof"]),
                dependent_field: "evidence_pointers".into(),
            }],
            crypto: CryptoRules::default(),
        }
    }
}

#[derive(Deserialize)]
struct SchemaFile {
    schemas: Vec<RecordSchema>,
}

/// Schemas keyed by record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    schemas: BTreeMap<String, RecordSchema>,
}

impl SchemaSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `crms` and `archive_entry` schemas.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.insert(RecordSchema::crms());
        set.insert(RecordSchema::archive_entry());
        set
    }

    /// Parses a `{"schemas": [...]}` document.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_json::from_str(text)?;
        let mut set = Self::new();
        for schema in file.schemas {
            set.insert(schema);
        }
        Ok(set)
    }

    /// Reads and parses a schema document from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Adds or replaces the schema for its record type.
    pub fn insert(&mut self, schema: RecordSchema) -> Option<RecordSchema> {
        self.schemas.insert(schema.record_type.clone(), schema)
    }

    /// Looks up the schema for a record type.
    pub fn get(&self, record_type: &str) -> Option<&RecordSchema> {
        self.schemas.get(record_type)
    }

    /// Declared record types.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Compiles a validator for a record type.
    pub fn validator_for(&self, record_type: &str) -> Result<RecordValidator, SchemaError> {
        let schema = self
            .get(record_type)
            .ok_or_else(|| SchemaError::UnknownRecordType(record_type.to_string()))?;
        RecordValidator::new(schema)
    }
}
