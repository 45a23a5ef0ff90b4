//! Four-stage record validator.
//!
//! Stages run in order (structural, format, logical, cryptographic). Each
//! stage collects every violation it finds; the next stage runs only when
//! the current one found none, since later stages assume what earlier ones
//! establish (field presence, well-formed values).

use chrono::{DateTime, NaiveDateTime};
use ocp_canonical::{strip_hex_prefix, HashAlgorithm, Record, Value};
use regex::Regex;
use std::borrow::Cow;
use tracing::debug;

use crate::errors::SchemaError;
use crate::path::FieldPath;
use crate::schema::{LogicRule, RecordSchema};
use crate::violation::{Stage, ValidationResult, Violation, ViolationKind};

struct CompiledPattern {
    field: FieldPath,
    regex: Regex,
    allow_empty: bool,
}

struct CompiledHash {
    field: FieldPath,
    algorithm: HashAlgorithm,
    regex: Regex,
}

struct CompiledSignature {
    field: FieldPath,
    regex: Regex,
}

/// Validator compiled from a [`RecordSchema`].
///
/// Validation is deterministic and never mutates the record; one validator
/// can be shared across threads.
///
/// # Example
///
/// ```rust
/// use ocp_canonical::Record;
/// use ocp_core::{RecordSchema, RecordValidator, Stage};
/// use serde_json::json;
///
/// let validator = RecordValidator::new(&RecordSchema::crms())?;
/// let record = Record::from_json(json!({"record_id": "CRMS-20251124-0001"}))?;
/// let result = validator.validate(&record);
/// assert!(!result.is_valid());
/// assert_eq!(result.stages_run(), &[Stage::Structural]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RecordValidator {
    schema: RecordSchema,
    patterns: Vec<CompiledPattern>,
    hashes: Vec<CompiledHash>,
    signature: Option<CompiledSignature>,
}

impl RecordValidator {
    /// Compiles the schema's patterns and checks its ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for an invalid regular expression or a range
    /// whose bounds are not finite and ordered.
    pub fn new(schema: &RecordSchema) -> Result<Self, SchemaError> {
        let patterns = schema
            .format
            .patterns
            .iter()
            .map(|rule| {
                Ok(CompiledPattern {
                    field: rule.field.clone(),
                    regex: compile(&rule.field, &rule.pattern)?,
                    allow_empty: rule.allow_empty,
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        let hashes = schema
            .format
            .hashes
            .iter()
            .map(|rule| {
                let pattern = format!("^0x[0-9a-fA-F]{{{}}}$", rule.algorithm.hex_len());
                Ok(CompiledHash {
                    field: rule.field.clone(),
                    algorithm: rule.algorithm,
                    regex: compile(&rule.field, &pattern)?,
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        let signature = match &schema.crypto.signature {
            Some(rule) => Some(CompiledSignature {
                field: rule.field.clone(),
                regex: compile(&rule.field, &rule.pattern)?,
            }),
            None => None,
        };

        for rule in &schema.logic {
            if let LogicRule::Range { field, min, max } = rule {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(SchemaError::InvalidRange {
                        field: field.to_string(),
                        min: *min,
                        max: *max,
                    });
                }
            }
        }

        Ok(Self {
            schema: schema.clone(),
            patterns,
            hashes,
            signature,
        })
    }

    /// Schema this validator was compiled from.
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Runs the pipeline, stopping after the first stage with violations.
    pub fn validate(&self, record: &Record) -> ValidationResult {
        let mut result = ValidationResult::default();
        for stage in Stage::ALL {
            let found = self.validate_stage(stage, record);
            let halt = !found.is_empty();
            result.record_stage(stage, found);
            if halt {
                debug!(
                    record_type = %self.schema.record_type,
                    %stage,
                    violations = result.violations().len(),
                    "validation halted"
                );
                break;
            }
        }
        result
    }

    /// Runs a single stage in isolation.
    pub fn validate_stage(&self, stage: Stage, record: &Record) -> Vec<Violation> {
        let mut found = Vec::new();
        match stage {
            Stage::Structural => self.check_structure(record, &mut found),
            Stage::Format => self.check_format(record, &mut found),
            Stage::Logical => self.check_logic(record, &mut found),
            Stage::Cryptographic => self.check_crypto(record, &mut found),
        }
        found
    }

    fn check_structure(&self, record: &Record, found: &mut Vec<Violation>) {
        for path in &self.schema.required {
            if path.resolve(record).is_none() {
                found.push(Violation::new(
                    Stage::Structural,
                    ViolationKind::MissingField,
                    path.as_str(),
                    format!("missing required field '{}'", path),
                ));
            }
        }

        for path in &self.schema.non_empty {
            let empty = match path.resolve(record) {
                Some(value) => value.is_empty(),
                None if self.schema.required.contains(path) => false,
                None => true,
            };
            if empty {
                found.push(Violation::new(
                    Stage::Structural,
                    ViolationKind::EmptyField,
                    path.as_str(),
                    format!("field '{}' must not be empty", path),
                ));
            }
        }
    }

    fn check_format(&self, record: &Record, found: &mut Vec<Violation>) {
        for path in &self.schema.format.timestamps {
            let Some(value) = path.resolve(record) else {
                continue;
            };
            let valid = match value {
                Value::Timestamp(_) => true,
                Value::String(text) => is_iso8601(text),
                _ => false,
            };
            if !valid {
                found.push(Violation::new(
                    Stage::Format,
                    ViolationKind::InvalidTimestamp,
                    path.as_str(),
                    format!("invalid timestamp {}; must be ISO-8601", describe(value)),
                ));
            }
        }

        for rule in &self.patterns {
            let Some(value) = rule.field.resolve(record) else {
                continue;
            };
            if rule.allow_empty && value.is_empty() {
                continue;
            }
            let matched = text_of(value).is_some_and(|text| rule.regex.is_match(&text));
            if !matched {
                found.push(Violation::new(
                    Stage::Format,
                    ViolationKind::PatternMismatch,
                    rule.field.as_str(),
                    format!(
                        "invalid {} format {}; expected /{}/",
                        rule.field,
                        describe(value),
                        rule.regex.as_str()
                    ),
                ));
            }
        }

        for rule in &self.hashes {
            let Some(value) = rule.field.resolve(record) else {
                continue;
            };
            let matched = value.as_str().is_some_and(|text| rule.regex.is_match(text));
            if !matched {
                found.push(Violation::new(
                    Stage::Format,
                    ViolationKind::InvalidHash,
                    rule.field.as_str(),
                    format!(
                        "invalid {} {}; must be 0x followed by {} hex digits ({})",
                        rule.field,
                        describe(value),
                        rule.algorithm.hex_len(),
                        rule.algorithm
                    ),
                ));
            }
        }

        for rule in &self.schema.format.enums {
            let Some(value) = rule.field.resolve(record) else {
                continue;
            };
            let member = value
                .as_str()
                .is_some_and(|text| rule.values.iter().any(|allowed| allowed == text));
            if !member {
                found.push(Violation::new(
                    Stage::Format,
                    ViolationKind::NotInEnum,
                    rule.field.as_str(),
                    format!(
                        "invalid {} {}; expected one of {}",
                        rule.field,
                        describe(value),
                        rule.values.join(", ")
                    ),
                ));
            }
        }
    }

    fn check_logic(&self, record: &Record, found: &mut Vec<Violation>) {
        for rule in &self.schema.logic {
            match rule {
                LogicRule::Biconditional {
                    status_field,
                    trigger,
                    dependent_field,
                } => {
                    let triggered = status_field
                        .resolve(record)
                        .and_then(Value::as_str)
                        .is_some_and(|status| status == trigger);
                    let dependent_empty = dependent_field
                        .resolve(record)
                        .map_or(true, Value::is_empty);

                    if triggered && dependent_empty {
                        found.push(Violation::new(
                            Stage::Logical,
                            ViolationKind::ConditionalMismatch,
                            dependent_field.as_str(),
                            format!(
                                "{} is '{}' but {} is missing",
                                status_field, trigger, dependent_field
                            ),
                        ));
                    } else if !triggered && !dependent_empty {
                        found.push(Violation::new(
                            Stage::Logical,
                            ViolationKind::ConditionalMismatch,
                            dependent_field.as_str(),
                            format!(
                                "{} is present but {} is not '{}'",
                                dependent_field, status_field, trigger
                            ),
                        ));
                    }
                }
                LogicRule::Range { field, min, max } => {
                    let value = field.resolve(record);
                    match value.and_then(Value::as_f64) {
                        Some(number) if number >= *min && number <= *max => {}
                        Some(number) => found.push(Violation::new(
                            Stage::Logical,
                            ViolationKind::OutOfRange,
                            field.as_str(),
                            format!(
                                "{} must be between {} and {}; found {}",
                                field, min, max, number
                            ),
                        )),
                        None => found.push(Violation::new(
                            Stage::Logical,
                            ViolationKind::NotNumeric,
                            field.as_str(),
                            format!(
                                "{} must be a number between {} and {}; found {}",
                                field,
                                min,
                                max,
                                value.map_or(Cow::Borrowed("nothing"), |v| Cow::Owned(describe(v)))
                            ),
                        )),
                    }
                }
                LogicRule::RequiredWhen {
                    field,
                    values,
                    dependent_field,
                } => {
                    let Some(condition) = field.resolve(record).and_then(Value::as_str) else {
                        continue;
                    };
                    if !values.iter().any(|v| v == condition) {
                        continue;
                    }
                    let dependent_empty = dependent_field
                        .resolve(record)
                        .map_or(true, Value::is_empty);
                    if dependent_empty {
                        found.push(Violation::new(
                            Stage::Logical,
                            ViolationKind::MissingDependent,
                            dependent_field.as_str(),
                            format!("{} '{}' requires {}", field, condition, dependent_field),
                        ));
                    }
                }
            }
        }
    }

    fn check_crypto(&self, record: &Record, found: &mut Vec<Violation>) {
        let crypto = &self.schema.crypto;
        for path in &crypto.zeroed_fields {
            let Some(text) = path.resolve(record).and_then(Value::as_str) else {
                continue;
            };
            let zeroed =
                crypto.zeroed_sentinels.iter().any(|s| s == text) || is_all_zero_hex(text);
            if zeroed {
                found.push(Violation::new(
                    Stage::Cryptographic,
                    ViolationKind::ZeroedSentinel,
                    path.as_str(),
                    format!("{} must not be zeroed out", path),
                ));
            }
        }

        if let Some(signature) = &self.signature {
            let value = signature.field.resolve(record);
            let valid = value
                .and_then(Value::as_str)
                .is_some_and(|text| signature.regex.is_match(text));
            if !valid {
                found.push(Violation::new(
                    Stage::Cryptographic,
                    ViolationKind::InvalidSignatureFormat,
                    signature.field.as_str(),
                    "signature format is invalid",
                ));
            }
        }
    }
}

fn compile(field: &FieldPath, pattern: &str) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        field: field.to_string(),
        source,
    })
}

/// RFC 3339 with an offset, or a naive `YYYY-MM-DDTHH:MM:SS[.f]`.
fn is_iso8601(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

fn is_all_zero_hex(text: &str) -> bool {
    let digits = strip_hex_prefix(text);
    digits.len() != text.len() && !digits.is_empty() && digits.bytes().all(|b| b == b'0')
}

fn text_of(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Id(id) => Some(Cow::Owned(id.hyphenated().to_string())),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        other => format!("<{}>", other.kind()),
    }
}
