//! Deterministic record encoding.
//!
//! The canonical form is compact JSON text: mapping keys sorted by code point
//! at every level, no insignificant whitespace, and one fixed textual form per
//! scalar kind. It is the only input the semantic hasher ever sees, so every
//! conforming implementation must reproduce it byte for byte.

use chrono::SecondsFormat;
use std::cmp::Ordering;
use std::fmt;

use crate::value::{Record, Value};

/// Maximum nesting depth accepted by the encoder.
pub const MAX_DEPTH: usize = 128;

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalizationError {
    /// The top-level input was not a mapping.
    #[error("top-level input must be a mapping, got {0}")]
    NotAMapping(&'static str),
    /// Non-finite number (NaN/Infinity) detected.
    #[error("non-finite number detected at {0}")]
    NonFiniteNumber(String),
    /// The input could not be brought into the record model.
    #[error("value has no deterministic textual form: {0}")]
    Unrepresentable(String),
    /// Nesting exceeded [`MAX_DEPTH`].
    #[error("nesting deeper than {max} levels at {path}")]
    DepthExceeded {
        /// Location of the offending value.
        path: String,
        /// Configured limit.
        max: usize,
    },
}

/// Canonical UTF-8 text of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalForm {
    text: String,
}

impl CanonicalForm {
    /// Canonical text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Canonical bytes (hash input).
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Consumes the form, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True only for an empty form, which the encoder never produces.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for CanonicalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Where the encoder currently is, for depth limits and error locations.
/// Each step borrows its parent from the caller's stack frame.
#[derive(Debug, Clone, Copy)]
enum Trail<'a> {
    Root,
    Key(&'a Trail<'a>, &'a str),
    Index(&'a Trail<'a>, usize),
}

impl Trail<'_> {
    fn depth(&self) -> usize {
        match self {
            Trail::Root => 0,
            Trail::Key(parent, _) | Trail::Index(parent, _) => parent.depth() + 1,
        }
    }
}

/// Renders `audit.scores[2]`, or `root` for the top level.
impl fmt::Display for Trail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trail::Root => f.write_str("root"),
            Trail::Key(Trail::Root, key) => f.write_str(key),
            Trail::Key(parent, key) => write!(f, "{}.{}", parent, key),
            Trail::Index(parent, idx) => write!(f, "{}[{}]", parent, idx),
        }
    }
}

/// Produces the canonical form of a top-level mapping.
///
/// # Example
///
/// ```rust
/// use ocp_canonical::{canonicalize, Value};
/// use serde_json::json;
///
/// let form = canonicalize(&Value::from(json!({"b": 2, "a": 1})))?;
/// assert_eq!(form.as_str(), r#"{"a":1,"b":2}"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns [`CanonicalizationError`] if the input is not a mapping, contains
/// a non-finite float, or nests deeper than [`MAX_DEPTH`].
pub fn canonicalize(value: &Value) -> Result<CanonicalForm, CanonicalizationError> {
    if !matches!(value, Value::Map(_)) {
        return Err(CanonicalizationError::NotAMapping(value.kind()));
    }
    let mut text = String::new();
    write_value(value, &Trail::Root, &mut text)?;
    Ok(CanonicalForm { text })
}

/// Produces the canonical form of a record.
pub fn canonicalize_record(record: &Record) -> Result<CanonicalForm, CanonicalizationError> {
    let mut text = String::new();
    write_map(record.iter(), &Trail::Root, &mut text)?;
    Ok(CanonicalForm { text })
}

/// Produces the canonical bytes of a top-level mapping.
pub fn encode(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    canonicalize(value).map(CanonicalForm::into_bytes)
}

/// True when both values canonicalize, and to identical bytes.
pub fn canonically_equal(a: &Value, b: &Value) -> bool {
    match (canonicalize(a), canonicalize(b)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn write_value(
    value: &Value,
    path: &Trail<'_>,
    out: &mut String,
) -> Result<(), CanonicalizationError> {
    if path.depth() > MAX_DEPTH {
        return Err(CanonicalizationError::DepthExceeded {
            path: path.to_string(),
            max: MAX_DEPTH,
        });
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(CanonicalizationError::NonFiniteNumber(path.to_string()));
            }
            out.push_str(&format_float(*f));
        }
        Value::Decimal(d) => write_string(d.as_str(), out),
        Value::Timestamp(ts) => write_string(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true), out),
        Value::Id(id) => write_string(&id.hyphenated().to_string(), out),
        Value::String(s) => write_string(s, out),
        Value::Seq(items) => write_seq(items, path, out)?,
        Value::Map(map) => write_map(map.iter(), path, out)?,
    }
    Ok(())
}

fn write_map<'a, I>(
    entries: I,
    path: &Trail<'_>,
    out: &mut String,
) -> Result<(), CanonicalizationError>
where
    I: Iterator<Item = (&'a String, &'a Value)>,
{
    let mut entries: Vec<_> = entries.collect();
    // `str` ordering is byte order, which for UTF-8 is code point order.
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    out.push('{');
    for (idx, (key, child)) in entries.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        write_string(key, out);
        out.push(':');
        write_value(child, &Trail::Key(path, key), out)?;
    }
    out.push('}');
    Ok(())
}

fn write_seq(
    items: &[Value],
    path: &Trail<'_>,
    out: &mut String,
) -> Result<(), CanonicalizationError> {
    let mut encoded = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let mut text = String::new();
        write_value(item, &Trail::Index(path, idx), &mut text)?;
        encoded.push((item, text));
    }

    if is_sortable(items) {
        encoded.sort_by(|(a, a_text), (b, b_text)| {
            compare_scalars(a, b).then_with(|| a_text.cmp(b_text))
        });
    }

    out.push('[');
    for (idx, (_, text)) in encoded.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(text);
    }
    out.push(']');
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Text,
    Number,
    Boolean,
}

fn scalar_kind(value: &Value) -> Option<ScalarKind> {
    match value {
        Value::String(_) => Some(ScalarKind::Text),
        Value::Integer(_) | Value::Float(_) => Some(ScalarKind::Number),
        Value::Bool(_) => Some(ScalarKind::Boolean),
        _ => None,
    }
}

/// A sequence is reordered only when every element is a comparable scalar of
/// one kind; anything else is an ordered collection and keeps its order.
fn is_sortable(items: &[Value]) -> bool {
    let Some(first) = items.first().and_then(scalar_kind) else {
        return false;
    };
    items.iter().all(|item| scalar_kind(item) == Some(first))
}

fn compare_scalars(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Integer(x), Value::Float(y)) => compare_int_float(*x, *y),
        (Value::Float(x), Value::Integer(y)) => compare_int_float(*y, *x).reverse(),
        _ => Ordering::Equal,
    }
}

/// Exact comparison of an integer against a finite float.
fn compare_int_float(int: i128, float: f64) -> Ordering {
    const TWO_POW_127: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    if float >= TWO_POW_127 {
        return Ordering::Less;
    }
    if float < -TWO_POW_127 {
        return Ordering::Greater;
    }
    let truncated = float.trunc();
    match int.cmp(&(truncated as i128)) {
        Ordering::Equal if float > truncated => Ordering::Less,
        Ordering::Equal if float < truncated => Ordering::Greater,
        other => other,
    }
}

/// Shortest round-trip float text in the reference `repr` layout.
///
/// Fixed notation for decimal exponents in `-4..16`, always with a fractional
/// part (`1.0`); otherwise `d[.ddd]e±XX` with at least two exponent digits.
pub(crate) fn format_float(value: f64) -> String {
    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if (-4..16).contains(&exponent) {
        if exponent >= 0 {
            let int_len = exponent as usize + 1;
            if digits.len() <= int_len {
                out.push_str(&digits);
                out.push_str(&"0".repeat(int_len - digits.len()));
                out.push_str(".0");
            } else {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            }
        } else {
            out.push_str("0.");
            out.push_str(&"0".repeat((-exponent - 1) as usize));
            out.push_str(&digits);
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exponent < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exponent.abs()));
    }
    out
}

/// JSON string literal; non-ASCII characters are emitted verbatim.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
