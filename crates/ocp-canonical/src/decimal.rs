use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::validation::ValidationError;

const DECIMAL_SCALE_MAX: u32 = 18;

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?$").expect("invalid regex"))
}

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?[1-9][0-9]*$").expect("invalid regex"))
}

/// Fixed-precision decimal kept in its exact textual form.
///
/// The text is what gets hashed: `"123.45"` and `"123.450"` are distinct
/// values, and neither is ever routed through a binary float.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Decimal(String);

impl Decimal {
    /// Parses a decimal literal (`-?digits[.digits]`, no leading zeros, no `-0`).
    pub fn parse(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        if !decimal_pattern().is_match(&text) || is_negative_zero(&text) {
            return Err(ValidationError::MalformedLiteral {
                part: "decimal",
                text,
            });
        }
        let scale = text.split_once('.').map_or(0, |(_, frac)| frac.len());
        if scale > DECIMAL_SCALE_MAX as usize {
            return Err(ValidationError::ScaleTooLarge {
                scale: u32::try_from(scale).unwrap_or(u32::MAX),
                max: DECIMAL_SCALE_MAX,
            });
        }
        Ok(Self(text))
    }

    /// Builds a decimal from a signed integer mantissa and a non-negative scale.
    ///
    /// `from_parts("12345", 2)` is `123.45`.
    pub fn from_parts(mantissa: impl Into<String>, scale: u32) -> Result<Self, ValidationError> {
        let mantissa = mantissa.into();
        if scale > DECIMAL_SCALE_MAX {
            return Err(ValidationError::ScaleTooLarge {
                scale,
                max: DECIMAL_SCALE_MAX,
            });
        }
        if !is_valid_integer(&mantissa) {
            return Err(ValidationError::MalformedLiteral {
                part: "mantissa",
                text: mantissa,
            });
        }
        if scale == 0 {
            return Ok(Self(mantissa));
        }

        let (sign, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", mantissa.as_str()),
        };
        let scale = scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits.to_string()
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        Ok(Self(format!("{}{}.{}", sign, int_part, frac_part)))
    }

    /// Exact textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u32 {
        self.0
            .split_once('.')
            .map_or(0, |(_, frac)| frac.len() as u32)
    }

    /// Nearest binary approximation, for range comparisons only.
    pub fn to_f64(&self) -> f64 {
        // The pattern check guarantees a parseable literal.
        self.0.parse().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Decimal {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Decimal> for String {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::str::FromStr for Decimal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_valid_integer(value: &str) -> bool {
    if value == "0" {
        return true;
    }
    if value == "-0" {
        return false;
    }
    integer_pattern().is_match(value)
}

fn is_negative_zero(text: &str) -> bool {
    text.strip_prefix('-')
        .map(|rest| rest.chars().all(|c| c == '0' || c == '.'))
        .unwrap_or(false)
}
