use thiserror::Error;

/// Why a decimal literal or its parts were refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The text is not a plain decimal literal: optional `-`, digits without
    /// leading zeros, optional fraction. `-0` is refused as well.
    #[error("{part} '{text}' is not a valid decimal literal")]
    MalformedLiteral {
        /// Which piece was parsed: `decimal` or `mantissa`.
        part: &'static str,
        /// Text as supplied.
        text: String,
    },
    /// More fractional digits than a decimal may carry.
    #[error("scale {scale} exceeds the maximum of {max} fractional digits")]
    ScaleTooLarge {
        /// Requested or parsed scale.
        scale: u32,
        /// Largest accepted scale.
        max: u32,
    },
}
