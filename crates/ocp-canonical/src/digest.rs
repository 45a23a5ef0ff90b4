//! Semantic hashing over canonical bytes.
//!
//! A semantic hash is `H(canonical_bytes(record))` with `H` chosen from a
//! small named registry. Digests are lowercase hex and render with a `0x`
//! prefix.

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};
use std::fmt;
use std::str::FromStr;

use crate::canonicalizer::{canonicalize_record, CanonicalizationError};
use crate::value::Record;

/// Hash functions available for semantic hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256 (archive default).
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA-384.
    #[serde(rename = "sha384")]
    Sha384,
    /// SHA-512.
    #[serde(rename = "sha512")]
    Sha512,
    /// SHA3-256 (state-hash fields).
    #[serde(rename = "sha3-256")]
    Sha3_256,
    /// SHA3-512.
    #[serde(rename = "sha3-512")]
    Sha3_512,
}

impl HashAlgorithm {
    /// Every registered algorithm.
    pub const ALL: [HashAlgorithm; 5] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_512,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha3_256 => "sha3-256",
            HashAlgorithm::Sha3_512 => "sha3-512",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => 128,
        }
    }

    /// Hashes raw bytes.
    pub fn digest_bytes(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(bytes).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
            HashAlgorithm::Sha3_256 => Sha3_256::digest(bytes).to_vec(),
            HashAlgorithm::Sha3_512 => Sha3_512::digest(bytes).to_vec(),
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    /// Resolves a registry name. Case, `-` and `_` are not significant.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "sha3256" => Ok(HashAlgorithm::Sha3_256),
            "sha3512" => Ok(HashAlgorithm::Sha3_512),
            _ => Err(HashError::UnsupportedAlgorithm(name.to_string())),
        }
    }
}

/// Errors raised by the semantic hasher.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The record could not be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
    /// The algorithm name is not in the registry.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Algorithm tag plus lowercase hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    /// Algorithm that produced the digest.
    pub alg: HashAlgorithm,
    /// Lowercase hex, no prefix.
    pub hex: String,
}

impl Digest {
    /// Wraps raw digest bytes.
    pub fn from_bytes(alg: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            alg,
            hex: hex::encode(bytes),
        }
    }

    /// Hex with the conventional `0x` prefix.
    pub fn prefixed(&self) -> String {
        format!("0x{}", self.hex)
    }

    /// Compares against a stored digest string.
    ///
    /// The comparison ignores an optional `0x` prefix and hex case; it is
    /// otherwise exact.
    pub fn matches(&self, stored: &str) -> bool {
        strip_hex_prefix(stored.trim()).eq_ignore_ascii_case(&self.hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.hex)
    }
}

/// Removes a leading `0x`/`0X`.
pub fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

/// Computes the semantic hash of a record.
///
/// Formula: `alg(canonical_bytes(record))`
///
/// # Example
///
/// ```rust
/// use ocp_canonical::{semantic_hash, HashAlgorithm, Record};
/// use serde_json::json;
///
/// let record = Record::from_json(json!({"a": 1, "b": 2}))?;
/// let digest = semantic_hash(&record, HashAlgorithm::Sha256)?;
/// assert_eq!(digest.hex.len(), 64);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] if the record has no canonical form.
pub fn semantic_hash(record: &Record, alg: HashAlgorithm) -> Result<Digest, HashError> {
    let form = canonicalize_record(record)?;
    Ok(Digest::from_bytes(alg, &alg.digest_bytes(form.as_bytes())))
}

/// Computes the semantic hash with an algorithm looked up by name.
///
/// # Errors
///
/// Returns [`HashError::UnsupportedAlgorithm`] for unknown names.
pub fn semantic_hash_named(record: &Record, alg: &str) -> Result<Digest, HashError> {
    semantic_hash(record, alg.parse()?)
}

/// Verifies that a record reproduces the expected digest.
///
/// Equivalent to `semantic_hash(record, alg)?.matches(expected)`.
pub fn verify_semantic_hash(
    record: &Record,
    expected: &str,
    alg: HashAlgorithm,
) -> Result<bool, HashError> {
    Ok(semantic_hash(record, alg)?.matches(expected))
}
