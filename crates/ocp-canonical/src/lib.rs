//! Canonical record encoding and semantic hashing for the constitutional archive.
//!
//! Every digest the archive commits to is computed over the canonical form
//! produced here:
//!
//! - [`Value`] / [`Record`]: the structured record model (decimals, timestamps
//!   and identifiers are first-class scalars)
//! - [`canonicalize`]: the single authoritative encoder
//! - [`semantic_hash`] / [`verify_semantic_hash`]: hashing with a named
//!   [`HashAlgorithm`]
//!
//! Encoding is pure and environment independent; two records with the same
//! content in any key order share one canonical form and one digest.
//!
#![deny(missing_docs)]

/// Deterministic canonical encoder.
pub mod canonicalizer;
/// Fixed-precision decimal scalar.
pub mod decimal;
/// Semantic hash registry and digests.
pub mod digest;
/// Validation helpers used by canonical types.
pub mod validation;
/// Record value model.
pub mod value;

pub use canonicalizer::{
    canonicalize, canonicalize_record, canonically_equal, encode, CanonicalForm,
    CanonicalizationError, MAX_DEPTH,
};
pub use decimal::Decimal;
pub use digest::{
    semantic_hash, semantic_hash_named, strip_hex_prefix, verify_semantic_hash, Digest,
    HashAlgorithm, HashError,
};
pub use validation::ValidationError;
pub use value::{Map, Record, Value};
