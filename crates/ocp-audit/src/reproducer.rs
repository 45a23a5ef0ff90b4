use ocp_canonical::{semantic_hash, Digest, HashAlgorithm, HashError, Record};
use serde::{Deserialize, Serialize};

use crate::entry::Projection;

/// Outcome of recomputing an entry's semantic hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reproduction {
    /// True when the recomputed digest equals the stored one.
    pub matches: bool,
    /// Digest stored with the entry, as found.
    pub original: Option<String>,
    /// Digest recomputed over the projection.
    pub recomputed: Digest,
}

/// Recomputes the digest of an entry's projection and compares it with the
/// stored digest.
///
/// An entry with no stored digest never matches.
///
/// # Errors
///
/// Canonicalization failures propagate; they are never reported as a
/// mismatch.
pub fn reproduce(
    entry: &Record,
    projection: &Projection,
    alg: HashAlgorithm,
) -> Result<Reproduction, HashError> {
    let projected = projection.extract(entry);
    reproduce_projected(&projected, projection.stored_digest(entry), alg)
}

pub(crate) fn reproduce_projected(
    projected: &Record,
    stored: Option<&str>,
    alg: HashAlgorithm,
) -> Result<Reproduction, HashError> {
    let recomputed = semantic_hash(projected, alg)?;
    Ok(Reproduction {
        matches: stored.is_some_and(|s| recomputed.matches(s)),
        original: stored.map(str::to_string),
        recomputed,
    })
}
