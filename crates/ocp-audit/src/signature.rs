//! Signature verification capability.
//!
//! The auditor never judges a signature by its shape alone once a verifier
//! is configured: it hands the signed message, the signature text and the
//! agent's public key to a [`SignatureVerifier`].

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::collections::HashMap;

/// Asymmetric signature verification.
pub trait SignatureVerifier: Send + Sync {
    /// True when `signature` is a valid signature of `message` under
    /// `public_key`. Malformed input is simply not valid.
    fn verify(&self, message: &[u8], signature: &str, public_key: &[u8]) -> bool;
}

/// Resolves an agent's public key.
pub trait KeyResolver: Send + Sync {
    /// Raw public key bytes for the agent, if known.
    fn public_key(&self, agent_id: &str) -> Option<Vec<u8>>;
}

/// Ed25519 verification over signatures encoded as base64url or hex.
///
/// An optional prefix (such as `ed25519:`) is required and stripped before
/// decoding when configured.
#[derive(Debug, Clone, Default)]
pub struct Ed25519Verifier {
    prefix: Option<String>,
}

impl Ed25519Verifier {
    /// Verifier for bare encoded signatures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier for signatures carrying a prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn decode(&self, signature: &str) -> Option<[u8; 64]> {
        let body = match &self.prefix {
            Some(prefix) => signature.strip_prefix(prefix.as_str())?,
            None => signature,
        };
        let bytes = if body.len() == 128 && body.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(body).ok()?
        } else {
            URL_SAFE_NO_PAD
                .decode(body)
                .or_else(|_| URL_SAFE.decode(body))
                .ok()?
        };
        bytes.as_slice().try_into().ok()
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &str, public_key: &[u8]) -> bool {
        let Some(signature) = self.decode(signature) else {
            return false;
        };
        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(&signature)).is_ok()
    }
}

/// Fixed agent-to-key table.
#[derive(Debug, Clone, Default)]
pub struct StaticKeys {
    keys: HashMap<String, Vec<u8>>,
}

impl StaticKeys {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent's key.
    pub fn insert(&mut self, agent_id: impl Into<String>, public_key: impl Into<Vec<u8>>) {
        self.keys.insert(agent_id.into(), public_key.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_key(mut self, agent_id: impl Into<String>, public_key: impl Into<Vec<u8>>) -> Self {
        self.insert(agent_id, public_key);
        self
    }
}

impl KeyResolver for StaticKeys {
    fn public_key(&self, agent_id: &str) -> Option<Vec<u8>> {
        self.keys.get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn accepts_hex_and_base64url_encodings() {
        let signing = key();
        let public = signing.verifying_key().to_bytes();
        let sig = signing.sign(b"payload").to_bytes();

        let verifier = Ed25519Verifier::new();
        assert!(verifier.verify(b"payload", &hex::encode(sig), &public));
        assert!(verifier.verify(b"payload", &URL_SAFE_NO_PAD.encode(sig), &public));
        assert!(verifier.verify(b"payload", &URL_SAFE.encode(sig), &public));
        assert!(!verifier.verify(b"other", &hex::encode(sig), &public));
    }

    #[test]
    fn prefix_is_required_when_configured() {
        let signing = key();
        let public = signing.verifying_key().to_bytes();
        let encoded = URL_SAFE_NO_PAD.encode(signing.sign(b"payload").to_bytes());

        let verifier = Ed25519Verifier::with_prefix("ed25519:");
        assert!(verifier.verify(b"payload", &format!("ed25519:{}", encoded), &public));
        assert!(!verifier.verify(b"payload", &encoded, &public));
    }

    #[test]
    fn malformed_keys_and_signatures_do_not_verify() {
        let verifier = Ed25519Verifier::new();
        let public = key().verifying_key().to_bytes();
        assert!(!verifier.verify(b"payload", "SIG-not-a-signature", &public));
        assert!(!verifier.verify(b"payload", &"00".repeat(64), &public[..16]));
    }
}
