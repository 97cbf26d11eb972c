//! Identities and signing keys
//!
//! An [`Identity`] is the opaque, stable, printable name of an Ed25519
//! verifying key: `ed25519:<64 hex chars>`. Equality is string-exact; no
//! normalization happens anywhere. A [`Signer`] owns the corresponding
//! signing key and produces detached signatures over instruction digests.

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Error, Result};

/// Textual prefix of every identity
pub const IDENTITY_SCHEME: &str = "ed25519:";

/// Opaque, stable, printable identifier for a verifying key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Identity of a verifying key
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(format!("{IDENTITY_SCHEME}{}", hex::encode(key.as_bytes())))
    }

    /// Parse the textual form, validating scheme and key length
    pub fn parse(text: &str) -> Result<Self> {
        let hex_part = text
            .strip_prefix(IDENTITY_SCHEME)
            .ok_or_else(|| Error::validation(format!("identity must start with {IDENTITY_SCHEME:?}: {text}")))?;
        let bytes = hex::decode(hex_part)
            .map_err(|_| Error::validation(format!("identity key is not hex: {text}")))?;
        if bytes.len() != 32 {
            return Err(Error::validation(format!(
                "identity key must be 32 bytes, got {}: {text}",
                bytes.len()
            )));
        }
        Ok(Self(text.to_string()))
    }

    /// The textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the verifying key for signature checks
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let hex_part = self
            .0
            .strip_prefix(IDENTITY_SCHEME)
            .ok_or_else(|| Error::validation(format!("malformed identity: {}", self.0)))?;
        let bytes: [u8; 32] = hex::decode(hex_part)
            .map_err(|_| Error::validation(format!("malformed identity: {}", self.0)))?
            .try_into()
            .map_err(|_| Error::validation(format!("malformed identity: {}", self.0)))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| Error::validation(format!("identity is not a valid Ed25519 point: {}", self.0)))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detached Ed25519 signature bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Verify `signature` over `message` against `identity`'s key.
///
/// Returns `false` for malformed identities or signature bytes rather than
/// erroring; a signature that cannot be parsed is simply not valid.
pub fn verify(identity: &Identity, message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = identity.verifying_key() else {
        return false;
    };
    let Ok(bytes) = <[u8; 64]>::try_from(signature.as_bytes()) else {
        return false;
    };
    key.verify(message, &ed25519_dalek::Signature::from_bytes(&bytes)).is_ok()
}

/// Owns an Ed25519 signing key and produces identities and signatures
#[derive(Debug, Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    /// Fresh random signer
    pub fn generate() -> Self {
        Self { key: SigningKey::generate(&mut rand::rngs::OsRng) }
    }

    /// Deterministic signer from a 32-byte seed (test fixtures)
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { key: SigningKey::from_bytes(&seed) }
    }

    /// This signer's identity
    pub fn identity(&self) -> Identity {
        Identity::from_verifying_key(&self.key.verifying_key())
    }

    /// Sign a message (an instruction digest in this system)
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.key.sign(message).to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn identity_round_trips_through_text() {
        let signer = Signer::from_seed([7u8; 32]);
        let id = signer.identity();
        let parsed = Identity::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
        assert!(id.as_str().starts_with(IDENTITY_SCHEME));
        assert_eq!(id.as_str().len(), IDENTITY_SCHEME.len() + 64);
    }

    #[test]
    fn parse_rejects_wrong_scheme_and_length() {
        assert_matches!(Identity::parse("rsa:abcd"), Err(Error::Validation { .. }));
        assert_matches!(Identity::parse("ed25519:abcd"), Err(Error::Validation { .. }));
        assert_matches!(Identity::parse("ed25519:zz"), Err(Error::Validation { .. }));
    }

    #[test]
    fn signatures_verify_against_the_signing_identity_only() {
        let a = Signer::from_seed([1u8; 32]);
        let b = Signer::from_seed([2u8; 32]);
        let digest = [9u8; 32];

        let sig = a.sign(&digest);
        assert!(verify(&a.identity(), &digest, &sig));
        assert!(!verify(&b.identity(), &digest, &sig));
        assert!(!verify(&a.identity(), &[0u8; 32], &sig));
    }
}
