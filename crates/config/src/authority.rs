use std::{collections::BTreeMap, path::Path};

use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("read: {0}")]
    Io(String),

    #[error("parse: {0}")]
    Parse(String),

    #[error("bad key material for {company}: {reason}")]
    BadKey { company: String, reason: String },

    #[error("self-signature failed for a key of {0}")]
    BadSignature(String),

    #[error("{company} exceeds the per-entity validator cap of {cap}")]
    TooManyValidators { company: String, cap: usize },
}

/// One authority signer: an ed25519 key self-certifying its OP_NET binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityKey {
    /// Hex ed25519 verifying key.
    pub public_key: String,
    /// The OP_NET identity this key vouches for.
    pub opnet: String,
    /// Hex ed25519 signature over `public_key ∥ opnet` by the key itself.
    pub signature: String,
}

/// Static trusted-authority keyset for one `(version, chain, network)`.
///
/// Loading rejects the whole set if any key fails its self-signature; a
/// half-trusted set is worse than none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedAuthoritySet {
    pub version: u32,
    pub chain_id: u64,
    pub network: String,
    pub trusted: BTreeMap<String, Vec<AuthorityKey>>,
    pub minimum: usize,
    pub transaction_minimum: usize,
    pub maximum_validator_per_trusted_entities: usize,
}

impl TrustedAuthoritySet {
    pub fn load(path: &Path) -> Result<Self, AuthorityError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AuthorityError::Io(e.to_string()))?;
        let set: Self = toml::from_str(&raw).map_err(|e| AuthorityError::Parse(e.to_string()))?;
        set.verify()?;
        Ok(set)
    }

    /// Checks every key's self-signature and the per-entity cap.
    pub fn verify(&self) -> Result<(), AuthorityError> {
        for (company, keys) in &self.trusted {
            if keys.len() > self.maximum_validator_per_trusted_entities {
                return Err(AuthorityError::TooManyValidators {
                    company: company.clone(),
                    cap: self.maximum_validator_per_trusted_entities,
                });
            }
            for key in keys {
                verify_key(company, key)?;
            }
        }
        Ok(())
    }

    /// Total number of trusted signers.
    pub fn validator_count(&self) -> usize {
        self.trusted.values().map(Vec::len).sum()
    }
}

fn verify_key(company: &str, key: &AuthorityKey) -> Result<(), AuthorityError> {
    let bad_key = |reason: &str| AuthorityError::BadKey {
        company: company.to_string(),
        reason: reason.to_string(),
    };

    let pk_bytes: [u8; 32] = hex::decode(&key.public_key)
        .map_err(|_| bad_key("public key is not hex"))?
        .try_into()
        .map_err(|_| bad_key("public key must be 32 bytes"))?;
    let verifying_key =
        VerifyingKey::from_bytes(&pk_bytes).map_err(|_| bad_key("not an ed25519 point"))?;

    let sig_bytes: [u8; 64] = hex::decode(&key.signature)
        .map_err(|_| bad_key("signature is not hex"))?
        .try_into()
        .map_err(|_| bad_key("signature must be 64 bytes"))?;
    let signature = Signature::from_bytes(&sig_bytes);

    let mut message = pk_bytes.to_vec();
    message.extend_from_slice(key.opnet.as_bytes());

    verifying_key
        .verify(&message, &signature)
        .map_err(|_| AuthorityError::BadSignature(company.to_string()))
}
