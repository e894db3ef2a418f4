use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::Buf32;
use serde::{Deserialize, Serialize};

/// ML-DSA security level (FIPS 204 parameter set).
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum MldsaLevel {
    Level2,
    Level3,
    Level5,
}

impl MldsaLevel {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            2 => Some(Self::Level2),
            3 => Some(Self::Level3),
            5 => Some(Self::Level5),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level5 => 5,
        }
    }

    /// Public key size of the parameter set, in bytes.
    pub fn public_key_len(self) -> usize {
        match self {
            Self::Level2 => 1312,
            Self::Level3 => 1952,
            Self::Level5 => 2592,
        }
    }
}

/// Binding between a quantum-safe ML-DSA identity and a legacy key.
///
/// `exposed_block_height` is stamped when the full ML-DSA public key has been
/// revealed on-chain; until then only its hash is known.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct MldsaLink {
    pub hashed_public_key: Buf32,
    pub legacy_public_key: Buf32,
    pub public_key: Option<Vec<u8>>,
    pub level: MldsaLevel,
    pub inserted_block_height: u64,
    pub exposed_block_height: Option<u64>,
}
