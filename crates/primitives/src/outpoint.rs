use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::Buf32;

/// Reference to a transaction output, the unique key of the UTXO set.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct OutPointRef {
    pub txid: Buf32,
    pub vout: u16,
}

impl OutPointRef {
    pub fn new(txid: Buf32, vout: u16) -> Self {
        Self { txid, vout }
    }

    /// Fixed-width key encoding, `txid ∥ vout_be`. Sorts txid-first.
    pub fn to_key_bytes(&self) -> [u8; 34] {
        let mut out = [0u8; 34];
        out[..32].copy_from_slice(self.txid.as_bytes());
        out[32..].copy_from_slice(&self.vout.to_be_bytes());
        out
    }

    pub fn from_key_bytes(bytes: &[u8; 34]) -> Self {
        let txid = Buf32::from_slice(&bytes[..32]).expect("fixed 32-byte slice");
        let vout = u16::from_be_bytes([bytes[32], bytes[33]]);
        Self { txid, vout }
    }
}

impl fmt::Display for OutPointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl fmt::Debug for OutPointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.txid, self.vout)
    }
}
