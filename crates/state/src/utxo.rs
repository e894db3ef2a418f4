use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::OutPointRef;
use serde::{Deserialize, Serialize};

/// Output script with its decoded address, when standard.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ScriptInfo {
    #[serde(with = "hex::serde")]
    pub hex: Vec<u8>,
    pub address: Option<String>,
}

/// An entry of the versioned UTXO set.
///
/// Live iff `spent_at_block` is unset. Spending never deletes the row; it
/// stamps the height so a reorg can re-liven it.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Unspent {
    pub outpoint: OutPointRef,
    pub value: u64,
    pub script_pubkey: ScriptInfo,
    pub created_at_block: u64,
    pub spent_at_block: Option<u64>,
}

impl Unspent {
    pub fn is_live(&self) -> bool {
        self.spent_at_block.is_none()
    }
}

/// A spend recorded by a block: which outpoint, spent where.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, BorshSerialize,
    BorshDeserialize,
)]
pub struct SpentRef {
    pub outpoint: OutPointRef,
    pub spent_at_block: u64,
}
