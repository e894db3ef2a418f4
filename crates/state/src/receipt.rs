use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::{Buf32, Uint256};
use serde::{Deserialize, Serialize};

/// How a transaction was classified by the parser.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum TxKindTag {
    Generic,
    Interaction,
    Deployment,
}

/// An event emitted by a contract during a successful execution.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ContractEvent {
    pub contract: Buf32,
    #[serde(with = "hex::serde")]
    pub event_type: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl ContractEvent {
    /// Total bytes this event contributes to the per-execution budget.
    pub fn byte_size(&self) -> usize {
        self.event_type.len() + self.data.len()
    }
}

/// Execution receipt for one transaction of a committed block.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TxReceipt {
    pub txid: Buf32,
    /// Authoritative intra-block ordinal assigned by the sorter.
    pub index: u32,
    pub kind: TxKindTag,
    pub gas_used: Uint256,
    /// Revert payload when the execution failed; `None` means success.
    pub reverted: Option<Vec<u8>>,
    pub events: Vec<ContractEvent>,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.reverted.is_none()
    }
}
