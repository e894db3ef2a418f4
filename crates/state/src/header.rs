use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::{Buf32, Uint256};
use serde::{Deserialize, Serialize};

/// Committed OP_NET block header.
///
/// `checksum_root` commits to the block's post-state delta and is the only
/// field the epoch validator ever reads.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: Buf32,
    pub prev_hash: Buf32,
    pub merkle_root: Buf32,
    pub receipt_root: Buf32,
    pub storage_root: Buf32,
    pub checksum_root: Buf32,
    pub gas_used: Uint256,
    pub base_gas: Uint256,
    pub ema: Uint256,
    pub n_tx: u32,
}

impl BlockHeader {
    /// Header shell before execution fills in roots and gas totals.
    pub fn pre_execution(height: u64, hash: Buf32, prev_hash: Buf32, merkle_root: Buf32) -> Self {
        Self {
            height,
            hash,
            prev_hash,
            merkle_root,
            receipt_root: Buf32::zero(),
            storage_root: Buf32::zero(),
            checksum_root: Buf32::zero(),
            gas_used: Uint256::ZERO,
            base_gas: Uint256::ZERO,
            ema: Uint256::ZERO,
            n_tx: 0,
        }
    }
}
