use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::Buf32;
use serde::{Deserialize, Serialize};

/// A mining epoch: a fixed-length window of blocks sharing one SHA-1 target.
///
/// `target` is the checksum root of the first block of the previous window;
/// epoch 0 has no prior window and is unmineable.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Epoch {
    pub epoch_number: u64,
    pub target: Buf32,
    /// SHA-1 of `target`, left-padded to 32 bytes for storage.
    pub target_hash: Buf32,
    pub best: Option<EpochSubmission>,
}

/// A miner's solution attempt for an epoch.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct EpochSubmission {
    pub epoch_number: u64,
    pub salt: Buf32,
    pub mldsa_public_key: Buf32,
    pub graffiti: Option<Vec<u8>>,
    /// Leading matching bits between the candidate digest and the target
    /// hash.
    pub difficulty: u32,
    pub legacy_public_key: Buf32,
}
