use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Record of a handled chain reorganisation.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ReorgRecord {
    /// First reverted height.
    pub from_block: u64,
    /// Last reverted height (the old tip).
    pub to_block: u64,
    /// Unix seconds at which the revert completed.
    pub timestamp: u64,
}
