use opnet_primitives::Buf32;
use serde::{Deserialize, Serialize};

/// Chain specific consensus parameters, constant for every node on a given
/// network. Changing any of these forks the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Chain id mixed into signed epoch submissions.
    pub chain_id: u64,

    /// Protocol id mixed into signed epoch submissions.
    pub protocol_id: Buf32,

    /// Number of Bitcoin blocks per mining epoch.
    pub blocks_per_epoch: u64,

    /// Minimum number of leading matching bits for an epoch solution.
    pub min_difficulty: u32,

    /// Maximum graffiti bytes attached to an epoch submission.
    pub graffiti_length: usize,

    /// Maximum nested contract call depth.
    pub max_call_depth: usize,

    /// Maximum nested deployments within one execution.
    pub max_deployment_depth: usize,

    /// Reject calls back into a contract already on the call stack.
    pub reentrancy_guard: bool,

    /// Fail `storage_get` for slots absent from the declared access list.
    pub strict_access_list: bool,

    /// Maximum `(contract, slot)` entries in one access list.
    pub access_list_cap: usize,

    /// Per-event payload byte cap.
    pub max_event_data_size: usize,

    /// Per-event name byte cap.
    pub max_event_name_size: usize,

    /// Total event bytes per execution.
    pub max_total_event_size: usize,

    /// Maximum tx inputs exposed to contracts.
    pub max_inputs: usize,

    /// Maximum tx outputs exposed to contracts.
    pub max_outputs: usize,

    /// Revert payloads above this are truncated.
    pub max_revert_payload: usize,

    /// Decompressed calldata/bytecode bound.
    pub max_calldata_size: usize,

    /// Gas ceiling per transaction.
    pub max_tx_gas: u64,

    /// Base gas charged per executed transaction.
    pub base_gas: u64,

    /// Gas units bought per burned sat.
    pub gas_per_sat: u64,

    /// Require ML-DSA signatures alongside Schnorr on epoch submissions.
    pub safe_signature_mode: bool,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            chain_id: 1,
            protocol_id: Buf32::new(*b"OP_NET\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0"),
            blocks_per_epoch: 10,
            min_difficulty: 20,
            graffiti_length: 16,
            max_call_depth: 10,
            max_deployment_depth: 3,
            reentrancy_guard: true,
            strict_access_list: true,
            access_list_cap: 1000,
            max_event_data_size: 352,
            max_event_name_size: 64,
            max_total_event_size: 1024 * 8,
            max_inputs: 255,
            max_outputs: 255,
            max_revert_payload: 4096,
            max_calldata_size: 1024 * 512,
            max_tx_gas: 100_000_000,
            base_gas: 10_000,
            gas_per_sat: 1_000,
            safe_signature_mode: false,
        }
    }
}

impl ConsensusParams {
    /// Epoch that would be finalised next at the given chain height.
    pub fn next_epoch_number(&self, height: u64) -> u64 {
        height / self.blocks_per_epoch + 1
    }

    /// Height of the block whose checksum root seeds the given epoch's
    /// target. Epoch 0 has no target.
    pub fn epoch_target_height(&self, epoch_number: u64) -> Option<u64> {
        epoch_number
            .checked_sub(1)
            .map(|n| n * self.blocks_per_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_epoch_number() {
        let params = ConsensusParams::default();
        // blocks_per_epoch = 10
        assert_eq!(params.next_epoch_number(0), 1);
        assert_eq!(params.next_epoch_number(9), 1);
        assert_eq!(params.next_epoch_number(10), 2);
        assert_eq!(params.next_epoch_number(19), 2);
    }

    #[test]
    fn test_epoch_target_height() {
        let params = ConsensusParams::default();
        assert_eq!(params.epoch_target_height(0), None);
        assert_eq!(params.epoch_target_height(1), Some(0));
        assert_eq!(params.epoch_target_height(2), Some(10));
    }
}
