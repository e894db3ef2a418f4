use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::{Address32, Uint256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    ContractRecord, EpochSubmission, MldsaLink, PublicKeyDirectoryEntry, SpentRef, TxReceipt,
    TxRecord, Unspent,
};

/// Post-state delta of one block, the unit `commit_block` applies atomically.
#[derive(
    Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct BlockWrites {
    pub utxo_add: Vec<Unspent>,
    pub utxo_spend: Vec<SpentRef>,
    /// `(contract, slot, new value)` triples.
    pub storage_set: Vec<(Address32, Uint256, Uint256)>,
    pub contract_deploy: Vec<ContractRecord>,
    pub public_keys: Vec<PublicKeyDirectoryEntry>,
    pub mldsa_links: Vec<MldsaLink>,
    pub receipts: Vec<TxReceipt>,
    pub epoch_submissions: Vec<EpochSubmission>,
    pub transactions: Vec<TxRecord>,
}

impl BlockWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.utxo_add.is_empty()
            && self.utxo_spend.is_empty()
            && self.storage_set.is_empty()
            && self.contract_deploy.is_empty()
            && self.public_keys.is_empty()
            && self.mldsa_links.is_empty()
            && self.receipts.is_empty()
            && self.epoch_submissions.is_empty()
            && self.transactions.is_empty()
    }

    /// Merges a per-execution storage delta. Later writes to the same slot
    /// overwrite earlier ones.
    pub fn merge_storage(&mut self, modified: &BTreeMap<Address32, BTreeMap<U256, U256>>) {
        for (contract, slots) in modified {
            for (slot, value) in slots {
                match self
                    .storage_set
                    .iter_mut()
                    .find(|(c, s, _)| c == contract && s.get() == *slot)
                {
                    Some(entry) => entry.2 = Uint256::new(*value),
                    None => self
                        .storage_set
                        .push((*contract, Uint256::new(*slot), Uint256::new(*value))),
                }
            }
        }
    }
}
