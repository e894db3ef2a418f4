use std::collections::BTreeMap;

use async_trait::async_trait;
use opnet_primitives::{Address32, Buf32, OutPointRef, U256};
use opnet_state::{
    BlockHeader, BlockWrites, ContractRecord, Epoch, EpochSubmission, MldsaLink, ReorgRecord,
    TxReceipt, TxRecord, Unspent,
};

use crate::StorageError;

/// Slots to preload for one execution, per contract.
pub type PreloadRequest = Vec<(Address32, Vec<U256>)>;

/// Result of an access-list preload: every requested slot appears, either
/// with its committed value or as a proven absence.
pub type PreloadedStorage = BTreeMap<Address32, BTreeMap<U256, Option<U256>>>;

/// The storage contract of the block-processing pipeline.
///
/// One writer (the scheduler) commits strictly sequential blocks; reads may
/// run concurrently. `revert_until` is reserved to the reorg watchdog and the
/// startup recovery path.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_utxo(&self, outpoint: OutPointRef) -> Result<Option<Unspent>, StorageError>;

    /// Sum of live UTXO values for an address. `filter_ordinals` skips
    /// dust-sized carrier outputs.
    async fn get_balance_of(
        &self,
        address: &str,
        filter_ordinals: bool,
    ) -> Result<u64, StorageError>;

    /// Live UTXOs of an address.
    async fn get_utxos_of(&self, address: &str) -> Result<Vec<Unspent>, StorageError>;

    /// Latest committed value of one storage pointer.
    async fn get_storage(
        &self,
        contract: Address32,
        slot: U256,
    ) -> Result<Option<U256>, StorageError>;

    /// Batched read of an execution's declared access list.
    async fn preload_storage(
        &self,
        request: PreloadRequest,
    ) -> Result<PreloadedStorage, StorageError>;

    /// Atomically applies one block's write batch. Computes and returns the
    /// checksum root; the stored header carries it.
    async fn commit_block(
        &self,
        header: BlockHeader,
        writes: BlockWrites,
    ) -> Result<Buf32, StorageError>;

    /// Removes all state at heights `>= height`: headers, transactions,
    /// receipts, contracts and submissions go away; UTXOs created there are
    /// deleted and UTXOs spent there become live again. Idempotent.
    async fn revert_until(&self, height: u64) -> Result<(), StorageError>;

    async fn get_latest_block(&self) -> Result<Option<BlockHeader>, StorageError>;

    async fn get_block_header(&self, height: u64) -> Result<Option<BlockHeader>, StorageError>;

    async fn get_block_by_hash(&self, hash: Buf32) -> Result<Option<BlockHeader>, StorageError>;

    async fn get_block_transactions(&self, height: u64) -> Result<Vec<TxRecord>, StorageError>;

    async fn get_receipt(&self, txid: Buf32) -> Result<Option<TxReceipt>, StorageError>;

    async fn get_contract(
        &self,
        address: Address32,
    ) -> Result<Option<ContractRecord>, StorageError>;

    async fn get_mldsa_link(&self, hashed_key: Buf32) -> Result<Option<MldsaLink>, StorageError>;

    /// Epoch target row with its current best solution.
    async fn get_epoch(&self, epoch_number: u64) -> Result<Option<Epoch>, StorageError>;

    /// Persists a derived epoch target row; upsert keyed on epoch number.
    /// `seed_height` is the block whose checksum root seeds the target, so a
    /// revert below it drops the row.
    async fn put_epoch(&self, seed_height: u64, epoch: Epoch) -> Result<(), StorageError>;

    /// Records a validated submission. At most one row per
    /// `(epoch, salt, key)`; duplicates fail with
    /// [`StorageError::DuplicateSubmission`].
    async fn put_epoch_submission(
        &self,
        height: u64,
        submission: EpochSubmission,
    ) -> Result<(), StorageError>;

    /// Best solution for an epoch: highest difficulty, earliest insertion on
    /// ties.
    async fn get_best_submission(
        &self,
        epoch_number: u64,
    ) -> Result<Option<EpochSubmission>, StorageError>;

    async fn record_reorg(&self, record: ReorgRecord) -> Result<(), StorageError>;

    async fn get_reorgs(&self) -> Result<Vec<ReorgRecord>, StorageError>;

    /// Aborts any half-applied batch; called at startup and on reorg before
    /// `revert_until`. Returns whether pending writes were found.
    async fn kill_all_pending_writes(&self) -> Result<bool, StorageError>;

    /// Deletes spent UTXO rows with `spent_at_block < height`. Returns the
    /// number purged.
    async fn purge_spent_older_than(&self, height: u64) -> Result<u64, StorageError>;
}
