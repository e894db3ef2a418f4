//! In-memory state store, semantics-identical to the sled implementation.
//!
//! Backs unit tests of the executor and chain worker; also useful for
//! read-only dry runs where persistence is unwanted.

use std::collections::BTreeMap;

use async_trait::async_trait;
use opnet_primitives::{Address32, Buf32, OutPointRef, U256};
use opnet_state::{
    compute_checksum_root, BlockHeader, BlockWrites, ContractRecord, Epoch, EpochSubmission,
    MldsaLink, PublicKeyDirectoryEntry, ReorgRecord, TxReceipt, TxRecord, Unspent,
};
use parking_lot::Mutex;

use crate::{PreloadRequest, PreloadedStorage, StateStore, StorageError, StorageResult};

const ORDINALS_DUST_LIMIT: u64 = 546;

#[derive(Default)]
struct MemInner {
    blocks: BTreeMap<u64, BlockHeader>,
    hash_index: BTreeMap<Buf32, u64>,
    transactions: BTreeMap<(u64, u32), TxRecord>,
    receipts: BTreeMap<Buf32, (u64, TxReceipt)>,
    utxos: BTreeMap<OutPointRef, Unspent>,
    storage: BTreeMap<(Address32, U256, u64), U256>,
    contracts: BTreeMap<Address32, ContractRecord>,
    public_keys: BTreeMap<Buf32, PublicKeyDirectoryEntry>,
    mldsa: BTreeMap<Buf32, MldsaLink>,
    epochs: BTreeMap<u64, (u64, Epoch)>,
    submissions: BTreeMap<(u64, Buf32, Buf32), (u64, u64, EpochSubmission)>,
    reorgs: Vec<ReorgRecord>,
    tip: Option<u64>,
    seq: u64,
    pending: bool,
}

impl MemInner {
    fn get_storage(&self, contract: &Address32, slot: &U256) -> Option<U256> {
        self.storage
            .range((*contract, *slot, 0)..=(*contract, *slot, u64::MAX))
            .next_back()
            .map(|(_, value)| *value)
    }

    fn live_utxos_of(&self, address: &str) -> Vec<Unspent> {
        self.utxos
            .values()
            .filter(|u| {
                u.is_live() && u.script_pubkey.address.as_deref() == Some(address)
            })
            .cloned()
            .collect()
    }

    fn best_submission(&self, epoch_number: u64) -> Option<EpochSubmission> {
        self.submissions
            .range((epoch_number, Buf32::zero(), Buf32::zero())..)
            .take_while(|((epoch, _, _), _)| *epoch == epoch_number)
            .min_by(|(_, (_, seq_a, a)), (_, (_, seq_b, b))| {
                // highest difficulty first, then earliest insertion
                b.difficulty.cmp(&a.difficulty).then(seq_a.cmp(seq_b))
            })
            .map(|(_, (_, _, submission))| submission.clone())
    }

    fn put_submission(&mut self, height: u64, submission: EpochSubmission) -> StorageResult<()> {
        let key = (
            submission.epoch_number,
            submission.salt,
            submission.mldsa_public_key,
        );
        if self.submissions.contains_key(&key) {
            return Err(StorageError::DuplicateSubmission);
        }
        self.seq += 1;
        self.submissions.insert(key, (height, self.seq, submission));
        Ok(())
    }
}

/// Heap-backed [`StateStore`].
#[derive(Default)]
pub struct MemStateStore {
    inner: Mutex<MemInner>,
}

impl std::fmt::Debug for MemStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStateStore").finish_non_exhaustive()
    }
}

impl MemStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemStateStore {
    async fn get_utxo(&self, outpoint: OutPointRef) -> StorageResult<Option<Unspent>> {
        Ok(self.inner.lock().utxos.get(&outpoint).cloned())
    }

    async fn get_balance_of(&self, address: &str, filter_ordinals: bool) -> StorageResult<u64> {
        Ok(self
            .inner
            .lock()
            .live_utxos_of(address)
            .iter()
            .filter(|u| !filter_ordinals || u.value > ORDINALS_DUST_LIMIT)
            .map(|u| u.value)
            .sum())
    }

    async fn get_utxos_of(&self, address: &str) -> StorageResult<Vec<Unspent>> {
        Ok(self.inner.lock().live_utxos_of(address))
    }

    async fn get_storage(&self, contract: Address32, slot: U256) -> StorageResult<Option<U256>> {
        Ok(self.inner.lock().get_storage(&contract, &slot))
    }

    async fn preload_storage(&self, request: PreloadRequest) -> StorageResult<PreloadedStorage> {
        let inner = self.inner.lock();
        let mut out = PreloadedStorage::new();
        for (contract, slots) in request {
            let entry = out.entry(contract).or_default();
            for slot in slots {
                entry.insert(slot, inner.get_storage(&contract, &slot));
            }
        }
        Ok(out)
    }

    async fn commit_block(
        &self,
        mut header: BlockHeader,
        writes: BlockWrites,
    ) -> StorageResult<Buf32> {
        let mut inner = self.inner.lock();

        if let Some(tip) = inner.tip {
            let expected = tip + 1;
            if header.height != expected {
                return Err(StorageError::NonSequentialBlock {
                    expected,
                    got: header.height,
                });
            }
        }

        let checksum_root = compute_checksum_root(&writes);
        header.checksum_root = checksum_root;
        let height = header.height;

        inner.pending = true;

        for utxo in writes.utxo_add {
            inner.utxos.insert(utxo.outpoint, utxo);
        }

        for spend in &writes.utxo_spend {
            match inner.utxos.get_mut(&spend.outpoint) {
                Some(utxo) => utxo.spent_at_block = Some(spend.spent_at_block),
                None => {
                    return Err(StorageError::MissingUtxo(spend.outpoint.to_string(), height))
                }
            }
        }

        for (contract, slot, value) in writes.storage_set {
            inner
                .storage
                .insert((contract, slot.get(), height), value.get());
        }

        for record in writes.contract_deploy {
            inner.contracts.insert(record.tweaked_public_key, record);
        }

        for entry in writes.public_keys {
            inner.public_keys.insert(entry.tweaked_public_key, entry);
        }

        for link in writes.mldsa_links {
            inner.mldsa.insert(link.hashed_public_key, link);
        }

        for tx in writes.transactions {
            inner.transactions.insert((height, tx.index), tx);
        }

        for receipt in writes.receipts {
            inner.receipts.insert(receipt.txid, (height, receipt));
        }

        for submission in writes.epoch_submissions {
            // in-block duplicate: earlier tx wins, commit goes on
            let _ = inner.put_submission(height, submission);
        }

        inner.hash_index.insert(header.hash, height);
        inner.blocks.insert(height, header);
        inner.tip = Some(height);
        inner.pending = false;

        Ok(checksum_root)
    }

    async fn revert_until(&self, height: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();

        let gone: Vec<_> = inner.blocks.range(height..).map(|(h, _)| *h).collect();
        for h in gone {
            if let Some(header) = inner.blocks.remove(&h) {
                inner.hash_index.remove(&header.hash);
            }
        }

        inner.transactions.retain(|(h, _), _| *h < height);
        inner.receipts.retain(|_, (h, _)| *h < height);

        inner.utxos.retain(|_, u| u.created_at_block < height);
        for utxo in inner.utxos.values_mut() {
            if utxo.spent_at_block.is_some_and(|h| h >= height) {
                utxo.spent_at_block = None;
            }
        }

        inner.storage.retain(|(_, _, h), _| *h < height);
        inner
            .contracts
            .retain(|_, c| c.inserted_block_height < height);

        inner.mldsa.retain(|_, l| l.inserted_block_height < height);
        for link in inner.mldsa.values_mut() {
            if link.exposed_block_height.is_some_and(|h| h >= height) {
                link.exposed_block_height = None;
            }
        }

        inner.submissions.retain(|_, (h, _, _)| *h < height);
        inner.epochs.retain(|_, (seed, _)| *seed < height);

        if inner.tip.is_some_and(|tip| tip >= height) {
            inner.tip = height.checked_sub(1);
        }

        Ok(())
    }

    async fn get_latest_block(&self) -> StorageResult<Option<BlockHeader>> {
        let inner = self.inner.lock();
        Ok(inner.tip.and_then(|tip| inner.blocks.get(&tip).cloned()))
    }

    async fn get_block_header(&self, height: u64) -> StorageResult<Option<BlockHeader>> {
        Ok(self.inner.lock().blocks.get(&height).cloned())
    }

    async fn get_block_by_hash(&self, hash: Buf32) -> StorageResult<Option<BlockHeader>> {
        let inner = self.inner.lock();
        Ok(inner
            .hash_index
            .get(&hash)
            .and_then(|height| inner.blocks.get(height).cloned()))
    }

    async fn get_block_transactions(&self, height: u64) -> StorageResult<Vec<TxRecord>> {
        Ok(self
            .inner
            .lock()
            .transactions
            .range((height, 0)..=(height, u32::MAX))
            .map(|(_, tx)| tx.clone())
            .collect())
    }

    async fn get_receipt(&self, txid: Buf32) -> StorageResult<Option<TxReceipt>> {
        Ok(self
            .inner
            .lock()
            .receipts
            .get(&txid)
            .map(|(_, receipt)| receipt.clone()))
    }

    async fn get_contract(&self, address: Address32) -> StorageResult<Option<ContractRecord>> {
        Ok(self.inner.lock().contracts.get(&address).cloned())
    }

    async fn get_mldsa_link(&self, hashed_key: Buf32) -> StorageResult<Option<MldsaLink>> {
        Ok(self.inner.lock().mldsa.get(&hashed_key).cloned())
    }

    async fn get_epoch(&self, epoch_number: u64) -> StorageResult<Option<Epoch>> {
        let inner = self.inner.lock();
        Ok(inner.epochs.get(&epoch_number).map(|(_, epoch)| {
            let mut epoch = epoch.clone();
            epoch.best = inner.best_submission(epoch_number);
            epoch
        }))
    }

    async fn put_epoch(&self, seed_height: u64, epoch: Epoch) -> StorageResult<()> {
        self.inner
            .lock()
            .epochs
            .insert(epoch.epoch_number, (seed_height, epoch));
        Ok(())
    }

    async fn put_epoch_submission(
        &self,
        height: u64,
        submission: EpochSubmission,
    ) -> StorageResult<()> {
        self.inner.lock().put_submission(height, submission)
    }

    async fn get_best_submission(
        &self,
        epoch_number: u64,
    ) -> StorageResult<Option<EpochSubmission>> {
        Ok(self.inner.lock().best_submission(epoch_number))
    }

    async fn record_reorg(&self, record: ReorgRecord) -> StorageResult<()> {
        self.inner.lock().reorgs.push(record);
        Ok(())
    }

    async fn get_reorgs(&self) -> StorageResult<Vec<ReorgRecord>> {
        Ok(self.inner.lock().reorgs.clone())
    }

    async fn kill_all_pending_writes(&self) -> StorageResult<bool> {
        let mut inner = self.inner.lock();
        let pending = inner.pending;
        inner.pending = false;
        Ok(pending)
    }

    async fn purge_spent_older_than(&self, height: u64) -> StorageResult<u64> {
        let mut inner = self.inner.lock();
        let before = inner.utxos.len();
        inner
            .utxos
            .retain(|_, u| !u.spent_at_block.is_some_and(|h| h < height));
        Ok((before - inner.utxos.len()) as u64)
    }
}
