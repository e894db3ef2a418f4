//! Sled-backed implementation of the state store.
//!
//! One tree per collection (see [`crate::schema`]). A pending-writes marker
//! brackets every commit: if the process dies mid-batch the marker survives,
//! and startup recovery reverts the half-written block.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::{u256_from_be_bytes, Address32, Buf32, OutPointRef, U256};
use opnet_state::{
    compute_checksum_root, BlockHeader, BlockWrites, ContractRecord, Epoch, EpochSubmission,
    MldsaLink, ReorgRecord, TxReceipt, TxRecord, Unspent,
};
use sled::Tree;
use tracing::{debug, warn};

use crate::{
    schema::{
        height_key, reorg_key, storage_key, storage_prefix, submission_key, tx_key,
        utxo_address_key, utxo_address_prefix, META_PENDING_WRITES, META_TIP_HEIGHT, TREE_BLOCKS,
        TREE_BLOCK_HASHES, TREE_CONTRACTS, TREE_EPOCHS, TREE_META, TREE_MLDSA, TREE_PUBLIC_KEYS,
        TREE_RECEIPTS, TREE_REORGS, TREE_STORAGE, TREE_SUBMISSIONS, TREE_TRANSACTIONS,
        TREE_UTXOS, TREE_UTXO_ADDRESSES,
    },
    PreloadRequest, PreloadedStorage, StateStore, StorageError, StorageResult,
};

/// Outputs at or below this many sats are treated as inscription carriers.
const ORDINALS_DUST_LIMIT: u64 = 546;

#[derive(BorshSerialize, BorshDeserialize)]
struct ReceiptRow {
    height: u64,
    receipt: TxReceipt,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct SubmissionRow {
    height: u64,
    /// Monotonic insertion id; breaks difficulty ties first-come.
    seq: u64,
    submission: EpochSubmission,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct EpochRow {
    seed_height: u64,
    epoch: Epoch,
}

fn enc<T: BorshSerialize>(value: &T) -> StorageResult<Vec<u8>> {
    borsh::to_vec(value).map_err(StorageError::from)
}

fn dec<T: BorshDeserialize>(raw: &[u8]) -> StorageResult<T> {
    borsh::from_slice(raw).map_err(StorageError::from)
}

struct SledInner {
    db: sled::Db,
    blocks: Tree,
    block_hashes: Tree,
    transactions: Tree,
    receipts: Tree,
    utxos: Tree,
    utxo_addresses: Tree,
    storage: Tree,
    contracts: Tree,
    public_keys: Tree,
    mldsa: Tree,
    epochs: Tree,
    submissions: Tree,
    reorgs: Tree,
    meta: Tree,
}

/// On-disk state store.
#[derive(Clone)]
pub struct SledStateStore {
    inner: Arc<SledInner>,
}

impl std::fmt::Debug for SledStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStateStore").finish_non_exhaustive()
    }
}

impl SledStateStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let db = sled::open(path)?;
        let inner = SledInner {
            blocks: db.open_tree(TREE_BLOCKS)?,
            block_hashes: db.open_tree(TREE_BLOCK_HASHES)?,
            transactions: db.open_tree(TREE_TRANSACTIONS)?,
            receipts: db.open_tree(TREE_RECEIPTS)?,
            utxos: db.open_tree(TREE_UTXOS)?,
            utxo_addresses: db.open_tree(TREE_UTXO_ADDRESSES)?,
            storage: db.open_tree(TREE_STORAGE)?,
            contracts: db.open_tree(TREE_CONTRACTS)?,
            public_keys: db.open_tree(TREE_PUBLIC_KEYS)?,
            mldsa: db.open_tree(TREE_MLDSA)?,
            epochs: db.open_tree(TREE_EPOCHS)?,
            submissions: db.open_tree(TREE_SUBMISSIONS)?,
            reorgs: db.open_tree(TREE_REORGS)?,
            meta: db.open_tree(TREE_META)?,
            db,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SledInner) -> StorageResult<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StorageError::database(format!("blocking task: {e}")))?
    }
}

impl SledInner {
    fn tip_height(&self) -> StorageResult<Option<u64>> {
        Ok(self
            .meta
            .get(META_TIP_HEIGHT)?
            .map(|raw| u64::from_be_bytes(raw.as_ref().try_into().unwrap_or_default())))
    }

    fn get_utxo(&self, outpoint: &OutPointRef) -> StorageResult<Option<Unspent>> {
        self.utxos
            .get(outpoint.to_key_bytes())?
            .map(|raw| dec(&raw))
            .transpose()
    }

    fn live_utxos_of(&self, address: &str) -> StorageResult<Vec<Unspent>> {
        let mut out = Vec::new();
        for item in self.utxo_addresses.scan_prefix(utxo_address_prefix(address)) {
            let (key, _) = item?;
            let op_bytes: [u8; 34] = key[key.len() - 34..]
                .try_into()
                .map_err(|_| StorageError::Codec("bad address index key".into()))?;
            let outpoint = OutPointRef::from_key_bytes(&op_bytes);
            if let Some(utxo) = self.get_utxo(&outpoint)? {
                if utxo.is_live() {
                    out.push(utxo);
                }
            }
        }
        Ok(out)
    }

    fn get_storage(&self, contract: &Address32, slot: &U256) -> StorageResult<Option<U256>> {
        let prefix = storage_prefix(contract, slot);
        let mut newest = None;
        for item in self.storage.scan_prefix(prefix) {
            let (_, value) = item?;
            newest = Some(value);
        }
        newest
            .map(|raw| {
                let bytes: [u8; 32] = raw
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::Codec("bad storage value width".into()))?;
                Ok(u256_from_be_bytes(bytes))
            })
            .transpose()
    }

    fn commit_block(&self, mut header: BlockHeader, writes: BlockWrites) -> StorageResult<Buf32> {
        if let Some(tip) = self.tip_height()? {
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

        self.meta.insert(META_PENDING_WRITES, &[1u8][..])?;
        self.db.flush()?;

        // creates land before spends: a block may spend outputs it created
        for utxo in &writes.utxo_add {
            self.utxos.insert(utxo.outpoint.to_key_bytes(), enc(utxo)?)?;
            if let Some(address) = &utxo.script_pubkey.address {
                self.utxo_addresses
                    .insert(utxo_address_key(address, &utxo.outpoint), &[] as &[u8])?;
            }
        }

        for spend in &writes.utxo_spend {
            let key = spend.outpoint.to_key_bytes();
            let Some(raw) = self.utxos.get(key)? else {
                return Err(StorageError::MissingUtxo(
                    spend.outpoint.to_string(),
                    height,
                ));
            };
            let mut utxo: Unspent = dec(&raw)?;
            // upsert keyed on the outpoint: re-seeing a spend never creates
            // a second row
            utxo.spent_at_block = Some(spend.spent_at_block);
            self.utxos.insert(key, enc(&utxo)?)?;
        }

        for (contract, slot, value) in &writes.storage_set {
            self.storage.insert(
                storage_key(contract, &slot.get(), height),
                &value.get().to_be_bytes()[..],
            )?;
        }

        for record in &writes.contract_deploy {
            self.contracts
                .insert(record.tweaked_public_key.as_bytes(), enc(record)?)?;
        }

        for entry in &writes.public_keys {
            self.public_keys
                .insert(entry.tweaked_public_key.as_bytes(), enc(entry)?)?;
        }

        for link in &writes.mldsa_links {
            self.mldsa
                .insert(link.hashed_public_key.as_bytes(), enc(link)?)?;
        }

        for tx in &writes.transactions {
            self.transactions.insert(tx_key(height, tx.index), enc(tx)?)?;
        }

        for receipt in &writes.receipts {
            let row = ReceiptRow {
                height,
                receipt: receipt.clone(),
            };
            self.receipts.insert(receipt.txid.as_bytes(), enc(&row)?)?;
        }

        for submission in &writes.epoch_submissions {
            // an in-block duplicate loses to the earlier tx; not a commit
            // failure
            match self.put_submission(height, submission) {
                Ok(()) => {}
                Err(StorageError::DuplicateSubmission) => {
                    debug!(epoch = submission.epoch_number, "dropping duplicate submission");
                }
                Err(e) => return Err(e),
            }
        }

        self.blocks.insert(height_key(height), enc(&header)?)?;
        self.block_hashes
            .insert(header.hash.as_bytes(), &height_key(height)[..])?;
        self.meta.insert(META_TIP_HEIGHT, &height_key(height)[..])?;

        self.meta.remove(META_PENDING_WRITES)?;
        self.db.flush()?;

        Ok(checksum_root)
    }

    fn put_submission(&self, height: u64, submission: &EpochSubmission) -> StorageResult<()> {
        let key = submission_key(
            submission.epoch_number,
            &submission.salt,
            &submission.mldsa_public_key,
        );
        if self.submissions.get(key)?.is_some() {
            return Err(StorageError::DuplicateSubmission);
        }
        let row = SubmissionRow {
            height,
            seq: self.db.generate_id()?,
            submission: submission.clone(),
        };
        self.submissions.insert(key, enc(&row)?)?;
        Ok(())
    }

    fn get_best_submission(&self, epoch_number: u64) -> StorageResult<Option<EpochSubmission>> {
        let mut best: Option<SubmissionRow> = None;
        for item in self.submissions.scan_prefix(epoch_number.to_be_bytes()) {
            let (_, raw) = item?;
            let row: SubmissionRow = dec(&raw)?;
            let better = match &best {
                None => true,
                Some(current) => {
                    row.submission.difficulty > current.submission.difficulty
                        || (row.submission.difficulty == current.submission.difficulty
                            && row.seq < current.seq)
                }
            };
            if better {
                best = Some(row);
            }
        }
        Ok(best.map(|row| row.submission))
    }

    fn revert_until(&self, height: u64) -> StorageResult<()> {
        // headers and the hash index
        let block_keys: Vec<_> = self
            .blocks
            .range(height_key(height).to_vec()..)
            .collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in block_keys {
            let header: BlockHeader = dec(&raw)?;
            self.block_hashes.remove(header.hash.as_bytes())?;
            self.blocks.remove(key)?;
        }

        let tx_keys: Vec<_> = self
            .transactions
            .range(tx_key(height, 0).to_vec()..)
            .keys()
            .collect::<Result<Vec<_>, _>>()?;
        for key in tx_keys {
            self.transactions.remove(key)?;
        }

        let receipt_rows: Vec<_> = self.receipts.iter().collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in receipt_rows {
            let row: ReceiptRow = dec(&raw)?;
            if row.height >= height {
                self.receipts.remove(key)?;
            }
        }

        let utxo_rows: Vec<_> = self.utxos.iter().collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in utxo_rows {
            let mut utxo: Unspent = dec(&raw)?;
            if utxo.created_at_block >= height {
                if let Some(address) = &utxo.script_pubkey.address {
                    self.utxo_addresses
                        .remove(utxo_address_key(address, &utxo.outpoint))?;
                }
                self.utxos.remove(key)?;
            } else if utxo.spent_at_block.is_some_and(|h| h >= height) {
                // the spending block is gone: the output is live again
                utxo.spent_at_block = None;
                self.utxos.insert(key, enc(&utxo)?)?;
            }
        }

        let storage_keys: Vec<_> = self.storage.iter().keys().collect::<Result<Vec<_>, _>>()?;
        for key in storage_keys {
            let written_at = u64::from_be_bytes(
                key[64..]
                    .try_into()
                    .map_err(|_| StorageError::Codec("bad storage key width".into()))?,
            );
            if written_at >= height {
                self.storage.remove(key)?;
            }
        }

        let contract_rows: Vec<_> = self.contracts.iter().collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in contract_rows {
            let record: ContractRecord = dec(&raw)?;
            if record.inserted_block_height >= height {
                self.contracts.remove(key)?;
            }
        }

        let mldsa_rows: Vec<_> = self.mldsa.iter().collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in mldsa_rows {
            let mut link: MldsaLink = dec(&raw)?;
            if link.inserted_block_height >= height {
                self.mldsa.remove(key)?;
            } else if link.exposed_block_height.is_some_and(|h| h >= height) {
                link.exposed_block_height = None;
                self.mldsa.insert(key, enc(&link)?)?;
            }
        }

        let submission_rows: Vec<_> = self.submissions.iter().collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in submission_rows {
            let row: SubmissionRow = dec(&raw)?;
            if row.height >= height {
                self.submissions.remove(key)?;
            }
        }

        let epoch_rows: Vec<_> = self.epochs.iter().collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in epoch_rows {
            let row: EpochRow = dec(&raw)?;
            if row.seed_height >= height {
                self.epochs.remove(key)?;
            }
        }

        if let Some(tip) = self.tip_height()? {
            if tip >= height {
                if height == 0 {
                    self.meta.remove(META_TIP_HEIGHT)?;
                } else {
                    self.meta
                        .insert(META_TIP_HEIGHT, &height_key(height - 1)[..])?;
                }
            }
        }

        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn get_utxo(&self, outpoint: OutPointRef) -> StorageResult<Option<Unspent>> {
        self.blocking(move |inner| inner.get_utxo(&outpoint)).await
    }

    async fn get_balance_of(&self, address: &str, filter_ordinals: bool) -> StorageResult<u64> {
        let address = address.to_owned();
        self.blocking(move |inner| {
            let utxos = inner.live_utxos_of(&address)?;
            Ok(utxos
                .iter()
                .filter(|u| !filter_ordinals || u.value > ORDINALS_DUST_LIMIT)
                .map(|u| u.value)
                .sum())
        })
        .await
    }

    async fn get_utxos_of(&self, address: &str) -> StorageResult<Vec<Unspent>> {
        let address = address.to_owned();
        self.blocking(move |inner| inner.live_utxos_of(&address)).await
    }

    async fn get_storage(&self, contract: Address32, slot: U256) -> StorageResult<Option<U256>> {
        self.blocking(move |inner| inner.get_storage(&contract, &slot))
            .await
    }

    async fn preload_storage(&self, request: PreloadRequest) -> StorageResult<PreloadedStorage> {
        self.blocking(move |inner| {
            let mut out = PreloadedStorage::new();
            for (contract, slots) in request {
                let entry = out.entry(contract).or_default();
                for slot in slots {
                    entry.insert(slot, inner.get_storage(&contract, &slot)?);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn commit_block(
        &self,
        header: BlockHeader,
        writes: BlockWrites,
    ) -> StorageResult<Buf32> {
        self.blocking(move |inner| inner.commit_block(header, writes))
            .await
    }

    async fn revert_until(&self, height: u64) -> StorageResult<()> {
        self.blocking(move |inner| inner.revert_until(height)).await
    }

    async fn get_latest_block(&self) -> StorageResult<Option<BlockHeader>> {
        self.blocking(|inner| {
            let Some(tip) = inner.tip_height()? else {
                return Ok(None);
            };
            inner
                .blocks
                .get(height_key(tip))?
                .map(|raw| dec(&raw))
                .transpose()
        })
        .await
    }

    async fn get_block_header(&self, height: u64) -> StorageResult<Option<BlockHeader>> {
        self.blocking(move |inner| {
            inner
                .blocks
                .get(height_key(height))?
                .map(|raw| dec(&raw))
                .transpose()
        })
        .await
    }

    async fn get_block_by_hash(&self, hash: Buf32) -> StorageResult<Option<BlockHeader>> {
        self.blocking(move |inner| {
            let Some(raw_height) = inner.block_hashes.get(hash.as_bytes())? else {
                return Ok(None);
            };
            let height = u64::from_be_bytes(
                raw_height
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::Codec("bad hash index entry".into()))?,
            );
            inner
                .blocks
                .get(height_key(height))?
                .map(|raw| dec(&raw))
                .transpose()
        })
        .await
    }

    async fn get_block_transactions(&self, height: u64) -> StorageResult<Vec<TxRecord>> {
        self.blocking(move |inner| {
            let mut out = Vec::new();
            for item in inner.transactions.scan_prefix(height_key(height)) {
                let (_, raw) = item?;
                out.push(dec(&raw)?);
            }
            Ok(out)
        })
        .await
    }

    async fn get_receipt(&self, txid: Buf32) -> StorageResult<Option<TxReceipt>> {
        self.blocking(move |inner| {
            inner
                .receipts
                .get(txid.as_bytes())?
                .map(|raw| dec::<ReceiptRow>(&raw).map(|row| row.receipt))
                .transpose()
        })
        .await
    }

    async fn get_contract(&self, address: Address32) -> StorageResult<Option<ContractRecord>> {
        self.blocking(move |inner| {
            inner
                .contracts
                .get(address.as_bytes())?
                .map(|raw| dec(&raw))
                .transpose()
        })
        .await
    }

    async fn get_mldsa_link(&self, hashed_key: Buf32) -> StorageResult<Option<MldsaLink>> {
        self.blocking(move |inner| {
            inner
                .mldsa
                .get(hashed_key.as_bytes())?
                .map(|raw| dec(&raw))
                .transpose()
        })
        .await
    }

    async fn get_epoch(&self, epoch_number: u64) -> StorageResult<Option<Epoch>> {
        self.blocking(move |inner| {
            let Some(raw) = inner.epochs.get(height_key(epoch_number))? else {
                return Ok(None);
            };
            let row: EpochRow = dec(&raw)?;
            let mut epoch = row.epoch;
            epoch.best = inner.get_best_submission(epoch_number)?;
            Ok(Some(epoch))
        })
        .await
    }

    async fn put_epoch(&self, seed_height: u64, epoch: Epoch) -> StorageResult<()> {
        self.blocking(move |inner| {
            let key = height_key(epoch.epoch_number);
            let row = EpochRow { seed_height, epoch };
            inner.epochs.insert(key, enc(&row)?)?;
            Ok(())
        })
        .await
    }

    async fn put_epoch_submission(
        &self,
        height: u64,
        submission: EpochSubmission,
    ) -> StorageResult<()> {
        self.blocking(move |inner| inner.put_submission(height, &submission))
            .await
    }

    async fn get_best_submission(
        &self,
        epoch_number: u64,
    ) -> StorageResult<Option<EpochSubmission>> {
        self.blocking(move |inner| inner.get_best_submission(epoch_number))
            .await
    }

    async fn record_reorg(&self, record: ReorgRecord) -> StorageResult<()> {
        self.blocking(move |inner| {
            inner.reorgs.insert(
                reorg_key(record.from_block, record.to_block),
                enc(&record)?,
            )?;
            Ok(())
        })
        .await
    }

    async fn get_reorgs(&self) -> StorageResult<Vec<ReorgRecord>> {
        self.blocking(|inner| {
            let mut out = Vec::new();
            for item in inner.reorgs.iter() {
                let (_, raw) = item?;
                out.push(dec(&raw)?);
            }
            Ok(out)
        })
        .await
    }

    async fn kill_all_pending_writes(&self) -> StorageResult<bool> {
        self.blocking(|inner| {
            let pending = inner.meta.remove(META_PENDING_WRITES)?.is_some();
            if pending {
                warn!("found pending writes from an interrupted commit");
                inner.db.flush()?;
            }
            Ok(pending)
        })
        .await
    }

    async fn purge_spent_older_than(&self, height: u64) -> StorageResult<u64> {
        self.blocking(move |inner| {
            let mut purged = 0u64;
            let rows: Vec<_> = inner.utxos.iter().collect::<Result<Vec<_>, _>>()?;
            for (key, raw) in rows {
                let utxo: Unspent = dec(&raw)?;
                if utxo.spent_at_block.is_some_and(|h| h < height) {
                    if let Some(address) = &utxo.script_pubkey.address {
                        inner
                            .utxo_addresses
                            .remove(utxo_address_key(address, &utxo.outpoint))?;
                    }
                    inner.utxos.remove(key)?;
                    purged += 1;
                }
            }
            Ok(purged)
        })
        .await
    }
}
