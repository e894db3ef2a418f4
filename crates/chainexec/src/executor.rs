use std::{collections::BTreeMap, rc::Rc, sync::Arc};

use bitcoin::Network;
use opnet_db::{PreloadRequest, StateStore};
use opnet_epoch::{derive_epoch_target, matching_bits, solution_candidate, verify_mldsa, verify_schnorr};
use opnet_l1tx::{ClassifiedTx, EpochSubmissionFeature, SharedInteractionParameters, TxKind};
use opnet_params::ConsensusParams;
use opnet_primitives::{Address32, Buf32, OutPointRef, Uint256, U256};
use opnet_state::{
    derive_contract_addresses, BlockHeader, BlockWrites, ContractRecord, EpochSubmission,
    MldsaLink, SpentRef, TxKindTag, TxReceipt, TxRecord, Unspent,
};
use opnet_vm::{ContractRuntime, ExecutionRequest, StateAccess};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{sorter::sort_transactions, ExecError};

const OP_RETURN: u8 = 0x6a;
/// EMA smoothing window, in blocks.
const EMA_WINDOW: u64 = 8;

/// A fully executed block, ready for `commit_block`.
#[derive(Debug, Clone)]
pub struct ExecutedBlock {
    pub header: BlockHeader,
    pub writes: BlockWrites,
}

/// Sync state view handed to the VM: bytecode and preloads are fetched
/// up-front, so execution itself never touches the store.
struct BlockStateView {
    bytecodes: BTreeMap<Address32, Vec<u8>>,
    /// Storage written earlier in this block; non-strict fallback reads it.
    overlay: BTreeMap<(Address32, U256), U256>,
}

impl StateAccess for BlockStateView {
    fn storage_fallback(&self, contract: &Address32, slot: &U256) -> Option<U256> {
        self.overlay.get(&(*contract, *slot)).copied()
    }

    fn bytecode_of(&self, contract: &Address32) -> Option<Vec<u8>> {
        self.bytecodes.get(contract).cloned()
    }
}

/// Executes sorted transactions against the store and produces the block's
/// write batch.
pub struct BlockExecutor {
    store: Arc<dyn StateStore>,
    runtime: ContractRuntime,
    params: ConsensusParams,
    network: Network,
}

impl std::fmt::Debug for BlockExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockExecutor").finish_non_exhaustive()
    }
}

impl BlockExecutor {
    pub fn new(store: Arc<dyn StateStore>, params: ConsensusParams, network: Network) -> Self {
        let runtime = ContractRuntime::new(params.clone(), network);
        Self {
            store,
            runtime,
            params,
            network,
        }
    }

    /// Sorts and executes one block's transactions.
    ///
    /// `prev_header` is the committed parent; `None` only for the first
    /// indexed block.
    pub async fn execute_block(
        &self,
        height: u64,
        block_hash: Buf32,
        prev_hash: Buf32,
        merkle_root: Buf32,
        txs: Vec<ClassifiedTx>,
        prev_header: Option<&BlockHeader>,
    ) -> Result<ExecutedBlock, ExecError> {
        if let Some(prev) = prev_header {
            if prev.height + 1 != height {
                return Err(ExecError::NotOnTip {
                    tip: prev.height,
                    got: height,
                });
            }
        }

        let sorted = sort_transactions(txs);
        let n_tx = sorted.len() as u32;

        let mut writes = BlockWrites::new();
        let mut deployed_in_block: BTreeMap<Address32, ContractRecord> = BTreeMap::new();
        let mut submissions: Vec<(Buf32, EpochSubmissionFeature, Buf32)> = Vec::new();
        let mut gas_total: u64 = 0;

        for (index, tx) in sorted.iter().enumerate() {
            let index = index as u32;

            for input in &tx.inputs {
                if !input.coinbase {
                    writes.utxo_spend.push(SpentRef {
                        outpoint: input.outpoint,
                        spent_at_block: height,
                    });
                }
            }

            for output in &tx.outputs {
                // burned outputs never enter the UTXO set
                if output.script_pubkey.hex.first() == Some(&OP_RETURN) {
                    continue;
                }
                writes.utxo_add.push(Unspent {
                    outpoint: OutPointRef::new(tx.txid, output.index),
                    value: output.value,
                    script_pubkey: output.script_pubkey.clone(),
                    created_at_block: height,
                    spent_at_block: None,
                });
            }

            writes.public_keys.extend(tx.public_keys.iter().cloned());

            let gas_sat_fee = tx.kind.shared().map(|s| s.gas_sat_fee).unwrap_or(0);
            let compromised = matches!(tx.kind, TxKind::Generic { compromised: true });
            writes.transactions.push(TxRecord {
                txid: tx.txid,
                index,
                kind: tx.kind.tag(),
                compromised,
                inputs: tx.inputs.clone(),
                outputs: tx.outputs.clone(),
                burned_fee: tx.burned_fee,
                gas_sat_fee,
            });

            match &tx.kind {
                TxKind::Generic { .. } => {}
                TxKind::Deployment {
                    shared,
                    salt,
                    bytecode,
                    bytecode_hash,
                } => {
                    let receipt = self.apply_deployment(
                        tx.txid,
                        index,
                        height,
                        shared,
                        *salt,
                        bytecode,
                        *bytecode_hash,
                        &mut writes,
                        &mut deployed_in_block,
                    );
                    gas_total += receipt.gas_used.get().as_u64();
                    writes.receipts.push(receipt);
                    self.collect_carrier_features(height, shared, &mut writes, &mut submissions);
                }
                TxKind::Interaction {
                    shared,
                    target,
                    calldata,
                } => {
                    let receipt = if target.is_zero() {
                        // carrier-only interaction: no contract call
                        TxReceipt {
                            txid: tx.txid,
                            index,
                            kind: TxKindTag::Interaction,
                            gas_used: Uint256::from(self.params.base_gas),
                            reverted: None,
                            events: Vec::new(),
                        }
                    } else {
                        self.execute_interaction(
                            tx.txid,
                            index,
                            height,
                            tx,
                            shared,
                            *target,
                            calldata,
                            &mut writes,
                            &mut deployed_in_block,
                        )
                        .await?
                    };
                    gas_total += receipt.gas_used.get().as_u64();
                    writes.receipts.push(receipt);
                    self.collect_carrier_features(height, shared, &mut writes, &mut submissions);
                }
            }
        }

        self.validate_block_submissions(height, submissions, &mut writes)
            .await?;

        let gas_used = Uint256::from(gas_total);
        let ema = match prev_header {
            Some(prev) => Uint256::new(
                (prev.ema.get() * U256::from(EMA_WINDOW - 1) + gas_used.get())
                    / U256::from(EMA_WINDOW),
            ),
            None => Uint256::from(self.params.base_gas),
        };

        let header = BlockHeader {
            height,
            hash: block_hash,
            prev_hash,
            merkle_root,
            receipt_root: fold_root(&writes.receipts),
            storage_root: fold_root(&writes.storage_set),
            // the store stamps the real value during commit
            checksum_root: Buf32::zero(),
            gas_used,
            base_gas: Uint256::from(self.params.base_gas),
            ema,
            n_tx,
        };

        Ok(ExecutedBlock { header, writes })
    }

    #[expect(clippy::too_many_arguments, reason = "per-tx bookkeeping is wide")]
    fn apply_deployment(
        &self,
        txid: Buf32,
        index: u32,
        height: u64,
        shared: &SharedInteractionParameters,
        salt: Buf32,
        bytecode: &[u8],
        bytecode_hash: Buf32,
        writes: &mut BlockWrites,
        deployed_in_block: &mut BTreeMap<Address32, ContractRecord>,
    ) -> TxReceipt {
        let gas_used = Uint256::from(self.params.base_gas);
        match derive_contract_addresses(
            &shared.from_public_key,
            &bytecode_hash,
            &salt,
            self.network,
        ) {
            Ok((virtual_address, tweaked_public_key, p2tr_address)) => {
                let record = ContractRecord {
                    tweaked_public_key,
                    virtual_address,
                    deployer_public_key: shared.from_public_key,
                    bytecode: bytecode.to_vec(),
                    bytecode_hash,
                    p2tr_address,
                    inserted_block_height: height,
                };
                debug!(contract = %tweaked_public_key, %height, "contract deployed");
                deployed_in_block.insert(tweaked_public_key, record.clone());
                writes.contract_deploy.push(record);
                TxReceipt {
                    txid,
                    index,
                    kind: TxKindTag::Deployment,
                    gas_used,
                    reverted: None,
                    events: Vec::new(),
                }
            }
            Err(e) => TxReceipt {
                txid,
                index,
                kind: TxKindTag::Deployment,
                gas_used,
                reverted: Some(e.to_string().into_bytes()),
                events: Vec::new(),
            },
        }
    }

    #[expect(clippy::too_many_arguments, reason = "per-tx bookkeeping is wide")]
    async fn execute_interaction(
        &self,
        txid: Buf32,
        index: u32,
        height: u64,
        tx: &ClassifiedTx,
        shared: &SharedInteractionParameters,
        target: Address32,
        calldata: &[u8],
        writes: &mut BlockWrites,
        deployed_in_block: &mut BTreeMap<Address32, ContractRecord>,
    ) -> Result<TxReceipt, ExecError> {
        // batched read of the declared access list
        let request: PreloadRequest = shared
            .access_list
            .iter()
            .map(|(contract, slots)| (*contract, slots.iter().copied().collect()))
            .collect();
        let mut preloaded = self.store.preload_storage(request).await?;

        // this block's earlier writes shadow committed values
        for (contract, slot, value) in &writes.storage_set {
            if let Some(slots) = preloaded.get_mut(contract) {
                if slots.contains_key(&slot.get()) {
                    slots.insert(slot.get(), Some(value.get()));
                }
            }
        }

        let mut bytecodes = BTreeMap::new();
        let mut wanted: Vec<Address32> = vec![target];
        wanted.extend(shared.access_list.contracts().copied());
        for address in wanted {
            if bytecodes.contains_key(&address) {
                continue;
            }
            if let Some(record) = deployed_in_block.get(&address) {
                bytecodes.insert(address, record.bytecode.clone());
            } else if let Some(record) = self.store.get_contract(address).await? {
                bytecodes.insert(address, record.bytecode);
            }
        }

        let overlay = writes
            .storage_set
            .iter()
            .map(|(c, s, v)| ((*c, s.get()), v.get()))
            .collect();

        let max_gas = self
            .params
            .base_gas
            .saturating_add(shared.gas_sat_fee.saturating_mul(self.params.gas_per_sat))
            .min(self.params.max_tx_gas);

        let request = ExecutionRequest {
            contract: target,
            calldata: calldata.to_vec(),
            max_gas,
            preloaded,
            tx_inputs: tx.inputs.clone(),
            tx_outputs: tx.outputs.clone(),
            block_height: height,
        };

        // the VM section is fully synchronous; nothing non-Send crosses an
        // await
        let outcome = {
            let view = Rc::new(BlockStateView {
                bytecodes,
                overlay,
            });
            self.runtime.execute(request, view)
        };

        let receipt = if outcome.is_success() {
            writes.merge_storage(&outcome.modified_storage);
            for record in outcome.deployments {
                deployed_in_block.insert(record.tweaked_public_key, record.clone());
                writes.contract_deploy.push(record);
            }
            TxReceipt {
                txid,
                index,
                kind: TxKindTag::Interaction,
                gas_used: Uint256::from(outcome.gas_used),
                reverted: None,
                events: outcome.events,
            }
        } else {
            let payload = if outcome.data.is_empty() {
                outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string().into_bytes())
                    .unwrap_or_default()
            } else {
                outcome.data
            };
            debug!(%txid, error = ?outcome.error, "interaction reverted");
            TxReceipt {
                txid,
                index,
                kind: TxKindTag::Interaction,
                gas_used: Uint256::from(outcome.gas_used),
                reverted: Some(payload),
                events: Vec::new(),
            }
        };

        Ok(receipt)
    }

    /// Records carrier features of an envelope: ML-DSA link requests and
    /// epoch submissions ride along regardless of the call outcome.
    fn collect_carrier_features(
        &self,
        height: u64,
        shared: &SharedInteractionParameters,
        writes: &mut BlockWrites,
        submissions: &mut Vec<(Buf32, EpochSubmissionFeature, Buf32)>,
    ) {
        if let Some(link) = process_mldsa_link(shared, height) {
            writes.mldsa_links.push(link);
        }
        if let Some(submission) = &shared.epoch_submission {
            submissions.push((
                shared.challenge_preimage,
                submission.clone(),
                shared.from_public_key,
            ));
        }
    }

    /// Validates block-carried epoch submissions against the open epoch.
    ///
    /// Witness signatures already authorize on-chain submissions; what is
    /// checked here is the epoch window, the claimed target and the
    /// difficulty floor.
    async fn validate_block_submissions(
        &self,
        height: u64,
        submissions: Vec<(Buf32, EpochSubmissionFeature, Buf32)>,
        writes: &mut BlockWrites,
    ) -> Result<(), ExecError> {
        if submissions.is_empty() {
            return Ok(());
        }

        let open_epoch = self.params.next_epoch_number(height);
        let Some(seed_height) = self.params.epoch_target_height(open_epoch) else {
            return Ok(());
        };
        if seed_height >= height {
            // the seed block is this block or later: no finalized target yet
            return Ok(());
        }
        let Some(seed_header) = self.store.get_block_header(seed_height).await? else {
            warn!(%seed_height, "seed block for open epoch missing, dropping submissions");
            return Ok(());
        };

        let target = derive_epoch_target(open_epoch, seed_header.checksum_root);
        for (claimed_target_hash, feature, legacy_public_key) in submissions {
            if claimed_target_hash != target.target_hash {
                debug!(epoch = open_epoch, "submission claims a stale target");
                continue;
            }
            let candidate =
                solution_candidate(&target.target, &feature.mldsa_public_key, &feature.salt);
            let difficulty = matching_bits(&candidate, &target.target_digest());
            if difficulty < self.params.min_difficulty {
                debug!(
                    epoch = open_epoch,
                    difficulty, "submission below difficulty floor"
                );
                continue;
            }
            writes.epoch_submissions.push(EpochSubmission {
                epoch_number: open_epoch,
                salt: feature.salt,
                mldsa_public_key: feature.mldsa_public_key,
                graffiti: feature.graffiti.clone(),
                difficulty,
                legacy_public_key,
            });
        }

        Ok(())
    }
}

/// Signed payload of a link request: `level ∥ hashed_pk ∥ pk?`.
fn link_signing_message(link: &opnet_l1tx::MldsaLinkFeature) -> Vec<u8> {
    let mut msg = vec![link.level.to_byte()];
    msg.extend_from_slice(link.hashed_public_key.as_bytes());
    if let Some(pk) = &link.public_key {
        msg.extend_from_slice(pk);
    }
    msg
}

/// Verifies a link request and produces the directory row.
///
/// The Schnorr signature is always checked; the ML-DSA signature only when
/// the request exposes the full key. Any failure drops the link, never the
/// transaction.
fn process_mldsa_link(shared: &SharedInteractionParameters, height: u64) -> Option<MldsaLink> {
    let link = shared.mldsa_link.as_ref()?;
    let message = link_signing_message(link);

    if let Err(e) = verify_schnorr(
        &message,
        &link.legacy_schnorr_signature,
        &shared.from_public_key,
    ) {
        debug!(error = %e, "link request rejected: bad schnorr signature");
        return None;
    }

    let (public_key, exposed) = if link.verify_request {
        let pk = link.public_key.as_ref()?;
        let hashed: [u8; 32] = Sha256::digest(pk).into();
        if hashed != *link.hashed_public_key.as_bytes() {
            debug!("link request rejected: key does not match its hash");
            return None;
        }
        if let Err(e) = verify_mldsa(link.level, pk, &message, link.mldsa_signature.as_ref()?) {
            debug!(error = %e, "link request rejected: bad ML-DSA signature");
            return None;
        }
        (Some(pk.clone()), Some(height))
    } else {
        (None, None)
    };

    Some(MldsaLink {
        hashed_public_key: link.hashed_public_key,
        legacy_public_key: shared.from_public_key,
        public_key,
        level: link.level,
        inserted_block_height: height,
        exposed_block_height: exposed,
    })
}

/// Order-sensitive digest of a borsh-encodable sequence.
fn fold_root<T: borsh::BorshSerialize>(items: &[T]) -> Buf32 {
    let mut hasher = Sha256::new();
    for item in items {
        let bytes = borsh::to_vec(item).expect("in-memory serialization");
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    Buf32::new(hasher.finalize().into())
}
