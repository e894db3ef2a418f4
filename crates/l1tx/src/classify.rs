use bitcoin::{hashes::Hash as _, Address, Network, Transaction};
use opnet_params::ConsensusParams;
use opnet_primitives::{Address32, Buf32, OutPointRef};
use opnet_state::{PublicKeyDirectoryEntry, ScriptInfo, TxInputInfo, TxKindTag, TxOutputInfo};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    envelope::extract_envelope,
    features::{
        AccessList, CalldataFeature, DeployFeature, EpochSubmissionFeature, MldsaLinkFeature,
        ParsedFeatures,
    },
    fees::burned_output_value,
    pubkeys::scan_public_keys,
    L1TxError,
};

/// Block-level inputs the classifier needs.
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub network: Network,
    pub height: u64,
    pub block_hash: Buf32,
}

/// Envelope-derived parameters shared by interactions and deployments.
#[derive(Debug, Clone)]
pub struct SharedInteractionParameters {
    /// X-only internal key of the revealing input; the sender.
    pub from_public_key: Buf32,
    pub miner_mldsa_hashed_pubkey: Buf32,
    pub challenge_preimage: Buf32,
    pub access_list: AccessList,
    pub epoch_submission: Option<EpochSubmissionFeature>,
    pub mldsa_link: Option<MldsaLinkFeature>,
    /// Fee share pricing this execution's gas, in sats.
    pub gas_sat_fee: u64,
    pub was_compressed: bool,
}

/// Outcome of classification.
#[derive(Debug, Clone)]
pub enum TxKind {
    Generic {
        /// Set when an envelope was present but malformed.
        compromised: bool,
    },
    Interaction {
        shared: SharedInteractionParameters,
        target: Address32,
        calldata: Vec<u8>,
    },
    Deployment {
        shared: SharedInteractionParameters,
        salt: Buf32,
        bytecode: Vec<u8>,
        bytecode_hash: Buf32,
    },
}

impl TxKind {
    pub fn tag(&self) -> TxKindTag {
        match self {
            TxKind::Generic { .. } => TxKindTag::Generic,
            TxKind::Interaction { .. } => TxKindTag::Interaction,
            TxKind::Deployment { .. } => TxKindTag::Deployment,
        }
    }

    pub fn shared(&self) -> Option<&SharedInteractionParameters> {
        match self {
            TxKind::Generic { .. } => None,
            TxKind::Interaction { shared, .. } => Some(shared),
            TxKind::Deployment { shared, .. } => Some(shared),
        }
    }
}

/// A transaction after classification, ready for the sorter and executor.
#[derive(Debug, Clone)]
pub struct ClassifiedTx {
    pub txid: Buf32,
    pub kind: TxKind,
    pub inputs: Vec<TxInputInfo>,
    pub outputs: Vec<TxOutputInfo>,
    pub burned_fee: u64,
    /// Sorter tie-break hash: `sha256(txid ∥ block hash)`.
    pub computed_indexing_hash: Buf32,
    pub is_coinbase: bool,
    pub public_keys: Vec<PublicKeyDirectoryEntry>,
}

/// Classifies one raw transaction of a block.
///
/// Never fails: envelope errors degrade the transaction to generic with the
/// `compromised` marker set, per consensus rules.
pub fn classify_transaction(
    tx: &Transaction,
    ctx: &BlockContext,
    params: &ConsensusParams,
) -> ClassifiedTx {
    let txid = Buf32::new(tx.compute_txid().to_byte_array());
    let is_coinbase = tx.is_coinbase();
    let burned_fee = burned_output_value(tx);

    let mut hasher = Sha256::new();
    hasher.update(txid.as_bytes());
    hasher.update(ctx.block_hash.as_bytes());
    let computed_indexing_hash = Buf32::new(hasher.finalize().into());

    let inputs = tx
        .input
        .iter()
        .map(|input| TxInputInfo {
            outpoint: OutPointRef::new(
                Buf32::new(input.previous_output.txid.to_byte_array()),
                input.previous_output.vout.try_into().unwrap_or(u16::MAX),
            ),
            coinbase: input.previous_output.is_null(),
        })
        .collect();

    let outputs = tx
        .output
        .iter()
        .enumerate()
        .map(|(index, output)| TxOutputInfo {
            index: index as u16,
            value: output.value.to_sat(),
            script_pubkey: ScriptInfo {
                hex: output.script_pubkey.to_bytes(),
                address: Address::from_script(&output.script_pubkey, ctx.network)
                    .ok()
                    .map(|a| a.to_string()),
            },
            to: Address::from_script(&output.script_pubkey, ctx.network)
                .ok()
                .map(|a| a.to_string()),
        })
        .collect();

    let kind = match classify_kind(tx, burned_fee, params) {
        Ok(kind) => kind,
        Err(error) => {
            debug!(%txid, %error, "envelope rejected, downgrading to generic");
            TxKind::Generic { compromised: true }
        }
    };

    ClassifiedTx {
        txid,
        kind,
        inputs,
        outputs,
        burned_fee,
        computed_indexing_hash,
        is_coinbase,
        public_keys: scan_public_keys(tx, ctx.network),
    }
}

fn classify_kind(
    tx: &Transaction,
    burned_fee: u64,
    params: &ConsensusParams,
) -> Result<TxKind, L1TxError> {
    let envelope = match extract_envelope(tx) {
        None => return Ok(TxKind::Generic { compromised: false }),
        Some(envelope) => envelope?,
    };

    let features = ParsedFeatures::parse(&envelope.feature_stream, params)?;

    let shared = |was_compressed| SharedInteractionParameters {
        from_public_key: envelope.internal_key,
        miner_mldsa_hashed_pubkey: envelope.miner_mldsa_hashed_pubkey,
        challenge_preimage: envelope.challenge_preimage,
        access_list: features.access_list.clone().unwrap_or_default(),
        epoch_submission: features.epoch_submission.clone(),
        mldsa_link: features.mldsa_link.clone(),
        gas_sat_fee: burned_fee,
        was_compressed,
    };

    if let Some(DeployFeature {
        salt,
        bytecode,
        was_compressed,
    }) = features.deploy.clone()
    {
        let bytecode_hash = Buf32::new(Sha256::digest(&bytecode).into());
        return Ok(TxKind::Deployment {
            shared: shared(was_compressed),
            salt,
            bytecode,
            bytecode_hash,
        });
    }

    let (target, calldata, was_compressed) = match features.calldata.clone() {
        Some(CalldataFeature {
            target,
            calldata,
            was_compressed,
        }) => (target, calldata, was_compressed),
        // an envelope with only carrier features (epoch submission, link
        // request) is still an interaction, just not a contract call
        None => (Address32::zero(), Vec::new(), false),
    };

    Ok(TxKind::Interaction {
        shared: shared(was_compressed),
        target,
        calldata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{
            COMPRESSION_NONE, FLAG_CALLDATA, FLAG_DEPLOY, FLAG_EPOCH_SUBMISSION, FLAG_SENTINEL,
        },
        envelope::test_utils::{dummy_output, make_envelope_tx},
        features::encode_feature,
    };

    fn ctx() -> BlockContext {
        BlockContext {
            network: Network::Regtest,
            height: 100,
            block_hash: Buf32::new([0xbb; 32]),
        }
    }

    fn params() -> ConsensusParams {
        ConsensusParams::default()
    }

    fn calldata_stream(target: [u8; 32], data: &[u8]) -> Vec<u8> {
        let mut payload = target.to_vec();
        payload.push(COMPRESSION_NONE);
        payload.extend_from_slice(data);
        let mut stream = encode_feature(FLAG_CALLDATA, &payload);
        stream.push(FLAG_SENTINEL);
        stream
    }

    #[test]
    fn test_plain_tx_is_generic() {
        let mut tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &[], vec![dummy_output(1000)]);
        tx.input[0].witness = bitcoin::Witness::new();

        let classified = classify_transaction(&tx, &ctx(), &params());
        assert!(matches!(
            classified.kind,
            TxKind::Generic { compromised: false }
        ));
    }

    #[test]
    fn test_calldata_envelope_is_interaction() {
        let stream = calldata_stream([0x33; 32], b"selector+args");
        let tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &stream, vec![dummy_output(1000)]);

        let classified = classify_transaction(&tx, &ctx(), &params());
        match classified.kind {
            TxKind::Interaction {
                shared,
                target,
                calldata,
            } => {
                assert_eq!(target, Buf32::new([0x33; 32]));
                assert_eq!(calldata, b"selector+args");
                assert_eq!(shared.from_public_key, Buf32::new([7; 32]));
                assert!(!shared.was_compressed);
            }
            other => panic!("expected interaction, got {other:?}"),
        }
    }

    #[test]
    fn test_deploy_envelope_is_deployment() {
        let mut payload = vec![0x44; 32];
        payload.push(COMPRESSION_NONE);
        payload.extend_from_slice(&[0x00, 0x61, 0x73, 0x6d]);
        let mut stream = encode_feature(FLAG_DEPLOY, &payload);
        stream.push(FLAG_SENTINEL);

        let tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &stream, vec![dummy_output(1000)]);
        let classified = classify_transaction(&tx, &ctx(), &params());

        match classified.kind {
            TxKind::Deployment {
                salt,
                bytecode,
                bytecode_hash,
                ..
            } => {
                assert_eq!(salt, Buf32::new([0x44; 32]));
                assert_eq!(bytecode, [0x00, 0x61, 0x73, 0x6d]);
                assert!(!bytecode_hash.is_zero());
            }
            other => panic!("expected deployment, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_envelope_is_compromised_generic() {
        // unknown feature flag inside a valid envelope
        let mut stream = encode_feature(0x77, b"junk");
        stream.push(FLAG_SENTINEL);
        let tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &stream, vec![dummy_output(1000)]);

        let classified = classify_transaction(&tx, &ctx(), &params());
        assert!(matches!(
            classified.kind,
            TxKind::Generic { compromised: true }
        ));
    }

    #[test]
    fn test_submission_only_envelope_is_interaction() {
        let submission = EpochSubmissionFeature {
            mldsa_public_key: Buf32::new([3; 32]),
            salt: Buf32::new([4; 32]),
            graffiti: None,
        };
        let mut stream = encode_feature(FLAG_EPOCH_SUBMISSION, &submission.encode());
        stream.push(FLAG_SENTINEL);

        let tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &stream, vec![dummy_output(1000)]);
        let classified = classify_transaction(&tx, &ctx(), &params());

        match classified.kind {
            TxKind::Interaction {
                shared, calldata, ..
            } => {
                assert!(calldata.is_empty());
                assert_eq!(shared.epoch_submission.unwrap(), submission);
            }
            other => panic!("expected interaction, got {other:?}"),
        }
    }

    #[test]
    fn test_indexing_hash_depends_on_block() {
        let stream = calldata_stream([0x33; 32], b"x");
        let tx = make_envelope_tx([7; 32], [1; 32], [2; 32], &stream, vec![dummy_output(1000)]);

        let a = classify_transaction(&tx, &ctx(), &params());
        let mut other_ctx = ctx();
        other_ctx.block_hash = Buf32::new([0xcc; 32]);
        let b = classify_transaction(&tx, &other_ctx, &params());

        assert_ne!(a.computed_indexing_hash, b.computed_indexing_hash);
    }
}
