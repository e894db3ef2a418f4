use opnet_primitives::{Buf32, Uint256};
use opnet_state::{
    BlockHeader, ContractEvent, Epoch, EpochSubmission, ReorgRecord, TxKindTag, TxReceipt, Unspent,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlockHeader {
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

impl From<BlockHeader> for RpcBlockHeader {
    fn from(h: BlockHeader) -> Self {
        Self {
            height: h.height,
            hash: h.hash,
            prev_hash: h.prev_hash,
            merkle_root: h.merkle_root,
            receipt_root: h.receipt_root,
            storage_root: h.storage_root,
            checksum_root: h.checksum_root,
            gas_used: h.gas_used,
            base_gas: h.base_gas,
            ema: h.ema,
            n_tx: h.n_tx,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEvent {
    pub contract: Buf32,
    #[serde(with = "hex::serde")]
    pub event_type: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl From<ContractEvent> for RpcEvent {
    fn from(e: ContractEvent) -> Self {
        Self {
            contract: e.contract,
            event_type: e.event_type,
            data: e.data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub txid: Buf32,
    pub index: u32,
    pub kind: TxKindTag,
    pub gas_used: Uint256,
    pub reverted: Option<String>,
    pub events: Vec<RpcEvent>,
}

impl From<TxReceipt> for RpcReceipt {
    fn from(r: TxReceipt) -> Self {
        Self {
            txid: r.txid,
            index: r.index,
            kind: r.kind,
            gas_used: r.gas_used,
            reverted: r.reverted.map(hex::encode),
            events: r.events.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUtxo {
    pub txid: Buf32,
    pub output_index: u16,
    pub value: u64,
    #[serde(with = "hex::serde")]
    pub script_pub_key: Vec<u8>,
    pub address: Option<String>,
}

impl From<Unspent> for RpcUtxo {
    fn from(u: Unspent) -> Self {
        Self {
            txid: u.outpoint.txid,
            output_index: u.outpoint.vout,
            value: u.value,
            script_pub_key: u.script_pubkey.hex,
            address: u.script_pubkey.address,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEpochSubmission {
    pub epoch_number: u64,
    pub salt: Buf32,
    pub public_key: Buf32,
    pub graffiti: Option<String>,
    pub difficulty: u32,
}

impl From<EpochSubmission> for RpcEpochSubmission {
    fn from(s: EpochSubmission) -> Self {
        Self {
            epoch_number: s.epoch_number,
            salt: s.salt,
            public_key: s.mldsa_public_key,
            graffiti: s.graffiti.map(hex::encode),
            difficulty: s.difficulty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEpoch {
    pub epoch_number: u64,
    pub target: Buf32,
    pub target_hash: Buf32,
    pub best: Option<RpcEpochSubmission>,
}

impl From<Epoch> for RpcEpoch {
    fn from(e: Epoch) -> Self {
        Self {
            epoch_number: e.epoch_number,
            target: e.target,
            target_hash: e.target_hash,
            best: e.best.map(Into::into),
        }
    }
}

/// `btc_submitEpoch` request body; field widths are validated downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEpochParams {
    pub epoch_number: u64,
    #[serde(with = "hex::serde")]
    pub target_hash: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub salt: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub legacy_public_key: Vec<u8>,
    pub graffiti: Option<String>,
    pub level: u8,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    pub mldsa_public_key: Option<String>,
    pub mldsa_signature: Option<String>,
}

/// `btc_call` / `btc_simulateTransaction` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub to: Buf32,
    #[serde(with = "hex::serde")]
    pub calldata: Vec<u8>,
    pub from: Option<Buf32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    #[serde(with = "hex::serde")]
    pub result: Vec<u8>,
    pub reverted: Option<String>,
    pub gas_used: Uint256,
    pub events: Vec<RpcEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcGasInfo {
    pub base_gas: Uint256,
    pub ema: Uint256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReorg {
    pub from_block: u64,
    pub to_block: u64,
    pub timestamp: u64,
}

impl From<ReorgRecord> for RpcReorg {
    fn from(r: ReorgRecord) -> Self {
        Self {
            from_block: r.from_block,
            to_block: r.to_block,
            timestamp: r.timestamp,
        }
    }
}

/// One trusted-authority validator entry, as served by
/// `btc_getTrustedValidators`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTrustedValidator {
    pub company: String,
    pub public_key: String,
    pub opnet: String,
}
