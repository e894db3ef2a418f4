use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::{Buf32, OutPointRef};
use serde::{Deserialize, Serialize};

use crate::{ScriptInfo, TxKindTag};

/// One input of an indexed transaction.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TxInputInfo {
    /// Consumed outpoint; all-zero txid for coinbase.
    pub outpoint: OutPointRef,
    pub coinbase: bool,
}

/// One output of an indexed transaction.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TxOutputInfo {
    pub index: u16,
    pub value: u64,
    pub script_pubkey: ScriptInfo,
    /// Decoded recipient address, when the script is standard.
    pub to: Option<String>,
}

/// Indexed view of one transaction of a committed block.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TxRecord {
    pub txid: Buf32,
    /// Authoritative intra-block ordinal assigned by the sorter.
    pub index: u32,
    pub kind: TxKindTag,
    /// An OP_NET envelope was present but malformed.
    pub compromised: bool,
    pub inputs: Vec<TxInputInfo>,
    pub outputs: Vec<TxOutputInfo>,
    /// Provably unspendable output value, in sats.
    pub burned_fee: u64,
    /// Fee share priced into gas, in sats.
    pub gas_sat_fee: u64,
}
