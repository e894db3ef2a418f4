//! Tree layout and key encodings of the sled store.
//!
//! Values are borsh; integer key components are big-endian so range scans
//! walk in numeric order.

use opnet_primitives::{Address32, Buf32, OutPointRef, U256};

pub(crate) const TREE_BLOCKS: &str = "blocks";
pub(crate) const TREE_BLOCK_HASHES: &str = "block_hashes";
pub(crate) const TREE_TRANSACTIONS: &str = "transactions";
pub(crate) const TREE_RECEIPTS: &str = "receipts";
pub(crate) const TREE_UTXOS: &str = "utxos";
pub(crate) const TREE_UTXO_ADDRESSES: &str = "utxo_addresses";
pub(crate) const TREE_STORAGE: &str = "contract_pointer_values";
pub(crate) const TREE_CONTRACTS: &str = "contracts";
pub(crate) const TREE_PUBLIC_KEYS: &str = "public_keys";
pub(crate) const TREE_MLDSA: &str = "mldsa";
pub(crate) const TREE_EPOCHS: &str = "epochs";
pub(crate) const TREE_SUBMISSIONS: &str = "target_epochs";
pub(crate) const TREE_REORGS: &str = "reorgs";
pub(crate) const TREE_META: &str = "blockchain_information";

pub(crate) const META_TIP_HEIGHT: &[u8] = b"tip_height";
pub(crate) const META_PENDING_WRITES: &[u8] = b"pending_writes";

pub(crate) fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

/// `height ∥ index` orders transactions within and across blocks.
pub(crate) fn tx_key(height: u64, index: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&height.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

/// `contract ∥ slot ∥ height`: one row per write, newest last in scan order.
pub(crate) fn storage_key(contract: &Address32, slot: &U256, height: u64) -> [u8; 72] {
    let mut key = [0u8; 72];
    key[..32].copy_from_slice(contract.as_bytes());
    key[32..64].copy_from_slice(&slot.to_be_bytes());
    key[64..].copy_from_slice(&height.to_be_bytes());
    key
}

/// Prefix covering every version of one pointer.
pub(crate) fn storage_prefix(contract: &Address32, slot: &U256) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(contract.as_bytes());
    key[32..].copy_from_slice(&slot.to_be_bytes());
    key
}

/// `address ∥ 0x00 ∥ outpoint` for per-address UTXO scans.
pub(crate) fn utxo_address_key(address: &str, outpoint: &OutPointRef) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.len() + 1 + 34);
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key.extend_from_slice(&outpoint.to_key_bytes());
    key
}

pub(crate) fn utxo_address_prefix(address: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.len() + 1);
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key
}

/// `epoch ∥ salt ∥ key`, the uniqueness key of a submission.
pub(crate) fn submission_key(epoch: u64, salt: &Buf32, key: &Buf32) -> [u8; 72] {
    let mut out = [0u8; 72];
    out[..8].copy_from_slice(&epoch.to_be_bytes());
    out[8..40].copy_from_slice(salt.as_bytes());
    out[40..].copy_from_slice(key.as_bytes());
    out
}

pub(crate) fn reorg_key(from: u64, to: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&from.to_be_bytes());
    out[8..].copy_from_slice(&to.to_be_bytes());
    out
}
