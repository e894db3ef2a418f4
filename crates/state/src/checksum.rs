//! Deterministic checksum root over a block's write batch.
//!
//! The root is a pure function of the delta and must be reproducible
//! bit-for-bit by every node: writes are folded through SHA-256 in a fixed
//! order, each component widened to a 32-byte big-endian word.

use opnet_primitives::Buf32;
use sha2::{Digest, Sha256};

use crate::BlockWrites;

const CHECKSUM_DOMAIN: &[u8] = b"opnet:checksum:v1";

fn fold(acc: &mut [u8; 32], parts: &[&[u8]]) {
    let mut hasher = Sha256::new();
    hasher.update(&acc[..]);
    for part in parts {
        hasher.update(part);
    }
    *acc = hasher.finalize().into();
}

fn widen_u16(value: u16) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[30..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Computes the checksum root of a block's post-state delta.
///
/// Fold order: storage triples sorted `(address asc, slot asc)`, then spends
/// sorted by outpoint, then created UTXOs sorted by outpoint. Input order of
/// the batch is irrelevant.
pub fn compute_checksum_root(writes: &BlockWrites) -> Buf32 {
    let mut acc: [u8; 32] = Sha256::digest(CHECKSUM_DOMAIN).into();

    let mut storage: Vec<_> = writes.storage_set.iter().collect();
    storage.sort_by_key(|(contract, slot, _)| (*contract, *slot));
    for (contract, slot, value) in storage {
        fold(
            &mut acc,
            &[
                contract.as_bytes(),
                &slot.get().to_be_bytes(),
                &value.get().to_be_bytes(),
            ],
        );
    }

    let mut spends: Vec<_> = writes.utxo_spend.iter().map(|s| s.outpoint).collect();
    spends.sort();
    for outpoint in spends {
        fold(&mut acc, &[outpoint.txid.as_bytes(), &widen_u16(outpoint.vout)]);
    }

    let mut created: Vec<_> = writes.utxo_add.iter().map(|u| u.outpoint).collect();
    created.sort();
    for outpoint in created {
        fold(&mut acc, &[outpoint.txid.as_bytes(), &widen_u16(outpoint.vout)]);
    }

    Buf32::new(acc)
}
