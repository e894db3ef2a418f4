//! Public-key directory extraction.
//!
//! Input witnesses reveal full compressed keys (keyspend and p2wpkh spends);
//! p2tr outputs reveal only tweaked keys. Taproot control blocks look like
//! 33-byte elements but are never keys and are filtered by their parity
//! prefix.

use bitcoin::{
    key::TapTweak, secp256k1::Secp256k1, Address, CompressedPublicKey, Network, Transaction,
};
use opnet_primitives::Buf32;
use opnet_state::PublicKeyDirectoryEntry;

use crate::constants::TAPROOT_CONTROL_BASE;

/// Scans a transaction for key material and derives directory rows.
pub fn scan_public_keys(tx: &Transaction, network: Network) -> Vec<PublicKeyDirectoryEntry> {
    let secp = Secp256k1::verification_only();
    let mut entries: Vec<PublicKeyDirectoryEntry> = Vec::new();

    for input in &tx.input {
        for element in input.witness.iter() {
            if element.len() != 33 {
                continue;
            }
            // control blocks of minimal depth are also 33 bytes
            if element[0] & 0xfe == TAPROOT_CONTROL_BASE {
                continue;
            }
            let Ok(key) = CompressedPublicKey::from_slice(element) else {
                continue;
            };

            let (xonly, _parity) = key.0.x_only_public_key();
            let (tweaked, _) = xonly.tap_tweak(&secp, None);
            let tweaked_public_key = Buf32::new(tweaked.serialize());

            if entries
                .iter()
                .any(|e| e.tweaked_public_key == tweaked_public_key)
            {
                continue;
            }

            entries.push(PublicKeyDirectoryEntry {
                public_key: Some(element.to_vec()),
                tweaked_public_key,
                p2pkh: Some(Address::p2pkh(key, network).to_string()),
                p2sh_p2wpkh: Some(Address::p2shwpkh(&key, network).to_string()),
                p2tr: Address::p2tr(&secp, xonly, None, network).to_string(),
                p2wpkh: Some(Address::p2wpkh(&key, network).to_string()),
            });
        }
    }

    for output in &tx.output {
        if !output.script_pubkey.is_p2tr() {
            continue;
        }
        let bytes = output.script_pubkey.as_bytes();
        let Ok(tweaked_public_key) = Buf32::from_slice(&bytes[2..34]) else {
            continue;
        };
        if entries
            .iter()
            .any(|e| e.tweaked_public_key == tweaked_public_key)
        {
            continue;
        }

        let Ok(address) = Address::from_script(&output.script_pubkey, network) else {
            continue;
        };

        entries.push(PublicKeyDirectoryEntry {
            public_key: None,
            tweaked_public_key,
            p2pkh: None,
            p2sh_p2wpkh: None,
            p2tr: address.to_string(),
            p2wpkh: None,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use bitcoin::{
        absolute::LockTime, transaction::Version, Amount, OutPoint, ScriptBuf, Sequence, TxIn,
        TxOut, Witness, XOnlyPublicKey,
    };
    use secp256k1::{Keypair, Secp256k1 as RawSecp};

    use super::*;

    fn test_keypair() -> Keypair {
        Keypair::from_seckey_slice(&RawSecp::new(), &[0x42; 32]).unwrap()
    }

    fn tx_with_witness_elements(elements: Vec<Vec<u8>>) -> Transaction {
        let mut witness = Witness::new();
        for element in elements {
            witness.push(&element);
        }
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness,
            }],
            output: vec![],
        }
    }

    #[test]
    fn test_recovers_key_from_witness() {
        let keypair = test_keypair();
        let pubkey = keypair.public_key().serialize().to_vec();

        let tx = tx_with_witness_elements(vec![vec![0u8; 64], pubkey.clone()]);
        let entries = scan_public_keys(&tx, Network::Regtest);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].public_key.as_deref(), Some(pubkey.as_slice()));
        assert!(entries[0].p2pkh.is_some());
        assert!(entries[0].p2wpkh.is_some());
    }

    #[test]
    fn test_control_block_filtered() {
        let mut fake_control = vec![0xc1u8];
        fake_control.extend_from_slice(&[0x02; 32]);
        assert_eq!(fake_control.len(), 33);

        let tx = tx_with_witness_elements(vec![fake_control]);
        assert!(scan_public_keys(&tx, Network::Regtest).is_empty());
    }

    #[test]
    fn test_p2tr_output_yields_tweaked_only_entry() {
        let keypair = test_keypair();
        let (xonly, _) = keypair.x_only_public_key();
        let xonly = XOnlyPublicKey::from_slice(&xonly.serialize()).unwrap();

        let secp = Secp256k1::verification_only();
        let script = ScriptBuf::new_p2tr(&secp, xonly, None);

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![TxOut {
                value: Amount::from_sat(1000),
                script_pubkey: script,
            }],
        };

        let entries = scan_public_keys(&tx, Network::Regtest);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].public_key.is_none());
        assert!(entries[0].p2pkh.is_none());
        assert!(entries[0].p2tr.starts_with("bcrt1p"));
    }
}
