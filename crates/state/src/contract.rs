use bitcoin::{
    hashes::Hash, key::TapTweak, secp256k1::Secp256k1, taproot::TapNodeHash, Address, Network,
    XOnlyPublicKey,
};
use borsh::{BorshDeserialize, BorshSerialize};
use opnet_primitives::Buf32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A deployed contract.
#[derive(
    Debug, Clone, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ContractRecord {
    /// Canonical on-chain identity: the taproot-tweaked x-only key the
    /// contract's p2tr address commits to.
    pub tweaked_public_key: Buf32,
    /// Deterministic pre-tweak commitment to deployer, code and salt.
    pub virtual_address: Buf32,
    pub deployer_public_key: Buf32,
    #[serde(with = "hex::serde")]
    pub bytecode: Vec<u8>,
    pub bytecode_hash: Buf32,
    pub p2tr_address: String,
    pub inserted_block_height: u64,
}

#[derive(Debug, Clone, Error)]
pub enum ContractAddressError {
    #[error("deployer key is not a valid x-only public key")]
    InvalidDeployerKey,
}

/// Derives the identity of a contract deployed by `deployer_public_key` with
/// the given code hash and salt.
///
/// The virtual address commits to deployer, code and salt; the taproot tweak
/// of the deployer key with that commitment yields the tweaked key whose
/// p2tr script is the contract's on-chain address.
pub fn derive_contract_addresses(
    deployer_public_key: &Buf32,
    bytecode_hash: &Buf32,
    salt: &Buf32,
    network: Network,
) -> Result<(Buf32, Buf32, String), ContractAddressError> {
    let mut hasher = Sha256::new();
    hasher.update(b"opnet:contract");
    hasher.update(deployer_public_key.as_bytes());
    hasher.update(bytecode_hash.as_bytes());
    hasher.update(salt.as_bytes());
    let virtual_address = Buf32::new(hasher.finalize().into());

    let internal_key = XOnlyPublicKey::from_slice(deployer_public_key.as_bytes())
        .map_err(|_| ContractAddressError::InvalidDeployerKey)?;

    let secp = Secp256k1::verification_only();
    let merkle_root = TapNodeHash::from_byte_array(virtual_address.into_bytes());
    let (tweaked, _parity) = internal_key.tap_tweak(&secp, Some(merkle_root));
    let tweaked_public_key = Buf32::new(tweaked.serialize());

    let p2tr_address = Address::p2tr(&secp, internal_key, Some(merkle_root), network).to_string();

    Ok((virtual_address, tweaked_public_key, p2tr_address))
}

#[cfg(test)]
mod tests {
    use secp256k1::{Keypair, Secp256k1 as RawSecp};

    use super::*;

    fn test_deployer_key() -> Buf32 {
        let secp = RawSecp::new();
        let keypair = Keypair::from_seckey_slice(&secp, &[0x11; 32]).unwrap();
        Buf32::new(keypair.x_only_public_key().0.serialize())
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let deployer = test_deployer_key();
        let code_hash = Buf32::new([2; 32]);
        let salt = Buf32::new([3; 32]);

        let a = derive_contract_addresses(&deployer, &code_hash, &salt, Network::Regtest).unwrap();
        let b = derive_contract_addresses(&deployer, &code_hash, &salt, Network::Regtest).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_salt_changes_address() {
        let deployer = test_deployer_key();
        let code_hash = Buf32::new([2; 32]);

        let a =
            derive_contract_addresses(&deployer, &code_hash, &Buf32::new([3; 32]), Network::Regtest)
                .unwrap();
        let b =
            derive_contract_addresses(&deployer, &code_hash, &Buf32::new([4; 32]), Network::Regtest)
                .unwrap();
        assert_ne!(a.0, b.0);
        assert_ne!(a.1, b.1);
        assert_ne!(a.2, b.2);
    }

    #[test]
    fn test_invalid_deployer_key_rejected() {
        // all-zero bytes are not a valid x-only key
        let err = derive_contract_addresses(
            &Buf32::zero(),
            &Buf32::new([2; 32]),
            &Buf32::new([3; 32]),
            Network::Regtest,
        )
        .unwrap_err();
        assert!(matches!(err, ContractAddressError::InvalidDeployerKey));
    }
}
