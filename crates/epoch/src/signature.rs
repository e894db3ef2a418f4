use fips204::traits::{SerDes as _, Verifier as _};
use opnet_params::ConsensusParams;
use opnet_primitives::{Buf32, Buf64};
use opnet_state::MldsaLevel;
use secp256k1::{schnorr::Signature, Message, XOnlyPublicKey, SECP256K1};
use sha2::{Digest, Sha256};

use crate::validate::EpochError;

/// Builds the byte string an epoch submission signs.
///
/// `level ∥ hashed_pk ∥ pk? ∥ tweaked_key ∥ protocol_id ∥ chain_id ∥
/// epoch ∥ salt ∥ graffiti?` with integers big-endian.
#[expect(clippy::too_many_arguments, reason = "mirrors the signed field order")]
pub fn submission_signing_message(
    params: &ConsensusParams,
    level: MldsaLevel,
    hashed_public_key: &Buf32,
    public_key: Option<&[u8]>,
    tweaked_key: &Buf32,
    epoch_number: u64,
    salt: &Buf32,
    graffiti: Option<&[u8]>,
) -> Vec<u8> {
    let mut msg = vec![level.to_byte()];
    msg.extend_from_slice(hashed_public_key.as_bytes());
    if let Some(pk) = public_key {
        msg.extend_from_slice(pk);
    }
    msg.extend_from_slice(tweaked_key.as_bytes());
    msg.extend_from_slice(params.protocol_id.as_bytes());
    msg.extend_from_slice(&params.chain_id.to_be_bytes());
    msg.extend_from_slice(&epoch_number.to_be_bytes());
    msg.extend_from_slice(salt.as_bytes());
    if let Some(graffiti) = graffiti {
        msg.extend_from_slice(graffiti);
    }
    msg
}

/// BIP-340 verification of `signature` over `sha256(message)` by the x-only
/// key `public_key`.
pub fn verify_schnorr(
    message: &[u8],
    signature: &Buf64,
    public_key: &Buf32,
) -> Result<(), EpochError> {
    let key = XOnlyPublicKey::from_slice(public_key.as_bytes())
        .map_err(|_| EpochError::InvalidLegacyKey)?;
    let signature = Signature::from_slice(signature.as_bytes())
        .map_err(|_| EpochError::SignatureInvalid)?;
    let digest: [u8; 32] = Sha256::digest(message).into();

    SECP256K1
        .verify_schnorr(&signature, &Message::from_digest(digest), &key)
        .map_err(|_| EpochError::SignatureInvalid)
}

/// FIPS 204 verification of `signature` over `message` for the given
/// parameter set.
pub fn verify_mldsa(
    level: MldsaLevel,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), EpochError> {
    let ok = match level {
        MldsaLevel::Level2 => {
            use fips204::ml_dsa_44::{PublicKey, PK_LEN, SIG_LEN};
            let pk_bytes: &[u8; PK_LEN] =
                public_key.try_into().map_err(|_| EpochError::MldsaInvalid)?;
            let sig: &[u8; SIG_LEN] =
                signature.try_into().map_err(|_| EpochError::MldsaInvalid)?;
            let pk =
                PublicKey::try_from_bytes(*pk_bytes).map_err(|_| EpochError::MldsaInvalid)?;
            pk.verify(message, sig, &[])
        }
        MldsaLevel::Level3 => {
            use fips204::ml_dsa_65::{PublicKey, PK_LEN, SIG_LEN};
            let pk_bytes: &[u8; PK_LEN] =
                public_key.try_into().map_err(|_| EpochError::MldsaInvalid)?;
            let sig: &[u8; SIG_LEN] =
                signature.try_into().map_err(|_| EpochError::MldsaInvalid)?;
            let pk =
                PublicKey::try_from_bytes(*pk_bytes).map_err(|_| EpochError::MldsaInvalid)?;
            pk.verify(message, sig, &[])
        }
        MldsaLevel::Level5 => {
            use fips204::ml_dsa_87::{PublicKey, PK_LEN, SIG_LEN};
            let pk_bytes: &[u8; PK_LEN] =
                public_key.try_into().map_err(|_| EpochError::MldsaInvalid)?;
            let sig: &[u8; SIG_LEN] =
                signature.try_into().map_err(|_| EpochError::MldsaInvalid)?;
            let pk =
                PublicKey::try_from_bytes(*pk_bytes).map_err(|_| EpochError::MldsaInvalid)?;
            pk.verify(message, sig, &[])
        }
    };

    if ok {
        Ok(())
    } else {
        Err(EpochError::MldsaInvalid)
    }
}

/// Full signature check of a submission.
///
/// Schnorr is mandatory. In safe-signature mode the full ML-DSA key must be
/// attached, hash to `hashed_public_key`, and its signature must verify.
#[expect(clippy::too_many_arguments, reason = "mirrors the signed field order")]
pub fn verify_submission_signatures(
    params: &ConsensusParams,
    level: MldsaLevel,
    hashed_public_key: &Buf32,
    mldsa_public_key: Option<&[u8]>,
    mldsa_signature: Option<&[u8]>,
    legacy_public_key: &Buf32,
    epoch_number: u64,
    salt: &Buf32,
    graffiti: Option<&[u8]>,
    schnorr_signature: &Buf64,
) -> Result<(), EpochError> {
    let message = submission_signing_message(
        params,
        level,
        hashed_public_key,
        mldsa_public_key,
        legacy_public_key,
        epoch_number,
        salt,
        graffiti,
    );

    verify_schnorr(&message, schnorr_signature, legacy_public_key)?;

    if params.safe_signature_mode {
        let (Some(pk), Some(sig)) = (mldsa_public_key, mldsa_signature) else {
            return Err(EpochError::MldsaRequired);
        };
        let hashed: [u8; 32] = Sha256::digest(pk).into();
        if hashed != *hashed_public_key.as_bytes() {
            return Err(EpochError::MldsaInvalid);
        }
        verify_mldsa(level, pk, &message, sig)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use secp256k1::{Keypair, Secp256k1};

    use super::*;

    fn keypair() -> Keypair {
        Keypair::from_seckey_slice(&Secp256k1::new(), &[0x21; 32]).unwrap()
    }

    fn sign(message: &[u8], keypair: &Keypair) -> Buf64 {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let sig = SECP256K1.sign_schnorr_no_aux_rand(&Message::from_digest(digest), keypair);
        Buf64::new(*sig.as_ref())
    }

    #[test]
    fn test_schnorr_roundtrip() {
        let keypair = keypair();
        let pubkey = Buf32::new(keypair.x_only_public_key().0.serialize());

        let message = b"epoch submission";
        let signature = sign(message, &keypair);

        verify_schnorr(message, &signature, &pubkey).unwrap();
        assert_eq!(
            verify_schnorr(b"tampered", &signature, &pubkey),
            Err(EpochError::SignatureInvalid)
        );
    }

    #[test]
    fn test_full_submission_signature() {
        let params = ConsensusParams::default();
        let keypair = keypair();
        let legacy = Buf32::new(keypair.x_only_public_key().0.serialize());
        let hashed = Buf32::new([0x44; 32]);
        let salt = Buf32::new([0x55; 32]);

        let message = submission_signing_message(
            &params,
            MldsaLevel::Level2,
            &hashed,
            None,
            &legacy,
            7,
            &salt,
            Some(b"gm"),
        );
        let signature = sign(&message, &keypair);

        verify_submission_signatures(
            &params,
            MldsaLevel::Level2,
            &hashed,
            None,
            None,
            &legacy,
            7,
            &salt,
            Some(b"gm"),
            &signature,
        )
        .unwrap();

        // epoch number is part of the signed payload
        let err = verify_submission_signatures(
            &params,
            MldsaLevel::Level2,
            &hashed,
            None,
            None,
            &legacy,
            8,
            &salt,
            Some(b"gm"),
            &signature,
        )
        .unwrap_err();
        assert_eq!(err, EpochError::SignatureInvalid);
    }

    #[test]
    fn test_safe_mode_requires_mldsa_key() {
        let mut params = ConsensusParams::default();
        params.safe_signature_mode = true;

        let keypair = keypair();
        let legacy = Buf32::new(keypair.x_only_public_key().0.serialize());
        let hashed = Buf32::new([0x44; 32]);
        let salt = Buf32::new([0x55; 32]);

        let message = submission_signing_message(
            &params,
            MldsaLevel::Level2,
            &hashed,
            None,
            &legacy,
            7,
            &salt,
            None,
        );
        let signature = sign(&message, &keypair);

        let err = verify_submission_signatures(
            &params,
            MldsaLevel::Level2,
            &hashed,
            None,
            None,
            &legacy,
            7,
            &salt,
            None,
            &signature,
        )
        .unwrap_err();
        assert_eq!(err, EpochError::MldsaRequired);
    }
}
