use opnet_primitives::{Buf32, Buf64};
use opnet_state::MldsaLevel;

use crate::{constants::SCHNORR_SIG_LEN, errors::L1TxError, reader::ByteReader};

/// Request to bind an ML-DSA identity to the sender's legacy key.
///
/// Wire form: `level:u8 hashed_pk:32 verify:u8 [pk_len:u16le pk sig_len:u16le
/// mldsa_sig] schnorr_sig:64`. The Schnorr signature is always checked by the
/// validator; the ML-DSA signature only when `verify_request` is set and the
/// full key is attached.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MldsaLinkFeature {
    pub level: MldsaLevel,
    pub hashed_public_key: Buf32,
    pub verify_request: bool,
    pub public_key: Option<Vec<u8>>,
    pub mldsa_signature: Option<Vec<u8>>,
    pub legacy_schnorr_signature: Buf64,
}

impl MldsaLinkFeature {
    pub(crate) fn decode(payload: &[u8]) -> Result<Self, L1TxError> {
        let mut reader = ByteReader::new(payload);

        let level_byte = reader.take_u8()?;
        let level =
            MldsaLevel::from_byte(level_byte).ok_or(L1TxError::UnknownMldsaLevel(level_byte))?;

        let hashed_public_key = Buf32::new(reader.take_arr::<32>()?);
        let verify_request = match reader.take_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(L1TxError::invalid(format!(
                    "verify flag must be 0 or 1, got {other}"
                )))
            }
        };

        let (public_key, mldsa_signature) = if verify_request {
            let pk_len = reader.take_u16_le()? as usize;
            if pk_len != level.public_key_len() {
                return Err(L1TxError::invalid(format!(
                    "ML-DSA public key must be {} bytes for this level, got {pk_len}",
                    level.public_key_len()
                )));
            }
            let pk = reader.take(pk_len)?.to_vec();
            let sig_len = reader.take_u16_le()? as usize;
            let sig = reader.take(sig_len)?.to_vec();
            (Some(pk), Some(sig))
        } else {
            (None, None)
        };

        let legacy_schnorr_signature = Buf64::new(reader.take_arr::<SCHNORR_SIG_LEN>()?);

        if !reader.is_empty() {
            return Err(L1TxError::TrailingBytes);
        }

        Ok(Self {
            level,
            hashed_public_key,
            verify_request,
            public_key,
            mldsa_signature,
            legacy_schnorr_signature,
        })
    }

    /// Wire encoding; inverse of [`Self::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.level.to_byte()];
        out.extend_from_slice(self.hashed_public_key.as_bytes());
        out.push(self.verify_request as u8);
        if self.verify_request {
            let pk = self.public_key.as_deref().unwrap_or_default();
            out.extend_from_slice(&(pk.len() as u16).to_le_bytes());
            out.extend_from_slice(pk);
            let sig = self.mldsa_signature.as_deref().unwrap_or_default();
            out.extend_from_slice(&(sig.len() as u16).to_le_bytes());
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(self.legacy_schnorr_signature.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_hash_only() {
        let feature = MldsaLinkFeature {
            level: MldsaLevel::Level2,
            hashed_public_key: Buf32::new([5; 32]),
            verify_request: false,
            public_key: None,
            mldsa_signature: None,
            legacy_schnorr_signature: Buf64::new([6; 64]),
        };
        let decoded = MldsaLinkFeature::decode(&feature.encode()).unwrap();
        assert_eq!(decoded, feature);
    }

    #[test]
    fn test_roundtrip_with_full_key() {
        let feature = MldsaLinkFeature {
            level: MldsaLevel::Level2,
            hashed_public_key: Buf32::new([5; 32]),
            verify_request: true,
            public_key: Some(vec![7; MldsaLevel::Level2.public_key_len()]),
            mldsa_signature: Some(vec![8; 2420]),
            legacy_schnorr_signature: Buf64::new([6; 64]),
        };
        let decoded = MldsaLinkFeature::decode(&feature.encode()).unwrap();
        assert_eq!(decoded, feature);
    }

    #[test]
    fn test_unknown_level_rejected() {
        let err = MldsaLinkFeature::decode(&[9u8; 100]).unwrap_err();
        assert!(matches!(err, L1TxError::UnknownMldsaLevel(9)));
    }

    #[test]
    fn test_wrong_pk_len_rejected() {
        let mut feature = MldsaLinkFeature {
            level: MldsaLevel::Level2,
            hashed_public_key: Buf32::new([5; 32]),
            verify_request: true,
            public_key: Some(vec![7; 100]), // wrong size for level 2
            mldsa_signature: Some(vec![8; 64]),
            legacy_schnorr_signature: Buf64::new([6; 64]),
        };
        let err = MldsaLinkFeature::decode(&feature.encode()).unwrap_err();
        assert!(matches!(err, L1TxError::InvalidEncoding(_)));

        feature.public_key = Some(vec![7; MldsaLevel::Level2.public_key_len()]);
        assert!(MldsaLinkFeature::decode(&feature.encode()).is_ok());
    }
}
