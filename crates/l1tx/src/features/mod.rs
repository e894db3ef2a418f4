//! Feature sections of the envelope stream.
//!
//! The stream is `{ flag:u8, len:u32le, payload[len] }*` terminated by the
//! sentinel flag. Each feature may appear at most once.

mod access_list;
mod epoch_submission;
mod interaction;
mod mldsa_link;

pub use access_list::AccessList;
pub use epoch_submission::EpochSubmissionFeature;
pub use interaction::{CalldataFeature, DeployFeature};
pub use mldsa_link::MldsaLinkFeature;
use opnet_params::ConsensusParams;

use crate::{
    constants::{
        FLAG_ACCESS_LIST, FLAG_CALLDATA, FLAG_DEPLOY, FLAG_EPOCH_SUBMISSION, FLAG_MLDSA_LINK,
        FLAG_SENTINEL,
    },
    errors::L1TxError,
    reader::ByteReader,
};

/// All features carried by one envelope.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeatures {
    pub access_list: Option<AccessList>,
    pub epoch_submission: Option<EpochSubmissionFeature>,
    pub mldsa_link: Option<MldsaLinkFeature>,
    pub calldata: Option<CalldataFeature>,
    pub deploy: Option<DeployFeature>,
}

impl ParsedFeatures {
    /// Parses the feature stream of an envelope.
    pub(crate) fn parse(stream: &[u8], params: &ConsensusParams) -> Result<Self, L1TxError> {
        let mut reader = ByteReader::new(stream);
        let mut features = Self::default();

        loop {
            let flag = reader.take_u8()?;
            if flag == FLAG_SENTINEL {
                break;
            }

            let len = reader.take_u32_le()? as usize;
            let payload = reader.take(len)?;

            match flag {
                FLAG_ACCESS_LIST => {
                    set_once(flag, &mut features.access_list, || {
                        AccessList::decode_compressed(payload, params)
                    })?;
                }
                FLAG_EPOCH_SUBMISSION => {
                    set_once(flag, &mut features.epoch_submission, || {
                        EpochSubmissionFeature::decode(payload, params)
                    })?;
                }
                FLAG_MLDSA_LINK => {
                    set_once(flag, &mut features.mldsa_link, || {
                        MldsaLinkFeature::decode(payload)
                    })?;
                }
                FLAG_CALLDATA => {
                    set_once(flag, &mut features.calldata, || {
                        CalldataFeature::decode(payload, params)
                    })?;
                }
                FLAG_DEPLOY => {
                    set_once(flag, &mut features.deploy, || {
                        DeployFeature::decode(payload, params)
                    })?;
                }
                other => return Err(L1TxError::UnknownFeature(other)),
            }
        }

        if !reader.is_empty() {
            return Err(L1TxError::TrailingBytes);
        }

        Ok(features)
    }
}

fn set_once<T>(
    flag: u8,
    slot: &mut Option<T>,
    decode: impl FnOnce() -> Result<T, L1TxError>,
) -> Result<(), L1TxError> {
    if slot.is_some() {
        return Err(L1TxError::DuplicateFeature(flag));
    }
    *slot = Some(decode()?);
    Ok(())
}

/// Encodes one feature section.
#[cfg(test)]
pub(crate) fn encode_feature(flag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![flag];
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream_is_sentinel_only() {
        let features = ParsedFeatures::parse(&[FLAG_SENTINEL], &ConsensusParams::default()).unwrap();
        assert!(features.access_list.is_none());
        assert!(features.calldata.is_none());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let mut stream = encode_feature(0x7f, b"zz");
        stream.push(FLAG_SENTINEL);
        let err = ParsedFeatures::parse(&stream, &ConsensusParams::default()).unwrap_err();
        assert!(matches!(err, L1TxError::UnknownFeature(0x7f)));
    }

    #[test]
    fn test_missing_sentinel_rejected() {
        let err = ParsedFeatures::parse(&[], &ConsensusParams::default()).unwrap_err();
        assert!(matches!(err, L1TxError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err =
            ParsedFeatures::parse(&[FLAG_SENTINEL, 0xff], &ConsensusParams::default()).unwrap_err();
        assert!(matches!(err, L1TxError::TrailingBytes));
    }
}
