use opnet_params::ConsensusParams;
use opnet_primitives::Buf32;

use crate::{errors::L1TxError, reader::ByteReader};

/// An epoch mining submission as carried on the wire.
///
/// Stored verbatim; validation against the epoch target happens downstream
/// in the epoch validator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EpochSubmissionFeature {
    pub mldsa_public_key: Buf32,
    pub salt: Buf32,
    pub graffiti: Option<Vec<u8>>,
}

impl EpochSubmissionFeature {
    pub(crate) fn decode(payload: &[u8], params: &ConsensusParams) -> Result<Self, L1TxError> {
        let mut reader = ByteReader::new(payload);

        let mldsa_public_key = Buf32::new(reader.take_arr::<32>()?);
        let salt = Buf32::new(reader.take_arr::<32>()?);

        let graffiti = reader.take_rest();
        if graffiti.len() > params.graffiti_length {
            return Err(L1TxError::GraffitiTooLong {
                cap: params.graffiti_length,
                got: graffiti.len(),
            });
        }

        Ok(Self {
            mldsa_public_key,
            salt,
            graffiti: (!graffiti.is_empty()).then(|| graffiti.to_vec()),
        })
    }

    /// Wire encoding; inverse of [`Self::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.mldsa_public_key.as_bytes());
        out.extend_from_slice(self.salt.as_bytes());
        if let Some(graffiti) = &self.graffiti {
            out.extend_from_slice(graffiti);
        }
        out
    }
}
