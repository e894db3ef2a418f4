use opnet_params::ConsensusParams;
use opnet_primitives::{Address32, Buf32};

use crate::{compression, errors::L1TxError, reader::ByteReader};

/// A contract call: target plus (possibly compressed) calldata.
///
/// Wire form: `target:32 compression:u8 data`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CalldataFeature {
    pub target: Address32,
    pub calldata: Vec<u8>,
    pub was_compressed: bool,
}

impl CalldataFeature {
    pub(crate) fn decode(payload: &[u8], params: &ConsensusParams) -> Result<Self, L1TxError> {
        let mut reader = ByteReader::new(payload);
        let target = Buf32::new(reader.take_arr::<32>()?);
        let marker = reader.take_u8()?;
        let (calldata, was_compressed) =
            compression::maybe_decompress(marker, reader.take_rest(), params.max_calldata_size)?;

        Ok(Self {
            target,
            calldata,
            was_compressed,
        })
    }
}

/// A contract deployment: salt plus (possibly compressed) bytecode.
///
/// Wire form: `salt:32 compression:u8 bytecode`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeployFeature {
    pub salt: Buf32,
    pub bytecode: Vec<u8>,
    pub was_compressed: bool,
}

impl DeployFeature {
    pub(crate) fn decode(payload: &[u8], params: &ConsensusParams) -> Result<Self, L1TxError> {
        let mut reader = ByteReader::new(payload);
        let salt = Buf32::new(reader.take_arr::<32>()?);
        let marker = reader.take_u8()?;
        let (bytecode, was_compressed) =
            compression::maybe_decompress(marker, reader.take_rest(), params.max_calldata_size)?;

        if bytecode.is_empty() {
            return Err(L1TxError::invalid("deployment bytecode is empty"));
        }

        Ok(Self {
            salt,
            bytecode,
            was_compressed,
        })
    }
}
