use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{
    constants::{COMPRESSION_NONE, COMPRESSION_ZLIB},
    errors::L1TxError,
};

/// Inflates a zlib stream, enforcing the decompressed size bound.
pub fn decompress(data: &[u8], max_size: usize) -> Result<Vec<u8>, L1TxError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    // read one byte past the cap so oversize is detected, not truncated
    let mut limited = (&mut decoder).take(max_size as u64 + 1);
    limited
        .read_to_end(&mut out)
        .map_err(|e| L1TxError::Decompression(e.to_string()))?;
    if out.len() > max_size {
        return Err(L1TxError::DecompressedTooLarge(max_size));
    }
    Ok(out)
}

/// Applies the envelope compression marker. Returns the payload and whether
/// it was compressed on the wire.
pub fn maybe_decompress(
    marker: u8,
    data: &[u8],
    max_size: usize,
) -> Result<(Vec<u8>, bool), L1TxError> {
    match marker {
        COMPRESSION_NONE => {
            if data.len() > max_size {
                return Err(L1TxError::DecompressedTooLarge(max_size));
            }
            Ok((data.to_vec(), false))
        }
        COMPRESSION_ZLIB => Ok((decompress(data, max_size)?, true)),
        other => Err(L1TxError::invalid(format!(
            "unknown compression marker {other:#04x}"
        ))),
    }
}
