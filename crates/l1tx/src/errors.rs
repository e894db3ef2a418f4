use thiserror::Error;

/// Errors raised while parsing an OP_NET envelope.
///
/// All of these are non-fatal to block processing: the offending transaction
/// is reclassified generic (or recorded compromised) and indexing continues.
#[derive(Debug, Clone, Error)]
pub enum L1TxError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("unknown feature opcode {0:#04x}")]
    UnknownFeature(u8),

    #[error("feature {0:#04x} declared twice")]
    DuplicateFeature(u8),

    #[error("duplicate access list entry")]
    DuplicateAccess,

    #[error("access list exceeds cap of {cap} entries ({got})")]
    AccessListTooLarge { cap: usize, got: usize },

    #[error("graffiti exceeds {cap} bytes ({got})")]
    GraffitiTooLong { cap: usize, got: usize },

    #[error("payload exceeds decompressed size bound of {0} bytes")]
    DecompressedTooLarge(usize),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("truncated payload: wanted {wanted} more bytes, {remaining} left")]
    Truncated { wanted: usize, remaining: usize },

    #[error("trailing bytes after feature stream")]
    TrailingBytes,

    #[error("unknown ML-DSA level byte {0:#04x}")]
    UnknownMldsaLevel(u8),
}

impl L1TxError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidEncoding(msg.into())
    }
}
