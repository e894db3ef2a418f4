//! Wire constants of the OP_NET envelope.

/// Envelope magic, first push of the tapscript payload.
pub const OPNET_MAGIC: [u8; 4] = *b"opnt";

/// Feature stream terminator.
pub const FLAG_SENTINEL: u8 = 0x00;

/// Access list declaration.
pub const FLAG_ACCESS_LIST: u8 = 0x01;

/// Epoch mining submission.
pub const FLAG_EPOCH_SUBMISSION: u8 = 0x02;

/// ML-DSA link request.
pub const FLAG_MLDSA_LINK: u8 = 0x03;

/// Contract call: target address plus calldata.
pub const FLAG_CALLDATA: u8 = 0x04;

/// Contract deployment: salt plus bytecode.
pub const FLAG_DEPLOY: u8 = 0x05;

/// Calldata/bytecode compression marker.
pub const COMPRESSION_NONE: u8 = 0x00;
pub const COMPRESSION_ZLIB: u8 = 0x01;

/// Taproot control block leading bytes (parity 0/1); these witness elements
/// are never public keys.
pub const TAPROOT_CONTROL_BASE: u8 = 0xc0;

/// Schnorr signature length in a link request.
pub const SCHNORR_SIG_LEN: usize = 64;
