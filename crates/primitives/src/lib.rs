//! Fixed-width byte primitives shared across the OP_NET node.

mod buf;
mod outpoint;
mod u256;

pub use buf::{Buf32, Buf64, BufError};
pub use outpoint::OutPointRef;
pub use u256::{u256_from_be_bytes, u256_to_be_bytes, Uint256, U256};

/// 32-byte OP_NET account identity (a taproot-tweaked x-only pubkey).
pub type Address32 = Buf32;
