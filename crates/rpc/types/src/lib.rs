//! Wire types of the `btc_*` JSON-RPC surface.
//!
//! Thin serde mirrors of the ledger model; the server is a read adapter
//! over the state store and never exposes internal types directly.

mod errors;
mod types;

pub use errors::{RpcErrorCode, SERVER_ERROR_BASE};
pub use types::*;

/// Accepts `eth_`-prefixed method names as aliases for `btc_`.
pub fn normalize_method(method: &str) -> String {
    match method.strip_prefix("eth_") {
        Some(rest) => format!("btc_{rest}"),
        None => method.to_string(),
    }
}
