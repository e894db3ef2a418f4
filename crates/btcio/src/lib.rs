//! Bitcoin RPC access for the indexer.
//!
//! [`BitcoinReader`] is the seam the chain worker prefetches through; the
//! production implementation wraps `bitcoind-async-client` with transient
//! error retry.

mod client;
mod errors;
mod reader;
mod retry;

pub use client::ReaderClient;
pub use errors::BtcIoError;
#[cfg(any(test, feature = "test-utils"))]
pub use reader::MockBitcoinReader;
pub use reader::{fetch_raw_block, BitcoinReader, RawBlock};
pub use retry::{with_retry, RetryPolicy};
