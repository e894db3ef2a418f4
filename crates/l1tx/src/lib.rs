//! Classification of raw Bitcoin transactions into OP_NET operations.
//!
//! A transaction is an *interaction* or *deployment* when one of its inputs
//! reveals the OP_NET envelope in its tapscript. Everything else is generic
//! and indexed for UTXOs only. Envelope parse failures are non-fatal: the
//! transaction degrades to generic (possibly flagged compromised), the block
//! goes on.

mod classify;
mod compression;
mod constants;
mod envelope;
mod errors;
mod features;
mod fees;
mod pubkeys;
mod reader;

pub use classify::{classify_transaction, BlockContext, ClassifiedTx, SharedInteractionParameters, TxKind};
pub use compression::{decompress, maybe_decompress};
pub use constants::*;
pub use envelope::{extract_envelope, Envelope};
pub use errors::L1TxError;
pub use features::{
    AccessList, CalldataFeature, DeployFeature, EpochSubmissionFeature, MldsaLinkFeature,
    ParsedFeatures,
};
pub use fees::burned_output_value;
pub use pubkeys::scan_public_keys;
