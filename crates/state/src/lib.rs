//! Ledger data model for the OP_NET node.
//!
//! Everything the state store persists lives here: block headers, the UTXO
//! set, contract records, the public-key directory, ML-DSA links, epochs and
//! their submissions, receipts, and the per-block write batch with its
//! deterministic checksum root.

mod checksum;
mod contract;
mod epoch;
mod header;
mod mldsa;
mod pubkey;
mod receipt;
mod reorg;
mod transaction;
mod utxo;
mod writes;

pub use checksum::compute_checksum_root;
pub use contract::{derive_contract_addresses, ContractRecord};
pub use epoch::{Epoch, EpochSubmission};
pub use header::BlockHeader;
pub use mldsa::{MldsaLevel, MldsaLink};
pub use pubkey::PublicKeyDirectoryEntry;
pub use receipt::{ContractEvent, TxKindTag, TxReceipt};
pub use reorg::ReorgRecord;
pub use transaction::{TxInputInfo, TxOutputInfo, TxRecord};
pub use utxo::{ScriptInfo, SpentRef, Unspent};
pub use writes::BlockWrites;
