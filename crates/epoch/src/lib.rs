//! Epoch mining validation.
//!
//! Every `BLOCKS_PER_EPOCH` blocks open a new epoch whose target is the
//! checksum root of the first block of the previous window. Mining an epoch
//! means finding a salt such that `SHA1(target ⊕ pubkey ⊕ salt)` matches
//! `SHA1(target)` in enough leading bits.

mod signature;
mod target;
mod validate;

pub use signature::{
    submission_signing_message, verify_mldsa, verify_schnorr, verify_submission_signatures,
};
pub use target::{derive_epoch_target, matching_bits, solution_candidate, EpochTarget};
pub use validate::{validate_submission, EpochError, SubmissionParams};
