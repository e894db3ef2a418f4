use opnet_params::ConsensusParams;
use opnet_primitives::{Buf32, Buf64};
use opnet_state::{EpochSubmission, MldsaLevel};
use thiserror::Error;
use tracing::debug;

use crate::{
    signature::verify_submission_signatures,
    target::{matching_bits, solution_candidate, EpochTarget},
};

/// Validation failures of an epoch submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EpochError {
    #[error("epoch 0 is not mineable")]
    EpochZero,

    #[error("submission targets epoch {got}, only epoch {expected} is open")]
    WrongEpoch { expected: u64, got: u64 },

    #[error("target hash does not match the epoch target")]
    TargetMismatch,

    #[error("{field} must be {expected} bytes, got {got}")]
    BadLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("graffiti exceeds {cap} bytes ({got})")]
    GraffitiTooLong { cap: usize, got: usize },

    #[error("legacy public key is not a valid x-only key")]
    InvalidLegacyKey,

    #[error("Schnorr signature verification failed")]
    SignatureInvalid,

    #[error("safe-signature mode requires the full ML-DSA key")]
    MldsaRequired,

    #[error("ML-DSA verification failed")]
    MldsaInvalid,

    #[error("difficulty {got} below the minimum of {min} matching bits")]
    BelowDifficulty { got: u32, min: u32 },

    #[error("submission already recorded for this (epoch, salt, key)")]
    DuplicateSubmission,
}

/// Raw submission fields as they arrive from the wire or RPC, before any
/// length validation.
#[derive(Debug, Clone)]
pub struct SubmissionParams {
    pub epoch_number: u64,
    /// Claimed target hash; must equal the derived one.
    pub target_hash: Vec<u8>,
    pub salt: Vec<u8>,
    /// 32-byte hashed ML-DSA identity; the `pk` operand of the preimage.
    pub mldsa_hashed_public_key: Vec<u8>,
    pub legacy_public_key: Vec<u8>,
    pub graffiti: Option<Vec<u8>>,
    pub level: MldsaLevel,
    pub schnorr_signature: Vec<u8>,
    pub mldsa_public_key: Option<Vec<u8>>,
    pub mldsa_signature: Option<Vec<u8>>,
}

fn checked_buf32(field: &'static str, bytes: &[u8]) -> Result<Buf32, EpochError> {
    Buf32::from_slice(bytes).map_err(|_| EpochError::BadLength {
        field,
        expected: 32,
        got: bytes.len(),
    })
}

/// Validates one submission against the open epoch.
///
/// `epoch_target` must be the target derived from committed state for
/// `submission.epoch_number`; `current_height` is the chain tip. Returns the
/// submission record with its measured difficulty.
pub fn validate_submission(
    params: &ConsensusParams,
    current_height: u64,
    epoch_target: &EpochTarget,
    submission: &SubmissionParams,
) -> Result<EpochSubmission, EpochError> {
    if submission.epoch_number == 0 {
        return Err(EpochError::EpochZero);
    }

    let open_epoch = params.next_epoch_number(current_height);
    if submission.epoch_number != open_epoch {
        return Err(EpochError::WrongEpoch {
            expected: open_epoch,
            got: submission.epoch_number,
        });
    }

    let claimed_target_hash = checked_buf32("target_hash", &submission.target_hash)?;
    if claimed_target_hash != epoch_target.target_hash {
        return Err(EpochError::TargetMismatch);
    }

    let salt = checked_buf32("salt", &submission.salt)?;
    let hashed_pk = checked_buf32("mldsa_public_key", &submission.mldsa_hashed_public_key)?;
    let legacy_pk = checked_buf32("legacy_public_key", &submission.legacy_public_key)?;
    let schnorr = Buf64::from_slice(&submission.schnorr_signature).map_err(|_| {
        EpochError::BadLength {
            field: "schnorr_signature",
            expected: 64,
            got: submission.schnorr_signature.len(),
        }
    })?;

    if let Some(graffiti) = &submission.graffiti {
        if graffiti.len() > params.graffiti_length {
            return Err(EpochError::GraffitiTooLong {
                cap: params.graffiti_length,
                got: graffiti.len(),
            });
        }
    }

    verify_submission_signatures(
        params,
        submission.level,
        &hashed_pk,
        submission.mldsa_public_key.as_deref(),
        submission.mldsa_signature.as_deref(),
        &legacy_pk,
        submission.epoch_number,
        &salt,
        submission.graffiti.as_deref(),
        &schnorr,
    )?;

    let candidate = solution_candidate(&epoch_target.target, &hashed_pk, &salt);
    let difficulty = matching_bits(&candidate, &epoch_target.target_digest());
    if difficulty < params.min_difficulty {
        return Err(EpochError::BelowDifficulty {
            got: difficulty,
            min: params.min_difficulty,
        });
    }

    debug!(
        epoch = submission.epoch_number,
        difficulty, "epoch submission accepted"
    );

    Ok(EpochSubmission {
        epoch_number: submission.epoch_number,
        salt,
        mldsa_public_key: hashed_pk,
        graffiti: submission.graffiti.clone(),
        difficulty,
        legacy_public_key: legacy_pk,
    })
}
