use opnet_db::StorageError;
use thiserror::Error;

/// Failures while executing a block.
///
/// All of these abort the block before commit; the scheduler owns recovery.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("block {got} does not extend tip {tip}")]
    NotOnTip { tip: u64, got: u64 },
}
