use opnet_btcio::BtcIoError;
use opnet_chainexec::ExecError;
use opnet_db::StorageError;
use thiserror::Error;

/// Failures of the chain worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("bitcoin rpc: {0}")]
    BtcIo(#[from] BtcIoError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("execution: {0}")]
    Exec(#[from] ExecError),

    #[error("task for height {0} was cancelled")]
    Cancelled(u64),

    /// The watchdog could not find a common ancestor within its search
    /// window.
    #[error("no fork point found above height {floor}")]
    NoForkPoint { floor: u64 },
}

impl WorkerError {
    /// Recoverable errors are logged and retried on the next poll; fatal
    /// ones panic the worker (the task runtime turns that into shutdown).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoForkPoint { .. })
    }
}
