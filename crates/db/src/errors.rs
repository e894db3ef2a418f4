use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failures of the state store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend I/O failure; fatal to the block being committed.
    #[error("database: {0}")]
    Database(String),

    /// Value failed to (de)serialize; indicates corruption.
    #[error("codec: {0}")]
    Codec(String),

    /// A block input consumed a UTXO the store does not know as live.
    #[error("missing live utxo {0} consumed at height {1}")]
    MissingUtxo(String, u64),

    /// Commit height is not `tip + 1`.
    #[error("blocks must commit sequentially; expected {expected}, got {got}")]
    NonSequentialBlock { expected: u64, got: u64 },

    /// An epoch submission with this `(epoch, salt, key)` already exists.
    #[error("duplicate epoch submission")]
    DuplicateSubmission,
}

impl StorageError {
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Duplicate submissions are an expected client error, everything else
    /// is an operational fault.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateSubmission)
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<borsh::io::Error> for StorageError {
    fn from(err: borsh::io::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
