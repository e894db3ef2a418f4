use thiserror::Error;

/// Failures talking to the Bitcoin node.
#[derive(Debug, Clone, Error)]
pub enum BtcIoError {
    /// Transport or node-side failure; retried by the fetcher.
    #[error("rpc: {0}")]
    Rpc(String),

    /// The node does not have the requested block (yet).
    #[error("block not found: {0}")]
    NotFound(String),

    /// Gave up after the retry budget.
    #[error("request timed out after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl BtcIoError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::NotFound(_))
    }
}
