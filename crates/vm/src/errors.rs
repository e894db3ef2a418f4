use opnet_primitives::Address32;
use thiserror::Error;

/// Ways an execution frame can fail.
///
/// Everything here reverts the current frame and discards its writes; none of
/// it is fatal to block processing. The parent frame (or the executor)
/// observes the failure through the call outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VmError {
    #[error("out of gas")]
    OutOfGas,

    #[error("call stack too deep")]
    CallStackTooDeep,

    #[error("reentrancy into {0}")]
    Reentrancy(Address32),

    #[error("storage slot not in access list")]
    OutOfAccessList,

    #[error("event exceeds size cap")]
    EventTooLarge,

    #[error("event budget for this execution exhausted")]
    EventBudgetExceeded,

    #[error("deployment depth limit reached")]
    MaxDeploymentDepth,

    #[error("no contract at {0}")]
    ContractNotFound(Address32),

    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),

    #[error("missing required export `{0}`")]
    MissingExport(String),

    #[error("out of bounds memory access: {0}")]
    MemoryAccess(String),

    #[error("invalid deployment: {0}")]
    InvalidDeployment(String),

    #[error("trap: {0}")]
    Trap(String),
}
