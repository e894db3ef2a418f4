//! The indexing worker: block prefetch, ordered execution, reorg handling.
//!
//! A fixed-capacity pipeline prefetches blocks ahead of the tip while
//! exactly one task at a time executes and commits. The reorg watchdog runs
//! in the same loop and is the only caller of `revert_until`.

mod ctx;
mod errors;
mod reorg;
mod task;
mod worker;

pub use ctx::{WorkerConfig, WorkerCtx, WorkerStatus};
pub use errors::WorkerError;
pub use task::{IndexingTask, PreparedBlock, TaskState};
pub use worker::{chain_worker_task, ChainWorker, PollAction};
