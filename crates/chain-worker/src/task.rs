use bitcoin::Network;
use opnet_btcio::{fetch_raw_block, BitcoinReader, RawBlock};
use opnet_common::CancellationFlag;
use opnet_l1tx::{classify_transaction, BlockContext, ClassifiedTx};
use opnet_params::ConsensusParams;
use tracing::trace;

use crate::WorkerError;

/// Lifecycle of one indexing task.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TaskState {
    Created,
    Prefetching,
    Ready,
    Executing,
    Done,
    Cancelled,
    Failed,
}

/// A block fetched and classified, waiting for its turn to execute.
#[derive(Debug, Clone)]
pub struct PreparedBlock {
    pub raw: RawBlock,
    pub transactions: Vec<ClassifiedTx>,
}

/// One position of the prefetch pipeline.
#[derive(Debug)]
pub struct IndexingTask {
    pub height: u64,
    pub state: TaskState,
    pub prepared: Option<PreparedBlock>,
}

impl IndexingTask {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            state: TaskState::Created,
            prepared: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    pub fn cancel(&mut self) {
        self.state = TaskState::Cancelled;
        self.prepared = None;
    }
}

/// Fetches and classifies one block. Cancellation is observed at the fetch
/// boundary and between transactions.
pub(crate) async fn prefetch_block(
    reader: &dyn BitcoinReader,
    params: &ConsensusParams,
    network: Network,
    height: u64,
    cancel: &CancellationFlag,
) -> Result<PreparedBlock, WorkerError> {
    if cancel.is_cancelled() {
        return Err(WorkerError::Cancelled(height));
    }

    let raw = fetch_raw_block(reader, height).await?;

    let ctx = BlockContext {
        network,
        height,
        block_hash: raw.hash,
    };

    let mut transactions = Vec::with_capacity(raw.transactions.len());
    for tx in &raw.transactions {
        if cancel.is_cancelled() {
            return Err(WorkerError::Cancelled(height));
        }
        transactions.push(classify_transaction(tx, &ctx, params));
    }

    trace!(%height, n_tx = transactions.len(), "block prefetched");
    Ok(PreparedBlock { raw, transactions })
}
