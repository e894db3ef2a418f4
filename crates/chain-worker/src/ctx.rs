use std::sync::Arc;

use bitcoin::Network;
use opnet_btcio::BitcoinReader;
use opnet_chainexec::BlockExecutor;
use opnet_db::StateStore;
use opnet_params::ConsensusParams;
use opnet_primitives::Buf32;
use tokio::sync::watch;

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How many blocks may prefetch ahead of the executing one.
    pub prefetch_depth: usize,
    /// Poll interval against the Bitcoin tip.
    pub poll_wait_ms: u64,
    /// How far back the watchdog searches for a fork point.
    pub max_reorg_depth: u64,
    /// Purge spent UTXOs older than this many blocks; `None` keeps them.
    pub purge_spent_after: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            prefetch_depth: 10,
            poll_wait_ms: 1_000,
            max_reorg_depth: 100,
            purge_spent_after: None,
        }
    }
}

/// Last block the pipeline fully committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStatus {
    pub last_processed: Option<(u64, Buf32)>,
}

/// Collaborators of the chain worker.
pub struct WorkerCtx {
    pub reader: Arc<dyn BitcoinReader>,
    pub store: Arc<dyn StateStore>,
    pub executor: Arc<BlockExecutor>,
    pub params: Arc<ConsensusParams>,
    pub network: Network,
    pub config: WorkerConfig,
    pub status_tx: watch::Sender<WorkerStatus>,
}

impl std::fmt::Debug for WorkerCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCtx")
            .field("network", &self.network)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WorkerCtx {
    /// Notifies dependent workers that a block committed. Emitted strictly
    /// after `commit_block` returns.
    pub(crate) fn notify_block_processed(&self, height: u64, checksum_root: Buf32) {
        let _ = self.status_tx.send(WorkerStatus {
            last_processed: Some((height, checksum_root)),
        });
    }
}
