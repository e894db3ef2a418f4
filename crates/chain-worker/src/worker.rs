use std::collections::BTreeMap;

use futures::future::join_all;
use opnet_common::CancellationFlag;
use opnet_epoch::derive_epoch_target;
use opnet_state::Epoch;
use tracing::{debug, error, info, warn};

use crate::{
    ctx::WorkerCtx,
    reorg::handle_reorg,
    task::{prefetch_block, IndexingTask, TaskState},
    WorkerError,
};

/// What one poll against the Bitcoin tip decided.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PollAction {
    /// New blocks are available to prefetch and execute.
    Extend { l1_tip: u64 },
    /// The local tip is not on the active chain.
    Reorg,
    /// In sync, nothing to do.
    Noop,
}

/// The indexing scheduler.
///
/// Single-threaded by construction: prefetches run concurrently, but
/// execution and reorg handling happen inline in the worker loop, so the
/// `task_in_progress` guard can only trip on a logic error, and that is
/// fatal.
pub struct ChainWorker {
    ctx: WorkerCtx,
    tasks: BTreeMap<u64, IndexingTask>,
    /// First height this network indexes.
    start_height: u64,
    task_in_progress: bool,
    chain_reorged: bool,
    cancel: CancellationFlag,
}

impl std::fmt::Debug for ChainWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainWorker")
            .field("tasks", &self.tasks.len())
            .field("task_in_progress", &self.task_in_progress)
            .field("chain_reorged", &self.chain_reorged)
            .finish_non_exhaustive()
    }
}

impl ChainWorker {
    pub fn new(ctx: WorkerCtx, start_height: u64) -> Self {
        Self {
            ctx,
            tasks: BTreeMap::new(),
            start_height,
            task_in_progress: false,
            chain_reorged: false,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn ctx(&self) -> &WorkerCtx {
        &self.ctx
    }

    /// Startup recovery: drop any half-written batch, then cut back to the
    /// last fully committed block.
    pub async fn recover(&self) -> Result<(), WorkerError> {
        let had_pending = self.ctx.store.kill_all_pending_writes().await?;
        if had_pending {
            warn!("recovering from interrupted commit");
        }
        if let Some(tip) = self.ctx.store.get_latest_block().await? {
            self.ctx.store.revert_until(tip.height + 1).await?;
        }
        Ok(())
    }

    /// Next height the pipeline wants to execute.
    async fn pending_height(&self) -> Result<u64, WorkerError> {
        Ok(match self.ctx.store.get_latest_block().await? {
            Some(tip) => tip.height + 1,
            None => self.start_height,
        })
    }

    /// Compares the local tip with the Bitcoin chain.
    pub async fn poll_chain(&self) -> Result<PollAction, WorkerError> {
        let l1_tip = self.ctx.reader.get_block_count().await?;

        let Some(local) = self.ctx.store.get_latest_block().await? else {
            return Ok(if l1_tip >= self.start_height {
                PollAction::Extend { l1_tip }
            } else {
                PollAction::Noop
            });
        };

        if local.height > l1_tip {
            warn!(
                local = local.height,
                l1 = l1_tip,
                "chain shrank below local tip"
            );
            return Ok(PollAction::Reorg);
        }

        let chain_hash = self.ctx.reader.get_block_hash(local.height).await?;
        if chain_hash != local.hash {
            warn!(height = local.height, "tip hash mismatch");
            return Ok(PollAction::Reorg);
        }

        Ok(if l1_tip > local.height {
            PollAction::Extend { l1_tip }
        } else {
            PollAction::Noop
        })
    }

    /// One scheduler iteration: poll, then either extend or reorg.
    pub async fn run_cycle(&mut self) -> Result<(), WorkerError> {
        match self.poll_chain().await? {
            PollAction::Extend { l1_tip } => {
                self.fill_prefetch_window(l1_tip).await?;
                if let Err(e) = self.process_ready().await {
                    self.handle_process_failure(&e).await?;
                    return Err(e);
                }
                Ok(())
            }
            PollAction::Reorg => {
                handle_reorg(
                    &self.ctx,
                    &mut self.tasks,
                    &self.cancel,
                    &mut self.chain_reorged,
                    self.task_in_progress,
                )
                .await
            }
            PollAction::Noop => Ok(()),
        }
    }

    /// Spawns concurrent prefetches for every free slot of the window.
    async fn fill_prefetch_window(&mut self, l1_tip: u64) -> Result<(), WorkerError> {
        let next = self.pending_height().await?;
        let window_end = l1_tip.min(next + self.ctx.config.prefetch_depth as u64 - 1);

        let missing: Vec<u64> = (next..=window_end)
            .filter(|height| !self.tasks.contains_key(height))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        for &height in &missing {
            let mut task = IndexingTask::new(height);
            task.state = TaskState::Prefetching;
            self.tasks.insert(height, task);
        }

        let fetches = missing.iter().map(|&height| {
            let ctx = &self.ctx;
            let cancel = self.cancel.clone();
            async move {
                (
                    height,
                    prefetch_block(
                        ctx.reader.as_ref(),
                        &ctx.params,
                        ctx.network,
                        height,
                        &cancel,
                    )
                    .await,
                )
            }
        });

        for (height, result) in join_all(fetches).await {
            let task = self.tasks.get_mut(&height).expect("slot reserved above");
            match result {
                Ok(prepared) => {
                    task.prepared = Some(prepared);
                    task.state = TaskState::Ready;
                }
                Err(e) => {
                    debug!(%height, error = %e, "prefetch failed, will retry");
                    self.tasks.remove(&height);
                }
            }
        }

        Ok(())
    }

    /// Drains ready tasks in height order.
    async fn process_ready(&mut self) -> Result<(), WorkerError> {
        loop {
            let next = self.pending_height().await?;

            let Some(task) = self.tasks.get(&next) else {
                return Ok(());
            };
            if !task.is_ready() {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            self.execute_task(next).await?;
        }
    }

    /// Executes and commits exactly one block.
    async fn execute_task(&mut self, height: u64) -> Result<(), WorkerError> {
        assert!(
            !self.task_in_progress,
            "two indexing tasks entered execution"
        );
        self.task_in_progress = true;
        let result = self.execute_task_inner(height).await;
        self.task_in_progress = false;
        result
    }

    async fn execute_task_inner(&mut self, height: u64) -> Result<(), WorkerError> {
        let mut task = self.tasks.remove(&height).expect("caller checked readiness");
        task.state = TaskState::Executing;
        let prepared = task.prepared.take().expect("ready task has a block");

        let prev_header = self.ctx.store.get_latest_block().await?;
        if let Some(prev) = &prev_header {
            if prepared.raw.prev_hash != prev.hash {
                // stale prefetch: the chain moved under us; the next poll
                // will classify this as a reorg or refetch the block
                warn!(%height, "prefetched block does not extend local tip");
                return Ok(());
            }
        }

        let executed = self
            .ctx
            .executor
            .execute_block(
                height,
                prepared.raw.hash,
                prepared.raw.prev_hash,
                prepared.raw.merkle_root,
                prepared.transactions,
                prev_header.as_ref(),
            )
            .await?;

        let checksum_root = self
            .ctx
            .store
            .commit_block(executed.header, executed.writes)
            .await?;

        info!(%height, %checksum_root, "block committed");
        task.state = TaskState::Done;

        // a window boundary seeds the next epoch's target
        if height % self.ctx.params.blocks_per_epoch == 0 {
            let epoch_number = height / self.ctx.params.blocks_per_epoch + 1;
            let target = derive_epoch_target(epoch_number, checksum_root);
            self.ctx
                .store
                .put_epoch(
                    height,
                    Epoch {
                        epoch_number,
                        target: target.target,
                        target_hash: target.target_hash,
                        best: None,
                    },
                )
                .await?;
            debug!(epoch = epoch_number, "epoch target derived");
        }

        if let Some(window) = self.ctx.config.purge_spent_after {
            if let Some(cutoff) = height.checked_sub(window) {
                let purged = self.ctx.store.purge_spent_older_than(cutoff).await?;
                if purged > 0 {
                    debug!(%purged, %cutoff, "swept spent utxos");
                }
            }
        }

        self.ctx.notify_block_processed(height, checksum_root);
        Ok(())
    }

    /// Failure during execution: stop everything, step the store back one
    /// block, let the loop restart the pipeline. If a reorg is being
    /// handled concurrently the reorg path owns recovery.
    async fn handle_process_failure(&mut self, error: &WorkerError) -> Result<(), WorkerError> {
        error!(%error, "block processing failed, rewinding one block");
        if self.chain_reorged {
            return Ok(());
        }

        for task in self.tasks.values_mut() {
            task.cancel();
        }
        self.tasks.clear();

        self.ctx.store.kill_all_pending_writes().await?;
        if let Some(tip) = self.ctx.store.get_latest_block().await? {
            self.ctx.store.revert_until(tip.height).await?;
        }
        self.cancel.reset();
        Ok(())
    }
}

/// The worker loop. Recoverable errors are logged and retried on the next
/// cycle; fatal ones panic so the runtime shuts the node down.
pub async fn chain_worker_task(mut worker: ChainWorker) {
    let poll_wait = std::time::Duration::from_millis(worker.ctx.config.poll_wait_ms);

    if let Err(e) = worker.recover().await {
        panic!("startup recovery failed: {e}");
    }

    loop {
        tokio::time::sleep(poll_wait).await;

        if let Err(e) = worker.run_cycle().await {
            if e.is_fatal() {
                panic!("{e}");
            }
            error!(error = %e, "worker cycle failed");
        }
    }
}
