//! Reorg watchdog: fork-point search and the coordinated revert.
//!
//! This module is the only caller of `revert_until`. The sequence is fixed:
//! flag the reorg, cancel tasks, quiesce, kill pending writes, revert,
//! record, reset, unflag.

use std::collections::BTreeMap;

use opnet_common::CancellationFlag;
use opnet_state::ReorgRecord;
use tracing::{info, warn};

use crate::{ctx::WorkerCtx, task::IndexingTask, WorkerError};

/// Walks back from the local tip until the store and the chain agree.
/// Returns the first height to revert (one above the common ancestor).
pub(crate) async fn find_fork_height(ctx: &WorkerCtx) -> Result<u64, WorkerError> {
    let Some(local_tip) = ctx.store.get_latest_block().await? else {
        return Ok(0);
    };

    let l1_tip = ctx.reader.get_block_count().await?;
    let floor = local_tip.height.saturating_sub(ctx.config.max_reorg_depth);
    let mut height = local_tip.height.min(l1_tip);

    while height >= floor {
        if let Some(header) = ctx.store.get_block_header(height).await? {
            if ctx.reader.get_block_hash(height).await? == header.hash {
                return Ok(height + 1);
            }
        }
        if height == 0 {
            // diverged all the way down: everything local is stale
            return Ok(0);
        }
        height -= 1;
    }

    if floor == 0 {
        return Ok(0);
    }
    Err(WorkerError::NoForkPoint { floor })
}

/// Runs the full reorg sequence against the store.
pub(crate) async fn handle_reorg(
    ctx: &WorkerCtx,
    tasks: &mut BTreeMap<u64, IndexingTask>,
    cancel: &CancellationFlag,
    chain_reorged: &mut bool,
    task_in_progress: bool,
) -> Result<(), WorkerError> {
    assert!(
        !task_in_progress,
        "reorg handling entered while a task was executing"
    );

    *chain_reorged = true;
    cancel.cancel();
    for task in tasks.values_mut() {
        task.cancel();
    }
    tasks.clear();

    let old_tip = ctx
        .store
        .get_latest_block()
        .await?
        .map(|h| h.height)
        .unwrap_or(0);

    let from_height = find_fork_height(ctx).await?;

    ctx.store.kill_all_pending_writes().await?;
    ctx.store.revert_until(from_height).await?;

    if from_height <= old_tip {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        ctx.store
            .record_reorg(ReorgRecord {
                from_block: from_height,
                to_block: old_tip,
                timestamp,
            })
            .await?;
        info!(from = from_height, to = old_tip, "reorg handled");
    } else {
        warn!("reorg signalled but no blocks needed reverting");
    }

    *chain_reorged = false;
    cancel.reset();
    Ok(())
}
