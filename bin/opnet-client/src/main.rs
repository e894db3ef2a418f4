//! OP_NET indexer node.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use argh::FromArgs;
use opnet_btcio::{ReaderClient, RetryPolicy};
use opnet_chain_worker::{chain_worker_task, ChainWorker, WorkerConfig, WorkerCtx, WorkerStatus};
use opnet_chainexec::BlockExecutor;
use opnet_common::{init_logging, LogFormat};
use opnet_config::{Config, TrustedAuthoritySet};
use opnet_db::{SledStateStore, StateStore};
use opnet_params::{ConsensusParams, NetworkParams};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(FromArgs)]
/// OP_NET Bitcoin L2 indexer.
struct Args {
    /// path to the node config file
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// emit logs as JSON
    #[argh(switch)]
    json_logs: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    init_logging(if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    let config = Config::load(&args.config).context("loading config")?;
    info!(network = %config.network, chain_id = config.chain_id, "starting opnet node");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let authorities = match &config.authorities {
        Some(path) => {
            let set = TrustedAuthoritySet::load(path).context("loading authority keyset")?;
            info!(validators = set.validator_count(), "trusted authorities loaded");
            Some(set)
        }
        None => {
            warn!("no trusted-authority keyset configured");
            None
        }
    };
    // the keyset feeds the p2p/plugin layers; the indexer itself only
    // verifies it loads cleanly
    drop(authorities);

    let params = ConsensusParams {
        chain_id: config.chain_id,
        ..ConsensusParams::default()
    };
    let network_params = NetworkParams::new(config.network, 0);
    let start_height = config.start_height(network_params.enabled_at_height);

    let store: Arc<SledStateStore> = Arc::new(
        SledStateStore::open(&config.datadir.join("state"))
            .map_err(|e| anyhow::anyhow!("opening state store: {e}"))?,
    );

    if config.sync.reindex {
        warn!(from = start_height, "reindex requested, dropping local state");
        store
            .revert_until(start_height)
            .await
            .map_err(|e| anyhow::anyhow!("reindex revert: {e}"))?;
    }

    let reader = Arc::new(
        ReaderClient::new(
            &config.bitcoind.rpc_url,
            &config.bitcoind.rpc_user,
            &config.bitcoind.rpc_password,
            RetryPolicy::default(),
        )
        .map_err(|e| anyhow::anyhow!("connecting to bitcoind: {e}"))?,
    );

    let executor = Arc::new(BlockExecutor::new(
        store.clone(),
        params.clone(),
        config.network,
    ));

    let (status_tx, mut status_rx) = watch::channel(WorkerStatus::default());

    let ctx = WorkerCtx {
        reader,
        store: store.clone(),
        executor,
        params: Arc::new(params),
        network: config.network,
        config: WorkerConfig {
            prefetch_depth: config.sync.maximum_prefetch_blocks,
            poll_wait_ms: config.sync.poll_interval_ms,
            max_reorg_depth: config.sync.max_reorg_depth,
            purge_spent_after: config.sync.purge_spent_utxo_older_than_blocks,
        },
        status_tx,
    };

    if config.sync.readonly_mode {
        info!("readonly mode: indexing disabled");
        tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        return Ok(());
    }

    let worker = ChainWorker::new(ctx, start_height);
    let worker_handle = tokio::spawn(chain_worker_task(worker));

    // surface progress at a human pace
    let progress = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(30)).await;
            if status_rx.changed().await.is_err() {
                break;
            }
            if let Some((height, root)) = status_rx.borrow_and_update().last_processed {
                info!(%height, checksum_root = %root, "chain progress");
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
        result = worker_handle => {
            // the worker only returns by panicking on a fatal error
            result.context("chain worker stopped")?;
        }
    }

    progress.abort();
    Ok(())
}
