use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use backend_bitcoind::{BitcoindBackend, ReqwestClient, RpcClient};
use clap::Parser;
use log::{info, warn};
use spindex_core::store::fjall::FjallStore;
use spindex_core::{
    BlockPipeline, ChainBackend, ChainSync, Db, Error, OracleConfig, StateUpdater, TipPoller,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.oracle_config()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                cancel.cancel();
            }
        }
    });

    let store = Arc::new(
        FjallStore::open(&args.db_path)
            .with_context(|| format!("opening database at {}", args.db_path.display()))?,
    );
    let db = Db::new(store.clone());

    let http = ReqwestClient::with_timeout(Duration::from_secs(args.rpc_timeout))?;
    let rpc = RpcClient::new(args.rpc_url.clone(), &args.auth(), http)?;
    let backend: Arc<dyn ChainBackend> = Arc::new(BitcoindBackend::new(rpc));

    let result = run(&args, config, backend, db, &cancel).await;
    store.persist().context("flushing database")?;
    result
}

async fn run(
    args: &Args,
    config: OracleConfig,
    backend: Arc<dyn ChainBackend>,
    db: Db,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let updater = Arc::new(StateUpdater::new(db.clone(), config.clone()));
    if args.reindex_dust {
        let changed = updater.reindex_highest_values()?;
        info!("dust reindex updated {changed} tweaks");
    }

    let pipeline = BlockPipeline::new(
        backend.clone(),
        updater,
        db.clone(),
        config.max_parallel_requests,
        config.fetch_channel_capacity,
    );

    info!(
        "syncing from height {} against {}",
        config.sync_start_height, args.rpc_url
    );
    let sync = ChainSync::new(backend.clone(), db.clone(), pipeline.clone(), config.clone());
    match sync.sync_to_tip(cancel).await {
        Ok(applied) => info!("bulk sync done, {applied} blocks applied"),
        Err(Error::Cancelled) => {
            warn!("bulk sync interrupted");
            return Ok(());
        }
        Err(e) => return Err(e).context("bulk sync failed"),
    }

    if args.once {
        return Ok(());
    }

    TipPoller::new(backend, db, pipeline, config)
        .run(cancel)
        .await
        .context("tip poller stopped")
}
