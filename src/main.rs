use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use idmaker::allocator::WorkerIdAllocator;
use idmaker::config::{AppConfig, LoggingCfg};
use idmaker::coord::memory::MemoryCluster;
use idmaker::coord::pool::SessionPool;
use idmaker::coord::Connector;
use idmaker::{monitor, Error, Worker};

#[derive(Parser, Debug)]
#[command(name = "idmaker")]
struct Cli {
    /// Path to YAML config
    #[arg(short, long, default_value = "conf/conf.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::load(&cli.config)?;
    init_logging(&cfg.logging);
    cfg.validate()?;

    // Deployments wire their coordination client in here; the bundled
    // backend keeps the namespace in-process.
    let connector: Arc<dyn Connector> = Arc::new(MemoryCluster::new());
    tracing::info!(servers = ?cfg.coordination.servers, "using in-process coordination backend");

    let pool = Arc::new(SessionPool::new(
        connector,
        cfg.coordination.servers.clone(),
        cfg.coordination.timeouts(),
    ));
    let allocator = Arc::new(WorkerIdAllocator::with_policy(
        pool,
        cfg.allocator.max_attempts,
        cfg.allocator.retry_backoff(),
    ));

    let worker_id = allocator.claim()?;
    let worker = Worker::builder()
        .worker_id(worker_id)
        .data_center_id(cfg.data_center_id)
        .finalize()?;
    let sample = worker.next_id()?;
    tracing::info!(
        worker_id,
        data_center_id = cfg.data_center_id,
        sample,
        "worker ready"
    );

    // Background tasks report non-fatal failures through this channel;
    // the monitor logs them and keeps the process alive.
    let (_background_errors, errors_rx) = mpsc::channel::<Error>(3);

    monitor::run(errors_rx, allocator, worker_id).await;
    Ok(())
}

fn init_logging(cfg: &LoggingCfg) {
    // RUST_LOG takes precedence over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
