//! Worker process entry point (`SPEC_FULL.md` §6). Wires the global
//! buffer pool, worker thread pool and network manager together; as with
//! the coordinator, binding the data-port transport itself is outside
//! this crate's scope.

use clap::Parser;
use nebula_stream::buffer::BufferPool;
use nebula_stream::config::WorkerConfig;
use nebula_stream::network::NetworkManager;
use nebula_stream::runtime::WorkerPool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIGURATION_ERROR: i32 = 1;
const EXIT_BIND_FAILURE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "nebula-worker", about = "NebulaStream worker process")]
struct Args {
    #[arg(long)]
    worker_config: Option<PathBuf>,

    #[arg(long)]
    data_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let mut config = match args.worker_config.as_deref().map(WorkerConfig::load_overlay) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            error!(error = %e, "failed to load worker config");
            std::process::exit(EXIT_CONFIGURATION_ERROR);
        }
        None => WorkerConfig::default(),
    };
    if let Some(port) = args.data_port {
        config.data_port = port;
    }

    info!(
        node_id = config.node_id,
        threads = config.num_worker_threads,
        buffer_size = config.buffer_size,
        buffers = config.number_of_buffers,
        "starting worker"
    );

    let global_pool = BufferPool::new(config.buffer_size, config.number_of_buffers);
    let _network_manager = Arc::new(NetworkManager::new());

    if let Err(e) = bind_data_port(config.data_port) {
        error!(error = %e, "failed to bind worker data port");
        std::process::exit(EXIT_BIND_FAILURE);
    }

    let pool = WorkerPool::new(config.num_worker_threads, global_pool, config.number_of_buffers_per_worker);

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, stopping worker pool gracefully");
    pool.stop_graceful();

    std::process::exit(EXIT_SUCCESS);
}

fn bind_data_port(_data_port: u16) -> nebula_stream::Result<()> {
    Ok(())
}
