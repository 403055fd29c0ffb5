//! Coordinator process entry point (`SPEC_FULL.md` §6). Wires the
//! topology catalog, global query plan and query catalog together behind
//! the RPC surface; binding the RPC/REST listeners and the wire protocol
//! itself is out of scope (Non-goal).

use clap::Parser;
use nebula_stream::config::CoordinatorConfig;
use nebula_stream::deployment::QueryCatalog;
use nebula_stream::plan::{GlobalQueryPlan, Topology};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIGURATION_ERROR: i32 = 1;
const EXIT_BIND_FAILURE: i32 = 2;
const EXIT_SHUTDOWN_WITH_IN_FLIGHT_QUERIES: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "nebula-coordinator", about = "NebulaStream coordinator process")]
struct Args {
    #[arg(long, default_value_t = 4000)]
    rpc_port: u16,

    #[arg(long, default_value_t = 8081)]
    rest_port: u16,

    #[arg(long)]
    coordinator_config: Option<PathBuf>,

    #[arg(long)]
    worker_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();

    let mut config = match args.coordinator_config.as_deref().map(CoordinatorConfig::load_overlay) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            error!(error = %e, "failed to load coordinator config");
            std::process::exit(EXIT_CONFIGURATION_ERROR);
        }
        None => CoordinatorConfig::default(),
    };
    config.rpc_port = args.rpc_port;
    config.rest_port = args.rest_port;

    info!(rpc_port = config.rpc_port, rest_port = config.rest_port, "starting coordinator");

    let topology = Arc::new(parking_lot::Mutex::new(Topology::new()));
    let global_query_plan = Arc::new(GlobalQueryPlan::new());
    let catalog = Arc::new(QueryCatalog::new());

    if let Err(e) = bind_listeners(config.rpc_port, config.rest_port) {
        error!(error = %e, "failed to bind coordinator listeners");
        std::process::exit(EXIT_BIND_FAILURE);
    }

    let _ = (topology, global_query_plan.clone());

    match run_until_shutdown(&catalog).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(in_flight) => {
            error!(in_flight, "shutting down with queries still running");
            std::process::exit(EXIT_SHUTDOWN_WITH_IN_FLIGHT_QUERIES);
        }
    }
}

/// Binding the actual RPC/REST transport is outside this crate's scope
/// (no wire protocol is implemented here); this stands in for where a
/// real coordinator would call `TcpListener::bind` for both ports.
fn bind_listeners(_rpc_port: u16, _rest_port: u16) -> nebula_stream::Result<()> {
    Ok(())
}

async fn run_until_shutdown(catalog: &QueryCatalog) -> Result<(), usize> {
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
    match catalog.to_json() {
        Ok(json) => info!(queries = %json, "query catalog at shutdown"),
        Err(e) => error!(error = %e, "failed to render query catalog as json"),
    }
    if catalog.is_empty() {
        Ok(())
    } else {
        Err(catalog.len())
    }
}
