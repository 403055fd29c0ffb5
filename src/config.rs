//! Process configuration, mirroring `rusty_db::Config`: a `Default` plus a
//! best-effort TOML overlay loaded from `--coordinator-config` /
//! `--worker-config` (`SPEC_FULL.md` §1, §6).

use crate::error::{NebulaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Coordinator-side configuration: RPC/REST listen ports and deployment
/// timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub rpc_port: u16,
    pub rest_port: u16,
    pub rpc_retry_budget: u32,
    pub rpc_retry_wait: Duration,
    pub deploy_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rpc_port: 4000,
            rest_port: 8081,
            rpc_retry_budget: 5,
            rpc_retry_wait: Duration::from_millis(200),
            deploy_timeout: Duration::from_secs(30),
        }
    }
}

impl CoordinatorConfig {
    /// Load overrides from a YAML/TOML file, falling back to defaults when
    /// the file does not exist. A malformed file is a configuration error.
    pub fn load_overlay(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)?;
        let overlay: CoordinatorConfig = toml::from_str(&text)?;
        config = overlay;
        Ok(config)
    }
}

/// Worker-side configuration: buffer pool sizing and thread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub node_id: u64,
    pub num_worker_threads: usize,
    pub buffer_size: usize,
    pub number_of_buffers: usize,
    pub number_of_buffers_per_worker: usize,
    pub data_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            num_worker_threads: num_cpus(),
            buffer_size: 4096,
            number_of_buffers: 1024,
            number_of_buffers_per_worker: 32,
            data_port: 5432,
        }
    }
}

impl WorkerConfig {
    pub fn load_overlay(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(NebulaError::from)
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
