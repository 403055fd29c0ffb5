//! Worker <-> coordinator RPC surface (`SPEC_FULL.md` §6). Two traits
//! split by call direction: `CoordinatorRpc` is served by the
//! coordinator and called by workers (node/stream registration);
//! `WorkerRpc` is served by workers and called by the coordinator
//! (query lifecycle and telemetry probing). Transport (tonic/gRPC or
//! otherwise) is left to the caller — these traits describe the method
//! surface only, consistent with the Non-goal excluding a concrete wire
//! protocol.

use crate::common::{QueryId, TopologyNodeId};
use crate::common::TerminationType;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNodeRequest {
    pub ip: String,
    pub rpc_port: u16,
    pub data_port: u16,
    pub resources: usize,
    pub node_stats: String,
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPhysicalStreamRequest {
    pub node_id: TopologyNodeId,
    pub source_type: String,
    pub physical_name: String,
    pub logical_name: String,
}

/// Methods the coordinator serves; workers are the callers.
#[async_trait]
pub trait CoordinatorRpc: Send + Sync {
    /// Returns the assigned node id, or `0` if the node already exists.
    async fn register_node(&self, req: RegisterNodeRequest) -> Result<TopologyNodeId>;
    async fn unregister_node(&self, node_id: TopologyNodeId) -> Result<bool>;

    async fn register_logical_stream(&self, name: String, schema_dsl: String) -> Result<bool>;
    async fn unregister_logical_stream(&self, name: String) -> Result<bool>;

    async fn register_physical_stream(&self, req: RegisterPhysicalStreamRequest) -> Result<bool>;
    async fn unregister_physical_stream(&self, node_id: TopologyNodeId, physical_name: String, logical_name: String) -> Result<bool>;
}

/// Methods each worker serves; the coordinator is the caller.
#[async_trait]
pub trait WorkerRpc: Send + Sync {
    /// Registers one serialized subplan; idempotent per subplan id.
    async fn register_query(&self, query_id: QueryId, sub_plan: Vec<u8>) -> Result<bool>;
    async fn start_query(&self, query_id: QueryId) -> Result<bool>;
    async fn stop_query(&self, query_id: QueryId, term_type: TerminationType) -> Result<bool>;
    async fn unregister_query(&self, query_id: QueryId) -> Result<bool>;
    /// Returns aggregatable telemetry samples for `stat_probe`.
    async fn probe_stat(&self, address: String, stat_probe: String) -> Result<Vec<f64>>;
}
