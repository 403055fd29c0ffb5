//! Deploy/undeploy orchestration (`SPEC_FULL.md` §4.14): per-node RPC
//! fan-out with a completion barrier, any single failure failing the
//! whole step.

use super::rpc::WorkerRpc;
use crate::common::{QueryId, TerminationType, TopologyNodeId};
use crate::decomposition::Subplan;
use crate::error::{NebulaError, Result};
use crate::plan::{OperatorKind, Topology};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

pub type WorkerClients = HashMap<TopologyNodeId, Arc<dyn WorkerRpc>>;

async fn await_all_ok(mut set: JoinSet<(TopologyNodeId, Result<bool>)>, step: &'static str) -> Result<()> {
    while let Some(joined) = set.join_next().await {
        let (node_id, result) = joined.map_err(|e| NebulaError::Rpc(format!("{step} task panicked: {e}")))?;
        match result {
            Ok(true) => {}
            Ok(false) => return Err(NebulaError::Rpc(format!("{step} rejected by node {node_id}"))),
            Err(e) => {
                error!(node_id, step, error = %e, "rpc step failed");
                return Err(e);
            }
        }
    }
    Ok(())
}

fn client_for(clients: &WorkerClients, node_id: TopologyNodeId) -> Result<Arc<dyn WorkerRpc>> {
    clients
        .get(&node_id)
        .cloned()
        .ok_or_else(|| NebulaError::Rpc(format!("no worker client registered for node {node_id}")))
}

/// Step 1: serialize each subplan and issue `registerQuery`, collecting
/// into a per-node completion queue; any failure fails the deployment.
async fn register_on_every_node(query_id: QueryId, subplans: &[Subplan], clients: &WorkerClients) -> Result<()> {
    let mut set = JoinSet::new();
    for sp in subplans {
        let client = client_for(clients, sp.node_id)?;
        let payload = bincode::serde::encode_to_vec(&sp.plan, bincode::config::standard())
            .map_err(|e| NebulaError::Serialization(e.to_string()))?;
        let node_id = sp.node_id;
        set.spawn(async move { (node_id, client.register_query(query_id, payload).await) });
    }
    await_all_ok(set, "registerQuery").await
}

/// Step 3: issue `startQuery` identically across every node that just
/// registered.
async fn start_on_every_node(query_id: QueryId, subplans: &[Subplan], clients: &WorkerClients) -> Result<()> {
    let mut set = JoinSet::new();
    for sp in subplans {
        let client = client_for(clients, sp.node_id)?;
        set.spawn(async move { (sp.node_id, client.start_query(query_id).await) });
    }
    await_all_ok(set, "startQuery").await
}

/// Deploys `query_id`'s already-decomposed subplans: register everywhere,
/// wait, start everywhere, wait. The caller marks the catalog entry
/// `Running` only after this returns `Ok`.
pub async fn deploy_query(query_id: QueryId, subplans: &[Subplan], clients: &WorkerClients) -> Result<()> {
    register_on_every_node(query_id, subplans, clients).await?;
    start_on_every_node(query_id, subplans, clients).await?;
    info!(query_id, node_count = subplans.len(), "query deployed");
    Ok(())
}

async fn stop_on_every_node(query_id: QueryId, subplans: &[Subplan], clients: &WorkerClients, term_type: TerminationType) -> Result<()> {
    let mut set = JoinSet::new();
    for sp in subplans {
        let client = client_for(clients, sp.node_id)?;
        set.spawn(async move { (sp.node_id, client.stop_query(query_id, term_type).await) });
    }
    await_all_ok(set, "stopQuery").await
}

async fn unregister_on_every_node(query_id: QueryId, subplans: &[Subplan], clients: &WorkerClients) -> Result<()> {
    let mut set = JoinSet::new();
    for sp in subplans {
        let client = client_for(clients, sp.node_id)?;
        set.spawn(async move { (sp.node_id, client.unregister_query(query_id).await) });
    }
    await_all_ok(set, "unregisterQuery").await
}

/// Only network bridges are exempt from capacity release: sources/sinks
/// are pre-pinned outside placement, and decomposition's synthetic
/// network operators never consumed topology capacity in the first
/// place, so releasing for them would over-credit the node.
fn releases_capacity(kind: &OperatorKind) -> bool {
    !matches!(
        kind,
        OperatorKind::Source { .. } | OperatorKind::Sink { .. } | OperatorKind::NetworkSource { .. } | OperatorKind::NetworkSink { .. }
    )
}

/// Undeploys `query_id`: stop everywhere, wait, unregister everywhere,
/// wait, then release every unit of topology capacity this query's
/// placement consumed.
pub async fn undeploy_query(
    query_id: QueryId,
    subplans: &[Subplan],
    clients: &WorkerClients,
    term_type: TerminationType,
    topology: &mut Topology,
) -> Result<()> {
    stop_on_every_node(query_id, subplans, clients, term_type).await?;
    unregister_on_every_node(query_id, subplans, clients).await?;

    for sp in subplans {
        for node in sp.plan.nodes.values() {
            if releases_capacity(&node.kind) {
                topology.release_capacity(sp.node_id);
            }
        }
    }
    info!(query_id, "query undeployed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Schema;
    use crate::plan::{MemoryLayoutKind, PhysicalNode, PhysicalPlan};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeWorker {
        registered: AtomicUsize,
        should_fail: bool,
    }

    #[async_trait]
    impl WorkerRpc for FakeWorker {
        async fn register_query(&self, _query_id: QueryId, _sub_plan: Vec<u8>) -> Result<bool> {
            self.registered.fetch_add(1, Ordering::SeqCst);
            Ok(!self.should_fail)
        }
        async fn start_query(&self, _query_id: QueryId) -> Result<bool> {
            Ok(!self.should_fail)
        }
        async fn stop_query(&self, _query_id: QueryId, _term_type: TerminationType) -> Result<bool> {
            Ok(true)
        }
        async fn unregister_query(&self, _query_id: QueryId) -> Result<bool> {
            Ok(true)
        }
        async fn probe_stat(&self, _address: String, _stat_probe: String) -> Result<Vec<f64>> {
            Ok(vec![])
        }
    }

    fn one_node_subplan(node_id: TopologyNodeId) -> Subplan {
        let mut plan = PhysicalPlan::new();
        plan.insert(PhysicalNode {
            id: 0,
            kind: OperatorKind::Source { logical_name: "s".into() },
            children: vec![],
            schema: Schema::default(),
            layout: MemoryLayoutKind::Row,
            placement: Some(node_id),
            origin_id: None,
        });
        Subplan { node_id, plan }
    }

    #[tokio::test]
    async fn deploy_succeeds_when_every_node_accepts() {
        let mut clients: WorkerClients = HashMap::new();
        clients.insert(1, Arc::new(FakeWorker { registered: AtomicUsize::new(0), should_fail: false }));
        let subplans = vec![one_node_subplan(1)];
        assert!(deploy_query(42, &subplans, &clients).await.is_ok());
    }

    #[tokio::test]
    async fn deploy_fails_when_any_node_rejects() {
        let mut clients: WorkerClients = HashMap::new();
        clients.insert(1, Arc::new(FakeWorker { registered: AtomicUsize::new(0), should_fail: true }));
        let subplans = vec![one_node_subplan(1)];
        assert!(deploy_query(42, &subplans, &clients).await.is_err());
    }
}
