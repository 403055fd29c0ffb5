//! Decomposition (`SPEC_FULL.md` §4.13): splits a fully placed physical
//! plan into per-topology-node subplans, inserting a network bridge
//! (network sink on the upstream node, network source on the downstream
//! node) wherever a parent and child land on different nodes. When the
//! two nodes aren't directly linked, every intermediate node on the
//! topology's shortest path gets its own relay subplan.

use crate::common::{OperatorId, TopologyNodeId};
use crate::error::{NebulaError, Result};
use crate::plan::{MemoryLayoutKind, OperatorKind, PhysicalNode, PhysicalPlan, Topology};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

fn next_channel_id() -> u64 {
    NEXT_CHANNEL_ID.fetch_add(1, Ordering::SeqCst)
}

/// One subplan assigned to a single topology node: a connected operator
/// subgraph plus that node's id. The union of every subplan's operators
/// covers every operator of the original physical plan exactly once.
#[derive(Debug, Clone)]
pub struct Subplan {
    pub node_id: TopologyNodeId,
    pub plan: PhysicalPlan,
}

fn relay_schema(plan: &PhysicalPlan, op: OperatorId) -> crate::common::Schema {
    plan.node(op).map(|n| n.schema.clone()).unwrap_or_default()
}

/// Decomposes `plan` (every operator of which must already carry a
/// `placement`) into one subplan per distinct topology node, threading
/// relay subplans through `topology.shortest_path` where a parent/child
/// pair aren't directly linked.
pub fn decompose(plan: &PhysicalPlan, topology: &Topology) -> Result<Vec<Subplan>> {
    let mut subplans: HashMap<TopologyNodeId, PhysicalPlan> = HashMap::new();

    for node in plan.nodes.values() {
        let node_id = node
            .placement
            .ok_or_else(|| NebulaError::Placement(format!("operator {} has no placement; run a placement strategy first", node.id)))?;
        subplans.entry(node_id).or_default().insert(node.clone());
    }

    for node in plan.nodes.values() {
        let parent_id = match plan.parent_of(node.id) {
            Some(p) => p,
            None => continue,
        };
        let parent = plan.node(parent_id).expect("parent_of only returns existing ids");
        let (child_loc, parent_loc) = (
            node.placement.expect("checked above"),
            parent.placement.expect("checked above"),
        );
        if child_loc == parent_loc {
            continue;
        }

        let route = topology.shortest_path(child_loc, parent_loc).ok_or_else(|| {
            NebulaError::Placement(format!("no topology path between node {child_loc} and node {parent_loc}"))
        })?;
        bridge_route(&mut subplans, plan, node.id, parent_id, &route);
    }

    Ok(subplans.into_iter().map(|(node_id, plan)| Subplan { node_id, plan }).collect())
}

/// Inserts a network sink at `route[0]` (the child's node) addressed to a
/// network source at `route[1]`, and for every intermediate hop a relay
/// subplan (`network source` feeding a `network sink` toward the next
/// hop), ending with a network source on `route.last()` (the parent's
/// node) that replaces `child` as `parent`'s operand.
fn bridge_route(
    subplans: &mut HashMap<TopologyNodeId, PhysicalPlan>,
    original: &PhysicalPlan,
    child: OperatorId,
    parent: OperatorId,
    route: &[TopologyNodeId],
) {
    let schema = relay_schema(original, child);
    let mut channel = next_channel_id();

    // Upstream end: a network sink on route[0] consuming `child`'s output.
    let sink_id = synthetic_id();
    subplans.entry(route[0]).or_default().insert(PhysicalNode {
        id: sink_id,
        kind: OperatorKind::NetworkSink { channel },
        children: vec![child],
        schema: schema.clone(),
        layout: MemoryLayoutKind::Row,
        placement: Some(route[0]),
        origin_id: None,
    });

    let mut upstream_source_id = child;
    for window in route.windows(2).skip(1) {
        let relay_node = window[0];
        let source_id = synthetic_id();
        subplans.entry(relay_node).or_default().insert(PhysicalNode {
            id: source_id,
            kind: OperatorKind::NetworkSource { channel },
            children: vec![],
            schema: schema.clone(),
            layout: MemoryLayoutKind::Row,
            placement: Some(relay_node),
            origin_id: None,
        });
        let next_channel = next_channel_id();
        let relay_sink_id = synthetic_id();
        subplans.entry(relay_node).or_default().insert(PhysicalNode {
            id: relay_sink_id,
            kind: OperatorKind::NetworkSink { channel: next_channel },
            children: vec![source_id],
            schema: schema.clone(),
            layout: MemoryLayoutKind::Row,
            placement: Some(relay_node),
            origin_id: None,
        });
        channel = next_channel;
        upstream_source_id = source_id;
    }
    let _ = upstream_source_id;

    // Downstream end: a network source on route.last() that `parent` now
    // reads from in place of `child`.
    let final_node = *route.last().expect("route always has at least two elements");
    let final_source_id = synthetic_id();
    subplans.entry(final_node).or_default().insert(PhysicalNode {
        id: final_source_id,
        kind: OperatorKind::NetworkSource { channel },
        children: vec![],
        schema,
        layout: MemoryLayoutKind::Row,
        placement: Some(final_node),
        origin_id: None,
    });

    if let Some(final_plan) = subplans.get_mut(&final_node) {
        if let Some(parent_node) = final_plan.node_mut(parent) {
            parent_node.children = parent_node
                .children
                .iter()
                .map(|&c| if c == child { final_source_id } else { c })
                .collect();
        }
    }
}

static NEXT_SYNTHETIC_ID: AtomicU64 = AtomicU64::new(1_000_000_000);

fn synthetic_id() -> OperatorId {
    NEXT_SYNTHETIC_ID.fetch_add(1, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Schema;

    fn node(id: OperatorId, kind: OperatorKind, children: Vec<OperatorId>, placement: TopologyNodeId) -> PhysicalNode {
        PhysicalNode { id, kind, children, schema: Schema::default(), layout: MemoryLayoutKind::Row, placement: Some(placement), origin_id: None }
    }

    #[test]
    fn same_node_operators_stay_in_one_subplan() {
        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "s".into() }, vec![], 1));
        plan.insert(node(1, OperatorKind::Filter { predicate: "x>1".into() }, vec![0], 1));
        plan.insert(node(2, OperatorKind::Sink { name: "out".into() }, vec![1], 1));

        let mut topo = Topology::new();
        topo.add_node(1, 10);

        let subplans = decompose(&plan, &topo).unwrap();
        assert_eq!(subplans.len(), 1);
        assert_eq!(subplans[0].plan.nodes.len(), 3);
    }

    #[test]
    fn cross_node_edge_inserts_a_network_bridge() {
        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "s".into() }, vec![], 1));
        plan.insert(node(1, OperatorKind::Filter { predicate: "x>1".into() }, vec![0], 1));
        plan.insert(node(2, OperatorKind::Sink { name: "out".into() }, vec![1], 2));

        let mut topo = Topology::new();
        topo.add_node(1, 10);
        topo.add_node(2, 10);
        topo.add_link(1, 2);

        let subplans = decompose(&plan, &topo).unwrap();
        assert_eq!(subplans.len(), 2);

        let upstream = subplans.iter().find(|s| s.node_id == 1).unwrap();
        assert!(upstream.plan.nodes.values().any(|n| matches!(n.kind, OperatorKind::NetworkSink { .. })));

        let downstream = subplans.iter().find(|s| s.node_id == 2).unwrap();
        assert!(downstream.plan.nodes.values().any(|n| matches!(n.kind, OperatorKind::NetworkSource { .. })));
        let sink_node = downstream.plan.node(2).unwrap();
        assert!(!sink_node.children.contains(&1));
    }

    #[test]
    fn multi_hop_route_gets_a_relay_subplan_per_intermediate_node() {
        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "s".into() }, vec![], 1));
        plan.insert(node(1, OperatorKind::Filter { predicate: "x>1".into() }, vec![0], 1));
        plan.insert(node(2, OperatorKind::Sink { name: "out".into() }, vec![1], 3));

        let mut topo = Topology::new();
        topo.add_node(1, 10);
        topo.add_node(2, 10);
        topo.add_node(3, 10);
        topo.add_link(1, 2);
        topo.add_link(2, 3);

        let subplans = decompose(&plan, &topo).unwrap();
        assert_eq!(subplans.len(), 3);
        let relay = subplans.iter().find(|s| s.node_id == 2).unwrap();
        assert!(relay.plan.nodes.values().any(|n| matches!(n.kind, OperatorKind::NetworkSource { .. })));
        assert!(relay.plan.nodes.values().any(|n| matches!(n.kind, OperatorKind::NetworkSink { .. })));
    }
}
