//! Bottom-up placement strategy (`SPEC_FULL.md` §4.12): walks children
//! first, placing each operator at the first node along the admissible
//! path — from the child's topology node to the sink's — that still has
//! remaining capacity.

use crate::common::OperatorId;
use crate::error::{NebulaError, Result};
use crate::plan::{PhysicalPlan, Topology};

fn pinned(plan: &PhysicalPlan, id: OperatorId) -> Result<u64> {
    plan.node(id)
        .and_then(|n| n.placement)
        .ok_or_else(|| NebulaError::Placement(format!("operator {id} is not pinned to a topology node")))
}

/// Places every unplaced intermediate operator on the path from `leaf`
/// (a source, already pinned to its physical-source node) to its sink
/// (also already pinned). Binary operators (joins) are skipped here —
/// call [`super::lca::place_join`] for those once both children are
/// placed.
pub fn place_bottom_up(plan: &mut PhysicalPlan, topology: &mut Topology, leaf: OperatorId) -> Result<()> {
    let path = plan.path_to_sink(leaf);
    let sink_id = *path.last().ok_or_else(|| NebulaError::Placement(format!("no path to sink from {leaf}")))?;
    let src_topo = pinned(plan, leaf)?;
    let sink_topo = pinned(plan, sink_id)?;
    let admissible = topology.admissible_path(src_topo, sink_topo)?;

    let mut cursor = 0usize;
    for &op in &path[1..path.len().saturating_sub(1)] {
        if plan.node(op).and_then(|n| n.placement).is_some() {
            continue;
        }
        let mut placed = false;
        for idx in cursor..admissible.len() {
            let node_id = admissible[idx];
            if topology.remaining_capacity(node_id) > 0 {
                topology.consume_capacity(node_id)?;
                if let Some(node) = plan.node_mut(op) {
                    node.placement = Some(node_id);
                }
                cursor = idx;
                placed = true;
                break;
            }
        }
        if !placed {
            return Err(NebulaError::Placement(format!("no capacity along admissible path for operator {op}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Schema;
    use crate::plan::{MemoryLayoutKind, OperatorKind, PhysicalNode};

    fn node(id: OperatorId, kind: OperatorKind, children: Vec<OperatorId>, placement: Option<u64>) -> PhysicalNode {
        PhysicalNode { id, kind, children, schema: Schema::default(), layout: MemoryLayoutKind::Row, placement, origin_id: None }
    }

    #[test]
    fn places_intermediate_operators_along_the_path() {
        let mut topo = Topology::new();
        topo.add_node(1, 5);
        topo.add_node(2, 5);
        topo.add_node(3, 5);
        topo.add_link(1, 2);
        topo.add_link(2, 3);

        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "s".into() }, vec![], Some(1)));
        plan.insert(node(1, OperatorKind::Filter { predicate: "x>1".into() }, vec![0], None));
        plan.insert(node(2, OperatorKind::Sink { name: "out".into() }, vec![1], Some(3)));

        place_bottom_up(&mut plan, &mut topo, 0).unwrap();
        assert!(plan.node(1).unwrap().placement.is_some());
        assert!(topo.remaining_capacity(plan.node(1).unwrap().placement.unwrap()) < 5);
    }

    #[test]
    fn fails_when_no_capacity_on_the_path() {
        let mut topo = Topology::new();
        topo.add_node(1, 0);
        topo.add_node(2, 0);
        topo.add_node(3, 0);
        topo.add_link(1, 2);
        topo.add_link(2, 3);

        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "s".into() }, vec![], Some(1)));
        plan.insert(node(1, OperatorKind::Filter { predicate: "x>1".into() }, vec![0], None));
        plan.insert(node(2, OperatorKind::Sink { name: "out".into() }, vec![1], Some(3)));

        assert!(place_bottom_up(&mut plan, &mut topo, 0).is_err());
    }
}
