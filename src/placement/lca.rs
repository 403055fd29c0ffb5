//! Binary-operator placement (`SPEC_FULL.md` §4.12): once both children
//! of a join are placed, the join itself goes on the first common
//! ancestor of their two admissible paths to the sink — closest to the
//! children first, falling back toward the sink if that node lacks
//! capacity.

use crate::common::OperatorId;
use crate::error::{NebulaError, Result};
use crate::plan::{PhysicalPlan, Topology};
use std::collections::HashSet;

fn pinned(plan: &PhysicalPlan, id: OperatorId) -> Result<u64> {
    plan.node(id)
        .and_then(|n| n.placement)
        .ok_or_else(|| NebulaError::Placement(format!("operator {id} is not pinned to a topology node")))
}

/// Places the join operator `join_id`, whose two children must already
/// be placed, at the first node common to both children's admissible
/// paths to the sink that still has remaining capacity.
pub fn place_join(plan: &mut PhysicalPlan, topology: &mut Topology, join_id: OperatorId) -> Result<()> {
    let node = plan
        .node(join_id)
        .ok_or_else(|| NebulaError::Placement(format!("join operator {join_id} not found")))?;
    let [left_child, right_child] = node.children.as_slice() else {
        return Err(NebulaError::Placement(format!("operator {join_id} is not a binary join")));
    };
    let (left_child, right_child) = (*left_child, *right_child);

    let sink_id = *plan.path_to_sink(join_id).last().unwrap();
    let left_topo = pinned(plan, left_child)?;
    let right_topo = pinned(plan, right_child)?;
    let sink_topo = pinned(plan, sink_id)?;

    let left_path = topology.admissible_path(left_topo, sink_topo)?;
    let right_path = topology.admissible_path(right_topo, sink_topo)?;
    let right_set: HashSet<u64> = right_path.into_iter().collect();

    for &node_id in &left_path {
        if right_set.contains(&node_id) && topology.remaining_capacity(node_id) > 0 {
            topology.consume_capacity(node_id)?;
            if let Some(node) = plan.node_mut(join_id) {
                node.placement = Some(node_id);
            }
            return Ok(());
        }
    }
    Err(NebulaError::Placement(format!(
        "no common ancestor with capacity found for join {join_id}"
    )))
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
    fn joins_on_the_lowest_common_ancestor() {
        // left: 10 -> 20 (sink); right: 11 -> 20; converge at node 20.
        let mut topo = Topology::new();
        topo.add_node(10, 5);
        topo.add_node(11, 5);
        topo.add_node(20, 5);
        topo.add_link(10, 20);
        topo.add_link(11, 20);

        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "l".into() }, vec![], Some(10)));
        plan.insert(node(1, OperatorKind::Source { logical_name: "r".into() }, vec![], Some(11)));
        plan.insert(node(
            2,
            OperatorKind::Join { left_key: "id".into(), right_key: "id".into(), size: 1000, slide: 1000 },
            vec![0, 1],
            None,
        ));
        plan.insert(node(3, OperatorKind::Sink { name: "out".into() }, vec![2], Some(20)));

        place_join(&mut plan, &mut topo, 2).unwrap();
        assert_eq!(plan.node(2).unwrap().placement, Some(20));
    }
}
