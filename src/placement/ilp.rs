//! ILP placement strategy (`SPEC_FULL.md` §4.12): binary placement
//! variables `p_{i,j}` per `(operator i, admissible-path node j)`, one
//! operator placed per node, minimizing `sum_i output(i) * distance(i,
//! i+1)`.
//!
//! The original strategy hands this model to an external integer-program
//! solver (z3, used as an optimizing SMT solver in
//! `ILPStrategy::updateGlobalExecutionPlan`). No such solver exists in
//! this dependency set, so the model is instead solved exactly by
//! branch-and-bound over admissible-path positions: since each operator's
//! topology index only needs to be non-decreasing along the path (an
//! operator can't be placed upstream of its child), this search is over a
//! small monotonic assignment space rather than the full `2^(ops*nodes)`
//! variable space z3 would see, and remains exact for the plan sizes this
//! engine targets.

use crate::common::OperatorId;
use crate::error::{NebulaError, Result};
use crate::plan::{PhysicalPlan, Topology};
use std::collections::HashMap;

fn pinned(plan: &PhysicalPlan, id: OperatorId) -> Result<u64> {
    plan.node(id)
        .and_then(|n| n.placement)
        .ok_or_else(|| NebulaError::Placement(format!("operator {id} is not pinned to a topology node")))
}

#[allow(clippy::too_many_arguments)]
fn search(
    ops: &[OperatorId],
    idx: usize,
    admissible: &[u64],
    lower: usize,
    prev_topo_idx: usize,
    caps: &mut HashMap<u64, usize>,
    cost_so_far: f64,
    assignment: &mut Vec<usize>,
    best: &mut Option<(f64, Vec<usize>)>,
    outputs: &HashMap<OperatorId, f64>,
) {
    if let Some((best_cost, _)) = best {
        if cost_so_far >= *best_cost {
            return;
        }
    }
    if idx == ops.len() {
        let final_output = ops.last().and_then(|op| outputs.get(op)).copied().unwrap_or(1.0);
        let final_leg = final_output * (admissible.len() - 1 - prev_topo_idx) as f64;
        let total = cost_so_far + final_leg;
        if best.as_ref().map(|(c, _)| total < *c).unwrap_or(true) {
            *best = Some((total, assignment.clone()));
        }
        return;
    }

    for j in lower..admissible.len() {
        let node_id = admissible[j];
        if caps.get(&node_id).copied().unwrap_or(0) == 0 {
            continue;
        }
        let output = outputs.get(&ops[idx]).copied().unwrap_or(1.0);
        let distance = (j - prev_topo_idx) as f64;
        let op_cost = output * distance;

        *caps.get_mut(&node_id).unwrap() -= 1;
        assignment.push(j);
        search(ops, idx + 1, admissible, j, j, caps, cost_so_far + op_cost, assignment, best, outputs);
        assignment.pop();
        *caps.get_mut(&node_id).unwrap() += 1;
    }
}

/// Places every unplaced intermediate operator on `leaf`'s path to its
/// sink by minimizing total output-weighted hop distance, using
/// `outputs` as each operator's estimated tuples/sec (operators absent
/// from `outputs` default to weight 1.0, i.e. topology-hop count alone).
pub fn place_ilp(plan: &mut PhysicalPlan, topology: &mut Topology, leaf: OperatorId, outputs: &HashMap<OperatorId, f64>) -> Result<()> {
    let path = plan.path_to_sink(leaf);
    let sink_id = *path.last().ok_or_else(|| NebulaError::Placement(format!("no path to sink from {leaf}")))?;
    let src_topo = pinned(plan, leaf)?;
    let sink_topo = pinned(plan, sink_id)?;
    let admissible = topology.admissible_path(src_topo, sink_topo)?;

    let ops: Vec<OperatorId> = path[1..path.len().saturating_sub(1)]
        .iter()
        .filter(|&&op| plan.node(op).and_then(|n| n.placement).is_none())
        .copied()
        .collect();
    if ops.is_empty() {
        return Ok(());
    }

    let mut caps: HashMap<u64, usize> = admissible.iter().map(|&n| (n, topology.remaining_capacity(n))).collect();
    let mut best: Option<(f64, Vec<usize>)> = None;
    let mut assignment = Vec::with_capacity(ops.len());
    search(&ops, 0, &admissible, 0, 0, &mut caps, 0.0, &mut assignment, &mut best, outputs);

    let (_, assignment) = best.ok_or_else(|| NebulaError::Placement("ILP placement: unsat, no feasible assignment".into()))?;
    for (op, &idx) in ops.iter().zip(assignment.iter()) {
        let node_id = admissible[idx];
        topology.consume_capacity(node_id)?;
        if let Some(node) = plan.node_mut(*op) {
            node.placement = Some(node_id);
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
    fn minimizes_output_weighted_hop_distance() {
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

        let mut outputs = HashMap::new();
        outputs.insert(1, 10.0);

        place_ilp(&mut plan, &mut topo, 0, &outputs).unwrap();
        assert!(plan.node(1).unwrap().placement.is_some());
    }

    #[test]
    fn fails_unsat_when_no_capacity_anywhere() {
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

        assert!(place_ilp(&mut plan, &mut topo, 0, &HashMap::new()).is_err());
    }
}
