//! Phase 7 — origin-id inference (`SPEC_FULL.md` §4.11.7): assigns stable
//! origin ids to every source and every origin-generating operator
//! (window, join), so the multi-origin watermark processor downstream of
//! them knows how many distinct origins to wait on.

use crate::common::{OperatorId, OriginId};
use crate::plan::{OperatorKind, PhysicalPlan};
use std::collections::HashMap;

fn is_origin_generating(kind: &OperatorKind) -> bool {
    matches!(
        kind,
        OperatorKind::Source { .. } | OperatorKind::NetworkSource { .. } | OperatorKind::Window { .. } | OperatorKind::Join { .. }
    )
}

/// Assigns a dense, stable `OriginId` to every origin-generating operator
/// in `plan`, ascending by `OperatorId` so re-running inference over an
/// unchanged plan reproduces the same assignment. Writes the id into each
/// `PhysicalNode::origin_id` and also returns the mapping.
pub fn assign_origin_ids(plan: &mut PhysicalPlan) -> HashMap<OperatorId, OriginId> {
    let mut ids: Vec<OperatorId> = plan
        .nodes
        .values()
        .filter(|n| is_origin_generating(&n.kind))
        .map(|n| n.id)
        .collect();
    ids.sort_unstable();

    let mut assignment = HashMap::with_capacity(ids.len());
    for (origin_id, operator_id) in ids.into_iter().enumerate() {
        let origin_id = origin_id as OriginId;
        if let Some(node) = plan.node_mut(operator_id) {
            node.origin_id = Some(origin_id);
        }
        assignment.insert(operator_id, origin_id);
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Schema;
    use crate::plan::{MemoryLayoutKind, PhysicalNode};

    fn node(id: OperatorId, kind: OperatorKind, children: Vec<OperatorId>) -> PhysicalNode {
        PhysicalNode { id, kind, children, schema: Schema::default(), layout: MemoryLayoutKind::Row, placement: None, origin_id: None }
    }

    #[test]
    fn sources_and_windows_get_distinct_stable_ids() {
        let mut plan = PhysicalPlan::new();
        plan.insert(node(0, OperatorKind::Source { logical_name: "a".into() }, vec![]));
        plan.insert(node(1, OperatorKind::Filter { predicate: "x>1".into() }, vec![0]));
        plan.insert(node(
            2,
            OperatorKind::Window { size: 1000, slide: 1000, group_by: vec![], aggregate: "SUM(x)".into() },
            vec![1],
        ));

        let assignment = assign_origin_ids(&mut plan);
        assert_eq!(assignment.len(), 2);
        assert_ne!(assignment[&0], assignment[&2]);
        assert_eq!(plan.node(1).unwrap().origin_id, None);
        assert!(plan.node(0).unwrap().origin_id.is_some());
    }
}
