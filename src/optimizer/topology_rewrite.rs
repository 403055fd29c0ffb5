//! Phase 5 — topology-aware rewrite (`SPEC_FULL.md` §4.11.5): expands a
//! logical `Source` into a `Union` over one `Source` per physical stream
//! when more than one physical source backs that logical stream.

use crate::common::OperatorId;
use crate::plan::{LogicalPlan, OperatorKind};
use std::collections::HashMap;

/// Replaces every `Source { logical_name }` in `plan` whose name has more
/// than one entry in `physical_sources` with a `Union` over one `Source`
/// per physical stream name. The union reuses the original source's id
/// (so parent references and `sink_roots` stay valid); the per-physical
/// sources are freshly allocated children.
///
/// A logical name with zero or one physical source is left untouched —
/// nothing downstream needs to observe a union of one.
pub fn expand_sources(plan: &mut LogicalPlan, physical_sources: &HashMap<String, Vec<String>>) {
    let source_ids: Vec<OperatorId> = plan
        .nodes()
        .filter(|n| matches!(n.kind, OperatorKind::Source { .. }))
        .map(|n| n.id)
        .collect();

    for id in source_ids {
        let logical_name = match &plan.node(id).unwrap().kind {
            OperatorKind::Source { logical_name } => logical_name.clone(),
            _ => unreachable!(),
        };
        let physicals = physical_sources.get(&logical_name).cloned().unwrap_or_default();
        if physicals.len() <= 1 {
            continue;
        }

        let schema = plan.node(id).unwrap().schema.clone();
        let children: Vec<OperatorId> = physicals
            .into_iter()
            .map(|phys_name| plan.add_node(OperatorKind::Source { logical_name: phys_name }, vec![], schema.clone()))
            .collect();

        if let Some(node) = plan.node_mut(id) {
            node.kind = OperatorKind::Union;
            node.children = children;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_physical_source_is_left_alone() {
        let mut plan = LogicalPlan::new();
        let src = plan.add_node(OperatorKind::Source { logical_name: "orders".into() }, vec![], None);
        let mut physical = HashMap::new();
        physical.insert("orders".to_string(), vec!["orders-node-1".to_string()]);
        expand_sources(&mut plan, &physical);
        assert!(matches!(plan.node(src).unwrap().kind, OperatorKind::Source { .. }));
    }

    #[test]
    fn multiple_physical_sources_expand_into_a_union() {
        let mut plan = LogicalPlan::new();
        let src = plan.add_node(OperatorKind::Source { logical_name: "orders".into() }, vec![], None);
        let mut physical = HashMap::new();
        physical.insert("orders".to_string(), vec!["orders-node-1".into(), "orders-node-2".into()]);
        expand_sources(&mut plan, &physical);

        let node = plan.node(src).unwrap();
        assert!(matches!(node.kind, OperatorKind::Union));
        assert_eq!(node.children.len(), 2);
        for &child in &node.children {
            assert!(matches!(plan.node(child).unwrap().kind, OperatorKind::Source { .. }));
        }
    }
}
