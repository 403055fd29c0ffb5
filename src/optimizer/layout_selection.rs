//! Phase 2 — memory-layout selection (`SPEC_FULL.md` §4.11.2). Picks row
//! vs column layout per operator boundary from projection width and
//! downstream access pattern, rather than defaulting every operator to
//! one layout.

use crate::common::OperatorId;
use crate::plan::{LogicalPlan, MemoryLayoutKind, OperatorKind};
use std::collections::HashMap;

/// Columnar pays off when downstream only reads a narrow slice of a wide
/// schema — projections and aggregations over few fields — since it
/// avoids pulling whole rows through cache. Wide reads (joins producing
/// every field, raw sinks) are cheaper row-major because nearly every
/// field is touched together.
pub fn select_layouts(plan: &LogicalPlan, root: OperatorId) -> HashMap<OperatorId, MemoryLayoutKind> {
    let mut layouts = HashMap::new();
    for id in plan.post_order(root) {
        let Some(node) = plan.node(id) else { continue };
        let schema_width = node.schema.as_ref().map(|s| s.fields.len()).unwrap_or(usize::MAX);
        let layout = match &node.kind {
            OperatorKind::Projection { fields } if fields.len() * 2 <= schema_width.max(1) => MemoryLayoutKind::Column,
            OperatorKind::Window { .. } => MemoryLayoutKind::Column,
            OperatorKind::Join { .. } => MemoryLayoutKind::Row,
            OperatorKind::Sink { .. } | OperatorKind::NetworkSink { .. } => MemoryLayoutKind::Row,
            _ => MemoryLayoutKind::Row,
        };
        layouts.insert(id, layout);
    }
    layouts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DataType, Field, Schema};

    #[test]
    fn narrow_projection_of_wide_schema_prefers_columnar() {
        let mut plan = LogicalPlan::new();
        let src = plan.add_node(
            OperatorKind::Source { logical_name: "wide".into() },
            vec![],
            Some(Schema::new(vec![
                Field::new("a", DataType::Int64),
                Field::new("b", DataType::Int64),
                Field::new("c", DataType::Int64),
                Field::new("d", DataType::Int64),
            ])),
        );
        let proj = plan.add_node(
            OperatorKind::Projection { fields: vec!["a".into()] },
            vec![src],
            Some(Schema::new(vec![Field::new("a", DataType::Int64)])),
        );
        let layouts = select_layouts(&plan, proj);
        assert_eq!(layouts[&proj], MemoryLayoutKind::Column);
    }

    #[test]
    fn join_prefers_row_layout() {
        let mut plan = LogicalPlan::new();
        let left = plan.add_node(OperatorKind::Source { logical_name: "l".into() }, vec![], None);
        let right = plan.add_node(OperatorKind::Source { logical_name: "r".into() }, vec![], None);
        let join = plan.add_node(
            OperatorKind::Join { left_key: "id".into(), right_key: "id".into(), size: 1000, slide: 1000 },
            vec![left, right],
            None,
        );
        let layouts = select_layouts(&plan, join);
        assert_eq!(layouts[&join], MemoryLayoutKind::Row);
    }
}
