//! Phase 1 — type inference (`SPEC_FULL.md` §4.11.1). Walks the plan
//! leaf-first, assigning a `Schema` to every node from its children's
//! schemas, failing with `TypeInference` on an unresolved field reference
//! or an operator that needs a field the child schema doesn't have.

use crate::common::{DataType, Field, OperatorId, Schema};
use crate::error::{NebulaError, Result};
use crate::plan::{LogicalPlan, OperatorKind};
use std::collections::HashMap;

/// Extracts bare identifiers from a predicate/expression string: runs of
/// alphanumeric/underscore characters that aren't purely numeric. Good
/// enough to catch unresolved field references without a real parser.
fn referenced_identifiers(expr: &str) -> Vec<String> {
    expr.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|tok| !tok.is_empty() && tok.chars().next().unwrap().is_alphabetic())
        .filter(|tok| !matches!(*tok, "AND" | "OR" | "NOT" | "true" | "false"))
        .map(str::to_string)
        .collect()
}

fn require_fields(schema: &Schema, expr: &str) -> Result<()> {
    for ident in referenced_identifiers(expr) {
        if schema.field(&ident).is_none() {
            return Err(NebulaError::TypeInference(format!("unresolved field reference '{ident}'")));
        }
    }
    Ok(())
}

/// Runs type inference over `plan` rooted at `root`, using `source_schemas`
/// to resolve each `Source` operator's logical stream name. Returns the
/// root's inferred schema.
pub fn infer_types(plan: &mut LogicalPlan, root: OperatorId, source_schemas: &HashMap<String, Schema>) -> Result<Schema> {
    let order = plan.post_order(root);
    let mut resolved: HashMap<OperatorId, Schema> = HashMap::new();

    for id in order {
        let kind = plan.node(id).expect("post_order only yields existing ids").kind.clone();
        let children: Vec<OperatorId> = plan.node(id).unwrap().children.clone();
        let schema = infer_node_schema(&kind, &children, &resolved, source_schemas)?;
        if let Some(node) = plan.node_mut(id) {
            node.schema = Some(schema.clone());
        }
        resolved.insert(id, schema);
    }

    resolved
        .remove(&root)
        .ok_or_else(|| NebulaError::TypeInference(format!("operator {root} not present in plan")))
}

fn infer_node_schema(
    kind: &OperatorKind,
    children: &[OperatorId],
    resolved: &HashMap<OperatorId, Schema>,
    source_schemas: &HashMap<String, Schema>,
) -> Result<Schema> {
    let child_schema = |idx: usize| -> Result<&Schema> {
        let id = children
            .get(idx)
            .ok_or_else(|| NebulaError::TypeInference("operator is missing an expected child".into()))?;
        resolved
            .get(id)
            .ok_or_else(|| NebulaError::TypeInference(format!("child {id} was not resolved before its parent")))
    };

    match kind {
        OperatorKind::Source { logical_name } => source_schemas
            .get(logical_name)
            .cloned()
            .ok_or_else(|| NebulaError::TypeInference(format!("no schema registered for logical stream '{logical_name}'"))),

        OperatorKind::Filter { predicate } => {
            let schema = child_schema(0)?;
            require_fields(schema, predicate)?;
            Ok(schema.clone())
        }

        OperatorKind::Map { expression, output_field } => {
            let schema = child_schema(0)?;
            require_fields(schema, expression)?;
            let mut fields = schema.fields.clone();
            let inferred_type = schema.field(expression.trim()).map(|f| f.data_type).unwrap_or(DataType::Int64);
            fields.retain(|f| f.name != *output_field);
            fields.push(Field::new(output_field.clone(), inferred_type));
            Ok(Schema::new(fields))
        }

        OperatorKind::Projection { fields: wanted } => {
            let schema = child_schema(0)?;
            let mut fields = Vec::with_capacity(wanted.len());
            for name in wanted {
                let field = schema
                    .field(name)
                    .ok_or_else(|| NebulaError::TypeInference(format!("unresolved projected field '{name}'")))?;
                fields.push(field.clone());
            }
            Ok(Schema::new(fields))
        }

        OperatorKind::Window { group_by, .. } => {
            let schema = child_schema(0)?;
            let mut fields = Vec::new();
            for name in group_by {
                let field = schema
                    .field(name)
                    .ok_or_else(|| NebulaError::TypeInference(format!("unresolved group-by field '{name}'")))?;
                fields.push(field.clone());
            }
            fields.push(Field::new("start", DataType::Int64));
            fields.push(Field::new("end", DataType::Int64));
            fields.push(Field::new("aggregate_result", DataType::Int64));
            Ok(Schema::new(fields))
        }

        OperatorKind::Join { left_key, right_key, .. } => {
            let left = child_schema(0)?;
            let right = child_schema(1)?;
            if left.field(left_key).is_none() {
                return Err(NebulaError::TypeInference(format!("join left key '{left_key}' not found in left schema")));
            }
            if right.field(right_key).is_none() {
                return Err(NebulaError::TypeInference(format!("join right key '{right_key}' not found in right schema")));
            }
            Ok(left.joined_with(right))
        }

        OperatorKind::Union => {
            let mut iter = children.iter();
            let first_id = iter
                .next()
                .ok_or_else(|| NebulaError::TypeInference("union has no children".into()))?;
            let first = resolved
                .get(first_id)
                .ok_or_else(|| NebulaError::TypeInference(format!("child {first_id} was not resolved before its parent")))?;
            for id in iter {
                let other = resolved
                    .get(id)
                    .ok_or_else(|| NebulaError::TypeInference(format!("child {id} was not resolved before its parent")))?;
                if other != first {
                    return Err(NebulaError::TypeInference("union branches have incompatible schemas".into()));
                }
            }
            Ok(first.clone())
        }

        OperatorKind::NetworkSource { .. } => child_schema(0).cloned().or_else(|_| Ok(Schema::default())),
        OperatorKind::NetworkSink { .. } | OperatorKind::Sink { .. } => child_schema(0).cloned(),
    }
}
