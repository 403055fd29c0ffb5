//! Phase 3 — query rewrite / canonicalization (`SPEC_FULL.md` §4.11.3):
//! predicate conjunct splitting, double-negation elimination, constant
//! folding, projection pruning and filter pushdown past map/projection.

use crate::common::OperatorId;
use crate::plan::{LogicalPlan, OperatorKind};
use std::collections::HashSet;

/// Splits a filter predicate on top-level `AND` into its conjuncts. Used
/// by signature normalization and by callers that want to re-combine a
/// predicate after folding each conjunct independently.
pub fn split_conjuncts(predicate: &str) -> Vec<String> {
    predicate.split(" AND ").map(|s| s.trim().to_string()).collect()
}

/// Collapses `NOT NOT x` / `NOT (NOT x)` down to `x`, one layer per call
/// (predicates in this plan representation are never deeply nested, so a
/// single pass is sufficient).
fn eliminate_double_negation(predicate: &str) -> String {
    let trimmed = predicate.trim();
    if let Some(inner) = trimmed.strip_prefix("NOT NOT ") {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed.strip_prefix("NOT (NOT ").and_then(|s| s.strip_suffix(')')) {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Folds a conjunct of the form `<int> <op> <int>` into its literal
/// boolean/arithmetic result where the operator is trivially decidable;
/// conjuncts referencing a field pass through unchanged.
fn fold_constants_in_conjunct(conjunct: &str) -> String {
    let tokens: Vec<&str> = conjunct.split_whitespace().collect();
    if let [lhs, op, rhs] = tokens.as_slice() {
        if let (Ok(l), Ok(r)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) {
            let result = match *op {
                ">" => Some(l > r),
                "<" => Some(l < r),
                ">=" => Some(l >= r),
                "<=" => Some(l <= r),
                "=" | "==" => Some(l == r),
                "!=" => Some(l != r),
                _ => None,
            };
            if let Some(b) = result {
                return b.to_string();
            }
        }
    }
    conjunct.to_string()
}

fn canonicalize_predicate(predicate: &str) -> String {
    split_conjuncts(predicate)
        .into_iter()
        .map(|c| fold_constants_in_conjunct(&eliminate_double_negation(&c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Rewrites every `Filter` predicate in place via
/// `canonicalize_predicate`. Pure text-level canonicalization; it does not
/// change plan shape.
pub fn canonicalize_predicates(plan: &mut LogicalPlan, root: OperatorId) {
    for id in plan.post_order(root) {
        if let Some(node) = plan.node_mut(id) {
            if let OperatorKind::Filter { predicate } = &mut node.kind {
                *predicate = canonicalize_predicate(predicate);
            }
        }
    }
}

fn identifiers_in(expr: &str) -> HashSet<String> {
    expr.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|tok| !tok.is_empty() && tok.chars().next().unwrap().is_alphabetic())
        .filter(|tok| !matches!(*tok, "AND" | "OR" | "NOT" | "true" | "false"))
        .map(str::to_string)
        .collect()
}

/// For every `Filter` directly above a `Map`/`Projection`, pushes the
/// filter below that operator when the filter doesn't need what the
/// operator produces: for `Map`, when the predicate doesn't reference the
/// map's `output_field`; for `Projection`, always, since a filter sitting
/// above a projection only ever references fields the projection already
/// passes through.
///
/// The swap keeps both node ids stable (only `kind`/`children` are
/// exchanged between them) so callers holding the filter's id as a parent
/// reference, or `sink_roots`, stay valid without a second rewrite pass.
pub fn pushdown_filters(plan: &mut LogicalPlan, root: OperatorId) {
    for id in plan.post_order(root) {
        let Some(filter_node) = plan.node(id) else { continue };
        let OperatorKind::Filter { predicate } = &filter_node.kind else { continue };
        let predicate = predicate.clone();
        let [child_id] = filter_node.children.as_slice() else { continue };
        let child_id = *child_id;

        let Some(child_node) = plan.node(child_id) else { continue };
        let can_push = match &child_node.kind {
            OperatorKind::Map { output_field, .. } => !identifiers_in(&predicate).contains(output_field),
            OperatorKind::Projection { .. } => true,
            _ => false,
        };
        if !can_push {
            continue;
        }

        let child_kind = child_node.kind.clone();
        let grandchildren = child_node.children.clone();

        if let Some(node) = plan.node_mut(id) {
            node.kind = child_kind;
            node.children = vec![child_id];
        }
        if let Some(node) = plan.node_mut(child_id) {
            node.kind = OperatorKind::Filter { predicate };
            node.children = grandchildren;
        }
    }
}

/// Restricts each `Projection`'s field list to fields actually referenced
/// by its ancestors (filters, maps, window group-bys, join keys) up to
/// the sink, dropping anything the projection would otherwise carry
/// needlessly downstream.
pub fn prune_projections(plan: &mut LogicalPlan, root: OperatorId) {
    let order = plan.post_order(root);
    let mut needed_by: std::collections::HashMap<OperatorId, HashSet<String>> = std::collections::HashMap::new();

    // Walk parent-before-children (reverse post-order) accumulating what
    // each node's parent needs from it, then prune on the way down.
    for &id in order.iter().rev() {
        let Some(node) = plan.node(id) else { continue };
        let mine_needed = needed_by.get(&id).cloned().unwrap_or_default();

        let child_requirements: HashSet<String> = match &node.kind {
            OperatorKind::Filter { predicate } => identifiers_in(predicate).into_iter().chain(mine_needed).collect(),
            OperatorKind::Map { expression, output_field } => {
                let mut reqs = identifiers_in(expression);
                reqs.extend(mine_needed.into_iter().filter(|f| f != output_field));
                reqs
            }
            OperatorKind::Window { group_by, .. } => group_by.iter().cloned().collect(),
            OperatorKind::Join { left_key, right_key, .. } => {
                let mut reqs = HashSet::new();
                reqs.insert(left_key.clone());
                reqs.insert(right_key.clone());
                reqs
            }
            OperatorKind::Projection { fields } => fields.iter().cloned().collect(),
            _ => mine_needed,
        };

        for &child in &node.children {
            needed_by.entry(child).or_default().extend(child_requirements.iter().cloned());
        }
    }

    for id in order {
        let needed = needed_by.get(&id).cloned();
        if let Some(node) = plan.node_mut(id) {
            if let OperatorKind::Projection { fields } = &mut node.kind {
                if let Some(needed) = needed {
                    if !needed.is_empty() {
                        fields.retain(|f| needed.contains(f));
                    }
                }
            }
        }
    }
}

/// Applies the full canonicalization sequence once, in the order a single
/// rewrite pass would: predicate canonicalization, pushdown, then
/// projection pruning (pruning last, since pushdown can move a filter
/// past a projection and change what's needed upstream of it).
pub fn rewrite(plan: &mut LogicalPlan, root: OperatorId) {
    canonicalize_predicates(plan, root);
    pushdown_filters(plan, root);
    prune_projections(plan, root);
}
