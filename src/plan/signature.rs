use super::logical::{LogicalPlan, OperatorKind};
use crate::common::OperatorId;

/// Computes a signature bottom-up (`SPEC_FULL.md` §4.10):
///   - leaf (source): `SRC(name)`;
///   - unary: `OP_TYPE(params).childSig`;
///   - binary (join/union): `OP_TYPE(params).(leftSig).(rightSig)`.
///
/// `normalize_commutative` selects the semantic flavor, which canonicalizes
/// commutative structure (conjunct ordering in a filter predicate) so that
/// two plans equivalent only up to that reordering produce the same
/// signature; the textual flavor is the literal, order-sensitive string.
pub fn compute_signature(plan: &LogicalPlan, root: OperatorId, normalize_commutative: bool) -> String {
    let Some(node) = plan.node(root) else {
        return String::new();
    };
    let own = node.kind.type_name_and_params(normalize_commutative);
    match node.children.as_slice() {
        [] => own,
        [child] => format!("{own}.{}", compute_signature(plan, *child, normalize_commutative)),
        children if node.kind.is_binary() && children.len() == 2 => {
            let left = compute_signature(plan, children[0], normalize_commutative);
            let right = compute_signature(plan, children[1], normalize_commutative);
            format!("{own}.({left}).({right})")
        }
        children => {
            let joined = children
                .iter()
                .map(|c| compute_signature(plan, *c, normalize_commutative))
                .collect::<Vec<_>>()
                .join(",");
            format!("{own}.[{joined}]")
        }
    }
}

pub fn textual_signature(plan: &LogicalPlan, root: OperatorId) -> String {
    compute_signature(plan, root, false)
}

pub fn semantic_signature(plan: &LogicalPlan, root: OperatorId) -> String {
    compute_signature(plan, root, true)
}
