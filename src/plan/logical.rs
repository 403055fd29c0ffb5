use crate::common::{OperatorId, Schema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operator kinds the logical plan can express. Kept as a tagged union
/// rather than a class hierarchy, per the re-architecture guidance of
/// `SPEC_FULL.md` §9.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OperatorKind {
    Source { logical_name: String },
    Filter { predicate: String },
    Map { expression: String, output_field: String },
    Projection { fields: Vec<String> },
    Window { size: i64, slide: i64, group_by: Vec<String>, aggregate: String },
    Join { left_key: String, right_key: String, size: i64, slide: i64 },
    Union,
    NetworkSource { channel: u64 },
    NetworkSink { channel: u64 },
    Sink { name: String },
}

impl OperatorKind {
    pub fn is_binary(&self) -> bool {
        matches!(self, OperatorKind::Join { .. })
    }

    fn type_name(&self) -> &'static str {
        match self {
            OperatorKind::Source { .. } => "SRC",
            OperatorKind::Filter { .. } => "FILTER",
            OperatorKind::Map { .. } => "MAP",
            OperatorKind::Projection { .. } => "PROJECTION",
            OperatorKind::Window { .. } => "WINDOW",
            OperatorKind::Join { .. } => "JOIN",
            OperatorKind::Union => "UNION",
            OperatorKind::NetworkSource { .. } => "NETSRC",
            OperatorKind::NetworkSink { .. } => "NETSINK",
            OperatorKind::Sink { .. } => "SINK",
        }
    }

    /// Parameter text used by signature computation
    /// (`SPEC_FULL.md` §4.10). `normalize_commutative` canonicalizes
    /// commutative structure (AND-conjunct ordering) for the semantic
    /// signature flavor.
    pub fn params(&self, normalize_commutative: bool) -> String {
        match self {
            OperatorKind::Source { logical_name } => logical_name.clone(),
            OperatorKind::Filter { predicate } => {
                if normalize_commutative {
                    let mut conjuncts: Vec<&str> = predicate.split(" AND ").map(str::trim).collect();
                    conjuncts.sort_unstable();
                    conjuncts.join(" AND ")
                } else {
                    predicate.clone()
                }
            }
            OperatorKind::Map { expression, output_field } => format!("{output_field}={expression}"),
            OperatorKind::Projection { fields } => fields.join(","),
            OperatorKind::Window { size, slide, group_by, aggregate } => {
                format!("{aggregate}[{size},{slide}]groupBy({})", group_by.join(","))
            }
            OperatorKind::Join { left_key, right_key, size, slide } => {
                format!("{left_key}={right_key}[{size},{slide}]")
            }
            OperatorKind::Union => String::new(),
            OperatorKind::NetworkSource { channel } | OperatorKind::NetworkSink { channel } => channel.to_string(),
            OperatorKind::Sink { name } => name.clone(),
        }
    }

    pub fn type_name_and_params(&self, normalize_commutative: bool) -> String {
        format!("{}({})", self.type_name(), self.params(normalize_commutative))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalNode {
    pub id: OperatorId,
    pub kind: OperatorKind,
    pub children: Vec<OperatorId>,
    pub schema: Option<Schema>,
}

/// Arena-indexed logical operator graph: nodes addressed by dense integer
/// id rather than a shared-pointer tree, per `SPEC_FULL.md` §9.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogicalPlan {
    nodes: HashMap<OperatorId, LogicalNode>,
    #[serde(skip)]
    next_id: AtomicU64,
    pub sink_roots: Vec<OperatorId>,
}

impl Clone for LogicalPlan {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            next_id: AtomicU64::new(self.next_id.load(Ordering::SeqCst)),
            sink_roots: self.sink_roots.clone(),
        }
    }
}

impl LogicalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, kind: OperatorKind, children: Vec<OperatorId>, schema: Option<Schema>) -> OperatorId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.nodes.insert(id, LogicalNode { id, kind, children, schema });
        id
    }

    pub fn node(&self, id: OperatorId) -> Option<&LogicalNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: OperatorId) -> Option<&mut LogicalNode> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LogicalNode> {
        self.nodes.values()
    }

    /// Post-order traversal (children before parent) rooted at `root`,
    /// the walk order type inference and rewrite phases need.
    pub fn post_order(&self, root: OperatorId) -> Vec<OperatorId> {
        let mut order = Vec::new();
        let mut visited = std::collections::HashSet::new();
        self.post_order_visit(root, &mut visited, &mut order);
        order
    }

    fn post_order_visit(&self, id: OperatorId, visited: &mut std::collections::HashSet<OperatorId>, order: &mut Vec<OperatorId>) {
        if !visited.insert(id) {
            return;
        }
        if let Some(node) = self.nodes.get(&id) {
            for &child in &node.children {
                self.post_order_visit(child, visited, order);
            }
        }
        order.push(id);
    }
}
