use super::logical::OperatorKind;
use crate::common::{OperatorId, OriginId, Schema, TopologyNodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryLayoutKind {
    Row,
    Column,
}

/// One operator after type inference, layout selection and placement have
/// all run (`SPEC_FULL.md` §4.11-§4.12).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhysicalNode {
    pub id: OperatorId,
    pub kind: OperatorKind,
    pub children: Vec<OperatorId>,
    pub schema: Schema,
    pub layout: MemoryLayoutKind,
    pub placement: Option<TopologyNodeId>,
    pub origin_id: Option<OriginId>,
}

/// Arena-indexed physical operator graph, covering every operator of one
/// query (before decomposition splits it per topology node).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhysicalPlan {
    pub nodes: HashMap<OperatorId, PhysicalNode>,
    pub sink_roots: Vec<OperatorId>,
}

impl PhysicalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: OperatorId) -> Option<&PhysicalNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: OperatorId) -> Option<&mut PhysicalNode> {
        self.nodes.get_mut(&id)
    }

    pub fn insert(&mut self, node: PhysicalNode) {
        self.nodes.insert(node.id, node);
    }

    /// Every root-to-sink path, walked child-to-parent from each leaf.
    pub fn leaves(&self) -> Vec<OperatorId> {
        self.nodes
            .values()
            .filter(|n| n.children.is_empty())
            .map(|n| n.id)
            .collect()
    }

    pub fn parent_of(&self, child: OperatorId) -> Option<OperatorId> {
        self.nodes.values().find(|n| n.children.contains(&child)).map(|n| n.id)
    }

    /// The single chain of operators from `leaf` up to (and including)
    /// its sink, used by placement (`SPEC_FULL.md` §4.12: "a path from its
    /// child's node to the sink's node").
    pub fn path_to_sink(&self, leaf: OperatorId) -> Vec<OperatorId> {
        let mut path = vec![leaf];
        let mut current = leaf;
        while let Some(parent) = self.parent_of(current) {
            path.push(parent);
            current = parent;
        }
        path
    }
}
