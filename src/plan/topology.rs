use crate::common::TopologyNodeId;
use crate::error::{NebulaError, Result};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
struct TopologyNode {
    capacity: usize,
    used: usize,
}

/// Physical node catalog plus adjacency, used by placement and
/// decomposition (`SPEC_FULL.md` §4.12-§4.13). Capacity decrement is
/// serialized by construction: placement runs on a single optimizer
/// thread (`SPEC_FULL.md` §5), so `&mut self` is enough — no internal
/// locking.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: HashMap<TopologyNodeId, TopologyNode>,
    links: HashMap<TopologyNodeId, Vec<TopologyNodeId>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: TopologyNodeId, capacity: usize) {
        self.nodes.insert(id, TopologyNode { capacity, used: 0 });
        self.links.entry(id).or_default();
    }

    pub fn add_link(&mut self, a: TopologyNodeId, b: TopologyNodeId) {
        self.links.entry(a).or_default().push(b);
        self.links.entry(b).or_default().push(a);
    }

    pub fn remaining_capacity(&self, id: TopologyNodeId) -> usize {
        self.nodes.get(&id).map(|n| n.capacity.saturating_sub(n.used)).unwrap_or(0)
    }

    pub fn consume_capacity(&mut self, id: TopologyNodeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| NebulaError::Placement(format!("unknown topology node {id}")))?;
        if node.used >= node.capacity {
            return Err(NebulaError::Placement(format!("node {id} has no remaining capacity")));
        }
        node.used += 1;
        Ok(())
    }

    pub fn release_capacity(&mut self, id: TopologyNodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.used = node.used.saturating_sub(1);
        }
    }

    /// Unweighted shortest path via BFS, used by decomposition to route a
    /// network bridge between two non-adjacent nodes (`SPEC_FULL.md`
    /// §4.13).
    pub fn shortest_path(&self, from: TopologyNodeId, to: TopologyNodeId) -> Option<Vec<TopologyNodeId>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut visited = std::collections::HashSet::new();
        let mut queue = VecDeque::new();
        let mut parent = HashMap::new();
        visited.insert(from);
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            for &next in self.links.get(&current).into_iter().flatten() {
                if visited.insert(next) {
                    parent.insert(next, current);
                    if next == to {
                        let mut path = vec![to];
                        let mut cursor = to;
                        while let Some(&p) = parent.get(&cursor) {
                            path.push(p);
                            cursor = p;
                        }
                        path.reverse();
                        return Some(path);
                    }
                    queue.push_back(next);
                }
            }
        }
        None
    }

    pub fn distance(&self, a: TopologyNodeId, b: TopologyNodeId) -> Option<usize> {
        self.shortest_path(a, b).map(|path| path.len() - 1)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = TopologyNodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Nodes on the shortest path between `from` and `to`, inclusive —
    /// the "admissible path" placement assigns intermediate operators to
    /// (`SPEC_FULL.md` §4.12).
    pub fn admissible_path(&self, from: TopologyNodeId, to: TopologyNodeId) -> Result<Vec<TopologyNodeId>> {
        self.shortest_path(from, to)
            .ok_or_else(|| NebulaError::Placement(format!("no path between node {from} and node {to}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_path_is_exact_on_a_line_topology() {
        let mut topo = Topology::new();
        for id in 1..=4 {
            topo.add_node(id, 10);
        }
        topo.add_link(1, 2);
        topo.add_link(2, 3);
        topo.add_link(3, 4);
        assert_eq!(topo.shortest_path(1, 4), Some(vec![1, 2, 3, 4]));
        assert_eq!(topo.distance(1, 4), Some(3));
    }

    #[test]
    fn capacity_consumption_fails_once_exhausted() {
        let mut topo = Topology::new();
        topo.add_node(1, 1);
        topo.consume_capacity(1).unwrap();
        assert!(topo.consume_capacity(1).is_err());
        topo.release_capacity(1);
        assert!(topo.consume_capacity(1).is_ok());
    }
}
