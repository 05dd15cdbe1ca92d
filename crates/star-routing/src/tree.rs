//! Source trees
//!
//! A source tree is the shortest-path tree over a topology view, rooted at
//! one node. It is always recomputed from scratch; given the same view it is
//! identical every time, because equal-cost alternatives are resolved in
//! favor of the smaller predecessor id.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt::Write as _;

use star_core::{Cost, NodeId};

use crate::error::{RoutingError, RoutingResult};
use crate::view::TopologyView;

/// A node's position in a source tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    /// Predecessor on the least-cost path, `None` for the root
    pub parent: Option<NodeId>,
    /// Total cost from the root
    pub cost: Cost,
    /// Number of links from the root
    pub hops: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    root: NodeId,
    nodes: BTreeMap<NodeId, TreeNode>,
}

impl SourceTree {
    /// Tree containing only the root
    pub fn singleton(root: NodeId) -> Self {
        Self {
            root,
            nodes: BTreeMap::from([(
                root,
                TreeNode {
                    parent: None,
                    cost: 0,
                    hops: 0,
                },
            )]),
        }
    }

    /// Dijkstra over the live links of `view`, starting at `root`
    pub fn compute(view: &TopologyView, root: NodeId) -> Self {
        let mut tree = Self::singleton(root);
        let mut done = BTreeSet::new();
        let mut heap = BinaryHeap::from([Reverse((0 as Cost, root))]);

        while let Some(Reverse((cost, node))) = heap.pop() {
            if !done.insert(node) {
                continue;
            }
            let hops = tree.nodes.get(&node).map_or(0, |n| n.hops);
            for (tail, metric) in view.out_links(node) {
                if done.contains(&tail) {
                    continue;
                }
                let candidate = cost + Cost::from(metric);
                let better = match tree.nodes.get(&tail) {
                    None => true,
                    Some(current) => {
                        candidate < current.cost
                            || (candidate == current.cost
                                && current.parent.is_some_and(|p| node < p))
                    }
                };
                if better {
                    tree.nodes.insert(
                        tail,
                        TreeNode {
                            parent: Some(node),
                            cost: candidate,
                            hops: hops + 1,
                        },
                    );
                    heap.push(Reverse((candidate, tail)));
                }
            }
        }
        tree
    }

    #[cfg(test)]
    pub(crate) fn from_parts(root: NodeId, nodes: BTreeMap<NodeId, TreeNode>) -> Self {
        Self { root, nodes }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn cost(&self, node: NodeId) -> Option<Cost> {
        self.nodes.get(&node).map(|n| n.cost)
    }

    /// Nodes in the tree, ordered by id
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    /// Tree edges as `(parent, child)` pairs
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .filter_map(|(child, n)| n.parent.map(|p| (p, *child)))
            .collect()
    }

    /// Path from the root to `destination`, both included
    pub fn path(&self, destination: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![destination];
        let mut current = destination;
        while current != self.root {
            current = self.nodes.get(&current)?.parent?;
            path.push(current);
            if path.len() > self.nodes.len() {
                return None;
            }
        }
        path.reverse();
        Some(path)
    }

    /// The child of the root on the path to `destination`
    pub fn first_hop(&self, destination: NodeId) -> Option<NodeId> {
        self.path(destination)
            .and_then(|path| path.get(1).copied())
    }

    /// Structural check: the root is parentless, every other node has a
    /// parent in the tree, and following parents always reaches the root.
    pub fn validate(&self) -> RoutingResult<()> {
        let invalid = |entry: String, reason: &str| RoutingError::InvalidTree {
            node: self.root,
            entry,
            reason: reason.to_string(),
        };

        match self.nodes.get(&self.root) {
            Some(TreeNode { parent: None, .. }) => {}
            Some(TreeNode {
                parent: Some(p), ..
            }) => return Err(invalid(format!("{}->{}", p, self.root), "root has a parent")),
            None => return Err(invalid(self.root.to_string(), "root missing from tree")),
        }

        for (&node, entry) in &self.nodes {
            if node == self.root {
                continue;
            }
            let Some(parent) = entry.parent else {
                return Err(invalid(node.to_string(), "non-root node without parent"));
            };
            if parent == node {
                return Err(invalid(format!("{}->{}", node, node), "self loop"));
            }
            if !self.nodes.contains_key(&parent) {
                return Err(invalid(format!("{}->{}", parent, node), "parent not in tree"));
            }
            if self.path(node).is_none() {
                return Err(invalid(format!("{}->{}", parent, node), "cycle"));
            }
        }
        Ok(())
    }

    /// Indented text rendering, children ordered by id
    pub fn render(&self) -> String {
        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (parent, child) in self.edges() {
            children.entry(parent).or_default().push(child);
        }

        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            let cost = self.cost(node).unwrap_or_default();
            let _ = writeln!(out, "{}{} (cost {})", "  ".repeat(depth), node, cost);
            if let Some(kids) = children.get(&node) {
                for kid in kids.iter().rev() {
                    stack.push((*kid, depth + 1));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use star_core::{LinkEntry, LinkId, Metric};

    /// View holding both directions of every undirected edge
    fn view(owner: u32, edges: &[(u32, u32, Metric)]) -> TopologyView {
        let mut view = TopologyView::new(NodeId(owner));
        let entries: Vec<_> = edges
            .iter()
            .flat_map(|&(a, b, w)| {
                [
                    LinkEntry::up(LinkId::new(NodeId(a), NodeId(b)), w, 1),
                    LinkEntry::up(LinkId::new(NodeId(b), NodeId(a)), w, 1),
                ]
            })
            .filter(|e| e.link.head != NodeId(owner))
            .collect();
        view.merge(&entries);
        for &(a, b, w) in edges {
            if a == owner {
                view.originate(NodeId(b), Some(w));
            } else if b == owner {
                view.originate(NodeId(a), Some(w));
            }
        }
        view
    }

    #[test]
    fn test_line_tree() {
        let tree = SourceTree::compute(&view(0, &[(0, 1, 2), (1, 2, 3)]), NodeId(0));
        assert_eq!(tree.cost(NodeId(2)), Some(5));
        assert_eq!(tree.parent(NodeId(2)), Some(NodeId(1)));
        assert_eq!(tree.first_hop(NodeId(2)), Some(NodeId(1)));
        assert_eq!(tree.get(NodeId(2)).unwrap().hops, 2);
        assert_eq!(tree.path(NodeId(2)).unwrap(), vec![NodeId(0), NodeId(1), NodeId(2)]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_prefers_cheaper_multi_hop() {
        // 0-2 direct costs 10, 0-1-2 costs 3
        let tree = SourceTree::compute(&view(0, &[(0, 2, 10), (0, 1, 1), (1, 2, 2)]), NodeId(0));
        assert_eq!(tree.cost(NodeId(2)), Some(3));
        assert_eq!(tree.first_hop(NodeId(2)), Some(NodeId(1)));
    }

    #[test]
    fn test_ties_broken_by_smaller_parent() {
        // Two equal-cost routes to 3: via 2 and via 1
        let edges = [(0, 2, 1), (0, 1, 1), (2, 3, 1), (1, 3, 1)];
        let tree = SourceTree::compute(&view(0, &edges), NodeId(0));
        assert_eq!(tree.parent(NodeId(3)), Some(NodeId(1)));

        // Same answer regardless of which node computes it
        let other = SourceTree::compute(&view(3, &edges), NodeId(0));
        assert_eq!(other.parent(NodeId(3)), Some(NodeId(1)));
    }

    #[test]
    fn test_rooted_elsewhere_and_unreachable() {
        let v = view(0, &[(0, 1, 4), (1, 2, 1)]);
        let tree = SourceTree::compute(&v, NodeId(2));
        assert_eq!(tree.root(), NodeId(2));
        assert_eq!(tree.cost(NodeId(0)), Some(5));

        let alone = SourceTree::compute(&v, NodeId(9));
        assert_eq!(alone.len(), 1);
        assert_eq!(alone.first_hop(NodeId(0)), None);
    }

    #[test]
    fn test_validate_rejects_self_loop() {
        let tree = SourceTree::from_parts(
            NodeId(0),
            BTreeMap::from([
                (NodeId(0), TreeNode { parent: None, cost: 0, hops: 0 }),
                (NodeId(1), TreeNode { parent: Some(NodeId(1)), cost: 1, hops: 1 }),
            ]),
        );
        match tree.validate() {
            Err(RoutingError::InvalidTree { entry, reason, .. }) => {
                assert_eq!(entry, "1->1");
                assert_eq!(reason, "self loop");
            }
            other => panic!("expected invalid tree, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let tree = SourceTree::from_parts(
            NodeId(0),
            BTreeMap::from([
                (NodeId(0), TreeNode { parent: None, cost: 0, hops: 0 }),
                (NodeId(1), TreeNode { parent: Some(NodeId(2)), cost: 1, hops: 1 }),
                (NodeId(2), TreeNode { parent: Some(NodeId(1)), cost: 1, hops: 1 }),
            ]),
        );
        assert!(matches!(
            tree.validate(),
            Err(RoutingError::InvalidTree { .. })
        ));
    }

    #[test]
    fn test_render() {
        let tree = SourceTree::compute(&view(0, &[(0, 1, 2), (1, 2, 3), (0, 3, 1)]), NodeId(0));
        assert_eq!(
            tree.render(),
            "0 (cost 0)\n  1 (cost 2)\n    2 (cost 5)\n  3 (cost 1)\n"
        );
    }
}
