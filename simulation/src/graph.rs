//! Weighted topology graphs
//!
//! The simulator's input: a node set plus undirected edges with integer
//! weights of at least 1. Graphs are validated on construction; connectivity
//! is checked separately because link dynamics may legitimately partition a
//! running network.
//!
//! [`GraphBuilder`] produces the usual shapes:
//! - Line: `0 - 1 - 2 - ... - n-1`
//! - Ring: a line closed back to 0
//! - Full mesh: every pair connected
//! - Random connected: G(n, p) redrawn until connected, random weights

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use star_core::{Metric, NodeId, TopologyError};

/// Attempts before `random_connected` gives up on a sparse probability
const MAX_DRAWS: usize = 10_000;

/// Undirected edge key, smaller id first
fn key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a < b { (a, b) } else { (b, a) }
}

fn metric(a: NodeId, b: NodeId, weight: i64) -> Result<Metric, TopologyError> {
    Metric::try_from(weight)
        .ok()
        .filter(|w| *w >= 1)
        .ok_or(TopologyError::InvalidWeight { a, b, weight })
}

/// A validated undirected weighted graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedGraph {
    nodes: BTreeSet<NodeId>,
    edges: BTreeMap<(NodeId, NodeId), Metric>,
}

impl WeightedGraph {
    /// Build a graph from explicit nodes and `(a, b, weight)` edges
    pub fn new(
        nodes: impl IntoIterator<Item = NodeId>,
        edges: &[(NodeId, NodeId, i64)],
    ) -> Result<Self, TopologyError> {
        let nodes: BTreeSet<NodeId> = nodes.into_iter().collect();
        if nodes.is_empty() {
            return Err(TopologyError::EmptyGraph);
        }

        let mut graph = Self {
            nodes,
            edges: BTreeMap::new(),
        };
        for &(a, b, weight) in edges {
            if a == b {
                return Err(TopologyError::SelfLoop(a));
            }
            for endpoint in [a, b] {
                if !graph.nodes.contains(&endpoint) {
                    return Err(TopologyError::UnknownEndpoint(endpoint));
                }
            }
            let weight = metric(a, b, weight)?;
            if graph.edges.insert(key(a, b), weight).is_some() {
                return Err(TopologyError::DuplicateEdge { a, b });
            }
        }
        Ok(graph)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Node ids in ascending order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Edges as `(smaller, larger, weight)`
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, Metric)> + '_ {
        self.edges.iter().map(|(&(a, b), &w)| (a, b, w))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn weight(&self, a: NodeId, b: NodeId) -> Option<Metric> {
        self.edges.get(&key(a, b)).copied()
    }

    /// Neighbors of `node` with the connecting edge weight
    pub fn neighbors(&self, node: NodeId) -> Vec<(NodeId, Metric)> {
        self.edges
            .iter()
            .filter_map(|(&(a, b), &w)| {
                if a == node {
                    Some((b, w))
                } else if b == node {
                    Some((a, w))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn neighbor_ids(&self, node: NodeId) -> Vec<NodeId> {
        self.neighbors(node).into_iter().map(|(n, _)| n).collect()
    }

    /// Add, re-weight (`Some`) or remove (`None`) an edge.
    ///
    /// Returns the previous weight.
    pub fn set_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        weight: Option<i64>,
    ) -> Result<Option<Metric>, TopologyError> {
        if a == b {
            return Err(TopologyError::SelfLoop(a));
        }
        for endpoint in [a, b] {
            if !self.contains(endpoint) {
                return Err(TopologyError::NoSuchNode(endpoint));
            }
        }
        match weight {
            Some(weight) => {
                let weight = metric(a, b, weight)?;
                Ok(self.edges.insert(key(a, b), weight))
            }
            None => self
                .edges
                .remove(&key(a, b))
                .map(Some)
                .ok_or(TopologyError::NoSuchLink { a, b }),
        }
    }

    /// Nodes that cannot be reached from `root`
    pub fn unreachable_from(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for next in self.neighbor_ids(node) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        self.nodes.iter().copied().filter(|n| !seen.contains(n)).collect()
    }

    pub fn is_connected(&self) -> bool {
        self.nodes
            .first()
            .is_none_or(|root| self.unreachable_from(*root).is_empty())
    }

    /// Fail with `Disconnected` unless every node is reachable
    pub fn ensure_connected(&self) -> Result<(), TopologyError> {
        let Some(&root) = self.nodes.first() else {
            return Err(TopologyError::EmptyGraph);
        };
        let unreachable = self.unreachable_from(root);
        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(TopologyError::Disconnected {
                from: root,
                unreachable,
            })
        }
    }

    /// Print a simple ASCII rendering of the graph
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Topology:\n");
        let _ = writeln!(output, "  Nodes: {}", self.node_count());
        let _ = writeln!(output, "  Edges: {}\n", self.edge_count());

        for node in &self.nodes {
            let neighbors: Vec<String> = self
                .neighbors(*node)
                .iter()
                .map(|(n, w)| format!("{}({})", n, w))
                .collect();
            let _ = writeln!(output, "  {} -> [{}]", node, neighbors.join(", "));
        }
        output
    }
}

/// Build a graph whose node set is exactly the edge endpoints
pub fn from_edges(edges: &[(u32, u32, i64)]) -> Result<WeightedGraph, TopologyError> {
    let nodes: BTreeSet<NodeId> = edges
        .iter()
        .flat_map(|&(a, b, _)| [NodeId(a), NodeId(b)])
        .collect();
    let edges: Vec<_> = edges
        .iter()
        .map(|&(a, b, w)| (NodeId(a), NodeId(b), w))
        .collect();
    WeightedGraph::new(nodes, &edges)
}

/// Builder for common topologies over nodes `0..n`
pub struct GraphBuilder {
    node_count: u32,
}

impl GraphBuilder {
    pub fn new(node_count: u32) -> Self {
        Self { node_count }
    }

    fn build(&self, edges: Vec<(NodeId, NodeId, i64)>) -> Result<WeightedGraph, TopologyError> {
        WeightedGraph::new(NodeId::range(self.node_count), &edges)
    }

    /// `0 - 1 - ... - n-1`, every edge weighing `weight`
    pub fn line(self, weight: Metric) -> Result<WeightedGraph, TopologyError> {
        let edges = (1..self.node_count)
            .map(|i| (NodeId(i - 1), NodeId(i), i64::from(weight)))
            .collect();
        self.build(edges)
    }

    /// A line closed back to node 0 (needs at least three nodes to add the
    /// closing edge)
    pub fn ring(self, weight: Metric) -> Result<WeightedGraph, TopologyError> {
        let n = self.node_count;
        let mut edges: Vec<_> = (1..n)
            .map(|i| (NodeId(i - 1), NodeId(i), i64::from(weight)))
            .collect();
        if n >= 3 {
            edges.push((NodeId(n - 1), NodeId(0), i64::from(weight)));
        }
        self.build(edges)
    }

    /// Every pair connected
    pub fn full_mesh(self, weight: Metric) -> Result<WeightedGraph, TopologyError> {
        let n = self.node_count;
        let edges = (0..n)
            .flat_map(|a| ((a + 1)..n).map(move |b| (NodeId(a), NodeId(b), i64::from(weight))))
            .collect();
        self.build(edges)
    }

    /// G(n, p) redrawn until connected, each edge weighted uniformly from
    /// `weights`
    pub fn random_connected(
        self,
        probability: f64,
        weights: RangeInclusive<Metric>,
        seed: u64,
    ) -> Result<WeightedGraph, TopologyError> {
        if *weights.start() < 1 || weights.is_empty() {
            return Err(TopologyError::InvalidWeight {
                a: NodeId(0),
                b: NodeId(0),
                weight: i64::from(*weights.start()),
            });
        }
        let probability = probability.clamp(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let n = self.node_count;

        let mut last = None;
        for _ in 0..MAX_DRAWS {
            let mut edges = Vec::new();
            for a in 0..n {
                for b in (a + 1)..n {
                    if rng.random_bool(probability) {
                        let w = rng.random_range(weights.clone());
                        edges.push((NodeId(a), NodeId(b), i64::from(w)));
                    }
                }
            }
            let graph = self.build(edges)?;
            match graph.ensure_connected() {
                Ok(()) => return Ok(graph),
                Err(err) => last = Some(err),
            }
        }
        Err(last.unwrap_or(TopologyError::EmptyGraph))
    }
}
