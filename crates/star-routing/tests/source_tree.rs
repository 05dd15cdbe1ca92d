//! Source tree properties over arbitrary link views

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use star_core::{Cost, LinkEntry, LinkId, Metric, NodeId};
use star_routing::{RoutingTable, SourceTree, TopologyView};

fn edges_strategy() -> impl Strategy<Value = (u32, Vec<(u32, u32, Metric)>)> {
    (2u32..9).prop_flat_map(|nodes| {
        let edge = (0..nodes, 0..nodes, 1u32..20);
        (Just(nodes), prop::collection::vec(edge, 0..24))
    })
}

/// Symmetric, deduplicated edges without self loops
fn normalize(edges: &[(u32, u32, Metric)]) -> BTreeMap<(NodeId, NodeId), Metric> {
    let mut out = BTreeMap::new();
    for &(a, b, w) in edges {
        if a == b {
            continue;
        }
        let key = (NodeId(a.min(b)), NodeId(a.max(b)));
        out.entry(key).or_insert(w);
    }
    out
}

fn view_of(owner: NodeId, edges: &BTreeMap<(NodeId, NodeId), Metric>) -> TopologyView {
    let mut view = TopologyView::new(owner);
    let mut heard = Vec::new();
    for (&(a, b), &w) in edges {
        for (head, tail) in [(a, b), (b, a)] {
            // The owner's own links only enter the view by origination
            if head == owner {
                view.originate(tail, Some(w));
            } else {
                heard.push(LinkEntry::up(LinkId::new(head, tail), w, 1));
            }
        }
    }
    view.merge(&heard);
    view
}

fn reference(
    nodes: u32,
    edges: &BTreeMap<(NodeId, NodeId), Metric>,
    root: NodeId,
) -> BTreeMap<NodeId, Cost> {
    let mut dist = BTreeMap::from([(root, 0 as Cost)]);
    // Bellman-Ford is plenty for a handful of nodes
    for _ in 0..nodes {
        for (&(a, b), &w) in edges {
            for (from, to) in [(a, b), (b, a)] {
                if let Some(&d) = dist.get(&from) {
                    let through = d + Cost::from(w);
                    if dist.get(&to).is_none_or(|&cur| through < cur) {
                        dist.insert(to, through);
                    }
                }
            }
        }
    }
    dist
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_tree_costs_are_shortest((nodes, raw) in edges_strategy(), root in 0u32..9) {
        let root = NodeId(root % nodes);
        let edges = normalize(&raw);
        let view = view_of(root, &edges);
        let tree = SourceTree::compute(&view, root);

        prop_assert!(tree.validate().is_ok());
        let expected = reference(nodes, &edges, root);
        let reached: BTreeSet<NodeId> = tree.nodes().map(|(id, _)| id).collect();
        prop_assert_eq!(reached, expected.keys().copied().collect::<BTreeSet<_>>());
        for (node, cost) in expected {
            prop_assert_eq!(tree.cost(node), Some(cost));
        }
    }

    #[test]
    fn prop_tree_edges_exist_in_view((nodes, raw) in edges_strategy(), root in 0u32..9) {
        let root = NodeId(root % nodes);
        let edges = normalize(&raw);
        let view = view_of(root, &edges);
        let tree = SourceTree::compute(&view, root);

        for (parent, child) in tree.edges() {
            let key = (parent.min(child), parent.max(child));
            let weight = edges.get(&key).copied();
            prop_assert!(weight.is_some(), "{} -> {} not in view", parent, child);
            let parent_cost = tree.cost(parent).unwrap();
            prop_assert_eq!(tree.cost(child), Some(parent_cost + Cost::from(weight.unwrap())));
        }
    }

    #[test]
    fn prop_table_first_hops_are_neighbors((nodes, raw) in edges_strategy(), root in 0u32..9) {
        let root = NodeId(root % nodes);
        let edges = normalize(&raw);
        let view = view_of(root, &edges);
        let tree = SourceTree::compute(&view, root);
        let table = RoutingTable::from_tree(&tree);
        let neighbors: BTreeSet<NodeId> = view.neighbors().into_iter().collect();

        prop_assert_eq!(table.len(), tree.len() - 1);
        for route in table.routes() {
            prop_assert!(neighbors.contains(&route.next_hop));
            prop_assert_eq!(Some(route.next_hop), tree.first_hop(route.destination));
        }
    }

    #[test]
    fn prop_compute_is_deterministic((nodes, raw) in edges_strategy(), root in 0u32..9) {
        let root = NodeId(root % nodes);
        let edges = normalize(&raw);
        let view = view_of(root, &edges);
        prop_assert_eq!(SourceTree::compute(&view, root), SourceTree::compute(&view, root));
    }
}

#[test]
fn test_equal_cost_ties_go_to_smaller_parent() {
    // 0-1-3 and 0-2-3 both cost 2
    let edges = normalize(&[(0, 1, 1), (0, 2, 1), (1, 3, 1), (2, 3, 1)]);
    let tree = SourceTree::compute(&view_of(NodeId(0), &edges), NodeId(0));
    assert_eq!(tree.parent(NodeId(3)), Some(NodeId(1)));
}

#[test]
fn test_down_links_are_ignored() {
    let edges = normalize(&[(0, 1, 1), (1, 2, 1), (0, 2, 5)]);
    let mut view = view_of(NodeId(0), &edges);
    view.merge(&[
        LinkEntry::down(LinkId::new(NodeId(1), NodeId(2)), 2),
        LinkEntry::down(LinkId::new(NodeId(2), NodeId(1)), 2),
    ]);
    let tree = SourceTree::compute(&view, NodeId(0));
    assert_eq!(tree.cost(NodeId(2)), Some(5));
    assert_eq!(tree.parent(NodeId(2)), Some(NodeId(0)));
}
