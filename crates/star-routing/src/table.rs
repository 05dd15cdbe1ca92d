//! Routing table derived from a source tree
//!
//! The table is a pure function of the tree: destination to next hop, path
//! cost and hop count. It is rebuilt whenever the tree is, never edited in
//! place.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use star_core::{Cost, NodeId};

use crate::error::{RoutingError, RoutingResult};
use crate::tree::SourceTree;

/// Route to one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub destination: NodeId,
    /// Neighbor to hand the message to
    pub next_hop: NodeId,
    pub cost: Cost,
    pub hops: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    owner: NodeId,
    routes: BTreeMap<NodeId, Route>,
}

impl RoutingTable {
    /// Table with no routes
    pub fn empty(owner: NodeId) -> Self {
        Self {
            owner,
            routes: BTreeMap::new(),
        }
    }

    /// Derive the table from the owner's source tree
    pub fn from_tree(tree: &SourceTree) -> Self {
        let owner = tree.root();
        let routes = tree
            .nodes()
            .filter(|(dest, _)| *dest != owner)
            .filter_map(|(destination, node)| {
                tree.first_hop(destination).map(|next_hop| {
                    (
                        destination,
                        Route {
                            destination,
                            next_hop,
                            cost: node.cost,
                            hops: node.hops,
                        },
                    )
                })
            })
            .collect();
        Self { owner, routes }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn get(&self, destination: NodeId) -> Option<&Route> {
        self.routes.get(&destination)
    }

    pub fn next_hop(&self, destination: NodeId) -> Option<NodeId> {
        self.routes.get(&destination).map(|r| r.next_hop)
    }

    /// Route to `destination`, or `Unreachable`
    pub fn lookup(&self, destination: NodeId) -> RoutingResult<&Route> {
        self.routes
            .get(&destination)
            .ok_or(RoutingError::Unreachable {
                node: self.owner,
                destination,
            })
    }

    /// Routes ordered by destination
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn destinations(&self) -> Vec<NodeId> {
        self.routes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = format!("Routing table of node {}\n", self.owner);
        let _ = writeln!(out, "  {:>4} {:>8} {:>6} {:>4}", "dest", "next-hop", "cost", "hops");
        for route in self.routes.values() {
            let _ = writeln!(
                out,
                "  {:>4} {:>8} {:>6} {:>4}",
                route.destination, route.next_hop, route.cost, route.hops
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::TopologyView;
    use star_core::{LinkEntry, LinkId};

    fn diamond() -> TopologyView {
        // 0-1 (1), 0-2 (4), 1-3 (1), 2-3 (1)
        let mut view = TopologyView::new(NodeId(0));
        view.originate(NodeId(1), Some(1));
        view.originate(NodeId(2), Some(4));
        let link = |a: u32, b: u32, w| LinkEntry::up(LinkId::new(NodeId(a), NodeId(b)), w, 1);
        view.merge(&[
            link(1, 0, 1),
            link(2, 0, 4),
            link(1, 3, 1),
            link(3, 1, 1),
            link(2, 3, 1),
            link(3, 2, 1),
        ]);
        view
    }

    #[test]
    fn test_from_tree() {
        let tree = SourceTree::compute(&diamond(), NodeId(0));
        let table = RoutingTable::from_tree(&tree);

        assert_eq!(table.len(), 3);
        assert!(table.get(NodeId(0)).is_none());

        let to_two = table.get(NodeId(2)).unwrap();
        assert_eq!(to_two.next_hop, NodeId(1));
        assert_eq!(to_two.cost, 3);
        assert_eq!(to_two.hops, 3);

        assert_eq!(table.next_hop(NodeId(3)), Some(NodeId(1)));
        assert_eq!(table.destinations(), vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_lookup_unreachable() {
        let table = RoutingTable::empty(NodeId(4));
        assert_eq!(
            table.lookup(NodeId(7)),
            Err(RoutingError::Unreachable {
                node: NodeId(4),
                destination: NodeId(7),
            })
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_render_lists_routes() {
        let table = RoutingTable::from_tree(&SourceTree::compute(&diamond(), NodeId(0)));
        let text = table.render();
        assert!(text.starts_with("Routing table of node 0"));
        assert_eq!(text.lines().count(), 5);
    }
}
