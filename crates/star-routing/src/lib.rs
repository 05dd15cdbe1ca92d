//! # STAR Routing
//!
//! Source Tree Adaptive Routing for the STAR network simulator.
//!
//! Every node keeps a versioned view of the links it has heard about,
//! computes a shortest-path source tree over that view and derives its
//! routing table from the tree. Changes are flooded to neighbors as
//! link-state advertisements carrying only the entries that changed.
//!
//! ## Core Components
//!
//! - [`TopologyView`]: Per-node link map with sequence-number supersession
//! - [`SourceTree`]: Deterministic shortest-path tree (ties to smaller id)
//! - [`RoutingTable`]: Destination to next hop, cost and hop count
//! - [`StarNode`]: The routing layer tying the above together
//! - [`Stats`]: Per-node protocol counters
//!
//! ## Example
//!
//! ```rust
//! use star_core::{LinkEntry, LinkId, NodeId};
//! use star_routing::{RoutingTable, SourceTree, TopologyView};
//!
//! let mut view = TopologyView::new(NodeId(0));
//! view.originate(NodeId(1), Some(2));
//! view.merge(&[LinkEntry::up(LinkId::new(NodeId(1), NodeId(2)), 3, 1)]);
//!
//! let tree = SourceTree::compute(&view, NodeId(0));
//! let table = RoutingTable::from_tree(&tree);
//! assert_eq!(table.next_hop(NodeId(2)), Some(NodeId(1)));
//! assert_eq!(table.get(NodeId(2)).unwrap().cost, 5);
//! ```

pub mod engine;
pub mod error;
pub mod stats;
pub mod table;
pub mod tree;
pub mod view;

// Re-export main types
pub use engine::{EngineConfig, NodeState, StarNode};
pub use error::{RoutingError, RoutingResult};
pub use stats::{Counter, Stats};
pub use table::{Route, RoutingTable};
pub use tree::{SourceTree, TreeNode};
pub use view::{MergeOutcome, TopologyView};
