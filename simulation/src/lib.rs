//! # STAR network simulator
//!
//! Discrete-event simulation of an ad hoc network whose nodes run the
//! STAR (Source Tree Adaptive Routing) link-state protocol.
//!
//! ## Architecture
//!
//! - **Graph** (`graph.rs`): validated weighted topologies and builders
//! - **Node** (`node.rs`): the application / routing / link stack of a node
//! - **Topology** (`topology.rs`): one stack per vertex, the channel, and
//!   the directory that routes events to components
//! - **Simulation** (`simulation.rs`): lifecycle, injection and inspection
//! - **Service** (`service.rs`): the simulation behind a tokio task
//! - **Scenarios** (`scenarios.rs`): canned end-to-end runs
//!
//! ## Example
//!
//! ```rust
//! use star_core::NodeId;
//! use star_simulation::{AdHocNode, SimConfig, Simulation, from_edges};
//!
//! // 0 -2- 1 -3- 2
//! let graph = from_edges(&[(0, 1, 2), (1, 2, 3)]).unwrap();
//! let mut sim = Simulation::new(graph, SimConfig::default(), &AdHocNode).unwrap();
//! sim.start().unwrap();
//! sim.run_until_quiescent().unwrap();
//!
//! let route = sim.routing_table(NodeId(0)).unwrap().get(NodeId(2)).copied().unwrap();
//! assert_eq!(route.next_hop, NodeId(1));
//! assert_eq!(route.cost, 5);
//!
//! sim.send_message(NodeId(0), NodeId(2), "hello").unwrap();
//! sim.run_until_quiescent().unwrap();
//! assert_eq!(sim.inbox(NodeId(2)).unwrap()[0].body_text(), "hello");
//! ```

pub mod application;
pub mod config;
pub mod graph;
pub mod link;
pub mod node;
pub mod scenarios;
pub mod service;
pub mod simulation;
pub mod topology;

pub use application::{ApplicationLayer, Delivered, Undeliverable};
pub use config::{ConfigError, SimConfig};
pub use graph::{GraphBuilder, WeightedGraph, from_edges};
pub use link::{LinkCounters, LinkLayer};
pub use node::{AdHocNode, NodeFactory};
pub use service::{Command, ServiceConfig, ServiceError, ServiceHandle, SimulationService};
pub use simulation::{SimReport, Simulation};
pub use topology::{Directory, Topology};
