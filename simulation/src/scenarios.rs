//! Pre-defined simulation scenarios
//!
//! Each scenario builds a small network, drives it and prints what an
//! operator would look at. They double as end-to-end checks of the routing
//! engine.

use star_core::{ChannelConfig, NodeId, StarResult};
use star_routing::{Counter, TopologyView};
use tracing::info;

use crate::config::SimConfig;
use crate::graph::{WeightedGraph, from_edges};
use crate::node::AdHocNode;
use crate::simulation::Simulation;

/// Line 0-1 (2), 1-2 (3), run to quiescence.
///
/// Node 0 ends up routing to 2 via 1 at cost 5.
pub fn run_line_scenario() -> StarResult<Simulation> {
    info!("=== Running Line Scenario ===");

    let graph = from_edges(&[(0, 1, 2), (1, 2, 3)])?;
    println!("{}", graph.visualize());

    let mut sim = Simulation::new(graph, SimConfig::default(), &AdHocNode)?;
    sim.start()?;
    let summary = sim.run_until_quiescent()?;

    println!(
        "\n--- Quiescent at {} after {} events ---",
        summary.now, summary.dispatched
    );
    println!("{}", sim.render_routing_tables());
    println!("{}", sim.render_source_tree(NodeId(0), NodeId(0))?);
    Ok(sim)
}

/// Node 0 sends to 2 immediately after INIT, before any advertisement has
/// arrived. The send is reported unreachable; the network carries on and
/// converges.
pub fn run_early_send_scenario() -> StarResult<Simulation> {
    info!("=== Running Early Send Scenario ===");

    let graph = from_edges(&[(0, 1, 2), (1, 2, 3)])?;
    let mut sim = Simulation::new(graph, SimConfig::default(), &AdHocNode)?;
    sim.start()?;

    println!("\n--- Node 0 sends to node 2 at {} ---", sim.now());
    sim.send_message(NodeId(0), NodeId(2), "too early")?;
    sim.run_until_quiescent()?;

    for outcome in sim.undeliverable(NodeId(0))? {
        println!(
            "  {} to {} undeliverable at {}",
            outcome.id, outcome.destination, outcome.at
        );
    }
    println!("  converged: {}", sim.is_converged());
    println!("\n{}", sim.stats());
    Ok(sim)
}

/// Outcome of [`run_duplicate_scenario`]
#[derive(Debug)]
pub struct DuplicateOutcome {
    pub sim: Simulation,
    pub views_unchanged: bool,
    pub rebuilds_before: u64,
    pub rebuilds_after: u64,
    pub stale_before: u64,
    pub stale_after: u64,
}

fn views(sim: &Simulation) -> StarResult<Vec<TopologyView>> {
    sim.node_ids()
        .into_iter()
        .map(|id| Ok(sim.star(id)?.view().clone()))
        .collect()
}

/// Converge a ring over a duplicating channel, then make every node
/// re-advertise its whole view. Nothing changes except the stale counter.
pub fn run_duplicate_scenario() -> StarResult<DuplicateOutcome> {
    info!("=== Running Duplicate Advertisement Scenario ===");

    let graph = from_edges(&[(0, 1, 1), (1, 2, 4), (2, 3, 1), (3, 0, 2)])?;
    let config = SimConfig {
        channel: ChannelConfig::Duplicating { delay: 1 },
        ..Default::default()
    };
    let mut sim = Simulation::new(graph, config, &AdHocNode)?;
    sim.start()?;
    sim.run_until_quiescent()?;

    let before = views(&sim)?;
    let rebuilds_before = sim.counter(Counter::TreeRebuilds);
    let stale_before = sim.counter(Counter::StaleUpdates);
    println!("\n--- Converged: {} rebuilds, {} stale ---", rebuilds_before, stale_before);

    for id in sim.node_ids() {
        sim.replay_advertisement(id)?;
    }
    sim.run_until_quiescent()?;

    let views_unchanged = views(&sim)? == before;
    let rebuilds_after = sim.counter(Counter::TreeRebuilds);
    let stale_after = sim.counter(Counter::StaleUpdates);
    println!(
        "--- After replay: {} rebuilds, {} stale, views unchanged: {} ---",
        rebuilds_after, stale_after, views_unchanged
    );

    Ok(DuplicateOutcome {
        sim,
        views_unchanged,
        rebuilds_before,
        rebuilds_after,
        stale_before,
        stale_after,
    })
}

/// Two islands, 0-1 and 2-3. Rejected before any node is built.
pub fn run_disconnected_scenario() -> StarResult<Simulation> {
    info!("=== Running Disconnected Graph Scenario ===");

    let graph = WeightedGraph::new(
        NodeId::range(4),
        &[(NodeId(0), NodeId(1), 1), (NodeId(2), NodeId(3), 1)],
    )?;
    println!("{}", graph.visualize());

    let result = Simulation::new(graph, SimConfig::default(), &AdHocNode);
    if let Err(e) = &result {
        println!("  rejected: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use star_core::{StarError, TopologyError};

    #[test]
    fn test_line_scenario() {
        let sim = run_line_scenario().unwrap();
        let route = sim.routing_table(NodeId(0)).unwrap().get(NodeId(2)).copied().unwrap();
        assert_eq!(route.next_hop, NodeId(1));
        assert_eq!(route.cost, 5);
        assert!(sim.is_converged());
    }

    #[test]
    fn test_early_send_scenario() {
        let sim = run_early_send_scenario().unwrap();
        let undeliverable = sim.undeliverable(NodeId(0)).unwrap();
        assert_eq!(undeliverable.len(), 1);
        assert_eq!(undeliverable[0].destination, NodeId(2));
        assert!(sim.inbox(NodeId(2)).unwrap().is_empty());
        assert_eq!(sim.counter(Counter::Unreachable), 1);
        assert!(sim.is_converged());
    }

    #[test]
    fn test_duplicate_scenario() {
        let outcome = run_duplicate_scenario().unwrap();
        assert!(outcome.views_unchanged);
        assert_eq!(outcome.rebuilds_before, outcome.rebuilds_after);
        assert!(outcome.stale_after > outcome.stale_before);
        assert!(outcome.sim.is_converged());
    }

    #[test]
    fn test_disconnected_scenario() {
        let err = run_disconnected_scenario().unwrap_err();
        assert_eq!(
            err,
            StarError::Topology(TopologyError::Disconnected {
                from: NodeId(0),
                unreachable: vec![NodeId(2), NodeId(3)],
            })
        );
    }
}
