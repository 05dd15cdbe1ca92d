//! Shared helpers for the simulation integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;

use star_core::{Cost, NodeId};
use star_simulation::{AdHocNode, SimConfig, Simulation, WeightedGraph};

/// All-pairs shortest path costs by Floyd-Warshall
pub fn all_pairs(graph: &WeightedGraph) -> BTreeMap<(NodeId, NodeId), Cost> {
    let nodes: Vec<NodeId> = graph.nodes().collect();
    let mut dist = BTreeMap::new();
    for &a in &nodes {
        dist.insert((a, a), 0);
    }
    for (a, b, w) in graph.edges() {
        dist.insert((a, b), Cost::from(w));
        dist.insert((b, a), Cost::from(w));
    }
    for &k in &nodes {
        for &i in &nodes {
            for &j in &nodes {
                let (Some(&ik), Some(&kj)) = (dist.get(&(i, k)), dist.get(&(k, j))) else {
                    continue;
                };
                let through = ik + kj;
                if dist.get(&(i, j)).is_none_or(|&ij| through < ij) {
                    dist.insert((i, j), through);
                }
            }
        }
    }
    dist
}

/// Build, start and run a simulation to quiescence
pub fn converge(graph: WeightedGraph, config: SimConfig) -> Simulation {
    star_logging::init_testing();
    let mut sim = Simulation::new(graph, config, &AdHocNode).unwrap();
    sim.start().unwrap();
    sim.run_until_quiescent().unwrap();
    sim
}

/// Follow next hops from `from` to `to`, returning (hops, summed edge cost).
///
/// Panics if a hop is missing or the walk exceeds N-1 hops.
pub fn walk(sim: &Simulation, from: NodeId, to: NodeId) -> (usize, Cost) {
    let limit = sim.graph().node_count().saturating_sub(1);
    let mut current = from;
    let mut hops = 0;
    let mut cost = 0;
    while current != to {
        let next = sim
            .routing_table(current)
            .unwrap()
            .next_hop(to)
            .unwrap_or_else(|| panic!("{} has no route to {}", current, to));
        let weight = sim
            .graph()
            .weight(current, next)
            .unwrap_or_else(|| panic!("next hop {} of {} is not a neighbor", next, current));
        cost += Cost::from(weight);
        hops += 1;
        assert!(hops <= limit, "walk {} -> {} exceeded {} hops", from, to, limit);
        current = next;
    }
    (hops, cost)
}

/// Check every node's table against the true shortest paths
pub fn assert_optimal(sim: &Simulation) {
    let dist = all_pairs(sim.graph());
    let nodes = sim.node_ids();
    for &u in &nodes {
        let table = sim.routing_table(u).unwrap();
        assert_eq!(table.len(), nodes.len() - 1, "table of {} incomplete", u);
        for &v in &nodes {
            if u == v {
                continue;
            }
            let expected = dist[&(u, v)];
            assert_eq!(table.get(v).unwrap().cost, expected, "cost {} -> {}", u, v);
            let (_, walked) = walk(sim, u, v);
            assert_eq!(walked, expected, "walked cost {} -> {}", u, v);
        }
    }
}
