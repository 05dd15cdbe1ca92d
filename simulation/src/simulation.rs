//! Simulation driver
//!
//! Owns the kernel and the topology and is the only way to act on a
//! running network from outside:
//! - Lifecycle: `start`, `step`, `run_until`, `advance`,
//!   `run_until_quiescent`, `terminate`
//! - Injection: `send_message`, `set_link_cost`, `replay_advertisement`.
//!   Each schedules events; node state is never touched directly.
//! - Inspection: routing tables, topology views, source trees, statistics.
//!   Read-only.
//!
//! Unknown node ids are reported as `NoSuchNode`, never a panic.

use bytes::Bytes;
use serde::Serialize;
use star_core::{
    Address, ChannelStats, ControlSignal, Delay, Event, EventContent, EventId, EventKind,
    Frame, FramePayload, IdentityError, Kernel, KernelError, LayerKind, LinkStateAdvertisement,
    Metric, NodeId, RunSummary, SimTime, StarResult, WiringError,
};
use star_routing::{Counter, RoutingTable, SourceTree, StarNode, Stats};
use tracing::{info, warn};

use crate::application::{ApplicationLayer, Delivered, Undeliverable};
use crate::config::SimConfig;
use crate::graph::WeightedGraph;
use crate::node::NodeFactory;
use crate::topology::Topology;

/// Point-in-time summary of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimReport {
    pub now: SimTime,
    pub processed: u64,
    pub pending: usize,
    pub converged: bool,
    pub terminated: bool,
    pub stats: Stats,
    pub channel: ChannelStats,
}

#[derive(Debug)]
pub struct Simulation {
    kernel: Kernel,
    topology: Topology,
    config: SimConfig,
    started: bool,
}

impl Simulation {
    /// Validate the configuration and the graph, then build every node.
    ///
    /// Fails before anything is scheduled if the graph is disconnected or the
    /// configuration is invalid.
    pub fn new(
        graph: WeightedGraph,
        config: SimConfig,
        factory: &dyn NodeFactory,
    ) -> StarResult<Self> {
        config.validate()?;
        let topology = Topology::build(graph, factory, &config)?;
        let kernel = Kernel::new().with_event_limit(config.event_limit);
        Ok(Self {
            kernel,
            topology,
            config,
            started: false,
        })
    }

    /// Fire INIT into every node. Calling it again does nothing.
    pub fn start(&mut self) -> StarResult<usize> {
        if self.started {
            return Ok(0);
        }
        let count = self.topology.start(&mut self.kernel)?;
        self.started = true;
        info!(nodes = self.topology.graph().node_count(), "simulation started");
        Ok(count)
    }

    /// Dispatch one event
    pub fn step(&mut self) -> StarResult<Option<SimTime>> {
        self.kernel.step(&mut self.topology)
    }

    /// Dispatch everything due at or before `deadline`
    pub fn run_until(&mut self, deadline: SimTime) -> StarResult<RunSummary> {
        self.kernel.run_until(deadline, &mut self.topology)
    }

    /// Move the clock forward by `ticks`
    pub fn advance(&mut self, ticks: u64) -> StarResult<RunSummary> {
        let deadline = self.kernel.now().plus(Delay::from_ticks(ticks))?;
        self.run_until(deadline)
    }

    /// Run until no events are pending
    pub fn run_until_quiescent(&mut self) -> StarResult<RunSummary> {
        let summary = self.kernel.run(&mut self.topology)?;
        info!(
            now = %summary.now,
            dispatched = summary.dispatched,
            converged = self.is_converged(),
            "network quiescent"
        );
        Ok(summary)
    }

    /// Terminate every node: the queue is discarded and no further events
    /// are accepted. Inspection keeps working.
    pub fn terminate(&mut self) -> usize {
        let dropped = self.kernel.terminate();
        info!(now = %self.kernel.now(), dropped, "all nodes terminated");
        dropped
    }

    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    pub fn pending(&self) -> usize {
        self.kernel.pending()
    }

    pub fn processed(&self) -> u64 {
        self.kernel.processed()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_terminated(&self) -> bool {
        self.kernel.is_terminated()
    }

    /// No events pending and every routing engine stable
    pub fn is_converged(&self) -> bool {
        self.started
            && self.kernel.is_idle()
            && self
                .topology
                .ids()
                .all(|id| self.star(id).is_ok_and(StarNode::is_stable))
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn graph(&self) -> &WeightedGraph {
        self.topology.graph()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.topology.ids().collect()
    }

    fn ensure_node(&self, node: NodeId) -> StarResult<()> {
        if self.topology.contains(node) {
            Ok(())
        } else {
            Err(IdentityError::NoSuchNode(node).into())
        }
    }

    fn ensure_running(&self) -> StarResult<()> {
        if self.kernel.is_terminated() {
            return Err(KernelError::Terminated.into());
        }
        Ok(())
    }

    /// Ask `from`'s application layer to send `body` to `to`
    pub fn send_message(
        &mut self,
        from: NodeId,
        to: NodeId,
        body: impl Into<Bytes>,
    ) -> StarResult<EventId> {
        self.ensure_node(from)?;
        self.ensure_node(to)?;
        let event = Event::new(
            None,
            Address::layer(from, LayerKind::Application),
            EventKind::MessageFromTop,
            EventContent::ControlSignal(ControlSignal::SendMessage {
                destination: to,
                body: body.into(),
            }),
        );
        Ok(self.kernel.schedule(event, 0)?)
    }

    /// Change the cost of the link `a`-`b`, bring it up (`Some` on a new
    /// pair) or take it down (`None`)
    pub fn set_link_cost(&mut self, a: NodeId, b: NodeId, cost: Option<Metric>) -> StarResult<()> {
        self.ensure_running()?;
        for event in self.topology.set_link(a, b, cost)? {
            self.kernel.schedule(event, 0)?;
        }
        Ok(())
    }

    /// Broadcast `node`'s whole current view again, as if it were a fresh
    /// advertisement. Receivers already hold every entry.
    pub fn replay_advertisement(&mut self, node: NodeId) -> StarResult<EventId> {
        let entries = self.star(node)?.view().snapshot();
        let frame = Frame::broadcast(
            node,
            FramePayload::LinkState(LinkStateAdvertisement::full(node, entries)),
        );
        let event = Event::new(
            Some(Address::layer(node, LayerKind::Link)),
            Address::channel(node),
            EventKind::MessageFromTop,
            EventContent::Frame(frame),
        );
        Ok(self.kernel.schedule(event, 0)?)
    }

    /// Routing engine of `node`
    pub fn star(&self, node: NodeId) -> StarResult<&StarNode> {
        self.topology.node(node)?.layer::<StarNode>().ok_or_else(|| {
            WiringError::UnknownLayer {
                node,
                layer: LayerKind::Routing,
            }
            .into()
        })
    }

    pub fn application(&self, node: NodeId) -> StarResult<&ApplicationLayer> {
        self.topology
            .node(node)?
            .layer::<ApplicationLayer>()
            .ok_or_else(|| {
                WiringError::UnknownLayer {
                    node,
                    layer: LayerKind::Application,
                }
                .into()
            })
    }

    pub fn routing_table(&self, node: NodeId) -> StarResult<&RoutingTable> {
        Ok(self.star(node)?.routing_table())
    }

    pub fn render_routing_table(&self, node: NodeId) -> StarResult<String> {
        Ok(self.star(node)?.render_routing_table())
    }

    /// Every node's routing table, in id order
    pub fn render_routing_tables(&self) -> String {
        self.topology
            .ids()
            .filter_map(|id| self.render_routing_table(id).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Node `node`'s view of the topology, rooted at `root`
    pub fn render_topology(&self, node: NodeId, root: NodeId) -> StarResult<String> {
        self.ensure_node(root)?;
        Ok(self.star(node)?.render_topology(root))
    }

    /// Source tree of `root` as known by `node`
    pub fn source_tree(&self, node: NodeId, root: NodeId) -> StarResult<SourceTree> {
        self.ensure_node(root)?;
        let engine = self.star(node)?;
        Ok(if root == node {
            engine.source_tree().clone()
        } else {
            engine.build_shortest_path_tree(root)
        })
    }

    pub fn render_source_tree(&self, node: NodeId, root: NodeId) -> StarResult<String> {
        self.ensure_node(root)?;
        Ok(self.star(node)?.render_source_tree(root))
    }

    /// Recompute `node`'s shortest-path tree from its current view and
    /// render it. The node's own tree is left as is.
    pub fn build_shortest_path_tree(&self, node: NodeId) -> StarResult<String> {
        let engine = self.star(node)?;
        let tree = engine.build_shortest_path_tree(node);
        tree.validate()?;
        if &tree != engine.source_tree() {
            warn!(%node, "recomputed tree differs from the installed one");
        }
        Ok(format!("Shortest-path tree of node {}\n{}", node, tree.render()))
    }

    pub fn node_stats(&self, node: NodeId) -> StarResult<&Stats> {
        Ok(self.star(node)?.stats())
    }

    /// Counters summed over every node
    pub fn stats(&self) -> Stats {
        let all: Vec<&Stats> = self
            .topology
            .ids()
            .filter_map(|id| self.star(id).ok())
            .map(StarNode::stats)
            .collect();
        Stats::aggregate(all)
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.stats().get(counter)
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.topology.channel_stats()
    }

    pub fn inbox(&self, node: NodeId) -> StarResult<&[Delivered]> {
        Ok(self.application(node)?.inbox())
    }

    pub fn undeliverable(&self, node: NodeId) -> StarResult<&[Undeliverable]> {
        Ok(self.application(node)?.undeliverable())
    }

    pub fn report(&self) -> SimReport {
        SimReport {
            now: self.now(),
            processed: self.processed(),
            pending: self.pending(),
            converged: self.is_converged(),
            terminated: self.is_terminated(),
            stats: self.stats(),
            channel: self.channel_stats(),
        }
    }
}
