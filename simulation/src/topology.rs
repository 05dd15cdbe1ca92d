//! Network topology
//!
//! Instantiates one node stack per graph vertex, owns the channel and routes
//! every dispatched event: events addressed to a node's channel endpoint are
//! handed to the channel and fanned out to the neighbors' bottom layers,
//! everything else goes to the addressed layer through the [`Directory`].
//!
//! Channel adjacency always mirrors the graph, including after link changes.

use std::collections::{BTreeMap, BTreeSet};

use star_core::{
    Address, Channel, ChannelStats, ControlSignal, Endpoint, Event, EventContent, EventHandler,
    EventKind, IdentityError, Kernel, KernelContext, Layer, LayerKind, Metric, NodeId, NodeStack,
    ScheduledEvent, StarResult, WiringError,
};
use tracing::{debug, info, trace};

use crate::config::SimConfig;
use crate::graph::WeightedGraph;
use crate::node::NodeFactory;

/// Layer that receives link up/down/cost notifications
const TOPOLOGY_LISTENER: LayerKind = LayerKind::Routing;

/// Every component of the network, keyed by (layer kind, node id)
#[derive(Debug, Default)]
pub struct Directory {
    stacks: BTreeMap<NodeId, NodeStack>,
    components: BTreeSet<(LayerKind, NodeId)>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node's stack, returning the stack it replaces
    pub fn register(&mut self, stack: NodeStack) -> Option<NodeStack> {
        let node = stack.node();
        self.components.retain(|(_, n)| *n != node);
        self.components.extend(stack.kinds().map(|kind| (kind, node)));
        self.stacks.insert(node, stack)
    }

    pub fn contains(&self, kind: LayerKind, node: NodeId) -> bool {
        self.components.contains(&(kind, node))
    }

    /// Registered components in key order
    pub fn components(&self) -> impl Iterator<Item = (LayerKind, NodeId)> + '_ {
        self.components.iter().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.stacks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn stack(&self, node: NodeId) -> Option<&NodeStack> {
        self.stacks.get(&node)
    }

    /// Concrete layer of a node
    pub fn layer<T: Layer + 'static>(&self, node: NodeId) -> Option<&T> {
        self.stacks.get(&node).and_then(|s| s.layer::<T>())
    }

    /// Stack owning the layer at `address`
    pub fn resolve(&mut self, address: Address) -> StarResult<&mut NodeStack> {
        if let Endpoint::Layer(kind) = address.endpoint
            && !self.components.contains(&(kind, address.node))
            && self.stacks.contains_key(&address.node)
        {
            return Err(WiringError::UnknownLayer {
                node: address.node,
                layer: kind,
            }
            .into());
        }
        self.stacks
            .get_mut(&address.node)
            .ok_or_else(|| IdentityError::NoSuchNode(address.node).into())
    }
}

/// The simulated network: graph, node stacks and channel
pub struct Topology {
    graph: WeightedGraph,
    directory: Directory,
    channel: Box<dyn Channel>,
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("graph", &self.graph)
            .field("directory", &self.directory)
            .field("channel", &self.channel.name())
            .finish()
    }
}

impl Topology {
    /// Validate `graph` and build one stack per vertex.
    ///
    /// Nothing is built if the graph is disconnected or the channel
    /// configuration is invalid.
    pub fn build(
        graph: WeightedGraph,
        factory: &dyn NodeFactory,
        config: &SimConfig,
    ) -> StarResult<Self> {
        graph.ensure_connected()?;
        let channel = config.channel.build()?;

        let mut directory = Directory::new();
        for id in graph.nodes() {
            let stack = factory.build(id, &graph, config)?;
            directory.register(stack);
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            channel = channel.name(),
            "topology built"
        );

        Ok(Self {
            graph,
            directory,
            channel,
        })
    }

    /// Schedule INIT for every layer of every node, bottom layers first
    pub fn start(&self, kernel: &mut Kernel) -> StarResult<usize> {
        let mut count = 0;
        for stack in self.directory.stacks.values() {
            for event in stack.init_events() {
                kernel.schedule(event, 0)?;
                count += 1;
            }
        }
        debug!(events = count, "INIT scheduled");
        Ok(count)
    }

    pub fn graph(&self) -> &WeightedGraph {
        &self.graph
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.directory.ids()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.directory.stack(node).is_some()
    }

    pub fn node(&self, node: NodeId) -> StarResult<&NodeStack> {
        self.directory
            .stack(node)
            .ok_or_else(|| IdentityError::NoSuchNode(node).into())
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    /// Change, add (`Some`) or remove (`None`) the link between `a` and `b`.
    ///
    /// Adjacency is updated immediately; the returned TOPOLOGY-UPDATE events
    /// inform both endpoints and must be scheduled by the caller.
    pub fn set_link(&mut self, a: NodeId, b: NodeId, cost: Option<Metric>) -> StarResult<[Event; 2]> {
        self.graph.set_edge(a, b, cost.map(i64::from))?;
        info!(%a, %b, ?cost, "link changed");
        let notify = |node: NodeId, neighbor: NodeId| {
            Event::new(
                None,
                Address::layer(node, TOPOLOGY_LISTENER),
                EventKind::TopologyUpdate,
                EventContent::ControlSignal(ControlSignal::LinkChange { neighbor, cost }),
            )
        };
        Ok([notify(a, b), notify(b, a)])
    }

    /// Hand a frame to the channel and schedule one delivery per copy
    fn transmit(&mut self, ctx: &mut KernelContext<'_>, event: Event) -> StarResult<()> {
        let sender = event.target.node;
        let EventContent::Frame(frame) = event.content else {
            debug!(node = %sender, content = event.content.label(), "non-frame content at channel dropped");
            return Ok(());
        };

        let neighbors = self.graph.neighbor_ids(sender);
        for tx in self.channel.transmit(&frame, &neighbors) {
            let bottom = self
                .directory
                .stack(tx.to)
                .and_then(|s| s.bottom())
                .ok_or(IdentityError::NoSuchNode(tx.to))?;
            trace!(from = %sender, to = %tx.to, delay = %tx.delay, "frame in flight");
            let delivery = Event::new(
                Some(Address::channel(sender)),
                Address::layer(tx.to, bottom),
                EventKind::MessageFromBottom,
                EventContent::Frame(frame.clone()),
            );
            ctx.schedule(delivery, tx.delay)?;
        }
        Ok(())
    }
}

impl EventHandler for Topology {
    fn handle(&mut self, ctx: &mut KernelContext<'_>, scheduled: ScheduledEvent) -> StarResult<()> {
        let target = scheduled.event.target;
        match target.endpoint {
            Endpoint::Channel => self.transmit(ctx, scheduled.event),
            Endpoint::Layer(_) => self.directory.resolve(target)?.dispatch(ctx, scheduled),
        }
    }
}
