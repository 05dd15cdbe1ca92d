//! STAR routing engine
//!
//! The routing layer of every node. It owns the node's topology view, the
//! source tree computed from it and the routing table derived from the
//! tree, and it floods link-state changes to its neighbors.
//!
//! ## Lifecycle
//!
//! ```text
//! UNINITIALIZED --INIT--> CONVERGING --stability window elapses--> STABLE
//!                              ^                                     |
//!                              +---------- view changes -------------+
//! ```
//!
//! ## Dissemination
//!
//! On INIT a node advertises its whole view. After that only entries that
//! actually changed the view are rebroadcast, so duplicated or stale
//! advertisements die out after one hop. A node that gains a new neighbor
//! additionally unicasts its whole view to it.

use std::any::Any;
use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use star_core::{
    AppMessage, ControlSignal, Delay, EventContent, Frame, FramePayload, Layer, LayerContext,
    LayerKind, LinkEntry, LinkStateAdvertisement, Metric, NodeId, StarResult,
};
use tracing::{debug, info, warn};

use crate::stats::{Counter, Stats};
use crate::table::RoutingTable;
use crate::tree::SourceTree;
use crate::view::TopologyView;

/// Convergence state of a node
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    #[display("UNINITIALIZED")]
    Uninitialized,
    #[display("CONVERGING")]
    Converging,
    #[display("STABLE")]
    Stable,
}

/// Routing engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ticks without a view change before a node declares itself stable
    pub stability_window: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stability_window: 20,
        }
    }
}

/// The STAR routing layer of one node
#[derive(Debug, Clone)]
pub struct StarNode {
    id: NodeId,
    config: EngineConfig,
    state: NodeState,
    /// Directly attached links and their weights
    neighbors: BTreeMap<NodeId, Metric>,
    view: TopologyView,
    tree: SourceTree,
    table: RoutingTable,
    stats: Stats,
    /// Bumped on every view change; stale stability checks are ignored
    generation: u64,
    initialized: bool,
}

impl StarNode {
    pub fn new(
        id: NodeId,
        neighbors: impl IntoIterator<Item = (NodeId, Metric)>,
        config: EngineConfig,
    ) -> Self {
        Self {
            id,
            config,
            state: NodeState::Uninitialized,
            neighbors: neighbors.into_iter().collect(),
            view: TopologyView::new(id),
            tree: SourceTree::singleton(id),
            table: RoutingTable::empty(id),
            stats: Stats::new(),
            generation: 0,
            initialized: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_stable(&self) -> bool {
        self.state == NodeState::Stable
    }

    pub fn neighbors(&self) -> &BTreeMap<NodeId, Metric> {
        &self.neighbors
    }

    pub fn view(&self) -> &TopologyView {
        &self.view
    }

    pub fn source_tree(&self) -> &SourceTree {
        &self.tree
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Shortest-path tree over this node's view, rooted at any node.
    ///
    /// Read-only; the node's own tree and table are untouched.
    pub fn build_shortest_path_tree(&self, root: NodeId) -> SourceTree {
        SourceTree::compute(&self.view, root)
    }

    pub fn render_routing_table(&self) -> String {
        self.table.render()
    }

    /// The part of this node's view reachable from `root`
    pub fn render_topology(&self, root: NodeId) -> String {
        self.view.render(root)
    }

    /// Source tree of `root` as computed from this node's view
    pub fn render_source_tree(&self, root: NodeId) -> String {
        let tree = if root == self.id {
            self.tree.clone()
        } else {
            self.build_shortest_path_tree(root)
        };
        format!(
            "Source tree of {} in node {}\n{}",
            root,
            self.id,
            tree.render()
        )
    }

    fn rebuild(&mut self) -> StarResult<()> {
        let tree = SourceTree::compute(&self.view, self.id);
        tree.validate()?;
        self.table = RoutingTable::from_tree(&tree);
        self.tree = tree;
        self.stats.incr(Counter::TreeRebuilds);
        debug!(node = %self.id, routes = self.table.len(), "source tree rebuilt");
        Ok(())
    }

    /// Recompute, restart the stability window and advertise `changed`
    fn on_view_changed(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        changed: Vec<LinkEntry>,
        full: bool,
    ) -> StarResult<()> {
        self.rebuild()?;
        if self.state == NodeState::Stable {
            debug!(node = %self.id, "leaving stable state");
        }
        self.state = NodeState::Converging;
        self.generation += 1;
        ctx.schedule_timer(
            EventContent::ControlSignal(ControlSignal::StabilityCheck {
                generation: self.generation,
            }),
            Delay::from_ticks(self.config.stability_window),
        )?;

        let lsa = if full {
            LinkStateAdvertisement::full(self.id, changed)
        } else {
            LinkStateAdvertisement::partial(self.id, changed)
        };
        debug!(node = %self.id, entries = lsa.len(), full, "advertising");
        self.stats.incr(Counter::UpdatesSent);
        ctx.send_down(EventContent::Frame(Frame::broadcast(
            self.id,
            FramePayload::LinkState(lsa),
        )))?;
        Ok(())
    }

    fn on_advertisement(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        lsa: LinkStateAdvertisement,
    ) -> StarResult<()> {
        self.stats.incr(Counter::UpdatesReceived);
        let outcome = self.view.merge(&lsa.entries);
        self.stats.add(Counter::StaleUpdates, outcome.stale as u64);
        if !outcome.is_changed() {
            return Ok(());
        }
        debug!(
            node = %self.id,
            from = %lsa.sender,
            changed = outcome.changed.len(),
            stale = outcome.stale,
            "view updated"
        );
        self.on_view_changed(ctx, outcome.changed, false)
    }

    fn on_link_change(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        neighbor: NodeId,
        cost: Option<Metric>,
    ) -> StarResult<()> {
        let previous = self.neighbors.get(&neighbor).copied();
        if previous == cost {
            return Ok(());
        }
        match cost {
            Some(cost) => self.neighbors.insert(neighbor, cost),
            None => self.neighbors.remove(&neighbor),
        };
        info!(node = %self.id, %neighbor, ?cost, "local link changed");

        let entry = self.view.originate(neighbor, cost);
        self.on_view_changed(ctx, vec![entry], false)?;

        if previous.is_none() && cost.is_some() {
            let full = LinkStateAdvertisement::full(self.id, self.view.snapshot());
            self.stats.incr(Counter::UpdatesSent);
            ctx.send_down(EventContent::Frame(Frame::unicast(
                self.id,
                neighbor,
                FramePayload::LinkState(full),
            )))?;
        }
        Ok(())
    }

    /// Hand a message to its next hop; `None` if there is no route
    fn forward(&mut self, ctx: &mut LayerContext<'_, '_>, msg: AppMessage) -> StarResult<bool> {
        let Some(next_hop) = self.table.next_hop(msg.destination) else {
            return Ok(false);
        };
        debug!(node = %self.id, id = %msg.id, %next_hop, "forwarding");
        ctx.send_down(EventContent::Frame(Frame::unicast(
            self.id,
            next_hop,
            FramePayload::Application(msg),
        )))?;
        Ok(true)
    }

    /// Originating request from the application layer
    fn on_outgoing(&mut self, ctx: &mut LayerContext<'_, '_>, msg: AppMessage) -> StarResult<()> {
        self.stats.incr(Counter::MessagesSent);
        if msg.destination == self.id {
            self.stats.incr(Counter::MessagesDelivered);
            ctx.send_up(EventContent::ApplicationPayload(msg))?;
            return Ok(());
        }

        let destination = msg.destination;
        let message = msg.id;
        if !self.forward(ctx, msg)? {
            warn!(node = %self.id, %destination, "destination unreachable");
            self.stats.incr(Counter::Unreachable);
            ctx.send_up(EventContent::ControlSignal(ControlSignal::Unreachable {
                destination,
                message,
            }))?;
        }
        Ok(())
    }

    /// Application message received from a neighbor
    fn on_transit(&mut self, ctx: &mut LayerContext<'_, '_>, mut msg: AppMessage) -> StarResult<()> {
        if msg.destination == self.id {
            self.stats.incr(Counter::MessagesDelivered);
            ctx.send_up(EventContent::ApplicationPayload(msg))?;
            return Ok(());
        }

        if msg.hops_remaining == 0 {
            warn!(node = %self.id, id = %msg.id, "hop limit exhausted, dropping");
            self.stats.incr(Counter::MessagesDropped);
            return Ok(());
        }
        msg.hops_remaining -= 1;

        let destination = msg.destination;
        if self.forward(ctx, msg)? {
            self.stats.incr(Counter::MessagesForwarded);
        } else {
            warn!(node = %self.id, %destination, "no route for transit message, dropping");
            self.stats.incr(Counter::Unreachable);
            self.stats.incr(Counter::MessagesDropped);
        }
        Ok(())
    }
}

impl Layer for StarNode {
    fn kind(&self) -> LayerKind {
        LayerKind::Routing
    }

    fn on_init(&mut self, ctx: &mut LayerContext<'_, '_>) -> StarResult<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        let neighbors: Vec<_> = self.neighbors.iter().map(|(n, c)| (*n, *c)).collect();
        for (neighbor, cost) in neighbors {
            self.view.originate(neighbor, Some(cost));
        }
        info!(node = %self.id, neighbors = self.neighbors.len(), "routing engine initialized");
        self.on_view_changed(ctx, self.view.snapshot(), true)
    }

    fn on_message_from_top(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()> {
        match content {
            EventContent::ApplicationPayload(msg) => self.on_outgoing(ctx, msg),
            other => {
                debug!(node = %self.id, content = other.label(), "ignoring content from above");
                Ok(())
            }
        }
    }

    fn on_message_from_bottom(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()> {
        match content {
            EventContent::LinkStateAdvertisement(lsa) => self.on_advertisement(ctx, lsa),
            EventContent::ApplicationPayload(msg) => self.on_transit(ctx, msg),
            other => {
                debug!(node = %self.id, content = other.label(), "ignoring content from below");
                Ok(())
            }
        }
    }

    fn on_timer(&mut self, _ctx: &mut LayerContext<'_, '_>, content: EventContent) -> StarResult<()> {
        if let EventContent::ControlSignal(ControlSignal::StabilityCheck { generation }) = content
            && generation == self.generation
            && self.state == NodeState::Converging
        {
            self.state = NodeState::Stable;
            info!(node = %self.id, routes = self.table.len(), "node stable");
        }
        Ok(())
    }

    fn on_topology_update(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()> {
        match content {
            EventContent::ControlSignal(ControlSignal::LinkChange { neighbor, cost }) => {
                self.on_link_change(ctx, neighbor, cost)
            }
            other => {
                debug!(node = %self.id, content = other.label(), "ignoring topology update");
                Ok(())
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
