//! Layered component model
//!
//! Each node is a vertical stack of [`Layer`]s. Every layer has exactly two
//! ports: UP, wired to the layer above, and DOWN, wired to the layer below
//! (or, for the bottom layer, to the shared channel). A layer can only talk
//! to its immediate vertical neighbors, through [`LayerContext::send_up`] and
//! [`LayerContext::send_down`]. Both schedule an event at the current instant
//! rather than calling the peer directly.

use std::any::Any;
use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::trace_span;

use crate::error::{StarResult, WiringError};
use crate::event::{Address, Endpoint, Event, EventContent, EventId, EventKind, ScheduledEvent};
use crate::identity::NodeId;
use crate::kernel::KernelContext;
use crate::time::{Delay, SimTime};

/// The two ports of a layer
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    #[display("UP")]
    Up,
    #[display("DOWN")]
    Down,
}

/// Kind of a layer; at most one layer of each kind per node
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LayerKind {
    #[display("application")]
    Application,
    #[display("routing")]
    Routing,
    #[display("link")]
    Link,
}

/// Resolved peers of a layer's two ports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connectors {
    pub up: Option<Endpoint>,
    pub down: Option<Endpoint>,
}

impl Connectors {
    pub fn get(&self, port: Port) -> Option<Endpoint> {
        match port {
            Port::Up => self.up,
            Port::Down => self.down,
        }
    }

    fn slot(&mut self, port: Port) -> &mut Option<Endpoint> {
        match port {
            Port::Up => &mut self.up,
            Port::Down => &mut self.down,
        }
    }
}

/// A protocol layer in a node stack.
///
/// Handlers run synchronously inside the kernel's dispatch; any side effect
/// goes through the supplied [`LayerContext`]. Returning an error halts the
/// simulation.
pub trait Layer: Send {
    fn kind(&self) -> LayerKind;

    fn on_init(&mut self, _ctx: &mut LayerContext<'_, '_>) -> StarResult<()> {
        Ok(())
    }

    /// Content pushed down by the layer above
    fn on_message_from_top(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()>;

    /// Content pushed up by the layer below (or delivered by the channel)
    fn on_message_from_bottom(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()>;

    fn on_timer(&mut self, _ctx: &mut LayerContext<'_, '_>, _content: EventContent) -> StarResult<()> {
        Ok(())
    }

    fn on_topology_update(
        &mut self,
        _ctx: &mut LayerContext<'_, '_>,
        _content: EventContent,
    ) -> StarResult<()> {
        Ok(())
    }

    /// Downcast support for `NodeStack::layer`
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What a layer may do while handling an event
pub struct LayerContext<'a, 'k> {
    kernel: &'a mut KernelContext<'k>,
    node: NodeId,
    layer: LayerKind,
    connectors: Connectors,
}

impl<'a, 'k> LayerContext<'a, 'k> {
    pub fn new(
        kernel: &'a mut KernelContext<'k>,
        node: NodeId,
        layer: LayerKind,
        connectors: Connectors,
    ) -> Self {
        Self {
            kernel,
            node,
            layer,
            connectors,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    fn address(&self) -> Address {
        Address::layer(self.node, self.layer)
    }

    /// Push content to the peer on the UP port
    pub fn send_up(&mut self, content: EventContent) -> StarResult<EventId> {
        self.send(Port::Up, EventKind::MessageFromBottom, content)
    }

    /// Push content to the peer on the DOWN port
    pub fn send_down(&mut self, content: EventContent) -> StarResult<EventId> {
        self.send(Port::Down, EventKind::MessageFromTop, content)
    }

    /// Schedule a TIMER event to this layer after `delay`
    pub fn schedule_timer(&mut self, content: EventContent, delay: Delay) -> StarResult<EventId> {
        let me = self.address();
        let event = Event::new(Some(me), me, EventKind::Timer, content);
        Ok(self.kernel.schedule(event, delay)?)
    }

    fn send(&mut self, port: Port, kind: EventKind, content: EventContent) -> StarResult<EventId> {
        let peer = self
            .connectors
            .get(port)
            .ok_or(WiringError::DanglingPort {
                node: self.node,
                layer: self.layer,
                port,
            })?;
        let target = Address {
            node: self.node,
            endpoint: peer,
        };
        let event = Event::new(Some(self.address()), target, kind, content);
        Ok(self.kernel.schedule(event, Delay::NOW)?)
    }
}

/// Assembles and validates one node's stack.
///
/// Layers are registered with [`StackBuilder::layer`] and wired pairwise
/// with [`StackBuilder::connect`]; the bottom layer is attached to the
/// channel with [`StackBuilder::attach_channel`]. `build` rejects anything
/// that is not a strict vertical chain ending at the channel.
pub struct StackBuilder {
    node: NodeId,
    layers: Vec<Box<dyn Layer>>,
    connectors: Vec<Connectors>,
    error: Option<WiringError>,
}

impl StackBuilder {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            layers: Vec::new(),
            connectors: Vec::new(),
            error: None,
        }
    }

    /// Wire `layers` (top to bottom) into a chain attached to the channel
    pub fn vertical(node: NodeId, layers: Vec<Box<dyn Layer>>) -> StarResult<NodeStack> {
        let kinds: Vec<LayerKind> = layers.iter().map(|l| l.kind()).collect();
        let mut builder = Self::new(node);
        for layer in layers {
            builder = builder.layer(layer);
        }
        for pair in kinds.windows(2) {
            builder = builder.connect(pair[0], pair[1]);
        }
        if let Some(bottom) = kinds.last() {
            builder = builder.attach_channel(*bottom);
        }
        builder.build()
    }

    /// Register a layer
    pub fn layer(mut self, layer: Box<dyn Layer>) -> Self {
        if self.error.is_none() && self.position(layer.kind()).is_some() {
            self.error = Some(WiringError::DuplicateLayer {
                node: self.node,
                layer: layer.kind(),
            });
        }
        self.layers.push(layer);
        self.connectors.push(Connectors::default());
        self
    }

    /// Wire `upper`'s DOWN port to `lower`'s UP port
    pub fn connect(mut self, upper: LayerKind, lower: LayerKind) -> Self {
        if upper == lower {
            self.fail(WiringError::NotVertical {
                node: self.node,
                reason: format!("layer {} connected to itself", upper),
            });
            return self;
        }
        self.wire(upper, Port::Down, Endpoint::Layer(lower));
        self.wire(lower, Port::Up, Endpoint::Layer(upper));
        self
    }

    /// Wire `bottom`'s DOWN port to the channel
    pub fn attach_channel(mut self, bottom: LayerKind) -> Self {
        self.wire(bottom, Port::Down, Endpoint::Channel);
        self
    }

    fn position(&self, kind: LayerKind) -> Option<usize> {
        self.layers.iter().position(|l| l.kind() == kind)
    }

    fn fail(&mut self, err: WiringError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn wire(&mut self, layer: LayerKind, port: Port, peer: Endpoint) {
        let Some(index) = self.position(layer) else {
            self.fail(WiringError::UnknownLayer {
                node: self.node,
                layer,
            });
            return;
        };
        let slot = self.connectors[index].slot(port);
        if slot.is_some() {
            let node = self.node;
            self.fail(WiringError::DuplicatePort { node, layer, port });
            return;
        }
        *slot = Some(peer);
    }

    /// Validate the wiring and produce the stack, ordered top to bottom
    pub fn build(self) -> StarResult<NodeStack> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        if self.layers.is_empty() {
            return Err(WiringError::EmptyStack(self.node).into());
        }

        let node = self.node;
        for (layer, conn) in self.layers.iter().zip(&self.connectors) {
            if conn.down.is_none() {
                return Err(WiringError::DanglingPort {
                    node,
                    layer: layer.kind(),
                    port: Port::Down,
                }
                .into());
            }
        }

        let mut tops = self
            .connectors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.up.is_none())
            .map(|(i, _)| i);
        let Some(top) = tops.next() else {
            return Err(WiringError::NotVertical {
                node,
                reason: "every UP port is wired, the chain has no top".to_string(),
            }
            .into());
        };
        if let Some(extra) = tops.next() {
            return Err(WiringError::DanglingPort {
                node,
                layer: self.layers[extra].kind(),
                port: Port::Up,
            }
            .into());
        }

        // Walk DOWN from the top; every hop must be mirrored by the lower
        // layer's UP port and the walk must end at the channel
        let mut order = vec![top];
        let mut current = top;
        loop {
            match self.connectors[current].down {
                Some(Endpoint::Channel) => break,
                Some(Endpoint::Layer(kind)) => {
                    let next = self.position(kind).ok_or(WiringError::UnknownLayer {
                        node,
                        layer: kind,
                    })?;
                    let here = Endpoint::Layer(self.layers[current].kind());
                    if self.connectors[next].up != Some(here) || order.contains(&next) {
                        return Err(WiringError::NotVertical {
                            node,
                            reason: format!(
                                "{} below {} does not point back up",
                                kind,
                                self.layers[current].kind()
                            ),
                        }
                        .into());
                    }
                    order.push(next);
                    current = next;
                }
                None => {
                    return Err(WiringError::DanglingPort {
                        node,
                        layer: self.layers[current].kind(),
                        port: Port::Down,
                    }
                    .into());
                }
            }
        }
        if order.len() != self.layers.len() {
            return Err(WiringError::NotVertical {
                node,
                reason: format!(
                    "{} of {} layers reachable from the top",
                    order.len(),
                    self.layers.len()
                ),
            }
            .into());
        }

        let mut slots: Vec<Option<(Box<dyn Layer>, Connectors)>> = self
            .layers
            .into_iter()
            .zip(self.connectors)
            .map(Some)
            .collect();
        let mut layers = Vec::with_capacity(order.len());
        let mut connectors = Vec::with_capacity(order.len());
        for index in order {
            if let Some((layer, conn)) = slots[index].take() {
                layers.push(layer);
                connectors.push(conn);
            }
        }

        Ok(NodeStack {
            node,
            layers,
            connectors,
        })
    }
}

/// A validated stack of layers for one node, top to bottom
pub struct NodeStack {
    node: NodeId,
    layers: Vec<Box<dyn Layer>>,
    connectors: Vec<Connectors>,
}

impl fmt::Debug for NodeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStack")
            .field("node", &self.node)
            .field("layers", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeStack {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Layer kinds, top to bottom
    pub fn kinds(&self) -> impl Iterator<Item = LayerKind> + '_ {
        self.layers.iter().map(|l| l.kind())
    }

    /// The layer wired to the channel
    pub fn bottom(&self) -> Option<LayerKind> {
        self.layers.last().map(|l| l.kind())
    }

    pub fn top(&self) -> Option<LayerKind> {
        self.layers.first().map(|l| l.kind())
    }

    pub fn connectors(&self, kind: LayerKind) -> Option<Connectors> {
        self.index(kind).map(|i| self.connectors[i])
    }

    fn index(&self, kind: LayerKind) -> Option<usize> {
        self.layers.iter().position(|l| l.kind() == kind)
    }

    /// One INIT event per layer, bottom first
    pub fn init_events(&self) -> Vec<Event> {
        self.layers
            .iter()
            .rev()
            .map(|l| Event::init(Address::layer(self.node, l.kind())))
            .collect()
    }

    /// Downcast to a concrete layer type
    pub fn layer<T: Layer + 'static>(&self) -> Option<&T> {
        self.layers.iter().find_map(|l| l.as_any().downcast_ref::<T>())
    }

    pub fn layer_mut<T: Layer + 'static>(&mut self) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find_map(|l| l.as_any_mut().downcast_mut::<T>())
    }

    /// Dispatch an event addressed to one of this stack's layers
    pub fn dispatch(
        &mut self,
        kernel: &mut KernelContext<'_>,
        scheduled: ScheduledEvent,
    ) -> StarResult<()> {
        let event = scheduled.event;
        let Endpoint::Layer(kind) = event.target.endpoint else {
            return Err(WiringError::NotVertical {
                node: self.node,
                reason: "stack received an event addressed to the channel".to_string(),
            }
            .into());
        };
        let index = self.index(kind).ok_or(WiringError::UnknownLayer {
            node: self.node,
            layer: kind,
        })?;

        let span = trace_span!("dispatch", node = %self.node, layer = %kind, kind = %event.kind);
        let _enter = span.enter();

        let connectors = self.connectors[index];
        let layer = &mut self.layers[index];
        let mut ctx = LayerContext::new(kernel, self.node, kind, connectors);
        match event.kind {
            EventKind::Init => layer.on_init(&mut ctx),
            EventKind::MessageFromTop => layer.on_message_from_top(&mut ctx, event.content),
            EventKind::MessageFromBottom => layer.on_message_from_bottom(&mut ctx, event.content),
            EventKind::Timer => layer.on_timer(&mut ctx, event.content),
            EventKind::TopologyUpdate => layer.on_topology_update(&mut ctx, event.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StarError;
    use crate::kernel::Kernel;

    /// Records what it receives and relays it one layer further
    struct Relay {
        kind: LayerKind,
        seen: Vec<(EventKind, EventContent)>,
    }

    impl Relay {
        fn boxed(kind: LayerKind) -> Box<dyn Layer> {
            Box::new(Self {
                kind,
                seen: Vec::new(),
            })
        }
    }

    impl Layer for Relay {
        fn kind(&self) -> LayerKind {
            self.kind
        }

        fn on_message_from_top(
            &mut self,
            ctx: &mut LayerContext<'_, '_>,
            content: EventContent,
        ) -> StarResult<()> {
            self.seen.push((EventKind::MessageFromTop, content.clone()));
            if self.kind != LayerKind::Link {
                ctx.send_down(content)?;
            }
            Ok(())
        }

        fn on_message_from_bottom(
            &mut self,
            ctx: &mut LayerContext<'_, '_>,
            content: EventContent,
        ) -> StarResult<()> {
            self.seen.push((EventKind::MessageFromBottom, content.clone()));
            if self.kind != LayerKind::Application {
                ctx.send_up(content)?;
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn three_layers() -> Vec<Box<dyn Layer>> {
        vec![
            Relay::boxed(LayerKind::Application),
            Relay::boxed(LayerKind::Routing),
            Relay::boxed(LayerKind::Link),
        ]
    }

    fn wiring_error(result: StarResult<NodeStack>) -> WiringError {
        match result {
            Err(StarError::Wiring(err)) => err,
            other => panic!("expected wiring error, got {:?}", other),
        }
    }

    #[test]
    fn test_vertical_stack() {
        let stack = StackBuilder::vertical(NodeId(1), three_layers()).unwrap();
        assert_eq!(
            stack.kinds().collect::<Vec<_>>(),
            vec![LayerKind::Application, LayerKind::Routing, LayerKind::Link]
        );
        assert_eq!(stack.bottom(), Some(LayerKind::Link));
        assert_eq!(
            stack.connectors(LayerKind::Link).unwrap().down,
            Some(Endpoint::Channel)
        );
        assert_eq!(stack.connectors(LayerKind::Application).unwrap().up, None);
        assert_eq!(stack.init_events()[0].target.endpoint, Endpoint::Layer(LayerKind::Link));
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let stack = StackBuilder::new(NodeId(0))
            .layer(Relay::boxed(LayerKind::Link))
            .layer(Relay::boxed(LayerKind::Application))
            .layer(Relay::boxed(LayerKind::Routing))
            .connect(LayerKind::Routing, LayerKind::Link)
            .connect(LayerKind::Application, LayerKind::Routing)
            .attach_channel(LayerKind::Link)
            .build()
            .unwrap();
        assert_eq!(stack.top(), Some(LayerKind::Application));
    }

    #[test]
    fn test_empty_stack_rejected() {
        let err = wiring_error(StackBuilder::new(NodeId(3)).build());
        assert_eq!(err, WiringError::EmptyStack(NodeId(3)));
    }

    #[test]
    fn test_duplicate_layer_rejected() {
        let layers = vec![Relay::boxed(LayerKind::Routing), Relay::boxed(LayerKind::Routing)];
        let err = wiring_error(StackBuilder::vertical(NodeId(0), layers));
        assert!(matches!(err, WiringError::DuplicateLayer { .. }));
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let result = StackBuilder::new(NodeId(0))
            .layer(Relay::boxed(LayerKind::Routing))
            .layer(Relay::boxed(LayerKind::Link))
            .connect(LayerKind::Routing, LayerKind::Link)
            .attach_channel(LayerKind::Link)
            .attach_channel(LayerKind::Link)
            .build();
        assert_eq!(
            wiring_error(result),
            WiringError::DuplicatePort {
                node: NodeId(0),
                layer: LayerKind::Link,
                port: Port::Down,
            }
        );
    }

    #[test]
    fn test_dangling_port_rejected() {
        // Link never attached to the channel
        let result = StackBuilder::new(NodeId(0))
            .layer(Relay::boxed(LayerKind::Routing))
            .layer(Relay::boxed(LayerKind::Link))
            .connect(LayerKind::Routing, LayerKind::Link)
            .build();
        assert!(matches!(
            wiring_error(result),
            WiringError::DanglingPort { port: Port::Down, .. }
        ));

        // Two disconnected layers both attached to the channel
        let result = StackBuilder::new(NodeId(0))
            .layer(Relay::boxed(LayerKind::Routing))
            .layer(Relay::boxed(LayerKind::Link))
            .attach_channel(LayerKind::Routing)
            .attach_channel(LayerKind::Link)
            .build();
        assert!(matches!(
            wiring_error(result),
            WiringError::DanglingPort { port: Port::Up, .. }
        ));
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let result = StackBuilder::new(NodeId(0))
            .layer(Relay::boxed(LayerKind::Link))
            .connect(LayerKind::Routing, LayerKind::Link)
            .build();
        assert!(matches!(
            wiring_error(result),
            WiringError::UnknownLayer { layer: LayerKind::Routing, .. }
        ));
    }

    #[test]
    fn test_send_down_and_up_reach_adjacent_layers() {
        let mut stack = StackBuilder::vertical(NodeId(4), three_layers()).unwrap();
        let mut kernel = Kernel::new();
        let payload = EventContent::Empty;
        kernel
            .schedule(
                Event::new(
                    None,
                    Address::layer(NodeId(4), LayerKind::Application),
                    EventKind::MessageFromTop,
                    payload.clone(),
                ),
                0,
            )
            .unwrap();

        let mut to_channel = Vec::new();
        kernel
            .run(&mut |ctx: &mut KernelContext<'_>, s: ScheduledEvent| {
                if s.event.target.endpoint == Endpoint::Channel {
                    to_channel.push(s.event);
                    Ok(())
                } else {
                    stack.dispatch(ctx, s)
                }
            })
            .unwrap();

        // Link is the bottom and does not forward to the channel in this relay
        assert!(to_channel.is_empty());
        let link = stack
            .layers
            .iter()
            .find_map(|l| l.as_any().downcast_ref::<Relay>().filter(|r| r.kind == LayerKind::Link))
            .unwrap();
        assert_eq!(link.seen, vec![(EventKind::MessageFromTop, payload)]);
    }

    #[test]
    fn test_top_layer_send_up_is_dangling() {
        let mut stack = StackBuilder::vertical(NodeId(0), vec![Relay::boxed(LayerKind::Routing)]).unwrap();
        let mut kernel = Kernel::new();
        kernel
            .schedule(
                Event::new(
                    None,
                    Address::layer(NodeId(0), LayerKind::Routing),
                    EventKind::MessageFromBottom,
                    EventContent::Empty,
                ),
                0,
            )
            .unwrap();

        let result = kernel.run(&mut |ctx: &mut KernelContext<'_>, s: ScheduledEvent| {
            stack.dispatch(ctx, s)
        });
        assert!(matches!(
            result,
            Err(StarError::Wiring(WiringError::DanglingPort { port: Port::Up, .. }))
        ));
    }
}
