//! Simulation events
//!
//! Every effect in the simulator is an [`Event`] addressed to one endpoint of
//! one node's stack. Events are immutable once created; the kernel wraps them
//! in a [`ScheduledEvent`] carrying the dispatch time and insertion sequence.

use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::component::LayerKind;
use crate::identity::NodeId;
use crate::lsa::{LinkStateAdvertisement, Metric};
use crate::time::SimTime;

/// Strictly increasing event identifier, the tie-breaker between events
/// scheduled for the same instant
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("E#{_0}")]
pub struct EventId(u64);

impl EventId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Monotonic event id generator, one per kernel
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

/// The fixed set of event kinds
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[display("INIT")]
    Init,
    #[display("MESSAGE-FROM-TOP")]
    MessageFromTop,
    #[display("MESSAGE-FROM-BOTTOM")]
    MessageFromBottom,
    #[display("TIMER")]
    Timer,
    #[display("TOPOLOGY-UPDATE")]
    TopologyUpdate,
}

/// Where on a node an event is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// A protocol layer of the node's stack
    Layer(LayerKind),
    /// The node's attachment to the shared channel
    Channel,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Layer(kind) => write!(f, "{}", kind),
            Endpoint::Channel => write!(f, "channel"),
        }
    }
}

/// A component reference: one endpoint on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub node: NodeId,
    pub endpoint: Endpoint,
}

impl Address {
    pub fn layer(node: NodeId, kind: LayerKind) -> Self {
        Self {
            node,
            endpoint: Endpoint::Layer(kind),
        }
    }

    pub fn channel(node: NodeId) -> Self {
        Self {
            node,
            endpoint: Endpoint::Channel,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint, self.node)
    }
}

/// Identifier of an application message: originator plus its local counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub source: NodeId,
    pub sequence: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source, self.sequence)
    }
}

/// An end-to-end application message with opaque content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMessage {
    pub id: MessageId,
    pub source: NodeId,
    pub destination: NodeId,
    pub body: Bytes,
    /// Forwarding budget, decremented at every relay
    pub hops_remaining: u32,
}

impl AppMessage {
    pub fn new(id: MessageId, destination: NodeId, body: Bytes, hop_limit: u32) -> Self {
        Self {
            id,
            source: id.source,
            destination,
            body,
            hops_remaining: hop_limit,
        }
    }

    /// Body rendered as text for observers
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Control signals exchanged between the operator, the topology and layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlSignal {
    /// Operator request for the application layer to originate a message
    SendMessage { destination: NodeId, body: Bytes },
    /// Routing engine report: no route to the destination of a message
    Unreachable {
        destination: NodeId,
        message: MessageId,
    },
    /// One-shot timer checking whether the view stayed unchanged
    StabilityCheck { generation: u64 },
    /// A directly attached link changed cost, came up (`Some`) or went down (`None`)
    LinkChange {
        neighbor: NodeId,
        cost: Option<Metric>,
    },
}

/// Link-level destination of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkAddress {
    Broadcast,
    Unicast(NodeId),
}

impl LinkAddress {
    /// Whether a frame with this destination is meant for `node`
    pub fn accepts(&self, node: NodeId) -> bool {
        match self {
            LinkAddress::Broadcast => true,
            LinkAddress::Unicast(dst) => *dst == node,
        }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddress::Broadcast => write!(f, "*"),
            LinkAddress::Unicast(node) => write!(f, "{}", node),
        }
    }
}

/// What a frame carries across the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramePayload {
    Application(AppMessage),
    LinkState(LinkStateAdvertisement),
}

impl From<FramePayload> for EventContent {
    fn from(payload: FramePayload) -> Self {
        match payload {
            FramePayload::Application(msg) => EventContent::ApplicationPayload(msg),
            FramePayload::LinkState(lsa) => EventContent::LinkStateAdvertisement(lsa),
        }
    }
}

/// A link-layer frame: addressing header plus payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub src: NodeId,
    pub dst: LinkAddress,
    pub payload: FramePayload,
}

impl Frame {
    pub fn broadcast(src: NodeId, payload: FramePayload) -> Self {
        Self {
            src,
            dst: LinkAddress::Broadcast,
            payload,
        }
    }

    pub fn unicast(src: NodeId, dst: NodeId, payload: FramePayload) -> Self {
        Self {
            src,
            dst: LinkAddress::Unicast(dst),
            payload,
        }
    }
}

/// Tagged event content; handlers match on it exhaustively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventContent {
    /// No content (INIT)
    Empty,
    ApplicationPayload(AppMessage),
    LinkStateAdvertisement(LinkStateAdvertisement),
    ControlSignal(ControlSignal),
    /// Link-level envelope between a link layer and the channel
    Frame(Frame),
}

impl EventContent {
    /// Short name used in logs
    pub fn label(&self) -> &'static str {
        match self {
            EventContent::Empty => "empty",
            EventContent::ApplicationPayload(_) => "application",
            EventContent::LinkStateAdvertisement(_) => "lsa",
            EventContent::ControlSignal(_) => "control",
            EventContent::Frame(_) => "frame",
        }
    }
}

/// An immutable simulation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Component that produced the event, `None` for the operator or kernel
    pub source: Option<Address>,
    pub target: Address,
    pub kind: EventKind,
    pub content: EventContent,
}

impl Event {
    pub fn new(
        source: Option<Address>,
        target: Address,
        kind: EventKind,
        content: EventContent,
    ) -> Self {
        Self {
            source,
            target,
            kind,
            content,
        }
    }

    /// An INIT event for one layer of a node
    pub fn init(target: Address) -> Self {
        Self::new(None, target, EventKind::Init, EventContent::Empty)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.kind, self.target, self.content.label())
    }
}

/// A queued event with its dispatch time and insertion sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub id: EventId,
    pub at: SimTime,
    pub event: Event,
}

/// Ordering: smallest `(at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural order is reversed here.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
