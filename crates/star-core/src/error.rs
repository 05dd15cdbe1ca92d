//! Error types for the STAR network simulator

use thiserror::Error;

use crate::component::{LayerKind, Port};
use crate::identity::NodeId;

/// Top-level error type for the simulator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StarError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Invalid wiring: {0}")]
    Wiring(#[from] WiringError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors related to node identity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid node id format: {0:?}")]
    InvalidFormat(String),

    #[error("No such node: {0}")]
    NoSuchNode(NodeId),
}

/// Errors raised by the event kernel
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    #[error("Invalid delay {0}: delays must not be negative")]
    InvalidDelay(i64),

    #[error("Invalid channel delay {0}: propagation delay must be positive")]
    InvalidChannelDelay(u64),

    #[error("Simulated clock overflow")]
    TimeOverflow,

    #[error("Kernel terminated, no new events accepted")]
    Terminated,

    #[error("Event limit of {0} reached")]
    EventLimit(u64),

    #[error("Invalid channel configuration: {0}")]
    InvalidChannel(String),
}

/// Structural errors in the layer/connector setup (`InvalidWiring`)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WiringError {
    #[error("Stack for node {0} has no layers")]
    EmptyStack(NodeId),

    #[error("Layer {layer} appears twice in the stack of node {node}")]
    DuplicateLayer { node: NodeId, layer: LayerKind },

    #[error("Port {port:?} of layer {layer} on node {node} is already wired")]
    DuplicatePort {
        node: NodeId,
        layer: LayerKind,
        port: Port,
    },

    #[error("Port {port:?} of layer {layer} on node {node} is not wired")]
    DanglingPort {
        node: NodeId,
        layer: LayerKind,
        port: Port,
    },

    #[error("Layer {layer} is not part of the stack of node {node}")]
    UnknownLayer { node: NodeId, layer: LayerKind },

    #[error("Stack of node {node} is not a vertical chain: {reason}")]
    NotVertical { node: NodeId, reason: String },
}

/// Errors in the supplied topology graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Graph has no nodes")]
    EmptyGraph,

    #[error("Edge {a}-{b} has invalid weight {weight}: weights must be at least 1")]
    InvalidWeight { a: NodeId, b: NodeId, weight: i64 },

    #[error("Edge {a}-{b} appears more than once")]
    DuplicateEdge { a: NodeId, b: NodeId },

    #[error("Self loop on node {0}")]
    SelfLoop(NodeId),

    #[error("Edge endpoint {0} is not a node of the graph")]
    UnknownEndpoint(NodeId),

    #[error("Graph is disconnected: {unreachable:?} cannot be reached from {from}")]
    Disconnected {
        from: NodeId,
        unreachable: Vec<NodeId>,
    },

    #[error("No such node: {0}")]
    NoSuchNode(NodeId),

    #[error("No link between {a} and {b}")]
    NoSuchLink { a: NodeId, b: NodeId },
}

/// Errors raised by route computation and lookup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Destination {destination} is unreachable from node {node}")]
    Unreachable { node: NodeId, destination: NodeId },

    #[error("Invalid source tree at node {node}: {reason} (offending entry: {entry})")]
    InvalidTree {
        node: NodeId,
        entry: String,
        reason: String,
    },
}

/// Result type alias for simulator operations
pub type StarResult<T> = Result<T, StarError>;

/// Result type alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_error_display() {
        let err = KernelError::InvalidDelay(-3);
        assert!(format!("{}", err).contains("-3"));
        assert!(format!("{}", KernelError::Terminated).contains("terminated"));
    }

    #[test]
    fn test_wiring_error_display() {
        let err = WiringError::DuplicatePort {
            node: NodeId(2),
            layer: LayerKind::Routing,
            port: Port::Down,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Down"));
        assert!(msg.contains("routing"));
        assert!(msg.contains("node 2"));
    }

    #[test]
    fn test_topology_error_display() {
        let err = TopologyError::Disconnected {
            from: NodeId(0),
            unreachable: vec![NodeId(3)],
        };
        assert!(format!("{}", err).contains("disconnected"));

        let err = TopologyError::InvalidWeight {
            a: NodeId(0),
            b: NodeId(1),
            weight: 0,
        };
        assert!(format!("{}", err).contains("weight 0"));
    }

    #[test]
    fn test_error_conversions() {
        let err: StarError = KernelError::InvalidDelay(-1).into();
        assert!(matches!(err, StarError::Kernel(_)));

        let err: StarError = WiringError::EmptyStack(NodeId(0)).into();
        assert!(matches!(err, StarError::Wiring(_)));
        assert!(format!("{}", err).contains("Invalid wiring"));

        let err: StarError = RoutingError::Unreachable {
            node: NodeId(0),
            destination: NodeId(2),
        }
        .into();
        assert!(matches!(err, StarError::Routing(_)));

        let err: StarError = TopologyError::EmptyGraph.into();
        assert!(matches!(err, StarError::Topology(_)));

        let err: StarError = IdentityError::NoSuchNode(NodeId(9)).into();
        assert!(format!("{}", err).contains("No such node: 9"));
    }
}
