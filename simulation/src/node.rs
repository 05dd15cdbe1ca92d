//! Node stacks
//!
//! A [`NodeFactory`] decides what a node is made of. The topology calls it
//! once per vertex with the validated graph.

use star_core::{LayerKind, NodeId, NodeStack, StackBuilder, StarResult};
use star_routing::StarNode;

use crate::application::ApplicationLayer;
use crate::config::SimConfig;
use crate::graph::WeightedGraph;
use crate::link::LinkLayer;

/// Builds the stack of one node
pub trait NodeFactory {
    fn build(
        &self,
        id: NodeId,
        graph: &WeightedGraph,
        config: &SimConfig,
    ) -> StarResult<NodeStack>;
}

/// The standard ad hoc node:
///
/// ```text
/// application
///     |
/// routing (STAR)
///     |
///   link
///     |
///  channel
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AdHocNode;

impl NodeFactory for AdHocNode {
    fn build(
        &self,
        id: NodeId,
        graph: &WeightedGraph,
        config: &SimConfig,
    ) -> StarResult<NodeStack> {
        let hop_budget = config.hop_budget(graph.node_count());
        StackBuilder::new(id)
            .layer(Box::new(ApplicationLayer::new(id, hop_budget)))
            .layer(Box::new(StarNode::new(
                id,
                graph.neighbors(id),
                config.engine(),
            )))
            .layer(Box::new(LinkLayer::new(id)))
            .connect(LayerKind::Application, LayerKind::Routing)
            .connect(LayerKind::Routing, LayerKind::Link)
            .attach_channel(LayerKind::Link)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use star_core::Endpoint;

    #[test]
    fn test_ad_hoc_stack_shape() {
        let graph = crate::graph::from_edges(&[(1, 3, 2), (0, 1, 1), (1, 2, 1)]).unwrap();
        let stack = AdHocNode
            .build(NodeId(3), &graph, &SimConfig::default())
            .unwrap();
        assert_eq!(
            stack.kinds().collect::<Vec<_>>(),
            vec![LayerKind::Application, LayerKind::Routing, LayerKind::Link]
        );
        assert_eq!(
            stack.connectors(LayerKind::Link).unwrap().down,
            Some(Endpoint::Channel)
        );
        let engine = stack.layer::<StarNode>().unwrap();
        assert_eq!(engine.neighbors().get(&NodeId(1)), Some(&2));
        let app = stack.layer::<ApplicationLayer>().unwrap();
        assert_eq!(app.sent(), 0);
        assert_eq!(app.hop_limit(), 3);
    }
}
