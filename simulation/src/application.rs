//! Application layer
//!
//! Top of every node stack. Turns operator send requests into application
//! messages for the routing layer and records what comes back: messages
//! addressed to this node land in the inbox, undeliverable sends are kept
//! as outcomes. Delivery is best effort with no retry and no
//! acknowledgement.

use std::any::Any;

use bytes::Bytes;
use serde::Serialize;
use star_core::{
    AppMessage, ControlSignal, EventContent, Layer, LayerContext, LayerKind, MessageId, NodeId,
    SimTime, StarResult,
};
use tracing::{debug, info, warn};

/// A message delivered to this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivered {
    pub id: MessageId,
    pub source: NodeId,
    pub body: Bytes,
    pub at: SimTime,
}

impl Delivered {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A send that could not be routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Undeliverable {
    pub id: MessageId,
    pub destination: NodeId,
    pub at: SimTime,
}

#[derive(Debug)]
pub struct ApplicationLayer {
    id: NodeId,
    hop_limit: u32,
    next_sequence: u64,
    inbox: Vec<Delivered>,
    undeliverable: Vec<Undeliverable>,
}

impl ApplicationLayer {
    pub fn new(id: NodeId, hop_limit: u32) -> Self {
        Self {
            id,
            hop_limit,
            next_sequence: 0,
            inbox: Vec::new(),
            undeliverable: Vec::new(),
        }
    }

    /// Messages received, in delivery order
    pub fn inbox(&self) -> &[Delivered] {
        &self.inbox
    }

    pub fn undeliverable(&self) -> &[Undeliverable] {
        &self.undeliverable
    }

    pub fn hop_limit(&self) -> u32 {
        self.hop_limit
    }

    /// Number of messages this node originated
    pub fn sent(&self) -> u64 {
        self.next_sequence
    }

    fn originate(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        destination: NodeId,
        body: Bytes,
    ) -> StarResult<()> {
        self.next_sequence += 1;
        let id = MessageId {
            source: self.id,
            sequence: self.next_sequence,
        };
        debug!(node = %self.id, %id, %destination, "sending");
        let msg = AppMessage::new(id, destination, body, self.hop_limit);
        ctx.send_down(EventContent::ApplicationPayload(msg))?;
        Ok(())
    }
}

impl Layer for ApplicationLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Application
    }

    fn on_message_from_top(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()> {
        match content {
            EventContent::ControlSignal(ControlSignal::SendMessage { destination, body }) => {
                self.originate(ctx, destination, body)
            }
            other => {
                debug!(node = %self.id, content = other.label(), "ignoring request");
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
            EventContent::ApplicationPayload(msg) => {
                info!(
                    node = %self.id,
                    from = %msg.source,
                    id = %msg.id,
                    body = %msg.body_text(),
                    "message delivered"
                );
                self.inbox.push(Delivered {
                    id: msg.id,
                    source: msg.source,
                    body: msg.body,
                    at: ctx.now(),
                });
            }
            EventContent::ControlSignal(ControlSignal::Unreachable {
                destination,
                message,
            }) => {
                warn!(node = %self.id, id = %message, %destination, "message undeliverable");
                self.undeliverable.push(Undeliverable {
                    id: message,
                    destination,
                    at: ctx.now(),
                });
            }
            other => debug!(node = %self.id, content = other.label(), "ignoring content from below"),
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
