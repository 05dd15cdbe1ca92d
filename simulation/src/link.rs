//! Link layer
//!
//! The bottom of every node stack. Frames coming down from routing are
//! handed to the channel unchanged; frames coming up from the channel are
//! filtered by link-level destination and unwrapped before being pushed to
//! routing.

use std::any::Any;

use star_core::{EventContent, Layer, LayerContext, LayerKind, NodeId, StarResult};
use tracing::{debug, trace};

/// Per-node link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Unicast frames overheard but addressed elsewhere
    pub frames_filtered: u64,
}

#[derive(Debug)]
pub struct LinkLayer {
    id: NodeId,
    counters: LinkCounters,
}

impl LinkLayer {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            counters: LinkCounters::default(),
        }
    }

    pub fn counters(&self) -> LinkCounters {
        self.counters
    }
}

impl Layer for LinkLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Link
    }

    fn on_message_from_top(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()> {
        match content {
            EventContent::Frame(frame) => {
                trace!(node = %self.id, dst = %frame.dst, "frame to channel");
                self.counters.frames_sent += 1;
                ctx.send_down(EventContent::Frame(frame))?;
            }
            other => debug!(node = %self.id, content = other.label(), "unframed content from above dropped"),
        }
        Ok(())
    }

    fn on_message_from_bottom(
        &mut self,
        ctx: &mut LayerContext<'_, '_>,
        content: EventContent,
    ) -> StarResult<()> {
        let EventContent::Frame(frame) = content else {
            debug!(node = %self.id, content = content.label(), "unframed content from channel dropped");
            return Ok(());
        };
        if frame.src == self.id || !frame.dst.accepts(self.id) {
            self.counters.frames_filtered += 1;
            return Ok(());
        }
        trace!(node = %self.id, src = %frame.src, "frame from channel");
        self.counters.frames_received += 1;
        ctx.send_up(frame.payload.into())?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
