//! Channel abstraction
//!
//! A channel decides which neighbors receive a frame and after what delay.
//! The topology owns adjacency and asks the channel for one
//! [`Transmission`] per copy to deliver; each becomes a kernel event.
//!
//! Delivery delay is always positive, so a transmission can never be
//! observed at the instant it was sent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{KernelError, KernelResult};
use crate::event::{Frame, LinkAddress};
use crate::identity::NodeId;
use crate::time::Delay;

/// One copy of a frame to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub to: NodeId,
    pub delay: Delay,
}

/// Channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Frames handed to the channel
    pub frames_sent: u64,
    /// Copies scheduled for delivery
    pub frames_delivered: u64,
    /// Copies lost (random loss or unicast to a non-neighbor)
    pub frames_dropped: u64,
    /// Encoded bytes handed to the channel
    pub bytes_sent: u64,
}

impl ChannelStats {
    fn record_send(&mut self, frame: &Frame) {
        self.frames_sent += 1;
        self.bytes_sent += encoded_len(frame) as u64;
    }
}

/// Size of the frame on the wire
pub fn encoded_len(frame: &Frame) -> usize {
    postcard::to_allocvec(frame).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Delivery semantics between directly connected nodes
pub trait Channel: Send {
    fn name(&self) -> &'static str;

    /// Decide the deliveries for `frame` given the sender's current neighbors
    fn transmit(&mut self, frame: &Frame, neighbors: &[NodeId]) -> Vec<Transmission>;

    fn stats(&self) -> ChannelStats;
}

/// Receivers addressed by the frame, counting a unicast to a non-neighbor
/// as dropped
fn receivers(frame: &Frame, neighbors: &[NodeId], stats: &mut ChannelStats) -> Vec<NodeId> {
    match frame.dst {
        LinkAddress::Broadcast => neighbors.to_vec(),
        LinkAddress::Unicast(dst) if neighbors.contains(&dst) => vec![dst],
        LinkAddress::Unicast(dst) => {
            trace!(src = %frame.src, %dst, "unicast to non-neighbor dropped");
            stats.frames_dropped += 1;
            Vec::new()
        }
    }
}

fn positive(delay: u64) -> KernelResult<Delay> {
    if delay == 0 {
        return Err(KernelError::InvalidChannelDelay(delay));
    }
    Ok(Delay::from_ticks(delay))
}

/// Reliable, FIFO per sender, one independent copy per neighbor
#[derive(Debug, Clone)]
pub struct PerfectFifoChannel {
    delay: Delay,
    stats: ChannelStats,
}

impl PerfectFifoChannel {
    pub fn new(delay: u64) -> KernelResult<Self> {
        Ok(Self {
            delay: positive(delay)?,
            stats: ChannelStats::default(),
        })
    }
}

impl Channel for PerfectFifoChannel {
    fn name(&self) -> &'static str {
        "perfect"
    }

    fn transmit(&mut self, frame: &Frame, neighbors: &[NodeId]) -> Vec<Transmission> {
        self.stats.record_send(frame);
        let out: Vec<_> = receivers(frame, neighbors, &mut self.stats)
            .into_iter()
            .map(|to| Transmission {
                to,
                delay: self.delay,
            })
            .collect();
        self.stats.frames_delivered += out.len() as u64;
        out
    }

    fn stats(&self) -> ChannelStats {
        self.stats
    }
}

/// Drops each copy independently with a fixed probability
#[derive(Debug, Clone)]
pub struct LossyChannel {
    delay: Delay,
    drop_probability: f64,
    rng: StdRng,
    stats: ChannelStats,
}

impl LossyChannel {
    pub fn new(delay: u64, drop_probability: f64, seed: u64) -> KernelResult<Self> {
        if !(0.0..=1.0).contains(&drop_probability) {
            return Err(KernelError::InvalidChannel(format!(
                "drop probability {} outside [0, 1]",
                drop_probability
            )));
        }
        Ok(Self {
            delay: positive(delay)?,
            drop_probability,
            rng: StdRng::seed_from_u64(seed),
            stats: ChannelStats::default(),
        })
    }
}

impl Channel for LossyChannel {
    fn name(&self) -> &'static str {
        "lossy"
    }

    fn transmit(&mut self, frame: &Frame, neighbors: &[NodeId]) -> Vec<Transmission> {
        self.stats.record_send(frame);
        let mut out = Vec::new();
        for to in receivers(frame, neighbors, &mut self.stats) {
            if self.rng.random_bool(self.drop_probability) {
                trace!(src = %frame.src, %to, "frame lost");
                self.stats.frames_dropped += 1;
                continue;
            }
            out.push(Transmission {
                to,
                delay: self.delay,
            });
        }
        self.stats.frames_delivered += out.len() as u64;
        out
    }

    fn stats(&self) -> ChannelStats {
        self.stats
    }
}

/// Adds a random jitter to every copy, so frames from one sender can
/// overtake each other
#[derive(Debug, Clone)]
pub struct ReorderingChannel {
    base_delay: Delay,
    jitter: u64,
    rng: StdRng,
    stats: ChannelStats,
}

impl ReorderingChannel {
    pub fn new(base_delay: u64, jitter: u64, seed: u64) -> KernelResult<Self> {
        Ok(Self {
            base_delay: positive(base_delay)?,
            jitter,
            rng: StdRng::seed_from_u64(seed),
            stats: ChannelStats::default(),
        })
    }
}

impl Channel for ReorderingChannel {
    fn name(&self) -> &'static str {
        "reordering"
    }

    fn transmit(&mut self, frame: &Frame, neighbors: &[NodeId]) -> Vec<Transmission> {
        self.stats.record_send(frame);
        let mut out = Vec::new();
        for to in receivers(frame, neighbors, &mut self.stats) {
            let extra = self.rng.random_range(0..=self.jitter);
            out.push(Transmission {
                to,
                delay: Delay::from_ticks(self.base_delay.ticks().saturating_add(extra)),
            });
        }
        self.stats.frames_delivered += out.len() as u64;
        out
    }

    fn stats(&self) -> ChannelStats {
        self.stats
    }
}

/// Delivers every copy twice
#[derive(Debug, Clone)]
pub struct DuplicatingChannel {
    delay: Delay,
    stats: ChannelStats,
}

impl DuplicatingChannel {
    pub fn new(delay: u64) -> KernelResult<Self> {
        Ok(Self {
            delay: positive(delay)?,
            stats: ChannelStats::default(),
        })
    }
}

impl Channel for DuplicatingChannel {
    fn name(&self) -> &'static str {
        "duplicating"
    }

    fn transmit(&mut self, frame: &Frame, neighbors: &[NodeId]) -> Vec<Transmission> {
        self.stats.record_send(frame);
        let mut out = Vec::new();
        for to in receivers(frame, neighbors, &mut self.stats) {
            let copy = Transmission {
                to,
                delay: self.delay,
            };
            out.push(copy);
            out.push(copy);
        }
        self.stats.frames_delivered += out.len() as u64;
        out
    }

    fn stats(&self) -> ChannelStats {
        self.stats
    }
}

/// Channel selection, chosen at construction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    Perfect {
        delay: u64,
    },
    Lossy {
        delay: u64,
        drop_probability: f64,
        seed: u64,
    },
    Reordering {
        base_delay: u64,
        jitter: u64,
        seed: u64,
    },
    Duplicating {
        delay: u64,
    },
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig::Perfect { delay: 1 }
    }
}

impl ChannelConfig {
    /// Validate and instantiate the channel
    pub fn build(&self) -> KernelResult<Box<dyn Channel>> {
        Ok(match *self {
            ChannelConfig::Perfect { delay } => Box::new(PerfectFifoChannel::new(delay)?),
            ChannelConfig::Lossy {
                delay,
                drop_probability,
                seed,
            } => Box::new(LossyChannel::new(delay, drop_probability, seed)?),
            ChannelConfig::Reordering {
                base_delay,
                jitter,
                seed,
            } => Box::new(ReorderingChannel::new(base_delay, jitter, seed)?),
            ChannelConfig::Duplicating { delay } => Box::new(DuplicatingChannel::new(delay)?),
        })
    }
}
