//! Link-state advertisement types
//!
//! A link entry describes one directed link `head -> tail`. The head node is
//! the only authority for its outgoing links: it stamps every version it
//! originates with its own monotonically increasing sequence number, and
//! receivers keep only the highest version they have seen.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// Link weight as carried on the wire (always at least 1)
pub type Metric = u32;

/// Accumulated path cost
pub type Cost = u64;

/// A directed link between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId {
    pub head: NodeId,
    pub tail: NodeId,
}

impl LinkId {
    pub fn new(head: NodeId, tail: NodeId) -> Self {
        Self { head, tail }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.head, self.tail)
    }
}

/// One versioned entry of a node's topology view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub link: LinkId,
    /// Link weight, `None` once the head has withdrawn the link
    pub cost: Option<Metric>,
    /// Version stamped by `link.head`
    pub seq: u64,
}

impl LinkEntry {
    pub fn up(link: LinkId, cost: Metric, seq: u64) -> Self {
        Self {
            link,
            cost: Some(cost),
            seq,
        }
    }

    pub fn down(link: LinkId, seq: u64) -> Self {
        Self {
            link,
            cost: None,
            seq,
        }
    }

    pub fn is_up(&self) -> bool {
        self.cost.is_some()
    }

    /// The node whose sequence space this entry belongs to
    pub fn origin(&self) -> NodeId {
        self.link.head
    }

    /// Whether this entry supersedes `current`
    pub fn supersedes(&self, current: Option<&LinkEntry>) -> bool {
        match current {
            Some(existing) => self.seq > existing.seq,
            None => self.seq > 0,
        }
    }
}

impl fmt::Display for LinkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cost {
            Some(cost) => write!(f, "{} cost={} seq={}", self.link, cost, self.seq),
            None => write!(f, "{} down seq={}", self.link, self.seq),
        }
    }
}

/// A link-state advertisement, full or partial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStateAdvertisement {
    /// The node that transmitted this advertisement (not the entries' origin)
    pub sender: NodeId,
    /// Whether this carries the sender's complete view
    pub full: bool,
    pub entries: Vec<LinkEntry>,
}

impl LinkStateAdvertisement {
    pub fn full(sender: NodeId, entries: Vec<LinkEntry>) -> Self {
        Self {
            sender,
            full: true,
            entries,
        }
    }

    pub fn partial(sender: NodeId, entries: Vec<LinkEntry>) -> Self {
        Self {
            sender,
            full: false,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
