//! Local topology view
//!
//! Each node keeps the most recent version it has heard of every directed
//! link. The head of a link is the only node allowed to stamp new versions
//! of it, so a node never accepts entries for its own links from others.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;

use star_core::{LinkEntry, LinkId, Metric, NodeId};
use tracing::trace;

/// Result of merging an advertisement into a view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries that replaced (or were added to) the view, in input order
    pub changed: Vec<LinkEntry>,
    /// Entries discarded as stale, duplicate or self-owned
    pub stale: usize,
}

impl MergeOutcome {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// A node's versioned map of every link it knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyView {
    owner: NodeId,
    links: BTreeMap<LinkId, LinkEntry>,
    /// Last sequence number stamped on one of the owner's links
    seq: u64,
}

impl TopologyView {
    pub fn new(owner: NodeId) -> Self {
        Self {
            owner,
            links: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Record a new version of the owner's link to `neighbor`.
    ///
    /// `None` withdraws the link. Returns the freshly stamped entry.
    pub fn originate(&mut self, neighbor: NodeId, cost: Option<Metric>) -> LinkEntry {
        self.seq += 1;
        let entry = LinkEntry {
            link: LinkId::new(self.owner, neighbor),
            cost,
            seq: self.seq,
        };
        self.links.insert(entry.link, entry);
        entry
    }

    /// Apply entries received from a neighbor.
    ///
    /// An entry replaces the current one only if its sequence number is
    /// strictly greater; an absent entry counts as sequence 0.
    pub fn merge(&mut self, entries: &[LinkEntry]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for entry in entries {
            if entry.origin() == self.owner || !entry.supersedes(self.links.get(&entry.link)) {
                trace!(owner = %self.owner, %entry, "discarding stale entry");
                outcome.stale += 1;
                continue;
            }
            self.links.insert(entry.link, *entry);
            outcome.changed.push(*entry);
        }
        outcome
    }

    pub fn get(&self, link: LinkId) -> Option<&LinkEntry> {
        self.links.get(&link)
    }

    /// Every entry, including withdrawn links, ordered by link
    pub fn entries(&self) -> impl Iterator<Item = &LinkEntry> {
        self.links.values()
    }

    /// Copy of every entry, for a full advertisement
    pub fn snapshot(&self) -> Vec<LinkEntry> {
        self.links.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Live links leaving `node`, ordered by tail
    pub fn out_links(&self, node: NodeId) -> impl Iterator<Item = (NodeId, Metric)> + '_ {
        let start = LinkId::new(node, NodeId(0));
        self.links
            .range(start..)
            .take_while(move |(link, _)| link.head == node)
            .filter_map(|(link, entry)| entry.cost.map(|cost| (link.tail, cost)))
    }

    /// The owner's live neighbors
    pub fn neighbors(&self) -> Vec<NodeId> {
        self.out_links(self.owner).map(|(n, _)| n).collect()
    }

    /// Every node mentioned by a live link, plus the owner
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        let mut nodes = BTreeSet::from([self.owner]);
        for entry in self.links.values().filter(|e| e.is_up()) {
            nodes.insert(entry.link.head);
            nodes.insert(entry.link.tail);
        }
        nodes
    }

    /// Live entries reachable from `root`, in breadth-first order.
    ///
    /// This is the part of the topology the owner believes `root` can see.
    pub fn rooted_at(&self, root: NodeId) -> Vec<LinkEntry> {
        let mut seen = BTreeSet::from([root]);
        let mut queue = VecDeque::from([root]);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            for (tail, _) in self.out_links(node) {
                if let Some(entry) = self.links.get(&LinkId::new(node, tail)) {
                    out.push(*entry);
                }
                if seen.insert(tail) {
                    queue.push_back(tail);
                }
            }
        }
        out
    }

    /// Text dump of the view as seen from `root`
    pub fn render(&self, root: NodeId) -> String {
        let mut out = format!("Topology of {} known by node {}\n", root, self.owner);
        let entries = self.rooted_at(root);
        if entries.is_empty() {
            out.push_str("  (no links)\n");
        }
        for entry in entries {
            let _ = writeln!(out, "  {}", entry);
        }
        out
    }
}
