//! Per-node protocol counters
//!
//! Purely observational: nothing in the protocol reads them back.

use std::collections::BTreeMap;
use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Named counters kept by every routing engine
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    #[display("messages_sent")]
    MessagesSent,
    #[display("messages_delivered")]
    MessagesDelivered,
    #[display("messages_forwarded")]
    MessagesForwarded,
    #[display("messages_dropped")]
    MessagesDropped,
    #[display("unreachable")]
    Unreachable,
    #[display("updates_sent")]
    UpdatesSent,
    #[display("updates_received")]
    UpdatesReceived,
    #[display("stale_updates")]
    StaleUpdates,
    #[display("tree_rebuilds")]
    TreeRebuilds,
}

impl Counter {
    pub const ALL: [Counter; 9] = [
        Counter::MessagesSent,
        Counter::MessagesDelivered,
        Counter::MessagesForwarded,
        Counter::MessagesDropped,
        Counter::Unreachable,
        Counter::UpdatesSent,
        Counter::UpdatesReceived,
        Counter::StaleUpdates,
        Counter::TreeRebuilds,
    ];
}

/// A set of counters; every counter is present, starting at zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    counts: BTreeMap<Counter, u64>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            counts: Counter::ALL.iter().map(|c| (*c, 0)).collect(),
        }
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: Counter, amount: u64) {
        *self.counts.entry(counter).or_insert(0) += amount;
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts.get(&counter).copied().unwrap_or(0)
    }

    /// Counter name to value
    pub fn snapshot(&self) -> BTreeMap<Counter, u64> {
        self.counts.clone()
    }

    /// Add every counter of `other` into `self`
    pub fn merge(&mut self, other: &Stats) {
        for (counter, value) in &other.counts {
            self.add(*counter, *value);
        }
    }

    /// Sum of many stats
    pub fn aggregate<'a>(all: impl IntoIterator<Item = &'a Stats>) -> Stats {
        let mut total = Stats::new();
        for stats in all {
            total.merge(stats);
        }
        total
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (counter, value) in &self.counts {
            writeln!(f, "{:<20} {}", counter.to_string(), value)?;
        }
        Ok(())
    }
}
