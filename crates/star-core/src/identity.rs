//! Node identity
//!
//! Nodes are addressed by small unsigned integers, exactly as the external
//! graph generator numbers its vertices (`0..N`).

use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Unique identifier for a node in the simulated network
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a node id from its raw index
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Generate ids `0..count`
    pub fn range(count: u32) -> Vec<Self> {
        (0..count).map(Self).collect()
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl FromStr for NodeId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| IdentityError::InvalidFormat(s.to_string()))
    }
}
