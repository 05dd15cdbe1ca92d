//! Simulated time
//!
//! Time advances only when the kernel dispatches an event. Nothing in the
//! protocol reads the wall clock.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// A point on the simulated timeline, in ticks
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[display("t={_0}")]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the simulation
    pub const ZERO: SimTime = SimTime(0);

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The time `delay` after `self`
    pub fn plus(self, delay: Delay) -> KernelResult<SimTime> {
        self.0
            .checked_add(delay.ticks())
            .map(SimTime)
            .ok_or(KernelError::TimeOverflow)
    }
}

/// A validated, non-negative scheduling delay
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[display("+{_0}")]
pub struct Delay(u64);

impl Delay {
    /// Deliver at the current instant (after already queued same-time events)
    pub const NOW: Delay = Delay(0);

    /// Validate a signed delay, rejecting negative values
    pub fn new(ticks: i64) -> KernelResult<Self> {
        u64::try_from(ticks)
            .map(Self)
            .map_err(|_| KernelError::InvalidDelay(ticks))
    }

    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_delay_rejected() {
        assert_eq!(Delay::new(-1), Err(KernelError::InvalidDelay(-1)));
        assert_eq!(Delay::new(0), Ok(Delay::NOW));
        assert_eq!(Delay::new(5).unwrap().ticks(), 5);
    }

    #[test]
    fn test_plus_and_overflow() {
        let t = SimTime::new(10);
        assert_eq!(t.plus(Delay::from_ticks(5)).unwrap(), SimTime::new(15));
        assert_eq!(
            SimTime::new(u64::MAX).plus(Delay::from_ticks(1)),
            Err(KernelError::TimeOverflow)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(SimTime::new(42).to_string(), "t=42");
        assert_eq!(Delay::from_ticks(3).to_string(), "+3");
    }
}
