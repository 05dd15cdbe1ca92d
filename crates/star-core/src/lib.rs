//! # STAR Core
//!
//! Core types, the discrete-event kernel and the layered component model
//! used by the STAR network simulator.
//!
//! Every piece of protocol behavior in the simulator runs inside a
//! synchronous event handler driven by one ordered event queue. This crate
//! owns that queue and the vocabulary shared by every layer.
//!
//! ## Key Types
//!
//! - [`NodeId`]: Small-integer node identifier
//! - [`SimTime`] / [`Delay`]: Simulated clock and validated scheduling delays
//! - [`Event`] / [`ScheduledEvent`]: Immutable events and their queue entries
//! - [`EventContent`]: Tagged event content (application data, link-state
//!   advertisements, control signals, link frames)
//! - [`Kernel`]: Event queue plus dispatch loop
//! - [`Layer`] / [`StackBuilder`] / [`NodeStack`]: UP/DOWN connector model
//! - [`Channel`]: Pluggable delivery semantics between neighbors
//!
//! ## Ordering Guarantee
//!
//! Events are dispatched in `(timestamp, insertion sequence)` order. An event
//! scheduled for the current instant runs after every event already queued
//! for that instant.

pub mod channel;
pub mod component;
pub mod error;
pub mod event;
pub mod identity;
pub mod kernel;
pub mod lsa;
pub mod scheduler;
pub mod time;

// Re-export main types
pub use channel::*;
pub use component::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use kernel::*;
pub use lsa::*;
pub use scheduler::*;
pub use time::*;
