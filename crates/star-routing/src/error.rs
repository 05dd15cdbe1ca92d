//! Routing error types
//!
//! Routing failures are part of the simulator-wide error vocabulary, so this
//! crate re-exports the core error rather than wrapping it.

pub use star_core::RoutingError;

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
