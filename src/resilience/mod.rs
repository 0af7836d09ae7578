//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Poll tick for a responding connection:
//!     → timeouts.rs (count ticks without progress)
//!     → limit exceeded: engine tears the connection down
//! ```
//!
//! # Design Decisions
//! - Transient backpressure is retried, never counted as failure on its own
//! - The only deadline is measured in poll ticks; there is no wall clock here

pub mod timeouts;

pub use timeouts::StallGuard;
