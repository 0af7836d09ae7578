//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request (method, path)
//!     → router.rs (static table lookup)
//!     → Route (handler to run, or the control page)
//! ```
//!
//! # Design Decisions
//! - First exact match wins
//! - Deterministic: the same request line always picks the same route

pub mod router;

pub use router::{resolve, Route};
