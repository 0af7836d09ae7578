//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TransportEvent (from net)
//!     → engine.rs (connection state machine)
//!     → request.rs (bounded window, request line and body)
//!     → routing (route table)
//!     → handlers.rs (form.rs decoding, device mutations)
//!     → pages (render body)
//!     → response.rs (header + flow-controlled chunks)
//!     → Transport::write / flush / close
//! ```
//!
//! `server.rs` hosts the engine on a tokio task.

pub mod engine;
pub mod form;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use engine::{AcceptError, EngineLimits, HttpEngine};
pub use server::PanelServer;
