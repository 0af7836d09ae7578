//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → socket.rs (TokioTransport: reader/writer tasks, send buffer accounting)
//!     → transport.rs (Transport trait, interests, events)
//!     → connection.rs (per-connection state machine)
//!     → Hand off to HTTP engine
//!
//! Connection States:
//!     Accepted → AwaitingRequest → Dispatching → Responding → Closed
//! ```
//!
//! # Design Decisions
//! - The engine only sees the `Transport` trait, never sockets
//! - Each connection's state is dropped on exactly one teardown path

pub mod connection;
pub mod listener;
pub mod socket;
pub mod transport;

pub use connection::{Connection, ConnectionId, ConnectionPhase};
pub use listener::{Listener, ListenerError};
pub use socket::{HostEvent, SocketLimits, TokioTransport};
pub use transport::{Interest, Received, Transport, TransportError, TransportEvent, WriteFlags};
