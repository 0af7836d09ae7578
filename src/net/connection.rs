//! Per-connection state machine.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track the phase of each accepted connection
//! - Own the in-flight response stream, so it can never outlive its connection
//!
//! # States
//! ```text
//! Accepted → AwaitingRequest → Dispatching → Responding → Closed
//! ```
//! `Closed` is terminal: the engine drops the `Connection` right after entering it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::http::response::ResponseStream;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough, we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value. Used by transports that number their own handles.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug)]
pub enum ConnectionPhase {
    /// State allocated, interests not yet registered.
    Accepted,
    /// Waiting for the first request bytes.
    AwaitingRequest,
    /// A request is being parsed and handled.
    Dispatching,
    /// A response is streaming out.
    Responding(ResponseStream),
    /// Torn down.
    Closed,
}

impl ConnectionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionPhase::Accepted => "accepted",
            ConnectionPhase::AwaitingRequest => "awaiting_request",
            ConnectionPhase::Dispatching => "dispatching",
            ConnectionPhase::Responding(_) => "responding",
            ConnectionPhase::Closed => "closed",
        }
    }
}

/// State owned for one accepted connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    phase: ConnectionPhase,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: ConnectionPhase::Accepted,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    /// True once a response has begun.
    pub fn responded(&self) -> bool {
        matches!(self.phase, ConnectionPhase::Responding(_) | ConnectionPhase::Closed)
    }

    /// Mutable access to the in-flight response, if any.
    pub fn stream_mut(&mut self) -> Option<&mut ResponseStream> {
        match &mut self.phase {
            ConnectionPhase::Responding(stream) => Some(stream),
            _ => None,
        }
    }

    /// Move to `next`, returning the phase that was left.
    pub fn transition(&mut self, next: ConnectionPhase) -> ConnectionPhase {
        tracing::trace!(
            connection_id = %self.id,
            from = self.phase.name(),
            to = next.name(),
            "Connection phase change"
        );
        std::mem::replace(&mut self.phase, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert_eq!(ConnectionId::from_raw(7).to_string(), "conn-7");
    }

    #[test]
    fn new_connection_has_not_responded() {
        let mut conn = Connection::new(ConnectionId::new());
        assert!(!conn.responded());
        assert!(conn.stream_mut().is_none());

        let previous = conn.transition(ConnectionPhase::AwaitingRequest);
        assert!(matches!(previous, ConnectionPhase::Accepted));
        assert_eq!(conn.phase().name(), "awaiting_request");

        conn.transition(ConnectionPhase::Closed);
        assert!(conn.responded());
    }
}
