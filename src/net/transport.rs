//! Transport callback API consumed by the engine.
//!
//! # Responsibilities
//! - Describe the primitives the engine may call on a connection
//!   (register interest, write, query capacity, flush, acknowledge, close)
//! - Describe the events a transport delivers back to the engine
//!
//! # Design Decisions
//! - The engine never owns the transport; every handler borrows it for one call
//! - Interest registration replaces raw callback pointers: a transport must not
//!   deliver an event for an interest that is not registered
//! - `OutOfMemory` is the only transient write failure

use std::fmt;
use std::ops::BitOr;

use crate::net::connection::ConnectionId;

/// Set of events a connection wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest(u8);

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const RECV: Interest = Interest(0b0001);
    pub const SENT: Interest = Interest(0b0010);
    pub const ERROR: Interest = Interest(0b0100);
    pub const POLL: Interest = Interest(0b1000);

    /// Both sets, usable in constants.
    pub const fn union(self, other: Interest) -> Interest {
        Interest(self.0 | other.0)
    }

    /// Returns true if every bit of `other` is registered.
    pub fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// Flags attached to a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteFlags(u8);

impl WriteFlags {
    /// The transport copies the bytes; the caller may reuse its buffer.
    pub const COPY: WriteFlags = WriteFlags(0b01);
    /// More data follows this write; the transport may delay pushing it.
    pub const MORE: WriteFlags = WriteFlags(0b10);

    pub fn contains(self, other: WriteFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for WriteFlags {
    type Output = WriteFlags;

    fn bitor(self, rhs: WriteFlags) -> WriteFlags {
        WriteFlags(self.0 | rhs.0)
    }
}

/// Errors reported by transport primitives.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Send buffer cannot take the write right now. Retry later.
    #[error("send buffer exhausted")]
    OutOfMemory,
    /// The connection handle is unknown or already closed.
    #[error("connection not open")]
    NotConnected,
    /// The peer reset the connection.
    #[error("connection reset by peer")]
    Reset,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Transient backpressure, not a failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::OutOfMemory)
    }
}

/// Primitives the engine calls on an accepted connection.
pub trait Transport {
    /// Replace the set of events delivered for `conn`.
    fn register(&mut self, conn: ConnectionId, interest: Interest);

    /// Queue `data` for sending.
    fn write(&mut self, conn: ConnectionId, data: &[u8], flags: WriteFlags) -> Result<(), TransportError>;

    /// Bytes that may currently be written without blocking.
    fn send_capacity(&self, conn: ConnectionId) -> usize;

    /// Push queued output towards the peer.
    fn flush(&mut self, conn: ConnectionId) -> Result<(), TransportError>;

    /// Tell the transport `len` received bytes were consumed.
    fn acknowledge(&mut self, conn: ConnectionId, len: usize);

    /// Gracefully close: queued output is still delivered.
    fn close(&mut self, conn: ConnectionId) -> Result<(), TransportError>;
}

/// Payload of a receive event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Data(Vec<u8>),
    /// Peer finished sending.
    Eof,
}

/// Events a transport delivers to the engine's owner.
#[derive(Debug)]
pub enum TransportEvent {
    Received(ConnectionId, Received),
    /// `n` bytes left the send buffer.
    Sent(ConnectionId, usize),
    /// The connection is gone; its handle is already invalid.
    Failed(ConnectionId, TransportError),
}

impl TransportEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Received(id, _) | TransportEvent::Sent(id, _) | TransportEvent::Failed(id, _) => *id,
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Interest::RECV, "recv"),
            (Interest::SENT, "sent"),
            (Interest::ERROR, "error"),
            (Interest::POLL, "poll"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}
