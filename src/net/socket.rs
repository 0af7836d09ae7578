//! Tokio implementation of the transport primitives.
//!
//! # Responsibilities
//! - Own the per-connection socket tasks (one reader, one writer)
//! - Model a bounded send buffer so the engine sees real backpressure
//! - Filter raw socket events by the interests the engine registered
//!
//! # Data Flow
//! ```text
//! reader task ──Received(Data|Eof)──┐
//! writer task ──Sent(n) / Failed────┼──▶ HostEvent channel ──▶ event loop
//! accept loop ──Accepted(stream)────┘        │
//!                                            ▼
//!                              TokioTransport::filter ──▶ HttpEngine
//! engine ──write──▶ staged ──flush──▶ writer task (in flight until Sent)
//! ```
//!
//! # Design Decisions
//! - Capacity = send_buffer − staged − in flight, so a slow peer shrinks it to zero
//! - `close` is graceful: staged bytes are flushed, then the writer shuts the
//!   socket down after everything before it was written
//! - Socket tasks never touch engine state; they only send events

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::net::connection::ConnectionId;
use crate::net::transport::{Interest, Received, Transport, TransportError, TransportEvent, WriteFlags};

/// Everything the event loop can be woken by, apart from timers.
#[derive(Debug)]
pub enum HostEvent {
    /// The accept loop produced a new socket.
    Accepted(TcpStream, SocketAddr),
    /// A socket task reported on an attached connection.
    Transport(TransportEvent),
}

/// Sending side of the host event channel.
pub type HostEventSender = mpsc::UnboundedSender<HostEvent>;

/// Transport sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketLimits {
    /// Bytes staged plus in flight per connection.
    pub send_buffer: usize,
    /// Size of one socket read.
    pub read_buffer: usize,
}

impl Default for SocketLimits {
    fn default() -> Self {
        Self {
            send_buffer: 2920,
            read_buffer: 1460,
        }
    }
}

enum WriterCmd {
    Data(Vec<u8>),
    Close,
}

struct Slot {
    peer: SocketAddr,
    interest: Interest,
    staged: Vec<u8>,
    in_flight: usize,
    writer: mpsc::UnboundedSender<WriterCmd>,
    reader: JoinHandle<()>,
}

/// Socket-backed transport.
pub struct TokioTransport {
    slots: HashMap<ConnectionId, Slot>,
    events: HostEventSender,
    limits: SocketLimits,
}

impl TokioTransport {
    pub fn new(events: HostEventSender, limits: SocketLimits) -> Self {
        Self {
            slots: HashMap::new(),
            events,
            limits,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.slots.len()
    }

    pub fn peer_addr(&self, conn: ConnectionId) -> Option<SocketAddr> {
        self.slots.get(&conn).map(|slot| slot.peer)
    }

    /// Take ownership of an accepted socket and start its tasks.
    ///
    /// No events are delivered until the engine registers interest.
    pub fn attach(&mut self, stream: TcpStream, peer: SocketAddr) -> ConnectionId {
        let conn = ConnectionId::new();
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(connection_id = %conn, error = %e, "Failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(conn, read_half, self.limits.read_buffer, self.events.clone()));
        tokio::spawn(write_loop(conn, write_half, writer_rx, self.events.clone()));

        self.slots.insert(
            conn,
            Slot {
                peer,
                interest: Interest::NONE,
                staged: Vec::with_capacity(self.limits.send_buffer),
                in_flight: 0,
                writer: writer_tx,
                reader,
            },
        );
        tracing::trace!(connection_id = %conn, peer_addr = %peer, "Socket attached");
        conn
    }

    /// Drop a connection the engine refused, without a graceful close.
    pub fn discard(&mut self, conn: ConnectionId) {
        if let Some(slot) = self.slots.remove(&conn) {
            slot.reader.abort();
            tracing::debug!(connection_id = %conn, peer_addr = %slot.peer, "Socket discarded");
        }
    }

    /// Connections currently registered for `interest`.
    pub fn interested(&self, interest: Interest) -> Vec<ConnectionId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.interest.contains(interest))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Apply bookkeeping for a raw socket event and decide whether the engine sees it.
    pub fn filter(&mut self, event: TransportEvent) -> Option<TransportEvent> {
        let conn = event.connection();
        let Some(slot) = self.slots.get_mut(&conn) else {
            tracing::trace!(connection_id = %conn, "Event for detached connection dropped");
            return None;
        };

        let wanted = match &event {
            TransportEvent::Received(..) => Interest::RECV,
            TransportEvent::Sent(_, n) => {
                slot.in_flight = slot.in_flight.saturating_sub(*n);
                Interest::SENT
            }
            TransportEvent::Failed(..) => {
                // The handle is dead whether or not anyone listens.
                if let Some(slot) = self.slots.remove(&conn) {
                    slot.reader.abort();
                    if slot.interest.contains(Interest::ERROR) {
                        return Some(event);
                    }
                }
                return None;
            }
        };

        if slot.interest.contains(wanted) {
            Some(event)
        } else {
            tracing::trace!(connection_id = %conn, interest = %slot.interest, "Unregistered event dropped");
            None
        }
    }

    /// Detach everything, e.g. on shutdown.
    pub fn shutdown(&mut self) {
        for (_, slot) in self.slots.drain() {
            let _ = slot.writer.send(WriterCmd::Close);
            slot.reader.abort();
        }
    }
}

impl Transport for TokioTransport {
    fn register(&mut self, conn: ConnectionId, interest: Interest) {
        if let Some(slot) = self.slots.get_mut(&conn) {
            slot.interest = interest;
        }
    }

    fn write(&mut self, conn: ConnectionId, data: &[u8], _flags: WriteFlags) -> Result<(), TransportError> {
        let capacity = self.send_capacity(conn);
        let slot = self.slots.get_mut(&conn).ok_or(TransportError::NotConnected)?;
        if data.len() > capacity {
            return Err(TransportError::OutOfMemory);
        }
        slot.staged.extend_from_slice(data);
        Ok(())
    }

    fn send_capacity(&self, conn: ConnectionId) -> usize {
        self.slots
            .get(&conn)
            .map(|slot| {
                self.limits
                    .send_buffer
                    .saturating_sub(slot.staged.len() + slot.in_flight)
            })
            .unwrap_or(0)
    }

    fn flush(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        let slot = self.slots.get_mut(&conn).ok_or(TransportError::NotConnected)?;
        if slot.staged.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut slot.staged);
        let len = bytes.len();
        slot.writer
            .send(WriterCmd::Data(bytes))
            .map_err(|_| TransportError::NotConnected)?;
        slot.in_flight += len;
        Ok(())
    }

    fn acknowledge(&mut self, conn: ConnectionId, len: usize) {
        // The kernel reopens the receive window on read; nothing to hand back.
        tracing::trace!(connection_id = %conn, len, "Received bytes consumed");
    }

    fn close(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        self.flush(conn)?;
        let slot = self.slots.remove(&conn).ok_or(TransportError::NotConnected)?;
        slot.reader.abort();
        slot.writer
            .send(WriterCmd::Close)
            .map_err(|_| TransportError::NotConnected)
    }
}

async fn read_loop(conn: ConnectionId, mut socket: OwnedReadHalf, read_buffer: usize, events: HostEventSender) {
    let mut buf = vec![0u8; read_buffer.max(1)];
    loop {
        let event = match socket.read(&mut buf).await {
            Ok(0) => {
                let _ = events.send(HostEvent::Transport(TransportEvent::Received(conn, Received::Eof)));
                return;
            }
            Ok(n) => TransportEvent::Received(conn, Received::Data(buf[..n].to_vec())),
            Err(e) => {
                let _ = events.send(HostEvent::Transport(TransportEvent::Failed(conn, classify(e))));
                return;
            }
        };
        if events.send(HostEvent::Transport(event)).is_err() {
            return;
        }
    }
}

async fn write_loop(
    conn: ConnectionId,
    mut socket: OwnedWriteHalf,
    mut commands: mpsc::UnboundedReceiver<WriterCmd>,
    events: HostEventSender,
) {
    while let Some(cmd) = commands.recv().await {
        match cmd {
            WriterCmd::Data(bytes) => {
                if let Err(e) = socket.write_all(&bytes).await {
                    let _ = events.send(HostEvent::Transport(TransportEvent::Failed(conn, classify(e))));
                    return;
                }
                let _ = events.send(HostEvent::Transport(TransportEvent::Sent(conn, bytes.len())));
            }
            WriterCmd::Close => {
                if let Err(e) = socket.shutdown().await {
                    tracing::trace!(connection_id = %conn, error = %e, "Socket shutdown failed");
                }
                return;
            }
        }
    }
}

fn classify(error: std::io::Error) -> TransportError {
    match error.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe => TransportError::Reset,
        _ => TransportError::Io(error),
    }
}
