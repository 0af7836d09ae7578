//! Event-driven request/response engine.
//!
//! # Responsibilities
//! - Own one `Connection` per accepted transport connection
//! - Parse and dispatch the first request, then stream exactly one response
//! - Converge every exit path (completion, peer error, stall, protocol misuse)
//!   on a single teardown routine
//!
//! # Data Flow
//! ```text
//! on_accept  → Connection(AwaitingRequest), register RECV|SENT|ERROR
//! on_receive → acknowledge → RequestWindow → resolve → handler → render
//!            → ResponseStream::start → register +POLL → pump
//! on_sent    → pump
//! on_poll    → pump, count idle ticks, abort when stalled
//! on_error   → drop state (the transport handle is already gone)
//! ```
//!
//! # Design Decisions
//! - Sans-IO: the engine never awaits. It is handed `&mut impl Transport` on
//!   every call, so the same code runs over tokio sockets and test doubles
//! - Events that do not fit the connection's phase are logged and dropped
//! - Teardown is idempotent: an absent entry is a no-op

use std::collections::HashMap;
use std::time::Instant;

use crate::device::Device;
use crate::http::handlers;
use crate::http::request::RequestWindow;
use crate::http::response::{ContentType, Progress, ResponseStream};
use crate::net::connection::{Connection, ConnectionId, ConnectionPhase};
use crate::net::transport::{Interest, Received, Transport, TransportError};
use crate::observability::{metrics, tracing as request_tracing};
use crate::pages;
use crate::routing::{self, Route};

/// Interests held while waiting for a request.
const IDLE_INTEREST: Interest = Interest::RECV.union(Interest::SENT).union(Interest::ERROR);
/// Interests held while a response is streaming.
const STREAMING_INTEREST: Interest = IDLE_INTEREST.union(Interest::POLL);

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLimits {
    /// Bytes of a request kept for parsing.
    pub request_window: usize,
    /// Upper bound on one response write.
    pub chunk_size: usize,
    /// Idle poll ticks tolerated while responding, `0` for no limit.
    pub max_stalled_polls: u32,
    /// Connection table size.
    pub max_connections: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            request_window: 1024,
            chunk_size: 1024,
            max_stalled_polls: 60,
            max_connections: 8,
        }
    }
}

/// Why an accepted connection was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcceptError {
    #[error("connection table full ({limit} connections)")]
    ResourceExhausted { limit: usize },
    #[error("connection {0} is already tracked")]
    Duplicate(ConnectionId),
}

/// Why a connection was torn down. Used as the metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Completed,
    PeerClosed,
    SecondRequest,
    WriteFailed,
    Stalled,
    TransportError,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Completed => "completed",
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::SecondRequest => "second_request",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::Stalled => "stalled",
            CloseReason::TransportError => "transport_error",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// The engine: connection table plus the device the handlers mutate.
#[derive(Debug)]
pub struct HttpEngine {
    connections: HashMap<ConnectionId, Connection>,
    device: Device,
    limits: EngineLimits,
}

impl HttpEngine {
    pub fn new(device: Device, limits: EngineLimits) -> Self {
        Self {
            connections: HashMap::with_capacity(limits.max_connections),
            device,
            limits,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn phase(&self, conn: ConnectionId) -> Option<&ConnectionPhase> {
        self.connections.get(&conn).map(Connection::phase)
    }

    /// Allocate state for a new connection and start listening for its request.
    pub fn on_accept<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        conn: ConnectionId,
    ) -> Result<(), AcceptError> {
        if self.connections.contains_key(&conn) {
            return Err(AcceptError::Duplicate(conn));
        }
        if self.connections.len() >= self.limits.max_connections {
            tracing::warn!(
                connection_id = %conn,
                limit = self.limits.max_connections,
                "Connection table full, refusing connection"
            );
            metrics::record_connection_rejected();
            return Err(AcceptError::ResourceExhausted {
                limit: self.limits.max_connections,
            });
        }

        let mut connection = Connection::new(conn);
        transport.register(conn, IDLE_INTEREST);
        connection.transition(ConnectionPhase::AwaitingRequest);
        self.connections.insert(conn, connection);

        metrics::record_connection_accepted(self.connections.len());
        tracing::debug!(connection_id = %conn, active = self.connections.len(), "Connection accepted");
        Ok(())
    }

    /// Bytes or end-of-stream arrived.
    pub fn on_receive<T: Transport + ?Sized>(&mut self, transport: &mut T, conn: ConnectionId, received: Received) {
        let Some(connection) = self.connections.get(&conn) else {
            tracing::trace!(connection_id = %conn, "Receive for unknown connection, closing");
            if let Err(e) = transport.close(conn) {
                tracing::trace!(connection_id = %conn, error = %e, "Close of unknown connection failed");
            }
            return;
        };

        let data = match received {
            Received::Eof => {
                if matches!(connection.phase(), ConnectionPhase::Responding(_)) {
                    tracing::trace!(connection_id = %conn, "Peer half-closed during response");
                } else {
                    self.teardown(transport, conn, CloseReason::PeerClosed);
                }
                return;
            }
            Received::Data(data) => data,
        };

        transport.acknowledge(conn, data.len());

        if connection.responded() {
            tracing::debug!(connection_id = %conn, bytes = data.len(), "Request after response, closing");
            self.teardown(transport, conn, CloseReason::SecondRequest);
            return;
        }
        if !matches!(connection.phase(), ConnectionPhase::AwaitingRequest) {
            tracing::trace!(
                connection_id = %conn,
                phase = connection.phase().name(),
                "Receive in unexpected phase, dropped"
            );
            return;
        }

        let window = RequestWindow::capture(&data, self.limits.request_window);
        if window.dropped() > 0 {
            tracing::debug!(
                connection_id = %conn,
                kept = window.as_bytes().len(),
                dropped = window.dropped(),
                "Request truncated to window"
            );
        }

        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.transition(ConnectionPhase::Dispatching);
        }

        let (content_type, body) = self.dispatch(conn, &window);
        self.respond(transport, conn, content_type, &body);
    }

    /// The transport reports `len` bytes left its send buffer.
    pub fn on_sent<T: Transport + ?Sized>(&mut self, transport: &mut T, conn: ConnectionId, len: usize) {
        let Some(stream) = self.connections.get_mut(&conn).and_then(Connection::stream_mut) else {
            tracing::trace!(connection_id = %conn, len, "Sent event outside a response, dropped");
            return;
        };
        stream.note_sent();
        self.advance(transport, conn, false);
    }

    /// Periodic tick for connections registered for POLL.
    pub fn on_poll<T: Transport + ?Sized>(&mut self, transport: &mut T, conn: ConnectionId) {
        let streaming = self
            .connections
            .get_mut(&conn)
            .and_then(Connection::stream_mut)
            .is_some();
        if !streaming {
            tracing::trace!(connection_id = %conn, "Poll outside a response, dropped");
            return;
        }
        self.advance(transport, conn, true);
    }

    /// The transport failed the connection and already invalidated its handle.
    pub fn on_error(&mut self, conn: ConnectionId, error: &TransportError) {
        let Some(mut connection) = self.connections.remove(&conn) else {
            tracing::trace!(connection_id = %conn, error = %error, "Error for unknown connection");
            return;
        };
        let left = connection.transition(ConnectionPhase::Closed);
        tracing::warn!(
            connection_id = %conn,
            phase = left.name(),
            error = %error,
            "Connection failed"
        );
        metrics::record_connection_closed(CloseReason::TransportError.as_str(), self.connections.len());
    }

    /// Advance Morse playback.
    pub fn tick_device(&mut self, now: Instant) {
        self.device.tick(now);
    }

    /// Tear down every connection, e.g. on shutdown.
    pub fn close_all<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for conn in ids {
            self.teardown(transport, conn, CloseReason::Shutdown);
        }
    }

    /// Run the handler for `window` and render the response body.
    fn dispatch(&mut self, conn: ConnectionId, window: &RequestWindow) -> (ContentType, Vec<u8>) {
        let start_time = Instant::now();
        let request = window.parse();
        let route = routing::resolve(&request);
        let request_id = request_tracing::new_request_id();
        let span = request_tracing::request_span(conn, request_id, request.method.as_str(), &request.path_lossy());
        let _entered = span.enter();

        match (route, request.body) {
            (Route::MorseStop, _) => handlers::apply_morse_stop(&mut self.device),
            (Route::Signal, Some(body)) => handlers::apply_signal_form(&mut self.device, body),
            (Route::MorseStart, Some(body)) => handlers::apply_morse_form(&mut self.device, body),
            (Route::MorseHold, Some(body)) => handlers::apply_morse_hold_form(&mut self.device, body),
            (Route::Signal | Route::MorseStart | Route::MorseHold, None) => {
                tracing::debug!(route = route.name(), "Request has no body, handler skipped");
            }
            (Route::MorseStatus | Route::ControlPage, _) => {}
        }

        let rendered = match route {
            Route::MorseStatus => (ContentType::Json, pages::render_status_json(&self.device)),
            _ => (ContentType::Html, pages::render_page(&self.device)),
        };

        tracing::info!(route = route.name(), bytes = rendered.1.len(), "Request dispatched");
        metrics::record_request(route.name(), start_time);
        rendered
    }

    /// Start the response and push the first chunk.
    fn respond<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        conn: ConnectionId,
        content_type: ContentType,
        body: &[u8],
    ) {
        let stream = match ResponseStream::start(
            transport,
            conn,
            content_type,
            body,
            self.limits.chunk_size,
            self.limits.max_stalled_polls,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(connection_id = %conn, error = %e, "Failed to start response");
                self.teardown(transport, conn, CloseReason::WriteFailed);
                return;
            }
        };

        let Some(connection) = self.connections.get_mut(&conn) else {
            return;
        };
        transport.register(conn, STREAMING_INTEREST);
        connection.transition(ConnectionPhase::Responding(stream));
        self.advance(transport, conn, false);
    }

    /// Pump the connection's stream and tear down when it finishes or fails.
    fn advance<T: Transport + ?Sized>(&mut self, transport: &mut T, conn: ConnectionId, from_poll: bool) {
        let Some(stream) = self.connections.get_mut(&conn).and_then(Connection::stream_mut) else {
            return;
        };

        let outcome = match stream.pump(transport) {
            Ok(Progress::Done) => Some(CloseReason::Completed),
            Ok(Progress::Pending { written }) => {
                metrics::record_response_bytes(written);
                if from_poll && written == 0 && stream.note_idle_poll() {
                    tracing::warn!(
                        connection_id = %conn,
                        idle_polls = stream.idle_polls(),
                        remaining = stream.remaining(),
                        "Response stalled, aborting"
                    );
                    Some(CloseReason::Stalled)
                } else {
                    None
                }
            }
            Err(e) => {
                tracing::error!(connection_id = %conn, error = %e, "Response write failed");
                Some(CloseReason::WriteFailed)
            }
        };

        if let Some(reason) = outcome {
            self.teardown(transport, conn, reason);
        }
    }

    /// Deregister, drop state and close. A no-op for unknown connections.
    fn teardown<T: Transport + ?Sized>(&mut self, transport: &mut T, conn: ConnectionId, reason: CloseReason) {
        let Some(mut connection) = self.connections.remove(&conn) else {
            return;
        };
        transport.register(conn, Interest::NONE);
        let left = connection.transition(ConnectionPhase::Closed);
        drop(connection);

        if let Err(e) = transport.close(conn) {
            tracing::warn!(connection_id = %conn, error = %e, "Close failed");
        }

        metrics::record_connection_closed(reason.as_str(), self.connections.len());
        tracing::debug!(
            connection_id = %conn,
            phase = left.name(),
            reason = reason.as_str(),
            "Connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SignalController, SignalState, SimulatedChip};
    use crate::net::transport::WriteFlags;

    /// Records writes; capacity is fixed.
    #[derive(Default)]
    struct Recorder {
        capacity: usize,
        written: Vec<u8>,
        interests: HashMap<ConnectionId, Interest>,
        closed: Vec<ConnectionId>,
    }

    impl Transport for Recorder {
        fn register(&mut self, conn: ConnectionId, interest: Interest) {
            self.interests.insert(conn, interest);
        }
        fn write(&mut self, _conn: ConnectionId, data: &[u8], _flags: WriteFlags) -> Result<(), TransportError> {
            self.written.extend_from_slice(data);
            Ok(())
        }
        fn send_capacity(&self, _conn: ConnectionId) -> usize {
            self.capacity
        }
        fn flush(&mut self, _conn: ConnectionId) -> Result<(), TransportError> {
            Ok(())
        }
        fn acknowledge(&mut self, _conn: ConnectionId, _len: usize) {}
        fn close(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
            self.closed.push(conn);
            Ok(())
        }
    }

    fn engine(limits: EngineLimits) -> HttpEngine {
        let signal = SignalController::new(Box::new(SimulatedChip::default()), SignalState::default());
        HttpEngine::new(Device::new(signal), limits)
    }

    #[test]
    fn accept_respects_table_size() {
        let mut engine = engine(EngineLimits {
            max_connections: 1,
            ..Default::default()
        });
        let mut transport = Recorder::default();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        engine.on_accept(&mut transport, a).unwrap();
        assert_eq!(transport.interests[&a], Interest::RECV | Interest::SENT | Interest::ERROR);
        assert_eq!(
            engine.on_accept(&mut transport, b),
            Err(AcceptError::ResourceExhausted { limit: 1 })
        );
        assert_eq!(engine.on_accept(&mut transport, a), Err(AcceptError::Duplicate(a)));
    }

    #[test]
    fn status_request_completes_after_sent_event() {
        let mut engine = engine(EngineLimits::default());
        let mut transport = Recorder {
            capacity: usize::MAX,
            ..Default::default()
        };
        let conn = ConnectionId::new();
        engine.on_accept(&mut transport, conn).unwrap();
        engine.on_receive(
            &mut transport,
            conn,
            Received::Data(b"GET /morse/status HTTP/1.1\r\nHost: x\r\n\r\n".to_vec()),
        );
        assert!(transport.closed.is_empty());
        engine.on_sent(&mut transport, conn, 64);

        let text = String::from_utf8(transport.written).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("{\"playing\":false,\"status\":\"Idle\",\"hold\":false,\"output_enabled\":false}"));
        assert_eq!(transport.closed, vec![conn]);
        assert_eq!(transport.interests[&conn], Interest::NONE);
        assert_eq!(engine.active_connections(), 0);
    }

    #[test]
    fn eof_before_request_closes_but_not_while_responding() {
        let mut engine = engine(EngineLimits::default());
        let mut transport = Recorder::default();

        let idle = ConnectionId::new();
        engine.on_accept(&mut transport, idle).unwrap();
        engine.on_receive(&mut transport, idle, Received::Eof);
        assert!(engine.phase(idle).is_none());

        let busy = ConnectionId::new();
        engine.on_accept(&mut transport, busy).unwrap();
        engine.on_receive(&mut transport, busy, Received::Data(b"GET / HTTP/1.1\r\n\r\n".to_vec()));
        assert!(matches!(engine.phase(busy), Some(ConnectionPhase::Responding(_))));
        engine.on_receive(&mut transport, busy, Received::Eof);
        assert!(matches!(engine.phase(busy), Some(ConnectionPhase::Responding(_))));
    }

    #[test]
    fn error_releases_state_without_touching_transport() {
        let mut engine = engine(EngineLimits::default());
        let mut transport = Recorder::default();
        let conn = ConnectionId::new();
        engine.on_accept(&mut transport, conn).unwrap();
        engine.on_error(conn, &TransportError::Reset);
        engine.on_error(conn, &TransportError::Reset);
        assert_eq!(engine.active_connections(), 0);
        assert!(transport.closed.is_empty());
    }

    #[test]
    fn sent_and_poll_outside_response_are_ignored() {
        let mut engine = engine(EngineLimits::default());
        let mut transport = Recorder::default();
        let conn = ConnectionId::new();
        engine.on_accept(&mut transport, conn).unwrap();
        engine.on_sent(&mut transport, conn, 10);
        engine.on_poll(&mut transport, conn);
        assert!(matches!(engine.phase(conn), Some(ConnectionPhase::AwaitingRequest)));
        assert!(transport.written.is_empty());
    }
}
