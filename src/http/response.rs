//! Flow-controlled response writer.
//!
//! # Responsibilities
//! - Frame a complete in-memory body as one `200 OK` response
//! - Stream the body in bounded chunks sized by the transport's send capacity
//! - Tell the engine when the last byte is out so it can tear down
//!
//! # Algorithm
//! ```text
//! start: copy body → write header (one COPY write) → flush (failure logged only) → stream state
//! pump (after header, on every sent event, on every poll tick):
//!     remaining == 0        → flush, Done
//!     capacity == 0         → Pending
//!     chunk = min(remaining, chunk_size, capacity)
//!     write(chunk, COPY | MORE unless last)
//!         OutOfMemory       → Pending (retried on next trigger)
//!         other error       → Err (engine tears down)
//!     advance, flush (failure logged only)
//! ```
//!
//! # Design Decisions
//! - The chunk size is capped so one call cannot fill the stack's buffers
//! - Capacity is re-queried on every pump because acknowledgements change it

use std::fmt::Write as _;

use crate::net::connection::ConnectionId;
use crate::net::transport::{Transport, TransportError, WriteFlags};
use crate::resilience::StallGuard;

/// Body media types the panel serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Json,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Html => "text/html; charset=utf-8",
            ContentType::Json => "application/json; charset=utf-8",
        }
    }
}

/// Fatal response failures.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to write response header: {0}")]
    Header(#[source] TransportError),
    #[error("failed to write response chunk: {0}")]
    Chunk(#[source] TransportError),
}

/// Outcome of one pump iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Bytes are still waiting; `written` were queued this time.
    Pending { written: usize },
    /// The whole body was queued and flushed.
    Done,
}

/// Longest header `build_header` can produce: JSON with a 20-digit length.
///
/// The transport's send buffer must hold at least this much.
pub const MAX_HEADER_LEN: usize = 148;

/// Build the response header for a body of `content_length` bytes.
pub fn build_header(content_type: ContentType, content_length: usize) -> String {
    let mut header = String::with_capacity(MAX_HEADER_LEN);
    header.push_str("HTTP/1.1 200 OK\r\n");
    let _ = write!(header, "Content-Type: {}\r\n", content_type.as_str());
    if content_type == ContentType::Json {
        header.push_str("Cache-Control: no-store\r\n");
    }
    let _ = write!(header, "Content-Length: {}\r\n", content_length);
    header.push_str("Connection: close\r\n\r\n");
    header
}

/// An in-flight response: an owned body copy and a cursor into it.
#[derive(Debug)]
pub struct ResponseStream {
    conn: ConnectionId,
    body: Vec<u8>,
    cursor: usize,
    chunk_size: usize,
    stall: StallGuard,
}

impl ResponseStream {
    /// Copy `body`, write the header eagerly and return the stream state.
    ///
    /// The caller may drop `body` as soon as this returns.
    pub fn start<T: Transport + ?Sized>(
        transport: &mut T,
        conn: ConnectionId,
        content_type: ContentType,
        body: &[u8],
        chunk_size: usize,
        max_stalled_polls: u32,
    ) -> Result<Self, WriteError> {
        let body = body.to_vec();
        let header = build_header(content_type, body.len());

        transport
            .write(conn, header.as_bytes(), WriteFlags::COPY)
            .map_err(WriteError::Header)?;
        if let Err(e) = transport.flush(conn) {
            tracing::warn!(connection_id = %conn, error = %e, "Header flush failed");
        }

        tracing::debug!(
            connection_id = %conn,
            content_type = content_type.as_str(),
            content_length = body.len(),
            "Response header queued"
        );

        Ok(Self {
            conn,
            body,
            cursor: 0,
            chunk_size: chunk_size.max(1),
            stall: StallGuard::new(max_stalled_polls),
        })
    }

    /// Body bytes not yet handed to the transport.
    pub fn remaining(&self) -> usize {
        self.body.len() - self.cursor
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Queue as much of the body as the transport will take right now.
    pub fn pump<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Progress, WriteError> {
        let remaining = self.remaining();
        if remaining == 0 {
            if let Err(e) = transport.flush(self.conn) {
                tracing::warn!(connection_id = %self.conn, error = %e, "Final flush failed");
            }
            return Ok(Progress::Done);
        }

        let capacity = transport.send_capacity(self.conn);
        if capacity == 0 {
            return Ok(Progress::Pending { written: 0 });
        }

        let chunk = remaining.min(self.chunk_size).min(capacity);
        if chunk == 0 {
            return Ok(Progress::Pending { written: 0 });
        }

        let flags = if chunk < remaining {
            WriteFlags::COPY | WriteFlags::MORE
        } else {
            WriteFlags::COPY
        };

        let slice = &self.body[self.cursor..self.cursor + chunk];
        match transport.write(self.conn, slice, flags) {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                tracing::trace!(connection_id = %self.conn, chunk, "Send buffer full, retrying later");
                return Ok(Progress::Pending { written: 0 });
            }
            Err(e) => {
                tracing::error!(connection_id = %self.conn, error = %e, "Chunk write failed");
                return Err(WriteError::Chunk(e));
            }
        }

        self.cursor += chunk;
        self.stall.reset();

        if let Err(e) = transport.flush(self.conn) {
            tracing::warn!(connection_id = %self.conn, error = %e, "Flush after chunk failed");
        }

        tracing::trace!(
            connection_id = %self.conn,
            chunk,
            remaining = self.remaining(),
            "Chunk queued"
        );

        Ok(Progress::Pending { written: chunk })
    }

    /// The peer acknowledged bytes.
    pub fn note_sent(&mut self) {
        self.stall.reset();
    }

    /// A poll tick passed without progress. Returns true when the stream should be abandoned.
    pub fn note_idle_poll(&mut self) -> bool {
        self.stall.record_idle_tick()
    }

    pub fn idle_polls(&self) -> u32 {
        self.stall.idle_ticks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::Interest;

    /// Minimal in-memory transport with a fixed capacity.
    #[derive(Default)]
    struct Sink {
        capacity: usize,
        written: Vec<u8>,
        flags: Vec<WriteFlags>,
        fail_with: Option<fn() -> TransportError>,
        flushes: usize,
    }

    impl Transport for Sink {
        fn register(&mut self, _conn: ConnectionId, _interest: Interest) {}

        fn write(&mut self, _conn: ConnectionId, data: &[u8], flags: WriteFlags) -> Result<(), TransportError> {
            if let Some(err) = self.fail_with {
                return Err(err());
            }
            self.written.extend_from_slice(data);
            self.flags.push(flags);
            Ok(())
        }

        fn send_capacity(&self, _conn: ConnectionId) -> usize {
            self.capacity
        }

        fn flush(&mut self, _conn: ConnectionId) -> Result<(), TransportError> {
            self.flushes += 1;
            Ok(())
        }

        fn acknowledge(&mut self, _conn: ConnectionId, _len: usize) {}

        fn close(&mut self, _conn: ConnectionId) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn header_carries_exact_length() {
        let header = build_header(ContentType::Html, 1234);
        assert!(header.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(header.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(header.contains("Content-Length: 1234\r\n"));
        assert!(header.ends_with("Connection: close\r\n\r\n"));
        assert!(!header.contains("Cache-Control"));

        let json = build_header(ContentType::Json, 0);
        assert!(json.contains("Cache-Control: no-store\r\n"));
        assert!(json.contains("Content-Length: 0\r\n"));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn longest_header_fits_the_declared_bound() {
        assert_eq!(build_header(ContentType::Json, usize::MAX).len(), MAX_HEADER_LEN);
        assert!(build_header(ContentType::Html, usize::MAX).len() < MAX_HEADER_LEN);
    }

    #[test]
    fn header_is_flushed_before_any_chunk() {
        let conn = ConnectionId::new();
        let mut sink = Sink { capacity: 0, ..Default::default() };
        let stream = ResponseStream::start(&mut sink, conn, ContentType::Html, b"body", 1024, 0).unwrap();
        assert_eq!(sink.flushes, 1);
        assert_eq!(stream.remaining(), 4);
    }

    #[test]
    fn streams_in_bounded_chunks() {
        let conn = ConnectionId::new();
        let mut sink = Sink { capacity: 4096, ..Default::default() };
        let body = vec![b'x'; 2500];
        let mut stream = ResponseStream::start(&mut sink, conn, ContentType::Html, &body, 1024, 0).unwrap();
        let header_len = sink.written.len();

        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Pending { written: 1024 });
        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Pending { written: 1024 });
        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Pending { written: 452 });
        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Done);

        assert_eq!(&sink.written[header_len..], &body[..]);
        assert!(sink.flags[1].contains(WriteFlags::MORE));
        assert!(sink.flags[2].contains(WriteFlags::MORE));
        assert!(!sink.flags[3].contains(WriteFlags::MORE));
        assert!(sink.flags.iter().all(|f| f.contains(WriteFlags::COPY)));
    }

    #[test]
    fn zero_capacity_waits() {
        let conn = ConnectionId::new();
        let mut sink = Sink { capacity: 4096, ..Default::default() };
        let mut stream = ResponseStream::start(&mut sink, conn, ContentType::Json, b"{}", 1024, 0).unwrap();
        sink.capacity = 0;
        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Pending { written: 0 });
        assert_eq!(stream.remaining(), 2);
    }

    #[test]
    fn out_of_memory_is_retried_other_errors_are_fatal() {
        let conn = ConnectionId::new();
        let mut sink = Sink { capacity: 4096, ..Default::default() };
        let mut stream = ResponseStream::start(&mut sink, conn, ContentType::Html, b"hello", 1024, 0).unwrap();

        sink.fail_with = Some(|| TransportError::OutOfMemory);
        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Pending { written: 0 });
        assert_eq!(stream.remaining(), 5);

        sink.fail_with = Some(|| TransportError::Reset);
        assert!(matches!(stream.pump(&mut sink), Err(WriteError::Chunk(TransportError::Reset))));
    }

    #[test]
    fn header_failure_aborts() {
        let conn = ConnectionId::new();
        let mut sink = Sink {
            capacity: 4096,
            fail_with: Some(|| TransportError::OutOfMemory),
            ..Default::default()
        };
        let result = ResponseStream::start(&mut sink, conn, ContentType::Html, b"body", 1024, 0);
        assert!(matches!(result, Err(WriteError::Header(TransportError::OutOfMemory))));
    }

    #[test]
    fn empty_body_is_done_immediately() {
        let conn = ConnectionId::new();
        let mut sink = Sink { capacity: 4096, ..Default::default() };
        let mut stream = ResponseStream::start(&mut sink, conn, ContentType::Html, b"", 1024, 0).unwrap();
        assert_eq!(stream.pump(&mut sink).unwrap(), Progress::Done);
    }
}
