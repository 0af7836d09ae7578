//! Request capture and parsing.
//!
//! # Responsibilities
//! - Copy one received segment into a fixed-capacity window
//! - Split out the method token, the path and the body
//!
//! # Design Decisions
//! - Oversized requests are truncated to the window, never rejected
//! - No reassembly across segments: a browser request fits one segment
//! - A missing blank line means "no body", not an error

/// Request methods the router distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    /// Anything else. Falls through to the control page.
    Other,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other => "OTHER",
        }
    }
}

/// Bounded copy of one received segment.
#[derive(Debug, Clone)]
pub struct RequestWindow {
    buf: Vec<u8>,
    capacity: usize,
    dropped: usize,
}

impl RequestWindow {
    /// An empty window that holds at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append as much of `bytes` as fits. Returns false if anything was dropped.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        let room = self.capacity - self.buf.len();
        let take = room.min(bytes.len());
        self.buf.extend_from_slice(&bytes[..take]);
        self.dropped += bytes.len() - take;
        take == bytes.len()
    }

    /// Capture a single segment.
    pub fn capture(bytes: &[u8], capacity: usize) -> Self {
        let mut window = Self::with_capacity(capacity);
        window.append(bytes);
        window
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes that did not fit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn parse(&self) -> Request<'_> {
        Request::parse(&self.buf)
    }
}

/// A parsed view over a request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: Method,
    /// Path bytes, `None` if the request line had no terminating space.
    pub path: Option<&'a [u8]>,
    /// Bytes after the first blank line.
    pub body: Option<&'a [u8]>,
}

impl<'a> Request<'a> {
    pub fn parse(raw: &'a [u8]) -> Self {
        let (method, rest) = if let Some(rest) = raw.strip_prefix(b"GET ") {
            (Method::Get, Some(rest))
        } else if let Some(rest) = raw.strip_prefix(b"POST ") {
            (Method::Post, Some(rest))
        } else {
            (Method::Other, None)
        };

        let path = rest.and_then(|rest| {
            let end = rest.iter().position(|&b| b == b' ')?;
            Some(&rest[..end])
        });

        let body = find(raw, b"\r\n\r\n").map(|pos| &raw[pos + 4..]);

        Self { method, path, body }
    }

    /// Path as text, for logging.
    pub fn path_lossy(&self) -> std::borrow::Cow<'a, str> {
        match self.path {
            Some(path) => String::from_utf8_lossy(path),
            None => std::borrow::Cow::Borrowed("-"),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
