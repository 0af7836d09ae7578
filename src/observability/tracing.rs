//! Request spans.
//!
//! Every dispatched request runs inside a span carrying a fresh UUID v4
//! `request_id`, so the handler, renderer and response writer log lines for
//! one request can be correlated even though they run across several events.

use uuid::Uuid;

use crate::net::connection::ConnectionId;

/// Generate a request ID.
pub fn new_request_id() -> Uuid {
    Uuid::new_v4()
}

/// Span for one dispatched request.
pub fn request_span(conn: ConnectionId, request_id: Uuid, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        connection_id = %conn,
        request_id = %request_id,
        method,
        path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_v4() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
