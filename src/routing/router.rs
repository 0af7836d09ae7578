//! Route lookup.
//!
//! # Design Decisions
//! - Exact, case-sensitive path match on method + path
//! - Unmatched requests are not an error: they render the control page
//! - The table is static; there is nothing to configure

use crate::http::request::{Method, Request};

/// What the engine should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET /morse/status`: JSON status body.
    MorseStatus,
    /// `POST /signal`: frequency, drive or output toggle.
    Signal,
    /// `POST /morse`: start playback.
    MorseStart,
    /// `POST /morse/stop`.
    MorseStop,
    /// `POST /morse/hold`.
    MorseHold,
    /// Anything else: render the control page.
    ControlPage,
}

impl Route {
    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Route::MorseStatus => "morse_status",
            Route::Signal => "signal",
            Route::MorseStart => "morse_start",
            Route::MorseStop => "morse_stop",
            Route::MorseHold => "morse_hold",
            Route::ControlPage => "control_page",
        }
    }
}

const ROUTES: &[(Method, &[u8], Route)] = &[
    (Method::Get, b"/morse/status", Route::MorseStatus),
    (Method::Post, b"/signal", Route::Signal),
    (Method::Post, b"/morse", Route::MorseStart),
    (Method::Post, b"/morse/stop", Route::MorseStop),
    (Method::Post, b"/morse/hold", Route::MorseHold),
];

/// Resolve a parsed request to a route.
pub fn resolve(request: &Request<'_>) -> Route {
    let Some(path) = request.path else {
        return Route::ControlPage;
    };
    ROUTES
        .iter()
        .find(|(method, route_path, _)| *method == request.method && *route_path == path)
        .map(|(_, _, route)| *route)
        .unwrap_or(Route::ControlPage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(raw: &str) -> Route {
        resolve(&Request::parse(raw.as_bytes()))
    }

    #[test]
    fn matches_exact_paths() {
        assert_eq!(route("GET /morse/status HTTP/1.1\r\n\r\n"), Route::MorseStatus);
        assert_eq!(route("POST /signal HTTP/1.1\r\n\r\n"), Route::Signal);
        assert_eq!(route("POST /morse HTTP/1.1\r\n\r\n"), Route::MorseStart);
        assert_eq!(route("POST /morse/stop HTTP/1.1\r\n\r\n"), Route::MorseStop);
        assert_eq!(route("POST /morse/hold HTTP/1.1\r\n\r\n"), Route::MorseHold);
    }

    #[test]
    fn everything_else_renders_the_page() {
        assert_eq!(route("GET / HTTP/1.1\r\n\r\n"), Route::ControlPage);
        assert_eq!(route("GET /signal HTTP/1.1\r\n\r\n"), Route::ControlPage);
        assert_eq!(route("POST /morse/status HTTP/1.1\r\n\r\n"), Route::ControlPage);
        assert_eq!(route("GET /MORSE/STATUS HTTP/1.1\r\n\r\n"), Route::ControlPage);
        assert_eq!(route("POST /morse/stopx HTTP/1.1\r\n\r\n"), Route::ControlPage);
        assert_eq!(route("DELETE /signal HTTP/1.1\r\n\r\n"), Route::ControlPage);
        assert_eq!(route("garbage"), Route::ControlPage);
    }
}
