//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber once per process
//! - Pick the filter: `RUST_LOG` wins, then the configured level
//!
//! # Design Decisions
//! - `try_init` so tests and embedders that already installed a subscriber are not an error
//! - Plain `fmt` layer; the panel runs on small hosts where human-readable logs are preferred

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when neither `RUST_LOG` nor the config say otherwise.
pub const DEFAULT_DIRECTIVE: &str = "clockgen_panel=info";

/// Build the filter directive for a configured level such as `"debug"`.
pub fn directive_for(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        DEFAULT_DIRECTIVE.to_string()
    } else if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("clockgen_panel={level}")
    }
}

/// Install the subscriber. Returns false if one was already installed.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| directive_for(level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
