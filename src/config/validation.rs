//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, addresses parse, drive is a chip setting)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PanelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::PanelConfig;
use crate::device::signal::{DriveStrength, MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};
use crate::http::response::MAX_HEADER_LEN;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &PanelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }

    if config.engine.request_window == 0 {
        errors.push(ValidationError::new("engine.request_window", "must be at least 1"));
    }
    if config.engine.chunk_size == 0 {
        errors.push(ValidationError::new("engine.chunk_size", "must be at least 1"));
    }
    if config.engine.poll_interval_ms == 0 {
        errors.push(ValidationError::new("engine.poll_interval_ms", "must be at least 1"));
    }

    if config.transport.send_buffer < MAX_HEADER_LEN {
        errors.push(ValidationError::new(
            "transport.send_buffer",
            format!("must be at least {MAX_HEADER_LEN} to hold a response header"),
        ));
    }
    if config.transport.read_buffer == 0 {
        errors.push(ValidationError::new("transport.read_buffer", "must be at least 1"));
    }

    let freq = config.device.initial_frequency_hz;
    if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&freq) {
        errors.push(ValidationError::new(
            "device.initial_frequency_hz",
            format!("{freq} is outside {MIN_FREQUENCY_HZ}..={MAX_FREQUENCY_HZ}"),
        ));
    }
    if DriveStrength::from_milliamps(config.device.initial_drive_ma).is_none() {
        errors.push(ValidationError::new("device.initial_drive_ma", "must be 2, 4, 6 or 8"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
