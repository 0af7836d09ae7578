//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the panel.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::http::engine::EngineLimits;
use crate::net::socket::SocketLimits;

/// Root configuration for the control panel.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    /// Listener configuration (bind address, connection table size).
    pub listener: ListenerConfig,

    /// Request/response engine tunables.
    pub engine: EngineConfig,

    /// Socket transport sizing.
    pub transport: TransportConfig,

    /// Initial signal settings.
    pub device: DeviceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl PanelConfig {
    /// Engine limits derived from the listener and engine sections.
    pub fn engine_limits(&self) -> EngineLimits {
        EngineLimits {
            request_window: self.engine.request_window,
            chunk_size: self.engine.chunk_size,
            max_stalled_polls: self.engine.max_stalled_polls,
            max_connections: self.listener.max_connections,
        }
    }

    pub fn socket_limits(&self) -> SocketLimits {
        SocketLimits {
            send_buffer: self.transport.send_buffer,
            read_buffer: self.transport.read_buffer,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Size of the connection table. Connections beyond it are refused.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 8,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes of each request kept for parsing; the rest is dropped.
    pub request_window: usize,

    /// Largest single response write.
    pub chunk_size: usize,

    /// Poll tick interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Poll ticks without progress before a response is abandoned (0 = never).
    pub max_stalled_polls: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_window: 1024,
            chunk_size: 1024,
            poll_interval_ms: 500,
            max_stalled_polls: 60,
        }
    }
}

/// Socket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-connection send buffer in bytes (staged plus in flight).
    pub send_buffer: usize,

    /// Bytes read from a socket at a time.
    pub read_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            send_buffer: 2920,
            read_buffer: 1460,
        }
    }
}

/// Initial device settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Output frequency programmed at startup.
    pub initial_frequency_hz: u64,

    /// Drive strength at startup (2, 4, 6 or 8).
    pub initial_drive_ma: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            initial_frequency_hz: 1_008_000,
            initial_drive_ma: 4,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
