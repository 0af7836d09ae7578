//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PanelConfig (validated, immutable)
//!     → engine limits, socket limits, initial device state
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_bind_override, load_config, parse_config, ConfigError};
pub use schema::{DeviceConfig, EngineConfig, ListenerConfig, ObservabilityConfig, PanelConfig, TransportConfig};
pub use validation::{validate_config, ValidationError};
