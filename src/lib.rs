//! Clock generator control panel.
//!
//! An event-driven HTTP engine that serves a control page for a programmable
//! clock generator and plays Morse messages on its output.

pub mod config;
pub mod device;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pages;
pub mod resilience;
pub mod routing;

pub use config::PanelConfig;
pub use http::{HttpEngine, PanelServer};
pub use lifecycle::Shutdown;
