//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the device from its configured initial settings
//! - Start the metrics exporter when enabled
//! - Bind the listener last, so traffic only arrives when everything is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use crate::config::{DeviceConfig, ObservabilityConfig};
use crate::device::{ClockChip, Device, DriveStrength, SignalController, SignalState, SimulatedChip};
use crate::device::signal::clamp_frequency;
use crate::observability::metrics;

/// Initial signal state from config. Out-of-range values fall back to defaults.
pub fn initial_signal_state(config: &DeviceConfig) -> SignalState {
    SignalState {
        frequency_hz: clamp_frequency(config.initial_frequency_hz),
        drive: DriveStrength::from_milliamps(config.initial_drive_ma).unwrap_or_default(),
        output_enabled: false,
    }
}

/// Build the device around `chip`.
pub fn build_device_with(chip: Box<dyn ClockChip>, config: &DeviceConfig) -> Device {
    let state = initial_signal_state(config);
    tracing::info!(
        frequency_hz = state.frequency_hz,
        drive = %state.drive,
        "Initializing clock chip"
    );
    Device::new(SignalController::new(chip, state))
}

/// Build the device around the simulated chip.
pub fn build_device(config: &DeviceConfig) -> Device {
    build_device_with(Box::new(SimulatedChip::default()), config)
}

/// Start the Prometheus exporter if configured.
pub fn start_metrics(config: &ObservabilityConfig) {
    if !config.metrics_enabled {
        return;
    }
    match config.metrics_address.parse() {
        Ok(addr) => metrics::init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}
