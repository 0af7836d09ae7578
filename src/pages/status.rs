//! JSON status body polled by the control page.

use serde::Serialize;

use crate::device::Device;

/// Body of `GET /morse/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MorseStatusBody<'a> {
    pub playing: bool,
    pub status: &'a str,
    pub hold: bool,
    pub output_enabled: bool,
}

const FALLBACK: &[u8] = br#"{"playing":false,"status":"Idle","hold":false,"output_enabled":false}"#;

impl<'a> MorseStatusBody<'a> {
    pub fn from_device(device: &'a Device) -> Self {
        Self {
            playing: device.morse().is_playing(),
            status: device.morse().status().text(),
            hold: device.hold_active(),
            output_enabled: device.signal_state().output_enabled,
        }
    }
}

pub fn render_status_json(device: &Device) -> Vec<u8> {
    match serde_json::to_vec(&MorseStatusBody::from_device(device)) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize status");
            FALLBACK.to_vec()
        }
    }
}
