//! Mutation handlers for the control page forms.
//!
//! Each handler decodes its form fields, applies them to the device and leaves
//! the outcome in the status banner. None of them write to the transport: the
//! engine renders the page afterwards.

use crate::device::{morse, Device, DriveStrength, SignalError};
use crate::http::form::extract_form_value;

/// Decoded-value capacities, matching the page's input sizes.
const ACTION_CAPACITY: usize = 31;
const FREQUENCY_CAPACITY: usize = 31;
const NUMBER_CAPACITY: usize = 7;
const TEXT_CAPACITY: usize = morse::MAX_CHARS * 3 - 1;

/// Parse a non-negative decimal integer, rejecting empty or trailing garbage.
fn parse_uint(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Leading decimal digits of `value`, `None` if there are none.
fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits.bytes().take_while(|b| b.is_ascii_digit()).count();
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// `POST /signal`.
pub fn apply_signal_form(device: &mut Device, body: &[u8]) {
    let action = extract_form_value(body, "action", ACTION_CAPACITY).unwrap_or_default();
    if action == "toggle-output" {
        match device.toggle_output() {
            Ok(true) => device.set_status("Output enabled", false),
            Ok(false) => device.set_status("Output disabled", false),
            Err(SignalError::Locked) => device.set_status("Output locked for Morse", true),
            Err(e @ SignalError::Chip(_)) => {
                tracing::error!(error = %e, "Output toggle failed");
                device.set_status("Error: failed to toggle output", true);
            }
        }
        return;
    }

    let freq_raw = extract_form_value(body, "frequency", FREQUENCY_CAPACITY);
    let drive_raw = extract_form_value(body, "drive", NUMBER_CAPACITY);

    let frequency = freq_raw.as_deref().and_then(parse_uint);
    let drive_ma = drive_raw.as_deref().and_then(parse_uint);

    if let Some(ma) = drive_ma {
        if DriveStrength::from_milliamps(ma).is_none() {
            tracing::warn!(drive_ma = ma, "Drive out of range");
            device.set_status("Error: drive must be 2, 4, 6 or 8 mA", true);
            return;
        }
    }

    let (Some(frequency), Some(drive)) = (frequency, drive_ma.and_then(DriveStrength::from_milliamps)) else {
        tracing::warn!(
            frequency = freq_raw.as_deref().unwrap_or(""),
            drive = drive_raw.as_deref().unwrap_or(""),
            "Invalid signal form data"
        );
        device.set_status("Error: invalid form data", true);
        return;
    };

    match device.apply_signal(frequency, drive) {
        Ok(true) => {
            let state = device.signal_state();
            let message = format!("Applied {} Hz @ {} mA", state.frequency_hz, state.drive.milliamps());
            device.set_status(message, false);
        }
        Ok(false) => device.set_status("No parameter change", false),
        Err(e) => {
            tracing::error!(error = %e, "Signal update failed");
            device.set_status(e.to_string(), true);
        }
    }
}

/// `POST /morse`.
pub fn apply_morse_form(device: &mut Device, body: &[u8]) {
    let text = extract_form_value(body, "text", TEXT_CAPACITY).unwrap_or_default();
    let wpm_raw = extract_form_value(body, "wpm", NUMBER_CAPACITY).unwrap_or_default();
    let fwpm_raw = extract_form_value(body, "fwpm", NUMBER_CAPACITY).unwrap_or_default();

    let text_len = text.chars().count();
    if text_len == 0 {
        device.set_status("Error: text is required", true);
        return;
    }
    if text_len > morse::MAX_CHARS {
        device.set_status(format!("Error: text must be {} characters or fewer", morse::MAX_CHARS), true);
        return;
    }

    let wpm = match parse_leading_int(&wpm_raw) {
        Some(w) if (i64::from(morse::MIN_WPM)..=i64::from(morse::MAX_WPM)).contains(&w) => w as u16,
        _ => {
            device.set_status("Error: WPM must be 1-1000", true);
            return;
        }
    };

    let farnsworth = if fwpm_raw.is_empty() {
        None
    } else {
        match parse_leading_int(&fwpm_raw) {
            Some(fw) if fw >= 1 && fw <= i64::from(wpm) => Some(fw as u16),
            _ => {
                device.set_status("Error: Farnsworth must be 1-<=WPM", true);
                return;
            }
        }
    };

    if device.morse().is_playing() {
        device.set_status("Morse playback busy", true);
        return;
    }

    if let Err(e) = device.apply_morse_start(&text, wpm, farnsworth) {
        tracing::warn!(error = %e, "Morse start refused");
        device.set_status(e.to_string(), true);
        return;
    }

    if !device.hold_active() {
        device.set_status("Morse playback started", false);
    }
}

/// `POST /morse/stop`.
pub fn apply_morse_stop(device: &mut Device) {
    let was_playing = device.apply_morse_stop();
    if device.hold_active() {
        return;
    }
    if was_playing {
        device.set_status("Stop requested", false);
    } else {
        device.set_status("Morse playback idle", false);
    }
}

/// `POST /morse/hold`.
pub fn apply_morse_hold_form(device: &mut Device, body: &[u8]) {
    let active = extract_form_value(body, "active", NUMBER_CAPACITY).unwrap_or_default();
    let activate = matches!(active.as_bytes().first(), Some(b'1' | b't' | b'T'));
    device.apply_morse_hold(activate);
}
