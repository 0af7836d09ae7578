//! Device-wide state behind the control panel.
//!
//! `Device` is the single owner of everything the HTTP handlers mutate: the
//! signal controller, the Morse player, the status banner and the Morse hold
//! lock. It is passed by `&mut` into dispatch and the Morse tick, both of which
//! run on the engine's task, so it needs no lock.

use std::time::Instant;

use crate::device::morse::{MorseError, MorsePlayer};
use crate::device::signal::{clamp_frequency, ChipError, DriveStrength, SignalController, SignalState};

/// Banner text shown at the top of the control page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBanner {
    pub message: String,
    pub is_error: bool,
}

impl StatusBanner {
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }
}

/// Output and banner saved when Morse hold is switched on.
#[derive(Debug, Clone, Default)]
struct HoldState {
    active: bool,
    output_was_enabled: bool,
    saved_banner: Option<StatusBanner>,
}

/// Why a signal change was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("Output locked for Morse")]
    Locked,
    #[error("Error: failed to program clock chip")]
    Chip(#[source] ChipError),
}

/// Everything the panel can read or change.
#[derive(Debug)]
pub struct Device {
    signal: SignalController,
    morse: MorsePlayer,
    banner: StatusBanner,
    hold: HoldState,
}

impl Device {
    /// Wrap `signal`, programming its initial settings.
    pub fn new(mut signal: SignalController) -> Self {
        if let Err(e) = signal.init() {
            tracing::error!(error = %e, "Clock chip init failed; retrying on first change");
        }
        Self {
            signal,
            morse: MorsePlayer::new(),
            banner: StatusBanner::default(),
            hold: HoldState::default(),
        }
    }

    pub fn signal_state(&self) -> SignalState {
        self.signal.state()
    }

    pub fn morse(&self) -> &MorsePlayer {
        &self.morse
    }

    pub fn banner(&self) -> &StatusBanner {
        &self.banner
    }

    pub fn hold_active(&self) -> bool {
        self.hold.active
    }

    /// Replace the banner. An empty message clears it.
    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        let message = message.into();
        self.banner = if message.is_empty() {
            StatusBanner::default()
        } else {
            StatusBanner { message, is_error }
        };
    }

    /// Program frequency (clamped) and drive. Returns true if anything changed.
    pub fn apply_signal(&mut self, frequency_hz: u64, drive: DriveStrength) -> Result<bool, SignalError> {
        let frequency_hz = clamp_frequency(frequency_hz);
        self.signal.set(frequency_hz, drive).map_err(SignalError::Chip)
    }

    /// Flip the output-enable setting. Returns the new setting.
    pub fn toggle_output(&mut self) -> Result<bool, SignalError> {
        if self.hold.active {
            return Err(SignalError::Locked);
        }
        let desired = !self.signal.state().output_enabled;
        self.signal.enable_output(desired).map_err(SignalError::Chip)?;
        Ok(desired)
    }

    pub fn apply_morse_start(&mut self, text: &str, wpm: u16, farnsworth_wpm: Option<u16>) -> Result<(), MorseError> {
        self.morse
            .start(&mut self.signal, text, wpm, farnsworth_wpm, Instant::now())
    }

    /// Request a stop. Returns true if playback was running.
    pub fn apply_morse_stop(&mut self) -> bool {
        let was_playing = self.morse.is_playing();
        self.morse.stop(Instant::now());
        was_playing
    }

    /// Lock or unlock the output for Morse use.
    pub fn apply_morse_hold(&mut self, active: bool) {
        if active {
            if !self.hold.active {
                let state = self.signal.state();
                self.hold.output_was_enabled = state.output_enabled;
                if state.output_enabled {
                    if let Err(e) = self.signal.enable_output(false) {
                        tracing::warn!(error = %e, "Failed to disable output for Morse hold");
                    }
                }
                self.hold.saved_banner = if self.banner.is_empty() {
                    None
                } else {
                    Some(self.banner.clone())
                };
            }
            self.hold.active = true;
            self.set_status("Morse mode", false);
        } else {
            if self.hold.active && self.hold.output_was_enabled {
                if let Err(e) = self.signal.enable_output(true) {
                    tracing::warn!(error = %e, "Failed to restore output after Morse hold");
                }
            }
            self.hold.active = false;
            self.hold.output_was_enabled = false;
            self.banner = self.hold.saved_banner.take().unwrap_or_default();
        }
    }

    /// Advance Morse playback.
    pub fn tick(&mut self, now: Instant) {
        self.morse.tick(&mut self.signal, now);
    }

    /// When `tick` next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.morse.deadline()
    }
}
