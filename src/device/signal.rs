//! Clock output controller.
//!
//! # Responsibilities
//! - Hold the programmed frequency, drive strength and output-enable state
//! - Program the clock chip only when a parameter actually changes
//! - Key the output on and off for Morse playback without touching the
//!   user's output-enable setting

use std::fmt;

/// Lowest frequency accepted from the control page, in Hz.
pub const MIN_FREQUENCY_HZ: u64 = 8_000;
/// Highest frequency accepted from the control page, in Hz.
pub const MAX_FREQUENCY_HZ: u64 = 200_000_000;

/// Clamp a requested frequency into the supported range.
pub fn clamp_frequency(frequency_hz: u64) -> u64 {
    frequency_hz.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
}

/// Discrete output drive settings supported by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveStrength {
    Ma2,
    Ma4,
    Ma6,
    Ma8,
}

impl DriveStrength {
    pub const ALL: [DriveStrength; 4] = [DriveStrength::Ma2, DriveStrength::Ma4, DriveStrength::Ma6, DriveStrength::Ma8];

    pub fn from_milliamps(ma: u64) -> Option<Self> {
        match ma {
            2 => Some(DriveStrength::Ma2),
            4 => Some(DriveStrength::Ma4),
            6 => Some(DriveStrength::Ma6),
            8 => Some(DriveStrength::Ma8),
            _ => None,
        }
    }

    pub fn milliamps(self) -> u8 {
        match self {
            DriveStrength::Ma2 => 2,
            DriveStrength::Ma4 => 4,
            DriveStrength::Ma6 => 6,
            DriveStrength::Ma8 => 8,
        }
    }
}

impl Default for DriveStrength {
    fn default() -> Self {
        DriveStrength::Ma4
    }
}

impl fmt::Display for DriveStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mA", self.milliamps())
    }
}

/// Errors from the clock chip driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChipError {
    #[error("chip rejected frequency {0} Hz")]
    Frequency(u64),
    #[error("chip bus error: {0}")]
    Bus(String),
}

/// Register-level driver for the clock chip.
pub trait ClockChip: Send {
    /// Program CLK0 with a frequency and drive strength.
    fn program(&mut self, frequency_hz: u64, drive: DriveStrength) -> Result<(), ChipError>;

    /// Enable or disable the CLK0 output stage.
    fn set_output(&mut self, enabled: bool) -> Result<(), ChipError>;
}

/// Chip stand-in used on the host: records what it was told.
#[derive(Debug, Default, Clone)]
pub struct SimulatedChip {
    pub programmed: Option<(u64, DriveStrength)>,
    pub output_on: bool,
    pub program_calls: usize,
}

impl ClockChip for SimulatedChip {
    fn program(&mut self, frequency_hz: u64, drive: DriveStrength) -> Result<(), ChipError> {
        self.programmed = Some((frequency_hz, drive));
        self.program_calls += 1;
        tracing::debug!(frequency_hz, drive = %drive, "Simulated chip programmed");
        Ok(())
    }

    fn set_output(&mut self, enabled: bool) -> Result<(), ChipError> {
        self.output_on = enabled;
        Ok(())
    }
}

/// Snapshot of the user-visible signal settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalState {
    pub frequency_hz: u64,
    pub drive: DriveStrength,
    pub output_enabled: bool,
}

impl Default for SignalState {
    fn default() -> Self {
        Self {
            frequency_hz: 1_008_000,
            drive: DriveStrength::Ma4,
            output_enabled: false,
        }
    }
}

/// Owns the chip and the settings last applied to it.
pub struct SignalController {
    chip: Box<dyn ClockChip>,
    state: SignalState,
    initialized: bool,
}

impl SignalController {
    pub fn new(chip: Box<dyn ClockChip>, initial: SignalState) -> Self {
        Self {
            chip,
            state: initial,
            initialized: false,
        }
    }

    /// Program the initial settings with the output off.
    pub fn init(&mut self) -> Result<(), ChipError> {
        if self.initialized {
            return Ok(());
        }
        self.chip.program(self.state.frequency_hz, self.state.drive)?;
        self.chip.set_output(false)?;
        self.state.output_enabled = false;
        self.initialized = true;
        tracing::info!(
            frequency_hz = self.state.frequency_hz,
            drive = %self.state.drive,
            "Clock chip initialized"
        );
        Ok(())
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    /// Apply a frequency and drive. Returns true if anything changed.
    pub fn set(&mut self, frequency_hz: u64, drive: DriveStrength) -> Result<bool, ChipError> {
        self.init()?;
        if self.state.frequency_hz == frequency_hz && self.state.drive == drive {
            return Ok(false);
        }
        self.chip.program(frequency_hz, drive)?;
        self.state.frequency_hz = frequency_hz;
        self.state.drive = drive;
        tracing::info!(frequency_hz, drive = %drive, "Signal updated");
        Ok(true)
    }

    /// Change the user's output-enable setting.
    pub fn enable_output(&mut self, enable: bool) -> Result<(), ChipError> {
        self.init()?;
        self.chip.set_output(enable)?;
        if self.state.output_enabled != enable {
            self.state.output_enabled = enable;
            tracing::info!(output = if enable { "on" } else { "off" }, "Output toggled");
        }
        Ok(())
    }

    /// Drive the output stage directly, leaving the setting untouched.
    pub fn key(&mut self, on: bool) -> Result<(), ChipError> {
        if !self.initialized {
            return Err(ChipError::Bus("output not initialized".to_string()));
        }
        self.chip.set_output(on)
    }

    /// Put the output stage back to the user's setting.
    pub fn restore_output(&mut self) {
        if !self.initialized {
            return;
        }
        if let Err(e) = self.chip.set_output(self.state.output_enabled) {
            tracing::warn!(error = %e, "Failed to restore output state");
        }
    }
}

impl fmt::Debug for SignalController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalController")
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingChip;

    impl ClockChip for FailingChip {
        fn program(&mut self, frequency_hz: u64, _drive: DriveStrength) -> Result<(), ChipError> {
            Err(ChipError::Frequency(frequency_hz))
        }

        fn set_output(&mut self, _enabled: bool) -> Result<(), ChipError> {
            Ok(())
        }
    }

    #[test]
    fn clamps_frequency() {
        assert_eq!(clamp_frequency(10), MIN_FREQUENCY_HZ);
        assert_eq!(clamp_frequency(1_000_000), 1_000_000);
        assert_eq!(clamp_frequency(u64::MAX), MAX_FREQUENCY_HZ);
    }

    #[test]
    fn drive_strength_is_discrete() {
        assert_eq!(DriveStrength::from_milliamps(6), Some(DriveStrength::Ma6));
        assert_eq!(DriveStrength::from_milliamps(3), None);
        assert_eq!(DriveStrength::Ma8.to_string(), "8 mA");
    }

    #[test]
    fn set_reports_changes() {
        let mut ctl = SignalController::new(Box::new(SimulatedChip::default()), SignalState::default());
        assert!(ctl.set(1_000_000, DriveStrength::Ma4).unwrap());
        assert!(!ctl.set(1_000_000, DriveStrength::Ma4).unwrap());
        assert_eq!(ctl.state().frequency_hz, 1_000_000);
    }

    #[test]
    fn failed_program_keeps_state() {
        let mut ctl = SignalController::new(Box::new(FailingChip), SignalState::default());
        assert!(ctl.set(2_000_000, DriveStrength::Ma8).is_err());
        assert_eq!(ctl.state(), SignalState::default());
    }

    #[test]
    fn key_requires_init() {
        let mut ctl = SignalController::new(Box::new(SimulatedChip::default()), SignalState::default());
        assert!(ctl.key(true).is_err());
        ctl.init().unwrap();
        assert!(ctl.key(true).is_ok());
        assert!(!ctl.state().output_enabled);
    }
}
