//! Device subsystem: the hardware the panel controls.
//!
//! # Data Flow
//! ```text
//! HTTP handler (decoded form values)
//!     → panel.rs (Device: banner, Morse hold lock)
//!     → signal.rs (SignalController → ClockChip)
//!     → morse.rs (MorsePlayer, keyed through SignalController)
//!
//! Event loop Morse timer
//!     → Device::tick → MorsePlayer::tick → ClockChip::set_output
//! ```

pub mod morse;
pub mod panel;
pub mod signal;

pub use morse::{MorseError, MorsePlayer, MorseStatus};
pub use panel::{Device, SignalError, StatusBanner};
pub use signal::{ClockChip, DriveStrength, SignalController, SignalState, SimulatedChip};
