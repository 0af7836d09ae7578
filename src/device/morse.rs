//! Morse playback sequencer.
//!
//! Text is compiled into a list of key-on/key-off events up front; `tick`
//! walks the list against a deadline, so playback never blocks the event loop.
//!
//! Timing follows the PARIS convention: one unit is `1200 / wpm` ms, a dash is
//! three units, the gap between characters three units and between words
//! seven. With Farnsworth spacing the character and word gaps use the slower
//! rate while the characters themselves keep the fast one.

use std::time::{Duration, Instant};

use crate::device::signal::SignalController;

/// Longest message accepted, in characters.
pub const MAX_CHARS: usize = 20;
/// Upper bound on compiled key events.
pub const MAX_EVENTS: usize = 512;
pub const MIN_WPM: u16 = 1;
pub const MAX_WPM: u16 = 1000;

const MORSE_TABLE: &[(char, &str)] = &[
    ('A', ".-"), ('B', "-..."), ('C', "-.-."), ('D', "-.."), ('E', "."),
    ('F', "..-."), ('G', "--."), ('H', "...."), ('I', ".."), ('J', ".---"),
    ('K', "-.-"), ('L', ".-.."), ('M', "--"), ('N', "-."), ('O', "---"),
    ('P', ".--."), ('Q', "--.-"), ('R', ".-."), ('S', "..."), ('T', "-"),
    ('U', "..-"), ('V', "...-"), ('W', ".--"), ('X', "-..-"), ('Y', "-.--"),
    ('Z', "--.."), ('0', "-----"), ('1', ".----"), ('2', "..---"), ('3', "...--"),
    ('4', "....-"), ('5', "....."), ('6', "-...."), ('7', "--..."), ('8', "---.."),
    ('9', "----."), ('.', ".-.-.-"), (',', "--..--"), ('?', "..--.."), ('/', "-..-."),
    ('=', "-...-"), ('+', ".-.-."), ('-', "-....-"), ('!', "-.-.--"), ('@', ".--.-."),
];

fn lookup(symbol: char) -> Option<&'static str> {
    MORSE_TABLE
        .iter()
        .find(|(c, _)| *c == symbol)
        .map(|(_, pattern)| *pattern)
}

/// Reasons a message cannot be played.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MorseError {
    #[error("Busy")]
    Busy,
    #[error("Text must be 1-20 characters")]
    TextLength,
    #[error("WPM must be 1-1000")]
    Wpm,
    #[error("Farnsworth must be 1-{0}")]
    Farnsworth(u16),
    #[error("Invalid characters: {0}")]
    InvalidCharacters(String),
    #[error("Message has no valid characters")]
    Empty,
    #[error("Message too long")]
    TooLong,
    #[error("Output not initialized")]
    OutputUnavailable,
}

/// Coarse playback status shown on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorseStatus {
    Idle,
    Playing,
    Stopped,
}

impl MorseStatus {
    pub fn text(self) -> &'static str {
        match self {
            MorseStatus::Idle => "Idle",
            MorseStatus::Playing => "Playing...",
            MorseStatus::Stopped => "Stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyEvent {
    key_on: bool,
    duration: Duration,
}

/// Last submitted form values, echoed back into the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorseDefaults {
    pub text: String,
    pub wpm: u16,
    pub farnsworth_wpm: Option<u16>,
}

impl Default for MorseDefaults {
    fn default() -> Self {
        Self {
            text: "PARIS".to_string(),
            wpm: 15,
            farnsworth_wpm: None,
        }
    }
}

#[derive(Debug)]
pub struct MorsePlayer {
    events: Vec<KeyEvent>,
    next_event: usize,
    deadline: Option<Instant>,
    playing: bool,
    cancelled: bool,
    status: MorseStatus,
    defaults: MorseDefaults,
}

impl Default for MorsePlayer {
    fn default() -> Self {
        Self::new()
    }
}

struct Symbol {
    pattern: &'static str,
    word_gap_after: bool,
}

impl MorsePlayer {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_event: 0,
            deadline: None,
            playing: false,
            cancelled: false,
            status: MorseStatus::Idle,
            defaults: MorseDefaults::default(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn status(&self) -> MorseStatus {
        self.status
    }

    pub fn defaults(&self) -> &MorseDefaults {
        &self.defaults
    }

    /// When `tick` next has work to do.
    pub fn deadline(&self) -> Option<Instant> {
        if self.playing {
            self.deadline
        } else {
            None
        }
    }

    /// Validate, compile and start playing `text`.
    pub fn start(
        &mut self,
        signal: &mut SignalController,
        text: &str,
        wpm: u16,
        farnsworth_wpm: Option<u16>,
        now: Instant,
    ) -> Result<(), MorseError> {
        if self.playing {
            return Err(MorseError::Busy);
        }
        let char_count = text.chars().count();
        if char_count == 0 || char_count > MAX_CHARS {
            return Err(MorseError::TextLength);
        }
        if !(MIN_WPM..=MAX_WPM).contains(&wpm) {
            return Err(MorseError::Wpm);
        }
        if let Some(fw) = farnsworth_wpm {
            if fw < 1 || fw > wpm {
                return Err(MorseError::Farnsworth(wpm));
            }
        }

        self.defaults = MorseDefaults {
            text: text.to_string(),
            wpm,
            farnsworth_wpm,
        };

        let mut symbols: Vec<Symbol> = Vec::with_capacity(char_count);
        let mut invalid = String::new();
        for c in text.chars() {
            if c == ' ' {
                if let Some(last) = symbols.last_mut() {
                    last.word_gap_after = true;
                }
                continue;
            }
            match lookup(c.to_ascii_uppercase()) {
                Some(pattern) => symbols.push(Symbol {
                    pattern,
                    word_gap_after: false,
                }),
                None => invalid.push(c),
            }
        }
        if !invalid.is_empty() {
            return Err(MorseError::InvalidCharacters(invalid));
        }
        if symbols.is_empty() {
            return Err(MorseError::Empty);
        }

        let unit_ms = (1200 / u64::from(wpm)).max(1);
        let effective_fw = farnsworth_wpm.filter(|fw| *fw < wpm);
        let gap_unit_ms = match effective_fw {
            Some(fw) => 1200 / u64::from(fw),
            None => unit_ms,
        };

        let events = compile(&symbols, unit_ms, gap_unit_ms)?;
        signal.key(false).map_err(|_| MorseError::OutputUnavailable)?;

        let total: Duration = events.iter().map(|e| e.duration).sum();
        tracing::info!(
            text = %text,
            wpm,
            fwpm = ?effective_fw,
            total_ms = total.as_millis() as u64,
            "Morse playback started"
        );

        self.events = events;
        self.next_event = 0;
        self.deadline = Some(now);
        self.playing = true;
        self.cancelled = false;
        self.status = MorseStatus::Playing;
        self.defaults.farnsworth_wpm = effective_fw;
        Ok(())
    }

    /// Ask playback to stop at the next tick.
    pub fn stop(&mut self, now: Instant) {
        if !self.playing {
            self.status = MorseStatus::Stopped;
            return;
        }
        self.cancelled = true;
        self.deadline = Some(now);
    }

    /// Advance playback if the current deadline has passed.
    pub fn tick(&mut self, signal: &mut SignalController, now: Instant) {
        if !self.playing {
            return;
        }
        match self.deadline {
            Some(deadline) if now < deadline => return,
            _ => {}
        }

        if self.cancelled {
            tracing::info!("Morse playback stopped");
            self.reset(signal, MorseStatus::Stopped);
            return;
        }

        let Some(event) = self.events.get(self.next_event).copied() else {
            tracing::info!("Morse playback done");
            self.reset(signal, MorseStatus::Idle);
            return;
        };
        self.next_event += 1;

        if let Err(e) = signal.key(event.key_on) {
            tracing::warn!(error = %e, "Failed to key output");
        }
        self.deadline = Some(now + event.duration);
    }

    fn reset(&mut self, signal: &mut SignalController, status: MorseStatus) {
        if self.playing {
            let _ = signal.key(false);
            signal.restore_output();
        }
        self.playing = false;
        self.cancelled = false;
        self.events.clear();
        self.next_event = 0;
        self.deadline = None;
        self.status = status;
    }
}

fn compile(symbols: &[Symbol], unit_ms: u64, gap_unit_ms: u64) -> Result<Vec<KeyEvent>, MorseError> {
    let mut events = Vec::new();
    for (i, symbol) in symbols.iter().enumerate() {
        let elements = symbol.pattern.as_bytes();
        for (j, element) in elements.iter().enumerate() {
            if events.len() + 2 > MAX_EVENTS {
                return Err(MorseError::TooLong);
            }
            let on_ms = if *element == b'-' { unit_ms * 3 } else { unit_ms };
            events.push(KeyEvent {
                key_on: true,
                duration: Duration::from_millis(on_ms),
            });

            let off_ms = if j + 1 < elements.len() {
                unit_ms
            } else if symbol.word_gap_after {
                gap_unit_ms * 7
            } else if i + 1 == symbols.len() {
                0
            } else {
                gap_unit_ms * 3
            };
            events.push(KeyEvent {
                key_on: false,
                duration: Duration::from_millis(off_ms),
            });
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::signal::{SignalState, SimulatedChip};

    fn signal() -> SignalController {
        let mut ctl = SignalController::new(Box::new(SimulatedChip::default()), SignalState::default());
        ctl.init().unwrap();
        ctl
    }

    #[test]
    fn rejects_bad_input() {
        let mut sig = signal();
        let mut player = MorsePlayer::new();
        let now = Instant::now();
        assert_eq!(player.start(&mut sig, "", 15, None, now), Err(MorseError::TextLength));
        assert_eq!(player.start(&mut sig, "SOS", 0, None, now), Err(MorseError::Wpm));
        assert_eq!(player.start(&mut sig, "SOS", 10, Some(12), now), Err(MorseError::Farnsworth(10)));
        assert_eq!(
            player.start(&mut sig, "S~S", 10, None, now),
            Err(MorseError::InvalidCharacters("~".into()))
        );
        assert_eq!(player.start(&mut sig, "   ", 10, None, now), Err(MorseError::Empty));
        assert!(!player.is_playing());
    }

    #[test]
    fn plays_to_completion() {
        let mut sig = signal();
        let mut player = MorsePlayer::new();
        let start = Instant::now();
        player.start(&mut sig, "e", 1200, None, start).unwrap();
        assert!(player.is_playing());
        assert_eq!(player.status().text(), "Playing...");

        // "E" is one dot: key on 1 ms, key off 0 ms.
        player.tick(&mut sig, start);
        player.tick(&mut sig, start + Duration::from_millis(1));
        player.tick(&mut sig, start + Duration::from_millis(1));
        assert!(!player.is_playing());
        assert_eq!(player.status(), MorseStatus::Idle);
        assert_eq!(player.defaults().text, "e");
    }

    #[test]
    fn stop_cancels_on_next_tick() {
        let mut sig = signal();
        let mut player = MorsePlayer::new();
        let now = Instant::now();
        player.start(&mut sig, "SOS", 15, None, now).unwrap();
        assert_eq!(player.start(&mut sig, "SOS", 15, None, now), Err(MorseError::Busy));
        player.stop(now);
        player.tick(&mut sig, now);
        assert!(!player.is_playing());
        assert_eq!(player.status().text(), "Stopped");
    }

    #[test]
    fn farnsworth_stretches_gaps() {
        let symbols = [
            Symbol { pattern: ".", word_gap_after: true },
            Symbol { pattern: ".", word_gap_after: false },
        ];
        let events = compile(&symbols, 10, 100).unwrap();
        assert_eq!(events[1].duration, Duration::from_millis(700));
        assert_eq!(events[3].duration, Duration::from_millis(0));
    }
}
