//! Identifier framing engine.
//!
//! HID and keyboard-wedge readers stream characters with no message
//! boundaries other than an optional line ending. The engine decides when an
//! accumulation is complete: immediately on a terminator, or once the input
//! has been silent for the debounce window. Complete accumulations are
//! validated and normalized into an [`Identifier`]; anything else is dropped.
//!
//! All input and all timer expiries go through [`FramingEngine::tick`], so
//! there is exactly one place where an identifier can be emitted.
//!
//! # Examples
//!
//! ```
//! use rollcall_core::TransportKind;
//! use rollcall_reader::framing::{FramingConfig, FramingEngine, RawInput};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let mut engine = FramingEngine::new(FramingConfig::default(), TransportKind::Hid);
//! let now = Instant::now();
//!
//! for c in "A1B2C3D4".chars() {
//!     assert!(engine.tick(now, Some(RawInput::Char(c))).is_none());
//! }
//!
//! // Nothing yet: the debounce window is still open
//! assert!(engine.tick(now + Duration::from_millis(99), None).is_none());
//!
//! let id = engine.tick(now + Duration::from_millis(100), None).unwrap();
//! assert_eq!(id.as_str(), "A1B2C3D4");
//! ```

use crate::buffer::InputBuffer;
use rollcall_core::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_BUFFER_LEN};
use rollcall_core::{Identifier, TransportKind};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A unit of raw input after transport decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// A character to accumulate.
    Char(char),

    /// Explicit end of an identifier (CR, LF or Enter).
    Terminator,
}

/// Observable state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingState {
    /// Nothing buffered.
    Idle,

    /// Characters buffered, waiting for a terminator or the debounce expiry.
    Accumulating,
}

/// Framing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingConfig {
    /// Silence after the last character that completes an identifier.
    pub debounce: Duration,

    /// Maximum characters per accumulation; overflow discards the buffer.
    pub max_buffer_len: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
        }
    }
}

/// Debounce/terminator framing state machine.
#[derive(Debug, Clone)]
pub struct FramingEngine {
    config: FramingConfig,
    source: TransportKind,
    buffer: InputBuffer,
}

impl FramingEngine {
    /// Create an idle engine tagging identifiers with `source`.
    pub fn new(config: FramingConfig, source: TransportKind) -> Self {
        Self {
            config,
            source,
            buffer: InputBuffer::new(config.max_buffer_len),
        }
    }

    pub fn source(&self) -> TransportKind {
        self.source
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    pub fn state(&self) -> FramingState {
        if self.buffer.is_empty() {
            FramingState::Idle
        } else {
            FramingState::Accumulating
        }
    }

    /// Characters accumulated so far.
    pub fn buffered(&self) -> &str {
        self.buffer.as_str()
    }

    /// Instant at which the current accumulation expires, if accumulating.
    pub fn deadline(&self) -> Option<Instant> {
        self.buffer
            .last_arrival()
            .map(|last| last + self.config.debounce)
    }

    /// Advance the engine to `now`, optionally applying one unit of input.
    ///
    /// The debounce expiry is checked before `input` is applied, so a
    /// character arriving after the window closed starts a new accumulation.
    /// At most one identifier is returned per call. Ticking an empty buffer
    /// is a no-op.
    pub fn tick(&mut self, now: Instant, input: Option<RawInput>) -> Option<Identifier> {
        let expired = if self.deadline().is_some_and(|deadline| now >= deadline) {
            self.flush()
        } else {
            None
        };

        match input {
            None => expired,
            Some(RawInput::Terminator) => expired.or_else(|| self.flush()),
            Some(RawInput::Char(c)) => {
                if c.is_control() {
                    return expired;
                }

                if !self.buffer.push(c, now) {
                    debug!(
                        capacity = self.buffer.capacity(),
                        "Input buffer overflow, discarding accumulation"
                    );
                    self.buffer.clear();
                }
                expired
            }
        }
    }

    /// Drop any accumulated input.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    fn flush(&mut self) -> Option<Identifier> {
        if self.buffer.is_empty() {
            return None;
        }

        let raw = self.buffer.take();
        match Identifier::parse(&raw, self.source) {
            Ok(identifier) => {
                debug!(identifier = %identifier, source = %self.source, "Framed identifier");
                Some(identifier)
            }
            Err(e) => {
                debug!(raw = %raw.escape_debug(), error = %e, "Discarding invalid input");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

    fn engine() -> FramingEngine {
        FramingEngine::new(FramingConfig::default(), TransportKind::Hid)
    }

    fn feed(engine: &mut FramingEngine, now: Instant, text: &str) -> Option<Identifier> {
        let mut emitted = None;
        for c in text.chars() {
            let input = match c {
                '\r' | '\n' => RawInput::Terminator,
                c => RawInput::Char(c),
            };
            if let Some(id) = engine.tick(now, Some(input)) {
                assert!(emitted.is_none(), "more than one identifier emitted");
                emitted = Some(id);
            }
        }
        emitted
    }

    #[test]
    fn test_terminator_emits_immediately() {
        let mut engine = engine();
        let now = Instant::now();

        let id = feed(&mut engine, now, "3A4B5C6D\r").unwrap();
        assert_eq!(id.as_str(), "3A4B5C6D");
        assert_eq!(id.source(), TransportKind::Hid);
        assert_eq!(engine.state(), FramingState::Idle);
    }

    #[test]
    fn test_debounce_emits_after_silence() {
        let mut engine = engine();
        let now = Instant::now();

        assert!(feed(&mut engine, now, "A1B2C3D4").is_none());
        assert_eq!(engine.state(), FramingState::Accumulating);
        assert_eq!(engine.deadline(), Some(now + DEBOUNCE));

        assert!(engine.tick(now + Duration::from_millis(99), None).is_none());
        let id = engine.tick(now + DEBOUNCE, None).unwrap();
        assert_eq!(id.as_str(), "A1B2C3D4");
        assert_eq!(engine.deadline(), None);
    }

    #[test]
    fn test_invalid_input_is_discarded() {
        let mut engine = engine();
        let now = Instant::now();

        assert!(feed(&mut engine, now, "XYZ").is_none());
        assert!(engine.tick(now + DEBOUNCE, None).is_none());
        assert_eq!(engine.buffered(), "");
        assert_eq!(engine.state(), FramingState::Idle);
    }

    #[test]
    fn test_double_flush_emits_once() {
        let mut engine = engine();
        let now = Instant::now();

        assert!(feed(&mut engine, now, "3A4B5C6D\r").is_some());
        assert!(engine.tick(now + Duration::from_millis(5), None).is_none());
        assert!(engine.tick(now + DEBOUNCE, None).is_none());
    }

    #[test]
    fn test_each_character_extends_window() {
        let mut engine = engine();
        let start = Instant::now();

        for (i, c) in "DEADBEEF".chars().enumerate() {
            let at = start + Duration::from_millis(60 * i as u64);
            assert!(engine.tick(at, Some(RawInput::Char(c))).is_none());
        }

        let last = start + Duration::from_millis(60 * 7);
        assert!(engine.tick(last + Duration::from_millis(99), None).is_none());
        assert_eq!(engine.tick(last + DEBOUNCE, None).unwrap().as_str(), "DEADBEEF");
    }

    #[test]
    fn test_expiry_runs_before_new_input() {
        let mut engine = engine();
        let now = Instant::now();

        assert!(feed(&mut engine, now, "01234567").is_none());

        // Late character closes the previous accumulation and starts a new one
        let late = now + Duration::from_millis(150);
        let id = engine.tick(late, Some(RawInput::Char('8'))).unwrap();
        assert_eq!(id.as_str(), "01234567");
        assert_eq!(engine.buffered(), "8");
    }

    #[test]
    fn test_control_characters_do_not_extend_window() {
        let mut engine = engine();
        let now = Instant::now();

        assert!(feed(&mut engine, now, "0A0B0C0D").is_none());
        let later = now + Duration::from_millis(80);
        assert!(engine.tick(later, Some(RawInput::Char('\u{1b}'))).is_none());
        assert_eq!(engine.buffered(), "0A0B0C0D");
        assert_eq!(engine.deadline(), Some(now + DEBOUNCE));
    }

    #[test]
    fn test_terminator_on_empty_buffer() {
        let mut engine = engine();
        assert!(engine.tick(Instant::now(), Some(RawInput::Terminator)).is_none());
    }

    #[test]
    fn test_overflow_discards_buffer() {
        let config = FramingConfig {
            max_buffer_len: 24,
            ..FramingConfig::default()
        };
        let mut engine = FramingEngine::new(config, TransportKind::KeyboardWedge);
        let now = Instant::now();

        assert!(feed(&mut engine, now, &"F".repeat(25)).is_none());
        assert_eq!(engine.buffered(), "");

        let id = feed(&mut engine, now, "CAFEBABE\n").unwrap();
        assert_eq!(id.as_str(), "CAFEBABE");
        assert_eq!(id.source(), TransportKind::KeyboardWedge);
    }

    #[test]
    fn test_reset_clears_accumulation() {
        let mut engine = engine();
        let now = Instant::now();

        assert!(feed(&mut engine, now, "3A4B").is_none());
        engine.reset();
        assert_eq!(engine.state(), FramingState::Idle);
        assert!(engine.tick(now + DEBOUNCE, None).is_none());
    }

    #[rstest]
    #[case("3a4b5c6d\r", Some("3A4B5C6D"))]
    #[case(" 04A23F11 \r", Some("04A23F11"))]
    #[case("0123456789ABCDEF0123\r", Some("0123456789ABCDEF0123"))]
    #[case("1234567\r", None)]
    #[case("0123456789ABCDEF01234\r", None)]
    #[case("3A4B 5C6D\r", None)]
    #[case("G1B2C3D4\r", None)]
    fn test_validation_cases(#[case] input: &str, #[case] expected: Option<&str>) {
        let mut engine = engine();
        let id = feed(&mut engine, Instant::now(), input);
        assert_eq!(id.as_ref().map(Identifier::as_str), expected);
    }

    proptest! {
        #[test]
        fn prop_valid_hex_round_trips(hex in "[0-9a-fA-F]{8,20}") {
            let mut engine = engine();
            let now = Instant::now();
            for c in hex.chars() {
                prop_assert!(engine.tick(now, Some(RawInput::Char(c))).is_none());
            }
            let id = engine.tick(now, Some(RawInput::Terminator)).unwrap();
            prop_assert_eq!(id.as_str(), hex.to_ascii_uppercase());
        }

        #[test]
        fn prop_emitted_identifiers_are_canonical(
            chars in proptest::collection::vec(any::<char>(), 0..48),
            gaps in proptest::collection::vec(0u64..250, 48),
        ) {
            let mut engine = engine();
            let mut now = Instant::now();
            for (c, gap) in chars.into_iter().zip(gaps) {
                now += Duration::from_millis(gap);
                let input = if c == '\r' { RawInput::Terminator } else { RawInput::Char(c) };
                if let Some(id) = engine.tick(now, Some(input)) {
                    prop_assert!((8..=20).contains(&id.len()));
                    prop_assert!(id.as_str().chars().all(|c| matches!(c, '0'..='9' | 'A'..='F')));
                }
            }
        }
    }
}
