//! Character accumulator sitting between transport adapters and the framing
//! engine.

use tokio::time::Instant;

/// Ordered characters received since the last identifier boundary.
///
/// The buffer has a hard capacity; a push past it is rejected so the caller
/// can discard the whole accumulation as noise.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    chars: String,
    len: usize,
    capacity: usize,
    last_arrival: Option<Instant>,
}

impl InputBuffer {
    /// Create an empty buffer holding at most `capacity` characters.
    pub fn new(capacity: usize) -> Self {
        Self {
            chars: String::with_capacity(capacity),
            len: 0,
            capacity,
            last_arrival: None,
        }
    }

    /// Append a character received at `now`.
    ///
    /// Returns `false` without modifying the buffer if it is full.
    #[must_use]
    pub fn push(&mut self, c: char, now: Instant) -> bool {
        if self.len >= self.capacity {
            return false;
        }
        self.chars.push(c);
        self.len += 1;
        self.last_arrival = Some(now);
        true
    }

    /// Arrival time of the most recent character, if any is buffered.
    pub fn last_arrival(&self) -> Option<Instant> {
        self.last_arrival
    }

    /// Buffered characters in arrival order.
    pub fn as_str(&self) -> &str {
        &self.chars
    }

    /// Number of buffered characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take the buffered characters, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        let taken = std::mem::replace(&mut self.chars, String::with_capacity(self.capacity));
        self.len = 0;
        self.last_arrival = None;
        taken
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.len = 0;
        self.last_arrival = None;
    }
}
