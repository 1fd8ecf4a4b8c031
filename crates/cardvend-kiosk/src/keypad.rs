//! Keypad sampling, debouncing, and edge tracking
//!
//! The matrix is sampled on a fixed debounce cadence and a sample
//! becomes authoritative only when it matches the previous raw sample.
//! Authoritative transitions feed a bounded digit buffer and per-key
//! press trackers for Enter and Cancel; consumers read latched edge
//! flags and clear them explicitly.

use std::collections::VecDeque;

use tracing::{debug, trace};

use cardvend_core::constants::{KEY_DEBOUNCE_TIME, KEY_LONG_PRESS_TIME, KEYPAD_BUFFER_SIZE};
use cardvend_hardware::{Key, KeyMask, KeypadMatrix};

use crate::scheduler::{Scheduler, Timeout};

/// Accepted samples a key must stay down before the hold counts as a
/// long press.
pub(crate) const LONG_PRESS_SAMPLES: u32 =
    (KEY_LONG_PRESS_TIME.as_millis() / KEY_DEBOUNCE_TIME.as_millis()) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyPhase {
    Releasing,
    Pressing,
    PressingLong,
}

/// Press/long-press tracker for a single key.
///
/// Edge flags are latched here and survive until a consumer clears
/// them; the phase alone carries no memory of unconsumed events.
#[derive(Debug)]
struct KeyTracker {
    phase: KeyPhase,
    held_samples: u32,
    pressed: bool,
    pressed_long: bool,
}

impl KeyTracker {
    fn new() -> Self {
        Self {
            phase: KeyPhase::Releasing,
            held_samples: 0,
            pressed: false,
            pressed_long: false,
        }
    }

    /// Feeds one authoritative sample for this key.
    fn sample(&mut self, down: bool) {
        match self.phase {
            KeyPhase::Releasing => {
                if down {
                    self.phase = KeyPhase::Pressing;
                    self.held_samples = 0;
                    self.pressed = true;
                }
            }
            KeyPhase::Pressing => {
                if down {
                    self.held_samples += 1;
                    if self.held_samples >= LONG_PRESS_SAMPLES {
                        self.phase = KeyPhase::PressingLong;
                        self.pressed_long = true;
                    }
                } else {
                    self.phase = KeyPhase::Releasing;
                }
            }
            KeyPhase::PressingLong => {
                if !down {
                    self.phase = KeyPhase::Releasing;
                }
            }
        }
    }

    fn clear(&mut self) {
        self.pressed = false;
        self.pressed_long = false;
    }
}

/// Debounced keypad front end.
///
/// Digits accumulate in a bounded buffer; when the buffer is full the
/// oldest digit is silently dropped to make room. Enter and Cancel are
/// tracked separately and never enter the buffer.
pub struct KeypadManager {
    port: Box<dyn KeypadMatrix>,
    sample: Timeout,
    prev_raw: KeyMask,
    debounced: KeyMask,
    buffer: VecDeque<u8>,
    enter: KeyTracker,
    cancel: KeyTracker,
}

impl KeypadManager {
    pub fn new(port: Box<dyn KeypadMatrix>, scheduler: &Scheduler) -> Self {
        Self {
            port,
            // Born elapsed so the first step samples immediately.
            sample: Timeout::new_elapsed(scheduler),
            prev_raw: KeyMask::EMPTY,
            debounced: KeyMask::EMPTY,
            buffer: VecDeque::with_capacity(KEYPAD_BUFFER_SIZE),
            enter: KeyTracker::new(),
            cancel: KeyTracker::new(),
        }
    }

    /// Runs one cooperative step: at most one matrix sample per debounce
    /// interval.
    pub fn step(&mut self) {
        if !self.sample.take_fired() {
            return;
        }
        self.sample.start(KEY_DEBOUNCE_TIME);

        let raw = match self.port.scan() {
            Ok(mask) => mask,
            Err(e) => {
                debug!(error = %e, "Keypad scan failed; sample skipped");
                return;
            }
        };

        if raw == self.prev_raw {
            self.accept(raw);
        }
        self.prev_raw = raw;
    }

    /// Applies one authoritative sample: buffers newly pressed digits
    /// and advances the Enter/Cancel trackers.
    fn accept(&mut self, mask: KeyMask) {
        if mask != self.debounced {
            for digit in 0..=9u8 {
                let key = Key::Digit(digit);
                if mask.contains(key) && !self.debounced.contains(key) {
                    self.push_digit(digit);
                }
            }
        }
        self.enter.sample(mask.contains(Key::Enter));
        self.cancel.sample(mask.contains(Key::Cancel));
        self.debounced = mask;
    }

    fn push_digit(&mut self, digit: u8) {
        if self.buffer.len() == KEYPAD_BUFFER_SIZE {
            self.buffer.pop_front();
        }
        self.buffer.push_back(digit);
        trace!(digit, buffered = self.buffer.len(), "Digit entered");
    }

    /// Latched short-press edge on Enter.
    pub fn is_entered(&self) -> bool {
        self.enter.pressed
    }

    /// Latched long-hold edge on Enter.
    pub fn is_entered_long(&self) -> bool {
        self.enter.pressed_long
    }

    /// Latched short-press edge on Cancel.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.pressed
    }

    /// Latched long-hold edge on Cancel.
    pub fn is_cancelled_long(&self) -> bool {
        self.cancel.pressed_long
    }

    /// Clears both latched Enter edges.
    pub fn clear_entered(&mut self) {
        self.enter.clear();
    }

    /// Clears both latched Cancel edges.
    pub fn clear_cancelled(&mut self) {
        self.cancel.clear();
    }

    /// Clears every latched key edge.
    pub fn clear_events(&mut self) {
        self.enter.clear();
        self.cancel.clear();
    }

    /// Digits typed since the last clear, oldest first.
    pub fn digits(&self) -> Vec<u8> {
        self.buffer.iter().copied().collect()
    }

    pub fn digit_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear_digits(&mut self) {
        self.buffer.clear();
    }
}
