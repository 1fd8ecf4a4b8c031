//! Capability trait definitions.
//!
//! These traits establish the contract between the kiosk control core and
//! its peripherals, enabling substitution between mock implementations and
//! real drivers. All methods are synchronous and bounded: a poll either
//! returns a result within the hardware exchange timeout or fails, so the
//! caller's tick loop is never starved.
//!
//! None of the traits carry a `Send` bound. The control core owns its
//! peripherals on a single thread; tests and the simulator reach a mock from
//! other threads through its handle, not through the trait object.

use crate::error::{HardwareError, Result};
use crate::types::InboundMessage;
use cardvend_core::{AlertKind, ClockTime, DispenserHealth, KioskConfig, Scene, UnitId};

/// One key of the kiosk's 12-key matrix.
///
/// The matrix reports a bitmask with one bit per key: digits 0-9 occupy
/// bits 0-9, Enter bit 10 and Cancel bit 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Enter/confirm key.
    Enter,

    /// Cancel/clear key.
    Cancel,
}

impl Key {
    /// Create a digit key.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit is greater than 9.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardvend_hardware::traits::Key;
    ///
    /// let key = Key::digit(5).unwrap();
    /// assert_eq!(key.as_digit(), Some(5));
    ///
    /// assert!(Key::digit(10).is_err());
    /// ```
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(HardwareError::invalid_data(format!(
                "Digit must be 0-9, got {}",
                d
            )));
        }
        Ok(Self::Digit(d))
    }

    /// The key's bit position in the matrix mask.
    #[must_use]
    pub fn bit(self) -> u8 {
        match self {
            Self::Digit(d) => {
                debug_assert!(d <= 9, "Digit must be 0-9");
                d
            }
            Self::Enter => 10,
            Self::Cancel => 11,
        }
    }

    /// The key at a bit position, if any.
    #[must_use]
    pub fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0..=9 => Some(Self::Digit(bit)),
            10 => Some(Self::Enter),
            11 => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Check if this key is a digit.
    #[must_use]
    pub fn is_digit(&self) -> bool {
        matches!(self, Self::Digit(_))
    }

    /// Get the digit value if this is a digit key.
    #[must_use]
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(*d),
            _ => None,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Digit(d) => write!(f, "{d}"),
            Self::Enter => write!(f, "Enter"),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

/// One raw sample of the key matrix: a bitmask of currently pressed keys.
///
/// Bits above the 12 defined keys are stripped on construction, so two
/// samples of the same key set always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMask(u16);

impl KeyMask {
    const VALID_BITS: u16 = 0x0FFF;

    /// No keys pressed.
    pub const EMPTY: KeyMask = KeyMask(0);

    /// Build a mask from raw matrix bits.
    #[must_use]
    pub fn from_bits(bits: u16) -> Self {
        KeyMask(bits & Self::VALID_BITS)
    }

    /// The raw bits.
    #[inline]
    #[must_use]
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether the given key is pressed in this sample.
    #[inline]
    #[must_use]
    pub fn contains(self, key: Key) -> bool {
        self.0 & (1 << key.bit()) != 0
    }

    /// This sample with one more key pressed.
    #[must_use]
    pub fn with(self, key: Key) -> Self {
        KeyMask(self.0 | (1 << key.bit()))
    }

    /// This sample with one key released.
    #[must_use]
    pub fn without(self, key: Key) -> Self {
        KeyMask(self.0 & !(1 << key.bit()))
    }

    /// Whether no key is pressed.
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// One event returned by a bill acceptor poll.
///
/// Codes are carried raw off the wire; the control core maps them into the
/// domain taxonomy and decides what an unknown code means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// A bill moved, with its routing code and bill type code.
    Bill { routing: u8, denomination: u8 },

    /// A device status report.
    Status { code: u8 },
}

/// Bill acceptor transport.
///
/// Wraps the exchange protocol with the acceptor unit. Every method is one
/// bounded request/response exchange.
pub trait BillAcceptorPort {
    /// Issue a device reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not acknowledge within the
    /// exchange timeout.
    fn reset(&mut self) -> Result<()>;

    /// Poll the acceptor for the next pending event.
    ///
    /// Returns `Ok(None)` when the device has nothing to report this cycle.
    ///
    /// # Errors
    ///
    /// Returns an error on a failed or timed-out exchange; the caller treats
    /// this the same as no event and retries on the next scheduled poll.
    fn poll(&mut self) -> Result<Option<PollEvent>>;

    /// Configure which bill types are accepted and which are routed through
    /// escrow. One bit per bill type code in each mask.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration exchange fails.
    fn set_accept_mask(&mut self, bills: u16, escrow: u16) -> Result<()>;

    /// Tell the acceptor to stack the bill currently held in escrow.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    fn escrow_accept(&mut self) -> Result<()>;
}

/// Card dispenser signal bank for the redundant unit pair.
///
/// Control lines are level-triggered: the core asserts a line, holds it for
/// the pulse width, then deasserts it. Sensor reads are instantaneous.
pub trait DispenserPort {
    /// Drive the payout line of one unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be driven.
    fn set_payout(&mut self, unit: UnitId, active: bool) -> Result<()>;

    /// Drive the retract (callback) line of one unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be driven.
    fn set_callback(&mut self, unit: UnitId, active: bool) -> Result<()>;

    /// Drive the reset line of one unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be driven.
    fn set_reset(&mut self, unit: UnitId, active: bool) -> Result<()>;

    /// Whether a dispensed card is sitting at the unit's exit gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor cannot be read.
    fn card_at_gate(&self, unit: UnitId) -> Result<bool>;

    /// Read the unit's sensor snapshot (error, low, empty).
    ///
    /// # Errors
    ///
    /// Returns an error if the sensors cannot be read.
    fn read_health(&self, unit: UnitId) -> Result<DispenserHealth>;
}

/// Keypad matrix sampler.
pub trait KeypadMatrix {
    /// Take one raw sample of the matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix cannot be scanned.
    fn scan(&mut self) -> Result<KeyMask>;
}

/// Customer/operator display panel.
///
/// The core describes screens as structured [`Scene`] values; rendering is
/// entirely the panel's concern.
pub trait DisplayPanel {
    /// Replace the current screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel rejects the update.
    fn show_scene(&mut self, scene: &Scene) -> Result<()>;

    /// Toggle a persistent alert overlay, independent of the scene.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel rejects the update.
    fn set_alert(&mut self, alert: AlertKind, active: bool) -> Result<()>;
}

/// Calendar clock (RTC).
pub trait Clock {
    /// Read the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock cannot be read.
    fn now(&self) -> Result<ClockTime>;

    /// Set the clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock cannot be written.
    fn set(&mut self, time: ClockTime) -> Result<()>;
}

/// Durable configuration store.
///
/// `save` must be durable on return: the core persists synchronously on
/// every balance or counter mutation and relies on that for power-cut
/// recovery.
pub trait ConfigStore {
    /// Load the stored record, or `None` if nothing was ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if a record exists but cannot be read or parsed.
    fn load(&mut self) -> Result<Option<KioskConfig>>;

    /// Persist the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written durably.
    fn save(&mut self, config: &KioskConfig) -> Result<()>;
}

/// Outbound status/event channel. Fire-and-forget: delivery guarantees are
/// the transport's problem, not the core's.
pub trait StatusSink {
    /// Publish one payload under the given topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be handed to the transport.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()>;
}

/// Inbound command/config channel.
pub trait CommandSource {
    /// Take the next pending inbound message, if any.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is gone; the caller logs it and
    /// carries on without inbound commands.
    fn try_recv(&mut self) -> Result<Option<InboundMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_digit_validation() {
        let key = Key::digit(7).unwrap();
        assert_eq!(key, Key::Digit(7));
        assert!(key.is_digit());
        assert_eq!(key.as_digit(), Some(7));

        assert!(Key::digit(10).is_err());
    }

    #[test]
    fn test_key_bit_positions() {
        assert_eq!(Key::Digit(0).bit(), 0);
        assert_eq!(Key::Digit(9).bit(), 9);
        assert_eq!(Key::Enter.bit(), 10);
        assert_eq!(Key::Cancel.bit(), 11);
    }

    #[test]
    fn test_key_from_bit_roundtrip() {
        for bit in 0..12 {
            let key = Key::from_bit(bit).unwrap();
            assert_eq!(key.bit(), bit);
        }
        assert_eq!(Key::from_bit(12), None);
        assert_eq!(Key::from_bit(255), None);
    }

    #[test]
    fn test_key_mask_operations() {
        let mask = KeyMask::EMPTY.with(Key::Digit(3)).with(Key::Enter);

        assert!(!mask.is_empty());
        assert!(mask.contains(Key::Digit(3)));
        assert!(mask.contains(Key::Enter));
        assert!(!mask.contains(Key::Cancel));
        assert!(!mask.contains(Key::Digit(4)));

        let mask = mask.without(Key::Digit(3));
        assert!(!mask.contains(Key::Digit(3)));
        assert!(mask.contains(Key::Enter));
    }

    #[test]
    fn test_key_mask_strips_undefined_bits() {
        let mask = KeyMask::from_bits(0xF000 | (1 << 5));
        assert_eq!(mask.bits(), 1 << 5);
        assert_eq!(mask, KeyMask::EMPTY.with(Key::Digit(5)));
    }
}
