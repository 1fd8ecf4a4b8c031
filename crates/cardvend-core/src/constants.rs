//! System-wide constants for the card vending kiosk
//!
//! Timing values tuned on the bench against the real acceptor and
//! dispenser units; change them only with hardware in front of you.

use std::time::Duration;

// ============================================================================
// Polling
// ============================================================================

/// Interval between acceptor poll commands
///
/// # Value: 200 milliseconds
pub const ACCEPTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Re-check interval while a device sits in an error state
///
/// # Value: 3 seconds
pub const ERROR_RECHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Interval between idle screen refreshes (clock, balance, stock flags)
///
/// # Value: 30 seconds
pub const IDLE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Keypad
// ============================================================================

/// Debounce window: a key state must hold this long to register
///
/// # Value: 20 milliseconds
pub const KEY_DEBOUNCE_TIME: Duration = Duration::from_millis(20);

/// Hold time that turns a press into a long press
///
/// # Value: 3 seconds
pub const KEY_LONG_PRESS_TIME: Duration = Duration::from_secs(3);

/// Capacity of the keypad digit buffer; oldest digits are dropped first
///
/// # Value: 64 digits
pub const KEYPAD_BUFFER_SIZE: usize = 64;

// ============================================================================
// Dispenser control pulses
// ============================================================================

/// Width of the payout trigger pulse
///
/// # Value: 500 milliseconds
pub const PAYOUT_PULSE: Duration = Duration::from_millis(500);

/// Width of the retract (callback) trigger pulse
///
/// # Value: 300 milliseconds
pub const CALLBACK_PULSE: Duration = Duration::from_millis(300);

/// Width of the unit reset pulse
///
/// # Value: 500 milliseconds
pub const RESET_PULSE: Duration = Duration::from_millis(500);

/// Settle time after the power-on reset sequence before the kiosk goes
/// into service
///
/// # Value: 3 seconds
pub const INIT_SETTLE_TIME: Duration = Duration::from_secs(3);

/// Post-payout settle when the unit reports a low stock level
///
/// # Value: 5 seconds
pub const PAYOUT_SETTLE_LOW: Duration = Duration::from_secs(5);

/// Post-payout settle at normal stock level
///
/// # Value: 100 milliseconds
pub const PAYOUT_SETTLE_NORMAL: Duration = Duration::from_millis(100);

// ============================================================================
// Transaction timeouts
// ============================================================================

/// How long a dispensed card may sit at the unit gate before the unit
/// flags a jam
///
/// # Value: 10 seconds
pub const CARD_IN_PLACE_TIMEOUT: Duration = Duration::from_secs(10);

/// Unit-level wait for the customer to take a presented card
///
/// # Value: 60 seconds
pub const UNIT_TAKING_CARD_TIMEOUT: Duration = Duration::from_secs(60);

/// Kiosk-level wait for the customer to take a presented card before the
/// transaction is abandoned
///
/// # Value: 30 seconds
pub const KIOSK_TAKING_CARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Hold time of the accepted-bill feedback on the display
///
/// # Value: 2 seconds
pub const BILL_DISPLAY_SETTLE: Duration = Duration::from_secs(2);

// ============================================================================
// Menu timeouts
// ============================================================================

/// Idle bound on password entry
///
/// # Value: 30 seconds
///
/// # Examples
///
/// ```
/// use cardvend_core::constants::{PASSWORD_ENTRY_TIMEOUT, SETTING_SESSION_TIMEOUT};
///
/// assert!(PASSWORD_ENTRY_TIMEOUT < SETTING_SESSION_TIMEOUT);
/// ```
pub const PASSWORD_ENTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle bound on an open configuration session
///
/// # Value: 60 seconds
pub const SETTING_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Idle bound on a value entry within a session
///
/// # Value: 60 seconds
pub const DATA_ENTRY_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Reporting
// ============================================================================

/// Interval between periodic status reports
///
/// # Value: 30 seconds
pub const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Limits
// ============================================================================

/// Upper bound on operator password length, in digits
pub const MAX_PASSWORD_LENGTH: usize = 16;

/// Digit count of a complete menu time entry (hh mm dd MM yyyy)
pub const TIME_ENTRY_DIGITS: usize = 12;

/// Capacity of the software timer table; exceeding it is a fatal
/// programming error
///
/// # Value: 32 slots
pub const SCHEDULER_SLOTS: usize = 32;
