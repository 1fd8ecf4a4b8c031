//! Mock card dispenser pair for testing and development.
//!
//! Simulates the signal bank of both units. Control lines are plain booleans
//! the core drives; the mock additionally counts rising edges so tests can
//! assert "exactly one payout pulse" without racing the pulse width.

use crate::{Result, error::HardwareError, traits::DispenserPort};
use cardvend_core::{DispenserHealth, UnitId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy)]
struct UnitLines {
    payout: bool,
    callback: bool,
    reset: bool,
    payout_pulses: u32,
    callback_pulses: u32,
    reset_pulses: u32,
    card_at_gate: bool,
    health: DispenserHealth,
}

impl UnitLines {
    fn new() -> Self {
        Self {
            payout: false,
            callback: false,
            reset: false,
            payout_pulses: 0,
            callback_pulses: 0,
            reset_pulses: 0,
            card_at_gate: false,
            health: DispenserHealth::OK,
        }
    }
}

#[derive(Debug)]
struct Inner {
    units: [UnitLines; 2],
    connected: bool,
}

/// Mock dispenser signal bank covering both units.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockDispenser;
/// use cardvend_hardware::traits::DispenserPort;
/// use cardvend_core::UnitId;
///
/// let (mut dispenser, handle) = MockDispenser::new();
///
/// dispenser.set_payout(UnitId::A, true).unwrap();
/// dispenser.set_payout(UnitId::A, false).unwrap();
///
/// assert_eq!(handle.payout_pulses(UnitId::A), 1);
/// assert_eq!(handle.payout_pulses(UnitId::B), 0);
/// ```
#[derive(Debug)]
pub struct MockDispenser {
    inner: Arc<Mutex<Inner>>,
    name: String,
}

impl MockDispenser {
    /// Create a new mock dispenser pair with the default name.
    pub fn new() -> (Self, MockDispenserHandle) {
        Self::with_name("Mock Dispenser".to_string())
    }

    /// Create a new mock dispenser pair with a custom name.
    pub fn with_name(name: String) -> (Self, MockDispenserHandle) {
        let inner = Arc::new(Mutex::new(Inner {
            units: [UnitLines::new(), UnitLines::new()],
            connected: true,
        }));

        let dispenser = Self {
            inner: Arc::clone(&inner),
            name: name.clone(),
        };
        let handle = MockDispenserHandle { inner, name };

        (dispenser, handle)
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_connected(&self, inner: &Inner) -> Result<()> {
        if !inner.connected {
            return Err(HardwareError::disconnected(&self.name));
        }
        Ok(())
    }
}

impl DispenserPort for MockDispenser {
    fn set_payout(&mut self, unit: UnitId, active: bool) -> Result<()> {
        let mut inner = self.locked();
        self.check_connected(&inner)?;
        let lines = &mut inner.units[unit.index()];
        if active && !lines.payout {
            lines.payout_pulses += 1;
        }
        lines.payout = active;
        Ok(())
    }

    fn set_callback(&mut self, unit: UnitId, active: bool) -> Result<()> {
        let mut inner = self.locked();
        self.check_connected(&inner)?;
        let lines = &mut inner.units[unit.index()];
        if active && !lines.callback {
            lines.callback_pulses += 1;
        }
        lines.callback = active;
        Ok(())
    }

    fn set_reset(&mut self, unit: UnitId, active: bool) -> Result<()> {
        let mut inner = self.locked();
        self.check_connected(&inner)?;
        let lines = &mut inner.units[unit.index()];
        if active && !lines.reset {
            lines.reset_pulses += 1;
        }
        lines.reset = active;
        Ok(())
    }

    fn card_at_gate(&self, unit: UnitId) -> Result<bool> {
        let inner = self.locked();
        self.check_connected(&inner)?;
        Ok(inner.units[unit.index()].card_at_gate)
    }

    fn read_health(&self, unit: UnitId) -> Result<DispenserHealth> {
        let inner = self.locked();
        self.check_connected(&inner)?;
        Ok(inner.units[unit.index()].health)
    }
}

/// Handle for controlling a mock dispenser pair.
#[derive(Debug, Clone)]
pub struct MockDispenserHandle {
    inner: Arc<Mutex<Inner>>,
    name: String,
}

impl MockDispenserHandle {
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set one unit's sensor snapshot.
    pub fn set_health(&self, unit: UnitId, health: DispenserHealth) {
        self.locked().units[unit.index()].health = health;
    }

    /// Put or remove a card at one unit's exit gate.
    pub fn set_card_at_gate(&self, unit: UnitId, present: bool) {
        self.locked().units[unit.index()].card_at_gate = present;
    }

    /// Current (payout, callback, reset) line levels of one unit.
    pub fn line_levels(&self, unit: UnitId) -> (bool, bool, bool) {
        let lines = self.locked().units[unit.index()];
        (lines.payout, lines.callback, lines.reset)
    }

    /// Rising edges seen on the payout line.
    pub fn payout_pulses(&self, unit: UnitId) -> u32 {
        self.locked().units[unit.index()].payout_pulses
    }

    /// Rising edges seen on the callback line.
    pub fn callback_pulses(&self, unit: UnitId) -> u32 {
        self.locked().units[unit.index()].callback_pulses
    }

    /// Rising edges seen on the reset line.
    pub fn reset_pulses(&self, unit: UnitId) -> u32 {
        self.locked().units[unit.index()].reset_pulses
    }

    /// Simulate the signal bank dropping off; every operation fails until
    /// `reconnect`.
    pub fn disconnect(&self) {
        self.locked().connected = false;
    }

    /// Bring a disconnected signal bank back.
    pub fn reconnect(&self) {
        self.locked().connected = true;
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_levels_follow_writes() {
        let (mut dispenser, handle) = MockDispenser::new();

        dispenser.set_payout(UnitId::A, true).unwrap();
        dispenser.set_reset(UnitId::B, true).unwrap();

        assert_eq!(handle.line_levels(UnitId::A), (true, false, false));
        assert_eq!(handle.line_levels(UnitId::B), (false, false, true));

        dispenser.set_payout(UnitId::A, false).unwrap();
        assert_eq!(handle.line_levels(UnitId::A), (false, false, false));
    }

    #[test]
    fn test_pulses_count_rising_edges_only() {
        let (mut dispenser, handle) = MockDispenser::new();

        dispenser.set_payout(UnitId::A, true).unwrap();
        // Holding the line is not a second pulse
        dispenser.set_payout(UnitId::A, true).unwrap();
        dispenser.set_payout(UnitId::A, false).unwrap();
        dispenser.set_payout(UnitId::A, true).unwrap();

        assert_eq!(handle.payout_pulses(UnitId::A), 2);
    }

    #[test]
    fn test_units_are_independent() {
        let (dispenser, handle) = MockDispenser::new();

        handle.set_health(
            UnitId::A,
            DispenserHealth {
                error: true,
                low: false,
                empty: false,
            },
        );
        handle.set_card_at_gate(UnitId::B, true);

        assert!(dispenser.read_health(UnitId::A).unwrap().error);
        assert!(!dispenser.read_health(UnitId::B).unwrap().error);
        assert!(!dispenser.card_at_gate(UnitId::A).unwrap());
        assert!(dispenser.card_at_gate(UnitId::B).unwrap());
    }

    #[test]
    fn test_disconnect() {
        let (mut dispenser, handle) = MockDispenser::new();

        handle.disconnect();
        assert!(dispenser.read_health(UnitId::A).is_err());
        assert!(dispenser.set_payout(UnitId::A, true).is_err());

        handle.reconnect();
        assert!(dispenser.read_health(UnitId::A).is_ok());
    }
}
