//! Dual card-dispenser control
//!
//! Two identical units run the same per-unit state machine; a small
//! arbitration layer decides which unit serves each payout or retract
//! request so that a single dead or empty unit never takes the kiosk
//! out of service.
//!
//! Sensor snapshots are refreshed for both units at the start of every
//! step, before any transition logic runs, so every transition sees
//! current hardware state. Control lines are pulsed: asserted, held by
//! a timer, then released.

use tracing::{debug, error, info, warn};

use cardvend_core::constants::{
    CALLBACK_PULSE, CARD_IN_PLACE_TIMEOUT, ERROR_RECHECK_INTERVAL, PAYOUT_PULSE,
    PAYOUT_SETTLE_LOW, PAYOUT_SETTLE_NORMAL, RESET_PULSE, UNIT_TAKING_CARD_TIMEOUT,
};
use cardvend_core::types::{DispenserHealth, UnitId};
use cardvend_hardware::DispenserPort;

use crate::scheduler::{Scheduler, Timeout};

/// Callbacks out of the dispenser into the owning kiosk.
pub trait DispenserObserver {
    /// A presented card was physically removed from `unit`.
    ///
    /// This is the booking point of a sale, regardless of what the
    /// top-level machine is doing at that moment.
    fn on_card_taken(&self, unit: UnitId);

    /// A retract pulse was issued on `unit`.
    fn on_callback_issued(&self, unit: UnitId) {
        let _ = unit;
    }
}

/// Lifecycle of one dispenser unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Waiting for work.
    Idle,
    /// About to assert the reset line.
    Resetting,
    /// Reset line held; waiting to release it.
    WaitForReset,
    /// About to assert the payout line.
    Payouting,
    /// Payout line held; waiting to release it.
    WaitForPayout,
    /// Waiting for the dispensed card to reach the gate sensor.
    WaitForCardInPlace,
    /// Card at the gate; waiting for the customer to take it.
    WaitForTakingCard,
    /// About to assert the retract line.
    Callbacking,
    /// Retract line held; waiting to release it.
    WaitForCallback,
    /// Post-transaction settle before the unit takes new work.
    WaitForStatusSettle,
    /// Unit faulted; rechecked on a fixed interval.
    Error,
}

impl UnitState {
    /// Whether a transition from `self` to `target` is legal.
    pub fn can_transition_to(self, target: UnitState) -> bool {
        matches!(
            (self, target),
            // From Idle
            (UnitState::Idle, UnitState::Error)
                | (UnitState::Idle, UnitState::Resetting)
                | (UnitState::Idle, UnitState::Payouting)
                | (UnitState::Idle, UnitState::Callbacking)
                // From Resetting
                | (UnitState::Resetting, UnitState::WaitForReset)
                // From WaitForReset
                | (UnitState::WaitForReset, UnitState::Idle)
                // From Payouting
                | (UnitState::Payouting, UnitState::WaitForPayout)
                // From WaitForPayout
                | (UnitState::WaitForPayout, UnitState::WaitForCardInPlace)
                // From WaitForCardInPlace
                | (UnitState::WaitForCardInPlace, UnitState::WaitForTakingCard)
                | (UnitState::WaitForCardInPlace, UnitState::Error)
                // From WaitForTakingCard
                | (UnitState::WaitForTakingCard, UnitState::WaitForStatusSettle)
                | (UnitState::WaitForTakingCard, UnitState::Error)
                // From Callbacking
                | (UnitState::Callbacking, UnitState::WaitForCallback)
                // From WaitForCallback
                | (UnitState::WaitForCallback, UnitState::Idle)
                // From WaitForStatusSettle
                | (UnitState::WaitForStatusSettle, UnitState::Idle)
                // From Error
                | (UnitState::Error, UnitState::Idle)
        )
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            UnitState::Idle => "idle",
            UnitState::Resetting => "resetting",
            UnitState::WaitForReset => "wait_for_reset",
            UnitState::Payouting => "payouting",
            UnitState::WaitForPayout => "wait_for_payout",
            UnitState::WaitForCardInPlace => "wait_for_card_in_place",
            UnitState::WaitForTakingCard => "wait_for_taking_card",
            UnitState::Callbacking => "callbacking",
            UnitState::WaitForCallback => "wait_for_callback",
            UnitState::WaitForStatusSettle => "wait_for_status_settle",
            UnitState::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Work queued against one unit. A new request replaces any queued one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    Reset,
    Payout,
    Callback,
}

/// One physical unit: state machine, sensor snapshot, queued work, and
/// the single timer the state machine is allowed to hold.
struct UnitDriver {
    unit: UnitId,
    state: UnitState,
    health: DispenserHealth,
    pending: Option<UnitAction>,
    timer: Timeout,
}

impl UnitDriver {
    fn new(unit: UnitId, scheduler: &Scheduler) -> Self {
        Self {
            unit,
            state: UnitState::Idle,
            // Conservative until the first real poll.
            health: DispenserHealth::UNKNOWN,
            pending: None,
            timer: Timeout::new(scheduler),
        }
    }

    fn set_state(&mut self, next: UnitState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "unit transition {} -> {next} not allowed",
            self.state,
        );
        debug!(unit = %self.unit, from = %self.state, to = %next, "Unit state change");
        self.state = next;
    }

    fn available(&self) -> bool {
        self.health.available()
    }

    fn ready(&self) -> bool {
        self.state == UnitState::Idle && self.pending.is_none() && self.available()
    }
}

enum ControlLine {
    Payout,
    Callback,
    Reset,
}

/// Drives both dispenser units and arbitrates requests between them.
pub struct DispenserManager {
    port: Box<dyn DispenserPort>,
    observer: Box<dyn DispenserObserver>,
    units: [UnitDriver; 2],
    /// Unit that served the most recent arbitrated request.
    active: UnitId,
}

impl DispenserManager {
    pub fn new(
        port: Box<dyn DispenserPort>,
        scheduler: &Scheduler,
        observer: Box<dyn DispenserObserver>,
    ) -> Self {
        Self {
            port,
            observer,
            units: [
                UnitDriver::new(UnitId::A, scheduler),
                UnitDriver::new(UnitId::B, scheduler),
            ],
            active: UnitId::A,
        }
    }

    /// Queues a payout on the unit picked by failover arbitration.
    /// Returns false (and logs) when no unit can serve it.
    pub fn request_payout(&mut self) -> bool {
        self.request(UnitAction::Payout)
    }

    /// Queues a card retract on the unit picked by failover arbitration.
    pub fn request_callback(&mut self) -> bool {
        self.request(UnitAction::Callback)
    }

    /// Queues a reset pulse on one specific unit, outside arbitration.
    pub fn request_reset(&mut self, unit: UnitId) {
        self.units[unit.index()].pending = Some(UnitAction::Reset);
    }

    fn request(&mut self, action: UnitAction) -> bool {
        let Some(unit) = self.arbitrate() else {
            warn!(action = ?action, "No unit available; request dropped");
            return false;
        };
        self.active = unit;
        self.units[unit.index()].pending = Some(action);
        info!(unit = %unit, action = ?action, "Request queued");
        true
    }

    /// Failover selection. Prefers the unit opposite the active one so
    /// wear spreads evenly, unless that unit is more depleted than the
    /// active one; falls back to whichever unit can serve at all.
    fn arbitrate(&self) -> Option<UnitId> {
        let current = &self.units[self.active.index()];
        let other = &self.units[self.active.other().index()];
        if other.available() && !(other.health.low && !current.health.low) {
            Some(other.unit)
        } else if current.available() {
            Some(current.unit)
        } else if other.available() {
            Some(other.unit)
        } else {
            None
        }
    }

    /// Runs one cooperative step for both units.
    pub fn step(&mut self) {
        self.refresh_health();
        for index in 0..self.units.len() {
            self.step_unit(index);
        }
    }

    fn refresh_health(&mut self) {
        for driver in &mut self.units {
            match self.port.read_health(driver.unit) {
                Ok(health) => {
                    if health == driver.health {
                        continue;
                    }
                    if health.error && !driver.health.error {
                        warn!(unit = %driver.unit, "Unit reports an error condition");
                    } else if !health.error && driver.health.error {
                        info!(unit = %driver.unit, "Unit error condition cleared");
                    }
                    if health.empty && !driver.health.empty {
                        warn!(unit = %driver.unit, "Unit out of cards");
                    }
                    if health.low && !driver.health.low {
                        info!(unit = %driver.unit, "Unit stock low");
                    }
                    driver.health = health;
                }
                Err(e) => {
                    debug!(unit = %driver.unit, error = %e, "Health read failed; keeping last snapshot");
                }
            }
        }
    }

    fn step_unit(&mut self, index: usize) {
        let unit = self.units[index].unit;
        match self.units[index].state {
            UnitState::Idle => {
                // Priority: fault first, then queued work.
                if self.units[index].health.error {
                    if let Some(action) = self.units[index].pending.take() {
                        warn!(%unit, ?action, "Dropping queued action on faulted unit");
                    }
                    self.units[index].timer.start(ERROR_RECHECK_INTERVAL);
                    self.units[index].set_state(UnitState::Error);
                } else if let Some(action) = self.units[index].pending.take() {
                    let next = match action {
                        UnitAction::Reset => UnitState::Resetting,
                        UnitAction::Payout => UnitState::Payouting,
                        UnitAction::Callback => UnitState::Callbacking,
                    };
                    self.units[index].set_state(next);
                }
            }
            UnitState::Resetting => {
                self.drive(index, ControlLine::Reset, true);
                self.units[index].timer.start(RESET_PULSE);
                self.units[index].set_state(UnitState::WaitForReset);
            }
            UnitState::WaitForReset => {
                if self.units[index].timer.take_fired() {
                    self.drive(index, ControlLine::Reset, false);
                    self.units[index].set_state(UnitState::Idle);
                }
            }
            UnitState::Payouting => {
                self.drive(index, ControlLine::Payout, true);
                self.units[index].timer.start(PAYOUT_PULSE);
                self.units[index].set_state(UnitState::WaitForPayout);
            }
            UnitState::WaitForPayout => {
                if self.units[index].timer.take_fired() {
                    self.drive(index, ControlLine::Payout, false);
                    self.units[index].timer.start(CARD_IN_PLACE_TIMEOUT);
                    self.units[index].set_state(UnitState::WaitForCardInPlace);
                }
            }
            UnitState::WaitForCardInPlace => match self.card_at_gate(index) {
                Some(true) => {
                    self.units[index].timer.start(UNIT_TAKING_CARD_TIMEOUT);
                    self.units[index].set_state(UnitState::WaitForTakingCard);
                }
                Some(false) | None => {
                    if self.units[index].timer.take_fired() {
                        error!(unit = %unit, "Card never reached the gate");
                        self.units[index].timer.start(ERROR_RECHECK_INTERVAL);
                        self.units[index].set_state(UnitState::Error);
                    }
                }
            },
            UnitState::WaitForTakingCard => match self.card_at_gate(index) {
                Some(false) => {
                    info!(unit = %unit, "Card taken");
                    self.observer.on_card_taken(unit);
                    let settle = if self.units[index].health.low {
                        PAYOUT_SETTLE_LOW
                    } else {
                        PAYOUT_SETTLE_NORMAL
                    };
                    self.units[index].timer.start(settle);
                    self.units[index].set_state(UnitState::WaitForStatusSettle);
                }
                Some(true) | None => {
                    if self.units[index].timer.take_fired() {
                        error!(unit = %unit, "Presented card was never taken");
                        self.units[index].timer.start(ERROR_RECHECK_INTERVAL);
                        self.units[index].set_state(UnitState::Error);
                    }
                }
            },
            UnitState::Callbacking => {
                self.drive(index, ControlLine::Callback, true);
                self.observer.on_callback_issued(unit);
                self.units[index].timer.start(CALLBACK_PULSE);
                self.units[index].set_state(UnitState::WaitForCallback);
            }
            UnitState::WaitForCallback => {
                if self.units[index].timer.take_fired() {
                    self.drive(index, ControlLine::Callback, false);
                    self.units[index].set_state(UnitState::Idle);
                }
            }
            UnitState::WaitForStatusSettle => {
                if self.units[index].timer.take_fired() {
                    self.units[index].set_state(UnitState::Idle);
                }
            }
            UnitState::Error => {
                if self.units[index].timer.take_fired() {
                    if self.is_error() {
                        self.units[index].timer.start(ERROR_RECHECK_INTERVAL);
                    } else {
                        info!(unit = %unit, "Unit leaving error state");
                        self.units[index].set_state(UnitState::Idle);
                    }
                }
            }
        }
    }

    fn drive(&mut self, index: usize, line: ControlLine, active: bool) {
        let unit = self.units[index].unit;
        let result = match line {
            ControlLine::Payout => self.port.set_payout(unit, active),
            ControlLine::Callback => self.port.set_callback(unit, active),
            ControlLine::Reset => self.port.set_reset(unit, active),
        };
        if let Err(e) = result {
            warn!(unit = %unit, error = %e, "Control line write failed");
        }
    }

    fn card_at_gate(&self, index: usize) -> Option<bool> {
        let unit = self.units[index].unit;
        match self.port.card_at_gate(unit) {
            Ok(present) => Some(present),
            Err(e) => {
                debug!(unit = %unit, error = %e, "Gate sensor read failed");
                None
            }
        }
    }

    /// True only when both units report an error condition.
    pub fn is_error(&self) -> bool {
        self.units.iter().all(|u| u.health.error)
    }

    /// True only when both units are low on stock.
    pub fn is_low(&self) -> bool {
        self.units.iter().all(|u| u.health.low)
    }

    /// True only when both units are out of cards.
    pub fn is_empty(&self) -> bool {
        self.units.iter().all(|u| u.health.empty)
    }

    /// True when at least one unit could serve a card.
    pub fn is_available(&self) -> bool {
        self.units.iter().any(|u| u.available())
    }

    /// True when at least one available unit is idle with nothing queued.
    pub fn is_ready(&self) -> bool {
        self.units.iter().any(|u| u.ready())
    }

    /// True when both units are idle with nothing queued.
    pub fn is_idle(&self) -> bool {
        self.units
            .iter()
            .all(|u| u.state == UnitState::Idle && u.pending.is_none())
    }

    pub fn unit_state(&self, unit: UnitId) -> UnitState {
        self.units[unit.index()].state
    }

    pub fn health(&self, unit: UnitId) -> DispenserHealth {
        self.units[unit.index()].health
    }

    /// Unit that served the most recent arbitrated request.
    pub fn active_unit(&self) -> UnitId {
        self.active
    }
}
