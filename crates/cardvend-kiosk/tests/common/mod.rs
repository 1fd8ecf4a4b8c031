//! Shared harness for kiosk integration tests.
//!
//! Builds a full [`Kiosk`] on mock hardware and drives it in 10 ms ticks,
//! the same granularity the production binary uses. Key taps go through the
//! real debounce path, so every helper that presses a key holds it for at
//! least three keypad samples.

#![allow(dead_code)]

use std::time::Duration;

use cardvend_core::constants::{INIT_SETTLE_TIME, KEY_LONG_PRESS_TIME};
use cardvend_core::types::{BillRouting, ClockTime, Denomination, KioskConfig};
use cardvend_hardware::Key;
use cardvend_hardware::mock::{
    MockBillAcceptor, MockBillAcceptorHandle, MockClock, MockClockHandle, MockCommandSource,
    MockCommandSourceHandle, MockDispenser, MockDispenserHandle, MockDisplay, MockDisplayHandle,
    MockKeypadMatrix, MockKeypadMatrixHandle, MockStatusSink, MockStatusSinkHandle,
};
use cardvend_hardware::store::MemoryStore;
use cardvend_kiosk::{Kiosk, KioskPorts, KioskState, SystemCommand};

pub const TICK: Duration = Duration::from_millis(10);

/// Long enough for a press to pass debounce, short enough to stay a tap.
pub const TAP_HOLD: Duration = Duration::from_millis(60);

pub struct Rig {
    pub kiosk: Kiosk,
    pub bills: MockBillAcceptorHandle,
    pub units: MockDispenserHandle,
    pub keys: MockKeypadMatrixHandle,
    pub screen: MockDisplayHandle,
    pub wall_clock: MockClockHandle,
    pub channel: MockStatusSinkHandle,
    pub remote: MockCommandSourceHandle,
}

impl Rig {
    pub fn new(config: KioskConfig) -> Self {
        let (acceptor, bills) = MockBillAcceptor::new();
        let (dispenser, units) = MockDispenser::new();
        let (keypad, keys) = MockKeypadMatrix::new();
        let (display, screen) = MockDisplay::new();
        let start = ClockTime::new(9, 0, 10, 3, 2026).unwrap();
        let (clock, wall_clock) = MockClock::with_time(start);
        let (status, channel) = MockStatusSink::new();
        let (commands, remote) = MockCommandSource::new();
        let kiosk = Kiosk::new(KioskPorts {
            acceptor: Box::new(acceptor),
            dispenser: Box::new(dispenser),
            keypad: Box::new(keypad),
            display: Box::new(display),
            clock: Box::new(clock),
            store: Box::new(MemoryStore::with_record(config)),
            status: Box::new(status),
            commands: Box::new(commands),
        });
        Rig {
            kiosk,
            bills,
            units,
            keys,
            screen,
            wall_clock,
            channel,
            remote,
        }
    }

    /// A rig priced for a single 20 000 bill per card.
    pub fn priced() -> Self {
        Self::new(KioskConfig {
            card_price: 20_000,
            ..KioskConfig::default()
        })
    }

    /// Tick the kiosk for `duration`, returning the last host command seen.
    pub fn run(&mut self, duration: Duration) -> Option<SystemCommand> {
        let mut requested = None;
        let mut left = duration;
        while left > Duration::ZERO {
            if let Some(command) = self.kiosk.tick(TICK) {
                requested = Some(command);
            }
            left = left.saturating_sub(TICK);
        }
        requested
    }

    pub fn run_ms(&mut self, ms: u64) -> Option<SystemCommand> {
        self.run(Duration::from_millis(ms))
    }

    /// Power-on sequence through the init settle into service.
    pub fn boot(&mut self) {
        self.run(INIT_SETTLE_TIME + Duration::from_millis(100));
        assert_eq!(self.kiosk.state(), KioskState::Idle);
    }

    pub fn tap(&mut self, key: Key) {
        self.keys.press(key);
        self.run(TAP_HOLD);
        self.keys.release(key);
        self.run(TAP_HOLD);
    }

    pub fn type_digits(&mut self, digits: &[u8]) {
        for &d in digits {
            self.tap(Key::Digit(d));
        }
    }

    /// Hold Enter and Cancel together past the long-press threshold.
    pub fn open_menu(&mut self) {
        self.keys.press(Key::Enter);
        self.keys.press(Key::Cancel);
        self.run(KEY_LONG_PRESS_TIME + Duration::from_millis(200));
        self.keys.release(Key::Enter);
        self.keys.release(Key::Cancel);
        self.run(TAP_HOLD);
    }

    /// Open the menu and authenticate with the given password digits.
    pub fn login(&mut self, password: &[u8]) {
        self.open_menu();
        self.type_digits(password);
        self.tap(Key::Enter);
    }

    /// Insert a stacked bill of the given denomination code.
    pub fn insert_stacked(&mut self, code: u8) {
        self.bills
            .insert_bill(BillRouting::Stacked, Denomination::from_code(code).unwrap());
    }

    pub fn balance(&self) -> u32 {
        self.kiosk.settings().borrow().balance()
    }

    pub fn total_cards(&self) -> u32 {
        self.kiosk.settings().borrow().snapshot().total_cards
    }
}
