//! Top-level kiosk state machine and component aggregate.
//!
//! [`Kiosk`] owns every subordinate manager and runs them in a fixed order
//! inside [`Kiosk::tick`]: keypad, acceptor, dispenser, menu, command channel,
//! then the top-level transition logic, the status reporter, and finally the
//! scheduler's due-timer dispatch. All state lives on one thread; the shared
//! pieces (settings, display, clock) are handed out as `Rc<RefCell<_>>`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use cardvend_core::constants::{
    BILL_DISPLAY_SETTLE, IDLE_REFRESH_INTERVAL, INIT_SETTLE_TIME, KIOSK_TAKING_CARD_TIMEOUT,
};
use cardvend_core::types::{AlertKind, ClockTime, Scene, UnitId};
use cardvend_hardware::{
    BillAcceptorPort, Clock, CommandSource, ConfigStore, DispenserPort, DisplayPanel, KeypadMatrix,
    StatusSink,
};

use crate::acceptor::AcceptorManager;
use crate::command::{CommandHandler, SystemCommand};
use crate::dispenser::{DispenserManager, DispenserObserver};
use crate::keypad::KeypadManager;
use crate::menu::MenuHandler;
use crate::reporter::StatusReporter;
use crate::scheduler::{Scheduler, Timeout};
use crate::settings::{Settings, SharedSettings};
use crate::{SharedClock, SharedDisplay};

/// Top-level kiosk service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskState {
    /// Power-on: kick off acceptor init and unit resets.
    Init,
    /// Letting the reset sequence settle before going into service.
    WaitingForInit,
    /// In service; re-evaluated every tick.
    Idle,
    /// Holding the balance on screen so the customer sees the credit.
    BillAccepted,
    /// About to hand a payout request to the dispenser manager.
    PayoutingCard,
    /// Payout underway; waiting for the dispenser to finish or fail.
    WaitForPayoutingCard,
    /// Reserved. Card retraction is driven by the dispenser manager itself.
    CallbackingCard,
    /// Reserved, see [`KioskState::CallbackingCard`].
    WaitForCallbackingCard,
    /// Operator is in the service menu; vending is paused.
    Maintenance,
}

impl KioskState {
    /// Whether a transition from `self` to `target` is legal.
    pub fn can_transition_to(self, target: KioskState) -> bool {
        matches!(
            (self, target),
            // From Init
            (KioskState::Init, KioskState::WaitingForInit)
                // From WaitingForInit
                | (KioskState::WaitingForInit, KioskState::Idle)
                // From Idle
                | (KioskState::Idle, KioskState::BillAccepted)
                | (KioskState::Idle, KioskState::PayoutingCard)
                | (KioskState::Idle, KioskState::Maintenance)
                // From BillAccepted
                | (KioskState::BillAccepted, KioskState::Idle)
                // From PayoutingCard
                | (KioskState::PayoutingCard, KioskState::WaitForPayoutingCard)
                | (KioskState::PayoutingCard, KioskState::Idle)
                // From WaitForPayoutingCard
                | (KioskState::WaitForPayoutingCard, KioskState::Idle)
                // From Maintenance
                | (KioskState::Maintenance, KioskState::Idle)
        )
    }
}

impl fmt::Display for KioskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KioskState::Init => "init",
            KioskState::WaitingForInit => "waiting_for_init",
            KioskState::Idle => "idle",
            KioskState::BillAccepted => "bill_accepted",
            KioskState::PayoutingCard => "payouting_card",
            KioskState::WaitForPayoutingCard => "wait_for_payouting_card",
            KioskState::CallbackingCard => "callbacking_card",
            KioskState::WaitForCallbackingCard => "wait_for_callbacking_card",
            KioskState::Maintenance => "maintenance",
        };
        write!(f, "{name}")
    }
}

/// The full set of hardware and collaborator ports a kiosk runs on.
pub struct KioskPorts {
    pub acceptor: Box<dyn BillAcceptorPort>,
    pub dispenser: Box<dyn DispenserPort>,
    pub keypad: Box<dyn KeypadMatrix>,
    pub display: Box<dyn DisplayPanel>,
    pub clock: Box<dyn Clock>,
    pub store: Box<dyn ConfigStore>,
    pub status: Box<dyn StatusSink>,
    pub commands: Box<dyn CommandSource>,
}

/// Books a card sale the moment the customer physically takes the card.
///
/// Runs from the dispenser manager's completion callback, independent of the
/// top-level state, so a late pickup still settles correctly.
struct SaleLedger {
    settings: SharedSettings,
    display: SharedDisplay,
    clock: SharedClock,
}

impl DispenserObserver for SaleLedger {
    fn on_card_taken(&self, unit: UnitId) {
        let (balance, card_price, total_cards) = {
            let mut settings = self.settings.borrow_mut();
            settings.debit_card_sale();
            let config = settings.config();
            (config.balance, config.card_price, config.total_cards)
        };
        info!(%unit, balance, total_cards, "Card sale booked");
        let time = read_time(&self.clock);
        let scene = Scene::Idle {
            balance,
            card_price,
            time,
        };
        if let Err(e) = self.display.borrow_mut().show_scene(&scene) {
            debug!(error = %e, "Display write failed");
        }
    }

    fn on_callback_issued(&self, unit: UnitId) {
        info!(%unit, "Card retraction completed");
    }
}

fn read_time(clock: &SharedClock) -> ClockTime {
    match clock.borrow().now() {
        Ok(time) => time,
        Err(e) => {
            debug!(error = %e, "Clock read failed");
            ClockTime {
                hour: 0,
                minute: 0,
                day: 1,
                month: 1,
                year: 2000,
            }
        }
    }
}

/// The assembled kiosk control core.
pub struct Kiosk {
    scheduler: Scheduler,
    settings: SharedSettings,
    display: SharedDisplay,
    clock: SharedClock,
    acceptor: AcceptorManager,
    dispenser: DispenserManager,
    keypad: KeypadManager,
    menu: MenuHandler,
    reporter: StatusReporter,
    commands: CommandHandler,
    state: KioskState,
    state_timer: Timeout,
    refresh: Timeout,
    /// Day and month last seen, for counter rollover detection.
    last_seen: (u8, u8),
    last_scene: Option<Scene>,
    /// Last alert levels pushed to the display (low, empty).
    alerts: (bool, bool),
}

impl Kiosk {
    pub fn new(ports: KioskPorts) -> Self {
        let scheduler = Scheduler::new();
        let settings = Settings::load_or_default(ports.store).into_shared();
        let display: SharedDisplay = Rc::new(RefCell::new(ports.display));
        let clock: SharedClock = Rc::new(RefCell::new(ports.clock));
        let acceptor = AcceptorManager::new(ports.acceptor, &scheduler, settings.clone());
        let ledger = SaleLedger {
            settings: settings.clone(),
            display: display.clone(),
            clock: clock.clone(),
        };
        let dispenser = DispenserManager::new(ports.dispenser, &scheduler, Box::new(ledger));
        let keypad = KeypadManager::new(ports.keypad, &scheduler);
        let menu = MenuHandler::new(&scheduler, settings.clone(), display.clone(), clock.clone());
        let device_id = settings.borrow().device_id().to_string();
        let reporter = StatusReporter::new(ports.status, &scheduler, &device_id);
        let commands = CommandHandler::new(ports.commands, settings.clone());
        let last_seen = match clock.borrow().now() {
            Ok(time) => (time.day, time.month),
            Err(_) => (0, 0),
        };
        Kiosk {
            state_timer: Timeout::new(&scheduler),
            refresh: Timeout::new(&scheduler),
            scheduler,
            settings,
            display,
            clock,
            acceptor,
            dispenser,
            keypad,
            menu,
            reporter,
            commands,
            state: KioskState::Init,
            last_seen,
            last_scene: None,
            alerts: (false, false),
        }
    }

    /// Run one cooperative tick with `elapsed` wall time since the last one.
    ///
    /// Returns a [`SystemCommand`] when a remote command asks the host
    /// process to act.
    pub fn tick(&mut self, elapsed: Duration) -> Option<SystemCommand> {
        self.scheduler.advance(elapsed);
        self.keypad.step();
        self.acceptor.step();
        self.dispenser.step();
        self.menu.step(&mut self.keypad);
        let command = self.commands.step();
        self.step_machine();
        self.reporter
            .step(&self.settings, &self.acceptor, &self.dispenser);
        self.scheduler.dispatch();
        command
    }

    pub fn state(&self) -> KioskState {
        self.state
    }

    pub fn settings(&self) -> SharedSettings {
        self.settings.clone()
    }

    pub fn dispenser(&self) -> &DispenserManager {
        &self.dispenser
    }

    pub fn acceptor(&self) -> &AcceptorManager {
        &self.acceptor
    }

    fn step_machine(&mut self) {
        match self.state {
            KioskState::Init => self.step_init(),
            KioskState::WaitingForInit => {
                if self.state_timer.take_fired() {
                    info!("Init settle complete; kiosk in service");
                    self.go_idle();
                }
            }
            KioskState::Idle => self.step_idle(),
            KioskState::BillAccepted => {
                if self.state_timer.take_fired() {
                    self.go_idle();
                }
            }
            KioskState::PayoutingCard => self.step_payouting(),
            KioskState::WaitForPayoutingCard => self.step_wait_payouting(),
            // Reserved states; the dispenser manager drives retraction.
            KioskState::CallbackingCard | KioskState::WaitForCallbackingCard => {}
            KioskState::Maintenance => self.step_maintenance(),
        }
    }

    fn step_init(&mut self) {
        info!("Power-on init");
        if let Err(e) = self.acceptor.init() {
            warn!(error = %e, "Bill acceptor init failed; polling will retry");
        }
        self.dispenser.request_reset(UnitId::A);
        self.dispenser.request_reset(UnitId::B);
        self.state_timer.start(INIT_SETTLE_TIME);
        self.set_state(KioskState::WaitingForInit);
    }

    fn step_idle(&mut self) {
        if self.refresh.take_fired() {
            self.refresh.start(IDLE_REFRESH_INTERVAL);
            self.roll_counters();
            self.last_scene = None;
            self.show_idle();
        }
        if self.dispenser.is_error() || self.dispenser.is_empty() {
            self.acceptor.disable();
        } else {
            self.acceptor.enable();
        }
        self.update_alerts();
        if self.menu.in_setting() {
            self.acceptor.disable();
            self.set_state(KioskState::Maintenance);
            return;
        }
        if let Some(value) = self.acceptor.take_accepted() {
            self.last_scene = None;
            self.show_idle();
            self.reporter.report_bill_accepted(value);
            self.state_timer.start(BILL_DISPLAY_SETTLE);
            self.set_state(KioskState::BillAccepted);
            return;
        }
        let (balance, price) = {
            let settings = self.settings.borrow();
            (settings.balance(), settings.card_price())
        };
        if price > 0 && balance >= price && self.dispenser.is_ready() {
            self.set_state(KioskState::PayoutingCard);
        }
    }

    fn step_payouting(&mut self) {
        self.show(Scene::Working);
        if self.dispenser.request_payout() {
            self.state_timer.start(KIOSK_TAKING_CARD_TIMEOUT);
            self.set_state(KioskState::WaitForPayoutingCard);
        } else {
            warn!("Payout request not taken by any unit");
            self.go_idle();
        }
    }

    fn step_wait_payouting(&mut self) {
        if self.dispenser.is_error() {
            warn!("All units faulted while waiting for card payout");
            self.go_idle();
            return;
        }
        if self.dispenser.is_idle() {
            self.go_idle();
            return;
        }
        if let Some(value) = self.acceptor.take_accepted() {
            // Credit already happened in the acceptor manager; just show it.
            debug!(value, "Bill credited during card payout");
            self.last_scene = None;
            self.show_idle();
        }
        if self.state_timer.take_fired() {
            warn!("Card payout timed out at the kiosk level");
            self.go_idle();
        }
    }

    fn step_maintenance(&mut self) {
        if !self.menu.in_setting() {
            self.acceptor.enable();
            self.go_idle();
        }
    }

    fn go_idle(&mut self) {
        self.state_timer.cancel();
        self.set_state(KioskState::Idle);
        self.refresh.start(IDLE_REFRESH_INTERVAL);
        self.show_idle();
    }

    fn roll_counters(&mut self) {
        let time = match self.clock.borrow().now() {
            Ok(time) => time,
            Err(_) => return,
        };
        if time.day != self.last_seen.0 {
            self.settings.borrow_mut().roll_day();
        }
        if time.month != self.last_seen.1 {
            self.settings.borrow_mut().roll_month();
        }
        self.last_seen = (time.day, time.month);
    }

    fn update_alerts(&mut self) {
        let low = self.dispenser.is_low();
        let empty = self.dispenser.is_empty();
        if low != self.alerts.0 {
            self.alerts.0 = low;
            self.set_alert(AlertKind::CardLow, low);
        }
        if empty != self.alerts.1 {
            self.alerts.1 = empty;
            self.set_alert(AlertKind::CardEmpty, empty);
        }
    }

    fn set_alert(&mut self, kind: AlertKind, active: bool) {
        if active {
            warn!(alert = %kind, "Stock alert raised");
        } else {
            info!(alert = %kind, "Stock alert cleared");
        }
        if let Err(e) = self.display.borrow_mut().set_alert(kind, active) {
            debug!(error = %e, "Display write failed");
        }
    }

    fn show_idle(&mut self) {
        let (balance, card_price) = {
            let settings = self.settings.borrow();
            (settings.balance(), settings.card_price())
        };
        let time = read_time(&self.clock);
        self.show(Scene::Idle {
            balance,
            card_price,
            time,
        });
    }

    /// Draw a scene unless it is already the last one drawn by the machine.
    fn show(&mut self, scene: Scene) {
        if self.last_scene.as_ref() == Some(&scene) {
            return;
        }
        if let Err(e) = self.display.borrow_mut().show_scene(&scene) {
            debug!(error = %e, "Display write failed");
        }
        self.last_scene = Some(scene);
    }

    fn set_state(&mut self, state: KioskState) {
        if self.state == state {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(state),
            "invalid kiosk transition {} -> {}",
            self.state,
            state
        );
        debug!(from = %self.state, to = %state, "Kiosk state change");
        self.state = state;
        // Other components draw too; force a redraw on state entry.
        self.last_scene = None;
    }
}

#[cfg(test)]
mod tests {
    use cardvend_core::constants::{ERROR_RECHECK_INTERVAL, RESET_PULSE};
    use cardvend_core::types::{DispenserHealth, KioskConfig};
    use cardvend_hardware::mock::{
        MockBillAcceptor, MockBillAcceptorHandle, MockClock, MockClockHandle, MockCommandSource,
        MockCommandSourceHandle, MockDispenser, MockDispenserHandle, MockDisplay,
        MockDisplayHandle, MockKeypadMatrix, MockKeypadMatrixHandle, MockStatusSink,
        MockStatusSinkHandle,
    };
    use cardvend_hardware::store::MemoryStore;

    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    struct Rig {
        kiosk: Kiosk,
        bills: MockBillAcceptorHandle,
        units: MockDispenserHandle,
        _keys: MockKeypadMatrixHandle,
        screen: MockDisplayHandle,
        wall_clock: MockClockHandle,
        channel: MockStatusSinkHandle,
        remote: MockCommandSourceHandle,
    }

    impl Rig {
        fn new(config: KioskConfig) -> Self {
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
                _keys: keys,
                screen,
                wall_clock,
                channel,
                remote,
            }
        }

        fn run(&mut self, duration: Duration) -> Option<SystemCommand> {
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

        fn boot(&mut self) {
            self.run(INIT_SETTLE_TIME + Duration::from_millis(50));
            assert_eq!(self.kiosk.state(), KioskState::Idle);
        }
    }

    #[test]
    fn test_transition_validity() {
        assert!(KioskState::Init.can_transition_to(KioskState::WaitingForInit));
        assert!(KioskState::Idle.can_transition_to(KioskState::PayoutingCard));
        assert!(KioskState::Maintenance.can_transition_to(KioskState::Idle));
        assert!(!KioskState::Idle.can_transition_to(KioskState::WaitForPayoutingCard));
        assert!(!KioskState::BillAccepted.can_transition_to(KioskState::PayoutingCard));
        assert!(!KioskState::Idle.can_transition_to(KioskState::CallbackingCard));
        assert!(!KioskState::CallbackingCard.can_transition_to(KioskState::Idle));
    }

    #[test]
    fn test_boot_resets_units_and_enables_acceptor() {
        let mut rig = Rig::new(KioskConfig::default());
        rig.kiosk.tick(TICK);
        assert_eq!(rig.kiosk.state(), KioskState::WaitingForInit);
        assert_eq!(rig.bills.reset_count(), 1);
        rig.run(RESET_PULSE + Duration::from_millis(50));
        assert_eq!(rig.units.reset_pulses(UnitId::A), 1);
        assert_eq!(rig.units.reset_pulses(UnitId::B), 1);
        assert_eq!(rig.kiosk.state(), KioskState::WaitingForInit);
        rig.run(INIT_SETTLE_TIME);
        assert_eq!(rig.kiosk.state(), KioskState::Idle);
        assert_eq!(rig.bills.accept_mask(), (0x01FE, 0x01FE));
    }

    #[test]
    fn test_idle_scene_shows_balance_price_and_time() {
        let mut rig = Rig::new(KioskConfig {
            balance: 4_000,
            card_price: 20_000,
            ..KioskConfig::default()
        });
        rig.boot();
        assert_eq!(
            rig.screen.last_scene(),
            Some(Scene::Idle {
                balance: 4_000,
                card_price: 20_000,
                time: ClockTime::new(9, 0, 10, 3, 2026).unwrap(),
            })
        );
    }

    #[test]
    fn test_acceptor_disabled_while_stock_is_out() {
        let mut rig = Rig::new(KioskConfig::default());
        rig.boot();
        let out = DispenserHealth {
            error: false,
            low: true,
            empty: true,
        };
        rig.units.set_health(UnitId::A, out);
        rig.units.set_health(UnitId::B, out);
        rig.run(Duration::from_millis(50));
        assert_eq!(rig.bills.accept_mask(), (0, 0));
        rig.units.set_health(UnitId::B, DispenserHealth::OK);
        rig.run(Duration::from_millis(50));
        assert_eq!(rig.bills.accept_mask(), (0x01FE, 0x01FE));
    }

    #[test]
    fn test_stock_alerts_follow_unit_health() {
        let mut rig = Rig::new(KioskConfig::default());
        rig.boot();
        assert!(!rig.screen.alert_active(AlertKind::CardLow));
        let low = DispenserHealth {
            error: false,
            low: true,
            empty: false,
        };
        rig.units.set_health(UnitId::A, low);
        rig.units.set_health(UnitId::B, low);
        rig.run(Duration::from_millis(50));
        assert!(rig.screen.alert_active(AlertKind::CardLow));
        assert!(!rig.screen.alert_active(AlertKind::CardEmpty));
        rig.units.set_health(UnitId::A, DispenserHealth::OK);
        rig.run(Duration::from_millis(50));
        assert!(!rig.screen.alert_active(AlertKind::CardLow));
    }

    #[test]
    fn test_day_rollover_clears_daily_counter() {
        let mut rig = Rig::new(KioskConfig {
            total_cards: 40,
            total_cards_day: 7,
            total_cards_month: 20,
            ..KioskConfig::default()
        });
        rig.boot();
        rig.wall_clock
            .set_time(ClockTime::new(0, 1, 11, 3, 2026).unwrap());
        rig.run(IDLE_REFRESH_INTERVAL + Duration::from_millis(50));
        let snapshot = rig.kiosk.settings().borrow().snapshot();
        assert_eq!(snapshot.total_cards_day, 0);
        assert_eq!(snapshot.total_cards_month, 20);
        assert_eq!(snapshot.total_cards, 40);
    }

    #[test]
    fn test_month_rollover_clears_monthly_counter() {
        let mut rig = Rig::new(KioskConfig {
            total_cards_day: 7,
            total_cards_month: 20,
            ..KioskConfig::default()
        });
        rig.boot();
        rig.wall_clock
            .set_time(ClockTime::new(0, 1, 1, 4, 2026).unwrap());
        rig.run(IDLE_REFRESH_INTERVAL + Duration::from_millis(50));
        let snapshot = rig.kiosk.settings().borrow().snapshot();
        assert_eq!(snapshot.total_cards_day, 0);
        assert_eq!(snapshot.total_cards_month, 0);
    }

    #[test]
    fn test_same_day_restart_keeps_daily_counter() {
        let mut rig = Rig::new(KioskConfig {
            total_cards_day: 7,
            ..KioskConfig::default()
        });
        rig.boot();
        rig.run(IDLE_REFRESH_INTERVAL + Duration::from_millis(50));
        let snapshot = rig.kiosk.settings().borrow().snapshot();
        assert_eq!(snapshot.total_cards_day, 7);
    }

    #[test]
    fn test_faulted_units_recover_on_the_recheck_interval() {
        let mut rig = Rig::new(KioskConfig::default());
        rig.boot();
        let faulted = DispenserHealth {
            error: true,
            low: true,
            empty: true,
        };
        rig.units.set_health(UnitId::A, faulted);
        rig.units.set_health(UnitId::B, faulted);
        rig.run(Duration::from_millis(100));
        assert_eq!(rig.bills.accept_mask(), (0, 0));
        assert_eq!(rig.kiosk.state(), KioskState::Idle);
        rig.units.set_health(UnitId::A, DispenserHealth::OK);
        rig.units.set_health(UnitId::B, DispenserHealth::OK);
        rig.run(ERROR_RECHECK_INTERVAL + Duration::from_millis(100));
        assert!(rig.kiosk.dispenser().is_ready());
        assert_eq!(rig.bills.accept_mask(), (0x01FE, 0x01FE));
    }

    #[test]
    fn test_remote_reset_bubbles_out_of_tick() {
        let mut rig = Rig::new(KioskConfig::default());
        rig.boot();
        rig.remote.push_command(r#"{"cmd":0}"#);
        let command = rig.run(Duration::from_millis(30));
        assert_eq!(command, Some(SystemCommand::Reset));
    }

    #[test]
    fn test_status_snapshot_published_after_boot() {
        let mut rig = Rig::new(KioskConfig::default());
        rig.boot();
        let published = rig.channel.published();
        assert!(!published.is_empty());
        assert!(published[0].0.ends_with("/rp/status"));
    }
}
