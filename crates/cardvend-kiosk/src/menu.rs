//! Operator service menu.
//!
//! The menu is reached by holding Enter and Cancel together for the long-press
//! time, entering the operator password, then picking a field by digit. Every
//! write goes through an Enter-to-preview, Enter-to-commit handshake; typing
//! after the first Enter breaks the handshake so a stale confirmation can
//! never commit fresh digits. Each stage has its own inactivity timeout and
//! falls back to the locked state when it expires.

use std::fmt;

use tracing::{debug, info, warn};

use cardvend_core::constants::{
    DATA_ENTRY_TIMEOUT, MAX_PASSWORD_LENGTH, PASSWORD_ENTRY_TIMEOUT, SETTING_SESSION_TIMEOUT,
};
use cardvend_core::types::{ClockTime, MenuField, Password, Scene};

use crate::keypad::KeypadManager;
use crate::scheduler::{Scheduler, Timeout};
use crate::settings::SharedSettings;
use crate::{SharedClock, SharedDisplay};

/// Stage of the service menu session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Locked. Only the Enter+Cancel long-press gesture is watched.
    NotInSetting,
    /// Password prompt is up; digits accumulate in the keypad buffer.
    PasswordEntry,
    /// Authenticated; waiting for a field-select digit.
    InSetting,
    /// A field is open for viewing or editing.
    InSettingData,
}

impl fmt::Display for MenuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MenuState::NotInSetting => "not_in_setting",
            MenuState::PasswordEntry => "password_entry",
            MenuState::InSetting => "in_setting",
            MenuState::InSettingData => "in_setting_data",
        };
        write!(f, "{name}")
    }
}

/// What a field handler is asked to do on a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldAction {
    /// Render the stored value.
    Show,
    /// Render the keypad buffer as it grows.
    Preview,
    /// First Enter: validate and render what a commit would store.
    Enter,
    /// Second consecutive Enter: write the value.
    Commit,
    /// Entry discarded; render the stored value again.
    Cancel,
}

/// Drives the password gate and the setting fields from keypad events.
pub struct MenuHandler {
    settings: SharedSettings,
    display: SharedDisplay,
    clock: SharedClock,
    state: MenuState,
    field: Option<MenuField>,
    /// Set by the first Enter of the commit handshake, cleared by typing.
    awaiting_confirm: bool,
    /// Keypad buffer length last seen, for growth detection.
    watermark: usize,
    timeout: Timeout,
}

impl MenuHandler {
    pub fn new(
        scheduler: &Scheduler,
        settings: SharedSettings,
        display: SharedDisplay,
        clock: SharedClock,
    ) -> Self {
        MenuHandler {
            settings,
            display,
            clock,
            state: MenuState::NotInSetting,
            field: None,
            awaiting_confirm: false,
            watermark: 0,
            timeout: Timeout::new(scheduler),
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    /// True whenever a session is open in any stage past the lock.
    pub fn in_setting(&self) -> bool {
        self.state != MenuState::NotInSetting
    }

    /// Run one step of the menu machine against the current keypad state.
    pub fn step(&mut self, keypad: &mut KeypadManager) {
        match self.state {
            MenuState::NotInSetting => self.step_locked(keypad),
            MenuState::PasswordEntry => self.step_password(keypad),
            MenuState::InSetting => self.step_menu(keypad),
            MenuState::InSettingData => self.step_field(keypad),
        }
    }

    fn step_locked(&mut self, keypad: &mut KeypadManager) {
        if !(keypad.is_entered_long() && keypad.is_cancelled_long()) {
            return;
        }
        keypad.clear_events();
        keypad.clear_digits();
        self.watermark = 0;
        self.set_state(MenuState::PasswordEntry);
        self.timeout.start(PASSWORD_ENTRY_TIMEOUT);
        self.show(Scene::PasswordEntry { digits_entered: 0 });
        info!("Service menu password prompt opened");
    }

    fn step_password(&mut self, keypad: &mut KeypadManager) {
        if keypad.is_cancelled() {
            keypad.clear_cancelled();
            self.close(keypad, "cancelled");
            return;
        }
        if self.timeout.take_fired() {
            self.close(keypad, "password entry timed out");
            return;
        }
        let count = keypad.digit_count();
        if count != self.watermark {
            self.watermark = count;
            self.timeout.start(PASSWORD_ENTRY_TIMEOUT);
            self.show(Scene::PasswordEntry {
                digits_entered: count,
            });
        }
        if keypad.is_entered() {
            keypad.clear_entered();
            let digits = keypad.digits();
            let accepted = self.settings.borrow().password().matches_digits(&digits);
            if accepted {
                keypad.clear_digits();
                keypad.clear_events();
                self.watermark = 0;
                self.set_state(MenuState::InSetting);
                self.timeout.start(SETTING_SESSION_TIMEOUT);
                self.show(Scene::SettingMenu);
                info!("Service menu session opened");
            } else {
                warn!(digits = count, "Service menu password rejected");
                self.timeout.start(PASSWORD_ENTRY_TIMEOUT);
            }
        }
    }

    fn step_menu(&mut self, keypad: &mut KeypadManager) {
        if keypad.is_cancelled() {
            keypad.clear_cancelled();
            self.close(keypad, "cancelled");
            return;
        }
        if keypad.is_entered() {
            keypad.clear_entered();
            self.close(keypad, "enter with no field selected");
            return;
        }
        if self.timeout.take_fired() {
            self.close(keypad, "session timed out");
            return;
        }
        let digits = keypad.digits();
        let Some(&digit) = digits.first() else {
            return;
        };
        keypad.clear_digits();
        match MenuField::from_digit(digit) {
            Some(field) => {
                self.field = Some(field);
                self.awaiting_confirm = false;
                self.watermark = 0;
                self.set_state(MenuState::InSettingData);
                self.timeout.start(DATA_ENTRY_TIMEOUT);
                self.run_field(FieldAction::Show, keypad);
                info!(%field, "Setting field opened");
            }
            None => {
                warn!(digit, "No setting field behind digit");
                self.close(keypad, "unknown field digit");
            }
        }
    }

    fn step_field(&mut self, keypad: &mut KeypadManager) {
        if self.timeout.take_fired() {
            self.close(keypad, "data entry timed out");
            return;
        }
        if keypad.is_cancelled() {
            keypad.clear_cancelled();
            if keypad.digit_count() > 0 {
                // First Cancel only discards the pending entry.
                keypad.clear_digits();
                self.watermark = 0;
                self.awaiting_confirm = false;
                self.timeout.start(DATA_ENTRY_TIMEOUT);
                self.run_field(FieldAction::Cancel, keypad);
            } else {
                self.field = None;
                self.set_state(MenuState::InSetting);
                self.timeout.start(SETTING_SESSION_TIMEOUT);
                self.show(Scene::SettingMenu);
            }
            return;
        }
        let count = keypad.digit_count();
        if count != self.watermark {
            self.watermark = count;
            self.awaiting_confirm = false;
            self.timeout.start(DATA_ENTRY_TIMEOUT);
            self.run_field(FieldAction::Preview, keypad);
        }
        if keypad.is_entered() {
            keypad.clear_entered();
            self.timeout.start(DATA_ENTRY_TIMEOUT);
            if self.awaiting_confirm {
                self.awaiting_confirm = false;
                self.run_field(FieldAction::Commit, keypad);
            } else {
                self.awaiting_confirm = true;
                self.run_field(FieldAction::Enter, keypad);
            }
        }
    }

    fn run_field(&mut self, action: FieldAction, keypad: &mut KeypadManager) {
        let Some(field) = self.field else {
            return;
        };
        match field {
            MenuField::SetTime => self.field_set_time(action, keypad),
            MenuField::SetCardPrice => self.field_set_card_price(action, keypad),
            MenuField::SetPassword => self.field_set_password(action, keypad),
            MenuField::ViewTotalCards | MenuField::ClearTotalCards => {
                self.field_total_cards(action, field);
            }
            MenuField::ViewTotalAmount | MenuField::ClearTotalAmount => {
                self.field_total_amount(action, field);
            }
        }
    }

    fn field_set_time(&mut self, action: FieldAction, keypad: &mut KeypadManager) {
        match action {
            FieldAction::Show | FieldAction::Cancel => {
                let value = match self.clock.borrow().now() {
                    Ok(time) => time.to_string(),
                    Err(e) => {
                        debug!(error = %e, "Clock read failed");
                        String::from("--:-- --/--/----")
                    }
                };
                self.show_field(MenuField::SetTime, value);
            }
            FieldAction::Preview => {
                let value = digit_string(&keypad.digits());
                self.show_field(MenuField::SetTime, value);
            }
            FieldAction::Enter => match ClockTime::from_digits(&keypad.digits()) {
                Ok(time) => self.show_field(MenuField::SetTime, time.to_string()),
                Err(e) => self.reject_time_entry(&e, keypad),
            },
            FieldAction::Commit => match ClockTime::from_digits(&keypad.digits()) {
                Ok(time) => {
                    if let Err(e) = self.clock.borrow_mut().set(time) {
                        warn!(error = %e, "Clock write failed");
                    } else {
                        info!(%time, "Clock set from the service menu");
                    }
                    keypad.clear_digits();
                    self.watermark = 0;
                    self.field_set_time(FieldAction::Show, keypad);
                }
                Err(e) => self.reject_time_entry(&e, keypad),
            },
        }
    }

    fn reject_time_entry(&mut self, error: &cardvend_core::Error, keypad: &mut KeypadManager) {
        warn!(error = %error, "Time entry rejected");
        self.awaiting_confirm = false;
        keypad.clear_digits();
        self.watermark = 0;
        self.field_set_time(FieldAction::Show, keypad);
    }

    fn field_set_card_price(&mut self, action: FieldAction, keypad: &mut KeypadManager) {
        match action {
            FieldAction::Show | FieldAction::Cancel => {
                let value = self.settings.borrow().card_price().to_string();
                self.show_field(MenuField::SetCardPrice, value);
            }
            FieldAction::Enter if keypad.digit_count() == 0 => {
                warn!("Empty price entry rejected");
                self.awaiting_confirm = false;
                self.field_set_card_price(FieldAction::Show, keypad);
            }
            FieldAction::Preview | FieldAction::Enter => {
                let value = fold_amount(&keypad.digits()).to_string();
                self.show_field(MenuField::SetCardPrice, value);
            }
            FieldAction::Commit => {
                let digits = keypad.digits();
                if digits.is_empty() {
                    warn!("Empty price entry rejected");
                } else {
                    let price = fold_amount(&digits);
                    self.settings.borrow_mut().set_card_price(price);
                    keypad.clear_digits();
                    self.watermark = 0;
                    info!(price, "Card price set from the service menu");
                }
                self.field_set_card_price(FieldAction::Show, keypad);
            }
        }
    }

    fn field_set_password(&mut self, action: FieldAction, keypad: &mut KeypadManager) {
        match action {
            FieldAction::Show | FieldAction::Cancel => {
                let len = self.settings.borrow().password().as_str().len();
                self.show_field(MenuField::SetPassword, "*".repeat(len));
            }
            FieldAction::Preview => {
                let value = digit_string(&keypad.digits());
                self.show_field(MenuField::SetPassword, value);
            }
            FieldAction::Enter => {
                let digits = keypad.digits();
                if digits.is_empty() || digits.len() > MAX_PASSWORD_LENGTH {
                    warn!(len = digits.len(), "Password entry rejected");
                    self.awaiting_confirm = false;
                    keypad.clear_digits();
                    self.watermark = 0;
                    self.field_set_password(FieldAction::Show, keypad);
                } else {
                    self.show_field(MenuField::SetPassword, digit_string(&digits));
                }
            }
            FieldAction::Commit => match Password::from_digits(&keypad.digits()) {
                Ok(password) => {
                    self.settings.borrow_mut().set_password(password);
                    keypad.clear_digits();
                    self.watermark = 0;
                    info!("Operator password changed");
                    self.field_set_password(FieldAction::Show, keypad);
                }
                Err(e) => {
                    warn!(error = %e, "Password entry rejected");
                    keypad.clear_digits();
                    self.watermark = 0;
                    self.field_set_password(FieldAction::Show, keypad);
                }
            },
        }
    }

    fn field_total_cards(&mut self, action: FieldAction, field: MenuField) {
        if action == FieldAction::Commit && field == MenuField::ClearTotalCards {
            self.settings.borrow_mut().clear_total_cards();
            info!("Card counters cleared from the service menu");
        }
        let value = self.settings.borrow().snapshot().total_cards.to_string();
        self.show_field(field, value);
    }

    fn field_total_amount(&mut self, action: FieldAction, field: MenuField) {
        if action == FieldAction::Commit && field == MenuField::ClearTotalAmount {
            self.settings.borrow_mut().clear_lifetime_total();
            info!("Lifetime amount cleared from the service menu");
        }
        let value = self.settings.borrow().snapshot().lifetime_total.to_string();
        self.show_field(field, value);
    }

    /// Close the session from any stage and drop whatever was typed.
    fn close(&mut self, keypad: &mut KeypadManager, reason: &str) {
        info!(reason, from = %self.state, "Service menu closed");
        keypad.clear_digits();
        keypad.clear_events();
        self.timeout.cancel();
        self.field = None;
        self.awaiting_confirm = false;
        self.watermark = 0;
        self.set_state(MenuState::NotInSetting);
    }

    fn set_state(&mut self, state: MenuState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Menu state change");
            self.state = state;
        }
    }

    fn show_field(&mut self, field: MenuField, value: String) {
        self.show(Scene::SettingField { field, value });
    }

    fn show(&mut self, scene: Scene) {
        if let Err(e) = self.display.borrow_mut().show_scene(&scene) {
            debug!(error = %e, "Display write failed");
        }
    }
}

fn digit_string(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

fn fold_amount(digits: &[u8]) -> u32 {
    digits
        .iter()
        .fold(0u32, |acc, &d| acc.saturating_mul(10).saturating_add(u32::from(d)))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use cardvend_core::constants::KEY_DEBOUNCE_TIME;
    use cardvend_core::types::KioskConfig;
    use cardvend_hardware::mock::{
        MockClock, MockClockHandle, MockDisplay, MockDisplayHandle, MockKeypadMatrix,
        MockKeypadMatrixHandle,
    };
    use cardvend_hardware::store::MemoryStore;
    use cardvend_hardware::{Clock, DisplayPanel, Key};

    use super::*;
    use crate::keypad::LONG_PRESS_SAMPLES;
    use crate::settings::Settings;

    struct Rig {
        menu: MenuHandler,
        keypad: KeypadManager,
        keys: MockKeypadMatrixHandle,
        display: MockDisplayHandle,
        clock: MockClockHandle,
        settings: SharedSettings,
        scheduler: Scheduler,
    }

    impl Rig {
        fn new() -> Self {
            Self::with_config(KioskConfig::default())
        }

        fn with_config(config: KioskConfig) -> Self {
            let scheduler = Scheduler::new();
            let settings =
                Settings::load_or_default(Box::new(MemoryStore::with_record(config))).into_shared();
            let (display, display_handle) = MockDisplay::new();
            let display: SharedDisplay =
                Rc::new(RefCell::new(Box::new(display) as Box<dyn DisplayPanel>));
            let start = ClockTime::new(12, 0, 15, 6, 2026).unwrap();
            let (clock, clock_handle) = MockClock::with_time(start);
            let clock: SharedClock = Rc::new(RefCell::new(Box::new(clock) as Box<dyn Clock>));
            let (matrix, keys) = MockKeypadMatrix::new();
            let keypad = KeypadManager::new(Box::new(matrix), &scheduler);
            let menu = MenuHandler::new(&scheduler, settings.clone(), display, clock);
            Rig {
                menu,
                keypad,
                keys,
                display: display_handle,
                clock: clock_handle,
                settings,
                scheduler,
            }
        }

        /// Run `count` debounce periods, stepping keypad then menu each time.
        fn sample(&mut self, count: u32) {
            for _ in 0..count {
                self.keypad.step();
                self.menu.step(&mut self.keypad);
                self.scheduler.advance(KEY_DEBOUNCE_TIME);
                self.scheduler.dispatch();
            }
        }

        fn tap(&mut self, key: Key) {
            self.keys.press(key);
            self.sample(2);
            self.keys.release(key);
            self.sample(2);
        }

        fn type_digits(&mut self, digits: &[u8]) {
            for &d in digits {
                self.tap(Key::Digit(d));
            }
        }

        /// Hold Enter+Cancel past the long-press threshold.
        fn open_session(&mut self) {
            self.keys.press(Key::Enter);
            self.keys.press(Key::Cancel);
            self.sample(LONG_PRESS_SAMPLES + 3);
            self.keys.release(Key::Enter);
            self.keys.release(Key::Cancel);
            self.sample(2);
        }

        fn login(&mut self) {
            self.open_session();
            self.type_digits(&[0, 0, 0, 0]);
            self.tap(Key::Enter);
            assert_eq!(self.menu.state(), MenuState::InSetting);
        }

        fn wait(&mut self, duration: Duration) {
            let steps = (duration.as_millis() / KEY_DEBOUNCE_TIME.as_millis()) as u32 + 2;
            self.sample(steps);
        }
    }

    #[test]
    fn test_entry_gesture_opens_password_prompt() {
        let mut rig = Rig::new();
        rig.open_session();
        assert_eq!(rig.menu.state(), MenuState::PasswordEntry);
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::PasswordEntry { digits_entered: 0 })
        );
    }

    #[test]
    fn test_short_presses_do_not_open_prompt() {
        let mut rig = Rig::new();
        rig.tap(Key::Enter);
        rig.tap(Key::Cancel);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
    }

    #[test]
    fn test_correct_password_opens_menu() {
        let mut rig = Rig::new();
        rig.open_session();
        rig.type_digits(&[0, 0, 0, 0]);
        rig.tap(Key::Enter);
        assert_eq!(rig.menu.state(), MenuState::InSetting);
        assert_eq!(rig.display.last_scene(), Some(Scene::SettingMenu));
        assert_eq!(rig.keypad.digit_count(), 0);
    }

    #[test]
    fn test_wrong_password_keeps_prompt_and_buffer() {
        let mut rig = Rig::new();
        rig.open_session();
        rig.type_digits(&[1, 2]);
        rig.tap(Key::Enter);
        assert_eq!(rig.menu.state(), MenuState::PasswordEntry);
        assert_eq!(rig.keypad.digit_count(), 2);
    }

    #[test]
    fn test_password_prefix_is_rejected() {
        let mut rig = Rig::new();
        rig.open_session();
        rig.type_digits(&[0, 0, 0]);
        rig.tap(Key::Enter);
        assert_eq!(rig.menu.state(), MenuState::PasswordEntry);
    }

    #[test]
    fn test_cancel_closes_password_prompt() {
        let mut rig = Rig::new();
        rig.open_session();
        rig.type_digits(&[1, 2, 3]);
        rig.tap(Key::Cancel);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
        assert_eq!(rig.keypad.digit_count(), 0);
    }

    #[test]
    fn test_password_prompt_times_out() {
        let mut rig = Rig::new();
        rig.open_session();
        rig.wait(PASSWORD_ENTRY_TIMEOUT);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
    }

    #[test]
    fn test_digit_selects_field() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(2));
        assert_eq!(rig.menu.state(), MenuState::InSettingData);
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::SetCardPrice,
                value: "0".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_field_digit_closes_session() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(9));
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
    }

    #[test]
    fn test_enter_without_field_closes_session() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Enter);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
    }

    #[test]
    fn test_card_price_commits_on_double_enter() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(2));
        rig.type_digits(&[2, 0, 0, 0, 0]);
        rig.tap(Key::Enter);
        assert_eq!(rig.settings.borrow().card_price(), 0);
        rig.tap(Key::Enter);
        assert_eq!(rig.settings.borrow().card_price(), 20_000);
        assert_eq!(rig.menu.state(), MenuState::InSettingData);
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::SetCardPrice,
                value: "20000".to_string(),
            })
        );
    }

    #[test]
    fn test_typing_after_enter_breaks_the_commit_chain() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(2));
        rig.type_digits(&[5, 0]);
        rig.tap(Key::Enter);
        rig.tap(Key::Digit(0));
        rig.tap(Key::Enter);
        // Second Enter came after typing, so it only re-arms the handshake.
        assert_eq!(rig.settings.borrow().card_price(), 0);
        rig.tap(Key::Enter);
        assert_eq!(rig.settings.borrow().card_price(), 500);
    }

    #[test]
    fn test_cancel_discards_entry_then_leaves_field() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(2));
        rig.type_digits(&[1, 2, 3]);
        rig.tap(Key::Cancel);
        assert_eq!(rig.menu.state(), MenuState::InSettingData);
        assert_eq!(rig.keypad.digit_count(), 0);
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::SetCardPrice,
                value: "0".to_string(),
            })
        );
        rig.tap(Key::Cancel);
        assert_eq!(rig.menu.state(), MenuState::InSetting);
        assert_eq!(rig.display.last_scene(), Some(Scene::SettingMenu));
    }

    #[test]
    fn test_password_change_round_trip() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(3));
        rig.type_digits(&[1, 2, 3, 4]);
        rig.tap(Key::Enter);
        rig.tap(Key::Enter);
        assert!(rig.settings.borrow().password().matches_digits(&[1, 2, 3, 4]));
        assert!(!rig.settings.borrow().password().matches_digits(&[0, 0, 0, 0]));
        rig.tap(Key::Cancel);
        rig.tap(Key::Cancel);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
        // The old password no longer opens a session, the new one does.
        rig.open_session();
        rig.type_digits(&[0, 0, 0, 0]);
        rig.tap(Key::Enter);
        assert_eq!(rig.menu.state(), MenuState::PasswordEntry);
        rig.tap(Key::Cancel);
        rig.open_session();
        rig.type_digits(&[1, 2, 3, 4]);
        rig.tap(Key::Enter);
        assert_eq!(rig.menu.state(), MenuState::InSetting);
    }

    #[test]
    fn test_empty_password_entry_is_rejected() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(3));
        rig.tap(Key::Enter);
        rig.tap(Key::Enter);
        assert!(rig.settings.borrow().password().matches_digits(&[0, 0, 0, 0]));
    }

    #[test]
    fn test_time_commits_to_clock() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(1));
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::SetTime,
                value: "12:00 15/06/2026".to_string(),
            })
        );
        rig.type_digits(&[0, 8, 3, 0, 2, 2, 0, 8, 2, 0, 2, 6]);
        rig.tap(Key::Enter);
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::SetTime,
                value: "08:30 22/08/2026".to_string(),
            })
        );
        rig.tap(Key::Enter);
        assert_eq!(rig.clock.time(), ClockTime::new(8, 30, 22, 8, 2026).unwrap());
    }

    #[test]
    fn test_short_time_entry_is_rejected() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(1));
        rig.type_digits(&[1, 2, 3, 4, 5, 6]);
        rig.tap(Key::Enter);
        assert_eq!(rig.keypad.digit_count(), 0);
        assert_eq!(rig.clock.time(), ClockTime::new(12, 0, 15, 6, 2026).unwrap());
        assert_eq!(rig.menu.state(), MenuState::InSettingData);
    }

    #[test]
    fn test_clear_total_cards_field() {
        let mut rig = Rig::with_config(KioskConfig {
            total_cards: 5,
            total_cards_day: 2,
            total_cards_month: 3,
            ..KioskConfig::default()
        });
        rig.login();
        rig.tap(Key::Digit(5));
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::ClearTotalCards,
                value: "5".to_string(),
            })
        );
        rig.tap(Key::Enter);
        rig.tap(Key::Enter);
        let snapshot = rig.settings.borrow().snapshot();
        assert_eq!(snapshot.total_cards, 0);
        assert_eq!(snapshot.total_cards_day, 0);
        assert_eq!(snapshot.total_cards_month, 0);
    }

    #[test]
    fn test_view_total_amount_shows_value_without_clearing() {
        let mut rig = Rig::with_config(KioskConfig {
            lifetime_total: 123,
            ..KioskConfig::default()
        });
        rig.login();
        rig.tap(Key::Digit(6));
        rig.tap(Key::Enter);
        rig.tap(Key::Enter);
        assert_eq!(rig.settings.borrow().snapshot().lifetime_total, 123);
        assert_eq!(
            rig.display.last_scene(),
            Some(Scene::SettingField {
                field: MenuField::ViewTotalAmount,
                value: "123".to_string(),
            })
        );
    }

    #[test]
    fn test_data_entry_times_out_to_locked() {
        let mut rig = Rig::new();
        rig.login();
        rig.tap(Key::Digit(2));
        rig.type_digits(&[9, 9]);
        rig.wait(DATA_ENTRY_TIMEOUT);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
        assert_eq!(rig.settings.borrow().card_price(), 0);
        assert_eq!(rig.keypad.digit_count(), 0);
    }

    #[test]
    fn test_menu_times_out_to_locked() {
        let mut rig = Rig::new();
        rig.login();
        rig.wait(SETTING_SESSION_TIMEOUT);
        assert_eq!(rig.menu.state(), MenuState::NotInSetting);
    }
}
