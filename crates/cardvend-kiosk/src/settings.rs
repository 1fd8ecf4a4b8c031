//! Persistent kiosk settings
//!
//! Wraps the [`KioskConfig`] record and its backing store behind
//! mutators that write back synchronously on every change. Money and
//! counter state must survive a power cut at any instant, so nothing
//! here buffers writes; at worst the single in-flight mutation is lost.
//!
//! A store write failure is logged and otherwise ignored. The in-memory
//! record stays authoritative for the rest of the session rather than
//! taking the kiosk out of service over a storage fault.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{error, info, warn};

use cardvend_core::types::{KioskConfig, Password};
use cardvend_hardware::ConfigStore;

/// Shared handle to the settings, cloned into every component that
/// reads or mutates the record. Strictly single-threaded.
pub type SharedSettings = Rc<RefCell<Settings>>;

pub struct Settings {
    config: KioskConfig,
    store: Box<dyn ConfigStore>,
}

impl Settings {
    /// Loads the stored record, falling back to defaults when the store
    /// is empty or unreadable. A fresh default record is written back
    /// immediately so the device identity survives the first power cut.
    pub fn load_or_default(store: Box<dyn ConfigStore>) -> Self {
        let mut store = store;
        let config = match store.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                info!("No stored settings; starting from defaults");
                KioskConfig::default()
            }
            Err(e) => {
                warn!(error = %e, "Settings unreadable; starting from defaults");
                KioskConfig::default()
            }
        };
        let mut settings = Self { config, store };
        settings.persist();
        settings
    }

    /// Wraps the settings for single-threaded sharing.
    pub fn into_shared(self) -> SharedSettings {
        Rc::new(RefCell::new(self))
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    /// Cloned copy of the record, for reporting.
    pub fn snapshot(&self) -> KioskConfig {
        self.config.clone()
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn balance(&self) -> u32 {
        self.config.balance
    }

    pub fn card_price(&self) -> u32 {
        self.config.card_price
    }

    pub fn password(&self) -> &Password {
        &self.config.password
    }

    /// Adds an accepted bill to the balance and the lifetime total.
    pub fn credit(&mut self, amount: u32) {
        self.config.balance = self.config.balance.saturating_add(amount);
        self.config.lifetime_total = self.config.lifetime_total.saturating_add(amount);
        self.persist();
    }

    /// Books one dispensed card: deducts the card price and bumps the
    /// total, daily, and monthly counters.
    pub fn debit_card_sale(&mut self) {
        self.config.balance = self.config.balance.saturating_sub(self.config.card_price);
        self.config.total_cards = self.config.total_cards.saturating_add(1);
        self.config.total_cards_day = self.config.total_cards_day.saturating_add(1);
        self.config.total_cards_month = self.config.total_cards_month.saturating_add(1);
        self.persist();
    }

    pub fn set_card_price(&mut self, price: u32) {
        self.config.card_price = price;
        self.persist();
    }

    pub fn set_password(&mut self, password: Password) {
        self.config.password = password;
        self.persist();
    }

    /// Zeroes the dispensed-card counters (total, daily, monthly).
    pub fn clear_total_cards(&mut self) {
        self.config.total_cards = 0;
        self.config.total_cards_day = 0;
        self.config.total_cards_month = 0;
        self.persist();
    }

    /// Zeroes the lifetime accepted total. The unspent balance is not
    /// touched; it still belongs to whoever fed the acceptor.
    pub fn clear_lifetime_total(&mut self) {
        self.config.lifetime_total = 0;
        self.persist();
    }

    /// Day boundary crossed: daily card counter starts over.
    pub fn roll_day(&mut self) {
        self.config.total_cards_day = 0;
        self.persist();
    }

    /// Month boundary crossed: monthly card counter starts over.
    pub fn roll_month(&mut self) {
        self.config.total_cards_month = 0;
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.config) {
            error!(error = %e, "Settings write failed; in-memory record stays authoritative");
        }
    }
}
