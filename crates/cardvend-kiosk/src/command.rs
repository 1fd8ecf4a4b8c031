//! Inbound remote commands and configuration updates.
//!
//! Messages arrive on two topics. Command payloads carry a single numeric
//! code; config payloads carry optional password and card-price fields and
//! any subset may be present. Payloads that do not parse are dropped with a
//! diagnostic log line and never fault the kiosk.

use serde::Deserialize;
use tracing::{debug, info, warn};

use cardvend_core::types::Password;
use cardvend_hardware::{CommandSource, CommandTopic, InboundMessage};

use crate::settings::SharedSettings;

/// Process-level action requested remotely, bubbled out of the tick loop
/// for the host process to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    /// Restart the control core.
    Reset,
}

const CMD_SYSTEM_RESET: u8 = 0;
const CMD_CLEAR_TOTAL_CARDS: u8 = 1;
const CMD_CLEAR_TOTAL_BALANCE: u8 = 2;

#[derive(Debug, Deserialize)]
struct CommandPayload {
    cmd: u8,
}

#[derive(Debug, Deserialize)]
struct ConfigPayload {
    #[serde(default)]
    pwd: Option<String>,
    #[serde(default)]
    cp: Option<u32>,
}

/// Applies remote messages to the settings record.
pub struct CommandHandler {
    source: Box<dyn CommandSource>,
    settings: SharedSettings,
}

impl CommandHandler {
    pub fn new(source: Box<dyn CommandSource>, settings: SharedSettings) -> Self {
        CommandHandler { source, settings }
    }

    /// Drain and apply every message queued since the last step.
    pub fn step(&mut self) -> Option<SystemCommand> {
        let mut requested = None;
        loop {
            match self.source.try_recv() {
                Ok(Some(message)) => {
                    if let Some(command) = self.apply(&message) {
                        requested = Some(command);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Command channel read failed");
                    break;
                }
            }
        }
        requested
    }

    fn apply(&mut self, message: &InboundMessage) -> Option<SystemCommand> {
        match message.topic {
            CommandTopic::Command => self.apply_command(&message.payload),
            CommandTopic::Config => {
                self.apply_config(&message.payload);
                None
            }
        }
    }

    fn apply_command(&mut self, payload: &str) -> Option<SystemCommand> {
        let parsed: CommandPayload = match serde_json::from_str(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Unparseable command payload dropped");
                return None;
            }
        };
        match parsed.cmd {
            CMD_SYSTEM_RESET => {
                info!("System reset requested remotely");
                Some(SystemCommand::Reset)
            }
            CMD_CLEAR_TOTAL_CARDS => {
                self.settings.borrow_mut().clear_total_cards();
                info!("Card counters cleared remotely");
                None
            }
            CMD_CLEAR_TOTAL_BALANCE => {
                self.settings.borrow_mut().clear_lifetime_total();
                info!("Lifetime amount cleared remotely");
                None
            }
            other => {
                warn!(cmd = other, "Unknown command code dropped");
                None
            }
        }
    }

    fn apply_config(&mut self, payload: &str) {
        let parsed: ConfigPayload = match serde_json::from_str(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Unparseable config payload dropped");
                return;
            }
        };
        if let Some(pwd) = parsed.pwd {
            match Password::new(&pwd) {
                Ok(password) => {
                    self.settings.borrow_mut().set_password(password);
                    info!("Operator password updated remotely");
                }
                Err(e) => warn!(error = %e, "Config password rejected"),
            }
        }
        if let Some(price) = parsed.cp {
            self.settings.borrow_mut().set_card_price(price);
            info!(price, "Card price updated remotely");
        }
    }
}
