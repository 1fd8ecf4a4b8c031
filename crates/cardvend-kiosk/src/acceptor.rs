//! Bill acceptor polling and credit
//!
//! Polls the acceptor on a fixed cadence and turns wire events into
//! balance mutations and status logs. Only the stacked routing credits
//! the balance; every other routing is logged and dropped. Status codes
//! are logged on change only, never once per poll.

use tracing::{debug, info, warn};

use cardvend_core::constants::ACCEPTOR_POLL_INTERVAL;
use cardvend_core::types::{AcceptMask, AcceptorStatus, BillRouting, Denomination};
use cardvend_hardware::{BillAcceptorPort, PollEvent, Result};

use crate::scheduler::{Scheduler, Timeout};
use crate::settings::SharedSettings;

/// Acceptor manager state.
///
/// `BillAccepted` and `Status` hold a polled event for exactly one step
/// before the manager returns to the poll cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Idle,
    BillAccepted,
    Status,
}

impl std::fmt::Display for AcceptorState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AcceptorState::Idle => write!(f, "idle"),
            AcceptorState::BillAccepted => write!(f, "bill_accepted"),
            AcceptorState::Status => write!(f, "status"),
        }
    }
}

/// Drives the bill acceptor: poll cadence, routing handling, credit,
/// and the accept gate.
pub struct AcceptorManager {
    port: Box<dyn BillAcceptorPort>,
    settings: SharedSettings,
    state: AcceptorState,
    poll: Timeout,
    pending: Option<PollEvent>,
    enabled: bool,
    accepted_value: Option<u32>,
    last_status: AcceptorStatus,
}

impl AcceptorManager {
    pub fn new(
        port: Box<dyn BillAcceptorPort>,
        scheduler: &Scheduler,
        settings: SharedSettings,
    ) -> Self {
        Self {
            port,
            settings,
            state: AcceptorState::Idle,
            // Born elapsed so the first step polls immediately.
            poll: Timeout::new_elapsed(scheduler),
            pending: None,
            enabled: false,
            accepted_value: None,
            last_status: AcceptorStatus::Success,
        }
    }

    /// Resets the device and opens the accept gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not acknowledge the reset.
    pub fn init(&mut self) -> Result<()> {
        self.port.reset()?;
        self.enabled = false;
        self.enable();
        Ok(())
    }

    /// Opens the accept gate for all supported denominations. Idempotent.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        let mask = AcceptMask::FULL;
        match self.port.set_accept_mask(mask.bills, mask.escrow) {
            Ok(()) => info!("Bill acceptance enabled"),
            Err(e) => warn!(error = %e, "Accept mask write failed"),
        }
        self.enabled = true;
    }

    /// Closes the accept gate; the unit rejects every bill at the slot.
    /// Idempotent.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        let mask = AcceptMask::NONE;
        match self.port.set_accept_mask(mask.bills, mask.escrow) {
            Ok(()) => info!("Bill acceptance disabled"),
            Err(e) => warn!(error = %e, "Accept mask write failed"),
        }
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs one cooperative step.
    pub fn step(&mut self) {
        match self.state {
            AcceptorState::Idle => {
                if !self.poll.take_fired() {
                    return;
                }
                self.poll.start(ACCEPTOR_POLL_INTERVAL);
                match self.port.poll() {
                    Ok(Some(event)) => {
                        self.state = match event {
                            PollEvent::Bill { .. } => AcceptorState::BillAccepted,
                            PollEvent::Status { .. } => AcceptorState::Status,
                        };
                        self.pending = Some(event);
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "Acceptor poll failed; treated as no event"),
                }
            }
            AcceptorState::BillAccepted => {
                if let Some(PollEvent::Bill {
                    routing,
                    denomination,
                }) = self.pending.take()
                {
                    self.handle_bill(routing, denomination);
                }
                self.state = AcceptorState::Idle;
            }
            AcceptorState::Status => {
                if let Some(PollEvent::Status { code }) = self.pending.take() {
                    self.handle_status(code);
                }
                self.state = AcceptorState::Idle;
            }
        }
    }

    fn handle_bill(&mut self, routing_code: u8, denomination_code: u8) {
        let routing = match BillRouting::from_code(routing_code) {
            Ok(routing) => routing,
            Err(e) => {
                warn!(error = %e, "Bill event dropped");
                return;
            }
        };
        match routing {
            BillRouting::Stacked => {
                let denomination = match Denomination::from_code(denomination_code) {
                    Ok(denomination) => denomination,
                    Err(e) => {
                        warn!(error = %e, "Stacked bill with unknown denomination");
                        return;
                    }
                };
                let value = denomination.value();
                let balance = {
                    let mut settings = self.settings.borrow_mut();
                    settings.credit(value);
                    settings.balance()
                };
                self.accepted_value = Some(value);
                info!(value, balance, "Bill stacked");
            }
            BillRouting::EscrowPosition => {
                // The unit holds the bill until it gets an answer.
                if let Err(e) = self.port.escrow_accept() {
                    debug!(error = %e, "Escrow accept failed");
                } else {
                    debug!("Bill in escrow; accept issued");
                }
            }
            other => debug!(routing = %other, "Bill routed without credit"),
        }
    }

    fn handle_status(&mut self, code: u8) {
        let status = match AcceptorStatus::from_code(code) {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Status event dropped");
                return;
            }
        };
        if status != self.last_status {
            if status.is_ok() {
                info!(status = %status, "Acceptor status");
            } else {
                warn!(status = %status, "Acceptor status");
            }
            self.last_status = status;
        }
    }

    /// Takes the value of a bill stacked since the last call, if any.
    pub fn take_accepted(&mut self) -> Option<u32> {
        self.accepted_value.take()
    }

    pub fn state(&self) -> AcceptorState {
        self.state
    }

    /// Most recent device status.
    pub fn status(&self) -> AcceptorStatus {
        self.last_status
    }
}
