//! Mock bill acceptor for testing and development.
//!
//! Simulates the acceptor transport: the handle queues events, the mock
//! hands them out one per poll in insertion order, exactly as the polled
//! hardware would.

use crate::{
    Result,
    error::HardwareError,
    traits::{BillAcceptorPort, PollEvent},
};
use cardvend_core::{AcceptorStatus, BillRouting, Denomination};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Inner {
    events: VecDeque<PollEvent>,
    accept_bills: u16,
    accept_escrow: u16,
    resets: u32,
    escrow_accepts: u32,
    fail_polls: u32,
    connected: bool,
}

/// Mock bill acceptor transport.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockBillAcceptor;
/// use cardvend_hardware::traits::{BillAcceptorPort, PollEvent};
/// use cardvend_core::{BillRouting, Denomination};
///
/// let (mut acceptor, handle) = MockBillAcceptor::new();
///
/// handle.insert_bill(BillRouting::Stacked, Denomination::from_code(3).unwrap());
///
/// let event = acceptor.poll().unwrap();
/// assert_eq!(event, Some(PollEvent::Bill { routing: 0x00, denomination: 3 }));
/// assert_eq!(acceptor.poll().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct MockBillAcceptor {
    inner: Arc<Mutex<Inner>>,
    name: String,
}

impl MockBillAcceptor {
    /// Create a new mock acceptor with the default name.
    ///
    /// Returns the acceptor and the handle that feeds it.
    pub fn new() -> (Self, MockBillAcceptorHandle) {
        Self::with_name("Mock Bill Acceptor".to_string())
    }

    /// Create a new mock acceptor with a custom name.
    pub fn with_name(name: String) -> (Self, MockBillAcceptorHandle) {
        let inner = Arc::new(Mutex::new(Inner {
            events: VecDeque::new(),
            accept_bills: 0,
            accept_escrow: 0,
            resets: 0,
            escrow_accepts: 0,
            fail_polls: 0,
            connected: true,
        }));

        let acceptor = Self {
            inner: Arc::clone(&inner),
            name: name.clone(),
        };
        let handle = MockBillAcceptorHandle { inner, name };

        (acceptor, handle)
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BillAcceptorPort for MockBillAcceptor {
    fn reset(&mut self) -> Result<()> {
        let mut inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected(&self.name));
        }
        inner.resets += 1;
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<PollEvent>> {
        let mut inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected(&self.name));
        }
        if inner.fail_polls > 0 {
            inner.fail_polls -= 1;
            return Err(HardwareError::communication("poll exchange failed"));
        }
        Ok(inner.events.pop_front())
    }

    fn set_accept_mask(&mut self, bills: u16, escrow: u16) -> Result<()> {
        let mut inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected(&self.name));
        }
        inner.accept_bills = bills;
        inner.accept_escrow = escrow;
        Ok(())
    }

    fn escrow_accept(&mut self) -> Result<()> {
        let mut inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected(&self.name));
        }
        inner.escrow_accepts += 1;
        Ok(())
    }
}

/// Handle for controlling a mock bill acceptor.
///
/// Queues simulated events and inspects what the core configured. Clonable
/// and safe to use from another thread.
#[derive(Debug, Clone)]
pub struct MockBillAcceptorHandle {
    inner: Arc<Mutex<Inner>>,
    name: String,
}

impl MockBillAcceptorHandle {
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an accepted-bill event.
    pub fn insert_bill(&self, routing: BillRouting, denomination: Denomination) {
        self.locked().events.push_back(PollEvent::Bill {
            routing: routing.code(),
            denomination: denomination.code(),
        });
    }

    /// Queue a status event.
    pub fn report_status(&self, status: AcceptorStatus) {
        self.locked().events.push_back(PollEvent::Status {
            code: status.code(),
        });
    }

    /// Queue a raw event, bypassing the typed constructors. Lets tests
    /// deliver codes the taxonomy does not know.
    pub fn push_raw(&self, event: PollEvent) {
        self.locked().events.push_back(event);
    }

    /// The accept mask the core last configured, as (bills, escrow).
    pub fn accept_mask(&self) -> (u16, u16) {
        let inner = self.locked();
        (inner.accept_bills, inner.accept_escrow)
    }

    /// How many times the core issued a device reset.
    pub fn reset_count(&self) -> u32 {
        self.locked().resets
    }

    /// How many escrow-accept commands the core issued.
    pub fn escrow_accept_count(&self) -> u32 {
        self.locked().escrow_accepts
    }

    /// Number of queued events not yet polled out.
    pub fn pending_events(&self) -> usize {
        self.locked().events.len()
    }

    /// Make the next `n` polls fail with a communication error.
    pub fn fail_next_polls(&self, n: u32) {
        self.locked().fail_polls = n;
    }

    /// Simulate the device dropping off the bus; every operation fails
    /// until `reconnect`.
    pub fn disconnect(&self) {
        self.locked().connected = false;
    }

    /// Bring a disconnected device back.
    pub fn reconnect(&self) {
        self.locked().connected = true;
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
