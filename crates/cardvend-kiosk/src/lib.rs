//! Control core of an unattended card-vending kiosk.
//!
//! The kiosk takes banknotes through a bill acceptor, tracks the resulting
//! balance, and pays out prepaid cards from two dispenser units with
//! failover. A 4x4 keypad drives a password-protected operator menu, and a
//! status channel carries periodic snapshots plus immediate bill events.
//!
//! Everything runs on a single-threaded cooperative tick: the host calls
//! [`Kiosk::tick`] with the elapsed wall time, and each subordinate manager
//! runs one non-blocking step against the shared [`scheduler::Scheduler`].
//! No manager blocks, and no locks exist anywhere in the core.
//!
//! # Components
//!
//! - [`machine::Kiosk`]: top-level state machine and component aggregate
//! - [`acceptor::AcceptorManager`]: bill acceptor polling and credit
//! - [`dispenser::DispenserManager`]: two-unit card dispenser with arbitration
//! - [`keypad::KeypadManager`]: matrix debounce, digit buffer, long-press
//! - [`menu::MenuHandler`]: password-gated operator settings
//! - [`reporter::StatusReporter`] / [`command::CommandHandler`]: status and
//!   remote-command channels
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use cardvend_hardware::mock::{
//!     MockBillAcceptor, MockClock, MockCommandSource, MockDispenser, MockDisplay,
//!     MockKeypadMatrix, MockStatusSink,
//! };
//! use cardvend_hardware::store::MemoryStore;
//! use cardvend_kiosk::{Kiosk, KioskPorts};
//!
//! let (acceptor, _bills) = MockBillAcceptor::new();
//! let (dispenser, _units) = MockDispenser::new();
//! let (keypad, _keys) = MockKeypadMatrix::new();
//! let (display, _screen) = MockDisplay::new();
//! let (clock, _wall) = MockClock::new();
//! let (status, _channel) = MockStatusSink::new();
//! let (commands, _remote) = MockCommandSource::new();
//!
//! let mut kiosk = Kiosk::new(KioskPorts {
//!     acceptor: Box::new(acceptor),
//!     dispenser: Box::new(dispenser),
//!     keypad: Box::new(keypad),
//!     display: Box::new(display),
//!     clock: Box::new(clock),
//!     store: Box::new(MemoryStore::new()),
//!     status: Box::new(status),
//!     commands: Box::new(commands),
//! });
//!
//! // One 10 ms cooperative tick.
//! kiosk.tick(Duration::from_millis(10));
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use cardvend_hardware::{Clock, DisplayPanel};

pub mod acceptor;
pub mod command;
pub mod dispenser;
pub mod keypad;
pub mod machine;
pub mod menu;
pub mod reporter;
pub mod scheduler;
pub mod settings;

/// Display shared by the machine, the menu handler and the sale ledger.
pub type SharedDisplay = Rc<RefCell<Box<dyn DisplayPanel>>>;

/// Clock shared the same way.
pub type SharedClock = Rc<RefCell<Box<dyn Clock>>>;

pub use command::SystemCommand;
pub use machine::{Kiosk, KioskPorts, KioskState};
pub use scheduler::{Scheduler, TaskHandle, Timeout};
pub use settings::{Settings, SharedSettings};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
