//! Hardware capability layer for the card vending kiosk.
//!
//! This crate defines the trait boundary between the kiosk control core and
//! its peripherals: the bill acceptor transport, the twin card dispenser
//! signal bank, the keypad matrix, the display panel, the RTC, the
//! configuration store and the status/command message channels. Mock
//! implementations of every capability let the whole control core run and be
//! tested with no hardware attached.
//!
//! # Design Philosophy
//!
//! - **Synchronous, non-blocking**: the control core is a cooperative
//!   run-to-completion tick loop, so every capability method either returns
//!   immediately or performs one bounded hardware exchange. There is no async
//!   runtime at this layer.
//! - **Object-safe**: every trait can be boxed (`Box<dyn BillAcceptorPort>`),
//!   which is how the core takes its peripherals at construction.
//! - **Single owner**: capability objects are owned by the core on its one
//!   thread and need no `Send` bound. Cross-thread control of a simulated
//!   peripheral goes through its clonable mock handle instead.
//! - **Raw at the wire**: poll events and accept masks carry the raw codes
//!   the hardware reports; mapping them into the domain taxonomy (and
//!   rejecting unknown codes) is the core's job.
//!
//! # Capabilities
//!
//! Polled inputs: [`BillAcceptorPort`] (poll for accepted-bill and status
//! events), [`DispenserPort`] (sensor and gate reads plus payout, retract and
//! reset signal lines), [`KeypadMatrix`] (raw key bitmask samples),
//! [`CommandSource`] (inbound command/config payloads).
//!
//! Outputs: [`DisplayPanel`] (structured scenes and alert overlays),
//! [`StatusSink`] (fire-and-forget status publications), [`ConfigStore`]
//! (durable configuration record), [`Clock`] (read/set calendar time).
//!
//! # Example
//!
//! ```
//! use cardvend_hardware::mock::MockKeypadMatrix;
//! use cardvend_hardware::traits::{Key, KeypadMatrix};
//!
//! let (mut keypad, handle) = MockKeypadMatrix::new();
//!
//! handle.press(Key::Digit(5));
//! let mask = keypad.scan().unwrap();
//! assert!(mask.contains(Key::Digit(5)));
//!
//! handle.release_all();
//! assert!(keypad.scan().unwrap().is_empty());
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`][error::Result] over
//! [`HardwareError`]. Transient transport failures are ordinary `Err` values
//! the core treats as "no event this cycle"; nothing here panics on a
//! hardware fault.
//!
//! [`BillAcceptorPort`]: traits::BillAcceptorPort
//! [`DispenserPort`]: traits::DispenserPort
//! [`KeypadMatrix`]: traits::KeypadMatrix
//! [`CommandSource`]: traits::CommandSource
//! [`DisplayPanel`]: traits::DisplayPanel
//! [`StatusSink`]: traits::StatusSink
//! [`ConfigStore`]: traits::ConfigStore
//! [`Clock`]: traits::Clock

pub mod error;
pub mod mock;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{
    BillAcceptorPort, Clock, CommandSource, ConfigStore, DisplayPanel, DispenserPort, Key, KeyMask,
    KeypadMatrix, PollEvent, StatusSink,
};
pub use types::{CommandTopic, InboundMessage};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
