//! Mock peripheral implementations for testing and development.
//!
//! Every capability has a simulated implementation created as a
//! `(Mock, Handle)` pair: the mock goes to the kiosk core, the handle stays
//! with the test or simulator console. Handles are clonable and are the only
//! part that crosses threads, so a console task can feed hardware events
//! while the core runs its tick loop elsewhere.

pub mod acceptor;
pub mod channel;
pub mod clock;
pub mod display;
pub mod dispenser;
pub mod keypad;

// Re-export commonly used types
pub use acceptor::{MockBillAcceptor, MockBillAcceptorHandle};
pub use channel::{MockCommandSource, MockCommandSourceHandle, MockStatusSink, MockStatusSinkHandle};
pub use clock::{MockClock, MockClockHandle};
pub use display::{MockDisplay, MockDisplayHandle};
pub use dispenser::{MockDispenser, MockDispenserHandle};
pub use keypad::{MockKeypadMatrix, MockKeypadMatrixHandle};
