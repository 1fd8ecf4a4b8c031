//! Peripheral driver implementations for the card vending kiosk.
//!
//! This crate will hold the board-level backends for the capability traits
//! in `cardvend-hardware`: the MDB bill acceptor link, the dispenser signal
//! bank, the keypad matrix scanner, the character LCD and the battery RTC.
//! For the mock implementations used in development and testing, see the
//! `cardvend-hardware::mock` module.

// Currently empty - real hardware drivers will be added here
