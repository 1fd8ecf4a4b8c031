//! Mock keypad matrix for testing and development.
//!
//! Holds a current key bitmask that `scan` returns unchanged until the
//! handle presses or releases keys. Debouncing is the core's job, so the
//! mock deliberately does none.

use crate::{
    Result,
    error::HardwareError,
    traits::{Key, KeyMask, KeypadMatrix},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Inner {
    mask: KeyMask,
    connected: bool,
}

/// Mock keypad matrix.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockKeypadMatrix;
/// use cardvend_hardware::traits::{Key, KeypadMatrix};
///
/// let (mut keypad, handle) = MockKeypadMatrix::new();
///
/// handle.press(Key::Digit(1));
/// handle.press(Key::Enter);
///
/// let mask = keypad.scan().unwrap();
/// assert!(mask.contains(Key::Digit(1)));
/// assert!(mask.contains(Key::Enter));
/// ```
#[derive(Debug)]
pub struct MockKeypadMatrix {
    inner: Arc<Mutex<Inner>>,
    name: String,
}

impl MockKeypadMatrix {
    /// Create a new mock keypad with the default name.
    pub fn new() -> (Self, MockKeypadMatrixHandle) {
        Self::with_name("Mock Keypad".to_string())
    }

    /// Create a new mock keypad with a custom name.
    pub fn with_name(name: String) -> (Self, MockKeypadMatrixHandle) {
        let inner = Arc::new(Mutex::new(Inner {
            mask: KeyMask::EMPTY,
            connected: true,
        }));

        let keypad = Self {
            inner: Arc::clone(&inner),
            name: name.clone(),
        };
        let handle = MockKeypadMatrixHandle { inner, name };

        (keypad, handle)
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeypadMatrix for MockKeypadMatrix {
    fn scan(&mut self) -> Result<KeyMask> {
        let inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected(&self.name));
        }
        Ok(inner.mask)
    }
}

/// Handle for controlling a mock keypad matrix.
#[derive(Debug, Clone)]
pub struct MockKeypadMatrixHandle {
    inner: Arc<Mutex<Inner>>,
    name: String,
}

impl MockKeypadMatrixHandle {
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold a key down. It stays pressed until released.
    pub fn press(&self, key: Key) {
        let mut inner = self.locked();
        inner.mask = inner.mask.with(key);
    }

    /// Release a key.
    pub fn release(&self, key: Key) {
        let mut inner = self.locked();
        inner.mask = inner.mask.without(key);
    }

    /// Release every key.
    pub fn release_all(&self) {
        self.locked().mask = KeyMask::EMPTY;
    }

    /// Replace the whole sample at once.
    pub fn set_mask(&self, mask: KeyMask) {
        self.locked().mask = mask;
    }

    /// The mask the next scan will report.
    pub fn current_mask(&self) -> KeyMask {
        self.locked().mask
    }

    /// Simulate the matrix dropping off; scans fail until `reconnect`.
    pub fn disconnect(&self) {
        self.locked().connected = false;
    }

    /// Bring a disconnected matrix back.
    pub fn reconnect(&self) {
        self.locked().connected = true;
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
