//! Mock status and command channels for testing and development.
//!
//! The status sink records everything the core publishes; the command
//! source hands the core whatever the handle queued. Together they stand in
//! for the kiosk's messaging transport.

use crate::{
    Result,
    error::HardwareError,
    traits::{CommandSource, StatusSink},
    types::InboundMessage,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct SinkInner {
    published: Vec<(String, String)>,
    connected: bool,
}

/// Mock outbound status channel.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockStatusSink;
/// use cardvend_hardware::traits::StatusSink;
///
/// let (mut sink, handle) = MockStatusSink::new();
///
/// sink.publish("kiosk-1/rp/status", r#"{"amt": 0}"#).unwrap();
///
/// let published = handle.published();
/// assert_eq!(published.len(), 1);
/// assert_eq!(published[0].0, "kiosk-1/rp/status");
/// ```
#[derive(Debug)]
pub struct MockStatusSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl MockStatusSink {
    /// Create a new mock status sink.
    pub fn new() -> (Self, MockStatusSinkHandle) {
        let inner = Arc::new(Mutex::new(SinkInner {
            published: Vec::new(),
            connected: true,
        }));

        let sink = Self {
            inner: Arc::clone(&inner),
        };
        let handle = MockStatusSinkHandle { inner };

        (sink, handle)
    }

    fn locked(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusSink for MockStatusSink {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        let mut inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected("status sink"));
        }
        inner.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Handle for inspecting a mock status sink.
#[derive(Debug, Clone)]
pub struct MockStatusSinkHandle {
    inner: Arc<Mutex<SinkInner>>,
}

impl MockStatusSinkHandle {
    fn locked(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every (topic, payload) pair published so far, in order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.locked().published.clone()
    }

    /// The most recent publication.
    pub fn last_published(&self) -> Option<(String, String)> {
        self.locked().published.last().cloned()
    }

    /// Take and clear the recorded publications.
    pub fn take_published(&self) -> Vec<(String, String)> {
        std::mem::take(&mut self.locked().published)
    }

    /// Simulate the transport dropping; publishes fail until `reconnect`.
    pub fn disconnect(&self) {
        self.locked().connected = false;
    }

    /// Bring a disconnected transport back.
    pub fn reconnect(&self) {
        self.locked().connected = true;
    }
}

#[derive(Debug)]
struct SourceInner {
    queue: VecDeque<InboundMessage>,
    connected: bool,
}

/// Mock inbound command channel.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockCommandSource;
/// use cardvend_hardware::traits::CommandSource;
///
/// let (mut source, handle) = MockCommandSource::new();
///
/// handle.push_command(r#"{"cmd": 1}"#);
///
/// let msg = source.try_recv().unwrap().unwrap();
/// assert_eq!(msg.payload, r#"{"cmd": 1}"#);
/// assert!(source.try_recv().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MockCommandSource {
    inner: Arc<Mutex<SourceInner>>,
}

impl MockCommandSource {
    /// Create a new mock command source.
    pub fn new() -> (Self, MockCommandSourceHandle) {
        let inner = Arc::new(Mutex::new(SourceInner {
            queue: VecDeque::new(),
            connected: true,
        }));

        let source = Self {
            inner: Arc::clone(&inner),
        };
        let handle = MockCommandSourceHandle { inner };

        (source, handle)
    }

    fn locked(&self) -> MutexGuard<'_, SourceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandSource for MockCommandSource {
    fn try_recv(&mut self) -> Result<Option<InboundMessage>> {
        let mut inner = self.locked();
        if !inner.connected {
            return Err(HardwareError::disconnected("command source"));
        }
        Ok(inner.queue.pop_front())
    }
}

/// Handle for feeding a mock command source.
#[derive(Debug, Clone)]
pub struct MockCommandSourceHandle {
    inner: Arc<Mutex<SourceInner>>,
}

impl MockCommandSourceHandle {
    fn locked(&self) -> MutexGuard<'_, SourceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a command-channel payload.
    pub fn push_command(&self, payload: impl Into<String>) {
        self.locked()
            .queue
            .push_back(InboundMessage::command(payload));
    }

    /// Queue a config-channel payload.
    pub fn push_config(&self, payload: impl Into<String>) {
        self.locked()
            .queue
            .push_back(InboundMessage::config(payload));
    }

    /// Number of queued messages not yet received.
    pub fn pending(&self) -> usize {
        self.locked().queue.len()
    }

    /// Simulate the channel dropping; receives fail until `reconnect`.
    pub fn disconnect(&self) {
        self.locked().connected = false;
    }

    /// Bring a disconnected channel back.
    pub fn reconnect(&self) {
        self.locked().connected = true;
    }
}
