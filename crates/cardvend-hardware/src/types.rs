//! Shared types for the capability layer.

use std::fmt;

/// Which inbound channel a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTopic {
    /// Imperative commands (`{"cmd": N}`).
    Command,

    /// Configuration updates (`{"pwd": ..., "cp": ...}`).
    Config,
}

impl fmt::Display for CommandTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandTopic::Command => write!(f, "cmd"),
            CommandTopic::Config => write!(f, "config"),
        }
    }
}

/// One inbound message as delivered by the transport: the channel it came
/// in on and the raw payload. Parsing the payload is the core's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: CommandTopic,
    pub payload: String,
}

impl InboundMessage {
    /// Build a command-channel message.
    pub fn command(payload: impl Into<String>) -> Self {
        InboundMessage {
            topic: CommandTopic::Command,
            payload: payload.into(),
        }
    }

    /// Build a config-channel message.
    pub fn config(payload: impl Into<String>) -> Self {
        InboundMessage {
            topic: CommandTopic::Config,
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_constructors() {
        let msg = InboundMessage::command(r#"{"cmd": 0}"#);
        assert_eq!(msg.topic, CommandTopic::Command);
        assert_eq!(msg.payload, r#"{"cmd": 0}"#);

        let msg = InboundMessage::config(r#"{"cp": 5000}"#);
        assert_eq!(msg.topic, CommandTopic::Config);
    }
}
