//! Control messages posted by the application

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Message understood by the worker, tagged by `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
}

impl ControlMessage {
    /// Parses a raw payload; unknown or malformed messages yield `None`
    pub fn parse(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}

/// Reply sent back on the message's port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version { version: String, timestamp: i64 },
    Cleared { success: bool },
}

/// A message with an optional reply port
#[derive(Debug)]
pub struct MessageEnvelope {
    pub message: ControlMessage,
    pub reply_to: Option<oneshot::Sender<ControlReply>>,
}

impl MessageEnvelope {
    pub fn new(message: ControlMessage) -> Self {
        Self {
            message,
            reply_to: None,
        }
    }

    pub fn with_reply(message: ControlMessage) -> (Self, oneshot::Receiver<ControlReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply_to: Some(tx),
            },
            rx,
        )
    }

    /// Sends the reply if a port was supplied
    pub fn reply(self, reply: ControlReply) {
        if let Some(port) = self.reply_to {
            let _ = port.send(reply);
        }
    }
}
