//! Connected application clients

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

/// Event pushed to every connected client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEvent {
    /// A new worker version took control
    ControllerChanged { version: String },
    /// Background refresh after reconnecting finished
    SyncComplete {
        timestamp: i64,
        refreshed: usize,
        failed: usize,
    },
}

impl ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ControllerChanged { .. } => "CONTROLLER_CHANGED",
            Self::SyncComplete { .. } => "SYNC_COMPLETE",
        }
    }
}

/// Broadcast hub for client events.
///
/// Clients are subscribers; events sent while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct Clients {
    sender: broadcast::Sender<ClientEvent>,
}

impl Default for Clients {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Clients {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn connected(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Takes control of every connected client for `version`
    pub fn claim(&self, version: &str) -> usize {
        self.broadcast(ClientEvent::ControllerChanged {
            version: version.to_string(),
        })
    }

    /// Sends to every subscriber, returning how many received it
    pub fn broadcast(&self, event: ClientEvent) -> usize {
        let event_type = event.event_type();

        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!(event = event_type, "No connected clients");
                0
            }
        }
    }
}
