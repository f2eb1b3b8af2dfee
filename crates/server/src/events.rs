use log::trace;
use tokio::sync::broadcast;

use hopline::{EventSink, GameEvent};

/// Fans simulation events out to forwarder tasks. Publishing never waits; a
/// receiver that falls behind skips ahead instead of stalling the tick.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<GameEvent>,
}

impl BroadcastSink {
    pub fn new(backlog: usize) -> Self {
        let (tx, _) = broadcast::channel(backlog.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: GameEvent) {
        if self.tx.send(event).is_err() {
            trace!("No forwarder subscribed; event dropped");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "left",
            DisconnectReason::Timeout => "timed out",
        }
    }
}
