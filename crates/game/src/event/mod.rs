mod queue;
mod types;

use std::sync::Arc;

pub use queue::EventQueue;
pub use types::GameEvent;

/// Transport-agnostic outlet for simulation events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: GameEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: GameEvent) {
        (**self).publish(event);
    }
}
