use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::types::GameEvent;
use super::EventSink;

/// Bounded in-memory sink. When full, the oldest snapshot is evicted first.
pub struct EventQueue {
    pending: Mutex<VecDeque<GameEvent>>,
    max_pending: usize,
}

impl EventQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(max_pending)),
            max_pending: max_pending.max(1),
        }
    }

    pub fn drain(&self) -> Vec<GameEvent> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventQueue {
    fn publish(&self, event: GameEvent) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.len() >= self.max_pending {
            match pending.iter().position(GameEvent::is_superseded_by_next_tick) {
                Some(index) => {
                    pending.remove(index);
                }
                None => {
                    pending.pop_front();
                }
            }
        }
        pending.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SessionSnapshot;
    use crate::session::SessionStatus;

    fn snapshot(tick: u64) -> GameEvent {
        GameEvent::SessionSnapshot(SessionSnapshot {
            session_id: 1,
            tick,
            status: SessionStatus::Live,
            elapsed_ms: 0.0,
            runners: Vec::new(),
        })
    }

    #[test]
    fn test_drains_in_publish_order() {
        let queue = EventQueue::new(8);
        queue.publish(snapshot(1));
        queue.publish(GameEvent::SessionClosed { session_id: 1 });
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], snapshot(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_evicts_snapshots_first() {
        let queue = EventQueue::new(2);
        queue.publish(GameEvent::SessionClosed { session_id: 9 });
        queue.publish(snapshot(1));
        queue.publish(snapshot(2));
        let events = queue.drain();
        assert_eq!(
            events,
            vec![GameEvent::SessionClosed { session_id: 9 }, snapshot(2)]
        );
    }
}
