use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use super::{PlayerId, Session, SessionId, SessionStatus};
use crate::event::{EventSink, GameEvent};
use crate::input::{InputError, InputEvent};
use crate::rules::{GameRules, derive_session_seed};

pub type SessionHandle = Arc<Mutex<Session>>;

pub(crate) fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Most runners one session holds; the next joiner gets a new session.
    pub capacity: usize,
    pub world_seed: u64,
    pub idle_timeout_ms: f64,
    pub accept_position_reports: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            world_seed: 0,
            idle_timeout_ms: 30_000.0,
            accept_position_reports: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub session_id: SessionId,
    /// False when the player was already seated and nothing changed.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub session_id: SessionId,
    pub session_closed: bool,
}

#[derive(Default)]
struct RegistryInner {
    sessions: BTreeMap<SessionId, SessionHandle>,
    player_sessions: HashMap<PlayerId, SessionId>,
    next_session_id: SessionId,
}

/// Owns every live session and the player to session mapping.
pub struct SessionRegistry {
    config: RegistryConfig,
    rules: Arc<GameRules>,
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig, rules: Arc<GameRules>) -> Self {
        Self {
            config: RegistryConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            rules,
            inner: RwLock::new(RegistryInner {
                next_session_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn rules(&self) -> &Arc<GameRules> {
        &self.rules
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a live session with room, creating one when all are full.
    pub fn find_or_create(&self) -> SessionHandle {
        let mut inner = self.write();
        self.find_or_create_locked(&mut inner)
    }

    fn find_or_create_locked(&self, inner: &mut RegistryInner) -> SessionHandle {
        let open = inner.sessions.values().find(|handle| {
            let session = lock_session(handle);
            !session.is_closed()
                && session.status == SessionStatus::Live
                && !session.is_full(self.config.capacity)
        });
        if let Some(handle) = open {
            return Arc::clone(handle);
        }

        let id = inner.next_session_id;
        inner.next_session_id += 1;
        let seed = derive_session_seed(self.config.world_seed, id);
        let handle = Arc::new(Mutex::new(Session::new(id, self.rules.new_track(seed))));
        inner.sessions.insert(id, Arc::clone(&handle));
        debug!("Created session {} (seed {:#018x})", id, seed);
        handle
    }

    /// Seats a player, then publishes the session snapshot and the full track to them.
    pub fn join(&self, player_id: PlayerId, sink: &dyn EventSink) -> JoinOutcome {
        let mut inner = self.write();
        if let Some(&session_id) = inner.player_sessions.get(&player_id) {
            return JoinOutcome {
                session_id,
                created: false,
            };
        }

        let handle = self.find_or_create_locked(&mut inner);
        let mut session = lock_session(&handle);
        session.add_runner(player_id, &self.rules);
        inner.player_sessions.insert(player_id, session.id);

        info!(
            "Player {} joined session {} ({}/{})",
            player_id,
            session.id,
            session.runner_count(),
            self.config.capacity
        );

        sink.publish(GameEvent::SessionSnapshot(session.snapshot()));
        sink.publish(GameEvent::TrackSync {
            player_id,
            update: session.track_sync(),
        });

        JoinOutcome {
            session_id: session.id,
            created: true,
        }
    }

    /// Idempotent: a second call for the same player returns `None`.
    pub fn leave(&self, player_id: PlayerId, sink: &dyn EventSink) -> Option<LeaveOutcome> {
        let mut inner = self.write();
        let session_id = inner.player_sessions.remove(&player_id)?;
        let handle = inner.sessions.get(&session_id).cloned()?;

        let mut session = lock_session(&handle);
        session.remove_runner(player_id);
        info!("Player {} left session {}", player_id, session_id);

        let session_closed = session.is_empty();
        if session_closed {
            session.close();
            inner.sessions.remove(&session_id);
            debug!("Destroyed empty session {}", session_id);
            sink.publish(GameEvent::SessionClosed { session_id });
        } else {
            sink.publish(GameEvent::SessionSnapshot(session.snapshot()));
        }

        Some(LeaveOutcome {
            session_id,
            session_closed,
        })
    }

    pub fn apply_input(&self, player_id: PlayerId, event: InputEvent) -> Result<bool, InputError> {
        let handle = {
            let inner = self.read();
            inner
                .player_sessions
                .get(&player_id)
                .and_then(|id| inner.sessions.get(id))
                .cloned()
                .ok_or(InputError::UnknownPlayer(player_id))?
        };
        let mut session = lock_session(&handle);
        session.apply_input(
            player_id,
            event,
            &self.rules,
            self.config.accept_position_reports,
        )
    }

    /// Drops players that went quiet, then any session left empty.
    pub fn sweep_idle(&self, sink: &dyn EventSink) -> usize {
        let mut inner = self.write();
        let mut evicted = Vec::new();
        let mut emptied = Vec::new();

        for (&session_id, handle) in &inner.sessions {
            let mut session = lock_session(handle);
            let idle = session.evict_idle(self.config.idle_timeout_ms);
            for &player_id in &idle {
                info!("Player {} timed out of session {}", player_id, session_id);
            }
            if session.is_empty() {
                session.close();
                emptied.push(session_id);
            } else if !idle.is_empty() {
                sink.publish(GameEvent::SessionSnapshot(session.snapshot()));
            }
            evicted.extend(idle);
        }

        for player_id in &evicted {
            inner.player_sessions.remove(player_id);
        }
        for session_id in emptied {
            inner.sessions.remove(&session_id);
            debug!("Swept empty session {}", session_id);
            sink.publish(GameEvent::SessionClosed { session_id });
        }
        evicted.len()
    }

    /// Handles of every open session, for the scheduler to step without the registry lock.
    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.read().sessions.values().cloned().collect()
    }

    pub fn session(&self, session_id: SessionId) -> Option<SessionHandle> {
        self.read().sessions.get(&session_id).cloned()
    }

    pub fn player_session(&self, player_id: PlayerId) -> Option<SessionId> {
        self.read().player_sessions.get(&player_id).copied()
    }

    pub fn session_count(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn player_count(&self) -> usize {
        self.read().player_sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;

    fn registry(capacity: usize) -> SessionRegistry {
        SessionRegistry::new(
            RegistryConfig {
                capacity,
                idle_timeout_ms: 1_000.0,
                ..Default::default()
            },
            Arc::new(GameRules::default()),
        )
    }

    #[test]
    fn test_full_session_routes_to_new_one() {
        let registry = registry(5);
        let sink = EventQueue::new(64);

        for player_id in 1..=5 {
            assert_eq!(registry.join(player_id, &sink).session_id, 1);
        }
        let sixth = registry.join(6, &sink);
        assert_eq!(sixth.session_id, 2);
        assert_eq!(registry.session_count(), 2);
    }

    #[test]
    fn test_join_publishes_snapshot_and_track() {
        let registry = registry(4);
        let sink = EventQueue::new(16);
        registry.join(9, &sink);

        let events = sink.drain();
        assert!(matches!(events[0], GameEvent::SessionSnapshot(_)));
        match &events[1] {
            GameEvent::TrackSync { player_id, update } => {
                assert_eq!(*player_id, 9);
                assert!(!update.segments.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_rejoin_is_a_no_op() {
        let registry = registry(4);
        let sink = EventQueue::new(16);
        let first = registry.join(1, &sink);
        let again = registry.join(1, &sink);
        assert_eq!(first.session_id, again.session_id);
        assert!(!again.created);
        assert_eq!(registry.player_count(), 1);
    }

    #[test]
    fn test_leave_snapshot_omits_departed_runner() {
        let registry = registry(4);
        let sink = EventQueue::new(32);
        for player_id in 1..=3 {
            registry.join(player_id, &sink);
        }
        sink.drain();

        registry.leave(2, &sink);
        let events = sink.drain();
        assert_eq!(events.len(), 1);
        let GameEvent::SessionSnapshot(snapshot) = &events[0] else {
            panic!("unexpected event {:?}", events[0]);
        };
        assert_eq!(snapshot.runners.len(), 2);
        assert!(snapshot.runner(2).is_none());
        assert!(snapshot.runner(1).is_some());
        assert!(snapshot.runner(3).is_some());
    }

    #[test]
    fn test_leave_is_idempotent_and_destroys_empty_session() {
        let registry = registry(4);
        let sink = EventQueue::new(16);
        registry.join(1, &sink);
        registry.join(2, &sink);
        let handle = registry.session(1).unwrap();

        let first = registry.leave(1, &sink).unwrap();
        assert!(!first.session_closed);
        assert_eq!(registry.leave(1, &sink), None);
        assert_eq!(registry.session_count(), 1);

        let last = registry.leave(2, &sink).unwrap();
        assert!(last.session_closed);
        assert_eq!(registry.session_count(), 0);
        assert!(lock_session(&handle).is_closed());
        assert!(
            sink.drain()
                .iter()
                .any(|e| matches!(e, GameEvent::SessionClosed { session_id: 1 }))
        );
    }

    #[test]
    fn test_input_for_unknown_player_is_rejected() {
        let registry = registry(4);
        assert_eq!(
            registry.apply_input(3, InputEvent::JumpDown),
            Err(InputError::UnknownPlayer(3))
        );
    }

    #[test]
    fn test_sweep_removes_idle_players_and_empty_sessions() {
        let registry = registry(4);
        let sink = EventQueue::new(16);
        registry.join(1, &sink);
        lock_session(&registry.session(1).unwrap()).advance_clock(2_000.0);

        assert_eq!(registry.sweep_idle(&sink), 1);
        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.player_session(1), None);
    }

    #[test]
    fn test_sweep_keeps_active_players() {
        let registry = registry(4);
        let sink = EventQueue::new(16);
        registry.join(1, &sink);
        registry.join(2, &sink);
        let handle = registry.session(1).unwrap();
        lock_session(&handle).advance_clock(2_000.0);
        registry.apply_input(2, InputEvent::JumpUp).unwrap();

        assert_eq!(registry.sweep_idle(&sink), 1);
        assert_eq!(registry.player_session(1), None);
        assert_eq!(registry.player_session(2), Some(1));
    }
}
