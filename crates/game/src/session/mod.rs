mod registry;

pub(crate) use registry::lock_session;
pub use registry::{JoinOutcome, LeaveOutcome, RegistryConfig, SessionHandle, SessionRegistry};

use std::collections::BTreeMap;

use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize};

use crate::input::{InputError, InputEvent};
use crate::net::{RunnerSnapshot, SessionSnapshot, TrackUpdate};
use crate::rules::GameRules;
use crate::runner::RunnerState;
use crate::track::Track;

pub type PlayerId = u32;
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum SessionStatus {
    Waiting,
    Live,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub runner: RunnerState,
    pub holding_jump: bool,
    /// Session clock of the last input from this player.
    pub last_seen_ms: f64,
}

impl Participant {
    fn new(runner: RunnerState, now_ms: f64) -> Self {
        Self {
            runner,
            holding_jump: false,
            last_seen_ms: now_ms,
        }
    }
}

/// A bounded group of runners sharing one generated world.
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    elapsed_ms: f64,
    tick: u64,
    participants: BTreeMap<PlayerId, Participant>,
    track: Track,
    leader_x: f32,
    closed: bool,
}

impl Session {
    pub fn new(id: SessionId, track: Track) -> Self {
        Self {
            id,
            status: SessionStatus::Live,
            elapsed_ms: 0.0,
            tick: 0,
            participants: BTreeMap::new(),
            track,
            leader_x: 0.0,
            closed: false,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_clock(&mut self, dt_ms: f64) {
        self.elapsed_ms += dt_ms.max(0.0);
        self.tick = self.tick.wrapping_add(1);
    }

    /// Furthest x any runner in this session has reached.
    pub fn leader_x(&self) -> f32 {
        self.leader_x
    }

    pub(crate) fn record_leader(&mut self, x: f32) {
        if x.is_finite() {
            self.leader_x = self.leader_x.max(x);
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub(crate) fn split_mut(&mut self) -> (&mut BTreeMap<PlayerId, Participant>, &mut Track) {
        (&mut self.participants, &mut self.track)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.participants.clear();
    }

    pub fn runner_count(&self) -> usize {
        self.participants.len()
    }

    pub fn living_count(&self) -> usize {
        self.participants.values().filter(|p| p.runner.alive).count()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_full(&self, capacity: usize) -> bool {
        self.participants.len() >= capacity
    }

    pub fn participant(&self, player_id: PlayerId) -> Option<&Participant> {
        self.participants.get(&player_id)
    }

    pub fn participant_mut(&mut self, player_id: PlayerId) -> Option<&mut Participant> {
        self.participants.get_mut(&player_id)
    }

    pub fn participants(&self) -> impl Iterator<Item = (&PlayerId, &Participant)> {
        self.participants.iter()
    }

    pub fn add_runner(&mut self, player_id: PlayerId, rules: &GameRules) -> bool {
        if self.closed || self.participants.contains_key(&player_id) {
            return false;
        }
        let runner = rules.spawn_runner(self.track.segments());
        self.participants
            .insert(player_id, Participant::new(runner, self.elapsed_ms));
        true
    }

    pub fn remove_runner(&mut self, player_id: PlayerId) -> Option<Participant> {
        self.participants.remove(&player_id)
    }

    /// Removes players whose last input is older than `timeout_ms`.
    pub(crate) fn evict_idle(&mut self, timeout_ms: f64) -> Vec<PlayerId> {
        let now = self.elapsed_ms;
        let idle: Vec<PlayerId> = self
            .participants
            .iter()
            .filter(|(_, p)| now - p.last_seen_ms > timeout_ms)
            .map(|(id, _)| *id)
            .collect();
        for player_id in &idle {
            self.participants.remove(player_id);
        }
        idle
    }

    /// Applies one input event to a runner. `Ok(false)` means the event was
    /// well-formed but its precondition did not hold (e.g. dash on cooldown).
    pub fn apply_input(
        &mut self,
        player_id: PlayerId,
        event: InputEvent,
        rules: &GameRules,
        accept_position_reports: bool,
    ) -> Result<bool, InputError> {
        let now = self.elapsed_ms;
        let participant = self
            .participants
            .get_mut(&player_id)
            .ok_or(InputError::UnknownPlayer(player_id))?;
        participant.last_seen_ms = now;

        if !participant.runner.alive {
            return Err(InputError::Eliminated(player_id));
        }

        let motion = rules.motion();
        let runner = &mut participant.runner;
        let changed = match event {
            InputEvent::JumpDown => {
                participant.holding_jump = true;
                motion.jump(runner)
            }
            InputEvent::JumpUp => {
                participant.holding_jump = false;
                motion.release_jump(runner);
                true
            }
            InputEvent::Dash => motion.dash(runner),
            InputEvent::PositionReport(report) => {
                if !accept_position_reports {
                    return Err(InputError::PositionReportsDisabled);
                }
                report.validate()?;
                runner.position = Vec2::new(report.x, report.y);
                runner.velocity = Vec2::new(report.vx, report.vy);
                runner.grounded = report.grounded;
                true
            }
        };
        Ok(changed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            tick: self.tick,
            status: self.status,
            elapsed_ms: self.elapsed_ms,
            runners: self
                .participants
                .iter()
                .map(|(id, p)| RunnerSnapshot::capture(*id, &p.runner))
                .collect(),
        }
    }

    pub fn track_sync(&self) -> TrackUpdate {
        TrackUpdate {
            session_id: self.id,
            segments: self.track.segments().to_vec(),
        }
    }
}
