use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use super::step::advance_runner;
use crate::collision::ScoreEvent;
use crate::input::InputEvent;
use crate::net::{RunnerSnapshot, SessionSnapshot};
use crate::rules::{BASELINE_FRAME_MS, GameRules, time_factor};
use crate::runner::{EliminationCause, Landing, RunnerState, WORLD_UNITS_PER_METER};
use crate::session::{PlayerId, SessionId};
use crate::track::Track;

/// Largest time factor a single frame may apply, so a long pause does not
/// turn into one huge physics step.
pub const MAX_FRAME_TIME_FACTOR: f32 = 20.0;

#[derive(Debug, Default)]
pub struct FrameReport {
    pub time_factor: f32,
    pub landing: Option<Landing>,
    pub score_events: Vec<ScoreEvent>,
    pub new_segments: usize,
    pub eliminated: Option<EliminationCause>,
}

/// Single-player mirror of the authoritative step, driven by a variable
/// frame clock. Remote runners from received snapshots are kept for display only.
pub struct LocalRun {
    rules: Arc<GameRules>,
    seed: u64,
    runs: u64,
    track: Track,
    runner: RunnerState,
    holding_jump: bool,
    clock_ms: f64,
    best_score: i64,
    local_player: Option<PlayerId>,
    remote_session: Option<SessionId>,
    remote: BTreeMap<PlayerId, RunnerSnapshot>,
}

impl LocalRun {
    pub fn new(rules: Arc<GameRules>, seed: u64) -> Self {
        let track = rules.new_track(seed);
        let runner = rules.spawn_runner(track.segments());
        Self {
            rules,
            seed,
            runs: 1,
            track,
            runner,
            holding_jump: false,
            clock_ms: 0.0,
            best_score: 0,
            local_player: None,
            remote_session: None,
            remote: BTreeMap::new(),
        }
    }

    pub fn runner(&self) -> &RunnerState {
        &self.runner
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn score(&self) -> i64 {
        self.runner.total_score()
    }

    pub fn best_score(&self) -> i64 {
        self.best_score
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn is_over(&self) -> bool {
        !self.runner.alive
    }

    /// Advances by `elapsed_ms` of wall-clock time since the previous frame.
    pub fn frame(&mut self, elapsed_ms: f64) -> FrameReport {
        if !elapsed_ms.is_finite() || elapsed_ms <= 0.0 {
            return FrameReport::default();
        }
        let tf = time_factor(elapsed_ms).min(MAX_FRAME_TIME_FACTOR);
        let mut report = FrameReport {
            time_factor: tf,
            ..Default::default()
        };
        if !self.runner.alive {
            return report;
        }

        self.clock_ms += elapsed_ms.min(BASELINE_FRAME_MS * MAX_FRAME_TIME_FACTOR as f64);
        let step = advance_runner(
            &self.rules,
            &mut self.runner,
            self.holding_jump,
            self.track.segments_mut(),
            tf,
            self.clock_ms,
        );
        report.landing = step.landing;
        report.score_events = step.score_events;

        let world = self.rules.world();
        let difficulty = self.rules.difficulty(self.runner.position.x / WORLD_UNITS_PER_METER);
        report.new_segments = self
            .track
            .extend_to(self.runner.position.x + world.lookahead, difficulty)
            .len();

        report.eliminated = self.rules.collision().check_elimination(
            &mut self.runner,
            self.track.segments(),
            self.clock_ms,
        );
        self.track
            .prune_behind(self.runner.position.x - world.prune_margin);

        self.best_score = self.best_score.max(self.runner.total_score());
        if let Some(cause) = report.eliminated {
            debug!(
                "Local run {} over ({}), score {}, best {}",
                self.runs,
                cause.as_str(),
                self.runner.total_score(),
                self.best_score
            );
        }
        report
    }

    /// Same input semantics as a session; position reports have no meaning locally.
    pub fn input(&mut self, event: InputEvent) -> bool {
        if !self.runner.alive {
            return false;
        }
        let motion = self.rules.motion();
        match event {
            InputEvent::JumpDown => {
                self.holding_jump = true;
                motion.jump(&mut self.runner)
            }
            InputEvent::JumpUp => {
                self.holding_jump = false;
                motion.release_jump(&mut self.runner);
                true
            }
            InputEvent::Dash => motion.dash(&mut self.runner),
            InputEvent::PositionReport(_) => false,
        }
    }

    /// Starts over on a new track. The best score survives.
    pub fn restart(&mut self) {
        self.runs += 1;
        let seed = self.seed.wrapping_add(self.runs - 1);
        self.track = self.rules.new_track(seed);
        self.runner = self.rules.spawn_runner(self.track.segments());
        self.holding_jump = false;
        self.clock_ms = 0.0;
    }

    pub fn set_local_player(&mut self, player_id: Option<PlayerId>) {
        self.local_player = player_id;
        if let Some(player_id) = player_id {
            self.remote.remove(&player_id);
        }
    }

    /// Replaces the mirrored remote runners with those in `snapshot`, minus our own.
    pub fn apply_snapshot(&mut self, snapshot: &SessionSnapshot) {
        self.remote_session = Some(snapshot.session_id);
        self.remote = snapshot
            .runners
            .iter()
            .filter(|r| Some(r.player_id) != self.local_player)
            .map(|r| (r.player_id, r.clone()))
            .collect();
    }

    pub fn remote_session(&self) -> Option<SessionId> {
        self.remote_session
    }

    pub fn remote_runners(&self) -> impl Iterator<Item = &RunnerSnapshot> {
        self.remote.values()
    }
}
