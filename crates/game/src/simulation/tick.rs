use std::sync::Arc;

use log::{info, trace};

use super::step::step_session;
use crate::event::{EventSink, GameEvent};
use crate::net::TrackUpdate;
use crate::rules::time_factor;
use crate::session::{SessionRegistry, lock_session};

pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn dt_ms(&self) -> f64 {
        1000.0 / self.tick_rate as f64
    }

    /// Fixed time factor every tick runs with, relative to the 60 Hz baseline.
    pub fn time_factor(&self) -> f32 {
        time_factor(self.dt_ms())
    }

    pub fn accumulate(&mut self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            self.accumulator += delta.min(0.25);
        }
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub sessions: usize,
    pub runners: usize,
    pub new_segments: usize,
    pub eliminations: usize,
    pub pruned: usize,
}

/// Fixed-rate authoritative loop over every session in the registry.
pub struct TickScheduler {
    registry: Arc<SessionRegistry>,
    timestep: FixedTimestep,
    ticks: u64,
}

impl TickScheduler {
    pub fn new(registry: Arc<SessionRegistry>, tick_rate: u32) -> Self {
        Self {
            registry,
            timestep: FixedTimestep::new(tick_rate),
            ticks: 0,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Feeds wall-clock time in seconds and runs every tick that became due.
    pub fn advance(&mut self, delta: f32, sink: &dyn EventSink) -> u32 {
        self.timestep.accumulate(delta);

        let mut ticks_run = 0;
        while self.timestep.consume_tick() {
            self.tick(sink);
            ticks_run += 1;
        }
        ticks_run
    }

    pub fn tick(&mut self, sink: &dyn EventSink) -> TickStats {
        let rules = Arc::clone(self.registry.rules());
        let time_factor = self.timestep.time_factor();
        let dt_ms = self.timestep.dt_ms();
        let mut stats = TickStats::default();

        for handle in self.registry.sessions() {
            let mut session = lock_session(&handle);
            if session.is_closed() {
                continue;
            }

            let report = step_session(&mut session, &rules, time_factor, dt_ms);
            stats.sessions += 1;
            stats.runners += session.runner_count();
            stats.new_segments += report.new_segments.len();
            stats.eliminations += report.eliminations.len();
            stats.pruned += report.pruned;

            if !report.new_segments.is_empty() {
                sink.publish(GameEvent::TrackUpdate(TrackUpdate {
                    session_id: session.id,
                    segments: report.new_segments,
                }));
            }
            for elimination in report.eliminations {
                info!(
                    "Player {} eliminated in session {} ({}, score {})",
                    elimination.player_id,
                    session.id,
                    elimination.cause.as_str(),
                    elimination.final_score
                );
                sink.publish(GameEvent::RunnerEliminated {
                    session_id: session.id,
                    player_id: elimination.player_id,
                    cause: elimination.cause,
                    final_score: elimination.final_score,
                });
            }
            sink.publish(GameEvent::SessionSnapshot(session.snapshot()));
        }

        self.ticks += 1;
        trace!(
            "Tick {}: {} sessions, {} runners, {} new segments, {} pruned",
            self.ticks, stats.sessions, stats.runners, stats.new_segments, stats.pruned
        );
        stats
    }
}
