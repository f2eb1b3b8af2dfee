mod rect;
mod scoring;

pub use rect::Rect;
pub use scoring::{ScoreEvent, ScoreKind, ScoreSource, ScoringConfig};

use glam::Vec2;

use crate::runner::{EliminationCause, Landing, MotionConfig, RunnerState};
use crate::track::{MysteryKind, Segment, SegmentKind};

pub struct CollisionResolver {
    scoring: ScoringConfig,
    runner_size: Vec2,
    fall_limit_y: f32,
}

impl CollisionResolver {
    pub fn new(scoring: ScoringConfig, motion: &MotionConfig, fall_limit_y: f32) -> Self {
        Self {
            scoring,
            runner_size: Vec2::new(motion.player_width, motion.player_height),
            fall_limit_y,
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn runner_bounds(&self, runner: &RunnerState) -> Rect {
        Rect::from_xywh(
            runner.position.x,
            runner.position.y,
            self.runner_size.x,
            self.runner_size.y,
        )
    }

    /// Collects every uncollected item the runner overlaps. Each item pays out once.
    pub fn resolve(&self, runner: &mut RunnerState, segments: &mut [Segment]) -> Vec<ScoreEvent> {
        let mut events = Vec::new();
        if !runner.alive {
            return events;
        }

        let bounds = self.runner_bounds(runner);
        for segment in segments
            .iter_mut()
            .filter(|s| s.spans(bounds.min.x, bounds.max.x))
        {
            for item in segment.items.iter_mut().filter(|i| !i.collected) {
                if bounds.overlaps(&item.bounds()) {
                    item.collected = true;
                    let event = ScoreEvent::new(ScoreSource::Item, self.scoring.item_bonus);
                    runner.bonus_score += event.delta;
                    events.push(event);
                }
            }
        }

        events
    }

    /// Score for the segment type the runner just landed on; only on an
    /// airborne-to-grounded transition.
    pub fn landing_bonus(&self, runner: &mut RunnerState, landing: &Landing) -> Option<ScoreEvent> {
        if !landing.was_airborne {
            return None;
        }
        let delta = self.landing_delta(landing.kind);
        if delta == 0 {
            return None;
        }
        let event = ScoreEvent::new(ScoreSource::Landing(landing.kind), delta);
        runner.bonus_score += event.delta;
        Some(event)
    }

    pub fn landing_delta(&self, kind: SegmentKind) -> i64 {
        let scoring = &self.scoring;
        match kind {
            SegmentKind::Default | SegmentKind::Obstacle => 0,
            SegmentKind::Bonus => scoring.bonus_landing,
            SegmentKind::RareBonus => scoring.rare_landing,
            SegmentKind::Hazard => scoring.hazard_landing,
            SegmentKind::GapAdjacent => scoring.gap_adjacent_landing,
            SegmentKind::Mystery(MysteryKind::Credit) => scoring.mystery_credit,
            SegmentKind::Mystery(MysteryKind::FakeSafe) => scoring.fake_safe_landing,
            SegmentKind::Mystery(MysteryKind::SpeedBoost) => 0,
        }
    }

    pub fn register_combo(&self, runner: &mut RunnerState, landing: &Landing) -> Option<ScoreEvent> {
        if !landing.was_airborne {
            return None;
        }

        let within_window = landing
            .since_last_landing_ms
            .is_some_and(|since| since >= 0.0 && since < self.scoring.combo_window_ms);
        runner.combo_count = if within_window {
            runner.combo_count.saturating_add(1)
        } else {
            1
        };

        if runner.combo_count <= 1 {
            return None;
        }
        let delta = self.scoring.combo_unit_bonus * runner.combo_count as i64;
        let event = ScoreEvent::new(ScoreSource::Combo(runner.combo_count), delta);
        runner.bonus_score += event.delta;
        Some(event)
    }

    /// Marks the runner eliminated when it fell out of the world or touches an
    /// active obstacle. Returns the cause only on the step it happened.
    pub fn check_elimination(
        &self,
        runner: &mut RunnerState,
        segments: &[Segment],
        time_ms: f64,
    ) -> Option<EliminationCause> {
        if !runner.alive {
            return None;
        }

        if runner.position.y > self.fall_limit_y {
            runner.eliminate(EliminationCause::Fell);
            return Some(EliminationCause::Fell);
        }

        let bounds = self.runner_bounds(runner);
        let hit = segments
            .iter()
            .filter_map(|s| s.obstacle.as_ref())
            .filter(|o| {
                let (left, right) = o.sweep_span();
                right > bounds.min.x && left < bounds.max.x
            })
            .filter_map(|o| o.bounds_at(time_ms))
            .any(|hitbox| bounds.overlaps(&hitbox));

        if hit {
            runner.eliminate(EliminationCause::Obstacle);
            return Some(EliminationCause::Obstacle);
        }

        None
    }
}
