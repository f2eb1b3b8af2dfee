use crate::track::{Segment, SegmentId, SegmentKind};

use super::{MotionConfig, RunnerState};

/// Result of a step in which the runner came to rest on a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landing {
    pub segment_id: SegmentId,
    pub kind: SegmentKind,
    /// False while the runner simply keeps running along a platform.
    pub was_airborne: bool,
    pub since_last_landing_ms: Option<f64>,
}

pub struct MotionSimulator {
    config: MotionConfig,
}

impl Default for MotionSimulator {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionSimulator {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Integrates one step. `time_factor` is elapsed time over the 60 Hz
    /// baseline frame; `segments` must be sorted by `start_x`.
    pub fn advance(
        &self,
        runner: &mut RunnerState,
        segments: &[Segment],
        speed_multiplier: f32,
        holding_jump: bool,
        time_factor: f32,
        now_ms: f64,
    ) -> Option<Landing> {
        if !runner.alive || !time_factor.is_finite() || time_factor <= 0.0 {
            return None;
        }
        let tf = time_factor;
        let config = &self.config;

        runner.dash_cooldown = (runner.dash_cooldown - tf).max(0.0);
        if runner.dashing {
            runner.dash_remaining -= tf;
            if runner.dash_remaining <= 0.0 {
                runner.dash_remaining = 0.0;
                runner.dashing = false;
            }
        }
        runner.speed_boost_remaining = (runner.speed_boost_remaining - tf).max(0.0);

        if holding_jump && runner.jump_hold_timer > 0.0 {
            runner.velocity.y += config.jump_hold_force * tf;
            runner.jump_hold_timer = (runner.jump_hold_timer - tf).max(0.0);
        } else {
            runner.jump_hold_timer = 0.0;
        }

        runner.velocity.y = (runner.velocity.y + config.gravity * tf).min(config.max_fall_speed);

        let previous_bottom = runner.bottom(config.player_height);
        runner.position.y += runner.velocity.y * tf;

        let boost = if runner.speed_boost_remaining > 0.0 {
            config.speed_boost_multiplier
        } else {
            1.0
        };
        let speed_multiplier = if speed_multiplier.is_finite() {
            speed_multiplier.max(0.0)
        } else {
            1.0
        };
        runner.velocity.x = config.base_speed * speed_multiplier * boost;
        runner.position.x += runner.velocity.x * tf;

        let was_grounded = runner.grounded;
        runner.grounded = false;
        self.resolve_landing(runner, segments, previous_bottom, was_grounded, tf, now_ms)
    }

    fn resolve_landing(
        &self,
        runner: &mut RunnerState,
        segments: &[Segment],
        previous_bottom: f32,
        was_grounded: bool,
        tf: f32,
        now_ms: f64,
    ) -> Option<Landing> {
        if runner.velocity.y < 0.0 {
            return None;
        }

        let config = &self.config;
        let left = runner.position.x;
        let right = left + config.player_width;
        let bottom = runner.bottom(config.player_height);
        let tolerance = runner.velocity.y.abs() * tf + config.landing_slack;

        let segment = segments.iter().find(|segment| {
            let inset_left = segment.start_x + config.landing_inset;
            let inset_right = segment.end_x() - config.landing_inset;
            let overlaps = right > inset_left && left < inset_right;
            let top = segment.height;
            overlaps && previous_bottom <= top + tolerance && bottom >= top
        })?;

        runner.position.y = segment.height - config.player_height;
        runner.velocity.y = 0.0;
        runner.grounded = true;
        runner.jumping = false;
        runner.jump_hold_timer = 0.0;
        runner.jump_count = 0;
        runner.can_double_jump = true;

        let was_airborne = !was_grounded;
        let since_last_landing_ms = if was_airborne {
            let since = runner.last_land_ms.map(|last| now_ms - last);
            runner.last_land_ms = Some(now_ms);
            since
        } else {
            None
        };

        Some(Landing {
            segment_id: segment.id,
            kind: segment.kind,
            was_airborne,
            since_last_landing_ms,
        })
    }

    /// First press from the ground, or the weaker air jump while one remains.
    pub fn jump(&self, runner: &mut RunnerState) -> bool {
        if !runner.alive {
            return false;
        }

        if runner.grounded {
            runner.velocity.y = self.config.jump_force;
            runner.grounded = false;
            runner.jumping = true;
            runner.jump_hold_timer = self.config.max_jump_hold;
            runner.jump_count = 1;
            runner.can_double_jump = true;
            return true;
        }

        if runner.can_double_jump && runner.jump_count < self.config.max_jumps {
            runner.velocity.y = self.config.double_jump_force;
            runner.jumping = true;
            runner.jump_count = runner.jump_count.max(1) + 1;
            runner.can_double_jump = false;
            return true;
        }

        false
    }

    pub fn release_jump(&self, runner: &mut RunnerState) {
        runner.jump_hold_timer = 0.0;
    }

    /// The dash flag is cosmetic; it does not change horizontal speed.
    pub fn dash(&self, runner: &mut RunnerState) -> bool {
        if !runner.alive || runner.dash_cooldown > 0.0 {
            return false;
        }
        runner.dashing = true;
        runner.dash_cooldown = self.config.dash_cooldown;
        runner.dash_remaining = self.config.dash_duration;
        true
    }

    pub fn apply_speed_boost(&self, runner: &mut RunnerState) {
        runner.speed_boost_remaining = self.config.speed_boost_duration;
    }
}
