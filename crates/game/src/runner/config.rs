use serde::{Deserialize, Serialize};

/// Step constants are expressed per update at the 60 Hz baseline and scaled by
/// the time factor at integration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub gravity: f32,
    pub max_fall_speed: f32,

    pub jump_force: f32,
    pub double_jump_force: f32,
    pub jump_hold_force: f32,
    pub max_jump_hold: f32,
    pub max_jumps: u8,

    pub dash_cooldown: f32,
    pub dash_duration: f32,

    pub base_speed: f32,
    pub speed_ramp_per_meter: f32,
    pub max_speed_multiplier: f32,

    pub speed_boost_multiplier: f32,
    pub speed_boost_duration: f32,

    pub player_width: f32,
    pub player_height: f32,

    pub landing_inset: f32,
    pub landing_slack: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            gravity: 0.6,
            max_fall_speed: 14.0,

            jump_force: -11.0,
            double_jump_force: -9.0,
            jump_hold_force: -0.3,
            max_jump_hold: 12.0,
            max_jumps: 2,

            dash_cooldown: 90.0,
            dash_duration: 12.0,

            base_speed: 6.0,
            speed_ramp_per_meter: 0.0005,
            max_speed_multiplier: 2.0,

            speed_boost_multiplier: 1.35,
            speed_boost_duration: 180.0,

            player_width: 24.0,
            player_height: 24.0,

            landing_inset: 4.0,
            landing_slack: 10.0,
        }
    }
}

impl MotionConfig {
    /// Highest rise of a single held jump, ignoring the double jump.
    pub fn max_jump_height(&self) -> f32 {
        let launch = self.jump_force.abs() + self.jump_hold_force.abs() * self.max_jump_hold * 0.5;
        let gravity = self.gravity.max(f32::EPSILON);
        launch * launch / (2.0 * gravity)
    }

    pub fn speed_multiplier(&self, distance_meters: f32) -> f32 {
        let cap = self.max_speed_multiplier.max(1.0);
        (1.0 + distance_meters.max(0.0) * self.speed_ramp_per_meter).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_multiplier_is_capped() {
        let config = MotionConfig::default();
        assert_eq!(config.speed_multiplier(0.0), 1.0);
        assert!(config.speed_multiplier(500.0) > 1.0);
        assert_eq!(config.speed_multiplier(1.0e9), config.max_speed_multiplier);
    }

    #[test]
    fn test_jump_height_covers_plain_jump_arc() {
        let config = MotionConfig::default();
        let plain = config.jump_force * config.jump_force / (2.0 * config.gravity);
        assert!(config.max_jump_height() >= plain);
    }
}
