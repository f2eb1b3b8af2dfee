use serde::{Deserialize, Serialize};

use crate::collision::{CollisionResolver, ScoringConfig};
use glam::Vec2;

use crate::runner::{MotionConfig, MotionSimulator, RunnerState};
use crate::track::{Segment, Track, TrackConfig, TrackGenerator};

/// Milliseconds of one update at the 60 Hz baseline.
pub const BASELINE_FRAME_MS: f64 = 1000.0 / 60.0;

pub fn time_factor(elapsed_ms: f64) -> f32 {
    (elapsed_ms / BASELINE_FRAME_MS) as f32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Track is generated at least this far past the leader.
    pub lookahead: f32,
    /// Segments ending this far behind the rearmost living runner are dropped.
    pub prune_margin: f32,
    pub fall_limit_y: f32,
    pub difficulty_ramp_per_meter: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            lookahead: 2400.0,
            prune_margin: 600.0,
            fall_limit_y: 900.0,
            difficulty_ramp_per_meter: 0.002,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub motion: MotionConfig,
    pub track: TrackConfig,
    pub scoring: ScoringConfig,
    pub world: WorldConfig,
}

/// Simulation components built once from a `GameConfig` and shared by every session.
pub struct GameRules {
    config: GameConfig,
    motion: MotionSimulator,
    collision: CollisionResolver,
}

impl Default for GameRules {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl GameRules {
    pub fn new(config: GameConfig) -> Self {
        let motion = MotionSimulator::new(config.motion.clone());
        let collision = CollisionResolver::new(
            config.scoring.clone(),
            &config.motion,
            config.world.fall_limit_y,
        );
        Self {
            config,
            motion,
            collision,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldConfig {
        &self.config.world
    }

    pub fn motion(&self) -> &MotionSimulator {
        &self.motion
    }

    pub fn collision(&self) -> &CollisionResolver {
        &self.collision
    }

    /// Grows with distance; the generator clamps it to its own ceiling.
    pub fn difficulty(&self, leader_meters: f32) -> f32 {
        1.0 + leader_meters.max(0.0) * self.config.world.difficulty_ramp_per_meter
    }

    /// A fresh runner standing on the earliest segment free of obstacles.
    pub fn spawn_runner(&self, segments: &[Segment]) -> RunnerState {
        let anchor = segments
            .iter()
            .find(|s| s.obstacle.is_none())
            .or_else(|| segments.first());
        let position = anchor.map_or(Vec2::ZERO, |segment| {
            Vec2::new(segment.start_x, segment.height - self.config.motion.player_height)
        });
        let mut runner = RunnerState::spawn(position);
        runner.grounded = anchor.is_some();
        runner.can_double_jump = true;
        runner
    }

    pub fn new_track(&self, seed: u64) -> Track {
        Track::new(TrackGenerator::seeded(
            seed,
            self.config.track.clone(),
            &self.config.motion,
        ))
    }
}

/// Mixes a world seed with a session id so sessions get distinct, reproducible tracks.
pub fn derive_session_seed(world_seed: u64, session_id: u64) -> u64 {
    let mut z = world_seed ^ session_id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_frame_has_unit_time_factor() {
        assert!((time_factor(BASELINE_FRAME_MS) - 1.0).abs() < 1e-6);
        assert!((time_factor(1000.0 / 30.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_difficulty_increases_with_distance() {
        let rules = GameRules::default();
        assert_eq!(rules.difficulty(0.0), 1.0);
        assert!(rules.difficulty(100.0) < rules.difficulty(200.0));
    }

    #[test]
    fn test_session_seeds_differ() {
        assert_ne!(derive_session_seed(7, 1), derive_session_seed(7, 2));
        assert_eq!(derive_session_seed(7, 1), derive_session_seed(7, 1));
    }
}
