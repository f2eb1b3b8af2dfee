use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize};

/// World units per scored meter.
pub const WORLD_UNITS_PER_METER: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum EliminationCause {
    Fell,
    Obstacle,
}

impl EliminationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            EliminationCause::Fell => "fell out of the world",
            EliminationCause::Obstacle => "hit an obstacle",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerState {
    /// Top-left corner; y grows downward.
    pub position: Vec2,
    pub velocity: Vec2,
    pub grounded: bool,
    pub jumping: bool,
    pub jump_count: u8,
    pub jump_hold_timer: f32,
    pub can_double_jump: bool,
    pub dashing: bool,
    pub dash_cooldown: f32,
    pub dash_remaining: f32,
    pub speed_boost_remaining: f32,
    pub combo_count: u32,
    pub last_land_ms: Option<f64>,
    pub bonus_score: i64,
    pub alive: bool,
    pub elimination: Option<EliminationCause>,
}

impl Default for RunnerState {
    fn default() -> Self {
        Self::spawn(Vec2::ZERO)
    }
}

impl RunnerState {
    pub fn spawn(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            grounded: false,
            jumping: false,
            jump_count: 0,
            jump_hold_timer: 0.0,
            can_double_jump: false,
            dashing: false,
            dash_cooldown: 0.0,
            dash_remaining: 0.0,
            speed_boost_remaining: 0.0,
            combo_count: 0,
            last_land_ms: None,
            bonus_score: 0,
            alive: true,
            elimination: None,
        }
    }

    pub fn distance_meters(&self) -> f32 {
        self.position.x.max(0.0) / WORLD_UNITS_PER_METER
    }

    pub fn distance_score(&self) -> i64 {
        self.distance_meters().floor() as i64
    }

    pub fn total_score(&self) -> i64 {
        self.distance_score() + self.bonus_score
    }

    pub fn bottom(&self, height: f32) -> f32 {
        self.position.y + height
    }

    /// Elimination is terminal; a second call keeps the first cause.
    pub fn eliminate(&mut self, cause: EliminationCause) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.elimination = Some(cause);
        self.velocity = Vec2::ZERO;
        self.dashing = false;
        true
    }
}
