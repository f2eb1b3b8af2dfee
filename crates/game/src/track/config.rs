use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub start_x: f32,
    pub start_width: f32,
    pub start_height: f32,

    pub min_gap: f32,
    pub max_gap: f32,
    pub gap_limit: f32,

    pub min_width: f32,
    pub max_width: f32,

    /// Playable band for platform tops; y grows downward.
    pub min_height: f32,
    pub max_height: f32,
    /// Share of the theoretical jump height a step up may use.
    pub reach_fraction: f32,

    pub max_difficulty: f32,

    pub hazard_chance: f32,
    pub rare_chance: f32,
    pub bonus_chance: f32,
    pub mystery_chance: f32,
    pub obstacle_chance: f32,
    pub item_chance: f32,
    /// Gaps above this share of the current gap range mark the next segment gap-adjacent.
    pub gap_adjacent_fraction: f32,

    pub item_size: f32,
    pub item_lift: f32,
    pub ceiling_lift: f32,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            start_x: 0.0,
            start_width: 1200.0,
            start_height: 620.0,

            min_gap: 50.0,
            max_gap: 140.0,
            gap_limit: 300.0,

            min_width: 160.0,
            max_width: 420.0,

            min_height: 320.0,
            max_height: 640.0,
            reach_fraction: 0.7,

            max_difficulty: 2.0,

            hazard_chance: 0.08,
            rare_chance: 0.04,
            bonus_chance: 0.15,
            mystery_chance: 0.06,
            obstacle_chance: 0.15,
            item_chance: 0.3,
            gap_adjacent_fraction: 0.8,

            item_size: 20.0,
            item_lift: 60.0,
            ceiling_lift: 110.0,
        }
    }
}
