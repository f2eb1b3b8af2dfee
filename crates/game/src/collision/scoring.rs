use serde::{Deserialize, Serialize};

use crate::track::SegmentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub item_bonus: i64,
    pub bonus_landing: i64,
    pub rare_landing: i64,
    pub hazard_landing: i64,
    pub gap_adjacent_landing: i64,
    pub mystery_credit: i64,
    pub fake_safe_landing: i64,
    pub combo_window_ms: f64,
    pub combo_unit_bonus: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            item_bonus: 50,
            bonus_landing: 25,
            rare_landing: 100,
            hazard_landing: -30,
            gap_adjacent_landing: 10,
            mystery_credit: 60,
            fake_safe_landing: -40,
            combo_window_ms: 1500.0,
            combo_unit_bonus: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Bonus,
    Penalty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Item,
    Landing(SegmentKind),
    Combo(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub kind: ScoreKind,
    pub delta: i64,
    pub source: ScoreSource,
}

impl ScoreEvent {
    pub fn new(source: ScoreSource, delta: i64) -> Self {
        let kind = if delta < 0 {
            ScoreKind::Penalty
        } else {
            ScoreKind::Bonus
        };
        Self {
            kind,
            delta,
            source,
        }
    }
}
