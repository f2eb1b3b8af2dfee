use rkyv::{Archive, Deserialize, Serialize};

use crate::collision::Rect;

pub type SegmentId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum MysteryKind {
    Credit,
    SpeedBoost,
    FakeSafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum SegmentKind {
    Default,
    Bonus,
    Hazard,
    RareBonus,
    GapAdjacent,
    Mystery(MysteryKind),
    Obstacle,
}

impl SegmentKind {
    pub fn allows_items(&self) -> bool {
        !matches!(
            self,
            SegmentKind::Hazard | SegmentKind::Mystery(MysteryKind::FakeSafe)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ObstacleKind {
    Static,
    LowCeiling,
    Moving {
        amplitude: f32,
        /// Radians per second.
        speed: f32,
        phase: f32,
    },
    Pulsing {
        active_ms: f32,
        inactive_ms: f32,
        phase_ms: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Obstacle {
    pub fn is_active_at(&self, time_ms: f64) -> bool {
        match self.kind {
            ObstacleKind::Pulsing {
                active_ms,
                inactive_ms,
                phase_ms,
            } => {
                let period = (active_ms + inactive_ms) as f64;
                if period <= 0.0 {
                    return true;
                }
                (time_ms + phase_ms as f64).rem_euclid(period) < active_ms as f64
            }
            _ => true,
        }
    }

    pub fn offset_at(&self, time_ms: f64) -> f32 {
        match self.kind {
            ObstacleKind::Moving {
                amplitude,
                speed,
                phase,
            } => amplitude * ((time_ms / 1000.0) as f32 * speed + phase).sin(),
            _ => 0.0,
        }
    }

    /// Hit box at the given session time, or `None` while a pulsing hazard is off.
    pub fn bounds_at(&self, time_ms: f64) -> Option<Rect> {
        if !self.is_active_at(time_ms) {
            return None;
        }
        Some(Rect::from_xywh(
            self.x + self.offset_at(time_ms),
            self.y,
            self.width,
            self.height,
        ))
    }

    /// Horizontal extent over every phase of the motion.
    pub fn sweep_span(&self) -> (f32, f32) {
        let reach = match self.kind {
            ObstacleKind::Moving { amplitude, .. } => amplitude.abs(),
            _ => 0.0,
        };
        (self.x - reach, self.x + self.width + reach)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Item {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub collected: bool,
}

impl Item {
    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Segment {
    pub id: SegmentId,
    pub start_x: f32,
    pub width: f32,
    /// Top surface of the platform.
    pub height: f32,
    pub kind: SegmentKind,
    pub obstacle: Option<Obstacle>,
    pub items: Vec<Item>,
}

impl Segment {
    pub fn new(id: SegmentId, start_x: f32, width: f32, height: f32, kind: SegmentKind) -> Self {
        Self {
            id,
            start_x,
            width,
            height,
            kind,
            obstacle: None,
            items: Vec::new(),
        }
    }

    pub fn end_x(&self) -> f32 {
        self.start_x + self.width
    }

    pub fn center_x(&self) -> f32 {
        self.start_x + self.width * 0.5
    }

    pub fn spans(&self, left: f32, right: f32) -> bool {
        right > self.start_x && left < self.end_x()
    }
}
