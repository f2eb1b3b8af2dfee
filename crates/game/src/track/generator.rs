use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::runner::MotionConfig;

use super::{
    Item, MysteryKind, Obstacle, ObstacleKind, Segment, SegmentId, SegmentKind, TrackConfig,
};

const MIN_GAP_FLOOR: f32 = 1.0;
const MIN_WIDTH_FLOOR: f32 = 1.0;

/// Ordered inclusive bounds; tolerates swapped or non-finite config values.
fn bounds(lo: f32, hi: f32) -> (f32, f32) {
    let lo = if lo.is_finite() { lo } else { 0.0 };
    let hi = if hi.is_finite() { hi } else { lo };
    if lo <= hi { (lo, hi) } else { (hi, lo) }
}

pub struct TrackGenerator<R = Pcg32> {
    config: TrackConfig,
    max_rise: f32,
    player_height: f32,
    rng: R,
    next_id: SegmentId,
}

impl TrackGenerator<Pcg32> {
    pub fn seeded(seed: u64, config: TrackConfig, motion: &MotionConfig) -> Self {
        Self::new(config, motion, Pcg32::seed_from_u64(seed))
    }
}

impl<R: Rng> TrackGenerator<R> {
    pub fn new(config: TrackConfig, motion: &MotionConfig, rng: R) -> Self {
        let (band_top, band_bottom) = bounds(config.min_height, config.max_height);
        let reach = motion.max_jump_height() * config.reach_fraction;
        let max_rise = reach.max(0.0).min(band_bottom - band_top);
        Self {
            config,
            max_rise,
            player_height: motion.player_height,
            rng,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn clamp_difficulty(&self, difficulty: f32) -> f32 {
        if !difficulty.is_finite() {
            return self.config.max_difficulty.max(1.0);
        }
        difficulty.clamp(1.0, self.config.max_difficulty.max(1.0))
    }

    /// Current gap range for a difficulty, always positive and bounded by `gap_limit`.
    pub fn gap_range(&self, difficulty: f32) -> (f32, f32) {
        let difficulty = self.clamp_difficulty(difficulty);
        let limit = self.config.gap_limit.max(MIN_GAP_FLOOR);
        let (min_gap, max_gap) = bounds(self.config.min_gap, self.config.max_gap);
        let lo = (min_gap * difficulty).clamp(MIN_GAP_FLOOR, limit);
        let hi = (max_gap * difficulty).clamp(lo, limit);
        (lo, hi)
    }

    pub fn width_range(&self, difficulty: f32) -> (f32, f32) {
        let difficulty = self.clamp_difficulty(difficulty);
        let (min_width, max_width) = bounds(self.config.min_width, self.config.max_width);
        let lo = min_width.max(MIN_WIDTH_FLOOR);
        let hi = (max_width / difficulty).max(lo);
        (lo, hi)
    }

    fn allocate_id(&mut self) -> SegmentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn next(&mut self, previous: Option<&Segment>, difficulty: f32) -> Segment {
        let Some(previous) = previous else {
            return self.starting_platform();
        };

        let (gap_lo, gap_hi) = self.gap_range(difficulty);
        let gap = self.rng.random_range(gap_lo..=gap_hi);

        let (width_lo, width_hi) = self.width_range(difficulty);
        let width = self.rng.random_range(width_lo..=width_hi);

        let (band_top, band_bottom) = bounds(self.config.min_height, self.config.max_height);
        let offset = if self.max_rise > 0.0 {
            self.rng.random_range(-self.max_rise..=self.max_rise)
        } else {
            0.0
        };
        let height = (previous.height + offset).clamp(band_top, band_bottom);

        let id = self.allocate_id();
        let start_x = previous.end_x() + gap;

        let gap_adjacent_threshold =
            gap_lo + (gap_hi - gap_lo) * self.config.gap_adjacent_fraction.clamp(0.0, 1.0);
        let kind = match self.roll_kind() {
            SegmentKind::Default if gap_hi > gap_lo && gap >= gap_adjacent_threshold => {
                SegmentKind::GapAdjacent
            }
            kind => kind,
        };

        let mut segment = Segment::new(id, start_x, width, height, kind);
        if kind == SegmentKind::Obstacle {
            segment.obstacle = Some(self.place_obstacle(&segment));
        }
        if kind.allows_items() && self.rng.random_bool(self.config.item_chance.clamp(0.0, 1.0) as f64)
        {
            let size = self.config.item_size.max(1.0);
            segment.items.push(Item {
                x: segment.center_x() - size * 0.5,
                y: height - self.config.item_lift - size * 0.5,
                width: size,
                height: size,
                collected: false,
            });
        }

        segment
    }

    fn starting_platform(&mut self) -> Segment {
        let id = self.allocate_id();
        Segment::new(
            id,
            self.config.start_x,
            self.config.start_width.max(MIN_WIDTH_FLOOR),
            self.config.start_height,
            SegmentKind::Default,
        )
    }

    /// One draw split into fixed probability bands.
    fn roll_kind(&mut self) -> SegmentKind {
        let roll: f32 = self.rng.random();
        let config = &self.config;

        let mut edge = config.hazard_chance.max(0.0);
        if roll < edge {
            return SegmentKind::Hazard;
        }
        edge += config.rare_chance.max(0.0);
        if roll < edge {
            return SegmentKind::RareBonus;
        }
        edge += config.bonus_chance.max(0.0);
        if roll < edge {
            return SegmentKind::Bonus;
        }
        edge += config.mystery_chance.max(0.0);
        if roll < edge {
            return SegmentKind::Mystery(self.roll_mystery());
        }
        edge += config.obstacle_chance.max(0.0);
        if roll < edge {
            return SegmentKind::Obstacle;
        }
        SegmentKind::Default
    }

    fn roll_mystery(&mut self) -> MysteryKind {
        let roll: f32 = self.rng.random();
        if roll < 0.5 {
            MysteryKind::Credit
        } else if roll < 0.8 {
            MysteryKind::SpeedBoost
        } else {
            MysteryKind::FakeSafe
        }
    }

    fn place_obstacle(&mut self, segment: &Segment) -> Obstacle {
        let center = segment.center_x();
        let top = segment.height;

        match self.rng.random_range(0..4u8) {
            0 => {
                let (width, height) = (30.0, 40.0);
                let along = self.rng.random_range(0.4..=0.7f32);
                Obstacle {
                    kind: ObstacleKind::Static,
                    x: segment.start_x + segment.width * along - width * 0.5,
                    y: top - height,
                    width,
                    height,
                }
            }
            1 => {
                let width = (segment.width * 0.5).min(120.0);
                let height = 30.0;
                Obstacle {
                    kind: ObstacleKind::LowCeiling,
                    x: center - width * 0.5,
                    y: top - self.config.ceiling_lift.max(self.player_height + height),
                    width,
                    height,
                }
            }
            2 => {
                let size = 30.0;
                let (lo, hi) = bounds(40.0, (segment.width * 0.3).clamp(40.0, 100.0));
                let amplitude = self.rng.random_range(lo..=hi);
                let speed = self.rng.random_range(1.0..=3.0f32);
                let phase = self.rng.random_range(0.0..TAU);
                let lift = self.rng.random_range(0.0..=40.0f32);
                Obstacle {
                    kind: ObstacleKind::Moving {
                        amplitude,
                        speed,
                        phase,
                    },
                    x: center - size * 0.5,
                    y: top - size - lift,
                    width: size,
                    height: size,
                }
            }
            _ => {
                let width = (segment.width * 0.4).min(80.0);
                let height = 16.0;
                let active_ms = self.rng.random_range(800.0..=1600.0f32);
                let inactive_ms = self.rng.random_range(800.0..=1400.0f32);
                let phase_ms = self.rng.random_range(0.0..(active_ms + inactive_ms));
                Obstacle {
                    kind: ObstacleKind::Pulsing {
                        active_ms,
                        inactive_ms,
                        phase_ms,
                    },
                    x: center - width * 0.5,
                    y: top - height,
                    width,
                    height,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn generator(seed: u64) -> TrackGenerator {
        TrackGenerator::seeded(seed, TrackConfig::default(), &MotionConfig::default())
    }

    #[test]
    fn test_first_segment_is_starting_platform() {
        let mut generator = generator(1);
        let config = generator.config().clone();
        let start = generator.next(None, 1.0);
        assert_eq!(start.start_x, config.start_x);
        assert_eq!(start.width, config.start_width);
        assert_eq!(start.height, config.start_height);
        assert_eq!(start.kind, SegmentKind::Default);
        assert!(start.obstacle.is_none());
    }

    #[test]
    fn test_same_seed_same_track() {
        let mut a = generator(42);
        let mut b = generator(42);
        let mut prev_a = a.next(None, 1.0);
        let mut prev_b = b.next(None, 1.0);
        for step in 0..200 {
            let difficulty = 1.0 + step as f32 * 0.01;
            prev_a = a.next(Some(&prev_a), difficulty);
            prev_b = b.next(Some(&prev_b), difficulty);
            assert_eq!(prev_a, prev_b);
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut generator = generator(3);
        let mut previous = generator.next(None, 1.0);
        for _ in 0..50 {
            let next = generator.next(Some(&previous), 1.5);
            assert!(next.id > previous.id);
            previous = next;
        }
    }

    #[test]
    fn test_obstacle_segments_carry_an_obstacle() {
        let mut generator = generator(9);
        let mut previous = generator.next(None, 1.0);
        let mut seen = 0;
        for _ in 0..500 {
            let next = generator.next(Some(&previous), 1.0);
            assert_eq!(next.kind == SegmentKind::Obstacle, next.obstacle.is_some());
            if next.kind == SegmentKind::Hazard {
                assert!(next.items.is_empty());
            }
            assert!(next.items.len() <= 1);
            seen += next.obstacle.is_some() as usize;
            previous = next;
        }
        assert!(seen > 0);
    }

    #[test]
    fn test_higher_difficulty_narrows_platforms() {
        let generator = generator(1);
        let (_, easy_hi) = generator.width_range(1.0);
        let (_, hard_hi) = generator.width_range(2.0);
        assert!(hard_hi < easy_hi);
        let (easy_gap, _) = generator.gap_range(1.0);
        let (hard_gap, _) = generator.gap_range(2.0);
        assert!(hard_gap > easy_gap);
    }

    #[test]
    fn test_unreachable_jump_height_stays_in_band() {
        let motion = MotionConfig {
            jump_force: -f32::MAX,
            ..Default::default()
        };
        assert!(motion.max_jump_height().is_infinite());

        let config = TrackConfig::default();
        let mut generator = TrackGenerator::seeded(11, config.clone(), &motion);
        let mut previous = generator.next(None, 1.0);
        for _ in 0..50 {
            let segment = generator.next(Some(&previous), 1.0);
            assert!(segment.height >= config.min_height && segment.height <= config.max_height);
            previous = segment;
        }
    }

    #[test]
    fn test_absurd_difficulty_is_clamped() {
        let mut generator = generator(5);
        let start = generator.next(None, 1.0);
        for difficulty in [f32::NAN, f32::INFINITY, -1.0e9, 1.0e30, 0.0] {
            let next = generator.next(Some(&start), difficulty);
            assert!(next.start_x > start.end_x());
            assert!(next.width.is_finite());
        }
    }

    proptest! {
        #[test]
        fn test_gap_positive_and_width_bounded(
            seed in any::<u64>(),
            difficulty in prop_oneof![0.0f32..10.0, 10.0f32..1.0e12],
            steps in 1usize..40,
        ) {
            let mut generator = generator(seed);
            let config = generator.config().clone();
            let mut previous = generator.next(None, 1.0);
            for _ in 0..steps {
                let next = generator.next(Some(&previous), difficulty);
                prop_assert!(next.start_x > previous.end_x());
                prop_assert!(next.width >= config.min_width);
                prop_assert!(next.width <= config.max_width);
                prop_assert!(next.height >= config.min_height);
                prop_assert!(next.height <= config.max_height);
                previous = next;
            }
        }
    }
}
