mod config;
mod generator;
mod segment;

pub use config::TrackConfig;
pub use generator::TrackGenerator;
pub use segment::{Item, MysteryKind, Obstacle, ObstacleKind, Segment, SegmentId, SegmentKind};

use rand::Rng;
use rand_pcg::Pcg32;

/// A generator and the live window of segments it produced, sorted by `start_x`.
pub struct Track<R = Pcg32> {
    generator: TrackGenerator<R>,
    segments: Vec<Segment>,
}

impl<R: Rng> Track<R> {
    pub fn new(mut generator: TrackGenerator<R>) -> Self {
        let start = generator.next(None, 1.0);
        Self {
            generator,
            segments: vec![start],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    /// Right edge of the furthest generated segment.
    pub fn frontier(&self) -> f32 {
        self.segments.last().map(Segment::end_x).unwrap_or(f32::MIN)
    }

    /// Generates until the frontier lies beyond `target_x` and returns only the new segments.
    pub fn extend_to(&mut self, target_x: f32, difficulty: f32) -> Vec<Segment> {
        let mut created = Vec::new();
        if !target_x.is_finite() {
            return created;
        }

        while self.frontier() <= target_x {
            let segment = self.generator.next(self.segments.last(), difficulty);
            created.push(segment.clone());
            self.segments.push(segment);
        }
        created
    }

    /// Drops segments that end before `x`. Returns how many were removed.
    pub fn prune_behind(&mut self, x: f32) -> usize {
        let keep_from = self.segments.partition_point(|s| s.end_x() < x);
        // Always keep the frontier segment so generation can continue from it.
        let keep_from = keep_from.min(self.segments.len().saturating_sub(1));
        self.segments.drain(..keep_from).count()
    }
}
