use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        let min = Vec2::new(x, y);
        Self {
            min,
            max: min + Vec2::new(width.max(0.0), height.max(0.0)),
        }
    }

    /// Touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_strict() {
        let a = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&Rect::from_xywh(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Rect::from_xywh(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Rect::from_xywh(0.0, 20.0, 10.0, 10.0)));
    }
}
