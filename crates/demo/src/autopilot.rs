use hopline::{InputEvent, LocalRun, ObstacleKind, Segment};

/// Frames of look-ahead used to decide when to leave a platform.
const LEAD_FRAMES: f32 = 6.0;
const HOLD_FRAMES: u32 = 9;
const DASH_EVERY: u64 = 240;

/// A naive player: jumps near platform edges and in front of obstacles, and
/// spends the air jump when falling with nothing underneath.
#[derive(Debug, Default)]
pub struct Autopilot {
    holding: Option<u32>,
    frames: u64,
}

fn under(segments: &[Segment], left: f32, right: f32) -> Option<&Segment> {
    segments.iter().find(|s| s.spans(left, right))
}

impl Autopilot {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn decide(&mut self, run: &LocalRun) -> Vec<InputEvent> {
        self.frames += 1;
        let mut events = Vec::new();
        let runner = run.runner();
        if !runner.alive {
            return events;
        }

        if let Some(held) = self.holding.as_mut() {
            *held += 1;
            if *held >= HOLD_FRAMES {
                self.holding = None;
                events.push(InputEvent::JumpUp);
            }
        }

        let segments = run.track().segments();
        let width = 24.0;
        let left = runner.position.x;
        let right = left + width;
        let lead = runner.velocity.x.max(1.0) * LEAD_FRAMES;

        if runner.grounded {
            let near_edge = under(segments, left, right)
                .is_some_and(|segment| segment.end_x() - right < lead);
            let obstacle_ahead = segments
                .iter()
                .filter_map(|s| s.obstacle.as_ref())
                .filter(|o| !matches!(o.kind, ObstacleKind::LowCeiling))
                .any(|o| o.x > right && o.x - right < lead * 2.0);
            if near_edge || obstacle_ahead {
                events.push(InputEvent::JumpDown);
                self.holding = Some(0);
            }
        } else if runner.velocity.y > 0.0
            && runner.can_double_jump
            && under(segments, left, right).is_none()
        {
            events.push(InputEvent::JumpDown);
            self.holding = Some(0);
        }

        if self.frames % DASH_EVERY == 0 {
            events.push(InputEvent::Dash);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hopline::GameRules;

    use super::*;

    #[test]
    fn test_stays_put_mid_platform() {
        let run = LocalRun::new(Arc::new(GameRules::default()), 1);
        let mut pilot = Autopilot::default();
        assert!(pilot.decide(&run).is_empty());
    }

    #[test]
    fn test_jump_is_released_after_hold() {
        let mut run = LocalRun::new(Arc::new(GameRules::default()), 1);
        let mut pilot = Autopilot {
            holding: Some(0),
            frames: 0,
        };
        run.input(InputEvent::JumpDown);
        let mut released = false;
        for _ in 0..HOLD_FRAMES {
            released |= pilot.decide(&run).contains(&InputEvent::JumpUp);
        }
        assert!(released);
    }
}
