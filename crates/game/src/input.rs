use bitflags::bitflags;
use rkyv::{Archive, Deserialize, Serialize};

use crate::session::PlayerId;

const MAX_REPORTED_COORDINATE: f32 = 1.0e7;
const MAX_REPORTED_SPEED: f32 = 1.0e3;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputFlags: u8 {
        const JUMP_DOWN = 1 << 0;
        const JUMP_UP = 1 << 1;
        const DASH = 1 << 2;
    }
}

impl InputFlags {
    /// `None` when the raw value carries bits this build does not know.
    pub fn decode(raw: u8) -> Option<Self> {
        Self::from_bits(raw)
    }

    /// Press before release, so a tap inside one packet still jumps.
    pub fn events(self) -> impl Iterator<Item = InputEvent> {
        [
            (Self::JUMP_DOWN, InputEvent::JumpDown),
            (Self::JUMP_UP, InputEvent::JumpUp),
            (Self::DASH, InputEvent::Dash),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, event)| event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PositionReport {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub grounded: bool,
}

impl PositionReport {
    pub fn validate(&self) -> Result<(), InputError> {
        let coordinates = [self.x, self.y];
        let speeds = [self.vx, self.vy];
        if coordinates.iter().chain(&speeds).any(|v| !v.is_finite()) {
            return Err(InputError::Malformed("non-finite position report"));
        }
        if coordinates.iter().any(|v| v.abs() > MAX_REPORTED_COORDINATE) {
            return Err(InputError::Malformed("position out of range"));
        }
        if speeds.iter().any(|v| v.abs() > MAX_REPORTED_SPEED) {
            return Err(InputError::Malformed("velocity out of range"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    JumpDown,
    JumpUp,
    Dash,
    PositionReport(PositionReport),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("player {0} is not in a session")]
    UnknownPlayer(PlayerId),
    #[error("runner of player {0} has been eliminated")]
    Eliminated(PlayerId),
    #[error("position reports are not accepted")]
    PositionReportsDisabled,
    #[error("malformed input: {0}")]
    Malformed(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_bits_are_rejected() {
        assert_eq!(InputFlags::decode(0b0000_0101), Some(InputFlags::JUMP_DOWN | InputFlags::DASH));
        assert_eq!(InputFlags::decode(0b1000_0000), None);
    }

    #[test]
    fn test_tap_yields_press_then_release() {
        let events: Vec<_> = (InputFlags::JUMP_UP | InputFlags::JUMP_DOWN).events().collect();
        assert_eq!(events, vec![InputEvent::JumpDown, InputEvent::JumpUp]);
    }

    #[test]
    fn test_position_report_validation() {
        let good = PositionReport {
            x: 10.0,
            y: 500.0,
            vx: 6.0,
            vy: -3.0,
            grounded: false,
        };
        assert!(good.validate().is_ok());
        assert!(PositionReport { x: f32::NAN, ..good }.validate().is_err());
        assert!(PositionReport { vy: 1.0e6, ..good }.validate().is_err());
        assert!(PositionReport { y: -1.0e9, ..good }.validate().is_err());
    }
}
