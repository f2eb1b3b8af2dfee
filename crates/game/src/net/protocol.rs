use rkyv::util::AlignedVec;
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::input::PositionReport;
use crate::runner::{EliminationCause, RunnerState};
use crate::session::{PlayerId, SessionId, SessionStatus};
use crate::track::Segment;

pub const MAX_DATAGRAM_SIZE: usize = 16 * 1024;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x484F_504C;
pub const DEFAULT_PORT: u16 = 27110;
pub const DEFAULT_TICK_RATE: u32 = 30;
/// Segments per track packet; keeps the worst-case encoding well under a datagram.
pub const TRACK_CHUNK_SEGMENTS: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct RunnerSnapshot {
    pub player_id: PlayerId,
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub grounded: bool,
    pub jumping: bool,
    pub jump_count: u8,
    pub dashing: bool,
    pub combo_count: u32,
    pub distance_score: i64,
    pub bonus_score: i64,
    pub total_score: i64,
    pub alive: bool,
    pub elimination: Option<EliminationCause>,
}

impl RunnerSnapshot {
    pub fn capture(player_id: PlayerId, runner: &RunnerState) -> Self {
        Self {
            player_id,
            position: runner.position.to_array(),
            velocity: runner.velocity.to_array(),
            grounded: runner.grounded,
            jumping: runner.jumping,
            jump_count: runner.jump_count,
            dashing: runner.dashing,
            combo_count: runner.combo_count,
            distance_score: runner.distance_score(),
            bonus_score: runner.bonus_score,
            total_score: runner.total_score(),
            alive: runner.alive,
            elimination: runner.elimination,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub tick: u64,
    pub status: SessionStatus,
    pub elapsed_ms: f64,
    pub runners: Vec<RunnerSnapshot>,
}

impl SessionSnapshot {
    pub fn runner(&self, player_id: PlayerId) -> Option<&RunnerSnapshot> {
        self.runners.iter().find(|r| r.player_id == player_id)
    }

}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct TrackUpdate {
    pub session_id: SessionId,
    pub segments: Vec<Segment>,
}

impl TrackUpdate {
    /// Splits into updates of at most `TRACK_CHUNK_SEGMENTS` segments, in order.
    pub fn into_chunks(self) -> Vec<TrackUpdate> {
        if self.segments.len() <= TRACK_CHUNK_SEGMENTS {
            return vec![self];
        }
        let session_id = self.session_id;
        self.segments
            .chunks(TRACK_CHUNK_SEGMENTS)
            .map(|segments| TrackUpdate {
                session_id,
                segments: segments.to_vec(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ClientPacket {
    Join,
    Leave,
    Input { flags: u8 },
    PositionReport(PositionReport),
    Ping { timestamp: u64 },
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ServerPacket {
    Welcome {
        player_id: PlayerId,
        session_id: SessionId,
    },
    Snapshot(SessionSnapshot),
    Track(TrackUpdate),
    Eliminated {
        player_id: PlayerId,
        cause: EliminationCause,
        final_score: i64,
    },
    Pong {
        timestamp: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("bad packet header")]
    InvalidHeader,
    #[error("packet of {0} bytes exceeds the datagram limit")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ClientMessage {
    pub header: PacketHeader,
    pub payload: ClientPacket,
}

impl ClientMessage {
    pub fn new(sequence: u32, payload: ClientPacket) -> Self {
        Self {
            header: PacketHeader::new(sequence),
            payload,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)?;
        check_size(bytes)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        let aligned = aligned_copy(data);
        let message =
            rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(PacketError::Deserialize)?;
        if !message.header.is_valid() {
            return Err(PacketError::InvalidHeader);
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ServerMessage {
    pub header: PacketHeader,
    pub payload: ServerPacket,
}

impl ServerMessage {
    pub fn new(sequence: u32, payload: ServerPacket) -> Self {
        Self {
            header: PacketHeader::new(sequence),
            payload,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)?;
        check_size(bytes)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        let aligned = aligned_copy(data);
        let message =
            rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(PacketError::Deserialize)?;
        if !message.header.is_valid() {
            return Err(PacketError::InvalidHeader);
        }
        Ok(message)
    }
}

/// Datagram buffers carry no alignment guarantee; archived access needs one.
fn aligned_copy(data: &[u8]) -> AlignedVec {
    let mut aligned = AlignedVec::with_capacity(data.len());
    aligned.extend_from_slice(data);
    aligned
}

fn check_size(bytes: Vec<u8>) -> Result<Vec<u8>, PacketError> {
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(PacketError::TooLarge(bytes.len()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{Item, Obstacle, ObstacleKind, SegmentKind};

    #[test]
    fn test_client_input_survives_the_wire() {
        let message = ClientMessage::new(3, ClientPacket::Input { flags: 0b101 });
        let bytes = message.serialize().unwrap();
        assert_eq!(ClientMessage::deserialize(&bytes).unwrap(), message);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ClientMessage::deserialize(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(ClientMessage::deserialize(&[]).is_err());
    }

    #[test]
    fn test_foreign_header_is_rejected() {
        let mut message = ClientMessage::new(0, ClientPacket::Join);
        message.header.magic = 0;
        let bytes = message.serialize().unwrap();
        assert!(matches!(
            ClientMessage::deserialize(&bytes),
            Err(PacketError::InvalidHeader)
        ));
    }

    #[test]
    fn test_track_update_carries_segments() {
        let segments = (0..12)
            .map(|i| Segment::new(i, i as f32 * 300.0, 200.0, 600.0, SegmentKind::Bonus))
            .collect();
        let message = ServerMessage::new(
            1,
            ServerPacket::Track(TrackUpdate {
                session_id: 4,
                segments,
            }),
        );
        let bytes = message.serialize().unwrap();
        assert_eq!(ServerMessage::deserialize(&bytes).unwrap(), message);
    }

    #[test]
    fn test_long_track_update_splits_into_datagrams() {
        let segments: Vec<Segment> = (0..300)
            .map(|i| {
                let mut segment =
                    Segment::new(i, i as f32 * 300.0, 200.0, 600.0, SegmentKind::Obstacle);
                segment.obstacle = Some(Obstacle {
                    kind: ObstacleKind::Pulsing {
                        active_ms: 900.0,
                        inactive_ms: 600.0,
                        phase_ms: 120.0,
                    },
                    x: segment.center_x(),
                    y: 560.0,
                    width: 30.0,
                    height: 40.0,
                });
                segment.items.push(Item {
                    x: segment.center_x(),
                    y: 540.0,
                    width: 20.0,
                    height: 20.0,
                    collected: false,
                });
                segment
            })
            .collect();

        let whole = ServerMessage::new(
            0,
            ServerPacket::Track(TrackUpdate {
                session_id: 2,
                segments: segments.clone(),
            }),
        );
        assert!(matches!(whole.serialize(), Err(PacketError::TooLarge(_))));

        let chunks = TrackUpdate {
            session_id: 2,
            segments: segments.clone(),
        }
        .into_chunks();
        assert_eq!(chunks.len(), 300usize.div_ceil(TRACK_CHUNK_SEGMENTS));

        let mut received = Vec::new();
        for chunk in chunks {
            assert_eq!(chunk.session_id, 2);
            let bytes = ServerMessage::new(1, ServerPacket::Track(chunk))
                .serialize()
                .unwrap();
            match ServerMessage::deserialize(&bytes).unwrap().payload {
                ServerPacket::Track(update) => received.extend(update.segments),
                other => panic!("unexpected packet {other:?}"),
            }
        }
        assert_eq!(received, segments);
    }

    #[test]
    fn test_short_track_update_stays_whole() {
        let update = TrackUpdate {
            session_id: 1,
            segments: vec![Segment::new(0, 0.0, 800.0, 600.0, SegmentKind::Default)],
        };
        assert_eq!(update.clone().into_chunks(), vec![update]);
    }
}
