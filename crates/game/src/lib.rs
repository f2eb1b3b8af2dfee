pub mod collision;
pub mod event;
pub mod input;
pub mod net;
pub mod rules;
pub mod runner;
pub mod session;
pub mod simulation;
pub mod track;

pub use collision::{CollisionResolver, Rect, ScoreEvent, ScoreKind, ScoreSource, ScoringConfig};
pub use event::{EventQueue, EventSink, GameEvent};
pub use input::{InputError, InputEvent, InputFlags, PositionReport};
pub use net::{
    ClientMessage, ClientPacket, DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_DATAGRAM_SIZE, PacketError,
    PacketHeader, RunnerSnapshot, ServerMessage, ServerPacket, SessionSnapshot, TRACK_CHUNK_SEGMENTS,
    TrackUpdate,
};
pub use rules::{GameConfig, GameRules, WorldConfig, derive_session_seed, time_factor};
pub use runner::{
    EliminationCause, Landing, MotionConfig, MotionSimulator, RunnerState, WORLD_UNITS_PER_METER,
};
pub use session::{
    JoinOutcome, LeaveOutcome, PlayerId, RegistryConfig, Session, SessionHandle, SessionId,
    SessionRegistry, SessionStatus,
};
pub use simulation::{FixedTimestep, FrameReport, LocalRun, StepReport, TickScheduler, TickStats};
pub use track::{
    Item, MysteryKind, Obstacle, ObstacleKind, Segment, SegmentId, SegmentKind, Track,
    TrackConfig, TrackGenerator,
};
