mod protocol;

pub use protocol::{
    ClientMessage, ClientPacket, PacketError, PacketHeader, RunnerSnapshot, ServerMessage,
    ServerPacket, SessionSnapshot, TrackUpdate, DEFAULT_PORT, DEFAULT_TICK_RATE,
    MAX_DATAGRAM_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, TRACK_CHUNK_SEGMENTS,
};
