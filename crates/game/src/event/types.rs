use crate::net::{SessionSnapshot, TrackUpdate};
use crate::runner::EliminationCause;
use crate::session::{PlayerId, SessionId};

/// Outbound notification produced by the simulation for the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    SessionSnapshot(SessionSnapshot),
    /// Newly generated segments only.
    TrackUpdate(TrackUpdate),
    /// Every live segment, for one player who just joined.
    TrackSync {
        player_id: PlayerId,
        update: TrackUpdate,
    },
    RunnerEliminated {
        session_id: SessionId,
        player_id: PlayerId,
        cause: EliminationCause,
        final_score: i64,
    },
    SessionClosed {
        session_id: SessionId,
    },
}

impl GameEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::SessionSnapshot(snapshot) => snapshot.session_id,
            Self::TrackUpdate(update) => update.session_id,
            Self::TrackSync { update, .. } => update.session_id,
            Self::RunnerEliminated { session_id, .. } => *session_id,
            Self::SessionClosed { session_id } => *session_id,
        }
    }

    /// `None` for events addressed to the whole session.
    pub fn target_player(&self) -> Option<PlayerId> {
        match self {
            Self::TrackSync { player_id, .. } => Some(*player_id),
            _ => None,
        }
    }

    /// A newer snapshot replaces an older one; everything else must be delivered.
    pub fn is_superseded_by_next_tick(&self) -> bool {
        matches!(self, Self::SessionSnapshot(_))
    }
}
