use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, trace};

use hopline::{
    ClientPacket, GameEvent, InputEvent, InputFlags, PlayerId, ServerPacket, SessionId,
    SessionRegistry, TrackUpdate,
};

use crate::events::{BroadcastSink, DisconnectReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    pub player_id: PlayerId,
    pub session_id: Option<SessionId>,
}

/// Maps datagram source addresses to players.
#[derive(Debug)]
pub struct PeerTable {
    by_addr: HashMap<SocketAddr, PlayerId>,
    peers: HashMap<PlayerId, Peer>,
    next_player_id: PlayerId,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self {
            by_addr: HashMap::new(),
            peers: HashMap::new(),
            next_player_id: 1,
        }
    }
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, addr: &SocketAddr) -> Option<PlayerId> {
        self.by_addr.get(addr).copied()
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Peer> {
        self.peers.get(&player_id)
    }

    /// Existing player for `addr`, or a freshly numbered one.
    pub fn register(&mut self, addr: SocketAddr) -> PlayerId {
        if let Some(player_id) = self.player(&addr) {
            return player_id;
        }
        let player_id = self.next_player_id;
        self.next_player_id = self.next_player_id.wrapping_add(1).max(1);
        self.by_addr.insert(addr, player_id);
        self.peers.insert(
            player_id,
            Peer {
                addr,
                player_id,
                session_id: None,
            },
        );
        player_id
    }

    pub fn set_session(&mut self, player_id: PlayerId, session_id: SessionId) {
        if let Some(peer) = self.peers.get_mut(&player_id) {
            peer.session_id = Some(session_id);
        }
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<Peer> {
        let peer = self.peers.remove(&player_id)?;
        self.by_addr.remove(&peer.addr);
        Some(peer)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Peer) -> bool) -> Vec<Peer> {
        let dropped: Vec<Peer> = self.peers.values().filter(|p| !keep(p)).copied().collect();
        for peer in &dropped {
            self.remove(peer.player_id);
        }
        dropped
    }

    pub fn session_addrs(&self, session_id: SessionId) -> Vec<SocketAddr> {
        self.peers
            .values()
            .filter(|p| p.session_id == Some(session_id))
            .map(|p| p.addr)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }
}

/// Packets for every address in `addrs`, sent in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub addrs: Vec<SocketAddr>,
    pub packets: Vec<ServerPacket>,
}

/// Transport-independent half of the server: turns client packets into
/// registry calls and simulation events into addressed packets.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    peers: Mutex<PeerTable>,
    sink: BroadcastSink,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, sink: BroadcastSink) -> Self {
        Self {
            registry,
            peers: Mutex::new(PeerTable::new()),
            sink,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn sink(&self) -> &BroadcastSink {
        &self.sink
    }

    fn peers(&self) -> MutexGuard<'_, PeerTable> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn peer_count(&self) -> usize {
        self.peers().len()
    }

    /// Applies one client packet. Returns the direct reply, if any.
    pub fn handle(&self, addr: SocketAddr, packet: ClientPacket) -> Option<ServerPacket> {
        match packet {
            ClientPacket::Join => {
                // Held across the join so the forwarder sees the session mapping
                // before it routes the join snapshot.
                let mut peers = self.peers();
                let player_id = peers.register(addr);
                let outcome = self.registry.join(player_id, &self.sink);
                peers.set_session(player_id, outcome.session_id);
                if outcome.created {
                    info!("{} joined as player {}", addr, player_id);
                }
                Some(ServerPacket::Welcome {
                    player_id,
                    session_id: outcome.session_id,
                })
            }
            ClientPacket::Leave => {
                let peer = {
                    let mut peers = self.peers();
                    let player_id = peers.player(&addr)?;
                    peers.remove(player_id)?
                };
                self.disconnect(peer, DisconnectReason::Graceful);
                None
            }
            ClientPacket::Input { flags } => {
                let player_id = self.known(addr)?;
                let Some(flags) = InputFlags::decode(flags) else {
                    trace!("Dropping input with unknown bits {:#04x} from {}", flags, addr);
                    return None;
                };
                for event in flags.events() {
                    self.apply(player_id, event);
                }
                None
            }
            ClientPacket::PositionReport(report) => {
                let player_id = self.known(addr)?;
                self.apply(player_id, InputEvent::PositionReport(report));
                None
            }
            ClientPacket::Ping { timestamp } => Some(ServerPacket::Pong { timestamp }),
        }
    }

    fn known(&self, addr: SocketAddr) -> Option<PlayerId> {
        let player_id = self.peers().player(&addr);
        if player_id.is_none() {
            trace!("Dropping packet from unknown peer {}", addr);
        }
        player_id
    }

    fn apply(&self, player_id: PlayerId, event: InputEvent) {
        if let Err(e) = self.registry.apply_input(player_id, event) {
            trace!("Dropped {:?} from player {}: {}", event, player_id, e);
        }
    }

    fn disconnect(&self, peer: Peer, reason: DisconnectReason) {
        self.registry.leave(peer.player_id, &self.sink);
        info!(
            "Player {} ({}) {}",
            peer.player_id,
            peer.addr,
            reason.as_str()
        );
    }

    /// Times out idle players, then forgets peers the registry no longer seats.
    pub fn sweep(&self) -> usize {
        let evicted = self.registry.sweep_idle(&self.sink);
        let dropped = self
            .peers()
            .retain(|peer| self.registry.player_session(peer.player_id).is_some());
        for peer in &dropped {
            info!(
                "Player {} ({}) {}",
                peer.player_id,
                peer.addr,
                DisconnectReason::Timeout.as_str()
            );
        }
        evicted
    }

    /// Addresses a simulation event to the peers that should receive it.
    pub fn route(&self, event: GameEvent) -> Option<Outbound> {
        let peers = self.peers();
        let (addrs, packets) = match event {
            GameEvent::SessionSnapshot(snapshot) => (
                peers.session_addrs(snapshot.session_id),
                vec![ServerPacket::Snapshot(snapshot)],
            ),
            GameEvent::TrackUpdate(update) => (
                peers.session_addrs(update.session_id),
                track_packets(update),
            ),
            GameEvent::TrackSync { player_id, update } => (
                peers.get(player_id).map(|p| p.addr).into_iter().collect(),
                track_packets(update),
            ),
            GameEvent::RunnerEliminated {
                session_id,
                player_id,
                cause,
                final_score,
            } => (
                peers.session_addrs(session_id),
                vec![ServerPacket::Eliminated {
                    player_id,
                    cause,
                    final_score,
                }],
            ),
            GameEvent::SessionClosed { .. } => return None,
        };
        (!addrs.is_empty()).then_some(Outbound { addrs, packets })
    }
}

fn track_packets(update: TrackUpdate) -> Vec<ServerPacket> {
    update
        .into_chunks()
        .into_iter()
        .map(ServerPacket::Track)
        .collect()
}

#[cfg(test)]
mod tests {
    use hopline::{
        EventSink, GameRules, RegistryConfig, Segment, SegmentKind, ServerMessage,
        TRACK_CHUNK_SEGMENTS,
    };

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn dispatcher(capacity: usize) -> Dispatcher {
        let registry = Arc::new(SessionRegistry::new(
            RegistryConfig {
                capacity,
                ..Default::default()
            },
            Arc::new(GameRules::default()),
        ));
        Dispatcher::new(registry, BroadcastSink::new(64))
    }

    #[test]
    fn test_peer_table_reuses_ids_per_addr() {
        let mut table = PeerTable::new();
        let a = table.register(addr(1000));
        assert_eq!(table.register(addr(1000)), a);
        let b = table.register(addr(1001));
        assert_ne!(a, b);

        assert!(table.remove(a).is_some());
        assert!(table.remove(a).is_none());
        assert_eq!(table.player(&addr(1000)), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_join_replies_welcome_and_routes_track_sync() {
        let dispatcher = dispatcher(4);
        let mut rx = dispatcher.sink().subscribe();

        let reply = dispatcher.handle(addr(2000), ClientPacket::Join);
        let Some(ServerPacket::Welcome { player_id, session_id }) = reply else {
            panic!("expected welcome, got {reply:?}");
        };

        let snapshot = dispatcher.route(rx.try_recv().unwrap()).unwrap();
        assert_eq!(snapshot.addrs, vec![addr(2000)]);
        assert!(matches!(snapshot.packets[..], [ServerPacket::Snapshot(ref s)] if s.session_id == session_id));

        let sync = dispatcher.route(rx.try_recv().unwrap()).unwrap();
        assert_eq!(sync.addrs, vec![addr(2000)]);
        assert!(matches!(sync.packets[..], [ServerPacket::Track(_)]));
        assert_eq!(dispatcher.registry().player_session(player_id), Some(session_id));
    }

    #[test]
    fn test_input_from_unknown_peer_is_dropped() {
        let dispatcher = dispatcher(4);
        assert_eq!(
            dispatcher.handle(addr(3000), ClientPacket::Input { flags: 1 }),
            None
        );
        assert_eq!(dispatcher.peer_count(), 0);
    }

    #[test]
    fn test_unknown_flag_bits_do_not_move_runner() {
        let dispatcher = dispatcher(4);
        dispatcher.handle(addr(3001), ClientPacket::Join);
        dispatcher.handle(addr(3001), ClientPacket::Input { flags: 0xff });

        let handle = dispatcher.registry().session(1).unwrap();
        let session = handle.lock().unwrap();
        assert!(session.participant(1).unwrap().runner.grounded);
    }

    #[test]
    fn test_leave_twice_is_harmless() {
        let dispatcher = dispatcher(4);
        dispatcher.handle(addr(4000), ClientPacket::Join);
        assert_eq!(dispatcher.handle(addr(4000), ClientPacket::Leave), None);
        assert_eq!(dispatcher.handle(addr(4000), ClientPacket::Leave), None);
        assert_eq!(dispatcher.peer_count(), 0);
        assert_eq!(dispatcher.registry().session_count(), 0);
    }

    #[test]
    fn test_ping_is_answered() {
        let dispatcher = dispatcher(4);
        assert_eq!(
            dispatcher.handle(addr(5000), ClientPacket::Ping { timestamp: 77 }),
            Some(ServerPacket::Pong { timestamp: 77 })
        );
    }

    #[test]
    fn test_snapshots_reach_only_their_session() {
        let dispatcher = dispatcher(1);
        dispatcher.handle(addr(6000), ClientPacket::Join);
        dispatcher.handle(addr(6001), ClientPacket::Join);
        let mut rx = dispatcher.sink().subscribe();

        let handle = dispatcher.registry().session(2).unwrap();
        let snapshot = handle.lock().unwrap().snapshot();
        dispatcher.sink().publish(GameEvent::SessionSnapshot(snapshot));

        let outbound = dispatcher.route(rx.try_recv().unwrap()).unwrap();
        assert_eq!(outbound.addrs, vec![addr(6001)]);
    }

    #[test]
    fn test_long_track_update_goes_out_in_several_packets() {
        let dispatcher = dispatcher(4);
        dispatcher.handle(addr(7000), ClientPacket::Join);

        let segments: Vec<Segment> = (0..300)
            .map(|i| Segment::new(i, i as f32 * 250.0, 200.0, 600.0, SegmentKind::Default))
            .collect();
        let outbound = dispatcher
            .route(GameEvent::TrackUpdate(TrackUpdate {
                session_id: 1,
                segments: segments.clone(),
            }))
            .unwrap();

        assert_eq!(outbound.addrs, vec![addr(7000)]);
        assert!(outbound.packets.len() > 1);
        let mut received = Vec::new();
        for packet in outbound.packets {
            let ServerPacket::Track(update) = packet else {
                panic!("expected track packet, got {packet:?}");
            };
            assert!(update.segments.len() <= TRACK_CHUNK_SEGMENTS);
            assert!(ServerMessage::new(0, ServerPacket::Track(update.clone())).serialize().is_ok());
            received.extend(update.segments);
        }
        assert_eq!(received, segments);
    }
}
