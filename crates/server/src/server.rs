use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::net::UdpSocket;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior, interval};

use hopline::{
    ClientMessage, GameEvent, GameRules, MAX_DATAGRAM_SIZE, ServerMessage, ServerPacket,
    SessionRegistry, TickScheduler,
};

use crate::config::ServerConfig;
use crate::events::BroadcastSink;
use crate::peers::Dispatcher;

/// Encodes each packet once and writes it without waiting on the socket.
struct Outbox {
    socket: Arc<UdpSocket>,
    sequence: AtomicU32,
}

impl Outbox {
    fn send(&self, addrs: &[SocketAddr], packet: ServerPacket) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let bytes = match ServerMessage::new(sequence, packet).serialize() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode packet: {}", e);
                return;
            }
        };
        for addr in addrs {
            match self.socket.try_send_to(&bytes, *addr) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    trace!("Send buffer full, dropped packet to {}", addr);
                }
                Err(e) => warn!("Send to {} failed: {}", addr, e),
            }
        }
    }
}

pub struct GameServer {
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl GameServer {
    pub async fn bind(config: ServerConfig, rules: GameRules) -> io::Result<Self> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        let registry = Arc::new(SessionRegistry::new(
            config.registry_config(),
            Arc::new(rules),
        ));
        let sink = BroadcastSink::new(config.event_backlog);

        Ok(Self {
            socket: Arc::new(socket),
            dispatcher: Arc::new(Dispatcher::new(registry, sink)),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs every server task until `shutdown` resolves or one of them fails.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        let outbox = Arc::new(Outbox {
            socket: Arc::clone(&self.socket),
            sequence: AtomicU32::new(0),
        });
        let events = self.dispatcher.sink().subscribe();
        let scheduler = TickScheduler::new(
            Arc::clone(self.dispatcher.registry()),
            self.config.tick_rate,
        );

        let mut receive = tokio::spawn(receive_loop(
            Arc::clone(&self.socket),
            Arc::clone(&self.dispatcher),
            Arc::clone(&outbox),
        ));
        let forward = tokio::spawn(forward_loop(
            events,
            Arc::clone(&self.dispatcher),
            Arc::clone(&outbox),
        ));
        let tick = tokio::spawn(tick_loop(scheduler, self.dispatcher.sink().clone()));
        let sweep = tokio::spawn(sweep_loop(
            Arc::clone(&self.dispatcher),
            self.config.sweep_interval,
        ));

        let result = tokio::select! {
            _ = shutdown => Ok(()),
            joined = &mut receive => match joined {
                Ok(result) => result,
                Err(e) => Err(io::Error::other(e)),
            },
        };

        receive.abort();
        forward.abort();
        tick.abort();
        sweep.abort();
        result
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    outbox: Arc<Outbox>,
) -> io::Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            // ICMP port-unreachable from a vanished client surfaces here on some platforms.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
            Err(e) => return Err(e),
        };

        let message = match ClientMessage::deserialize(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                trace!("Dropping {} byte datagram from {}: {}", len, addr, e);
                continue;
            }
        };

        if let Some(reply) = dispatcher.handle(addr, message.payload) {
            outbox.send(&[addr], reply);
        }
    }
}

async fn forward_loop(
    mut events: broadcast::Receiver<GameEvent>,
    dispatcher: Arc<Dispatcher>,
    outbox: Arc<Outbox>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(outbound) = dispatcher.route(event) {
                    for packet in outbound.packets {
                        outbox.send(&outbound.addrs, packet);
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Forwarder fell behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn tick_loop(mut scheduler: TickScheduler, sink: BroadcastSink) {
    let tick_rate = scheduler.timestep().tick_rate();
    let mut ticker = interval(Duration::from_secs_f32(scheduler.timestep().dt()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Tick loop started at {} Hz", tick_rate);
    let mut last = Instant::now();
    loop {
        ticker.tick().await;
        let now = Instant::now();
        scheduler.advance((now - last).as_secs_f32(), &sink);
        last = now;

        if scheduler.ticks() > 0 && scheduler.ticks() % (tick_rate as u64 * 30) == 0 {
            let registry = scheduler.registry();
            debug!(
                "Tick {}: {} sessions, {} players",
                scheduler.ticks(),
                registry.session_count(),
                registry.player_count()
            );
        }
    }
}

async fn sweep_loop(dispatcher: Arc<Dispatcher>, every: Duration) {
    let mut ticker = interval(every.max(Duration::from_millis(100)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let evicted = dispatcher.sweep();
        if evicted > 0 {
            debug!(
                "Sweep removed {} idle players, {} peers remain",
                evicted,
                dispatcher.peer_count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use hopline::{ClientPacket, SessionSnapshot};
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use super::*;

    async fn recv_packet(socket: &UdpSocket) -> ServerPacket {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("server reply timed out")
            .unwrap();
        ServerMessage::deserialize(&buf[..len]).unwrap().payload
    }

    async fn send_packet(socket: &UdpSocket, server: SocketAddr, sequence: u32, packet: ClientPacket) {
        let bytes = ClientMessage::new(sequence, packet).serialize().unwrap();
        socket.send_to(&bytes, server).await.unwrap();
    }

    #[tokio::test]
    async fn test_join_over_udp_gets_welcome_and_snapshots() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let server = GameServer::bind(config, GameRules::default()).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async {
            let _ = stop_rx.await;
        }));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        send_packet(&client, server_addr, 0, ClientPacket::Join).await;

        let mut welcomed = None;
        let mut snapshot: Option<SessionSnapshot> = None;
        for _ in 0..20 {
            match recv_packet(&client).await {
                ServerPacket::Welcome { player_id, .. } => welcomed = Some(player_id),
                ServerPacket::Snapshot(s) => snapshot = Some(s),
                _ => {}
            }
            if welcomed.is_some() && snapshot.is_some() {
                break;
            }
        }
        let player_id = welcomed.unwrap();
        assert!(snapshot.unwrap().runner(player_id).is_some());

        send_packet(&client, server_addr, 1, ClientPacket::Ping { timestamp: 5 }).await;
        let mut ponged = false;
        for _ in 0..20 {
            if recv_packet(&client).await == (ServerPacket::Pong { timestamp: 5 }) {
                ponged = true;
                break;
            }
        }
        assert!(ponged);

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }
}
