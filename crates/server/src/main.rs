mod config;
mod events;
mod peers;
mod server;

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use config::ServerConfig;
use hopline::GameRules;
use server::GameServer;

#[derive(Parser)]
#[command(name = "hopline-server")]
#[command(about = "Authoritative endless-runner server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = hopline::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = hopline::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 10, help = "Runners per session")]
    capacity: usize,

    #[arg(long, help = "World seed; random when omitted")]
    seed: Option<u64>,

    #[arg(long, default_value_t = 30, help = "Seconds without input before a player is dropped")]
    idle_timeout: u64,

    #[arg(long, default_value_t = 5, help = "Seconds between idle sweeps")]
    sweep_interval: u64,

    #[arg(long, help = "Trust client-reported positions")]
    accept_position_reports: bool,

    #[arg(long, help = "JSON file overriding gameplay tuning")]
    tuning: Option<PathBuf>,
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.bind, args.port),
        tick_rate: args.tick_rate,
        session_capacity: args.capacity,
        world_seed: args.seed.unwrap_or_else(clock_seed),
        idle_timeout: Duration::from_secs(args.idle_timeout),
        sweep_interval: Duration::from_secs(args.sweep_interval),
        accept_position_reports: args.accept_position_reports,
        tuning: args.tuning,
        ..Default::default()
    };
    let rules = GameRules::new(config.game_config()?);
    let world_seed = config.world_seed;

    let server = GameServer::bind(config, rules).await?;
    info!(
        "Server started on {} (world seed {})",
        server.local_addr()?,
        world_seed
    );

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Server shutting down");
    Ok(())
}
