use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use hopline::{DEFAULT_PORT, DEFAULT_TICK_RATE, GameConfig, RegistryConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    pub session_capacity: usize,
    pub world_seed: u64,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    pub accept_position_reports: bool,
    /// Events buffered per forwarder before it starts skipping.
    pub event_backlog: usize,
    pub tuning: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            tick_rate: DEFAULT_TICK_RATE,
            session_capacity: 10,
            world_seed: 0,
            idle_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            accept_position_reports: false,
            event_backlog: 1024,
            tuning: None,
        }
    }
}

impl ServerConfig {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            capacity: self.session_capacity,
            world_seed: self.world_seed,
            idle_timeout_ms: self.idle_timeout.as_secs_f64() * 1000.0,
            accept_position_reports: self.accept_position_reports,
        }
    }

    /// Built-in tuning, overridden field by field by the JSON file when one is given.
    pub fn game_config(&self) -> Result<GameConfig> {
        let Some(path) = &self.tuning else {
            return Ok(GameConfig::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading tuning file {}", path.display()))?;
        parse_tuning(&text).with_context(|| format!("parsing tuning file {}", path.display()))
    }
}

pub fn parse_tuning(text: &str) -> Result<GameConfig> {
    Ok(serde_json::from_str(text)?)
}
