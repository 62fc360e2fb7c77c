use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub breaker: BreakerSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String, // e.g., "0.0.0.0"
    #[serde(default = "default_port")]
    pub port: u16,
}
fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), port: default_port() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_decrement_duration_ms")]
    pub decrement_duration_ms: u64,
    #[serde(default = "default_upper_threshold")]
    pub upper_threshold: usize,
    #[serde(default = "default_cooloff_duration_ms")]
    pub cooloff_duration_ms: u64,
    #[serde(default)]
    pub trip_threshold: usize, // 0 => never cap
}
fn default_name() -> String { "demo".to_string() }
fn default_decrement_duration_ms() -> u64 { 1_000 }
fn default_upper_threshold() -> usize { 5 }
fn default_cooloff_duration_ms() -> u64 { 5_000 }

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            decrement_duration_ms: default_decrement_duration_ms(),
            upper_threshold: default_upper_threshold(),
            cooloff_duration_ms: default_cooloff_duration_ms(),
            trip_threshold: 0,
        }
    }
}

impl BreakerSettings {
    pub fn to_config(&self) -> load_breaker::Config {
        load_breaker::Config {
            decrement_duration: Duration::from_millis(self.decrement_duration_ms),
            upper_threshold: self.upper_threshold,
            cooloff_duration: Duration::from_millis(self.cooloff_duration_ms),
            trip_threshold: self.trip_threshold,
        }
    }
}

impl DemoConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let cfg: Self = serde_yaml::from_str(&content)?;
        Ok(cfg)
    }

    /// Load from `LB_CONFIG_PATH`, or from `config.yaml` when present,
    /// then apply environment overrides and validate.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var("LB_CONFIG_PATH") {
            Ok(path) => Self::load_from_path(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))?
            }
            Err(_) => Self::default(),
        };
        apply_env_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.breaker.upper_threshold == 0 {
            bail!("breaker.upper_threshold must be greater than 0");
        }
        if self.breaker.name.trim().is_empty() {
            bail!("breaker.name must not be empty");
        }
        Ok(())
    }
}

pub fn apply_env_overrides(cfg: &mut DemoConfig) {
    apply_overrides(cfg, |key| env::var(key).ok());
}

pub fn apply_overrides(cfg: &mut DemoConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(addr) = lookup("LB_HTTP_ADDR") { cfg.server.bind_addr = addr; }
    if let Some(port) = lookup("LB_HTTP_PORT") {
        if let Ok(p) = port.parse::<u16>() { cfg.server.port = p; }
    }
    if let Some(n) = lookup("LB_UPPER_THRESHOLD") {
        if let Ok(v) = n.parse::<usize>() { cfg.breaker.upper_threshold = v; }
    }
    if let Some(ms) = lookup("LB_DECREMENT_MS") {
        if let Ok(v) = ms.parse::<u64>() { cfg.breaker.decrement_duration_ms = v; }
    }
    if let Some(ms) = lookup("LB_COOLOFF_MS") {
        if let Ok(v) = ms.parse::<u64>() { cfg.breaker.cooloff_duration_ms = v; }
    }
    if let Some(n) = lookup("LB_TRIP_THRESHOLD") {
        if let Ok(v) = n.parse::<usize>() { cfg.breaker.trip_threshold = v; }
    }
}
