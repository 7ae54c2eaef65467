use crate::error::{ConfigErrorKind, InfraError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ws_addr: String,            // e.g. "0.0.0.0:4001"
    pub world_file: PathBuf,        // YAML world definition
    pub data_dir: Option<PathBuf>,  // None keeps characters in memory only
    pub tick_ms: u64,               // cooldown tick interval
    pub max_inventory_slots: usize,
    pub dev_mode: bool,             // enables privileged commands such as /giveitem
    pub move_cooldown_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_addr: "0.0.0.0:4001".to_string(),
            world_file: PathBuf::from("data/world.yaml"),
            data_dir: Some(PathBuf::from("data/characters")),
            tick_ms: 100,
            max_inventory_slots: 20,
            dev_mode: false,
            move_cooldown_ms: 300,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InfraError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| InfraError::Config {
            path: path.to_path_buf(),
            source: ConfigErrorKind::Read(e),
        })?;
        let cfg: Self = toml::from_str(&data).map_err(|e| InfraError::Config {
            path: path.to_path_buf(),
            source: ConfigErrorKind::Parse(e),
        })?;
        cfg.validated()
    }

    pub fn from_env() -> Result<Self, InfraError> {
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, InfraError> {
        let d = Self::default();
        let cfg = Self {
            ws_addr: get("WS_ADDR").unwrap_or(d.ws_addr),
            world_file: get("WORLD_FILE").map(PathBuf::from).unwrap_or(d.world_file),
            data_dir: match get("DATA_DIR") {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(PathBuf::from(v)),
                None => d.data_dir,
            },
            tick_ms: parse_var(&get, "TICK_MS", d.tick_ms)?,
            max_inventory_slots: parse_var(&get, "MAX_INVENTORY_SLOTS", d.max_inventory_slots)?,
            dev_mode: parse_var(&get, "DEV_MODE", d.dev_mode)?,
            move_cooldown_ms: parse_var(&get, "MOVE_COOLDOWN_MS", d.move_cooldown_ms)?,
        };
        cfg.validated()
    }

    fn validated(self) -> Result<Self, InfraError> {
        if self.tick_ms == 0 {
            return Err(invalid("TICK_MS", "must be greater than 0"));
        }
        if self.max_inventory_slots == 0 {
            return Err(invalid("MAX_INVENTORY_SLOTS", "must be greater than 0"));
        }
        if self.ws_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid("WS_ADDR", &self.ws_addr));
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, InfraError> {
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: &str) -> InfraError {
    InfraError::Env(ConfigErrorKind::InvalidEnv(key.to_string(), value.to_string()))
}
