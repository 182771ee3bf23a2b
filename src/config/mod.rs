use crate::sensor::{default_sensor_configs, SensorConfig, SimulatorConfig};
use crate::store::{FileStore, KvStore, MemoryStore, SqliteStore};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Config file used when `AGRIGROW_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "agrigrow.toml";

/// Complete Agrigrow configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgrigrowConfig {
    #[serde(default)]
    pub simulator: SimulatorSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Sensor simulation
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSettings {
    /// Shortest tick period per sensor (milliseconds)
    #[serde(default = "default_min_period_ms")]
    pub min_period_ms: u64,
    #[serde(default = "default_max_period_ms")]
    pub max_period_ms: u64,
    /// Pending tick requests before timers start dropping ticks
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_sensor_configs")]
    pub sensors: Vec<SensorConfig>,
}

fn default_min_period_ms() -> u64 {
    5_000
}

fn default_max_period_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            min_period_ms: default_min_period_ms(),
            max_period_ms: default_max_period_ms(),
            channel_capacity: default_channel_capacity(),
            sensors: default_sensor_configs(),
        }
    }
}

impl SimulatorSettings {
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            min_period: Duration::from_millis(self.min_period_ms),
            max_period: Duration::from_millis(self.max_period_ms),
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// One gzip file per record under `path`
    File,
    /// Nothing persists across restarts
    Memory,
}

/// Offline persistence medium
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database file (sqlite) or directory (file)
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("agrigrow.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

impl StorageConfig {
    /// Open the configured medium
    pub fn open(&self) -> Result<Arc<dyn KvStore>> {
        let medium: Arc<dyn KvStore> = match self.backend {
            StorageBackend::Sqlite => Arc::new(SqliteStore::new(&self.path)?),
            StorageBackend::File => Arc::new(FileStore::new(&self.path)?),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        info!(backend = ?self.backend, path = %self.path.display(), "Opened offline storage");
        Ok(medium)
    }
}

/// Background sync and snapshot folding
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,
    /// How often to drain the mutation queue (seconds)
    #[serde(default = "default_sync_interval")]
    pub interval_seconds: u64,
    /// Per-mutation limit for the remote to answer (milliseconds)
    #[serde(default = "default_apply_timeout_ms")]
    pub apply_timeout_ms: u64,
    /// How often to save the offline snapshot (seconds)
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_seconds: u64,
    /// Alerts kept in memory and in the snapshot; the oldest go first
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
}

fn default_sync_enabled() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    30
}

fn default_apply_timeout_ms() -> u64 {
    5_000
}

fn default_snapshot_interval() -> u64 {
    60
}

fn default_max_alerts() -> usize {
    crate::store::DEFAULT_MAX_ALERTS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            interval_seconds: default_sync_interval(),
            apply_timeout_ms: default_apply_timeout_ms(),
            snapshot_interval_seconds: default_snapshot_interval(),
            max_alerts: default_max_alerts(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_seconds.max(1))
    }
}

/// HTTP API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Growth stage used when a fertilizer request names none
    #[serde(default = "default_crop_stage")]
    pub crop_stage: String,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_crop_stage() -> String {
    "vegetative".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            crop_stage: default_crop_stage(),
        }
    }
}

impl AgrigrowConfig {
    /// Load from `AGRIGROW_CONFIG` (or `agrigrow.toml`), then apply env
    /// overrides. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("AGRIGROW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        let mut config = if Path::new(&path).exists() {
            info!(path = %path, "Loading configuration");
            load_config(&path)?
        } else {
            info!(path = %path, "No configuration file, using defaults");
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Override fields from `AGRIGROW_BIND` and `AGRIGROW_STORAGE_PATH`
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("AGRIGROW_BIND") {
            self.api.bind = bind;
        }
        if let Some(path) = lookup("AGRIGROW_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
    }
}

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AgrigrowConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AgrigrowConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
