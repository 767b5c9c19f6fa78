//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKROOM_SYNC_INTERVAL_MS=15000                                   │
//! │     STOCKROOM_CONFLICT_POLICY=remote                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/sync/sync.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.stockroom.sync/sync.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     30s interval, batches of 10, manual conflict resolution            │
//! │                                                                         │
//! │  Runtime: SyncEngine::update_sync_config(SyncConfigUpdate)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [sync]
//! auto_sync_enabled = true
//! sync_interval_ms = 30000
//! debounce_ms = 1000
//! batch_size = 10
//! max_retries = 3
//! conflict_policy = "manual"  # manual | local | remote
//!
//! [queue]
//! max_size = 100
//! retry_attempts = 3
//!
//! [retention]
//! completed_history = 50
//! conflict_retention_days = 7
//!
//! [storage]
//! database_path = "/var/lib/stockroom/sync.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use stockroom_core::{
    ConflictResolution, COMPLETED_HISTORY_LIMIT, CONFLICT_RETENTION_DAYS, DEFAULT_BATCH_SIZE,
    DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_MAX_SIZE, DEFAULT_SYNC_INTERVAL_MS,
};

use crate::error::{SyncError, SyncResult};

/// Upper bound for `sync_interval_ms` and `debounce_ms` (one week).
pub const MAX_DELAY_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Upper bound for `conflict_retention_days` (ten years).
pub const MAX_CONFLICT_RETENTION_DAYS: i64 = 3650;

// =============================================================================
// Conflict Policy
// =============================================================================

/// What happens when dispatch surfaces a conflict.
///
/// ```text
/// manual  - conflict waits for the host UI to call resolve_conflict
/// local   - resolved immediately, local snapshot wins
/// remote  - resolved immediately, remote snapshot wins
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Manual,
    Local,
    Remote,
}

impl ConflictPolicy {
    /// The resolution applied automatically, if any.
    pub fn auto_resolution(&self) -> Option<ConflictResolution> {
        match self {
            ConflictPolicy::Manual => None,
            ConflictPolicy::Local => Some(ConflictResolution::Local),
            ConflictPolicy::Remote => Some(ConflictResolution::Remote),
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Manual => write!(f, "manual"),
            ConflictPolicy::Local => write!(f, "local"),
            ConflictPolicy::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" | "ask" => Ok(ConflictPolicy::Manual),
            "local" | "local_wins" => Ok(ConflictPolicy::Local),
            "remote" | "remote_wins" | "server" => Ok(ConflictPolicy::Remote),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown conflict policy: '{}'. Valid options: manual, local, remote",
                other
            ))),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Scheduling and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Whether batches are scheduled automatically.
    #[serde(default = "default_true")]
    pub auto_sync_enabled: bool,

    /// Delay between batches while work remains (milliseconds).
    #[serde(default = "default_sync_interval")]
    pub sync_interval_ms: u64,

    /// Delay after a new operation so bursts coalesce (milliseconds).
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Operations dispatched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retry budget for operations that do not specify one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_true() -> bool {
    true
}
fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_MS
}
fn default_debounce() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_sync_enabled: default_true(),
            sync_interval_ms: default_sync_interval(),
            debounce_ms: default_debounce(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

// =============================================================================
// Queue Settings
// =============================================================================

/// Offline action queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Capacity before the oldest action is evicted.
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,

    /// Retry budget stamped on captured actions.
    #[serde(default = "default_max_retries")]
    pub retry_attempts: u32,
}

fn default_queue_max_size() -> usize {
    DEFAULT_QUEUE_MAX_SIZE
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            max_size: default_queue_max_size(),
            retry_attempts: default_max_retries(),
        }
    }
}

// =============================================================================
// Retention Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Completed operation ids kept for diagnostics.
    #[serde(default = "default_completed_history")]
    pub completed_history: usize,

    /// Resolved conflicts older than this are purged.
    #[serde(default = "default_conflict_retention")]
    pub conflict_retention_days: i64,
}

fn default_completed_history() -> usize {
    COMPLETED_HISTORY_LIMIT
}
fn default_conflict_retention() -> i64 {
    CONFLICT_RETENTION_DAYS
}

impl Default for RetentionSettings {
    fn default() -> Self {
        RetentionSettings {
            completed_history: default_completed_history(),
            conflict_retention_days: default_conflict_retention(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Runtime Update
// =============================================================================

/// Partial settings change applied while the engine runs.
///
/// `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfigUpdate {
    #[serde(default)]
    pub auto_sync_enabled: Option<bool>,
    #[serde(default)]
    pub sync_interval_ms: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub conflict_policy: Option<ConflictPolicy>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub retention: RetentionSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.sync_interval_ms == 0 || self.sync.sync_interval_ms > MAX_DELAY_MS {
            return Err(SyncError::InvalidConfig(format!(
                "sync_interval_ms must be between 1 and {MAX_DELAY_MS}"
            )));
        }

        if self.sync.debounce_ms > MAX_DELAY_MS {
            return Err(SyncError::InvalidConfig(format!(
                "debounce_ms must be at most {MAX_DELAY_MS}"
            )));
        }

        if self.queue.max_size == 0 {
            return Err(SyncError::InvalidConfig(
                "queue.max_size must be greater than 0".into(),
            ));
        }

        if self.retention.completed_history == 0 {
            return Err(SyncError::InvalidConfig(
                "retention.completed_history must be greater than 0".into(),
            ));
        }

        if !(0..=MAX_CONFLICT_RETENTION_DAYS).contains(&self.retention.conflict_retention_days) {
            return Err(SyncError::InvalidConfig(format!(
                "retention.conflict_retention_days must be between 0 and {MAX_CONFLICT_RETENTION_DAYS}"
            )));
        }

        Ok(())
    }

    /// Applies a runtime update, validating the result.
    ///
    /// On error the configuration is left unchanged.
    pub fn apply_update(&mut self, update: &SyncConfigUpdate) -> SyncResult<()> {
        let mut next = self.clone();

        if let Some(enabled) = update.auto_sync_enabled {
            next.sync.auto_sync_enabled = enabled;
        }
        if let Some(interval) = update.sync_interval_ms {
            next.sync.sync_interval_ms = interval;
        }
        if let Some(batch_size) = update.batch_size {
            next.sync.batch_size = batch_size;
        }
        if let Some(policy) = update.conflict_policy {
            next.sync.conflict_policy = policy;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies `STOCKROOM_*` overrides read through `lookup`.
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("STOCKROOM_AUTO_SYNC") {
            match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.auto_sync_enabled = true,
                "0" | "false" | "no" | "off" => self.sync.auto_sync_enabled = false,
                _ => warn!(value = %value, "Unknown STOCKROOM_AUTO_SYNC value"),
            }
        }

        if let Some(value) = lookup("STOCKROOM_SYNC_INTERVAL_MS") {
            if let Ok(ms) = value.parse::<u64>() {
                debug!(interval_ms = ms, "Overriding sync interval from environment");
                self.sync.sync_interval_ms = ms;
            }
        }

        if let Some(value) = lookup("STOCKROOM_BATCH_SIZE") {
            if let Ok(n) = value.parse::<usize>() {
                self.sync.batch_size = n;
            }
        }

        if let Some(value) = lookup("STOCKROOM_MAX_RETRIES") {
            if let Ok(n) = value.parse::<u32>() {
                self.sync.max_retries = n;
            }
        }

        if let Some(value) = lookup("STOCKROOM_CONFLICT_POLICY") {
            match value.parse() {
                Ok(policy) => {
                    debug!(policy = %value, "Overriding conflict policy from environment");
                    self.sync.conflict_policy = policy;
                }
                Err(_) => warn!(policy = %value, "Unknown conflict policy in environment"),
            }
        }

        if let Some(value) = lookup("STOCKROOM_QUEUE_MAX_SIZE") {
            if let Ok(n) = value.parse::<usize>() {
                self.queue.max_size = n;
            }
        }

        if let Some(value) = lookup("STOCKROOM_DATABASE_PATH") {
            debug!(path = %value, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(value));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockroom", "sync")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Configured database path, or `stockroom.db` in the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "stockroom", "sync")
                .map(|dirs| dirs.data_dir().join("stockroom.db"))
        })
    }

    // Out-of-range values saturate; `validate` keeps them well inside.

    pub fn sync_interval(&self) -> chrono::Duration {
        millis(self.sync.sync_interval_ms)
    }

    pub fn debounce(&self) -> chrono::Duration {
        millis(self.sync.debounce_ms)
    }

    pub fn conflict_retention(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.retention.conflict_retention_days)
            .unwrap_or(chrono::Duration::MAX)
    }
}

fn millis(ms: u64) -> chrono::Duration {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .unwrap_or(chrono::Duration::MAX)
}
