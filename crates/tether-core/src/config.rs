//! Tether Configuration
//!
//! Configuration types for the store, the bridge, the state manager and the
//! binary's logging. Every section has a `Default` so a partial TOML file is
//! enough.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolve the default data directory for Tether.
///
/// Priority:
/// 1. `$TETHER_PATH/.tether` if TETHER_PATH is set
/// 2. `~/.tether` (home directory)
/// 3. `./.tether` (current directory fallback)
pub fn default_data_dir() -> PathBuf {
    std::env::var("TETHER_PATH")
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tether")
}

fn default_true() -> bool {
    true
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`TetherConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Simulated store configuration
    pub store: StoreConfig,

    /// Delegation bridge configuration
    pub bridge: BridgeConfig,

    /// Reactive state manager configuration
    pub state: StateConfig,

    /// Logging configuration (binary only)
    pub logging: LoggingConfig,
}

impl TetherConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load configuration from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// What the store contains when no usable snapshot exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedProfile {
    /// No clients, no files
    #[default]
    Empty,
    /// Deterministic demo data
    Demo {
        /// Number of clients to create
        clients: u32,
        /// Files created per client
        files_per_client: u32,
        /// RNG seed for sizes and statuses
        seed: u64,
    },
}

/// Simulated store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file; `None` disables persistence
    pub snapshot_path: Option<PathBuf>,

    /// Activity log retention (oldest entries are dropped first)
    pub max_log_entries: usize,

    /// Append an activity entry for every mutation
    #[serde(default = "default_true")]
    pub log_mutations: bool,

    /// Contents used when no snapshot can be loaded
    pub seed: SeedProfile,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            max_log_entries: 1_000,
            log_mutations: true,
            seed: SeedProfile::Empty,
        }
    }
}

impl StoreConfig {
    /// Snapshot at the default location under [`default_data_dir`].
    #[must_use]
    pub fn with_default_snapshot(mut self) -> Self {
        self.snapshot_path = Some(default_data_dir().join("store.json"));
        self
    }
}

/// Delegation bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Route to the real backend when it is attached and supports the call
    #[serde(default = "default_true")]
    pub prefer_real: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { prefer_real: true }
    }
}

/// Reactive state manager configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Deadline applied to every mediated call; `None` waits indefinitely
    pub mediation_deadline_ms: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}
