//! # Ledger Configuration
//!
//! Configuration for the stock ledger: where the database lives, how the
//! pool is sized, and cart suggestion thresholds.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SCANIX_DB_PATH=/var/lib/scanix/scanix.db                           │
//! │     SCANIX_MIN_CONFIDENCE=0.7                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/scanix/ledger.toml (Linux)                               │
//! │     ~/Library/Application Support/com.scanix.ledger/ledger.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/scanix/scanix.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [cart]
//! min_confidence = 0.6
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use scanix_core::validation::validate_confidence;
use scanix_core::DEFAULT_MIN_CONFIDENCE;

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Connection settings for the SQLite database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file. `:memory:` is accepted for tests.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "scanix", "ledger")
        .map(|dirs| dirs.data_dir().join("scanix.db"))
        .unwrap_or_else(|| PathBuf::from("scanix.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_ms: default_busy_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Cart Settings
// =============================================================================

/// Settings for the cart service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSettings {
    /// Recognition candidates below this confidence are not added.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}

impl Default for CartSettings {
    fn default() -> Self {
        CartSettings {
            min_confidence: default_min_confidence(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cart: CartSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (ledger.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                config = Self::from_file(&path)?;
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
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    fn from_file(path: &Path) -> DbResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::Config(
                "database.min_connections cannot exceed max_connections".into(),
            ));
        }

        validate_confidence(self.cart.min_confidence)
            .map_err(|e| DbError::Config(format!("cart.min_confidence: {}", e)))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SCANIX_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("SCANIX_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid SCANIX_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(timeout) = std::env::var("SCANIX_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                debug!(busy_timeout_ms = ms, "Overriding busy timeout from environment");
                self.database.busy_timeout_ms = ms;
            }
        }

        if let Ok(confidence) = std::env::var("SCANIX_MIN_CONFIDENCE") {
            match confidence.parse::<f64>() {
                Ok(c) => self.cart.min_confidence = c,
                Err(_) => warn!(value = %confidence, "Ignoring invalid SCANIX_MIN_CONFIDENCE"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "scanix", "ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    /// Builds the pool configuration from these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .min_confidence(self.cart.min_confidence)
    }
}
