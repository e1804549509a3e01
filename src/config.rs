//! Configuration loading.
//!
//! Settings come from two layers, later layers winning:
//! 1. An optional TOML file (`--config`, or `songs-api.toml` in the working
//!    directory when present)
//! 2. Command-line flags and environment variables
//!
//! Required settings (database URL, JWT secret, metadata service address)
//! have no default; startup fails if any is absent after layering.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "songs-api.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection settings
    pub database: DatabaseConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// External metadata service settings
    pub metadata: MetadataConfig,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (e.g. `sqlite:songs.db`). Required.
    pub url: String,

    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port
    pub port: u16,

    /// JWT signing secret. Required, but no route checks tokens yet.
    pub jwt_secret: String,

    /// Deadline for a whole request, including the metadata call
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// External metadata service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Base address, e.g. `http://localhost:9000`. Required.
    pub base_url: String,

    /// Per-attempt timeout
    pub timeout_secs: u64,

    /// Extra attempts after a retryable failure
    pub max_retries: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Command-line / environment layer. Every value is optional so that unset
/// flags leave the file (or default) value in place.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "SONGS_API_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database pool size
    #[arg(long, global = true, env = "DB_MAX_CONNECTIONS")]
    pub db_max_connections: Option<u32>,

    /// Port to listen on
    #[arg(short, long, global = true, env = "SERVER_PORT")]
    pub port: Option<u16>,

    /// JWT secret
    #[arg(long, global = true, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Request deadline in seconds
    #[arg(long, global = true, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Metadata service base address
    #[arg(long, global = true, env = "METADATA_SERVICE_ADDRESS")]
    pub metadata_url: Option<String>,

    /// Metadata request timeout in seconds
    #[arg(long, global = true, env = "METADATA_TIMEOUT_SECS")]
    pub metadata_timeout_secs: Option<u64>,

    /// Metadata request retries
    #[arg(long, global = true, env = "METADATA_MAX_RETRIES")]
    pub metadata_max_retries: Option<usize>,
}

impl Config {
    /// Load, layer and validate configuration.
    pub fn load(args: &ConfigArgs) -> Result<Self, ConfigError> {
        let config = Self::layered(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Load only the database settings. Used by the migration commands,
    /// which never start the server or call the metadata service.
    pub fn load_database(args: &ConfigArgs) -> Result<DatabaseConfig, ConfigError> {
        let config = Self::layered(args)?;
        config.validate_database()?;
        Ok(config.database)
    }

    fn layered(args: &ConfigArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    tracing::info!("No config file found, using flags and environment");
                    Self::default()
                }
            }
        };

        config.apply(args);
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Overlay values given on the command line or in the environment.
    pub fn apply(&mut self, args: &ConfigArgs) {
        if let Some(url) = &args.database_url {
            self.database.url = url.clone();
        }
        if let Some(n) = args.db_max_connections {
            self.database.max_connections = n;
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(secret) = &args.jwt_secret {
            self.server.jwt_secret = secret.clone();
        }
        if let Some(secs) = args.request_timeout_secs {
            self.server.request_timeout_secs = secs;
        }
        if let Some(url) = &args.metadata_url {
            self.metadata.base_url = url.clone();
        }
        if let Some(secs) = args.metadata_timeout_secs {
            self.metadata.timeout_secs = secs;
        }
        if let Some(n) = args.metadata_max_retries {
            self.metadata.max_retries = n;
        }
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_database()?;
        if self.server.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("server.jwt_secret (JWT_SECRET)"));
        }
        if self.metadata.base_url.trim().is_empty() {
            return Err(ConfigError::Missing(
                "metadata.base_url (METADATA_SERVICE_ADDRESS)",
            ));
        }
        if !self.metadata.base_url.starts_with("http://")
            && !self.metadata.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(
                "metadata.base_url",
                "must start with http:// or https://".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 || self.metadata.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout",
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_database(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Missing("database.url (DATABASE_URL)"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections",
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

// ============================================================================
// Tests
// ============================================================================
