//! Configuration management for the model gateway.
//!
//! Configuration is loaded from multiple sources, later ones overriding
//! earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/mlgateway/config.toml`)
//! 3. User-specified configuration file
//! 4. Environment variables (prefixed with `MLGATEWAY_`, sections separated by `__`)
//! 5. Command-line arguments
//!
//! # Environment Variables
//!
//! - `MLGATEWAY_SERVER__PORT` - Listen port
//! - `MLGATEWAY_STORAGE__MODELS_DIR` - Directory holding the registry and artifacts
//! - `MLGATEWAY_STREAMING__CHUNK_SIZE` - Outbound stream chunk size in bytes

use crate::error::{Error, Result};
use crate::models::Framework;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Overrides collected from the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub models_dir: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub max_message_size_mb: Option<usize>,
    pub frameworks: Vec<String>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub frameworks: FrameworksConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum gRPC message size in megabytes, both directions
    #[serde(default = "default_max_message_size_mb")]
    pub max_message_size_mb: usize,
}

/// Durable store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Frameworks whose runtime is enabled in this process. The rest are
/// registered as unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworksConfig {
    #[serde(default = "default_frameworks")]
    pub enabled: Vec<String>,
}

impl Default for FrameworksConfig {
    fn default() -> Self {
        Self {
            enabled: default_frameworks(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: Option<String>,
    /// Directory for `mlgateway.log`; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_max_message_size_mb() -> usize {
    100
}

fn default_chunk_size() -> usize {
    1024
}

fn default_frameworks() -> Vec<String> {
    vec![
        Framework::ScikitLearn.as_str().to_string(),
        Framework::Pytorch.as_str().to_string(),
    ]
}

impl ServiceConfig {
    /// Load configuration from all sources
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::with_name("/etc/mlgateway/config.toml").required(false));

        if let Some(path) = &overrides.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MLGATEWAY")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Embedded defaults only, for tests and tooling
    pub fn defaults() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn apply(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(size) = overrides.max_message_size_mb {
            self.server.max_message_size_mb = size;
        }
        if let Some(dir) = &overrides.models_dir {
            self.storage.models_dir = dir.clone();
        }
        if let Some(size) = overrides.chunk_size {
            self.streaming.chunk_size = size;
        }
        if !overrides.frameworks.is_empty() {
            self.frameworks.enabled = overrides.frameworks.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = Some(level.clone());
        }
        if let Some(dir) = &overrides.log_dir {
            self.logging.dir = Some(dir.clone());
        }
    }

    fn validate(&self) -> Result<()> {
        if self.streaming.chunk_size == 0 {
            return Err(Error::Config("streaming.chunk_size must be at least 1".into()));
        }
        if self.server.max_message_size_mb == 0 {
            return Err(Error::Config("server.max_message_size_mb must be at least 1".into()));
        }
        self.enabled_frameworks().map(|_| ())
    }

    /// Parsed `frameworks.enabled`
    pub fn enabled_frameworks(&self) -> Result<Vec<Framework>> {
        self.frameworks
            .enabled
            .iter()
            .map(|name| {
                name.parse::<Framework>()
                    .map_err(|_| Error::Config(format!("unknown framework in frameworks.enabled: {}", name)))
            })
            .collect()
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {}", e)))
    }

    pub fn max_message_size(&self) -> usize {
        self.server.max_message_size_mb * 1024 * 1024
    }
}
