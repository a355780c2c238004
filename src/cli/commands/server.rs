use crate::config::Overrides;
use clap::{ArgAction, Args};
use std::path::PathBuf;

/// Logging flags shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", env = "MLGATEWAY_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Filter directives, e.g. "mlgateway_core=debug,tonic=info"
    #[arg(long = "log-filter", env = "RUST_LOG", global = true)]
    pub log_filter: Option<String>,
}

impl LoggingConfig {
    /// `-v` flags win over `--log-level`.
    pub fn get_effective_level(&self) -> Option<String> {
        match self.verbose {
            0 => self.log_level.clone(),
            1 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Path to a configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Listen host
    #[arg(long, env = "MLGATEWAY_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(short = 'p', long, env = "MLGATEWAY_PORT")]
    pub port: Option<u16>,

    /// Directory holding the registry snapshot and model artifacts
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Bytes per chunk for streamed results
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Maximum gRPC message size in megabytes
    #[arg(long)]
    pub max_message_size_mb: Option<usize>,

    /// Frameworks to enable (comma separated)
    #[arg(long = "frameworks", value_delimiter = ',')]
    pub frameworks: Vec<String>,

    /// Also write logs to <DIR>/mlgateway.log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl ServerCommand {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            host: self.host.clone(),
            port: self.port,
            models_dir: self.models_dir.clone(),
            chunk_size: self.chunk_size,
            max_message_size_mb: self.max_message_size_mb,
            frameworks: self.frameworks.clone(),
            log_level: self.logging.get_effective_level(),
            log_dir: self.log_dir.clone(),
        }
    }
}
