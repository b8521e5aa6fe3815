//! Configuration module for exserver.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the web server
#[derive(Parser, Debug)]
#[command(name = "exserver")]
#[command(author = "exserver authors")]
#[command(version = "0.1.0")]
#[command(about = "A minimal single-process web server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server listener port
    #[arg(short, long)]
    pub port: Option<String>,

    /// Number of event loops to run (0 = one per CPU core)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Static file sent back to every client
    #[arg(short, long)]
    pub resource: Option<PathBuf>,

    /// Enable debug mode logging
    #[arg(long)]
    pub debug: bool,

    /// Output detailed info during execution
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: String,
    /// Number of event loops
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Static payload path
    #[serde(default = "default_resource")]
    pub resource: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            threads: default_threads(),
            resource: default_resource(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_threads() -> usize {
    1
}

fn default_resource() -> PathBuf {
    PathBuf::from("misc/index.html")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: String,
    pub threads: usize,
    pub resource: PathBuf,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let log_level = if cli.debug {
            "trace".to_string()
        } else if cli.verbose {
            "debug".to_string()
        } else if cli.log_level != "info" {
            cli.log_level
        } else {
            toml_config.logging.level
        };

        Config {
            port: cli.port.unwrap_or(toml_config.server.port),
            threads: cli.threads.unwrap_or(toml_config.server.threads),
            resource: cli.resource.unwrap_or(toml_config.server.resource),
            log_level,
        }
    }

    /// Number of event loops to start, resolving `0` to the CPU count.
    pub fn event_loops(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.threads
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
