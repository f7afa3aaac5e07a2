//! Configuration module for accessory-bridge.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::protocols::acknowledge;
use crate::runtime::SessionSettings;
use crate::transport::PeerId;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Scratch buffer capacity used when nothing else is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Largest accepted scratch buffer.
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Channel used to reach the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Character device opened read/write
    #[default]
    Device,
    /// TCP stream to host:port
    Tcp,
}

/// Response derived from each received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    /// Wrap the message in a fixed prefix and suffix
    #[default]
    Acknowledge,
    /// Send the message back unchanged
    Echo,
    /// Answer PING lines with PONG
    Ping,
}

/// What a read returning zero bytes means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ZeroReadPolicy {
    /// No data this cycle; keep reading (accessory semantics)
    #[default]
    Idle,
    /// The peer closed its side; end the session (socket semantics)
    PeerClosed,
}

/// Command-line arguments for the bridge
#[derive(Parser, Debug, Default)]
#[command(name = "accessory-bridge")]
#[command(author = "accessory-bridge authors")]
#[command(version = "0.1.0")]
#[command(about = "Answers messages from a duplex accessory channel", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Channel type used to reach the peer
    #[arg(short, long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Peer identity (device path, or host:port for tcp)
    #[arg(short, long)]
    pub peer: Option<String>,

    /// Response transform
    #[arg(long, value_enum)]
    pub transform: Option<TransformKind>,

    /// Scratch buffer capacity in bytes
    #[arg(short, long)]
    pub buffer_size: Option<usize>,

    /// How to treat zero-length reads
    #[arg(long, value_enum)]
    pub zero_read: Option<ZeroReadPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport-related configuration
#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    /// Channel type
    #[serde(default)]
    pub kind: TransportKind,
    /// Peer identity (defaults depend on `kind`)
    pub peer: Option<String>,
    /// TCP connect timeout in milliseconds (0 = OS default)
    #[serde(default)]
    pub connect_timeout_ms: u64,
    /// How often the device watcher checks for the peer, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            peer: None,
            connect_timeout_ms: 0,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Communication session configuration
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Response transform
    #[serde(default)]
    pub transform: TransformKind,
    /// Prefix used by the acknowledge transform
    #[serde(default = "default_ack_prefix")]
    pub ack_prefix: String,
    /// Suffix used by the acknowledge transform
    #[serde(default = "default_ack_suffix")]
    pub ack_suffix: String,
    /// Scratch buffer capacity in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// How to treat zero-length reads
    #[serde(default)]
    pub zero_read: ZeroReadPolicy,
    /// Pause after a zero-length read, in milliseconds
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    /// Read timeout in milliseconds (0 = block indefinitely)
    #[serde(default)]
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds (0 = block indefinitely)
    #[serde(default)]
    pub write_timeout_ms: u64,
    /// How long teardown waits for a session to stop, in milliseconds
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transform: TransformKind::default(),
            ack_prefix: default_ack_prefix(),
            ack_suffix: default_ack_suffix(),
            buffer_size: default_buffer_size(),
            zero_read: ZeroReadPolicy::default(),
            idle_backoff_ms: default_idle_backoff_ms(),
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            shutdown_grace_ms: default_shutdown_grace_ms(),
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

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_ack_prefix() -> String {
    acknowledge::DEFAULT_PREFIX.to_string()
}

fn default_ack_suffix() -> String {
    acknowledge::DEFAULT_SUFFIX.to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_idle_backoff_ms() -> u64 {
    10
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_peer(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::Device => "/dev/usb_accessory",
        TransportKind::Tcp => "127.0.0.1:7777",
    }
}

/// Zero means "no limit".
fn optional_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportKind,
    pub peer: PeerId,
    pub connect_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub transform: TransformKind,
    pub ack_prefix: String,
    pub ack_suffix: String,
    pub buffer_size: usize,
    pub zero_read: ZeroReadPolicy,
    pub idle_backoff: Duration,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub shutdown_grace: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let TomlConfig {
            transport,
            session,
            logging,
        } = toml_config;

        let kind = cli.transport.unwrap_or(transport.kind);
        let peer = cli
            .peer
            .or(transport.peer)
            .unwrap_or_else(|| default_peer(kind).to_string());
        if peer.trim().is_empty() {
            return Err(ConfigError::Invalid("peer must not be empty".to_string()));
        }

        let buffer_size = cli.buffer_size.unwrap_or(session.buffer_size);
        if buffer_size == 0 || buffer_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "buffer_size must be between 1 and {MAX_BUFFER_SIZE}, got {buffer_size}"
            )));
        }

        if transport.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(Config {
            transport: kind,
            peer: PeerId::from(peer),
            connect_timeout: optional_millis(transport.connect_timeout_ms),
            poll_interval: Duration::from_millis(transport.poll_interval_ms),
            transform: cli.transform.unwrap_or(session.transform),
            ack_prefix: session.ack_prefix,
            ack_suffix: session.ack_suffix,
            buffer_size,
            zero_read: cli.zero_read.unwrap_or(session.zero_read),
            idle_backoff: Duration::from_millis(session.idle_backoff_ms),
            read_timeout: optional_millis(session.read_timeout_ms),
            write_timeout: optional_millis(session.write_timeout_ms),
            shutdown_grace: Duration::from_millis(session.shutdown_grace_ms),
            log_level: cli.log_level.unwrap_or(logging.level),
        })
    }

    /// Settings handed to every communication session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            buffer_size: self.buffer_size,
            zero_read: self.zero_read,
            idle_backoff: self.idle_backoff,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
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
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
