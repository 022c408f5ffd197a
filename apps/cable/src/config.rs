// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use cablekit_core::{BlockFormat, CableError};
use cablekit_nodes::audio::{NoiseGateConfig, ToneConfig, VolumeConfig};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::Level;

/// Default port a mixer listens on and a sender connects to.
pub const DEFAULT_PORT: u16 = 7070;

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format
    #[default]
    Text,
    /// JSON format (structured, better for log aggregation)
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LogConfig {
    #[serde(default)]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    /// Format for file logging: "text" (default) or "json" (structured)
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: "./cable.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

fn default_remote() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}

/// Sending side: a tone through a volume stage to a remote mixer.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SendConfig {
    /// Address of the mixer to connect to.
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub tone: ToneConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self { remote: default_remote(), tone: ToneConfig::default(), volume: VolumeConfig::default() }
    }
}

impl SendConfig {
    /// # Errors
    ///
    /// Returns an error if `remote` is not a socket address.
    pub fn remote_addr(&self) -> Result<SocketAddr, CableError> {
        parse_addr(&self.remote)
    }
}

fn default_listen() -> Vec<String> {
    vec![format!("0.0.0.0:{DEFAULT_PORT}")]
}

const fn default_true() -> bool {
    true
}

/// Mixing side: one receive link per listen address, mixed into a master bus.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MixConfig {
    /// One peer is accepted per address.
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,
    /// Feed silence into the master bus so it keeps running with no peers.
    #[serde(default = "default_true")]
    pub keepalive: bool,
    /// Gain applied to each peer before mixing.
    #[serde(default)]
    pub peer_volume: VolumeConfig,
    /// Gain applied to the mix.
    #[serde(default)]
    pub master_volume: VolumeConfig,
    /// Optional noise gate applied to each peer.
    #[serde(default)]
    pub noise_gate: Option<NoiseGateConfig>,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            keepalive: true,
            peer_volume: VolumeConfig::default(),
            master_volume: VolumeConfig::default(),
            noise_gate: None,
        }
    }
}

impl MixConfig {
    /// # Errors
    ///
    /// Returns an error if any listen address is malformed or none is given.
    pub fn listen_addrs(&self) -> Result<Vec<SocketAddr>, CableError> {
        if self.listen.is_empty() {
            return Err(CableError::Configuration("mix.listen must name at least one address".to_string()));
        }
        self.listen.iter().map(|addr| parse_addr(addr)).collect()
    }
}

const fn default_status_interval() -> u64 {
    5
}

/// Periodic status reporting.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StatusConfig {
    /// Seconds between status reports. 0 disables reporting.
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { interval_secs: default_status_interval() }
    }
}

/// Root configuration for the cable binary.
#[derive(Deserialize, Serialize, Default, Debug, Clone, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub audio: BlockFormat,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub send: SendConfig,

    #[serde(default)]
    pub mix: MixConfig,

    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

fn parse_addr(addr: &str) -> Result<SocketAddr, CableError> {
    addr.trim()
        .parse()
        .map_err(|e| CableError::Configuration(format!("Invalid socket address `{addr}`: {e}")))
}

/// Loads the configuration from defaults, a TOML file, and `CABLE_`-prefixed
/// environment variables (`__` separates nested keys, e.g. `CABLE_AUDIO__BLOCK_LEN`).
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file exists but contains invalid TOML syntax
/// - Environment variables are set but contain invalid values
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment =
        Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;

    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("CABLE_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration as a pretty-printed TOML string.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized to TOML.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}
