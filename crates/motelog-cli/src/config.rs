//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use motelog_core::fleet::FleetConfig;
use motelog_core::link::LinkConfig;
use motelog_core::session::SessionConfig;

/// Configuration file structure.
///
/// Every field has a default, so an empty file (or no file at all) is
/// valid. Command-line flags override whatever the file provides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Substring an advertised device name must contain.
    #[serde(default)]
    pub name_filter: String,

    /// Discovery scan window in seconds.
    #[serde(default = "default_scan_secs")]
    pub scan_secs: u64,

    /// Connect attempt timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Delay between reconnect attempts in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Maximum concurrent connections (unset = unlimited).
    #[serde(default)]
    pub max_connections: Option<usize>,

    /// Full-fleet rescan interval in minutes (unset = no periodic rescan).
    #[serde(default)]
    pub rescan_minutes: Option<u64>,

    /// Directory for per-device log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Wire-level link settings.
    #[serde(default)]
    pub link: LinkSection,
}

/// The `[link]` table: firmware-defined wire constants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkSection {
    /// Telemetry service UUID (defaults to Nordic UART).
    #[serde(default)]
    pub service_uuid: Option<String>,
    /// Host-to-device command characteristic UUID.
    #[serde(default)]
    pub rx_uuid: Option<String>,
    /// Device-to-host notification characteristic UUID.
    #[serde(default)]
    pub tx_uuid: Option<String>,
    /// Single-character command that starts streaming.
    #[serde(default)]
    pub init_command: Option<char>,
    /// Single-character command that stops streaming.
    #[serde(default)]
    pub terminate_command: Option<char>,
    /// Message delimiter character.
    #[serde(default)]
    pub delimiter: Option<char>,
}

fn default_scan_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("sensor_data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name_filter: String::new(),
            scan_secs: default_scan_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_connections: None,
            rescan_minutes: None,
            log_dir: default_log_dir(),
            link: LinkSection::default(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolve the wire constants, applying any `[link]` overrides.
    pub fn link_config(&self) -> Result<LinkConfig> {
        let mut link = LinkConfig::default();
        if let Some(uuid) = &self.link.service_uuid {
            link.service = uuid.parse().context("invalid link.service_uuid")?;
        }
        if let Some(uuid) = &self.link.rx_uuid {
            link.rx = uuid.parse().context("invalid link.rx_uuid")?;
        }
        if let Some(uuid) = &self.link.tx_uuid {
            link.tx = uuid.parse().context("invalid link.tx_uuid")?;
        }
        if let Some(c) = self.link.init_command {
            link.init_command = command_byte(c, "link.init_command")?;
        }
        if let Some(c) = self.link.terminate_command {
            link.terminate_command = command_byte(c, "link.terminate_command")?;
        }
        if let Some(c) = self.link.delimiter {
            link.delimiter = c;
        }
        Ok(link)
    }

    /// Build the effective fleet configuration. Flags passed on the
    /// command line win over file values.
    pub fn fleet_config(&self, overrides: RunOverrides) -> Result<FleetConfig> {
        let link = self.link_config()?;
        let session = SessionConfig {
            connect_timeout: Duration::from_secs(
                overrides.timeout_secs.unwrap_or(self.connect_timeout_secs),
            ),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            log_dir: overrides.log_dir.unwrap_or_else(|| self.log_dir.clone()),
            link,
            ..SessionConfig::default()
        };

        Ok(FleetConfig {
            name_filter: overrides
                .name_filter
                .unwrap_or_else(|| self.name_filter.clone()),
            scan_window: Duration::from_secs(self.scan_secs),
            max_connections: overrides.max_connections.or(self.max_connections),
            rescan_interval: overrides
                .rescan_minutes
                .or(self.rescan_minutes)
                .map(|minutes| Duration::from_secs(minutes * 60)),
            session,
        })
    }
}

/// Command-line overrides for the `run` subcommand.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub name_filter: Option<String>,
    pub max_connections: Option<usize>,
    pub rescan_minutes: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Convert a configured command character to its single wire byte.
fn command_byte(c: char, field: &str) -> Result<u8> {
    match u8::try_from(c) {
        Ok(byte) => Ok(byte),
        Err(_) => bail!("{field} must be a single-byte character, got {c:?}"),
    }
}
