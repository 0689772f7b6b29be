//! Tool configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`scopecap.toml`, or the path in `SCOPECAP_CONFIG`), then environment
//! variables such as `SCOPECAP__CONNECTION__ADDRESS=10.0.0.5`.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use scopecap_core::constants::{DEFAULT_MIN_IMAGE_BYTES, DEFAULT_TIMEOUT, HTTP_PORT, SCPI_PORT, VICP_PORT};
use scopecap_core::{Background, Delays};
use scopecap_types::ConnectionMode;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_VAR: &str = "SCOPECAP_CONFIG";

/// Configuration file looked up when `SCOPECAP_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "scopecap";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub capture: CaptureConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    #[serde(deserialize_with = "from_str")]
    pub mode: ConnectionMode,

    /// Instrument IP address (ethernet mode)
    pub address: String,

    /// 0 means auto
    pub port: u16,

    /// Explicit USB resource; auto-detected when unset
    pub usb_resource: Option<String>,

    /// HTTP Basic Auth credentials for the instrument's web server
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Output path; a timestamp is inserted before the extension
    pub output: PathBuf,

    pub timeout_secs: u64,

    #[serde(deserialize_with = "from_str")]
    pub background: Background,

    /// Replies shorter than this are not images
    pub min_image_bytes: usize,

    /// Overrides the vendor's settle delay
    pub settle_ms: Option<u64>,

    /// Overrides the vendor's render delay
    pub render_ms: Option<u64>,

    /// Quiet gap that ends an unframed reply on a raw socket
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub ethernet: bool,
    pub usb: bool,

    /// CIDR subnets; empty means the local /24
    pub subnets: Vec<String>,

    pub ports: Vec<u16>,
    pub max_workers: usize,
    pub tcp_timeout_ms: u64,
    pub idn_timeout_secs: u64,
    pub csv_output: Option<PathBuf>,
}

impl Config {
    /// Load from the default file (if present) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from `path` (optional, extension may be omitted) and the environment
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SCOPECAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Parse TOML text, without consulting the environment
    pub fn from_toml(text: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

impl ConnectionConfig {
    /// Credentials, when both are set and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Configured USB resource, ignoring blank values
    pub fn usb_resource(&self) -> Option<&str> {
        self.usb_resource.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Vendor delays with the configured overrides applied
    pub fn delays(&self, defaults: Delays) -> Delays {
        Delays {
            settle: self.settle_ms.map(Duration::from_millis).unwrap_or(defaults.settle),
            render: self.render_ms.map(Duration::from_millis).unwrap_or(defaults.render),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("captures/scope_screenshot.png"),
            timeout_secs: DEFAULT_TIMEOUT,
            background: Background::default(),
            min_image_bytes: DEFAULT_MIN_IMAGE_BYTES,
            settle_ms: None,
            render_ms: None,
            idle_timeout_ms: 500,
        }
    }
}

impl ScanConfig {
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    pub fn idn_timeout(&self) -> Duration {
        Duration::from_secs(self.idn_timeout_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ethernet: true,
            usb: true,
            subnets: Vec::new(),
            ports: vec![SCPI_PORT, VICP_PORT, HTTP_PORT],
            max_workers: 64,
            tcp_timeout_ms: 500,
            idn_timeout_secs: 3,
            csv_output: None,
        }
    }
}

fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
