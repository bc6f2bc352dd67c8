/*!
# Configuration

Two JSON documents drive the monitor:

- the **address book** (`config.json`), listing every monitored address with
  its label and optional validator public key;
- the **server config** (`server_config.json`), holding the exposition
  listener, log level, upstream endpoints and scheduler timing.

Both live under `~/.dill_monitor/` unless overridden on the command line.
A missing or broken address book is fatal at startup. A missing server config
falls back to [`ServerConfig::default`].

```json
{
  "addresses": [
    { "label": "main", "address": "0xFEFC...", "validator_address": "0x8e7b..." },
    { "label": "cold", "address": "0xcC19..." }
  ]
}
```
*/

pub mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding both configuration files by default
pub const CONFIG_DIR_NAME: &str = ".dill_monitor";

/// A monitored address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    /// Operator-chosen label, exported as the `label` metric label
    pub label: String,
    /// Wallet address
    pub address: String,
    /// Validator public key; empty when no validator is bound
    #[serde(default)]
    pub validator_address: String,
}

impl AddressConfig {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            validator_address: String::new(),
        }
    }

    pub fn with_validator(mut self, validator_address: impl Into<String>) -> Self {
        self.validator_address = validator_address.into();
        self
    }

    /// Bound validator key, if any
    pub fn validator_address(&self) -> Option<&str> {
        let key = self.validator_address.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

/// The set of monitored addresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    #[serde(default)]
    pub addresses: Vec<AddressConfig>,
}

impl AddressBook {
    /// Load and validate the address book at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let book: AddressBook = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        book.validate()?;
        Ok(book)
    }

    /// Addresses must be non-empty and unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::with_capacity(self.addresses.len());
        for entry in &self.addresses {
            let address = entry.address.trim();
            if address.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "address entry labelled {:?} has an empty address",
                    entry.label
                )));
            }
            if !seen.insert(address) {
                return Err(ConfigError::Invalid(format!("duplicate address {address}")));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Number of entries with a bound validator key
    pub fn validator_count(&self) -> usize {
        self.addresses
            .iter()
            .filter(|entry| entry.validator_address().is_some())
            .count()
    }
}

/// Remote API endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamConfig {
    /// tRPC base for balance, validator listing and validator detail
    pub api_base_url: String,
    /// Staker service endpoint
    pub staker_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://alps.dill.xyz/api/trpc".into(),
            staker_url: "https://staker.dill.xyz/api".into(),
            request_timeout_secs: 10,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Collection cycle timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Seconds between cycle starts
    pub interval_secs: u64,
    /// Seconds in-flight workers get after cancellation
    pub grace_period_secs: u64,
    /// Upper bound on concurrently running address workers
    pub max_concurrency: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            grace_period_secs: 2,
            max_concurrency: 32,
        }
    }
}

/// Server-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub metrics_port: u16,
    pub log_level: String,
    pub host: String,
    pub upstream: UpstreamConfig,
    pub scheduler: SchedulerSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            log_level: "info".into(),
            host: "0.0.0.0".into(),
            upstream: UpstreamConfig::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load and validate the server config at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServerConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics_port == 0 {
            return Err(ConfigError::Invalid("metricsPort cannot be 0".into()));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid("scheduler.intervalSecs cannot be 0".into()));
        }
        if self.scheduler.max_concurrency == 0 {
            return Err(ConfigError::Invalid("scheduler.maxConcurrency cannot be 0".into()));
        }
        if self.upstream.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("upstream.requestTimeoutSecs cannot be 0".into()));
        }
        self.listen_addr().map(|_| ())
    }

    /// Socket address for the exposition listener
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(format!("host {:?} is not an IP address", self.host))
            })?;
        Ok(SocketAddr::new(ip, self.metrics_port))
    }
}

/// `~/.dill_monitor`, or `./config` when no home directory is known
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("config"))
}

pub fn default_address_book_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_server_config_path() -> PathBuf {
    default_config_dir().join("server_config.json")
}
