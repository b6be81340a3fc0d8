//! Client configuration.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`KEYSPACE__*`, highest priority)

use std::env;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ENDPOINT;
use crate::constants::DEFAULT_KEYS_PREFIX;
use crate::constants::DEFAULT_LEASE_GRANT_PATH;
use crate::Error;
use crate::Result;

const ENV_PREFIX: &str = "KEYSPACE";

/// Client configuration parameters
///
/// Encapsulates the store endpoints, the per-request and long-poll
/// deadlines, and the store's path layout.
///
/// # Examples
/// ```ignore
/// // Defaults + CONFIG_PATH file + KEYSPACE__* variables
/// let config = ClientConfig::new()?.validate()?;
///
/// // Runtime overrides from another file
/// let config = ClientConfig::new()?
///     .with_override_config("client.toml")?
///     .validate()?;
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Store base URIs, `http://` or `https://`
    /// Default: `http://127.0.0.1:2379`
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Maximum time to wait for establishing a TCP connection
    /// Default: 1 second
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Maximum time to wait for a complete reply to a non-watch request
    /// Default: 3 seconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum time a long-poll watch stays in flight before it is reported
    /// as a timeout
    /// Default: 60 seconds
    #[serde(default = "default_watch_timeout_ms")]
    pub watch_timeout_ms: u64,

    /// TCP keepalive duration for idle connections
    /// Default: 5 minutes (300s)
    #[serde(default = "default_tcp_keepalive_secs")]
    pub tcp_keepalive_secs: u64,

    /// Path prefix of the key-space API
    #[serde(default = "default_keys_prefix")]
    pub keys_prefix: String,

    /// Path of the lease grant API
    #[serde(default = "default_lease_grant_path")]
    pub lease_grant_path: String,

    /// Ask the store for quorum reads on `get` and `ls`
    /// Default: false
    #[serde(default)]
    pub quorum_reads: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            watch_timeout_ms: default_watch_timeout_ms(),
            tcp_keepalive_secs: default_tcp_keepalive_secs(),
            keys_prefix: default_keys_prefix(),
            lease_grant_path: default_lease_grant_path(),
            quorum_reads: false,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `KEYSPACE__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` before using the configuration.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// - no endpoints, or an endpoint that is not `http://`/`https://`
    /// - a zero timeout
    /// - a watch timeout shorter than the request timeout
    /// - a path prefix without a leading `/`
    pub fn validate(self) -> Result<Self> {
        if self.endpoints.is_empty() {
            return Err(invalid("at least one endpoint required"));
        }
        if let Some(bad) = self
            .endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(invalid(format!(
                "endpoint must start with http:// or https://, got {bad}"
            )));
        }

        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("watch_timeout_ms", self.watch_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(format!("{name} must be greater than 0")));
            }
        }

        if self.watch_timeout_ms < self.request_timeout_ms {
            return Err(invalid(format!(
                "watch_timeout_ms ({}) must not be shorter than request_timeout_ms ({})",
                self.watch_timeout_ms, self.request_timeout_ms
            )));
        }

        for (name, value) in [
            ("keys_prefix", &self.keys_prefix),
            ("lease_grant_path", &self.lease_grant_path),
        ] {
            if !value.starts_with('/') {
                return Err(invalid(format!("{name} must start with '/', got {value:?}")));
            }
        }

        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn watch_timeout(&self) -> Duration {
        Duration::from_millis(self.watch_timeout_ms)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("endpoints")
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}

fn default_endpoints() -> Vec<String> {
    vec![DEFAULT_ENDPOINT.to_string()]
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
fn default_request_timeout_ms() -> u64 {
    3000
}
fn default_watch_timeout_ms() -> u64 {
    60_000
}
fn default_tcp_keepalive_secs() -> u64 {
    300
}
fn default_keys_prefix() -> String {
    DEFAULT_KEYS_PREFIX.to_string()
}
fn default_lease_grant_path() -> String {
    DEFAULT_LEASE_GRANT_PATH.to_string()
}
