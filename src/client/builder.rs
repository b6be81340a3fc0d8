use std::sync::Arc;
use std::time::Duration;

use super::Client;
use crate::metrics::init_metrics;
use crate::ClientConfig;
use crate::HttpTransport;
use crate::Result;
use crate::Transport;

pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Create a new builder with default config and specified endpoints
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            config: ClientConfig {
                endpoints,
                ..ClientConfig::default()
            },
            transport: None,
        }
    }

    /// Set connection timeout (default: 1s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set request timeout (default: 3s)
    pub fn request_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the long-poll watch timeout (default: 60s)
    pub fn watch_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.watch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable/disable quorum reads for `get` and `ls` (default: disabled)
    pub fn quorum_reads(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.quorum_reads = enable;
        self
    }

    /// Completely replaces the default configuration
    ///
    /// # Warning: Configuration Override
    /// This will discard all previous settings configured through individual
    /// methods like [`request_timeout`](ClientBuilder::request_timeout),
    /// including the endpoints passed to [`new`](ClientBuilder::new).
    ///
    /// # Example: Full Configuration
    /// ```ignore
    /// use keyspace_client::{ClientBuilder, ClientConfig};
    ///
    /// let custom_config = ClientConfig {
    ///     request_timeout_ms: 5000,
    ///     ..ClientConfig::default()
    /// };
    ///
    /// let builder = ClientBuilder::new(vec!["http://node1:2379".into()])
    ///     .set_config(custom_config);
    /// ```
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Use a caller-provided transport instead of [`HttpTransport`]
    pub fn transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> Result<Client> {
        init_metrics();

        let config = self.config.validate()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config)?),
        };

        Ok(Client::with_transport(transport, config))
    }
}
