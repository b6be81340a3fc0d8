//! Client module for the hierarchical key-value store
//!
//! Provides the components applications use to talk to the store:
//! - [`Client`] - Main entry point, dereferences to [`KeyspaceClient`]
//! - [`ClientBuilder`] - Configurable client construction
//! - [`KeyspaceClient`] - Atomic key-space operations, leases and watches
//! - [`WatchHandle`] - One cancellable long-poll watch
//!
//! # Basic Usage
//! ```no_run
//! use keyspace_client::Client;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = Client::builder(vec!["http://127.0.0.1:2379".into()])
//!         .request_timeout(Duration::from_secs(1))
//!         .build()
//!         .unwrap();
//!
//!     // Create once, then compare-and-swap on the returned index
//!     let created = client.add("/config/timeout", "30s").await.unwrap();
//!     assert!(created.is_ok());
//!
//!     let swapped = client
//!         .modify_if("/config/timeout", "45s", created.index())
//!         .await
//!         .unwrap();
//!     println!("swap result: {}", swapped.error_code());
//! }
//! ```

mod builder;
mod error;
mod keyspace;
mod lease;
mod watch;

pub use builder::*;
pub use error::*;
pub use keyspace::*;
pub use lease::*;
pub use watch::*;


use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::ClientConfig;
use crate::HttpTransport;
use crate::Transport;

/// Main entry point for interacting with the store
///
/// Dereferences to [`KeyspaceClient`], so every key-space operation is
/// available directly on the client. Clones share the transport and the
/// outstanding-watch registry.
///
/// Created through the [`builder()`](Client::builder) method
#[derive(Clone)]
pub struct Client {
    keyspace: KeyspaceClient,

    inner: Arc<ArcSwap<ClientInner>>,
}

/// State shared by every operation: the transport and the configuration it
/// was built from. Swapped atomically by [`Client::refresh`].
pub struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: ClientConfig,
}

impl ClientInner {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Self {
        Self { transport, config }
    }
}

impl std::ops::Deref for Client {
    type Target = KeyspaceClient;

    fn deref(&self) -> &Self::Target {
        &self.keyspace
    }
}

impl Client {
    /// Create a configured client builder
    ///
    /// Starts client construction process with specified store endpoints.
    /// Chain configuration methods before calling
    /// [`build()`](ClientBuilder::build).
    ///
    /// # Panics
    /// Will panic if no endpoints are provided
    pub fn builder(endpoints: Vec<String>) -> ClientBuilder {
        assert!(!endpoints.is_empty(), "At least one endpoint required");
        ClientBuilder::new(endpoints)
    }

    /// Wraps an existing transport, bypassing the HTTP stack
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Self {
        let inner = Arc::new(ArcSwap::from_pointee(ClientInner::new(transport, config)));
        Self {
            keyspace: KeyspaceClient::new(inner.clone()),
            inner,
        }
    }

    /// Access the key-space operations client
    pub fn kv(&self) -> &KeyspaceClient {
        &self.keyspace
    }

    pub fn config(&self) -> ClientConfig {
        self.inner.load().config.clone()
    }

    /// Rebuilds the HTTP transport, optionally against new endpoints.
    ///
    /// Operations already in flight finish on the old transport; every
    /// operation issued afterwards, from any clone of this client, uses the
    /// new one.
    pub fn refresh(
        &self,
        new_endpoints: Option<Vec<String>>,
    ) -> std::result::Result<(), ClientApiError> {
        let old_inner = self.inner.load();
        let mut config = old_inner.config.clone();
        if let Some(endpoints) = new_endpoints {
            config.endpoints = endpoints;
        }

        let transport = HttpTransport::new(&config)?;
        info!(endpoints = ?config.endpoints, "client transport refreshed");

        self.inner.store(Arc::new(ClientInner::new(Arc::new(transport), config)));
        Ok(())
    }
}
