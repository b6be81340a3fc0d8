//! Canned store replies and client wiring shared by the unit tests

pub use replies::*;

use std::sync::Arc;

use crate::Client;
use crate::ClientConfig;
use crate::MockTransport;

/// Client over a mocked transport with default configuration
pub fn mock_client(transport: MockTransport) -> Client {
    Client::with_transport(Arc::new(transport), ClientConfig::default())
}

pub fn mock_client_with_config(
    transport: MockTransport,
    config: ClientConfig,
) -> Client {
    Client::with_transport(Arc::new(transport), config)
}
