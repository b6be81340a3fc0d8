//! Crate-level error hierarchy.
//!
//! Operations on the key space never fail with [`Error`]: they return
//! [`ClientApiError`] for transport faults and carry store-level refusals as
//! data inside [`crate::Response`]. [`Error`] covers the bootstrap paths:
//! configuration loading, validation and client construction.

use config::ConfigError;

use crate::ClientApiError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Client construction failures (bad endpoints, TLS backend, ...)
    #[error(transparent)]
    Client(#[from] ClientApiError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}
