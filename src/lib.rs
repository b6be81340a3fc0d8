//! # keyspace-client
//!
//! Async client for hierarchical, versioned key-value stores that speak the
//! etcd v2 key-space protocol.
//!
//! ## Features
//! - **Atomic primitives**: create-if-absent, upsert, compare-and-swap and
//!   compare-and-delete by value or by version index
//! - **Leases**: grant leases and bind keys to them in the same write
//! - **Directories**: create, list (ordered by key) and remove, recursively
//!   or not
//! - **Watches**: cancellable long-poll watches with exactly one terminal
//!   outcome, plus a re-arming watch stream
//!
//! ## Error model
//! Refusals decided by the store are data: every operation returns
//! `Ok(Response)` and callers branch on [`Response::error_code`]. The `Err`
//! channel ([`ClientApiError`]) only reports transport faults, timeouts,
//! malformed replies and invalid arguments.
//!
//! ## Quick Start
//! ```no_run
//! use keyspace_client::{Client, StoreErrorCode};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder(vec!["http://127.0.0.1:2379".into()]).build()?;
//!
//!     let first = client.add("/test/key1", "42").await?;
//!     assert_eq!(first.error_code(), 0);
//!
//!     let again = client.add("/test/key1", "42").await?;
//!     assert_eq!(again.error_kind(), Some(StoreErrorCode::NodeExists));
//!
//!     let watch = client.watch("/test/key1", Some(first.index() + 1), false)?;
//!     client.set("/test/key1", "43").await?;
//!     println!("{:?}", watch.await);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod constants;
mod errors;
mod metrics;
mod response;
mod transport;
pub mod utils;

pub use client::*;
pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use response::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
