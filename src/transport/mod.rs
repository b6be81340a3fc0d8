//! Transport seam between the key-space engine and the store.
//!
//! The engine only needs `request(method, path, params) -> (status, body)`.
//! Connection management, TLS and socket-level failover live behind the
//! [`Transport`] trait; [`HttpTransport`] is the implementation shipped with
//! the crate.

mod http;

pub use http::*;

#[cfg(test)]
use mockall::automock;

use std::time::Duration;

use async_trait::async_trait;

use crate::ClientApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

/// How request parameters travel on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEncoding {
    /// `?k=v&...`
    Query,
    /// `application/x-www-form-urlencoded` body
    Form,
    /// JSON object body with string values
    Json,
}

/// One store-facing request, protocol-agnostic apart from the encoding hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub encoding: ParamEncoding,
    /// Upper bound for this request, long-poll included
    pub timeout: Duration,
}

impl StoreRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let encoding = match method {
            Method::Get | Method::Delete => ParamEncoding::Query,
            Method::Put => ParamEncoding::Form,
            Method::Post => ParamEncoding::Json,
        };
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            encoding,
            timeout,
        }
    }

    pub fn param(
        mut self,
        name: &str,
        value: impl ToString,
    ) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn param_if(
        self,
        enabled: bool,
        name: &str,
        value: impl ToString,
    ) -> Self {
        if enabled {
            self.param(name, value)
        } else {
            self
        }
    }

    /// Value of the first parameter called `name`
    pub fn get_param(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// Status code and body exactly as the store returned them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
    /// Store-wide index at the time of the reply (`X-Etcd-Index`), when the
    /// store reports one
    pub store_index: Option<u64>,
}

impl RawReply {
    pub fn new(
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: body.into(),
            store_index: None,
        }
    }

    pub fn with_store_index(
        mut self,
        index: u64,
    ) -> Self {
        self.store_index = Some(index);
        self
    }
}

/// The request/response collaborator.
///
/// Implementations must be safe to share between concurrent operations;
/// the engine issues requests from many tasks at once, including long-poll
/// watches that stay in flight for up to the watch timeout.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn request(
        &self,
        request: StoreRequest,
    ) -> std::result::Result<RawReply, ClientApiError>;
}
