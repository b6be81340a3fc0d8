use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;

use super::lease::check_lease;
use super::ClientInner;
use super::LeaseId;
use super::WatchRegistry;
use crate::constants::PARAM_DIR;
use crate::constants::PARAM_LEASE;
use crate::constants::PARAM_PREV_EXIST;
use crate::constants::PARAM_PREV_INDEX;
use crate::constants::PARAM_PREV_VALUE;
use crate::constants::PARAM_QUORUM;
use crate::constants::PARAM_RECURSIVE;
use crate::constants::PARAM_SORTED;
use crate::constants::PARAM_VALUE;
use crate::metrics::REQUESTS_TOTAL;
use crate::metrics::STORE_ERRORS_TOTAL;
use crate::metrics::TRANSPORT_FAILURES_TOTAL;
use crate::utils::key::normalize_key;
use crate::utils::scoped_timer::ScopedTimer;
use crate::Action;
use crate::ClientApiError;
use crate::Method;
use crate::Response;
use crate::StoreErrorCode;
use crate::StoreRequest;

/// Guard for a conditional write or delete.
///
/// A value guard succeeds only when the node currently holds exactly that
/// value; an index guard succeeds only when the node's `modifiedIndex` is
/// exactly that index. Anything else fails with
/// [`StoreErrorCode::TestFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Value(String),
    Index(u64),
}

impl Condition {
    fn apply(
        &self,
        request: StoreRequest,
    ) -> StoreRequest {
        match self {
            Condition::Value(value) => request.param(PARAM_PREV_VALUE, value),
            Condition::Index(index) => request.param(PARAM_PREV_INDEX, index),
        }
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::Value(value.to_string())
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::Value(value)
    }
}

impl From<&String> for Condition {
    fn from(value: &String) -> Self {
        Condition::Value(value.clone())
    }
}

impl From<u64> for Condition {
    fn from(index: u64) -> Self {
        Condition::Index(index)
    }
}

/// Key-space client interface
///
/// Every operation is one atomic request against the store. Outcomes the
/// store decides (key missing, compare failed, node exists, ...) come back
/// as `Ok(Response)` with a non-zero [`Response::error_code`]; `Err` is
/// reserved for transport faults and malformed input.
#[derive(Clone)]
pub struct KeyspaceClient {
    pub(super) client_inner: Arc<ArcSwap<ClientInner>>,
    pub(super) watches: WatchRegistry,
}

impl KeyspaceClient {
    pub(crate) fn new(client_inner: Arc<ArcSwap<ClientInner>>) -> Self {
        Self {
            client_inner,
            watches: WatchRegistry::new(),
        }
    }

    /// Reads one node
    pub async fn get(
        &self,
        key: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let request = {
            let inner = self.client_inner.load();
            keys_request(&inner, Method::Get, &key)
                .param_if(inner.config.quorum_reads, PARAM_QUORUM, true)
        };
        self.execute("client::get", request).await
    }

    /// Creates `key` only if it does not exist yet
    ///
    /// Fails with [`StoreErrorCode::NodeExists`] when the key is already
    /// present. On success `index()` is the version to guard later writes
    /// with.
    pub async fn add(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        self.write("client::add", key.as_ref(), value.as_ref(), None, |r| {
            r.param(PARAM_PREV_EXIST, false)
        })
        .await
    }

    /// Same as [`add`](Self::add), with the node bound to `lease`
    ///
    /// The store must report the binding in its reply. A successful write
    /// whose node does not carry `lease` is a [`ClientApiError::Protocol`]
    /// error, since the key now exists without the lease.
    pub async fn add_with_lease(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
        lease: LeaseId,
    ) -> std::result::Result<Response, ClientApiError> {
        let lease = check_lease(lease)?;
        self.write("client::add", key.as_ref(), value.as_ref(), Some(lease), |r| {
            r.param(PARAM_PREV_EXIST, false)
        })
        .await
    }

    /// Unconditional upsert
    ///
    /// The action is `Create` when nothing existed before and `Set` when a
    /// previous value was overwritten.
    pub async fn set(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        let response = self
            .write("client::set", key.as_ref(), value.as_ref(), None, |r| r)
            .await?;
        Ok(normalize_set_action(response))
    }

    pub async fn set_with_lease(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
        lease: LeaseId,
    ) -> std::result::Result<Response, ClientApiError> {
        let lease = check_lease(lease)?;
        let response = self
            .write("client::set", key.as_ref(), value.as_ref(), Some(lease), |r| r)
            .await?;
        Ok(normalize_set_action(response))
    }

    /// Replaces the value of an existing key
    ///
    /// Fails with [`StoreErrorCode::KeyNotFound`] when the key is absent.
    pub async fn modify(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        self.write("client::modify", key.as_ref(), value.as_ref(), None, |r| {
            r.param(PARAM_PREV_EXIST, true)
        })
        .await
    }

    pub async fn modify_with_lease(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
        lease: LeaseId,
    ) -> std::result::Result<Response, ClientApiError> {
        let lease = check_lease(lease)?;
        self.write("client::modify", key.as_ref(), value.as_ref(), Some(lease), |r| {
            r.param(PARAM_PREV_EXIST, true)
        })
        .await
    }

    /// Compare-and-swap
    ///
    /// `condition` is either the expected current value (`&str`/`String`) or
    /// the expected `modifiedIndex` (`u64`). On mismatch the store answers
    /// [`StoreErrorCode::TestFailed`] and nothing is written.
    ///
    /// # Example
    /// ```ignore
    /// let first = client.add("/lock", "a").await?;
    /// // index guard
    /// client.modify_if("/lock", "b", first.index()).await?;
    /// // value guard
    /// client.modify_if("/lock", "c", "b").await?;
    /// ```
    pub async fn modify_if(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
        condition: impl Into<Condition>,
    ) -> std::result::Result<Response, ClientApiError> {
        let condition = condition.into();
        self.write("client::modify_if", key.as_ref(), value.as_ref(), None, |r| {
            condition.apply(r)
        })
        .await
    }

    pub async fn modify_if_with_lease(
        &self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
        condition: impl Into<Condition>,
        lease: LeaseId,
    ) -> std::result::Result<Response, ClientApiError> {
        let lease = check_lease(lease)?;
        let condition = condition.into();
        self.write("client::modify_if", key.as_ref(), value.as_ref(), Some(lease), |r| {
            condition.apply(r)
        })
        .await
    }

    /// Deletes a leaf
    pub async fn rm(
        &self,
        key: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let request = keys_request(&self.client_inner.load(), Method::Delete, &key);
        self.execute("client::rm", request).await
    }

    /// Compare-and-delete, guarded like [`modify_if`](Self::modify_if)
    pub async fn rm_if(
        &self,
        key: impl AsRef<str>,
        condition: impl Into<Condition>,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let request = condition
            .into()
            .apply(keys_request(&self.client_inner.load(), Method::Delete, &key));
        self.execute("client::rm_if", request).await
    }

    /// Lists the direct children of a directory, ordered by key
    ///
    /// - a directory that does not exist lists as empty, not as an error
    /// - listing a leaf answers [`StoreErrorCode::NotADirectory`]
    pub async fn ls(
        &self,
        key: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let request = {
            let inner = self.client_inner.load();
            keys_request(&inner, Method::Get, &key)
                .param(PARAM_SORTED, true)
                .param(PARAM_RECURSIVE, false)
                .param_if(inner.config.quorum_reads, PARAM_QUORUM, true)
        };
        let response = self.execute("client::ls", request).await?;

        match response.error_kind() {
            Some(StoreErrorCode::KeyNotFound) => {
                debug!("[:KeyspaceClient:ls] {} does not exist, empty listing", key);
                Ok(Response::empty_listing())
            }
            None if response.is_ok() && !response.value().is_dir() => {
                let code = StoreErrorCode::NotADirectory;
                Ok(Response::store_error(
                    code.code(),
                    code.description().to_string(),
                    Some(key),
                    response.index(),
                ))
            }
            _ => Ok(response),
        }
    }

    /// Creates a directory node
    ///
    /// Fails with [`StoreErrorCode::NodeExists`] when anything already lives
    /// at `key`. Missing ancestors are created by the store.
    pub async fn mkdir(
        &self,
        key: impl AsRef<str>,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let request = keys_request(&self.client_inner.load(), Method::Put, &key)
            .param(PARAM_DIR, true)
            .param(PARAM_PREV_EXIST, false);
        self.execute("client::mkdir", request).await
    }

    /// Removes a directory
    ///
    /// Without `recursive` only an empty directory can be removed
    /// ([`StoreErrorCode::DirectoryNotEmpty`] otherwise); with it the whole
    /// subtree goes.
    pub async fn rmdir(
        &self,
        key: impl AsRef<str>,
        recursive: bool,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let request = keys_request(&self.client_inner.load(), Method::Delete, &key)
            .param(PARAM_DIR, true)
            .param_if(recursive, PARAM_RECURSIVE, true);
        self.execute("client::rmdir", request).await
    }

    async fn write(
        &self,
        operation: &'static str,
        key: &str,
        value: &str,
        lease: Option<LeaseId>,
        guard: impl FnOnce(StoreRequest) -> StoreRequest,
    ) -> std::result::Result<Response, ClientApiError> {
        let key = normalize_key(key)?;
        let request = keys_request(&self.client_inner.load(), Method::Put, &key)
            .param(PARAM_VALUE, value);
        let request = match lease {
            Some(lease) => request.param(PARAM_LEASE, lease),
            None => request,
        };
        let response = self.execute(operation, guard(request)).await?;

        match lease {
            Some(lease) if response.is_ok() && response.value().lease() != Some(lease) => {
                error!(
                    "[:KeyspaceClient:{}] {} written without lease {}, store reported {:?}",
                    operation,
                    key,
                    lease,
                    response.value().lease()
                );
                Err(ClientApiError::invalid_response(
                    None,
                    format!(
                        "store did not bind {key} to lease {lease}; it does not support leases on the key space"
                    ),
                ))
            }
            _ => Ok(response),
        }
    }

    pub(super) async fn execute(
        &self,
        operation: &'static str,
        request: StoreRequest,
    ) -> std::result::Result<Response, ClientApiError> {
        let inner = self.client_inner.load_full();
        dispatch(&inner, operation, request).await
    }
}

/// Sends one request and decodes the reply, bounded by the request's own
/// deadline.
pub(super) async fn dispatch(
    inner: &ClientInner,
    operation: &'static str,
    request: StoreRequest,
) -> std::result::Result<Response, ClientApiError> {
    let _timer = ScopedTimer::new(operation);
    REQUESTS_TOTAL.with_label_values(&[operation]).inc();

    let deadline = request.timeout;
    let result = match timeout(deadline, inner.transport.request(request)).await {
        Ok(Ok(reply)) => Response::from_reply(&reply),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ClientApiError::timeout(operation, deadline)),
    };

    match &result {
        Ok(response) => {
            if !response.is_ok() {
                STORE_ERRORS_TOTAL
                    .with_label_values(&[operation, &response.error_code().to_string()])
                    .inc();
            }
            debug!("[:KeyspaceClient:{}] response: {:?}", operation, response);
        }
        Err(e) if e.is_timeout() => {
            TRANSPORT_FAILURES_TOTAL.with_label_values(&[operation]).inc();
            debug!("[:KeyspaceClient:{}] timed out: {:?}", operation, e);
        }
        Err(e) => {
            TRANSPORT_FAILURES_TOTAL.with_label_values(&[operation]).inc();
            error!("[:KeyspaceClient:{}] failed: {:?}", operation, e);
        }
    }
    result
}

pub(super) fn keys_request(
    inner: &ClientInner,
    method: Method,
    key: &str,
) -> StoreRequest {
    let path = format!("{}{}", inner.config.keys_prefix, key);
    StoreRequest::new(method, path, inner.config.request_timeout())
}

/// An upsert that found nothing to overwrite is reported as a creation
fn normalize_set_action(mut response: Response) -> Response {
    if response.is_ok() && *response.action() == Action::Set && !response.has_prev_value() {
        response.set_action(Action::Create);
    }
    response
}
