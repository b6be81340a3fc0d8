//! Long-poll watches.
//!
//! A watch is one `wait=true` read that the store holds open until a
//! qualifying change happens or the watch timeout elapses. Each watch runs
//! on its own task so it never blocks other operations, and is registered
//! in the client's watch registry so it can be cancelled individually or
//! in bulk.
//!
//! Exactly one terminal outcome is ever observed per watch. The request
//! task and any canceller race on a single atomic state word; whoever moves
//! it out of `PENDING` first decides the outcome, and a reply that arrives
//! after a successful cancel is dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use futures::Stream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::keyspace::dispatch;
use super::ClientInner;
use crate::constants::PARAM_RECURSIVE;
use crate::constants::PARAM_WAIT;
use crate::constants::PARAM_WAIT_INDEX;
use crate::metrics::OUTSTANDING_WATCHES;
use crate::utils::key::normalize_key;
use crate::ClientApiError;
use crate::KeyspaceClient;
use crate::Method;
use crate::Response;
use crate::StoreRequest;

const PENDING: u8 = 0;
const RESOLVED: u8 = 1;
const CANCELLED: u8 = 2;

/// Terminal outcome of one watch
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    /// The store reported one change (or a store-level error such as an
    /// expired `waitIndex`)
    Delivered(Response),
    /// The watch was cancelled before anything was delivered
    Cancelled,
    /// Transport fault, including the watch timeout
    Failed(ClientApiError),
}

impl WatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, WatchOutcome::Delivered(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WatchOutcome::Cancelled)
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            WatchOutcome::Delivered(response) => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            WatchOutcome::Delivered(response) => Some(response),
            _ => None,
        }
    }
}

pub(crate) struct WatchState {
    decided: AtomicU8,
    token: CancellationToken,
}

impl WatchState {
    fn new() -> Self {
        Self {
            decided: AtomicU8::new(PENDING),
            token: CancellationToken::new(),
        }
    }

    /// True if this call decided the outcome
    fn cancel(&self) -> bool {
        let won = self
            .decided
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.token.cancel();
        won
    }

    fn resolve(&self) -> bool {
        self.decided
            .compare_exchange(PENDING, RESOLVED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    watches: DashMap<u64, Arc<WatchState>>,
}

/// Outstanding watches of one client.
///
/// Shared by every clone of the client. Entries are inserted before the
/// request task is spawned and removed when that task finishes.
#[derive(Clone, Default)]
pub(crate) struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.watches.len()
    }

    /// Cancels every outstanding watch, returning how many were still pending
    pub(crate) fn cancel_all(&self) -> usize {
        let states: Vec<Arc<WatchState>> = self
            .inner
            .watches
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        states.iter().filter(|s| s.cancel()).count()
    }

    pub(crate) fn spawn(
        &self,
        client_inner: Arc<ClientInner>,
        key: String,
        request: StoreRequest,
    ) -> WatchHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let state = Arc::new(WatchState::new());

        self.inner.watches.insert(id, state.clone());
        OUTSTANDING_WATCHES.inc();
        let registration = Registration {
            id,
            registry: self.inner.clone(),
        };

        let task_state = state.clone();
        let task = tokio::spawn(async move {
            let _registration = registration;

            let result = tokio::select! {
                biased;
                _ = task_state.token.cancelled() => None,
                result = dispatch(&client_inner, "client::watch", request) => Some(result),
            };

            match result {
                Some(result) if task_state.resolve() => match result {
                    Ok(response) => WatchOutcome::Delivered(response),
                    Err(e) => WatchOutcome::Failed(e),
                },
                Some(_) => {
                    debug!("[:Watch:{}] reply arrived after cancel, discarded", id);
                    WatchOutcome::Cancelled
                }
                None => {
                    trace!("[:Watch:{}] cancelled while pending", id);
                    WatchOutcome::Cancelled
                }
            }
        });

        WatchHandle {
            id,
            key,
            state,
            task,
        }
    }
}

struct Registration {
    id: u64,
    registry: Arc<RegistryInner>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.watches.remove(&self.id).is_some() {
            OUTSTANDING_WATCHES.dec();
        }
    }
}

/// One outstanding watch.
///
/// Await it (or call [`wait`](Self::wait)) for the [`WatchOutcome`].
/// Dropping the handle cancels the watch.
pub struct WatchHandle {
    id: u64,
    key: String,
    state: Arc<WatchState>,
    task: JoinHandle<WatchOutcome>,
}

impl WatchHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cancels the watch
    ///
    /// Returns true if this call decided the outcome, in which case the
    /// handle resolves to [`WatchOutcome::Cancelled`]. False means the watch
    /// had already been resolved or cancelled.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    /// Non-blocking completion check
    pub fn is_done(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> WatchOutcome {
        self.await
    }
}

impl Future for WatchHandle {
    type Output = WatchOutcome;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // runtime shutting down
            Poll::Ready(Err(_)) => Poll::Ready(WatchOutcome::Cancelled),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.state.cancel();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("done", &self.is_done())
            .finish()
    }
}

impl KeyspaceClient {
    /// Waits for the next change at `key`
    ///
    /// - `since_index`: replay the first change at or after this index
    ///   instead of waiting for one after "now"
    /// - `recursive`: match any key under `key`, not only `key` itself
    ///
    /// The request starts immediately on its own task; it must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    /// - [`ClientApiError::InvalidArgument`] for a malformed key
    pub fn watch(
        &self,
        key: impl AsRef<str>,
        since_index: Option<u64>,
        recursive: bool,
    ) -> std::result::Result<WatchHandle, ClientApiError> {
        let key = normalize_key(key.as_ref())?;
        let client_inner = self.client_inner.load_full();

        let path = format!("{}{}", client_inner.config.keys_prefix, key);
        let mut request = StoreRequest::new(Method::Get, path, client_inner.config.watch_timeout())
            .param(PARAM_WAIT, true)
            .param_if(recursive, PARAM_RECURSIVE, true);
        if let Some(index) = since_index {
            request = request.param(PARAM_WAIT_INDEX, index);
        }

        Ok(self.watches.spawn(client_inner, key, request))
    }

    /// Continuous observation built from single-shot watches
    ///
    /// After each delivered change the next watch starts at `index() + 1`,
    /// so no event is skipped between two watches. Without `since_index`
    /// the stream first reads `key` and starts after the store-wide index
    /// of that read (the node's own index when the store does not report
    /// one), so watches re-armed after a timeout still resume from a fixed
    /// point. Watch timeouts re-arm silently. The stream ends after
    /// yielding a transport failure or a store error, and ends without an
    /// item when the watch is cancelled.
    pub fn watch_stream(
        &self,
        key: impl AsRef<str>,
        since_index: Option<u64>,
        recursive: bool,
    ) -> impl Stream<Item = std::result::Result<Response, ClientApiError>> + Send + 'static {
        let client = self.clone();
        let key = key.as_ref().to_string();

        futures::stream::unfold(StreamState::Start(since_index), move |state| {
            let client = client.clone();
            let key = key.clone();
            async move {
                let since = match state {
                    StreamState::Start(Some(index)) => index,
                    StreamState::Start(None) => match client.stream_anchor(&key).await {
                        Ok(index) => index,
                        Err(e) => return Some((Err(e), StreamState::Done)),
                    },
                    StreamState::Resume(index) => index,
                    StreamState::Exhausted(index) => {
                        return Some((Err(index_exhausted(index)), StreamState::Done));
                    }
                    StreamState::Done => return None,
                };

                loop {
                    let handle = match client.watch(&key, Some(since), recursive) {
                        Ok(handle) => handle,
                        Err(e) => return Some((Err(e), StreamState::Done)),
                    };

                    match handle.await {
                        WatchOutcome::Delivered(response) if response.is_ok() => {
                            let index = response.index();
                            let next = match index.checked_add(1) {
                                Some(next) => StreamState::Resume(next),
                                None => StreamState::Exhausted(index),
                            };
                            return Some((Ok(response), next));
                        }
                        WatchOutcome::Delivered(response) => {
                            return Some((Ok(response), StreamState::Done));
                        }
                        WatchOutcome::Failed(e) if e.is_timeout() => {
                            debug!(
                                "[:KeyspaceClient:watch_stream] {} timed out, re-arming at {}",
                                key, since
                            );
                        }
                        WatchOutcome::Failed(e) => return Some((Err(e), StreamState::Done)),
                        WatchOutcome::Cancelled => return None,
                    }
                }
            }
        })
    }

    /// First index a stream without a starting point waits from
    async fn stream_anchor(
        &self,
        key: &str,
    ) -> std::result::Result<u64, ClientApiError> {
        let response = self.get(key).await?;
        let current = response.store_index().unwrap_or_else(|| response.index());
        current.checked_add(1).ok_or_else(|| index_exhausted(current))
    }

    /// Cancels every outstanding watch issued through this client or its
    /// clones, returning how many were cancelled
    pub fn cancel_operations(&self) -> usize {
        let cancelled = self.watches.cancel_all();
        debug!("[:KeyspaceClient:cancel_operations] cancelled {} watches", cancelled);
        cancelled
    }

    pub fn outstanding_watches(&self) -> usize {
        self.watches.len()
    }
}

enum StreamState {
    Start(Option<u64>),
    Resume(u64),
    Exhausted(u64),
    Done,
}

fn index_exhausted(index: u64) -> ClientApiError {
    ClientApiError::invalid_response(None, format!("store index {index} cannot advance"))
}
