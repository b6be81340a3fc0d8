//! Response/Node model.
//!
//! Normalizes whatever the store answered into one uniform [`Response`]:
//! an error code (0 on success), the verb performed, the post-state node,
//! the pre-state node for modifying operations, and the version index that
//! a caller feeds back into the next conditional operation.

mod action;
mod codec;
mod error_code;
mod node;

pub use action::*;
pub use error_code::*;
pub use node::*;


/// Store-level refusal, as an inspectable value.
///
/// Produced by [`Response::into_result`] for callers that prefer `?` over
/// branching on [`Response::error_code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Store error {code}: {message}")]
pub struct StoreError {
    pub code: u32,
    pub kind: Option<StoreErrorCode>,
    pub message: String,
    pub cause: Option<String>,
    pub index: u64,
}

/// Result of one key-space operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    error_code: u32,
    error_message: String,
    error_cause: Option<String>,
    action: Action,
    node: Node,
    prev_node: Node,
    values: Vec<Node>,
    index: u64,
    pub(crate) store_index: Option<u64>,
}

impl Response {
    /// 0 on success, the store's error code otherwise
    pub fn error_code(&self) -> u32 {
        self.error_code
    }

    /// Typed view over [`error_code`](Self::error_code); `None` on success
    /// and for codes this client does not know
    pub fn error_kind(&self) -> Option<StoreErrorCode> {
        if self.error_code == 0 {
            return None;
        }
        StoreErrorCode::try_from(self.error_code).ok()
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Key or detail the store blamed for the error
    pub fn error_cause(&self) -> Option<&str> {
        self.error_cause.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Post-state of the affected node
    pub fn value(&self) -> &Node {
        &self.node
    }

    /// Pre-state of the affected node; empty when there was none
    pub fn prev_value(&self) -> &Node {
        &self.prev_node
    }

    pub fn has_prev_value(&self) -> bool {
        !self.prev_node.is_empty()
    }

    /// Version index of this operation's effect, the CAS token for the next
    /// conditional operation
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Store-wide index when the reply was produced, if the store reported
    /// it. Unlike [`index`](Self::index) this also counts changes to other
    /// keys.
    pub fn store_index(&self) -> Option<u64> {
        self.store_index
    }

    /// Children of a listed directory, ordered by key
    pub fn values(&self) -> &[Node] {
        &self.values
    }

    pub fn keys(&self) -> Vec<&str> {
        self.values.iter().map(Node::key).collect()
    }

    pub fn into_result(self) -> std::result::Result<Response, StoreError> {
        if self.is_ok() {
            return Ok(self);
        }
        Err(StoreError {
            code: self.error_code,
            kind: self.error_kind(),
            message: self.error_message,
            cause: self.error_cause,
            index: self.index,
        })
    }

    pub(crate) fn store_error(
        code: u32,
        message: String,
        cause: Option<String>,
        index: u64,
    ) -> Self {
        Self {
            error_code: code,
            error_message: message,
            error_cause: cause,
            index,
            ..Self::default()
        }
    }

    pub(crate) fn success(
        action: Action,
        node: Node,
        prev_node: Node,
    ) -> Self {
        let index = node.modified_index();
        let values = node.nodes().to_vec();
        Self {
            action,
            node,
            prev_node,
            values,
            index,
            ..Self::default()
        }
    }

    pub(crate) fn lease_granted(
        lease: crate::LeaseId,
        ttl: i64,
        revision: u64,
    ) -> Self {
        Self {
            action: Action::LeaseGrant,
            node: Node::lease_grant(lease, ttl),
            index: revision,
            ..Self::default()
        }
    }

    /// Listing of a directory that does not exist: nothing here, not an error
    pub(crate) fn empty_listing() -> Self {
        Self {
            action: Action::Get,
            ..Self::default()
        }
    }

    pub(crate) fn set_action(
        &mut self,
        action: Action,
    ) {
        self.action = action;
    }
}
