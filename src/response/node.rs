use serde::Deserialize;

use super::codec::lenient_i64;
use crate::LeaseId;

/// Typed view over one stored item.
///
/// A node is either a directory (children, no value) or a leaf (value, no
/// children). Conversion from the wire shape enforces this; a directory
/// never exposes a value and a leaf never exposes children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    key: String,
    value: Option<String>,
    dir: bool,
    nodes: Vec<Node>,
    created_index: u64,
    modified_index: u64,
    ttl: Option<i64>,
    expiration: Option<String>,
    lease: Option<LeaseId>,
}

impl Node {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Payload of a leaf, `None` for directories and absent nodes
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Payload of a leaf, or `""` when there is none.
    ///
    /// "No previous value" is a valid state, so callers comparing a
    /// `prev_value()` against a string get an empty string rather than a
    /// failure.
    pub fn as_string(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn is_dir(&self) -> bool {
        self.dir
    }

    /// Immediate children, ordered by key. Empty for leaves.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn created_index(&self) -> u64 {
        self.created_index
    }

    /// Version index of the last mutation of this key
    pub fn modified_index(&self) -> u64 {
        self.modified_index
    }

    /// Remaining seconds before expiry, as reported by the store
    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    pub fn expiration(&self) -> Option<&str> {
        self.expiration.as_deref()
    }

    pub fn lease(&self) -> Option<LeaseId> {
        self.lease
    }

    /// True when the reply carried no node at all
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.value.is_none() && !self.dir && self.lease.is_none()
    }

    pub(crate) fn lease_grant(
        lease: LeaseId,
        ttl: i64,
    ) -> Self {
        Self {
            lease: Some(lease),
            ttl: Some(ttl),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawNode {
    #[serde(default)]
    key: String,
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    created_index: u64,
    #[serde(default)]
    modified_index: u64,
    #[serde(default, deserialize_with = "lenient_i64")]
    ttl: Option<i64>,
    expiration: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    lease: Option<i64>,
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        let (value, mut nodes) = if raw.dir {
            (None, raw.nodes.into_iter().map(Node::from).collect::<Vec<_>>())
        } else {
            (raw.value, Vec::new())
        };
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        Self {
            key: raw.key,
            value,
            dir: raw.dir,
            nodes,
            created_index: raw.created_index,
            modified_index: raw.modified_index,
            ttl: raw.ttl,
            expiration: raw.expiration,
            // lease id 0 means "no lease" on the wire
            lease: raw.lease.filter(|id| *id > 0),
        }
    }
}
