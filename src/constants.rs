// -
// Store layout defaults

pub(crate) const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:2379";
pub(crate) const DEFAULT_KEYS_PREFIX: &str = "/v2/keys";
pub(crate) const DEFAULT_LEASE_GRANT_PATH: &str = "/v3/lease/grant";

/// Reply header carrying the store-wide index
pub(crate) const STORE_INDEX_HEADER: &str = "X-Etcd-Index";

// -
// Key-space request parameters

pub(crate) const PARAM_VALUE: &str = "value";
pub(crate) const PARAM_PREV_EXIST: &str = "prevExist";
pub(crate) const PARAM_PREV_VALUE: &str = "prevValue";
pub(crate) const PARAM_PREV_INDEX: &str = "prevIndex";
pub(crate) const PARAM_LEASE: &str = "lease";
pub(crate) const PARAM_DIR: &str = "dir";
pub(crate) const PARAM_RECURSIVE: &str = "recursive";
pub(crate) const PARAM_SORTED: &str = "sorted";
pub(crate) const PARAM_QUORUM: &str = "quorum";
pub(crate) const PARAM_WAIT: &str = "wait";
pub(crate) const PARAM_WAIT_INDEX: &str = "waitIndex";

// -
// Lease gateway request parameters

pub(crate) const PARAM_LEASE_TTL: &str = "TTL";
pub(crate) const PARAM_LEASE_ID: &str = "ID";
