//! In-memory store speaking the v2 key-space protocol and the lease gateway,
//! plugged in as a [`Transport`] so the integration tests exercise the real
//! request building and reply decoding paths.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use keyspace_client::Client;
use keyspace_client::ClientApiError;
use keyspace_client::ClientConfig;
use keyspace_client::Method;
use keyspace_client::RawReply;
use keyspace_client::StoreErrorCode;
use keyspace_client::StoreRequest;
use keyspace_client::Transport;
use serde_json::json;
use serde_json::Value;
use tokio::sync::watch;

const KEYS_PREFIX: &str = "/v2/keys";
const LEASE_GRANT_PATH: &str = "/v3/lease/grant";

#[derive(Debug, Clone)]
struct Stored {
    value: Option<String>,
    dir: bool,
    created_index: u64,
    modified_index: u64,
    lease: Option<i64>,
    ttl: Option<i64>,
}

#[derive(Debug, Clone)]
struct Event {
    index: u64,
    key: String,
    action: &'static str,
    node: Value,
    prev_node: Option<Value>,
}

#[derive(Default)]
struct State {
    index: u64,
    nodes: BTreeMap<String, Stored>,
    history: Vec<Event>,
    leases: HashMap<i64, i64>,
    next_lease: i64,
    requests: usize,
}

pub struct MemoryStore {
    state: Mutex<State>,
    changed: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        let (changed, _) = watch::channel(0);
        Arc::new(Self {
            state: Mutex::new(State {
                next_lease: 7_587_862_072_907_038_000,
                ..State::default()
            }),
            changed,
        })
    }

    pub fn client(self: &Arc<Self>) -> Client {
        Client::with_transport(self.clone(), ClientConfig::default())
    }

    pub fn client_with_config(
        self: &Arc<Self>,
        config: ClientConfig,
    ) -> Client {
        Client::with_transport(self.clone(), config)
    }

    /// Current store-wide index
    pub fn index(&self) -> u64 {
        self.lock().index
    }

    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    async fn wait_for_event(
        &self,
        key: String,
        recursive: bool,
        wait_index: Option<u64>,
    ) -> RawReply {
        let mut changed = self.changed.subscribe();
        let since = {
            let state = self.lock();
            wait_index.unwrap_or(state.index + 1)
        };

        loop {
            {
                let state = self.lock();
                if let Some(event) = state
                    .history
                    .iter()
                    .find(|e| e.index >= since && matches_watch(&e.key, &key, recursive))
                {
                    let mut body = json!({ "action": event.action, "node": event.node });
                    if let Some(prev) = &event.prev_node {
                        body["prevNode"] = prev.clone();
                    }
                    return RawReply::new(200, body.to_string());
                }
            }
            if changed.changed().await.is_err() {
                return RawReply::new(500, "");
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryStore {
    async fn request(
        &self,
        request: StoreRequest,
    ) -> std::result::Result<RawReply, ClientApiError> {
        self.lock().requests += 1;

        if request.path == LEASE_GRANT_PATH && request.method == Method::Post {
            return Ok(self.lease_grant(&request));
        }

        let Some(key) = request.path.strip_prefix(KEYS_PREFIX) else {
            return Ok(RawReply::new(404, "404 page not found"));
        };
        let key = if key.is_empty() { "/".to_string() } else { key.to_string() };

        let reply = match request.method {
            Method::Get if flag(&request, "wait") => {
                let wait_index = request.get_param("waitIndex").and_then(|i| i.parse().ok());
                self.wait_for_event(key, flag(&request, "recursive"), wait_index)
                    .await
            }
            Method::Get => self.get(&key),
            Method::Put if flag(&request, "dir") => self.mkdir(&key, &request),
            Method::Put => self.put(&key, &request),
            Method::Delete => self.delete(&key, &request),
            Method::Post => RawReply::new(405, "Method Not Allowed"),
        };
        Ok(reply.with_store_index(self.index()))
    }
}

impl MemoryStore {
    fn lease_grant(
        &self,
        request: &StoreRequest,
    ) -> RawReply {
        let ttl: i64 = request.get_param("TTL").and_then(|t| t.parse().ok()).unwrap_or(0);
        if ttl <= 0 {
            return RawReply::new(
                400,
                json!({"error": "etcdserver: invalid ttl", "code": 3, "message": "etcdserver: invalid ttl"})
                    .to_string(),
            );
        }

        let mut state = self.lock();
        state.next_lease += 1;
        let id = state.next_lease;
        state.leases.insert(id, ttl);
        let body = json!({
            "header": { "cluster_id": "14841639068965178418", "revision": state.index.to_string() },
            "ID": id.to_string(),
            "TTL": ttl.to_string(),
        });
        RawReply::new(200, body.to_string())
    }

    fn get(
        &self,
        key: &str,
    ) -> RawReply {
        let state = self.lock();
        if key == "/" {
            let node = json!({ "dir": true, "nodes": children_json(&state, "/") });
            return RawReply::new(200, json!({ "action": "get", "node": node }).to_string());
        }
        match state.nodes.get(key) {
            None => error_reply(StoreErrorCode::KeyNotFound, key, state.index),
            Some(stored) => {
                let mut node = node_json(key, stored);
                if stored.dir {
                    node["nodes"] = Value::Array(children_json(&state, key));
                }
                RawReply::new(200, json!({ "action": "get", "node": node }).to_string())
            }
        }
    }

    fn mkdir(
        &self,
        key: &str,
        request: &StoreRequest,
    ) -> RawReply {
        let mut state = self.lock();
        if key == "/" {
            return error_reply(StoreErrorCode::RootReadOnly, "/", state.index);
        }
        if state.nodes.contains_key(key) {
            if request.get_param("prevExist") == Some("false") {
                return error_reply(StoreErrorCode::NodeExists, key, state.index);
            }
            return error_reply(StoreErrorCode::NotAFile, key, state.index);
        }
        if let Err(reply) = ensure_parents(&mut state, key) {
            return reply;
        }

        let index = state.index + 1;
        let stored = Stored {
            value: None,
            dir: true,
            created_index: index,
            modified_index: index,
            lease: None,
            ttl: None,
        };
        self.commit(state, key, "create", stored, None)
    }

    fn put(
        &self,
        key: &str,
        request: &StoreRequest,
    ) -> RawReply {
        let mut state = self.lock();
        if key == "/" {
            return error_reply(StoreErrorCode::RootReadOnly, "/", state.index);
        }
        let value = request.get_param("value").unwrap_or_default().to_string();
        let existing = state.nodes.get(key).cloned();

        let prev_exist = request.get_param("prevExist");
        if prev_exist == Some("false") && existing.is_some() {
            return error_reply(StoreErrorCode::NodeExists, key, state.index);
        }
        if existing.as_ref().is_some_and(|s| s.dir) {
            return error_reply(StoreErrorCode::NotAFile, key, state.index);
        }

        let prev_value = request.get_param("prevValue");
        let prev_index = request.get_param("prevIndex");

        let action = if prev_value.is_some() || prev_index.is_some() {
            let Some(current) = existing.as_ref() else {
                return error_reply(StoreErrorCode::KeyNotFound, key, state.index);
            };
            if let Some(cause) = compare(current, prev_value, prev_index) {
                return error_reply(StoreErrorCode::TestFailed, &cause, state.index);
            }
            "compareAndSwap"
        } else {
            match (prev_exist, existing.is_some()) {
                (Some("false"), true) => {
                    return error_reply(StoreErrorCode::NodeExists, key, state.index)
                }
                (Some("false"), false) => "create",
                (Some("true"), false) => {
                    return error_reply(StoreErrorCode::KeyNotFound, key, state.index)
                }
                (Some("true"), true) => "update",
                _ => "set",
            }
        };

        let lease = request.get_param("lease").and_then(|l| l.parse::<i64>().ok());
        let ttl = match lease {
            Some(id) => match state.leases.get(&id) {
                Some(ttl) => Some(*ttl),
                None => {
                    return error_reply(StoreErrorCode::InvalidField, "lease not found", state.index)
                }
            },
            None => None,
        };

        if existing.is_none() {
            if let Err(reply) = ensure_parents(&mut state, key) {
                return reply;
            }
        }

        let index = state.index + 1;
        let prev_node = existing.as_ref().map(|s| node_json(key, s));
        let stored = Stored {
            value: Some(value),
            dir: false,
            created_index: existing.as_ref().map(|s| s.created_index).unwrap_or(index),
            modified_index: index,
            lease,
            ttl,
        };
        self.commit(state, key, action, stored, prev_node)
    }

    fn delete(
        &self,
        key: &str,
        request: &StoreRequest,
    ) -> RawReply {
        let mut state = self.lock();
        if key == "/" {
            return error_reply(StoreErrorCode::RootReadOnly, "/", state.index);
        }
        let Some(existing) = state.nodes.get(key).cloned() else {
            return error_reply(StoreErrorCode::KeyNotFound, key, state.index);
        };

        let dir_requested = flag(request, "dir") || flag(request, "recursive");
        let mut action = "delete";
        if existing.dir {
            if !dir_requested {
                return error_reply(StoreErrorCode::NotAFile, key, state.index);
            }
            let has_children = state.nodes.keys().any(|k| is_descendant(k, key));
            if has_children && !flag(request, "recursive") {
                return error_reply(StoreErrorCode::DirectoryNotEmpty, key, state.index);
            }
        } else {
            let prev_value = request.get_param("prevValue");
            let prev_index = request.get_param("prevIndex");
            if prev_value.is_some() || prev_index.is_some() {
                if let Some(cause) = compare(&existing, prev_value, prev_index) {
                    return error_reply(StoreErrorCode::TestFailed, &cause, state.index);
                }
                action = "compareAndDelete";
            }
        }

        state.nodes.retain(|k, _| k != key && !is_descendant(k, key));

        state.index += 1;
        let index = state.index;
        let mut node = json!({
            "key": key,
            "modifiedIndex": index,
            "createdIndex": existing.created_index,
        });
        if existing.dir {
            node["dir"] = json!(true);
        }
        let prev_node = node_json(key, &existing);
        state.history.push(Event {
            index,
            key: key.to_string(),
            action,
            node: node.clone(),
            prev_node: Some(prev_node.clone()),
        });
        drop(state);
        self.changed.send_replace(index);

        let body = json!({ "action": action, "node": node, "prevNode": prev_node });
        RawReply::new(200, body.to_string())
    }

    fn commit(
        &self,
        mut state: MutexGuard<'_, State>,
        key: &str,
        action: &'static str,
        stored: Stored,
        prev_node: Option<Value>,
    ) -> RawReply {
        state.index = stored.modified_index;
        let node = node_json(key, &stored);
        state.nodes.insert(key.to_string(), stored);
        let event_index = state.index;
        state.history.push(Event {
            index: event_index,
            key: key.to_string(),
            action,
            node: node.clone(),
            prev_node: prev_node.clone(),
        });
        let index = state.index;
        drop(state);
        self.changed.send_replace(index);

        let mut body = json!({ "action": action, "node": node });
        if let Some(prev) = prev_node {
            body["prevNode"] = prev;
        }
        let status = if action == "create" { 201 } else { 200 };
        RawReply::new(status, body.to_string())
    }
}

fn flag(
    request: &StoreRequest,
    name: &str,
) -> bool {
    request.get_param(name) == Some("true")
}

fn compare(
    current: &Stored,
    prev_value: Option<&str>,
    prev_index: Option<&str>,
) -> Option<String> {
    if let Some(expected) = prev_value {
        let actual = current.value.as_deref().unwrap_or_default();
        if expected != actual {
            return Some(format!("[{expected} != {actual}]"));
        }
    }
    if let Some(expected) = prev_index {
        if expected.parse::<u64>().ok() != Some(current.modified_index) {
            return Some(format!("[{expected} != {}]", current.modified_index));
        }
    }
    None
}

/// Creates missing ancestors as directories; fails if one of them is a leaf
fn ensure_parents(
    state: &mut State,
    key: &str,
) -> std::result::Result<(), RawReply> {
    let mut missing = Vec::new();
    let mut current = parent(key);
    while current != "/" {
        match state.nodes.get(current) {
            Some(stored) if !stored.dir => {
                return Err(error_reply(StoreErrorCode::NotADirectory, current, state.index))
            }
            Some(_) => break,
            None => missing.push(current.to_string()),
        }
        current = parent(current);
    }

    let index = state.index + 1;
    for dir in missing {
        state.nodes.insert(
            dir,
            Stored {
                value: None,
                dir: true,
                created_index: index,
                modified_index: index,
                lease: None,
                ttl: None,
            },
        );
    }
    Ok(())
}

fn parent(key: &str) -> &str {
    match key.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &key[..pos],
    }
}

fn is_descendant(
    key: &str,
    dir: &str,
) -> bool {
    key.len() > dir.len() && key.starts_with(dir) && key.as_bytes()[dir.len()] == b'/'
}

fn is_under(
    key: &str,
    dir: &str,
) -> bool {
    dir == "/" || key == dir || is_descendant(key, dir)
}

fn matches_watch(
    event_key: &str,
    watched: &str,
    recursive: bool,
) -> bool {
    event_key == watched || (recursive && is_under(event_key, watched))
}

fn node_json(
    key: &str,
    stored: &Stored,
) -> Value {
    let mut node = json!({
        "key": key,
        "modifiedIndex": stored.modified_index,
        "createdIndex": stored.created_index,
    });
    if stored.dir {
        node["dir"] = json!(true);
    } else {
        node["value"] = json!(stored.value.clone().unwrap_or_default());
    }
    if let Some(lease) = stored.lease {
        node["lease"] = json!(lease);
    }
    if let Some(ttl) = stored.ttl {
        node["ttl"] = json!(ttl);
    }
    node
}

fn children_json(
    state: &State,
    dir: &str,
) -> Vec<Value> {
    // unsorted on purpose: ordering is the client's job
    let mut children: Vec<Value> = state
        .nodes
        .iter()
        .filter(|(k, _)| parent(k) == dir)
        .map(|(k, s)| node_json(k, s))
        .collect();
    children.reverse();
    children
}

fn error_reply(
    code: StoreErrorCode,
    cause: &str,
    index: u64,
) -> RawReply {
    let status = match code {
        StoreErrorCode::KeyNotFound => 404,
        StoreErrorCode::TestFailed | StoreErrorCode::NodeExists => 412,
        StoreErrorCode::NotAFile
        | StoreErrorCode::NotADirectory
        | StoreErrorCode::DirectoryNotEmpty
        | StoreErrorCode::RootReadOnly => 403,
        _ => 400,
    };
    let body = json!({
        "errorCode": code.code(),
        "message": code.description(),
        "cause": cause,
        "index": index,
    });
    RawReply::new(status, body.to_string())
}
