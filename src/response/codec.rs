//! Decoding of raw store replies into [`Response`].
//!
//! Three reply shapes exist on the wire: key-space results
//! (`action`/`node`/`prevNode`), key-space errors (`errorCode`/`message`)
//! and lease-gateway results (`header`/`ID`/`TTL`, or `error`/`code`).
//! The shape is recognized from the JSON object itself, so decoding does
//! not depend on which operation was issued.

use serde::Deserialize;
use serde::Deserializer;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use super::Action;
use super::Node;
use super::RawNode;
use super::Response;
use super::StoreErrorCode;
use crate::ClientApiError;
use crate::RawReply;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeysReply {
    #[serde(default)]
    action: String,
    node: Option<RawNode>,
    prev_node: Option<RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStoreError {
    error_code: u32,
    #[serde(default)]
    message: String,
    cause: Option<String>,
    #[serde(default)]
    index: u64,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(default, deserialize_with = "lenient_i64")]
    revision: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawLeaseGrant {
    header: Option<RawHeader>,
    #[serde(rename = "ID", default, deserialize_with = "lenient_i64")]
    id: Option<i64>,
    #[serde(rename = "TTL", default, deserialize_with = "lenient_i64")]
    ttl: Option<i64>,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct RawGatewayError {
    error: Option<String>,
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    code: Option<i64>,
}

// gRPC status codes the lease gateway reports for bad input
const GRPC_INVALID_ARGUMENT: i64 = 3;
const GRPC_OUT_OF_RANGE: i64 = 11;

impl Response {
    /// Maps a raw store reply into exactly one [`Response`].
    ///
    /// # Errors
    /// [`ClientApiError::Protocol`] when the body is empty, is not a JSON
    /// object, or is a failure status without a recognizable error body.
    pub fn from_reply(reply: &RawReply) -> std::result::Result<Response, ClientApiError> {
        let status = reply.status;
        let body = reply.body.trim();
        if body.is_empty() {
            return Err(ClientApiError::invalid_response(
                Some(status),
                "empty reply body",
            ));
        }

        let value: Value = serde_json::from_str(body).map_err(|e| {
            ClientApiError::invalid_response(Some(status), format!("Malformed reply: {e}"))
        })?;
        let Value::Object(object) = value else {
            return Err(ClientApiError::invalid_response(
                Some(status),
                "reply is not a JSON object",
            ));
        };

        let mut response = match ReplyShape::of(&object, status) {
            ReplyShape::StoreError => decode_store_error(object, status),
            ReplyShape::LeaseGrant => decode_lease_grant(object, status),
            ReplyShape::GatewayError => decode_gateway_error(object, status),
            ReplyShape::Keys => decode_keys(object, status),
            ReplyShape::Unknown => Err(ClientApiError::invalid_response(
                Some(status),
                format!("unrecognized failure reply: {body}"),
            )),
        }?;
        response.store_index = reply.store_index;
        Ok(response)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReplyShape {
    StoreError,
    LeaseGrant,
    GatewayError,
    Keys,
    Unknown,
}

impl ReplyShape {
    fn of(
        object: &Map<String, Value>,
        status: u16,
    ) -> Self {
        let success = (200..300).contains(&status);
        if object.contains_key("errorCode") {
            ReplyShape::StoreError
        } else if object.contains_key("ID") || object.contains_key("TTL") {
            ReplyShape::LeaseGrant
        } else if object.contains_key("error") || (!success && object.contains_key("code")) {
            ReplyShape::GatewayError
        } else if success || object.contains_key("action") {
            ReplyShape::Keys
        } else {
            ReplyShape::Unknown
        }
    }
}

fn decode_keys(
    object: Map<String, Value>,
    status: u16,
) -> std::result::Result<Response, ClientApiError> {
    let raw: RawKeysReply = from_object(object, status)?;
    let node = raw.node.map(Node::from).unwrap_or_default();
    let prev_node = raw.prev_node.map(Node::from).unwrap_or_default();
    Ok(Response::success(Action::parse(&raw.action), node, prev_node))
}

fn decode_store_error(
    object: Map<String, Value>,
    status: u16,
) -> std::result::Result<Response, ClientApiError> {
    let raw: RawStoreError = from_object(object, status)?;
    debug!(
        code = raw.error_code,
        message = %raw.message,
        cause = ?raw.cause,
        "store refused request"
    );
    Ok(Response::store_error(
        raw.error_code,
        raw.message,
        raw.cause,
        raw.index,
    ))
}

fn decode_lease_grant(
    object: Map<String, Value>,
    status: u16,
) -> std::result::Result<Response, ClientApiError> {
    let raw: RawLeaseGrant = from_object(object, status)?;
    if !raw.error.is_empty() {
        return Ok(Response::store_error(
            StoreErrorCode::RaftInternal.code(),
            raw.error,
            None,
            revision(raw.header.as_ref()),
        ));
    }

    let Some(id) = raw.id.filter(|id| *id > 0) else {
        return Err(ClientApiError::invalid_response(
            Some(status),
            "lease grant reply without a lease id",
        ));
    };

    Ok(Response::lease_granted(
        id,
        raw.ttl.unwrap_or_default(),
        revision(raw.header.as_ref()),
    ))
}

fn decode_gateway_error(
    object: Map<String, Value>,
    status: u16,
) -> std::result::Result<Response, ClientApiError> {
    let raw: RawGatewayError = from_object(object, status)?;
    let code = match raw.code {
        Some(GRPC_INVALID_ARGUMENT) | Some(GRPC_OUT_OF_RANGE) => StoreErrorCode::InvalidField,
        _ => StoreErrorCode::RaftInternal,
    };
    let message = raw
        .message
        .or(raw.error)
        .unwrap_or_else(|| code.description().to_string());

    Ok(Response::store_error(code.code(), message, None, 0))
}

fn revision(header: Option<&RawHeader>) -> u64 {
    header
        .and_then(|h| h.revision)
        .and_then(|r| u64::try_from(r).ok())
        .unwrap_or_default()
}

fn from_object<T: for<'de> Deserialize<'de>>(
    object: Map<String, Value>,
    status: u16,
) -> std::result::Result<T, ClientApiError> {
    serde_json::from_value(Value::Object(object)).map_err(|e| {
        ClientApiError::invalid_response(Some(status), format!("Malformed reply: {e}"))
    })
}

/// Accepts an integer encoded either as a JSON number or as a decimal
/// string; the lease gateway encodes 64-bit integers as strings.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("integer out of range: {n}"))),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected integer, got {other}"
        ))),
    }
}
