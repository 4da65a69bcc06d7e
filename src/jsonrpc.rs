//! JSON-RPC 2.0 envelope types and the message codec.
//!
//! Outgoing calls are encoded into request envelopes. Incoming frames are
//! decoded into one generic [`JsonRpcResponse`] envelope and then classified
//! with [`classify`] into a reply, a subscription notification, or something
//! the client does not handle.
//!
//! ```text
//! request:      {"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":"1a"}
//! reply:        {"jsonrpc":"2.0","id":"1a","result":"0x10d4f"}
//! notification: {"jsonrpc":"2.0","method":"eth_subscription",
//!                "params":{"subscription":"0xsub1","result":{...}}}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::{Result, RpcError, VM_EXECUTION_ERROR_CODE};

/// Protocol version tag carried by every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method-name suffix of server push notifications (`eth_subscription`,
/// `parity_subscription`).
pub const SUBSCRIPTION_SUFFIX: &str = "_subscription";

/// Outgoing request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: String,
}

impl JsonRpcRequest {
    /// Build a request envelope. `params` should already be a JSON array.
    pub fn new(method: &str, params: Value, id: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: id.to_string(),
        }
    }
}

/// Error object carried by a failed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<JsonRpcError> for RpcError {
    fn from(err: JsonRpcError) -> Self {
        if err.code == VM_EXECUTION_ERROR_CODE {
            let details = match err.data {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return RpcError::VmExecution {
                code: err.code,
                details,
            };
        }
        RpcError::Remote {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

/// Generic incoming envelope, before classification.
///
/// `result` and `params` stay raw so the caller decides the target type. A
/// literal `null` is kept as a raw `null` value rather than collapsed to
/// `None`, which is how a null result is told apart from a missing one.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "present_raw")]
    pub params: Option<Box<RawValue>>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default, deserialize_with = "present_raw")]
    pub result: Option<Box<RawValue>>,
    /// The frame exactly as received.
    #[serde(skip)]
    pub raw: String,
}

/// Only invoked when the field is present, so `null` becomes `Some("null")`.
fn present_raw<'de, D>(deserializer: D) -> std::result::Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    fn method_name(&self) -> Option<&str> {
        self.method.as_deref().filter(|m| !m.is_empty())
    }

    fn id_str(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// A notification has a method and no id.
    pub fn is_notification(&self) -> bool {
        self.id_str().is_none() && self.method_name().is_some()
    }

    /// A reply has a valid id and neither a method nor params.
    pub fn is_response(&self) -> bool {
        self.has_valid_id() && self.method_name().is_none() && self.params.is_none()
    }

    /// The id is non-empty and does not look like an echoed object or array.
    pub fn has_valid_id(&self) -> bool {
        self.id_str()
            .is_some_and(|id| !id.starts_with('{') && !id.starts_with('['))
    }

    /// The id, if it is valid.
    pub fn valid_id(&self) -> Option<&str> {
        if self.has_valid_id() {
            self.id_str()
        } else {
            None
        }
    }

    /// Whether the result is the JSON `null` literal.
    pub fn is_result_null(&self) -> bool {
        self.result
            .as_deref()
            .is_some_and(|raw| raw.get().trim() == "null")
    }

    /// Map this reply to the caller's result type.
    ///
    /// An error object wins over any result. A `null` result is
    /// [`RpcError::NullResult`], never a default value.
    pub fn into_result<R: DeserializeOwned>(self) -> Result<R> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        if self.is_result_null() {
            return Err(RpcError::NullResult);
        }
        let raw = self.result.ok_or_else(|| {
            RpcError::Protocol("Response missing both result and error".to_string())
        })?;
        serde_json::from_str(raw.get()).map_err(|e| RpcError::Decoding {
            raw: raw.get().to_string(),
            cause: e.to_string(),
        })
    }

    /// Decode the result as a hex quantity string into a `u64`.
    pub fn uint_result(self) -> Result<u64> {
        let s: String = self.into_result()?;
        crate::hexutil::parse_u64(&s)
    }
}

/// Nested params of a subscription notification.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionNotification {
    #[serde(rename = "subscription", default)]
    pub subscription: String,
    pub result: Box<RawValue>,
}

/// A decoded frame after classification.
#[derive(Debug)]
pub enum Incoming {
    /// Reply correlated to an outstanding call by `id`.
    Reply {
        id: String,
        response: JsonRpcResponse,
    },
    /// Push notification for an active subscription.
    Notification(SubscriptionNotification),
    /// Anything else; logged and dropped.
    Unrecognized {
        envelope: JsonRpcResponse,
        reason: &'static str,
    },
}

/// Encode a call into a request envelope.
///
/// `params` must serialize to a JSON array. `()` and other values that
/// serialize to `null` become an empty list; any other single value is wrapped
/// in a one-element list.
pub fn encode_request<P: Serialize + ?Sized>(method: &str, params: &P, id: &str) -> Result<String> {
    let params = match serde_json::to_value(params).map_err(|e| RpcError::Encoding(e.to_string()))? {
        Value::Array(items) => Value::Array(items),
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    };
    serde_json::to_string(&JsonRpcRequest::new(method, params, id))
        .map_err(|e| RpcError::Encoding(e.to_string()))
}

/// Decode one incoming frame into the generic envelope.
pub fn decode_response(text: &str) -> Result<JsonRpcResponse> {
    let mut response: JsonRpcResponse =
        serde_json::from_str(text).map_err(|e| RpcError::Decoding {
            raw: text.to_string(),
            cause: e.to_string(),
        })?;
    response.raw = text.to_string();
    Ok(response)
}

/// Classify a decoded envelope.
pub fn classify(envelope: JsonRpcResponse) -> Incoming {
    if envelope.is_notification() {
        let is_subscription = envelope
            .method_name()
            .is_some_and(|m| m.ends_with(SUBSCRIPTION_SUFFIX));
        if !is_subscription {
            return Incoming::Unrecognized {
                envelope,
                reason: "non-subscription notification",
            };
        }
        let parsed = envelope
            .params
            .as_deref()
            .and_then(|raw| serde_json::from_str::<SubscriptionNotification>(raw.get()).ok());
        return match parsed {
            Some(n) if !n.subscription.is_empty() => Incoming::Notification(n),
            _ => Incoming::Unrecognized {
                envelope,
                reason: "invalid subscription params",
            },
        };
    }

    if envelope.is_response() {
        if let Some(id) = envelope.valid_id().map(str::to_string) {
            return Incoming::Reply {
                id,
                response: envelope,
            };
        }
    }

    Incoming::Unrecognized {
        envelope,
        reason: "neither reply nor notification",
    }
}
