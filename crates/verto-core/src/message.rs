//! The Verto JSON-RPC envelope.
//!
//! Every frame on the signaling socket is a single JSON object:
//!
//! ```text
//! {"jsonrpc":"2.0","id":"<uuid>","method":"<name>","params":{...}}      request
//! {"jsonrpc":"2.0","id":"<uuid>","result":{...}}                        response
//! {"jsonrpc":"2.0","id":"<uuid>","error":{"code":-32000,"message":".."}} failure
//! ```
//!
//! Decoding is deliberately forgiving. A frame that is valid JSON but is missing
//! fields, or carries them with unexpected types, still decodes; the absent parts
//! come back empty and the caller decides what "missing" means for it.
//!
//! # Examples
//!
//! ```rust
//! use txrtc_verto_core::{Message, Method};
//!
//! let text = r#"{"jsonrpc":"2.0","id":"42","method":"telnyx_rtc.bye","params":{"callID":"abc"}}"#;
//! let message = Message::decode(text).unwrap();
//! assert_eq!(message.method, Some(Method::Bye));
//! assert_eq!(message.call_id(), Some("abc"));
//!
//! // Garbage in the params does not stop the envelope from decoding
//! let partial = Message::decode(r#"{"id":7,"params":"oops"}"#).unwrap();
//! assert!(partial.params.is_empty());
//! assert_eq!(partial.id, "");
//! ```

use serde_json::{Map, Value};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::method::Method;

/// JSON-RPC protocol version written on every outbound frame
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON object, the shape of `params` and `result`
pub type JsonObject = Map<String, Value>;

/// Generate a fresh message id: a lowercase UUIDv4
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// The `error` member of a failed response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RpcError {
    /// Numeric error code; 0 when the server sent none or sent a non-numeric one
    pub code: i64,
    /// Human-readable message; empty when absent
    pub message: String,
}

impl RpcError {
    fn from_value(value: &Value) -> Self {
        let code = match value.get("code") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => 0,
        };
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { code, message }
    }

    fn to_value(&self) -> Value {
        let mut map = JsonObject::new();
        map.insert("code".into(), Value::from(self.code));
        map.insert("message".into(), Value::from(self.message.clone()));
        Value::Object(map)
    }
}

/// One signaling frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    /// Protocol version; empty if the peer omitted it
    pub jsonrpc: String,
    /// Correlation id; preserved as received on inbound frames
    pub id: String,
    /// The verb, absent on pure responses
    pub method: Option<Method>,
    /// Request parameters; empty when absent
    pub params: JsonObject,
    /// Response payload. `Some` whenever the frame carried a `result` member, even
    /// an empty or non-object one, because its presence alone drives routing.
    pub result: Option<JsonObject>,
    /// Server-reported failure
    pub error: Option<RpcError>,
    /// Push session identifier the server tags some frames with
    pub voice_sdk_id: Option<String>,
}

impl Message {
    /// Build an outbound request with a fresh id
    pub fn request(method: Method, params: JsonObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: new_message_id(),
            method: Some(method),
            params,
            ..Default::default()
        }
    }

    /// Build an outbound response correlated with `id`
    pub fn response(id: impl Into<String>, result: JsonObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Serialize the frame to its wire text.
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    /// The frame as a JSON value
    pub fn to_value(&self) -> Value {
        let mut map = JsonObject::new();
        let version = if self.jsonrpc.is_empty() { JSONRPC_VERSION } else { self.jsonrpc.as_str() };
        map.insert("jsonrpc".into(), Value::from(version));
        map.insert("id".into(), Value::from(self.id.clone()));
        if let Some(method) = &self.method {
            map.insert("method".into(), Value::from(method.as_str()));
            map.insert("params".into(), Value::Object(self.params.clone()));
        } else if !self.params.is_empty() {
            map.insert("params".into(), Value::Object(self.params.clone()));
        }
        if let Some(result) = &self.result {
            map.insert("result".into(), Value::Object(result.clone()));
        }
        if let Some(error) = &self.error {
            map.insert("error".into(), error.to_value());
        }
        if let Some(voice_sdk_id) = &self.voice_sdk_id {
            map.insert("voice_sdk_id".into(), Value::from(voice_sdk_id.clone()));
        }
        Value::Object(map)
    }

    /// Decode a wire frame.
    ///
    /// Returns `None` only when `text` is not a JSON object. Every other defect
    /// (missing id, params of the wrong type, unknown method) yields a partially
    /// filled message.
    pub fn decode(text: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding frame that is not valid JSON: {}", e);
                return None;
            }
        };
        let Value::Object(object) = value else {
            warn!("Discarding frame that is not a JSON object");
            return None;
        };

        let string_field = |key: &str| -> String {
            match object.get(key) {
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            }
        };

        let method = match object.get("method") {
            Some(Value::String(name)) => Some(Method::from_wire(name)),
            _ => None,
        };
        let params = match object.get("params") {
            Some(Value::Object(params)) => params.clone(),
            _ => JsonObject::new(),
        };
        let result = object.get("result").map(|value| match value {
            Value::Object(result) => result.clone(),
            _ => JsonObject::new(),
        });
        let error = object.get("error").map(RpcError::from_value);
        let voice_sdk_id = match object.get("voice_sdk_id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        let message = Self {
            jsonrpc: string_field("jsonrpc"),
            id: string_field("id"),
            method,
            params,
            result,
            error,
            voice_sdk_id,
        };
        trace!(id = %message.id, method = ?message.method, "Decoded frame");
        Some(message)
    }

    /// Whether the frame carries a `result` member
    pub fn is_response(&self) -> bool {
        self.result.is_some()
    }

    /// String parameter, if present and a string
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// The `params.dialogParams` object, if present
    pub fn dialog_params(&self) -> Option<&JsonObject> {
        self.params.get("dialogParams").and_then(Value::as_object)
    }

    /// String member of the `result` object
    pub fn result_str(&self, key: &str) -> Option<&str> {
        self.result.as_ref()?.get(key).and_then(Value::as_str)
    }

    /// Session id assigned by a login result
    pub fn session_id(&self) -> Option<&str> {
        self.result_str("sessid").filter(|s| !s.is_empty())
    }

    /// Wire call id a frame refers to.
    ///
    /// Looks at `params.callID`, then `params.dialogParams.callID`, then
    /// `result.callID`.
    pub fn call_id(&self) -> Option<&str> {
        self.param_str("callID")
            .or_else(|| {
                self.dialog_params()
                    .and_then(|dialog| dialog.get("callID"))
                    .and_then(Value::as_str)
            })
            .or_else(|| self.result_str("callID"))
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_has_lowercase_uuid_id() {
        let message = Message::request(Method::Ping, JsonObject::new());
        assert_eq!(message.jsonrpc, "2.0");
        assert!(Uuid::parse_str(&message.id).is_ok());
        assert_eq!(message.id, message.id.to_lowercase());
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(Message::decode("not json").is_none());
        assert!(Message::decode("[1,2,3]").is_none());
        assert!(Message::decode("").is_none());
    }

    #[test]
    fn test_decode_truncated_fields_become_empty() {
        let message = Message::decode(r#"{"method":"telnyx_rtc.invite","params":null}"#).unwrap();
        assert_eq!(message.method, Some(Method::Invite));
        assert!(message.params.is_empty());
        assert!(message.result.is_none());
        assert!(message.error.is_none());
        assert_eq!(message.jsonrpc, "");
    }

    #[test]
    fn test_result_presence_is_preserved() {
        let message = Message::decode(r#"{"id":"1","result":"ok"}"#).unwrap();
        assert!(message.is_response());
        assert!(message.result.unwrap().is_empty());
    }

    #[test]
    fn test_error_code_is_best_effort() {
        let message = Message::decode(r#"{"id":"1","error":{"code":"-32001","message":"Auth"}}"#).unwrap();
        let error = message.error.unwrap();
        assert_eq!(error.code, -32001);
        assert_eq!(error.message, "Auth");

        let message = Message::decode(r#"{"id":"1","error":{}}"#).unwrap();
        assert_eq!(message.error.unwrap(), RpcError::default());
    }

    #[test]
    fn test_call_id_lookup_order() {
        let mut message = Message::request(Method::Bye, JsonObject::new());
        message.params.insert("dialogParams".into(), json!({"callID": "from-dialog"}));
        assert_eq!(message.call_id(), Some("from-dialog"));
        message.params.insert("callID".into(), json!("direct"));
        assert_eq!(message.call_id(), Some("direct"));
    }

    #[test]
    fn test_session_id_from_login_result() {
        let message = Message::decode(r#"{"jsonrpc":"2.0","id":"9","result":{"sessid":"abc-123"}}"#).unwrap();
        assert_eq!(message.session_id(), Some("abc-123"));
    }

    #[test]
    fn test_voice_sdk_id_is_captured() {
        let message = Message::decode(r#"{"id":"1","voice_sdk_id":"sdk-1","result":{}}"#).unwrap();
        assert_eq!(message.voice_sdk_id.as_deref(), Some("sdk-1"));
    }

    #[test]
    fn test_response_round_trip() {
        let mut result = JsonObject::new();
        result.insert("method".into(), json!("telnyx_rtc.ping"));
        let response = Message::response("abc", result.clone());
        let decoded = Message::decode(&response.encode()).unwrap();
        assert_eq!(decoded.id, "abc");
        assert_eq!(decoded.result, Some(result));
        assert!(decoded.method.is_none());
    }
}
