//! Call identity, call options and the `dialogParams` object built from them.
//!
//! Most call-bearing frames describe their call through a `dialogParams` object.
//! It is assembled from two sources, [`CallInfo`] (who the call is) and
//! [`CallOptions`] (how it should be set up), by [`DialogParams::merge`]:
//!
//! 1. every key produced by [`CallInfo::encode`] is written,
//! 2. then every key produced by [`CallOptions::encode`] is written over it.
//!
//! When both sides produce the same key the options value is kept. The only key
//! the two currently share is `caller_id_number`, and the options side only emits
//! it when a remote number is set.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::message::JsonObject;

/// Remote display name used when the caller does not set one
pub const DEFAULT_REMOTE_CALLER_NAME: &str = "Outbound Call";

/// Identity of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    /// Stable id used as the registry key
    pub call_id: Uuid,
    /// The id exactly as it appears on the wire
    pub wire_call_id: String,
    /// Caller display name
    pub caller_name: Option<String>,
    /// Caller number or SIP address
    pub caller_number: Option<String>,
}

impl CallInfo {
    /// Identity for a locally created call
    pub fn new(call_id: Uuid) -> Self {
        Self {
            call_id,
            wire_call_id: call_id.to_string(),
            caller_name: None,
            caller_number: None,
        }
    }

    /// Identity for a call first seen on the wire.
    ///
    /// If `wire_call_id` is not UUID-shaped a fresh UUID is synthesized for the
    /// registry while the original string is kept for outbound frames.
    pub fn from_wire_id(wire_call_id: &str) -> Self {
        let call_id = Uuid::parse_str(wire_call_id).unwrap_or_else(|_| Uuid::new_v4());
        Self {
            call_id,
            wire_call_id: wire_call_id.to_string(),
            caller_name: None,
            caller_number: None,
        }
    }

    /// Set caller display name and number
    pub fn with_caller(mut self, name: impl Into<String>, number: impl Into<String>) -> Self {
        self.caller_name = Some(name.into());
        self.caller_number = Some(number.into());
        self
    }

    /// The call-info half of `dialogParams`
    pub fn encode(&self) -> JsonObject {
        let mut map = JsonObject::new();
        map.insert("callID".into(), Value::from(self.wire_call_id.to_lowercase()));
        map.insert(
            "caller_id_name".into(),
            Value::from(self.caller_name.clone().unwrap_or_default()),
        );
        map.insert(
            "caller_id_number".into(),
            Value::from(self.caller_number.clone().unwrap_or_default()),
        );
        map
    }
}

/// A custom SIP header forwarded verbatim to the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

impl CustomHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    fn to_value(&self) -> Value {
        let mut map = JsonObject::new();
        map.insert("name".into(), Value::from(self.name.clone()));
        map.insert("value".into(), Value::from(self.value.clone()));
        Value::Object(map)
    }

    /// Encode a header list as the `custom_headers` array
    pub fn encode_list(headers: &[CustomHeader]) -> Value {
        Value::Array(headers.iter().map(CustomHeader::to_value).collect())
    }

    /// Parse a `custom_headers` array, skipping malformed entries
    pub fn decode_list(value: Option<&Value>) -> Vec<CustomHeader> {
        let Some(Value::Array(items)) = value else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?;
                let value = item.get("value").and_then(Value::as_str).unwrap_or_default();
                Some(CustomHeader::new(name, value))
            })
            .collect()
    }
}

/// How a call should be set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Number or SIP address to call; required for outbound calls
    pub destination_number: Option<String>,
    /// Display name presented for the remote side
    pub remote_caller_name: String,
    /// Number presented for the remote side
    pub remote_caller_number: Option<String>,
    /// Opaque base64 state echoed back by the platform
    pub client_state: Option<String>,
    pub audio: bool,
    pub video: bool,
    pub use_stereo: bool,
    pub screen_share: bool,
    /// Whether this call re-attaches to an existing dialog
    pub attach: bool,
    /// Arbitrary variables forwarded as `userVariables`
    pub user_variables: Option<JsonObject>,
    /// Headers appended as `custom_headers`
    pub custom_headers: Vec<CustomHeader>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            destination_number: None,
            remote_caller_name: DEFAULT_REMOTE_CALLER_NAME.to_string(),
            remote_caller_number: None,
            client_state: None,
            audio: true,
            video: false,
            use_stereo: false,
            screen_share: false,
            attach: false,
            user_variables: None,
            custom_headers: Vec::new(),
        }
    }
}

impl CallOptions {
    /// Options for an outbound call to `destination`
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination_number: Some(destination.into()),
            ..Default::default()
        }
    }

    pub fn with_client_state(mut self, client_state: impl Into<String>) -> Self {
        self.client_state = Some(client_state.into());
        self
    }

    pub fn with_remote_caller(mut self, name: impl Into<String>, number: Option<String>) -> Self {
        self.remote_caller_name = name.into();
        self.remote_caller_number = number;
        self
    }

    pub fn with_custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push(CustomHeader::new(name, value));
        self
    }

    pub fn with_user_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user_variables
            .get_or_insert_with(JsonObject::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_video(mut self, video: bool) -> Self {
        self.video = video;
        self
    }

    pub fn with_stereo(mut self, use_stereo: bool) -> Self {
        self.use_stereo = use_stereo;
        self
    }

    /// The call-options half of `dialogParams`
    pub fn encode(&self) -> JsonObject {
        let mut map = JsonObject::new();
        map.insert("remote_caller_id_name".into(), Value::from(self.remote_caller_name.clone()));
        if let Some(number) = &self.remote_caller_number {
            map.insert("caller_id_number".into(), Value::from(number.clone()));
        }
        map.insert("audio".into(), Value::from(self.audio));
        map.insert("video".into(), Value::from(self.video));
        map.insert("useStereo".into(), Value::from(self.use_stereo));
        map.insert("attach".into(), Value::from(self.attach));
        map.insert("screenShare".into(), Value::from(self.screen_share));
        if let Some(vars) = &self.user_variables {
            map.insert("userVariables".into(), Value::Object(vars.clone()));
        }
        map
    }
}

/// Builders for the `dialogParams` object.
pub struct DialogParams;

impl DialogParams {
    /// Deterministic merge of call identity and call options.
    ///
    /// `info` keys are written first and `options` keys second, so on collision
    /// the options value wins.
    pub fn merge(info: &CallInfo, options: &CallOptions) -> JsonObject {
        let mut dialog = info.encode();
        for (key, value) in options.encode() {
            dialog.insert(key, value);
        }
        dialog
    }

    /// `dialogParams` carrying only the call id
    pub fn call_id_only(wire_call_id: &str) -> JsonObject {
        let mut dialog = JsonObject::new();
        dialog.insert("callID".into(), Value::from(wire_call_id.to_lowercase()));
        dialog
    }

    /// Append `custom_headers` when any are present
    pub fn append_custom_headers(dialog: &mut JsonObject, headers: &[CustomHeader]) {
        if !headers.is_empty() {
            dialog.insert("custom_headers".into(), CustomHeader::encode_list(headers));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_writes_options_last() {
        let info = CallInfo::new(Uuid::new_v4()).with_caller("Alice", "1000");
        let options = CallOptions::new("2000").with_remote_caller("Bob", Some("3000".to_string()));

        let dialog = DialogParams::merge(&info, &options);
        assert_eq!(dialog["caller_id_name"], json!("Alice"));
        // Both sides emit caller_id_number; the options value wins
        assert_eq!(dialog["caller_id_number"], json!("3000"));
        assert_eq!(dialog["remote_caller_id_name"], json!("Bob"));
        assert_eq!(dialog["callID"], json!(info.wire_call_id));
    }

    #[test]
    fn test_merge_keeps_info_number_without_remote_number() {
        let info = CallInfo::new(Uuid::new_v4()).with_caller("Alice", "1000");
        let options = CallOptions::new("2000");

        let dialog = DialogParams::merge(&info, &options);
        assert_eq!(dialog["caller_id_number"], json!("1000"));
        assert_eq!(dialog["remote_caller_id_name"], json!(DEFAULT_REMOTE_CALLER_NAME));
        assert!(!dialog.contains_key("userVariables"));
    }

    #[test]
    fn test_wire_id_that_is_not_a_uuid_is_preserved() {
        let info = CallInfo::from_wire_id("legacy-call-7");
        assert_eq!(info.wire_call_id, "legacy-call-7");
        assert_eq!(info.encode()["callID"], json!("legacy-call-7"));

        let uuid = Uuid::new_v4();
        let info = CallInfo::from_wire_id(&uuid.to_string());
        assert_eq!(info.call_id, uuid);
    }

    #[test]
    fn test_custom_headers_are_only_appended_when_present() {
        let mut dialog = JsonObject::new();
        DialogParams::append_custom_headers(&mut dialog, &[]);
        assert!(!dialog.contains_key("custom_headers"));

        let headers = vec![CustomHeader::new("X-Account", "42"), CustomHeader::new("X-Tag", "a")];
        DialogParams::append_custom_headers(&mut dialog, &headers);
        assert_eq!(
            dialog["custom_headers"],
            json!([{"name": "X-Account", "value": "42"}, {"name": "X-Tag", "value": "a"}])
        );
        assert_eq!(CustomHeader::decode_list(dialog.get("custom_headers")), headers);
    }

    #[test]
    fn test_decode_list_skips_malformed_entries() {
        let value = json!([{"name": "X-Ok", "value": "1"}, {"value": "orphan"}, 12]);
        let headers = CustomHeader::decode_list(Some(&value));
        assert_eq!(headers, vec![CustomHeader::new("X-Ok", "1")]);
    }
}
