//! Push notification metadata
//!
//! A VoIP push tells the client that a call is waiting on a specific signaling
//! node. The application hands the decoded payload to
//! [`ClientManager::process_push`](crate::ClientManager::process_push), which
//! connects to that node and attaches to the call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use txrtc_verto_core::{push_server_url, signaling_url, Region};
use url::Url;

use crate::error::{ClientError, ClientResult};

/// What the user already decided about the pushed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PushAction {
    /// Answer as soon as the invite arrives
    AnswerCall,
    /// Reject as soon as the invite arrives
    RejectCall,
    /// Ring normally
    #[default]
    None,
}

/// Signaling node named by a push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushServer {
    pub rtc_ip: String,
    pub rtc_port: String,
}

/// Decoded push payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMetadata {
    pub voice_sdk_id: String,
    /// Wire id of the pushed call
    pub call_id: Option<String>,
    pub caller_name: Option<String>,
    pub caller_number: Option<String>,
    pub server: Option<PushServer>,
    #[serde(default)]
    pub action: PushAction,
}

impl PushMetadata {
    pub fn new(voice_sdk_id: impl Into<String>) -> Self {
        Self {
            voice_sdk_id: voice_sdk_id.into(),
            call_id: None,
            caller_name: None,
            caller_number: None,
            server: None,
            action: PushAction::None,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with_server(mut self, rtc_ip: impl Into<String>, rtc_port: impl Into<String>) -> Self {
        self.server = Some(PushServer { rtc_ip: rtc_ip.into(), rtc_port: rtc_port.into() });
        self
    }

    pub fn with_action(mut self, action: PushAction) -> Self {
        self.action = action;
        self
    }

    /// Parse the `metadata` object of a VoIP push
    pub fn from_json(value: &Value) -> ClientResult<Self> {
        let metadata = value.get("metadata").unwrap_or(value);
        let text = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);

        let voice_sdk_id = text("voice_sdk_id")
            .filter(|id| !id.is_empty())
            .ok_or(ClientError::VoiceSdkIdRequired)?;
        let server = match (text("rtc_ip"), text("rtc_port")) {
            (Some(rtc_ip), Some(rtc_port)) => Some(PushServer { rtc_ip, rtc_port }),
            _ => None,
        };
        Ok(Self {
            voice_sdk_id,
            call_id: text("call_id"),
            caller_name: text("caller_name"),
            caller_number: text("caller_number"),
            server,
            action: PushAction::None,
        })
    }

    /// Fail when the push cannot be tied to a signaling session
    pub fn validate(&self) -> ClientResult<()> {
        if self.voice_sdk_id.trim().is_empty() {
            return Err(ClientError::VoiceSdkIdRequired);
        }
        Ok(())
    }

    /// Socket URL for this push: the node it names, else `host` in `region`
    pub fn signaling_url(&self, host: &str, region: Region) -> ClientResult<Url> {
        let url = match &self.server {
            Some(server) => push_server_url(&server.rtc_ip, &server.rtc_port, Some(&self.voice_sdk_id))?,
            None => signaling_url(host, region, Some(&self.voice_sdk_id))?,
        };
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_voip_payload() {
        let payload = json!({
            "metadata": {
                "voice_sdk_id": "sdk-1",
                "call_id": "0c8a9f5e-7d47-4a55-9cb1-2f64a2b8cfd1",
                "caller_name": "Bob",
                "caller_number": "+15550001111",
                "rtc_ip": "10.0.0.7",
                "rtc_port": "14938"
            }
        });
        let push = PushMetadata::from_json(&payload).unwrap();
        assert_eq!(push.voice_sdk_id, "sdk-1");
        assert_eq!(push.caller_name.as_deref(), Some("Bob"));
        assert_eq!(push.server, Some(PushServer { rtc_ip: "10.0.0.7".into(), rtc_port: "14938".into() }));
        assert_eq!(push.action, PushAction::None);
    }

    #[test]
    fn test_missing_voice_sdk_id() {
        let err = PushMetadata::from_json(&json!({"metadata": {"call_id": "x"}})).unwrap_err();
        assert_eq!(err, ClientError::VoiceSdkIdRequired);
        assert_eq!(PushMetadata::new("  ").validate(), Err(ClientError::VoiceSdkIdRequired));
    }

    #[test]
    fn test_url_prefers_push_server() {
        let push = PushMetadata::new("abc").with_server("10.0.0.7", "14938");
        let url = push.signaling_url("wss://rtc.telnyx.com", Region::UsEast).unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.7"));
        assert_eq!(url.port(), Some(14938));
        assert_eq!(url.query(), Some("voice_sdk_id=abc"));

        let url = PushMetadata::new("abc").signaling_url("wss://rtc.telnyx.com", Region::UsEast).unwrap();
        assert_eq!(url.host_str(), Some("us-east.rtc.telnyx.com"));
    }
}
