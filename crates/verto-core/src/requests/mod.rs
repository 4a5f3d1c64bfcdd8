//! Typed outbound requests.
//!
//! Each request is a plain struct that knows its [`Method`] and how to lay out
//! its `params`. Turning one into a frame is always
//! [`VertoRequest::to_message`], which stamps a fresh id on it.
//!
//! ```rust
//! use txrtc_verto_core::requests::{ByeRequest, VertoRequest};
//! use txrtc_verto_core::{CauseCode, Method};
//!
//! let bye = ByeRequest::new("session-1", "9d1f...", CauseCode::UserBusy);
//! let message = bye.to_message();
//! assert_eq!(message.method, Some(Method::Bye));
//! assert_eq!(message.params["causeCode"], 17);
//! ```

mod ai;
mod call;
mod session;

pub use ai::{AiConversationRequest, ConversationContent, ConversationItem};
pub use call::{
    AnswerRequest, AttachRequest, ByeRequest, CandidateRequest, EndOfCandidatesRequest,
    IceRestartRequest, InfoRequest, InviteRequest, ModifyAction, ModifyRequest, RingingAckRequest,
};
pub use session::{
    ping_response, AnonymousLoginRequest, AttachCallsRequest, DisablePushRequest,
    GatewayStateRequest, LoginCredentials, LoginRequest,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{JsonObject, Message};
use crate::method::Method;

/// A request this client can send.
pub trait VertoRequest {
    /// Method the request is sent as
    fn method(&self) -> Method;

    /// The `params` object
    fn params(&self) -> JsonObject;

    /// Build the frame with a fresh id
    fn to_message(&self) -> Message {
        Message::request(self.method(), self.params())
    }
}

/// `<client type>-<version>` string sent as `User-Agent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    pub client_type: String,
    pub version: String,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            client_type: "Rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl UserAgent {
    pub fn new(client_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self { client_type: client_type.into(), version: version.into() }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.client_type, self.version)
    }
}

/// Which push gateway environment the backend should target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushEnvironment {
    Debug,
    Production,
}

impl Default for PushEnvironment {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            PushEnvironment::Debug
        } else {
            PushEnvironment::Production
        }
    }
}

impl PushEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushEnvironment::Debug => "debug",
            PushEnvironment::Production => "production",
        }
    }
}

/// Push metadata attached to login and disable-push requests
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PushRegistration {
    pub device_token: Option<String>,
    pub provider: Option<String>,
    pub environment: PushEnvironment,
}

impl PushRegistration {
    /// The `userVariables` object carrying push metadata
    pub fn user_variables(&self) -> JsonObject {
        let mut vars = JsonObject::new();
        if let Some(token) = &self.device_token {
            vars.insert("push_device_token".into(), Value::from(token.clone()));
        }
        if let Some(provider) = &self.provider {
            vars.insert("push_notification_provider".into(), Value::from(provider.clone()));
        }
        vars.insert(
            "push_notification_environment".into(),
            Value::from(self.environment.as_str()),
        );
        vars
    }
}
