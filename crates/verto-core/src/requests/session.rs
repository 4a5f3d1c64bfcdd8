use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PushRegistration, UserAgent, VertoRequest};
use crate::message::{JsonObject, Message};
use crate::method::Method;

/// Credentials accepted by `login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginCredentials {
    SipUser { user: String, password: String },
    Token(String),
}

/// `login` request
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub credentials: LoginCredentials,
    pub session_id: String,
    pub user_agent: UserAgent,
    pub push: PushRegistration,
    /// Login triggered by a push notification
    pub from_push: bool,
    /// Ask the server not to deliver the pushed call
    pub decline_push: bool,
}

impl LoginRequest {
    pub fn new(credentials: LoginCredentials, session_id: impl Into<String>) -> Self {
        Self {
            credentials,
            session_id: session_id.into(),
            user_agent: UserAgent::default(),
            push: PushRegistration::default(),
            from_push: false,
            decline_push: false,
        }
    }

    pub fn with_push(mut self, push: PushRegistration) -> Self {
        self.push = push;
        self
    }

    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn from_push(mut self, from_push: bool, decline_push: bool) -> Self {
        self.from_push = from_push;
        self.decline_push = decline_push;
        self
    }
}

impl VertoRequest for LoginRequest {
    fn method(&self) -> Method {
        Method::Login
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        match &self.credentials {
            LoginCredentials::SipUser { user, password } => {
                params.insert("login".into(), Value::from(user.clone()));
                params.insert("passwd".into(), Value::from(password.clone()));
            }
            LoginCredentials::Token(token) => {
                params.insert("login_token".into(), Value::from(token.clone()));
            }
        }
        params.insert("User-Agent".into(), Value::from(self.user_agent.to_string()));
        params.insert("from_push".into(), Value::from(self.from_push));
        params.insert("sessid".into(), Value::from(self.session_id.clone()));

        let mut login_params = JsonObject::new();
        login_params.insert("attach_call".into(), Value::from("true"));
        if self.decline_push {
            login_params.insert("decline_push".into(), Value::from("true"));
        }
        params.insert("loginParams".into(), Value::Object(login_params));
        params.insert("userVariables".into(), Value::Object(self.push.user_variables()));
        params
    }
}

/// `anonymous_login` request, used to reach an AI assistant without credentials
#[derive(Debug, Clone)]
pub struct AnonymousLoginRequest {
    pub target_type: String,
    pub target_id: String,
    pub target_version_id: Option<String>,
    pub conversation_id: Option<String>,
    pub session_id: String,
    pub user_variables: JsonObject,
    pub reconnection: bool,
    pub user_agent: UserAgent,
}

impl AnonymousLoginRequest {
    pub const DEFAULT_TARGET_TYPE: &'static str = "ai_assistant";

    pub fn new(target_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            target_type: Self::DEFAULT_TARGET_TYPE.to_string(),
            target_id: target_id.into(),
            target_version_id: None,
            conversation_id: None,
            session_id: session_id.into(),
            user_variables: JsonObject::new(),
            reconnection: false,
            user_agent: UserAgent::default(),
        }
    }
}

impl VertoRequest for AnonymousLoginRequest {
    fn method(&self) -> Method {
        Method::AnonymousLogin
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        params.insert("target_type".into(), Value::from(self.target_type.clone()));
        params.insert("target_id".into(), Value::from(self.target_id.clone()));
        params.insert("reconnection".into(), Value::from(self.reconnection));
        params.insert("sessid".into(), Value::from(self.session_id.clone()));

        let mut user_agent = JsonObject::new();
        user_agent.insert("sdkVersion".into(), Value::from(self.user_agent.version.clone()));
        user_agent.insert("data".into(), Value::from(self.user_agent.to_string()));
        params.insert("User-Agent".into(), Value::Object(user_agent));

        if let Some(version) = &self.target_version_id {
            params.insert("target_version_id".into(), Value::from(version.clone()));
        }
        if let Some(conversation) = self.conversation_id.as_ref().filter(|c| !c.is_empty()) {
            let mut target_params = JsonObject::new();
            target_params.insert("conversation_id".into(), Value::from(conversation.clone()));
            params.insert("target_params".into(), Value::Object(target_params));
        }
        if !self.user_variables.is_empty() {
            params.insert("userVariables".into(), Value::Object(self.user_variables.clone()));
        }
        params
    }
}

/// `telnyx_rtc.gatewayState` poll
#[derive(Debug, Clone, Default)]
pub struct GatewayStateRequest;

impl VertoRequest for GatewayStateRequest {
    fn method(&self) -> Method {
        Method::GatewayState
    }

    fn params(&self) -> JsonObject {
        JsonObject::new()
    }
}

/// `telnyx_rtc.attachCalls`, sent after a push-triggered login
#[derive(Debug, Clone, Default)]
pub struct AttachCallsRequest {
    pub push_provider: Option<String>,
    pub environment: super::PushEnvironment,
}

impl VertoRequest for AttachCallsRequest {
    fn method(&self) -> Method {
        Method::AttachCalls
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        if let Some(provider) = &self.push_provider {
            params.insert("push_notification_provider".into(), Value::from(provider.clone()));
        }
        params.insert("loginParams".into(), Value::Object(JsonObject::new()));
        let mut vars = JsonObject::new();
        vars.insert(
            "push_notification_environment".into(),
            Value::from(self.environment.as_str()),
        );
        params.insert("userVariables".into(), Value::Object(vars));
        params
    }
}

/// `telnyx_rtc.disable_push_notification`
#[derive(Debug, Clone)]
pub struct DisablePushRequest {
    pub credentials: LoginCredentials,
    pub push: PushRegistration,
}

impl VertoRequest for DisablePushRequest {
    fn method(&self) -> Method {
        Method::DisablePush
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        match &self.credentials {
            LoginCredentials::SipUser { user, .. } => {
                params.insert("user".into(), Value::from(user.clone()));
            }
            LoginCredentials::Token(token) => {
                params.insert("login_token".into(), Value::from(token.clone()));
            }
        }
        // The backend reads the push variables from the User-Agent member
        params.insert("User-Agent".into(), Value::Object(self.push.user_variables()));
        params
    }
}

/// Answer to a server `telnyx_rtc.ping`, echoing its id
pub fn ping_response(ping: &Message, session_id: Option<&str>) -> Message {
    let mut result = JsonObject::new();
    result.insert("method".into(), Value::from(Method::Ping.as_str()));
    if let Some(session_id) = session_id {
        result.insert("sessid".into(), Value::from(session_id));
    }
    Message::response(ping.id.clone(), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::PushEnvironment;
    use serde_json::json;

    #[test]
    fn test_sip_user_login_params() {
        let request = LoginRequest::new(
            LoginCredentials::SipUser { user: "alice".into(), password: "secret".into() },
            "sess-1",
        )
        .with_user_agent(UserAgent::new("Rust", "1.0.0"))
        .with_push(PushRegistration {
            device_token: Some("tok".into()),
            provider: Some("ios".into()),
            environment: PushEnvironment::Production,
        });

        let params = request.params();
        assert_eq!(params["login"], json!("alice"));
        assert_eq!(params["passwd"], json!("secret"));
        assert!(!params.contains_key("login_token"));
        assert_eq!(params["User-Agent"], json!("Rust-1.0.0"));
        assert_eq!(params["from_push"], json!(false));
        assert_eq!(params["sessid"], json!("sess-1"));
        assert_eq!(params["loginParams"], json!({"attach_call": "true"}));
        assert_eq!(
            params["userVariables"],
            json!({
                "push_device_token": "tok",
                "push_notification_provider": "ios",
                "push_notification_environment": "production"
            })
        );
    }

    #[test]
    fn test_token_login_with_declined_push() {
        let request = LoginRequest::new(LoginCredentials::Token("jwt".into()), "sess-2").from_push(true, true);
        let params = request.params();
        assert_eq!(params["login_token"], json!("jwt"));
        assert!(!params.contains_key("login"));
        assert_eq!(params["from_push"], json!(true));
        assert_eq!(params["loginParams"], json!({"attach_call": "true", "decline_push": "true"}));
    }

    #[test]
    fn test_anonymous_login_optional_members() {
        let mut request = AnonymousLoginRequest::new("assistant-1", "sess-3");
        let params = request.params();
        assert_eq!(params["target_type"], json!("ai_assistant"));
        assert!(!params.contains_key("target_params"));
        assert!(!params.contains_key("userVariables"));
        assert!(params["User-Agent"].get("sdkVersion").is_some());

        request.conversation_id = Some("conv-9".into());
        request.target_version_id = Some("v2".into());
        let params = request.params();
        assert_eq!(params["target_params"], json!({"conversation_id": "conv-9"}));
        assert_eq!(params["target_version_id"], json!("v2"));
    }

    #[test]
    fn test_attach_calls_params() {
        let request = AttachCallsRequest {
            push_provider: Some("ios".into()),
            environment: PushEnvironment::Debug,
        };
        let message = request.to_message();
        assert_eq!(message.method, Some(Method::AttachCalls));
        assert_eq!(
            serde_json::Value::Object(message.params),
            json!({
                "push_notification_provider": "ios",
                "loginParams": {},
                "userVariables": {"push_notification_environment": "debug"}
            })
        );
    }

    #[test]
    fn test_disable_push_puts_variables_in_user_agent() {
        let request = DisablePushRequest {
            credentials: LoginCredentials::SipUser { user: "alice".into(), password: "x".into() },
            push: PushRegistration { device_token: Some("tok".into()), ..Default::default() },
        };
        let params = request.params();
        assert_eq!(params["user"], json!("alice"));
        assert_eq!(params["User-Agent"]["push_device_token"], json!("tok"));
        assert!(!params.contains_key("passwd"));
    }

    #[test]
    fn test_ping_response_echoes_id() {
        let ping = Message::decode(r#"{"jsonrpc":"2.0","id":"p-1","method":"telnyx_rtc.ping","params":{}}"#).unwrap();
        let response = ping_response(&ping, Some("sess"));
        assert_eq!(response.id, "p-1");
        assert_eq!(response.result_str("method"), Some("telnyx_rtc.ping"));
        assert_eq!(response.result_str("sessid"), Some("sess"));
    }
}
