//! Client configuration structures and presets
//!
//! # Key Components
//!
//! - **ClientConfig** - credentials, server, push registration, timeouts and behavior flags
//! - **Credentials** - SIP user, login token, or anonymous AI-assistant target
//! - **ServerConfig** - signaling host, region and ICE servers, with production and development presets
//! - **PushConfig** - device token and provider reported at login
//!
//! # Usage Examples
//!
//! ```rust
//! use std::time::Duration;
//! use txrtc_client_core::client::config::{ClientConfig, Credentials, ServerConfig};
//! use txrtc_verto_core::Region;
//!
//! let config = ClientConfig::new()
//!     .with_credentials(Credentials::sip_user("alice", "secret"))
//!     .with_server(ServerConfig::development().with_region(Region::UsEast))
//!     .with_reconnect_timeout(Duration::from_secs(30))
//!     .with_trickle_ice(true);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.server.region, Region::UsEast);
//! assert!(config.auto_reconnect);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use txrtc_signaling_transport::{TlsPolicy, TransportConfig, DEFAULT_CONNECTION_TIMEOUT};
use txrtc_verto_core::requests::{LoginCredentials, PushEnvironment, PushRegistration, UserAgent};
use txrtc_verto_core::{signaling_url, IceServer, Region, DEVELOPMENT_HOST, PRODUCTION_HOST};

use crate::error::{ClientError, ClientResult};
use crate::registration::DEFAULT_GATEWAY_MAX_ATTEMPTS;

/// How long reconnecting calls survive without a session
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between gateway state polls
pub const DEFAULT_GATEWAY_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Upper bound for a single media engine operation
pub const DEFAULT_MEDIA_TIMEOUT: Duration = Duration::from_secs(10);

/// Push provider reported when none is configured
pub const DEFAULT_PUSH_PROVIDER: &str = "ios";

/// How the client authenticates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    /// SIP connection credentials
    SipUser { user: String, password: String },
    /// JWT login token
    Token(String),
    /// Unauthenticated session towards an AI assistant
    Anonymous {
        target_id: String,
        target_type: String,
        target_version_id: Option<String>,
    },
}

impl Credentials {
    pub fn sip_user(user: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::SipUser { user: user.into(), password: password.into() }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Credentials::Token(token.into())
    }

    /// Anonymous session towards an AI assistant
    pub fn ai_assistant(target_id: impl Into<String>) -> Self {
        Credentials::Anonymous {
            target_id: target_id.into(),
            target_type: "ai_assistant".to_string(),
            target_version_id: None,
        }
    }

    fn validate(&self) -> ClientResult<()> {
        match self {
            Credentials::SipUser { user, password } => match (user.trim().is_empty(), password.is_empty()) {
                (true, true) => Err(ClientError::UserNameAndPasswordRequired),
                (true, false) => Err(ClientError::UserNameRequired),
                (false, true) => Err(ClientError::PasswordRequired),
                (false, false) => Ok(()),
            },
            Credentials::Token(token) if token.trim().is_empty() => Err(ClientError::TokenRequired),
            Credentials::Token(_) => Ok(()),
            Credentials::Anonymous { target_id, .. } if target_id.trim().is_empty() => {
                Err(ClientError::invalid_configuration("credentials.target_id", "must not be empty"))
            }
            Credentials::Anonymous { .. } => Ok(()),
        }
    }

    /// Credentials for `login` and `disable_push_notification`; `None` for anonymous sessions
    pub fn login_credentials(&self) -> Option<LoginCredentials> {
        match self {
            Credentials::SipUser { user, password } => {
                Some(LoginCredentials::SipUser { user: user.clone(), password: password.clone() })
            }
            Credentials::Token(token) => Some(LoginCredentials::Token(token.clone())),
            Credentials::Anonymous { .. } => None,
        }
    }
}

/// Where to connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base socket URL, e.g. `wss://rtc.telnyx.com`
    pub signaling_host: String,
    /// Region prefix applied to the host
    pub region: Region,
    /// Handed to every media engine
    pub ice_servers: Vec<IceServer>,
}

impl ServerConfig {
    pub fn production() -> Self {
        Self {
            signaling_host: PRODUCTION_HOST.to_string(),
            region: Region::Auto,
            ice_servers: IceServer::production_defaults(),
        }
    }

    pub fn development() -> Self {
        Self {
            signaling_host: DEVELOPMENT_HOST.to_string(),
            region: Region::Auto,
            ice_servers: IceServer::development_defaults(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.signaling_host = host.into();
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::production()
    }
}

/// Push registration reported at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    pub device_token: Option<String>,
    pub provider: String,
    pub environment: PushEnvironment,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            device_token: None,
            provider: DEFAULT_PUSH_PROVIDER.to_string(),
            environment: PushEnvironment::default(),
        }
    }
}

impl PushConfig {
    pub fn registration(&self) -> PushRegistration {
        PushRegistration {
            device_token: self.device_token.clone(),
            provider: Some(self.provider.clone()),
            environment: self.environment,
        }
    }
}

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Required before connecting
    pub credentials: Option<Credentials>,
    pub server: ServerConfig,
    pub push: PushConfig,
    /// Region-pinned connect deadline; clamped to a 5s floor by the transport
    pub connection_timeout: Duration,
    /// How long calls stay in `RECONNECTING` before they are ended
    pub reconnect_timeout: Duration,
    pub gateway_retry_interval: Duration,
    pub gateway_max_attempts: u32,
    /// Upper bound for a single media engine operation
    pub media_timeout: Duration,
    /// Reconnect on connectivity changes and unexpected socket loss
    pub auto_reconnect: bool,
    /// Send the offer immediately and trickle candidates afterwards
    pub trickle_ice: bool,
    #[serde(skip)]
    pub tls_policy: TlsPolicy,
    pub user_agent: UserAgent,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Production server, no credentials, default timeouts
    pub fn new() -> Self {
        Self {
            credentials: None,
            server: ServerConfig::production(),
            push: PushConfig::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            gateway_retry_interval: DEFAULT_GATEWAY_RETRY_INTERVAL,
            gateway_max_attempts: DEFAULT_GATEWAY_MAX_ATTEMPTS,
            media_timeout: DEFAULT_MEDIA_TIMEOUT,
            auto_reconnect: true,
            trickle_ice: false,
            tls_policy: TlsPolicy::Strict,
            user_agent: UserAgent::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.server.region = region;
        self
    }

    pub fn with_push(mut self, push: PushConfig) -> Self {
        self.push = push;
        self
    }

    pub fn with_push_device_token(mut self, token: impl Into<String>) -> Self {
        self.push.device_token = Some(token.into());
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    pub fn with_gateway_retry(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.gateway_retry_interval = interval;
        self.gateway_max_attempts = max_attempts;
        self
    }

    pub fn with_media_timeout(mut self, timeout: Duration) -> Self {
        self.media_timeout = timeout;
        self
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn with_trickle_ice(mut self, trickle_ice: bool) -> Self {
        self.trickle_ice = trickle_ice;
        self
    }

    pub fn with_tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.tls_policy = policy;
        self
    }

    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Check everything that can be checked without I/O
    pub fn validate(&self) -> ClientResult<()> {
        match &self.credentials {
            Some(credentials) => credentials.validate()?,
            None => return Err(ClientError::invalid_configuration("credentials", "no credentials configured")),
        }
        signaling_url(&self.server.signaling_host, self.server.region, None)?;
        if self.gateway_max_attempts == 0 {
            return Err(ClientError::invalid_configuration("gateway_max_attempts", "must be at least 1"));
        }
        if self.reconnect_timeout.is_zero() {
            return Err(ClientError::invalid_configuration("reconnect_timeout", "must be positive"));
        }
        if self.gateway_retry_interval.is_zero() {
            return Err(ClientError::invalid_configuration("gateway_retry_interval", "must be positive"));
        }
        Ok(())
    }

    /// Settings for the default WebSocket transport
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new()
            .with_connection_timeout(self.connection_timeout)
            .with_tls_policy(self.tls_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect_timeout, Duration::from_secs(60));
        assert_eq!(config.gateway_retry_interval, Duration::from_secs(3));
        assert_eq!(config.gateway_max_attempts, 3);
        assert!(config.auto_reconnect);
        assert!(!config.trickle_ice);
        assert_eq!(config.tls_policy, TlsPolicy::Strict);
        assert_eq!(config.push.provider, "ios");
        assert_eq!(config.server.signaling_host, "wss://rtc.telnyx.com");
    }

    #[test]
    fn test_credential_validation_order() {
        let check = |credentials: Credentials| ClientConfig::new().with_credentials(credentials).validate();

        assert_eq!(check(Credentials::sip_user("", "")), Err(ClientError::UserNameAndPasswordRequired));
        assert_eq!(check(Credentials::sip_user("", "secret")), Err(ClientError::UserNameRequired));
        assert_eq!(check(Credentials::sip_user("alice", "")), Err(ClientError::PasswordRequired));
        assert_eq!(check(Credentials::token(" ")), Err(ClientError::TokenRequired));
        assert!(check(Credentials::ai_assistant("")).unwrap_err().is_configuration_error());
        assert!(check(Credentials::token("jwt")).is_ok());
    }

    #[test]
    fn test_missing_credentials_and_bad_host() {
        assert!(ClientConfig::new().validate().unwrap_err().is_configuration_error());

        let config = ClientConfig::new()
            .with_credentials(Credentials::token("jwt"))
            .with_server(ServerConfig::production().with_host("https://rtc.telnyx.com"));
        assert!(matches!(
            config.validate(),
            Err(ClientError::InvalidConfiguration { ref field, .. }) if field == "signaling_host"
        ));
    }

    #[test]
    fn test_serde_round_trip_skips_tls_policy() {
        let config = ClientConfig::new()
            .with_credentials(Credentials::ai_assistant("assistant-1"))
            .with_tls_policy(TlsPolicy::AllowSelfSigned);
        let json = serde_json::to_string(&config).unwrap();
        let restored: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.credentials, config.credentials);
        assert_eq!(restored.tls_policy, TlsPolicy::Strict);
    }

    #[test]
    fn test_transport_config_floor() {
        let config = ClientConfig::new().with_connection_timeout(Duration::from_secs(1));
        assert_eq!(config.transport_config().connection_timeout(), Duration::from_secs(5));
    }
}
