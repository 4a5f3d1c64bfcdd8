//! Error types and handling for the client-core library
//!
//! Every fallible client operation returns [`ClientResult`]. Errors are grouped
//! into categories that tell the caller what to do next:
//!
//! - **configuration** - invalid settings; rejected before any I/O and never retried
//! - **transport** - the signaling socket is unavailable; usually recoverable
//! - **call** - invalid call operation or a call that could not be kept alive
//! - **server** - the signaling server reported a failure or refused registration
//! - **system** - timeouts and internal failures
//!
//! Input validation failures are returned synchronously. Failures that happen
//! later, on the event loop, are delivered as
//! [`ClientEvent::ClientError`](crate::events::ClientEvent::ClientError).
//!
//! ```rust
//! use txrtc_client_core::ClientError;
//!
//! let error = ClientError::DestinationNumberRequired;
//! assert!(error.is_call_error());
//! assert!(!error.is_recoverable());
//! assert_eq!(error.category(), "call");
//! ```

use thiserror::Error;
use uuid::Uuid;

use crate::call::CallState;

/// Result type alias for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Error types for signaling client operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Configuration errors
    #[error("User name and password are required")]
    UserNameAndPasswordRequired,

    #[error("User name is required")]
    UserNameRequired,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Login token is required")]
    TokenRequired,

    #[error("Push metadata carries no voice_sdk_id")]
    VoiceSdkIdRequired,

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Transport errors
    #[error("Socket is not connected")]
    SocketNotConnected,

    #[error("Socket connection was cancelled")]
    SocketCancelled,

    #[error("Transport failed: {reason}")]
    TransportFailed { reason: String },

    /// Call related errors
    #[error("Destination number is required")]
    DestinationNumberRequired,

    #[error("No session id, log in first")]
    SessionIdRequired,

    #[error("Call not found: {call_id}")]
    CallNotFound { call_id: Uuid },

    #[error("Invalid call state for call {call_id}: current state is {current_state}")]
    InvalidCallState { call_id: Uuid, current_state: CallState },

    #[error("Reconnection did not complete within {timeout_ms}ms")]
    ReconnectFailed { timeout_ms: u64 },

    #[error("Media engine failed: {reason}")]
    MediaEngineFailed { reason: String },

    /// Server errors
    #[error("Signaling server error {code}: {message}")]
    SignalingServerError { message: String, code: String },

    #[error("Gateway not registered after {attempts} attempts")]
    GatewayNotRegistered { attempts: u32 },

    #[error("Gateway registration has not completed")]
    NotRegistered,

    /// Generic errors
    #[error("Operation timeout after {duration_ms}ms")]
    OperationTimeout { duration_ms: u64 },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ClientError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { field: field.into(), reason: reason.into() }
    }

    /// Create a transport failed error
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        Self::TransportFailed { reason: reason.into() }
    }

    /// Create a media engine error
    pub fn media_engine_failed(reason: impl Into<String>) -> Self {
        Self::MediaEngineFailed { reason: reason.into() }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::SocketNotConnected
                | ClientError::SocketCancelled
                | ClientError::TransportFailed { .. }
                | ClientError::OperationTimeout { .. }
        )
    }

    /// Check if the error comes from configuration validation
    pub fn is_configuration_error(&self) -> bool {
        self.category() == "configuration"
    }

    /// Check if error is call-related
    pub fn is_call_error(&self) -> bool {
        self.category() == "call"
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::UserNameAndPasswordRequired
            | ClientError::UserNameRequired
            | ClientError::PasswordRequired
            | ClientError::TokenRequired
            | ClientError::VoiceSdkIdRequired
            | ClientError::InvalidConfiguration { .. } => "configuration",

            ClientError::SocketNotConnected
            | ClientError::SocketCancelled
            | ClientError::TransportFailed { .. } => "transport",

            ClientError::DestinationNumberRequired
            | ClientError::SessionIdRequired
            | ClientError::CallNotFound { .. }
            | ClientError::InvalidCallState { .. }
            | ClientError::ReconnectFailed { .. }
            | ClientError::MediaEngineFailed { .. } => "call",

            ClientError::SignalingServerError { .. }
            | ClientError::GatewayNotRegistered { .. }
            | ClientError::NotRegistered => "server",

            ClientError::OperationTimeout { .. } | ClientError::InternalError { .. } => "system",
        }
    }
}

impl From<txrtc_signaling_transport::Error> for ClientError {
    fn from(error: txrtc_signaling_transport::Error) -> Self {
        use txrtc_signaling_transport::Error as TransportError;

        match error {
            TransportError::NotConnected | TransportError::TransportClosed => ClientError::SocketNotConnected,
            TransportError::InvalidUri(uri) => ClientError::invalid_configuration("signaling_host", uri),
            other => ClientError::transport_failed(other.to_string()),
        }
    }
}

impl From<txrtc_verto_core::Error> for ClientError {
    fn from(error: txrtc_verto_core::Error) -> Self {
        use txrtc_verto_core::Error as VertoError;

        match error {
            VertoError::InvalidUrl { url, reason } => {
                ClientError::invalid_configuration("signaling_host", format!("{}: {}", url, reason))
            }
            VertoError::UnknownRegion(region) => ClientError::invalid_configuration("region", region),
            other => ClientError::internal_error(other.to_string()),
        }
    }
}
