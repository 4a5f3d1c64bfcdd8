use thiserror::Error;

/// Result type for Verto message operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or interpreting Verto values.
///
/// Decoding wire frames never produces one of these; see [`crate::Message::decode`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Region name that is not one of the known signaling edges
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// Gateway state string that the server is not known to send
    #[error("Unknown gateway state: {0}")]
    UnknownGatewayState(String),

    /// Signaling host could not be turned into a WebSocket URL
    #[error("Invalid signaling URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Modify action string that is not hold/unhold/toggleHold/updateMedia
    #[error("Unknown modify action: {0}")]
    UnknownModifyAction(String),
}

impl Error {
    /// Returns true if the error came from URL construction
    pub fn is_url_error(&self) -> bool {
        matches!(self, Error::InvalidUrl { .. })
    }
}
