use std::io;

use thiserror::Error;

/// Result type for signaling transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the signaling transport
#[derive(Error, Debug)]
pub enum Error {
    /// The socket is not connected
    #[error("Socket not connected")]
    NotConnected,

    /// A connection attempt is already running or established
    #[error("Socket already connected or connecting")]
    AlreadyConnected,

    /// The transport was closed locally
    #[error("Transport closed")]
    TransportClosed,

    /// The URL cannot be used for a WebSocket connection
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// The connection attempt did not finish in time
    #[error("Connection timed out after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// Establishing the connection failed
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// TLS setup or handshake failed
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The WebSocket opening handshake was rejected
    #[error("WebSocket handshake failed: {0}")]
    WebSocketHandshakeFailed(String),

    /// WebSocket protocol violation
    #[error("WebSocket protocol error: {0}")]
    WebSocketProtocolError(String),

    /// The peer closed the connection
    #[error("Connection closed by peer")]
    ConnectionClosedByPeer,

    /// Connection reset
    #[error("Connection reset")]
    ConnectionReset,

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is related to a connection timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ConnectionTimeout(_))
    }

    /// Returns true if a fresh connection attempt may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_)
                | Error::ConnectFailed(_)
                | Error::ConnectionClosedByPeer
                | Error::ConnectionReset
                | Error::SendFailed(_)
                | Error::IoError(_)
        )
    }

    /// Returns true if the error means the socket is gone
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Error::NotConnected
                | Error::TransportClosed
                | Error::ConnectionClosedByPeer
                | Error::ConnectionReset
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosedByPeer,
            WsError::Io(io_err) => match io_err.kind() {
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => Error::ConnectionReset,
                _ => Error::IoError(io_err),
            },
            WsError::Tls(e) => Error::TlsError(e.to_string()),
            WsError::Protocol(e) => Error::WebSocketProtocolError(e.to_string()),
            WsError::Http(response) => {
                Error::WebSocketHandshakeFailed(format!("HTTP status {}", response.status()))
            }
            WsError::Url(e) => Error::InvalidUri(e.to_string()),
            other => Error::ConnectFailed(other.to_string()),
        }
    }
}

impl From<native_tls::Error> for Error {
    fn from(error: native_tls::Error) -> Self {
        Error::TlsError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classification() {
        assert!(Error::ConnectionTimeout(Duration::from_secs(5)).is_timeout());
        assert!(Error::ConnectionTimeout(Duration::from_secs(5)).is_recoverable());
        assert!(!Error::InvalidUri("ftp://x".into()).is_recoverable());
        assert!(Error::NotConnected.is_connection_lost());
        assert!(!Error::TlsError("bad cert".into()).is_connection_lost());
    }

    #[test]
    fn test_io_reset_maps_to_connection_reset() {
        let ws = tokio_tungstenite::tungstenite::Error::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(Error::from(ws), Error::ConnectionReset));

        let closed = tokio_tungstenite::tungstenite::Error::ConnectionClosed;
        assert!(matches!(Error::from(closed), Error::ConnectionClosedByPeer));
    }
}
