pub mod ws;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use txrtc_verto_core::Region;

use crate::error::Result;

pub use ws::{WebSocketTransport, WebSocketTransportFactory};

/// Events emitted by a signaling transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The socket is open
    Connected,

    /// The socket is gone.
    ///
    /// `for_reconnect` tells the owner to open a new connection right away.
    /// `fallback_region` is set when the pinned region could not be reached and
    /// the next attempt should target it instead.
    Disconnected {
        reason: Option<String>,
        for_reconnect: bool,
        fallback_region: Option<Region>,
    },

    /// A text frame arrived
    TextReceived { text: String },

    /// A transport-level failure
    Error { error: String },
}

impl TransportEvent {
    /// The disconnect emitted when a region-pinned host must fall back to auto
    pub fn region_fallback(reason: impl Into<String>) -> Self {
        TransportEvent::Disconnected {
            reason: Some(reason.into()),
            for_reconnect: true,
            fallback_region: Some(Region::Auto),
        }
    }
}

/// A connection to the signaling server
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Start connecting to `url`.
    ///
    /// Returns once the attempt is under way; the outcome is reported as a
    /// [`TransportEvent`].
    async fn connect(&self, url: &Url) -> Result<()>;

    /// Close the socket. A second call has no effect.
    async fn disconnect(&self, for_reconnect: bool);

    /// Send one text frame. Nothing is queued: when the socket is not
    /// connected the frame is dropped and an error returned.
    async fn send(&self, text: String) -> Result<()>;

    /// Whether the socket is open
    fn is_connected(&self) -> bool;
}

/// Creates transports, one per connection lifetime
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> (Arc<dyn Transport>, mpsc::Receiver<TransportEvent>);
}
