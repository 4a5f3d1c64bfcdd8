//! WebSocket signaling transport for the txrtc stack
//!
//! This crate owns the socket to the signaling server. It knows nothing about
//! Verto beyond the region a host is pinned to: frames go out and come in as
//! text, and everything that happens to the connection is reported on a
//! [`TransportEvent`] channel.
//!
//! ```no_run
//! use txrtc_signaling_transport::prelude::*;
//! use url::Url;
//!
//! # async fn example() -> Result<()> {
//! let (transport, mut events) = WebSocketTransport::new(TransportConfig::default());
//! transport.connect(&Url::parse("wss://rtc.telnyx.com").unwrap()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TransportEvent::Connected => transport.send("{}".to_string()).await?,
//!         TransportEvent::TextReceived { text } => println!("{}", text),
//!         TransportEvent::Disconnected { .. } => break,
//!         TransportEvent::Error { error } => eprintln!("{}", error),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod timer;
pub mod transport;

pub use config::{TlsPolicy, TransportConfig, DEFAULT_CONNECTION_TIMEOUT, MIN_CONNECTION_TIMEOUT};
pub use error::{Error, Result};
pub use timer::Timer;
pub use transport::{Transport, TransportEvent, TransportFactory, WebSocketTransport, WebSocketTransportFactory};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Error, Result, TlsPolicy, Transport, TransportConfig, TransportEvent, TransportFactory,
        WebSocketTransport, WebSocketTransportFactory,
    };
}
