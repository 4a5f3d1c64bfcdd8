//! Call and session engine for the txrtc signaling stack
//!
//! This crate turns the Verto protocol of `txrtc-verto-core` and the socket of
//! `txrtc-signaling-transport` into a client an application can drive: log in,
//! wait for gateway registration, place and answer calls, hold, mute, send
//! DTMF, and survive network changes without dropping calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │   Client Application    │
//! └───────────┬─────────────┘
//!             │  ClientManager API        ▲ ClientEvent
//! ┌───────────▼─────────────┐             │
//! │      client-core        │─────────────┘
//! │  session · calls ·      │
//! │  registration · push ·  │◄── MediaEngine (per call)
//! │  reconnect              │◄── ConnectivityObserver
//! └───────────┬─────────────┘
//!             │ text frames
//! ┌───────────▼─────────────┐
//! │  signaling-transport    │
//! └─────────────────────────┘
//! ```
//!
//! Media is not handled here. Applications plug a WebRTC stack in through
//! [`MediaEngineFactory`]; the client drives it (offer, answer, candidates,
//! mute, ICE restart) and reacts to its [`MediaEvent`]s.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use txrtc_client_core::{ClientBuilder, ClientEvent, Credentials, MediaEngineFactory};
//! use txrtc_verto_core::CallOptions;
//!
//! # async fn example(media: Arc<dyn MediaEngineFactory>) -> txrtc_client_core::ClientResult<()> {
//! let client = ClientBuilder::new()
//!     .credentials(Credentials::sip_user("alice", "secret"))
//!     .media_engine(media)
//!     .build()
//!     .await?;
//!
//! let mut events = client.subscribe_events();
//! client.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let ClientEvent::ClientReady { .. } = event {
//!         client.new_call("Alice", "1000", CallOptions::new("+15550002000")).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod media;
pub mod push;
pub mod registration;

pub use call::{CallDetails, CallDirection, CallId, CallState, NetworkReason, TerminationReason};
pub use client::{ClientBuilder, ClientConfig, ClientManager, Credentials, PushConfig, ServerConfig};
pub use connectivity::{ConnectivityObserver, ConnectivityStatus};
pub use error::{ClientError, ClientResult};
pub use events::{
    CallStatusInfo, ClientEvent, ClientEventHandler, EventEmitter, EventFilter, EventPriority, EventSubscription,
    IncomingCallInfo,
};
pub use media::{IceCandidate, MediaConnectionState, MediaEngine, MediaEngineFactory, MediaEvent, SdpKind};
pub use push::{PushAction, PushMetadata, PushServer};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        CallDetails, CallId, CallState, ClientBuilder, ClientConfig, ClientError, ClientEvent, ClientEventHandler,
        ClientManager, ClientResult, Credentials, MediaEngine, MediaEngineFactory, PushMetadata,
    };
}
