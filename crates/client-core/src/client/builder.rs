//! Client builder for creating signaling clients
//!
//! [`ClientBuilder`] assembles a [`ClientConfig`] together with the pieces a
//! client cannot create on its own: the media engine factory (required), an
//! optional connectivity observer, and optionally a custom signaling
//! transport in place of the default WebSocket one.
//!
//! # Examples
//!
//! ## Basic Client Setup
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use txrtc_client_core::{ClientBuilder, Credentials, MediaEngineFactory};
//!
//! # async fn example(media: Arc<dyn MediaEngineFactory>) -> txrtc_client_core::ClientResult<()> {
//! let client = ClientBuilder::new()
//!     .credentials(Credentials::sip_user("alice", "secret"))
//!     .media_engine(media)
//!     .build()
//!     .await?;
//!
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Region-Pinned Development Client
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use txrtc_client_core::{ClientBuilder, Credentials, MediaEngineFactory, ServerConfig};
//! use txrtc_verto_core::Region;
//!
//! # async fn example(media: Arc<dyn MediaEngineFactory>) -> txrtc_client_core::ClientResult<()> {
//! let client = ClientBuilder::new()
//!     .credentials(Credentials::token("eyJhbGciOi..."))
//!     .server(ServerConfig::development().with_region(Region::UsEast))
//!     .reconnect_timeout(Duration::from_secs(30))
//!     .trickle_ice(true)
//!     .media_engine(media)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use txrtc_signaling_transport::{TlsPolicy, TransportFactory, WebSocketTransportFactory};
use txrtc_verto_core::requests::UserAgent;
use txrtc_verto_core::Region;

use crate::connectivity::ConnectivityObserver;
use crate::error::{ClientError, ClientResult};
use crate::media::MediaEngineFactory;

use super::config::{ClientConfig, Credentials, PushConfig, ServerConfig};
use super::manager::ClientManager;

/// Fluent builder for [`ClientManager`]
///
/// Every setter returns `Self`; [`build`](Self::build) validates the
/// configuration and fails with `ClientError::InvalidConfiguration` when no
/// media engine factory was supplied.
pub struct ClientBuilder {
    config: ClientConfig,
    transport_factory: Option<Arc<dyn TransportFactory>>,
    media_factory: Option<Arc<dyn MediaEngineFactory>>,
    connectivity: Option<Arc<dyn ConnectivityObserver>>,
}

impl ClientBuilder {
    /// Builder for the production server with default timeouts
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Start from a complete configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport_factory: None,
            media_factory: None,
            connectivity: None,
        }
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Pin the signaling host to a region
    pub fn region(mut self, region: Region) -> Self {
        self.config.server.region = region;
        self
    }

    pub fn push(mut self, push: PushConfig) -> Self {
        self.config.push = push;
        self
    }

    /// Deadline for reaching a region-pinned host before falling back to `auto`
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnect_timeout = timeout;
        self
    }

    /// Gateway poll interval and poll budget
    pub fn gateway_retry(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.config.gateway_retry_interval = interval;
        self.config.gateway_max_attempts = max_attempts;
        self
    }

    pub fn media_timeout(mut self, timeout: Duration) -> Self {
        self.config.media_timeout = timeout;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn trickle_ice(mut self, enabled: bool) -> Self {
        self.config.trickle_ice = enabled;
        self
    }

    /// Certificate policy of the default WebSocket transport
    pub fn tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.config.tls_policy = policy;
        self
    }

    pub fn user_agent(mut self, user_agent: UserAgent) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    /// Media engine factory; one engine is created per call
    pub fn media_engine(mut self, factory: Arc<dyn MediaEngineFactory>) -> Self {
        self.media_factory = Some(factory);
        self
    }

    /// Replace the WebSocket transport
    pub fn transport(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    /// Drive reconnection from platform connectivity changes
    pub fn connectivity(mut self, observer: Arc<dyn ConnectivityObserver>) -> Self {
        self.connectivity = Some(observer);
        self
    }

    /// Validate and create the client.
    ///
    /// The client does not connect until
    /// [`ClientManager::connect`] or [`ClientManager::process_push`] is called.
    pub async fn build(self) -> ClientResult<Arc<ClientManager>> {
        self.config.validate()?;
        let media_factory = self
            .media_factory
            .ok_or_else(|| ClientError::invalid_configuration("media_engine", "a media engine factory is required"))?;
        let transport_factory = match self.transport_factory {
            Some(factory) => factory,
            None => Arc::new(WebSocketTransportFactory::new(self.config.transport_config())),
        };
        debug!(
            host = %self.config.server.signaling_host,
            region = %self.config.server.region,
            trickle_ice = self.config.trickle_ice,
            "Building client"
        );
        Ok(ClientManager::with_parts(
            self.config,
            transport_factory,
            media_factory,
            self.connectivity,
        ))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
