use std::time::Duration;

/// Connection timeout used when none is configured
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Lower bound applied to configured connection timeouts
pub const MIN_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Certificate validation policy for `wss` connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Validate the server certificate chain and host name
    #[default]
    Strict,
    /// Accept self-signed or otherwise invalid certificates (test servers only)
    AllowSelfSigned,
}

/// Settings for a WebSocket signaling transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    connection_timeout: Duration,
    pub tls_policy: TlsPolicy,
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            tls_policy: TlsPolicy::Strict,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the region-pinned connection timeout, clamped to [`MIN_CONNECTION_TIMEOUT`]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout.max(MIN_CONNECTION_TIMEOUT);
        self
    }

    pub fn with_tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.tls_policy = policy;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }
}
