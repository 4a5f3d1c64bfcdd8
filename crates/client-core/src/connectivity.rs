//! Network reachability input
//!
//! Platform network monitors are injected through [`ConnectivityObserver`].
//! The client subscribes once when its event loop starts and drops the
//! receiver when it stops.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Network reachability reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityStatus {
    Wifi,
    Cellular,
    NoConnection,
}

impl ConnectivityStatus {
    pub fn is_reachable(&self) -> bool {
        !matches!(self, ConnectivityStatus::NoConnection)
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityStatus::Wifi => write!(f, "wifi"),
            ConnectivityStatus::Cellular => write!(f, "cellular"),
            ConnectivityStatus::NoConnection => write!(f, "no connection"),
        }
    }
}

/// Source of connectivity changes
pub trait ConnectivityObserver: Send + Sync {
    /// Start observing; the subscription ends when the receiver is dropped
    fn subscribe(&self) -> mpsc::Receiver<ConnectivityStatus>;
}
