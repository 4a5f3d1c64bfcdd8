//! Boundary to the media transport engine
//!
//! The client never touches audio or ICE itself. Each call owns one
//! [`MediaEngine`] created by the injected [`MediaEngineFactory`]; the engine
//! produces and consumes SDP and reports progress on a [`MediaEvent`] channel
//! that the client's event loop drains.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use txrtc_verto_core::IceServer;

use crate::call::CallId;
use crate::error::ClientResult;

/// Role of a remote session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdpKind {
    Offer,
    Answer,
    /// Early media description that a later answer may replace
    ProvisionalAnswer,
}

/// A trickled ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: u32,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, sdp_m_line_index: u32) -> Self {
        Self { candidate: candidate.into(), sdp_mid, sdp_m_line_index }
    }
}

/// Connectivity of the media path as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl MediaConnectionState {
    /// Media is flowing
    pub fn is_connected(&self) -> bool {
        matches!(self, MediaConnectionState::Connected | MediaConnectionState::Completed)
    }

    /// Media path lost
    pub fn is_lost(&self) -> bool {
        matches!(self, MediaConnectionState::Disconnected | MediaConnectionState::Failed)
    }
}

/// Progress reported by a media engine
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LocalCandidate(IceCandidate),
    GatheringComplete,
    ConnectionStateChanged(MediaConnectionState),
}

/// One call's media session
#[async_trait]
pub trait MediaEngine: Send + Sync + fmt::Debug {
    /// Create a local offer and start gathering candidates
    async fn create_offer(&self) -> ClientResult<String>;

    /// Create a local answer to the remote offer already applied
    async fn create_answer(&self) -> ClientResult<String>;

    async fn set_remote_description(&self, sdp: &str, kind: SdpKind) -> ClientResult<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> ClientResult<()>;

    /// Current local description including gathered candidates
    async fn local_description(&self) -> Option<String>;

    async fn set_muted(&self, muted: bool) -> ClientResult<()>;

    /// Restart ICE and return the fresh offer
    async fn restart_ice(&self) -> ClientResult<String>;

    /// Release every resource; further calls may fail
    async fn close(&self);
}

/// Creates one media engine per call
pub trait MediaEngineFactory: Send + Sync {
    fn create(
        &self,
        call_id: CallId,
        ice_servers: &[IceServer],
    ) -> ClientResult<(Arc<dyn MediaEngine>, mpsc::Receiver<MediaEvent>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_predicates() {
        assert!(MediaConnectionState::Completed.is_connected());
        assert!(MediaConnectionState::Failed.is_lost());
        assert!(!MediaConnectionState::Checking.is_lost());
        assert!(!MediaConnectionState::Closed.is_connected());
    }
}
