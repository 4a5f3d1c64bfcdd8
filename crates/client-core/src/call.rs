//! Per-call state machine
//!
//! A [`Call`] is owned by the client's registry and only ever mutated from the
//! client's event loop or from a public API call holding the same lock. It
//! carries the call identity, the options it was placed or answered with, its
//! media engine, and the [`CallState`] that drives every observable change.
//!
//! # State flow
//!
//! ```text
//! NEW -> CONNECTING -> RINGING -> ACTIVE <-> HELD
//!            |            |          |
//!            +------------+----------+--> RECONNECTING(reason) --> (prior state)
//!                                    +--> DROPPED(reason)
//! any non-terminal state --> DONE(reason?)
//! ```
//!
//! From `NEW` only `CONNECTING` or `DONE` are reachable in one step and `DONE`
//! has no exits. Everything else is accepted, since the server may skip steps
//! (an answer can arrive without a prior ringing).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use txrtc_verto_core::{CallInfo, CallOptions, CauseCode, CustomHeader, RemoteHangup};

use crate::error::{ClientError, ClientResult};
use crate::media::MediaEngine;

/// Unique identifier for a call
pub type CallId = Uuid;

/// Why a call is reconnecting or has dropped its media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkReason {
    /// The device switched between networks
    NetworkSwitch,
    /// The signaling connection or network went away
    NetworkLost,
    /// Airplane mode or every interface is down
    AirplaneMode,
    /// The media engine reported a failed or disconnected path
    MediaLost,
}

impl fmt::Display for NetworkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NetworkReason::NetworkSwitch => "network switch",
            NetworkReason::NetworkLost => "network lost",
            NetworkReason::AirplaneMode => "airplane mode",
            NetworkReason::MediaLost => "media lost",
        };
        f.write_str(text)
    }
}

/// Why a call ended
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminationReason {
    /// Resolved hangup cause
    pub cause: CauseCode,
    /// Numeric cause as received or sent; differs from `cause.code()` for unknown codes
    pub cause_code: u16,
    pub sip_code: Option<u16>,
    pub sip_reason: Option<String>,
}

impl TerminationReason {
    pub fn new(cause: CauseCode) -> Self {
        Self { cause, cause_code: cause.code(), sip_code: None, sip_reason: None }
    }

    /// Reason for a remote `telnyx_rtc.bye`; unknown codes keep their raw value
    pub fn from_remote(hangup: &RemoteHangup) -> Self {
        let cause = hangup.cause.unwrap_or(CauseCode::NormalClearing);
        Self {
            cause,
            cause_code: hangup.cause_code.unwrap_or_else(|| cause.code()),
            sip_code: hangup.sip_code,
            sip_reason: hangup.sip_reason.clone(),
        }
    }
}

/// Current state of a call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Created, nothing sent yet
    New,
    /// Invite sent or being prepared
    Connecting,
    /// Remote party is being alerted, or an inbound call waits for an answer
    Ringing,
    /// Media is flowing
    Active,
    /// Held by either side
    Held,
    /// Waiting for the signaling connection to come back
    Reconnecting(NetworkReason),
    /// Media path lost but the call is not over yet
    Dropped(NetworkReason),
    /// Terminal
    Done(Option<TerminationReason>),
}

impl CallState {
    /// Check if the call is currently connected
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Active | CallState::Held)
    }

    /// Check if the call is terminated
    pub fn is_terminated(&self) -> bool {
        matches!(self, CallState::Done(_))
    }

    /// Check if the call is set up or being set up, but not over
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, CallState::New | CallState::Done(_))
    }

    /// Whether a single step from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: &CallState) -> bool {
        match (self, next) {
            (CallState::Done(_), _) => false,
            (CallState::New, CallState::Connecting | CallState::Done(_)) => true,
            (CallState::New, _) => false,
            (_, CallState::New) => false,
            _ => true,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::New => write!(f, "NEW"),
            CallState::Connecting => write!(f, "CONNECTING"),
            CallState::Ringing => write!(f, "RINGING"),
            CallState::Active => write!(f, "ACTIVE"),
            CallState::Held => write!(f, "HELD"),
            CallState::Reconnecting(reason) => write!(f, "RECONNECTING({})", reason),
            CallState::Dropped(reason) => write!(f, "DROPPED({})", reason),
            CallState::Done(Some(reason)) => write!(f, "DONE({})", reason.cause),
            CallState::Done(None) => write!(f, "DONE"),
        }
    }
}

/// Direction of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    /// Placed by this client
    Outbound,
    /// Offered by the server
    Inbound,
    /// Re-created by a server `attach`
    Attach,
}

/// Snapshot of a call handed out to applications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDetails {
    pub call_id: CallId,
    pub wire_call_id: String,
    pub direction: CallDirection,
    pub state: CallState,
    pub caller_name: Option<String>,
    pub caller_number: Option<String>,
    pub destination_number: Option<String>,
    pub telnyx_session_id: Option<String>,
    pub telnyx_leg_id: Option<String>,
    /// Custom headers received with the remote answer or invite
    pub remote_custom_headers: Vec<CustomHeader>,
    pub muted: bool,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

/// A call tracked by the client registry
pub struct Call {
    pub(crate) info: CallInfo,
    pub(crate) options: CallOptions,
    pub(crate) direction: CallDirection,
    state: CallState,
    /// State to restore once a reconnect completes
    pub(crate) state_before_reconnect: Option<CallState>,
    pub(crate) remote_sdp: Option<String>,
    pub(crate) local_sdp: Option<String>,
    pub(crate) telnyx_session_id: Option<String>,
    pub(crate) telnyx_leg_id: Option<String>,
    pub(crate) remote_custom_headers: Vec<CustomHeader>,
    /// Headers to send with our answer
    pub(crate) answer_custom_headers: Vec<CustomHeader>,
    /// Invite, Answer or Attach frame already sent
    pub(crate) description_sent: bool,
    /// Local answer requested for an inbound call
    pub(crate) answering: bool,
    pub(crate) muted: bool,
    pub(crate) media: Option<Arc<dyn MediaEngine>>,
    pub(crate) media_task: Option<JoinHandle<()>>,
    created_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("call_id", &self.info.call_id)
            .field("wire_call_id", &self.info.wire_call_id)
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("has_media", &self.media.is_some())
            .finish()
    }
}

impl Call {
    fn with_state(info: CallInfo, options: CallOptions, direction: CallDirection, state: CallState) -> Self {
        Self {
            info,
            options,
            direction,
            state,
            state_before_reconnect: None,
            remote_sdp: None,
            local_sdp: None,
            telnyx_session_id: None,
            telnyx_leg_id: None,
            remote_custom_headers: Vec::new(),
            answer_custom_headers: Vec::new(),
            description_sent: false,
            answering: false,
            muted: false,
            media: None,
            media_task: None,
            created_at: Utc::now(),
            connected_at: None,
        }
    }

    /// A call placed by this client, in `NEW`
    pub fn outbound(info: CallInfo, options: CallOptions) -> Self {
        Self::with_state(info, options, CallDirection::Outbound, CallState::New)
    }

    /// A call offered by the server, in `RINGING`
    pub fn inbound(info: CallInfo, remote_sdp: String) -> Self {
        let mut call = Self::with_state(info, CallOptions::default(), CallDirection::Inbound, CallState::Ringing);
        call.remote_sdp = Some(remote_sdp);
        call
    }

    /// Stand-in for a pushed call whose invite has not arrived, in `NEW`
    pub fn placeholder(info: CallInfo) -> Self {
        Self::with_state(info, CallOptions::default(), CallDirection::Inbound, CallState::New)
    }

    /// A call re-created by a server attach, in `CONNECTING`
    pub fn attached(info: CallInfo, options: CallOptions, remote_sdp: String) -> Self {
        let mut call = Self::with_state(info, options, CallDirection::Attach, CallState::Connecting);
        call.remote_sdp = Some(remote_sdp);
        call.answering = true;
        call
    }

    pub fn id(&self) -> CallId {
        self.info.call_id
    }

    pub fn wire_call_id(&self) -> &str {
        &self.info.wire_call_id
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn info(&self) -> &CallInfo {
        &self.info
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// A placeholder registered for a push before its invite arrived
    pub fn is_placeholder(&self) -> bool {
        self.direction == CallDirection::Inbound && self.state == CallState::New
    }

    /// Move to `next`, returning the previous state.
    ///
    /// Returns `Ok(None)` when the call is already in `next`.
    pub fn transition(&mut self, next: CallState) -> ClientResult<Option<CallState>> {
        if self.state == next {
            return Ok(None);
        }
        if !self.state.can_transition_to(&next) {
            return Err(ClientError::InvalidCallState {
                call_id: self.info.call_id,
                current_state: self.state.clone(),
            });
        }
        if next == CallState::Active && self.connected_at.is_none() {
            self.connected_at = Some(Utc::now());
        }
        Ok(Some(std::mem::replace(&mut self.state, next)))
    }

    /// Snapshot for applications
    pub fn details(&self) -> CallDetails {
        CallDetails {
            call_id: self.info.call_id,
            wire_call_id: self.info.wire_call_id.clone(),
            direction: self.direction,
            state: self.state.clone(),
            caller_name: self.info.caller_name.clone(),
            caller_number: self.info.caller_number.clone(),
            destination_number: self.options.destination_number.clone(),
            telnyx_session_id: self.telnyx_session_id.clone(),
            telnyx_leg_id: self.telnyx_leg_id.clone(),
            remote_custom_headers: self.remote_custom_headers.clone(),
            muted: self.muted,
            created_at: self.created_at,
            connected_at: self.connected_at,
        }
    }

    /// Detach the media engine and its event forwarder
    pub(crate) fn take_media(&mut self) -> Option<Arc<dyn MediaEngine>> {
        if let Some(task) = self.media_task.take() {
            task.abort();
        }
        self.media.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound() -> Call {
        Call::outbound(CallInfo::new(Uuid::new_v4()), CallOptions::new("+15551234567"))
    }

    #[test]
    fn test_new_only_reaches_connecting_or_done() {
        let states = [
            CallState::Ringing,
            CallState::Active,
            CallState::Held,
            CallState::Reconnecting(NetworkReason::NetworkLost),
            CallState::Dropped(NetworkReason::MediaLost),
        ];
        for state in states {
            assert!(!CallState::New.can_transition_to(&state), "NEW -> {}", state);
        }
        assert!(CallState::New.can_transition_to(&CallState::Connecting));
        assert!(CallState::New.can_transition_to(&CallState::Done(None)));
    }

    #[test]
    fn test_done_has_no_exits() {
        let done = CallState::Done(Some(TerminationReason::new(CauseCode::NormalClearing)));
        for next in [CallState::New, CallState::Connecting, CallState::Active, CallState::Done(None)] {
            assert!(!done.can_transition_to(&next));
        }
    }

    #[test]
    fn test_transition_reports_previous_state() {
        let mut call = outbound();
        assert_eq!(call.transition(CallState::Connecting).unwrap(), Some(CallState::New));
        assert_eq!(call.transition(CallState::Connecting).unwrap(), None);
        assert_eq!(call.transition(CallState::Active).unwrap(), Some(CallState::Connecting));
        assert!(call.details().connected_at.is_some());
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut call = outbound();
        let err = call.transition(CallState::Active).unwrap_err();
        assert!(matches!(err, ClientError::InvalidCallState { current_state: CallState::New, .. }));
        assert_eq!(call.state(), &CallState::New);
    }

    #[test]
    fn test_remote_hangup_keeps_unknown_code() {
        let hangup = RemoteHangup {
            wire_call_id: "abc".into(),
            cause: None,
            cause_code: Some(999),
            sip_code: Some(480),
            sip_reason: Some("Temporarily Unavailable".into()),
        };
        let reason = TerminationReason::from_remote(&hangup);
        assert_eq!(reason.cause, CauseCode::NormalClearing);
        assert_eq!(reason.cause_code, 999);
        assert_eq!(reason.sip_code, Some(480));
    }

    #[test]
    fn test_placeholder_and_state_predicates() {
        let call = Call::placeholder(CallInfo::from_wire_id("not-a-uuid"));
        assert!(call.is_placeholder());
        assert_eq!(call.wire_call_id(), "not-a-uuid");
        assert!(!call.state().is_in_progress());

        assert!(CallState::Held.is_active());
        assert!(CallState::Reconnecting(NetworkReason::NetworkLost).is_in_progress());
        assert!(CallState::Done(None).is_terminated());
        assert_eq!(CallState::Reconnecting(NetworkReason::NetworkLost).to_string(), "RECONNECTING(network lost)");
    }
}
