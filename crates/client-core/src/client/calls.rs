//! Call operations for the client-core library
//!
//! Placing, answering and ending calls, plus in-call control: hold, DTMF,
//! mute and ICE restart.
//!
//! # Call Management Overview
//!
//! - **Outgoing Calls**: [`ClientManager::new_call`] creates the media engine,
//!   builds the offer and sends `telnyx_rtc.invite` once the first local
//!   candidate is ready (right away with trickle ICE)
//! - **Incoming Calls**: arrive as [`ClientEvent::IncomingCall`] and are
//!   taken with [`ClientManager::answer`]
//! - **Call Control**: [`ClientManager::hangup`], hold, DTMF and mute
//! - **Call Information**: [`ClientManager::get_call`] and
//!   [`ClientManager::calls`] return [`CallDetails`] snapshots
//!
//! Hold state follows the server's acknowledgement, never the request: after
//! [`ClientManager::hold`] the call stays `ACTIVE` until the server confirms.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use txrtc_client_core::{ClientManager, ClientResult};
//! use txrtc_verto_core::CallOptions;
//!
//! async fn place(client: &ClientManager) -> ClientResult<()> {
//!     let call_id = client
//!         .new_call("Alice", "+15550001000", CallOptions::new("+15550002000"))
//!         .await?;
//!
//!     client.dtmf(call_id, "1234#").await?;
//!     client.hangup(call_id, None).await?;
//!     Ok(())
//! }
//! ```

use tracing::{debug, info, warn};
use uuid::Uuid;

use txrtc_verto_core::requests::{
    AnswerRequest, AttachRequest, ByeRequest, IceRestartRequest, InfoRequest, InviteRequest, ModifyAction,
    ModifyRequest, VertoRequest,
};
use txrtc_verto_core::{CallInfo, CallOptions, CauseCode, CustomHeader};

use crate::call::{Call, CallDetails, CallDirection, CallId, CallState, TerminationReason};
use crate::error::{ClientError, ClientResult};
use crate::media::SdpKind;
use crate::push::PushAction;

use super::manager::{ClientInner, ClientManager};
use super::recovery::with_timeout;
use super::session::SessionState;

/// Media engine failures keep their own kind; anything else is wrapped
fn media_failure(error: ClientError) -> ClientError {
    match error {
        ClientError::MediaEngineFailed { .. } | ClientError::OperationTimeout { .. } => error,
        other => ClientError::media_engine_failed(other.to_string()),
    }
}

fn invalid_state(call: &Call) -> ClientError {
    ClientError::InvalidCallState { call_id: call.id(), current_state: call.state().clone() }
}

impl ClientInner {
    /// Send the Invite, Answer or Attach frame of a call, once.
    ///
    /// Uses the engine's current description so gathered candidates ride
    /// along, falling back to the SDP the engine first produced.
    pub(super) async fn send_local_description(&self, state: &mut SessionState, call_id: CallId) -> ClientResult<()> {
        let session_id = state.require_session()?;
        let call = state.require_call(&call_id)?;
        if call.description_sent {
            return Ok(());
        }

        let current = match &call.media {
            Some(media) => media.local_description().await,
            None => None,
        };
        let sdp = current
            .or_else(|| call.local_sdp.clone())
            .ok_or_else(|| ClientError::media_engine_failed("no local description"))?;

        let direction = call.direction();
        let message = match direction {
            CallDirection::Outbound => {
                InviteRequest::new(session_id, sdp, call.info.clone(), call.options.clone()).to_message()
            }
            CallDirection::Inbound => AnswerRequest::new(session_id, sdp, call.info.clone(), call.options.clone())
                .with_custom_headers(call.answer_custom_headers.clone())
                .to_message(),
            CallDirection::Attach => AttachRequest::new(session_id, sdp, call.info.clone(), &call.options).to_message(),
        };

        self.send_message(state, message).await?;
        if let Some(call) = state.call_mut(&call_id) {
            call.description_sent = true;
        }
        debug!(call_id = %call_id, direction = ?direction, "Local description sent");

        if direction != CallDirection::Outbound {
            state.set_call_state(&call_id, CallState::Active, Some("answered"))?;
        }
        Ok(())
    }

    /// Create the engine for an offered call and produce our answer
    pub(super) async fn negotiate_answer(&self, state: &mut SessionState, call_id: CallId) -> ClientResult<()> {
        let remote_sdp = state.require_call(&call_id)?.remote_sdp.clone().unwrap_or_default();
        let (media, events) = self
            .media_factory
            .create(call_id, &self.config.server.ice_servers)
            .map_err(media_failure)?;

        let negotiated = with_timeout("create answer", self.config.media_timeout, async {
            media.set_remote_description(&remote_sdp, SdpKind::Offer).await?;
            media.create_answer().await
        })
        .await;
        let answer = match negotiated {
            Ok(sdp) => sdp,
            Err(e) => {
                media.close().await;
                return Err(media_failure(e));
            }
        };

        let forwarder = self.forward_media(call_id, events);
        let Some(call) = state.call_mut(&call_id) else {
            forwarder.abort();
            media.close().await;
            return Err(ClientError::CallNotFound { call_id });
        };
        call.local_sdp = Some(answer);
        call.media = Some(media);
        call.media_task = Some(forwarder);
        call.answering = true;

        if self.config.trickle_ice {
            if let Err(e) = self.send_local_description(state, call_id).await {
                self.abandon_answer(state, call_id).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undo an answer whose description never left, leaving the call ringing
    pub(super) async fn abandon_answer(&self, state: &mut SessionState, call_id: CallId) {
        let Some(call) = state.call_mut(&call_id) else {
            return;
        };
        if call.description_sent {
            return;
        }
        let media = call.take_media();
        call.answering = false;
        call.local_sdp = None;
        debug!(call_id = %call_id, "Answer abandoned");
        if let Some(media) = media {
            media.close().await;
        }
    }

    pub(super) async fn answer_call(
        &self,
        state: &mut SessionState,
        call_id: CallId,
        custom_headers: Vec<CustomHeader>,
    ) -> ClientResult<()> {
        let call = state.require_call(&call_id)?;
        if call.is_placeholder() {
            debug!(call_id = %call_id, "Answer recorded until the pushed invite arrives");
            if let Some(push) = state.push.as_mut() {
                push.pending_action = PushAction::AnswerCall;
            }
            return Ok(());
        }
        if call.direction() != CallDirection::Inbound {
            return Err(invalid_state(call));
        }
        if call.description_sent || call.state().is_active() {
            debug!(call_id = %call_id, "Call already answered");
            return Ok(());
        }
        if call.answering && call.media.is_some() {
            debug!(call_id = %call_id, "Answer waiting for local candidates");
            return Ok(());
        }
        if *call.state() != CallState::Ringing {
            return Err(invalid_state(call));
        }
        call.answer_custom_headers = custom_headers;
        state.require_session()?;

        info!(call_id = %call_id, "Answering call");
        self.negotiate_answer(state, call_id).await
    }

    /// Remove a call, close its media and report `DONE`
    pub(super) async fn finish_call(
        &self,
        state: &mut SessionState,
        call_id: CallId,
        reason: Option<TerminationReason>,
        why: &str,
    ) {
        let Some(call) = state.call_mut(&call_id) else {
            return;
        };
        let media = call.take_media();
        if let Err(e) = state.set_call_state(&call_id, CallState::Done(reason), Some(why)) {
            warn!(call_id = %call_id, error = %e, "Call could not be marked done");
        }
        state.remove_call(&call_id);
        if let Some(media) = media {
            media.close().await;
        }
    }

    /// Send Bye when possible, then end the call locally
    pub(super) async fn terminate_call(
        &self,
        state: &mut SessionState,
        call_id: CallId,
        cause: Option<CauseCode>,
        why: &str,
    ) {
        self.terminate_call_with_sip(state, call_id, cause, None, why).await;
    }

    /// [`terminate_call`](Self::terminate_call) carrying a SIP status in the Bye
    async fn terminate_call_with_sip(
        &self,
        state: &mut SessionState,
        call_id: CallId,
        cause: Option<CauseCode>,
        sip: Option<(u16, String)>,
        why: &str,
    ) {
        let cause = cause.unwrap_or_default();
        let bye = match (state.call(&call_id), state.session_id.clone()) {
            (Some(call), Some(session_id)) if !call.is_placeholder() && state.socket_connected => {
                let request = ByeRequest::new(session_id, call.wire_call_id(), cause);
                let request = match &sip {
                    Some((code, reason)) => request.with_sip(*code, reason.clone()),
                    None => request,
                };
                Some(request.to_message())
            }
            _ => None,
        };
        if let Some(bye) = bye {
            if let Err(e) = self.send_message(state, bye).await {
                warn!(call_id = %call_id, error = %e, "Bye could not be sent");
            }
        }
        let mut reason = TerminationReason::new(cause);
        if let Some((code, text)) = sip {
            reason.sip_code = Some(code);
            reason.sip_reason = Some(text);
        }
        self.finish_call(state, call_id, Some(reason), why).await;
    }

    async fn hangup_call(
        &self,
        state: &mut SessionState,
        call_id: CallId,
        cause: Option<CauseCode>,
        sip: Option<(u16, String)>,
    ) -> ClientResult<()> {
        let call = state.require_call(&call_id)?;
        if call.is_placeholder() {
            debug!(call_id = %call_id, "Rejection recorded until the pushed invite arrives");
            if let Some(push) = state.push.as_mut() {
                push.pending_action = PushAction::RejectCall;
            }
            return Ok(());
        }
        info!(call_id = %call_id, cause = ?cause, sip_code = ?sip.as_ref().map(|(code, _)| *code), "Hanging up");
        self.terminate_call_with_sip(state, call_id, cause, sip, "local hangup").await;
        Ok(())
    }

    async fn place_call(
        &self,
        state: &mut SessionState,
        caller_name: String,
        caller_number: String,
        options: CallOptions,
    ) -> ClientResult<CallId> {
        let has_destination = options
            .destination_number
            .as_deref()
            .is_some_and(|destination| !destination.trim().is_empty());
        if !has_destination {
            return Err(ClientError::DestinationNumberRequired);
        }
        state.require_session()?;
        if !state.socket_connected {
            return Err(ClientError::SocketNotConnected);
        }
        if !state.registration.is_ready() {
            return Err(ClientError::NotRegistered);
        }

        let call_id = Uuid::new_v4();
        let (media, events) = self
            .media_factory
            .create(call_id, &self.config.server.ice_servers)
            .map_err(media_failure)?;
        let offer = match with_timeout("create offer", self.config.media_timeout, media.create_offer()).await {
            Ok(sdp) => sdp,
            Err(e) => {
                media.close().await;
                return Err(media_failure(e));
            }
        };

        let info = CallInfo::new(call_id).with_caller(caller_name, caller_number);
        let mut call = Call::outbound(info, options);
        call.local_sdp = Some(offer);
        call.media = Some(media);
        call.media_task = Some(self.forward_media(call_id, events));
        if let Err(e) = state.insert_call(call) {
            warn!(call_id = %call_id, error = %e, "Could not register call");
            return Err(e);
        }
        info!(call_id = %call_id, "Placing call");
        state.set_call_state(&call_id, CallState::Connecting, Some("placing call"))?;

        if self.config.trickle_ice {
            if let Err(e) = self.send_local_description(state, call_id).await {
                let reason = TerminationReason::new(CauseCode::NormalTemporaryFailure);
                self.finish_call(state, call_id, Some(reason), "invite failed").await;
                return Err(e);
            }
        }
        Ok(call_id)
    }

    async fn modify_call(&self, state: &mut SessionState, call_id: CallId, action: ModifyAction) -> ClientResult<()> {
        let session_id = state.require_session()?;
        let call = state.require_call(&call_id)?;
        let allowed = match action {
            ModifyAction::Hold => *call.state() == CallState::Active,
            ModifyAction::Unhold => *call.state() == CallState::Held,
            ModifyAction::ToggleHold => call.state().is_active(),
        };
        if !allowed {
            return Err(invalid_state(call));
        }
        let message = ModifyRequest::new(session_id, call.wire_call_id(), action).to_message();
        debug!(call_id = %call_id, action = action.as_str(), "Requesting hold change");
        self.send_message(state, message).await
    }

    async fn send_dtmf(&self, state: &mut SessionState, call_id: CallId, digits: String) -> ClientResult<()> {
        let session_id = state.require_session()?;
        let call = state.require_call(&call_id)?;
        if !call.state().is_active() {
            return Err(invalid_state(call));
        }
        let message = InfoRequest::dtmf(session_id, digits, call.info.clone(), call.options.clone()).to_message();
        self.send_message(state, message).await
    }

    async fn set_muted(&self, state: &mut SessionState, call_id: CallId, muted: bool) -> ClientResult<()> {
        let call = state.require_call(&call_id)?;
        let Some(media) = call.media.clone() else {
            return Err(invalid_state(call));
        };
        with_timeout("set muted", self.config.media_timeout, media.set_muted(muted))
            .await
            .map_err(media_failure)?;
        if let Some(call) = state.call_mut(&call_id) {
            call.muted = muted;
        }
        debug!(call_id = %call_id, muted = muted, "Microphone mute changed");
        Ok(())
    }

    async fn restart_call_ice(&self, state: &mut SessionState, call_id: CallId) -> ClientResult<()> {
        let session_id = state.require_session()?;
        let call = state.require_call(&call_id)?;
        let restartable = call.state().is_active() || matches!(call.state(), CallState::Dropped(_));
        let media = match call.media.clone() {
            Some(media) if restartable => media,
            _ => return Err(invalid_state(call)),
        };
        let wire_call_id = call.wire_call_id().to_string();

        let offer = with_timeout("restart ice", self.config.media_timeout, media.restart_ice())
            .await
            .map_err(media_failure)?;
        if let Some(call) = state.call_mut(&call_id) {
            call.local_sdp = Some(offer.clone());
        }
        info!(call_id = %call_id, "Restarting ICE");
        self.send_message(state, IceRestartRequest::new(session_id, wire_call_id, offer).to_message())
            .await
    }
}

/// Call operations implementation for ClientManager
impl ClientManager {
    /// Place an outgoing call.
    ///
    /// # Errors
    ///
    /// * `ClientError::DestinationNumberRequired` - `options` has no destination
    /// * `ClientError::SessionIdRequired` - not logged in
    /// * `ClientError::SocketNotConnected` - the socket is down
    /// * `ClientError::NotRegistered` - the gateway has not reported `REGED`
    /// * `ClientError::MediaEngineFailed` - no offer could be created
    ///
    /// Nothing is sent and the registry is untouched when any of these occur.
    pub async fn new_call(
        &self,
        caller_name: impl Into<String>,
        caller_number: impl Into<String>,
        options: CallOptions,
    ) -> ClientResult<CallId> {
        let mut state = self.inner.state.lock().await;
        let result = self
            .inner
            .place_call(&mut state, caller_name.into(), caller_number.into(), options)
            .await;
        self.inner.release(state, result).await
    }

    /// Answer a ringing inbound call.
    ///
    /// Answering twice is a no-op. On a push placeholder the answer is held
    /// until the invite arrives.
    pub async fn answer(&self, call_id: CallId) -> ClientResult<()> {
        self.answer_with_headers(call_id, Vec::new()).await
    }

    /// Answer, sending `custom_headers` with the Answer frame
    pub async fn answer_with_headers(&self, call_id: CallId, custom_headers: Vec<CustomHeader>) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.answer_call(&mut state, call_id, custom_headers).await;
        self.inner.release(state, result).await
    }

    /// End a call; `cause` defaults to `NORMAL_CLEARING`.
    ///
    /// The call reaches `DONE` and leaves the registry immediately, whether or
    /// not the Bye could be delivered.
    pub async fn hangup(&self, call_id: CallId, cause: Option<CauseCode>) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.hangup_call(&mut state, call_id, cause, None).await;
        self.inner.release(state, result).await
    }

    /// End a call, reporting a SIP status to the far end alongside `cause`
    pub async fn hangup_with_sip(
        &self,
        call_id: CallId,
        cause: Option<CauseCode>,
        sip_code: u16,
        sip_reason: impl Into<String>,
    ) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self
            .inner
            .hangup_call(&mut state, call_id, cause, Some((sip_code, sip_reason.into())))
            .await;
        self.inner.release(state, result).await
    }

    /// Ask the server to hold an active call
    pub async fn hold(&self, call_id: CallId) -> ClientResult<()> {
        self.modify(call_id, ModifyAction::Hold).await
    }

    pub async fn unhold(&self, call_id: CallId) -> ClientResult<()> {
        self.modify(call_id, ModifyAction::Unhold).await
    }

    pub async fn toggle_hold(&self, call_id: CallId) -> ClientResult<()> {
        self.modify(call_id, ModifyAction::ToggleHold).await
    }

    async fn modify(&self, call_id: CallId, action: ModifyAction) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.modify_call(&mut state, call_id, action).await;
        self.inner.release(state, result).await
    }

    /// Send DTMF digits on an active call
    pub async fn dtmf(&self, call_id: CallId, digits: impl Into<String>) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.send_dtmf(&mut state, call_id, digits.into()).await;
        self.inner.release(state, result).await
    }

    pub async fn mute(&self, call_id: CallId) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.set_muted(&mut state, call_id, true).await;
        self.inner.release(state, result).await
    }

    pub async fn unmute(&self, call_id: CallId) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.set_muted(&mut state, call_id, false).await;
        self.inner.release(state, result).await
    }

    /// Renegotiate the media path with a fresh ICE offer
    pub async fn restart_ice(&self, call_id: CallId) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        let result = self.inner.restart_call_ice(&mut state, call_id).await;
        self.inner.release(state, result).await
    }

    /// Snapshot of one call
    pub async fn get_call(&self, call_id: &CallId) -> ClientResult<CallDetails> {
        let state = self.inner.state.lock().await;
        state
            .call(call_id)
            .map(Call::details)
            .ok_or(ClientError::CallNotFound { call_id: *call_id })
    }

    /// Snapshots of every call in the registry
    pub async fn calls(&self) -> Vec<CallDetails> {
        let state = self.inner.state.lock().await;
        state.calls().map(Call::details).collect()
    }

    /// Calls that are set up or being set up
    pub async fn active_calls(&self) -> Vec<CallDetails> {
        let state = self.inner.state.lock().await;
        state
            .calls()
            .filter(|call| call.state().is_in_progress())
            .map(Call::details)
            .collect()
    }
}
