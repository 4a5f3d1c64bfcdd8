//! Inbound frame and media event routing
//!
//! Frames carrying `error` become [`ClientEvent::ClientError`]. Result frames
//! are session scoped (login, gateway state, hold acknowledgements). Every
//! other frame is routed by its call id; frames naming a call the registry
//! does not know are dropped.

use chrono::Utc;
use tracing::{debug, info, trace, warn};

use txrtc_verto_core::requests::{
    ping_response, AttachCallsRequest, CandidateRequest, EndOfCandidatesRequest, GatewayStateRequest,
    RingingAckRequest, VertoRequest,
};
use txrtc_verto_core::{
    CallInfo, CallOptions, CauseCode, CustomHeader, GatewayState, HoldState, Message, Payload, RemoteHangup,
    RemoteOffer,
};

use crate::call::{Call, CallDirection, CallId, CallState, NetworkReason, TerminationReason};
use crate::error::ClientError;
use crate::events::{ClientEvent, IncomingCallInfo};
use crate::media::{IceCandidate, MediaEvent, SdpKind};
use crate::push::PushAction;
use crate::registration::{RegistrationUpdate, RetryDecision};

use super::manager::{ClientInner, LoopMessage};
use super::session::SessionState;

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl ClientInner {
    pub(super) async fn on_frame(&self, state: &mut SessionState, text: &str) {
        let Some(message) = Message::decode(text) else {
            warn!(length = text.len(), "Dropping undecodable frame");
            return;
        };
        trace!(frame = %text, "Frame received");
        if let Some(voice_sdk_id) = &message.voice_sdk_id {
            state.voice_sdk_id = Some(voice_sdk_id.clone());
        }

        match Payload::from_message(&message) {
            Payload::ServerError { id, code, message } => {
                warn!(id = %id, code = code, message = %message, "Signaling server error");
                let error = ClientError::SignalingServerError { message, code: code.to_string() };
                state.emit(ClientEvent::client_error(error, None));
            }
            Payload::LoginResult { session_id } => self.on_login(state, session_id).await,
            Payload::GatewayState(gateway) => self.on_gateway_state(state, gateway).await,
            Payload::HoldAck { wire_call_id, state: hold } => self.on_hold_state(state, &wire_call_id, hold),
            Payload::Response { id, .. } => debug!(id = %id, "Result frame"),
            Payload::Ping { id } => {
                trace!(id = %id, "Ping");
                let pong = ping_response(&message, state.session_id.as_deref());
                self.send_or_report(state, pong, None).await;
            }
            Payload::ClientReady => self.start_gateway_polling(state).await,
            Payload::Invite(offer) => self.on_invite(state, offer).await,
            Payload::Attach(offer) => self.on_attach(state, offer).await,
            Payload::Answer { wire_call_id, sdp, custom_headers } => {
                self.on_remote_answer(state, &wire_call_id, sdp, custom_headers).await
            }
            Payload::Media { wire_call_id, sdp } => self.on_early_media(state, &wire_call_id, sdp).await,
            Payload::Ringing { wire_call_id, telnyx_session_id, telnyx_leg_id } => {
                self.on_ringing(state, &wire_call_id, telnyx_session_id, telnyx_leg_id).await
            }
            Payload::Bye(hangup) => self.on_remote_bye(state, hangup).await,
            Payload::Modify { wire_call_id, state: Some(hold) } => self.on_hold_state(state, &wire_call_id, hold),
            Payload::Modify { wire_call_id, state: None } => {
                debug!(wire_call_id = %wire_call_id, "Modify without hold state")
            }
            Payload::Candidate { wire_call_id, candidate, sdp_mid, sdp_m_line_index } => {
                let candidate = IceCandidate::new(candidate, sdp_mid, sdp_m_line_index);
                self.on_remote_candidate(state, &wire_call_id, candidate).await
            }
            Payload::EndOfCandidates { wire_call_id } => {
                debug!(wire_call_id = %wire_call_id, "Remote candidates complete")
            }
            Payload::AiConversation { params } => state.emit(ClientEvent::ai_conversation(params)),
            Payload::Unrecognized { method, .. } => {
                debug!(method = ?method, "Ignoring unrecognized frame")
            }
        }
    }

    /// Registry key for `wire_call_id`, or `None` after logging the drop
    fn lookup(&self, state: &SessionState, wire_call_id: &str) -> Option<CallId> {
        let found = state.find_by_wire_id(wire_call_id);
        if found.is_none() {
            debug!(wire_call_id = %wire_call_id, "Frame for unknown call dropped");
        }
        found
    }

    async fn on_login(&self, state: &mut SessionState, session_id: String) {
        info!(session_id = %session_id, "Logged in");
        state.session_id = Some(session_id.clone());
        state.emit(ClientEvent::session_updated(session_id));

        // A declined push is ended by the server; drop our placeholder
        let declined = match state.push.as_mut() {
            Some(push) if push.declined => {
                push.attach_pending = false;
                push.metadata.call_id.clone()
            }
            _ => None,
        };
        let Some(call_id) = declined.and_then(|wire_call_id| state.find_by_wire_id(&wire_call_id)) else {
            return;
        };
        if state.call(&call_id).is_some_and(Call::is_placeholder) {
            self.finish_call(
                state,
                call_id,
                Some(TerminationReason::new(CauseCode::CallRejected)),
                "push declined",
            )
            .await;
        }
    }

    async fn start_gateway_polling(&self, state: &mut SessionState) {
        let cycle = state.registration.start();
        debug!(cycle = cycle, "Client ready, polling gateway state");
        self.send_or_report(state, GatewayStateRequest.to_message(), None).await;
        self.arm(
            &self.gateway_timer,
            self.config.gateway_retry_interval,
            LoopMessage::GatewayRetry { cycle },
        );
    }

    pub(super) async fn on_gateway_retry(&self, state: &mut SessionState, cycle: u64) {
        match state.registration.on_retry_expired(cycle) {
            RetryDecision::Stale => {}
            RetryDecision::PollAgain => {
                debug!(poll = state.registration.polls_sent(), "Gateway not registered yet, polling again");
                self.send_or_report(state, GatewayStateRequest.to_message(), None).await;
                self.arm(
                    &self.gateway_timer,
                    self.config.gateway_retry_interval,
                    LoopMessage::GatewayRetry { cycle },
                );
            }
            RetryDecision::GiveUp { attempts } => {
                warn!(attempts = attempts, state = ?state.registration.state(), "Gateway registration failed");
                state.emit(ClientEvent::client_error(ClientError::GatewayNotRegistered { attempts }, None));
            }
        }
    }

    async fn on_gateway_state(&self, state: &mut SessionState, gateway: GatewayState) {
        match state.registration.on_state(gateway) {
            RegistrationUpdate::Ready => {
                self.gateway_timer.cancel();
                info!("Gateway registered, client ready");
                state.emit(ClientEvent::gateway_state_changed(gateway));
                state.emit(ClientEvent::client_ready());
                self.complete_reconnect(state);
                self.send_pending_attach(state).await;
            }
            RegistrationUpdate::Changed(gateway) => {
                debug!(state = %gateway, "Gateway state changed");
                state.emit(ClientEvent::gateway_state_changed(gateway));
            }
            RegistrationUpdate::Unchanged => {}
        }
    }

    async fn send_pending_attach(&self, state: &mut SessionState) {
        let pending = state.push.as_ref().is_some_and(|push| push.attach_pending);
        if !pending {
            return;
        }
        let request = AttachCallsRequest {
            push_provider: Some(self.config.push.provider.clone()),
            environment: self.config.push.environment,
        };
        debug!("Attaching pushed calls");
        self.send_or_report(state, request.to_message(), None).await;
        if let Some(push) = state.push.as_mut() {
            push.attach_pending = false;
        }
    }

    async fn on_invite(&self, state: &mut SessionState, offer: RemoteOffer) {
        let known = state.find_by_wire_id(&offer.wire_call_id);
        let placeholder = known.filter(|id| state.call(id).is_some_and(Call::is_placeholder));
        if known.is_some() && placeholder.is_none() {
            debug!(wire_call_id = %offer.wire_call_id, "Duplicate invite ignored");
            return;
        }

        let mut info = CallInfo::from_wire_id(&offer.wire_call_id);
        info.caller_name = non_empty(&offer.caller_name);
        info.caller_number = non_empty(&offer.caller_number);
        if let Some(placeholder) = placeholder {
            state.remove_call(&placeholder);
            info.call_id = placeholder;
        }

        let mut call = Call::inbound(info, offer.sdp.clone());
        call.telnyx_session_id = offer.telnyx_session_id.clone();
        call.telnyx_leg_id = offer.telnyx_leg_id.clone();
        call.remote_custom_headers = offer.custom_headers.clone();
        let call_id = call.id();
        let incoming = IncomingCallInfo {
            call_id,
            wire_call_id: offer.wire_call_id.clone(),
            caller_name: call.info.caller_name.clone(),
            caller_number: call.info.caller_number.clone(),
            telnyx_session_id: offer.telnyx_session_id.clone(),
            telnyx_leg_id: offer.telnyx_leg_id.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = state.insert_call(call) {
            warn!(call_id = %call_id, error = %e, "Could not register incoming call");
            return;
        }
        info!(call_id = %call_id, caller = %offer.caller_number, "Incoming call");
        state.emit(ClientEvent::incoming_call(incoming));
        state.emit(ClientEvent::call_state_changed(
            call_id,
            placeholder.map(|_| CallState::New),
            CallState::Ringing,
            Some("incoming call".to_string()),
        ));

        self.apply_push_action(state, call_id, &offer.wire_call_id).await;
    }

    async fn apply_push_action(&self, state: &mut SessionState, call_id: CallId, wire_call_id: &str) {
        let action = match state.push.as_mut() {
            Some(push) if push.is_pushed_call(wire_call_id) => std::mem::take(&mut push.pending_action),
            _ => return,
        };
        match action {
            PushAction::AnswerCall => {
                info!(call_id = %call_id, "Answering pushed call");
                if let Err(e) = self.answer_call(state, call_id, Vec::new()).await {
                    warn!(call_id = %call_id, error = %e, "Answering pushed call failed");
                    state.emit(ClientEvent::client_error(e, Some(call_id)));
                }
            }
            PushAction::RejectCall => {
                info!(call_id = %call_id, "Rejecting pushed call");
                self.terminate_call(state, call_id, Some(CauseCode::CallRejected), "rejected from push")
                    .await;
            }
            PushAction::None => {}
        }
    }

    /// Server re-created a call after a push or reconnect; answer it ourselves
    async fn on_attach(&self, state: &mut SessionState, offer: RemoteOffer) {
        let mut info = CallInfo::from_wire_id(&offer.wire_call_id);
        info.caller_name = non_empty(&offer.caller_name);
        info.caller_number = non_empty(&offer.caller_number);
        let mut options = CallOptions::default();
        let mut previous = None;

        let existing = state.find_by_wire_id(&offer.wire_call_id);
        if let Some((existing, mut old)) = existing.and_then(|id| state.remove_call(&id).map(|old| (id, old))) {
            info.call_id = existing;
            if info.caller_name.is_none() {
                info.caller_name = old.info.caller_name.clone();
                info.caller_number = old.info.caller_number.clone();
            }
            options = old.options.clone();
            previous = Some(old.state().clone());
            if let Some(media) = old.take_media() {
                media.close().await;
            }
        }

        let mut call = Call::attached(info, options, offer.sdp.clone());
        call.telnyx_session_id = offer.telnyx_session_id.clone();
        call.telnyx_leg_id = offer.telnyx_leg_id.clone();
        call.remote_custom_headers = offer.custom_headers.clone();
        let call_id = call.id();
        if let Err(e) = state.insert_call(call) {
            warn!(call_id = %call_id, error = %e, "Could not register attached call");
            return;
        }
        info!(call_id = %call_id, "Call attached");
        state.emit(ClientEvent::call_state_changed(
            call_id,
            previous,
            CallState::Connecting,
            Some("attach".to_string()),
        ));

        if let Err(e) = self.negotiate_answer(state, call_id).await {
            warn!(call_id = %call_id, error = %e, "Attach negotiation failed");
            state.emit(ClientEvent::client_error(e, Some(call_id)));
            self.terminate_call(state, call_id, Some(CauseCode::NormalTemporaryFailure), "attach failed")
                .await;
        }
    }

    async fn on_remote_answer(
        &self,
        state: &mut SessionState,
        wire_call_id: &str,
        sdp: Option<String>,
        custom_headers: Vec<CustomHeader>,
    ) {
        let Some(call_id) = self.lookup(state, wire_call_id) else {
            return;
        };
        let Some(call) = state.call_mut(&call_id) else {
            return;
        };
        if !custom_headers.is_empty() {
            call.remote_custom_headers = custom_headers;
        }
        if let Some(sdp) = sdp {
            if let Some(media) = call.media.clone() {
                if let Err(e) = media.set_remote_description(&sdp, SdpKind::Answer).await {
                    warn!(call_id = %call_id, error = %e, "Remote answer rejected by media engine");
                    state.emit(ClientEvent::client_error(e, Some(call_id)));
                }
            }
            if let Some(call) = state.call_mut(&call_id) {
                call.remote_sdp = Some(sdp);
            }
        }
        self.advance(state, call_id, CallState::Active, "remote answer");
    }

    async fn on_early_media(&self, state: &mut SessionState, wire_call_id: &str, sdp: String) {
        let Some(call_id) = self.lookup(state, wire_call_id) else {
            return;
        };
        let Some(call) = state.call_mut(&call_id) else {
            return;
        };
        if let Some(media) = call.media.clone() {
            if let Err(e) = media.set_remote_description(&sdp, SdpKind::ProvisionalAnswer).await {
                warn!(call_id = %call_id, error = %e, "Early media rejected by media engine");
                state.emit(ClientEvent::client_error(e, Some(call_id)));
            }
        }
        if let Some(call) = state.call_mut(&call_id) {
            call.remote_sdp = Some(sdp);
            if matches!(call.state(), CallState::Connecting | CallState::Ringing) {
                self.advance(state, call_id, CallState::Active, "early media");
            }
        }
    }

    async fn on_ringing(
        &self,
        state: &mut SessionState,
        wire_call_id: &str,
        telnyx_session_id: Option<String>,
        telnyx_leg_id: Option<String>,
    ) {
        let Some(call_id) = self.lookup(state, wire_call_id) else {
            return;
        };
        let Some(call) = state.call_mut(&call_id) else {
            return;
        };
        if telnyx_session_id.is_some() {
            call.telnyx_session_id = telnyx_session_id;
        }
        if telnyx_leg_id.is_some() {
            call.telnyx_leg_id = telnyx_leg_id;
        }
        let wire_call_id = call.wire_call_id().to_string();
        if *call.state() == CallState::Connecting {
            self.advance(state, call_id, CallState::Ringing, "remote ringing");
        }

        if let Some(session_id) = state.session_id.clone() {
            let ack = RingingAckRequest { wire_call_id, session_id };
            self.send_or_report(state, ack.to_message(), Some(call_id)).await;
        }
    }

    async fn on_remote_bye(&self, state: &mut SessionState, hangup: RemoteHangup) {
        let Some(call_id) = self.lookup(state, &hangup.wire_call_id) else {
            return;
        };
        let reason = TerminationReason::from_remote(&hangup);
        info!(call_id = %call_id, cause = %reason.cause, code = reason.cause_code, "Remote hangup");
        self.finish_call(state, call_id, Some(reason.clone()), "remote hangup").await;
        state.emit(ClientEvent::remote_call_ended(call_id, reason));
    }

    fn on_hold_state(&self, state: &mut SessionState, wire_call_id: &str, hold: HoldState) {
        let Some(call_id) = self.lookup(state, wire_call_id) else {
            return;
        };
        let (next, why) = match hold {
            HoldState::Held => (CallState::Held, "hold acknowledged"),
            HoldState::Active => (CallState::Active, "unhold acknowledged"),
        };
        self.advance(state, call_id, next, why);
    }

    async fn on_remote_candidate(&self, state: &mut SessionState, wire_call_id: &str, candidate: IceCandidate) {
        let Some(call_id) = self.lookup(state, wire_call_id) else {
            return;
        };
        let Some(media) = state.call(&call_id).and_then(|call| call.media.clone()) else {
            debug!(call_id = %call_id, "Remote candidate before media, dropped");
            return;
        };
        if let Err(e) = media.add_ice_candidate(candidate).await {
            warn!(call_id = %call_id, error = %e, "Remote candidate rejected");
        }
    }

    /// Transition, logging instead of failing on an illegal step
    fn advance(&self, state: &mut SessionState, call_id: CallId, next: CallState, why: &str) {
        if let Err(e) = state.set_call_state(&call_id, next, Some(why)) {
            warn!(call_id = %call_id, error = %e, "Ignoring state change");
        }
    }

    pub(super) async fn on_media_event(&self, state: &mut SessionState, call_id: CallId, event: MediaEvent) {
        let Some(call) = state.call(&call_id) else {
            trace!(call_id = %call_id, "Media event for ended call");
            return;
        };
        let ready = call.direction() == CallDirection::Outbound || call.answering;
        let description_sent = call.description_sent;
        let wire_call_id = call.wire_call_id().to_string();
        let current = call.state().clone();

        match event {
            MediaEvent::LocalCandidate(candidate) => {
                if !ready {
                    return;
                }
                if !description_sent {
                    self.send_description_or_fail(state, call_id).await;
                } else if self.config.trickle_ice {
                    let request = CandidateRequest {
                        wire_call_id,
                        candidate: candidate.candidate,
                        sdp_mid: candidate.sdp_mid,
                        sdp_m_line_index: candidate.sdp_m_line_index,
                    };
                    self.send_or_report(state, request.to_message(), Some(call_id)).await;
                }
            }
            MediaEvent::GatheringComplete => {
                if !ready {
                    return;
                }
                if !description_sent {
                    self.send_description_or_fail(state, call_id).await;
                } else if self.config.trickle_ice {
                    let request = EndOfCandidatesRequest { wire_call_id };
                    self.send_or_report(state, request.to_message(), Some(call_id)).await;
                }
            }
            MediaEvent::ConnectionStateChanged(media_state) => {
                if media_state.is_lost() && current.is_active() {
                    warn!(call_id = %call_id, media_state = ?media_state, "Media path lost");
                    if let Some(call) = state.call_mut(&call_id) {
                        call.state_before_reconnect.get_or_insert(current);
                    }
                    self.advance(state, call_id, CallState::Dropped(NetworkReason::MediaLost), "media lost");
                } else if media_state.is_connected() && matches!(current, CallState::Dropped(_)) {
                    let restored = state
                        .call_mut(&call_id)
                        .and_then(|call| call.state_before_reconnect.take())
                        .unwrap_or(CallState::Active);
                    info!(call_id = %call_id, "Media path restored");
                    self.advance(state, call_id, restored, "media restored");
                }
            }
        }
    }

    async fn send_description_or_fail(&self, state: &mut SessionState, call_id: CallId) {
        if let Err(e) = self.send_local_description(state, call_id).await {
            warn!(call_id = %call_id, error = %e, "Local description could not be sent");
            // An inbound call goes back to ringing so the user can answer again
            if state.call(&call_id).is_some_and(|call| call.direction() == CallDirection::Inbound) {
                self.abandon_answer(state, call_id).await;
            }
            state.emit(ClientEvent::client_error(e, Some(call_id)));
        }
    }
}
