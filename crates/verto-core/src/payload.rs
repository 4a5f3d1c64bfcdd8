//! Typed view of inbound frames.
//!
//! [`Payload::from_message`] classifies a decoded [`Message`] once, at the
//! protocol boundary, so the client never has to dig through raw JSON maps.
//! Classification follows the routing rule of the signaling server:
//!
//! * a frame with `error` is a [`Payload::ServerError`],
//! * a frame with `result` is session scoped (login, gateway state, hold
//!   acknowledgements),
//! * anything else is dispatched on its `method`.
//!
//! Frames that are well formed but carry nothing this client acts upon come
//! back as [`Payload::Unrecognized`] and should be ignored.

use serde_json::Value;

use crate::cause::CauseCode;
use crate::dialog::CustomHeader;
use crate::gateway::GatewayState;
use crate::message::{JsonObject, Message};
use crate::method::Method;

/// Remote call description carried by an Invite or Attach
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteOffer {
    pub wire_call_id: String,
    pub sdp: String,
    pub caller_name: String,
    pub caller_number: String,
    pub telnyx_session_id: Option<String>,
    pub telnyx_leg_id: Option<String>,
    pub custom_headers: Vec<CustomHeader>,
}

/// Remote hangup details
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteHangup {
    pub wire_call_id: String,
    /// Cause resolved from `causeCode` or `cause`, if either is known
    pub cause: Option<CauseCode>,
    pub cause_code: Option<u16>,
    pub sip_code: Option<u16>,
    pub sip_reason: Option<String>,
}

/// Hold state reported by a modify acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Held,
    Active,
}

impl HoldState {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "held" | "hold" => Some(HoldState::Held),
            "active" | "unhold" => Some(HoldState::Active),
            _ => None,
        }
    }
}

/// An inbound frame, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `error` member present
    ServerError { id: String, code: i64, message: String },
    /// Login result assigning a session id
    LoginResult { session_id: String },
    /// Gateway registration state, from a poll result or a pushed update
    GatewayState(GatewayState),
    /// Acknowledged hold change for a call
    HoldAck { wire_call_id: String, state: HoldState },
    /// Any other `result` frame
    Response { id: String, result: JsonObject },
    /// Server keepalive; must be answered with the same id
    Ping { id: String },
    ClientReady,
    Invite(RemoteOffer),
    Attach(RemoteOffer),
    Answer { wire_call_id: String, sdp: Option<String>, custom_headers: Vec<CustomHeader> },
    /// Early media SDP
    Media { wire_call_id: String, sdp: String },
    Ringing {
        wire_call_id: String,
        telnyx_session_id: Option<String>,
        telnyx_leg_id: Option<String>,
    },
    Bye(RemoteHangup),
    /// Server-initiated modify; `state` is set when it changes hold state
    Modify { wire_call_id: String, state: Option<HoldState> },
    /// Remote trickled candidate
    Candidate {
        wire_call_id: String,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_m_line_index: u32,
    },
    EndOfCandidates { wire_call_id: String },
    AiConversation { params: JsonObject },
    /// Anything else, kept for logging
    Unrecognized { method: Option<Method>, params: JsonObject },
}

fn string_of(map: &JsonObject, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_of(map: &JsonObject, key: &str) -> Option<u16> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn gateway_state_of(map: &JsonObject) -> Option<GatewayState> {
    let nested = map
        .get("params")
        .and_then(Value::as_object)
        .and_then(|params| string_of(params, "state"));
    nested
        .or_else(|| string_of(map, "state"))
        .and_then(|state| state.parse().ok())
}

impl Payload {
    /// Classify a decoded message
    pub fn from_message(message: &Message) -> Payload {
        if let Some(error) = &message.error {
            return Payload::ServerError {
                id: message.id.clone(),
                code: error.code,
                message: error.message.clone(),
            };
        }
        if let Some(result) = &message.result {
            return Self::from_result(message, result);
        }
        Self::from_request(message)
    }

    fn from_result(message: &Message, result: &JsonObject) -> Payload {
        if let Some(session_id) = message.session_id() {
            return Payload::LoginResult { session_id: session_id.to_string() };
        }
        if let Some(state) = gateway_state_of(result) {
            return Payload::GatewayState(state);
        }
        if let (Some(call_id), Some(state)) = (
            string_of(result, "callID"),
            string_of(result, "holdState").as_deref().and_then(HoldState::parse),
        ) {
            return Payload::HoldAck { wire_call_id: call_id, state };
        }
        if message.method == Some(Method::AiConversation) {
            return Payload::AiConversation { params: result.clone() };
        }
        Payload::Response { id: message.id.clone(), result: result.clone() }
    }

    fn from_request(message: &Message) -> Payload {
        let Some(method) = message.method.clone() else {
            return Payload::Unrecognized { method: None, params: message.params.clone() };
        };
        let params = &message.params;
        let call_id = message.call_id().map(str::to_string);

        let payload = match (&method, call_id) {
            (Method::Ping, _) => Some(Payload::Ping { id: message.id.clone() }),
            (Method::ClientReady, _) => Some(Payload::ClientReady),
            (Method::GatewayState, _) => gateway_state_of(params).map(Payload::GatewayState),
            (Method::AiConversation, _) => Some(Payload::AiConversation { params: params.clone() }),
            (Method::Invite, Some(id)) => Self::offer(message, id).map(Payload::Invite),
            (Method::Attach, Some(id)) => Self::offer(message, id).map(Payload::Attach),
            (Method::Answer, Some(id)) => Some(Payload::Answer {
                wire_call_id: id,
                sdp: string_of(params, "sdp"),
                custom_headers: Self::custom_headers(message),
            }),
            (Method::Media, Some(id)) => string_of(params, "sdp").map(|sdp| Payload::Media { wire_call_id: id, sdp }),
            (Method::Ringing, Some(id)) => Some(Payload::Ringing {
                wire_call_id: id,
                telnyx_session_id: string_of(params, "telnyx_session_id"),
                telnyx_leg_id: string_of(params, "telnyx_leg_id"),
            }),
            (Method::Bye, Some(id)) => Some(Payload::Bye(Self::hangup(params, id))),
            (Method::Modify, Some(id)) => Some(Payload::Modify {
                wire_call_id: id,
                state: string_of(params, "action").as_deref().and_then(HoldState::parse),
            }),
            (Method::Candidate, Some(id)) => string_of(params, "candidate").map(|candidate| Payload::Candidate {
                wire_call_id: id,
                candidate,
                sdp_mid: string_of(params, "sdpMid"),
                sdp_m_line_index: number_of(params, "sdpMLineIndex").map(u32::from).unwrap_or_default(),
            }),
            (Method::EndOfCandidates, Some(id)) => Some(Payload::EndOfCandidates { wire_call_id: id }),
            _ => None,
        };
        payload.unwrap_or_else(|| Payload::Unrecognized {
            method: Some(method),
            params: params.clone(),
        })
    }

    fn offer(message: &Message, wire_call_id: String) -> Option<RemoteOffer> {
        let params = &message.params;
        let sdp = string_of(params, "sdp")?;
        Some(RemoteOffer {
            wire_call_id,
            sdp,
            caller_name: string_of(params, "caller_id_name").unwrap_or_default(),
            caller_number: string_of(params, "caller_id_number").unwrap_or_default(),
            telnyx_session_id: string_of(params, "telnyx_session_id"),
            telnyx_leg_id: string_of(params, "telnyx_leg_id"),
            custom_headers: Self::custom_headers(message),
        })
    }

    fn custom_headers(message: &Message) -> Vec<CustomHeader> {
        CustomHeader::decode_list(message.dialog_params().and_then(|dialog| dialog.get("custom_headers")))
    }

    fn hangup(params: &JsonObject, wire_call_id: String) -> RemoteHangup {
        let cause_code = number_of(params, "causeCode");
        let cause = cause_code
            .and_then(CauseCode::from_code)
            .or_else(|| string_of(params, "cause").as_deref().and_then(CauseCode::from_cause));
        RemoteHangup {
            wire_call_id,
            cause,
            cause_code,
            sip_code: number_of(params, "sipCode"),
            sip_reason: string_of(params, "sipReason"),
        }
    }

    /// Wire call id the payload refers to, if it is call scoped
    pub fn wire_call_id(&self) -> Option<&str> {
        match self {
            Payload::HoldAck { wire_call_id, .. }
            | Payload::Answer { wire_call_id, .. }
            | Payload::Media { wire_call_id, .. }
            | Payload::Ringing { wire_call_id, .. }
            | Payload::Modify { wire_call_id, .. }
            | Payload::Candidate { wire_call_id, .. }
            | Payload::EndOfCandidates { wire_call_id } => Some(wire_call_id),
            Payload::Invite(offer) | Payload::Attach(offer) => Some(&offer.wire_call_id),
            Payload::Bye(hangup) => Some(&hangup.wire_call_id),
            _ => None,
        }
    }
}
