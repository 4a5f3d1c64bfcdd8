use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{UserAgent, VertoRequest};
use crate::cause::CauseCode;
use crate::dialog::{CallInfo, CallOptions, CustomHeader, DialogParams};
use crate::error::Error;
use crate::message::JsonObject;
use crate::method::Method;

fn insert_str(params: &mut JsonObject, key: &str, value: &str) {
    params.insert(key.into(), Value::from(value));
}

/// `telnyx_rtc.invite`, the offer for an outbound call
#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub session_id: String,
    pub sdp: String,
    pub info: CallInfo,
    pub options: CallOptions,
    pub user_agent: UserAgent,
}

impl InviteRequest {
    pub fn new(session_id: impl Into<String>, sdp: impl Into<String>, info: CallInfo, options: CallOptions) -> Self {
        Self {
            session_id: session_id.into(),
            sdp: sdp.into(),
            info,
            options,
            user_agent: UserAgent::default(),
        }
    }
}

impl VertoRequest for InviteRequest {
    fn method(&self) -> Method {
        Method::Invite
    }

    fn params(&self) -> JsonObject {
        let options = &self.options;
        let mut dialog = JsonObject::new();
        insert_str(&mut dialog, "callID", &self.info.wire_call_id.to_lowercase());
        insert_str(
            &mut dialog,
            "destination_number",
            options.destination_number.as_deref().unwrap_or_default(),
        );
        insert_str(&mut dialog, "remote_caller_id_name", &options.remote_caller_name);
        insert_str(&mut dialog, "caller_id_name", self.info.caller_name.as_deref().unwrap_or_default());
        insert_str(
            &mut dialog,
            "caller_id_number",
            self.info.caller_number.as_deref().unwrap_or_default(),
        );
        dialog.insert("audio".into(), Value::from(options.audio));
        dialog.insert("video".into(), Value::from(options.video));
        dialog.insert("useStereo".into(), Value::from(options.use_stereo));
        dialog.insert("attach".into(), Value::from(options.attach));
        dialog.insert("screenShare".into(), Value::from(options.screen_share));
        dialog.insert(
            "userVariables".into(),
            Value::Object(options.user_variables.clone().unwrap_or_default()),
        );
        if let Some(state) = &options.client_state {
            insert_str(&mut dialog, "clientState", state);
        }
        DialogParams::append_custom_headers(&mut dialog, &options.custom_headers);

        let mut params = JsonObject::new();
        insert_str(&mut params, "User-Agent", &self.user_agent.to_string());
        insert_str(&mut params, "sessionId", &self.session_id);
        insert_str(&mut params, "sdp", &self.sdp);
        params.insert("dialogParams".into(), Value::Object(dialog));
        params
    }
}

fn answer_like_params(
    session_id: &str,
    sdp: &str,
    info: &CallInfo,
    options: &CallOptions,
    headers: &[CustomHeader],
    user_agent: &UserAgent,
) -> JsonObject {
    let mut dialog = DialogParams::merge(info, options);
    DialogParams::append_custom_headers(&mut dialog, headers);

    let mut params = JsonObject::new();
    insert_str(&mut params, "User-Agent", &user_agent.to_string());
    insert_str(&mut params, "sessionId", session_id);
    insert_str(&mut params, "sdp", sdp);
    params.insert("dialogParams".into(), Value::Object(dialog));
    params
}

/// `telnyx_rtc.answer` for an inbound call
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub session_id: String,
    pub sdp: String,
    pub info: CallInfo,
    pub options: CallOptions,
    /// Extra headers sent with the answer
    pub custom_headers: Vec<CustomHeader>,
    pub user_agent: UserAgent,
}

impl AnswerRequest {
    pub fn new(session_id: impl Into<String>, sdp: impl Into<String>, info: CallInfo, options: CallOptions) -> Self {
        Self {
            session_id: session_id.into(),
            sdp: sdp.into(),
            info,
            options,
            custom_headers: Vec::new(),
            user_agent: UserAgent::default(),
        }
    }

    pub fn with_custom_headers(mut self, headers: Vec<CustomHeader>) -> Self {
        self.custom_headers = headers;
        self
    }
}

impl VertoRequest for AnswerRequest {
    fn method(&self) -> Method {
        Method::Answer
    }

    fn params(&self) -> JsonObject {
        answer_like_params(
            &self.session_id,
            &self.sdp,
            &self.info,
            &self.options,
            &self.custom_headers,
            &self.user_agent,
        )
    }
}

/// `telnyx_rtc.attach`, the answer sent when the server re-attaches a dialog.
///
/// Laid out like an answer, with the `attach` option forced on.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub session_id: String,
    pub sdp: String,
    pub info: CallInfo,
    pub options: CallOptions,
    pub custom_headers: Vec<CustomHeader>,
    pub user_agent: UserAgent,
}

impl AttachRequest {
    pub fn new(session_id: impl Into<String>, sdp: impl Into<String>, info: CallInfo, options: &CallOptions) -> Self {
        let options = CallOptions {
            destination_number: options.destination_number.clone(),
            user_variables: options.user_variables.clone(),
            attach: true,
            ..Default::default()
        };
        Self {
            session_id: session_id.into(),
            sdp: sdp.into(),
            info,
            options,
            custom_headers: Vec::new(),
            user_agent: UserAgent::default(),
        }
    }
}

impl VertoRequest for AttachRequest {
    fn method(&self) -> Method {
        Method::Attach
    }

    fn params(&self) -> JsonObject {
        answer_like_params(
            &self.session_id,
            &self.sdp,
            &self.info,
            &self.options,
            &self.custom_headers,
            &self.user_agent,
        )
    }
}

/// `telnyx_rtc.bye`
#[derive(Debug, Clone)]
pub struct ByeRequest {
    pub session_id: String,
    pub wire_call_id: String,
    pub cause: CauseCode,
    /// Raw SIP response code passed through to the server
    pub sip_code: Option<u16>,
    pub sip_reason: Option<String>,
}

impl ByeRequest {
    pub fn new(session_id: impl Into<String>, wire_call_id: impl Into<String>, cause: CauseCode) -> Self {
        Self {
            session_id: session_id.into(),
            wire_call_id: wire_call_id.into(),
            cause,
            sip_code: None,
            sip_reason: None,
        }
    }

    pub fn with_sip(mut self, code: u16, reason: impl Into<String>) -> Self {
        self.sip_code = Some(code);
        self.sip_reason = Some(reason.into());
        self
    }
}

impl VertoRequest for ByeRequest {
    fn method(&self) -> Method {
        Method::Bye
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        insert_str(&mut params, "sessId", &self.session_id);
        params.insert("causeCode".into(), Value::from(self.cause.code()));
        insert_str(&mut params, "cause", self.cause.cause());
        if let Some(code) = self.sip_code {
            params.insert("sipCode".into(), Value::from(code));
        }
        if let Some(reason) = &self.sip_reason {
            insert_str(&mut params, "sipReason", reason);
        }
        params.insert(
            "dialogParams".into(),
            Value::Object(DialogParams::call_id_only(&self.wire_call_id)),
        );
        params
    }
}

/// Hold actions carried by `telnyx_rtc.modify`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifyAction {
    #[serde(rename = "hold")]
    Hold,
    #[serde(rename = "unhold")]
    Unhold,
    #[serde(rename = "toggleHold")]
    ToggleHold,
}

impl ModifyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifyAction::Hold => "hold",
            ModifyAction::Unhold => "unhold",
            ModifyAction::ToggleHold => "toggleHold",
        }
    }
}

impl FromStr for ModifyAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hold" => Ok(ModifyAction::Hold),
            "unhold" => Ok(ModifyAction::Unhold),
            "toggleHold" => Ok(ModifyAction::ToggleHold),
            other => Err(Error::UnknownModifyAction(other.to_string())),
        }
    }
}

impl fmt::Display for ModifyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `telnyx_rtc.modify` with a hold action
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub session_id: String,
    pub wire_call_id: String,
    pub action: ModifyAction,
}

impl ModifyRequest {
    pub fn new(session_id: impl Into<String>, wire_call_id: impl Into<String>, action: ModifyAction) -> Self {
        Self {
            session_id: session_id.into(),
            wire_call_id: wire_call_id.into(),
            action,
        }
    }
}

impl VertoRequest for ModifyRequest {
    fn method(&self) -> Method {
        Method::Modify
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        insert_str(&mut params, "sessionId", &self.session_id);
        insert_str(&mut params, "action", self.action.as_str());
        params.insert(
            "dialogParams".into(),
            Value::Object(DialogParams::call_id_only(&self.wire_call_id)),
        );
        params
    }
}

/// ICE restart, sent as a `telnyx_rtc.modify` with `action: "updateMedia"`
#[derive(Debug, Clone)]
pub struct IceRestartRequest {
    pub session_id: String,
    pub wire_call_id: String,
    pub sdp: String,
}

impl IceRestartRequest {
    pub const ACTION: &'static str = "updateMedia";

    pub fn new(session_id: impl Into<String>, wire_call_id: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            wire_call_id: wire_call_id.into(),
            sdp: sdp.into(),
        }
    }
}

impl VertoRequest for IceRestartRequest {
    fn method(&self) -> Method {
        Method::Modify
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        insert_str(&mut params, "sessionId", &self.session_id);
        insert_str(&mut params, "action", Self::ACTION);
        insert_str(&mut params, "sdp", &self.sdp);
        params.insert(
            "dialogParams".into(),
            Value::Object(DialogParams::call_id_only(&self.wire_call_id)),
        );
        params
    }
}

/// `telnyx_rtc.info` carrying DTMF digits
#[derive(Debug, Clone)]
pub struct InfoRequest {
    pub session_id: String,
    pub dtmf: String,
    pub info: CallInfo,
    pub options: CallOptions,
}

impl InfoRequest {
    pub fn dtmf(session_id: impl Into<String>, dtmf: impl Into<String>, info: CallInfo, options: CallOptions) -> Self {
        Self {
            session_id: session_id.into(),
            dtmf: dtmf.into(),
            info,
            options,
        }
    }
}

impl VertoRequest for InfoRequest {
    fn method(&self) -> Method {
        Method::Info
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        insert_str(&mut params, "sessionId", &self.session_id);
        insert_str(&mut params, "dtmf", &self.dtmf);
        params.insert(
            "dialogParams".into(),
            Value::Object(DialogParams::merge(&self.info, &self.options)),
        );
        params
    }
}

/// `telnyx_rtc.candidate`, one trickled local candidate
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    pub wire_call_id: String,
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: u32,
}

impl VertoRequest for CandidateRequest {
    fn method(&self) -> Method {
        Method::Candidate
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        insert_str(&mut params, "candidate", &self.candidate);
        params.insert(
            "sdpMid".into(),
            self.sdp_mid.clone().map(Value::from).unwrap_or(Value::Null),
        );
        params.insert("sdpMLineIndex".into(), Value::from(self.sdp_m_line_index));
        params.insert(
            "dialogParams".into(),
            Value::Object(DialogParams::call_id_only(&self.wire_call_id)),
        );
        params
    }
}

/// `telnyx_rtc.endOfCandidates`
#[derive(Debug, Clone)]
pub struct EndOfCandidatesRequest {
    pub wire_call_id: String,
}

impl VertoRequest for EndOfCandidatesRequest {
    fn method(&self) -> Method {
        Method::EndOfCandidates
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        params.insert(
            "dialogParams".into(),
            Value::Object(DialogParams::call_id_only(&self.wire_call_id)),
        );
        params
    }
}

/// `telnyx_rtc.ringing_ack`
#[derive(Debug, Clone)]
pub struct RingingAckRequest {
    pub wire_call_id: String,
    pub session_id: String,
}

impl VertoRequest for RingingAckRequest {
    fn method(&self) -> Method {
        Method::RingingAck
    }

    fn params(&self) -> JsonObject {
        let mut params = JsonObject::new();
        insert_str(&mut params, "callID", &self.wire_call_id);
        insert_str(&mut params, "sessid", &self.session_id);
        params
    }
}
