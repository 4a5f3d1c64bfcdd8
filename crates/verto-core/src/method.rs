//! Verto method names.
//!
//! The set of verbs the signaling server and this client exchange. Anything the
//! server sends that is not listed here decodes to [`Method::Unrecognized`] and is
//! ignored by the client rather than treated as an error.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A signaling verb carried in the `method` field of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `telnyx_rtc.ping`, server keepalive
    Ping,
    /// `login`, credential or token login
    Login,
    /// `anonymous_login`, login against an AI assistant target
    AnonymousLogin,
    /// `telnyx_rtc.answer`
    Answer,
    /// `telnyx_rtc.invite`
    Invite,
    /// `telnyx_rtc.ringing`
    Ringing,
    /// `telnyx_rtc.ringing_ack`
    RingingAck,
    /// `telnyx_rtc.clientReady`
    ClientReady,
    /// `telnyx_rtc.bye`
    Bye,
    /// `telnyx_rtc.modify`, hold/unhold and ICE restart
    Modify,
    /// `telnyx_rtc.media`, early media SDP
    Media,
    /// `telnyx_rtc.info`, DTMF
    Info,
    /// `telnyx_rtc.gatewayState`
    GatewayState,
    /// `telnyx_rtc.attach`, server asks us to re-attach a dialog
    Attach,
    /// `telnyx_rtc.attachCalls`, ask the server to resume dialogs after a push
    AttachCalls,
    /// `telnyx_rtc.candidate`, trickled ICE candidate
    Candidate,
    /// `telnyx_rtc.endOfCandidates`
    EndOfCandidates,
    /// `telnyx_rtc.disable_push_notification`
    DisablePush,
    /// `ai_conversation`
    AiConversation,
    /// Any other method name, kept verbatim
    Unrecognized(String),
}

impl Method {
    /// Every known method, in wire-table order.
    pub const KNOWN: [Method; 19] = [
        Method::Ping,
        Method::Login,
        Method::AnonymousLogin,
        Method::Answer,
        Method::Invite,
        Method::Ringing,
        Method::RingingAck,
        Method::ClientReady,
        Method::Bye,
        Method::Modify,
        Method::Media,
        Method::Info,
        Method::GatewayState,
        Method::Attach,
        Method::AttachCalls,
        Method::Candidate,
        Method::EndOfCandidates,
        Method::DisablePush,
        Method::AiConversation,
    ];

    /// Wire name of the method
    pub fn as_str(&self) -> &str {
        match self {
            Method::Ping => "telnyx_rtc.ping",
            Method::Login => "login",
            Method::AnonymousLogin => "anonymous_login",
            Method::Answer => "telnyx_rtc.answer",
            Method::Invite => "telnyx_rtc.invite",
            Method::Ringing => "telnyx_rtc.ringing",
            Method::RingingAck => "telnyx_rtc.ringing_ack",
            Method::ClientReady => "telnyx_rtc.clientReady",
            Method::Bye => "telnyx_rtc.bye",
            Method::Modify => "telnyx_rtc.modify",
            Method::Media => "telnyx_rtc.media",
            Method::Info => "telnyx_rtc.info",
            Method::GatewayState => "telnyx_rtc.gatewayState",
            Method::Attach => "telnyx_rtc.attach",
            Method::AttachCalls => "telnyx_rtc.attachCalls",
            Method::Candidate => "telnyx_rtc.candidate",
            Method::EndOfCandidates => "telnyx_rtc.endOfCandidates",
            Method::DisablePush => "telnyx_rtc.disable_push_notification",
            Method::AiConversation => "ai_conversation",
            Method::Unrecognized(name) => name.as_str(),
        }
    }

    /// Parse a wire name. Never fails: unknown names become [`Method::Unrecognized`].
    pub fn from_wire(name: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|m| m.as_str() == name)
            .cloned()
            .unwrap_or_else(|| Method::Unrecognized(name.to_string()))
    }

    /// Whether this is one of the known verbs
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Method::Unrecognized(_))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        Method::from_wire(name)
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Method::from_wire(&name))
    }
}
