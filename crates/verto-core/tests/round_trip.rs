//! Every outbound request survives encode then decode with its method and params intact.

use serde_json::json;
use txrtc_verto_core::requests::*;
use txrtc_verto_core::{CallInfo, CallOptions, CauseCode, Message, Method};
use uuid::Uuid;

fn assert_round_trip(request: &dyn VertoRequest) {
    let message = request.to_message();
    let decoded = Message::decode(&message.encode()).expect("frame should decode");
    assert_eq!(decoded.id, message.id);
    assert_eq!(decoded.jsonrpc, "2.0");
    assert_eq!(decoded.method, Some(request.method()));
    assert_eq!(decoded.params, request.params());
    assert!(decoded.result.is_none());
}

fn call_info() -> CallInfo {
    CallInfo::new(Uuid::new_v4()).with_caller("Alice", "1000")
}

#[test]
fn test_call_requests_round_trip() {
    let info = call_info();
    let options = CallOptions::new("+15550100")
        .with_custom_header("X-Tag", "1")
        .with_user_variable("campaign", "spring");
    let wire = info.wire_call_id.clone();

    let requests: Vec<Box<dyn VertoRequest>> = vec![
        Box::new(InviteRequest::new("sess", "v=0", info.clone(), options.clone())),
        Box::new(AnswerRequest::new("sess", "v=0", info.clone(), options.clone())),
        Box::new(AttachRequest::new("sess", "v=0", info.clone(), &options)),
        Box::new(ByeRequest::new("sess", wire.clone(), CauseCode::UserBusy).with_sip(486, "Busy Here")),
        Box::new(ModifyRequest::new("sess", wire.clone(), ModifyAction::ToggleHold)),
        Box::new(IceRestartRequest::new("sess", wire.clone(), "v=0")),
        Box::new(InfoRequest::dtmf("sess", "#", info.clone(), options.clone())),
        Box::new(CandidateRequest {
            wire_call_id: wire.clone(),
            candidate: "candidate:1 1 udp 1 10.0.0.1 4000 typ host".into(),
            sdp_mid: None,
            sdp_m_line_index: 1,
        }),
        Box::new(EndOfCandidatesRequest { wire_call_id: wire.clone() }),
        Box::new(RingingAckRequest { wire_call_id: wire, session_id: "sess".into() }),
    ];
    for request in &requests {
        assert_round_trip(request.as_ref());
    }
}

#[test]
fn test_session_requests_round_trip() {
    let requests: Vec<Box<dyn VertoRequest>> = vec![
        Box::new(LoginRequest::new(
            LoginCredentials::SipUser { user: "alice".into(), password: "pw".into() },
            "sess",
        )),
        Box::new(LoginRequest::new(LoginCredentials::Token("jwt".into()), "sess").from_push(true, false)),
        Box::new(AnonymousLoginRequest::new("assistant", "sess")),
        Box::new(GatewayStateRequest),
        Box::new(AttachCallsRequest::default()),
        Box::new(DisablePushRequest {
            credentials: LoginCredentials::Token("jwt".into()),
            push: PushRegistration::default(),
        }),
        Box::new(AiConversationRequest::text("hello")),
    ];
    for request in &requests {
        assert_round_trip(request.as_ref());
    }
}

#[test]
fn test_every_known_method_decodes_to_itself() {
    for method in Method::KNOWN.iter() {
        let text = json!({"jsonrpc": "2.0", "id": "1", "method": method.as_str(), "params": {}}).to_string();
        let decoded = Message::decode(&text).unwrap();
        assert_eq!(decoded.method.as_ref(), Some(method));
    }
}
