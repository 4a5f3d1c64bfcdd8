//! Shared fixtures for client-core integration tests
//!
//! A scripted signaling server stands in for the WebSocket transport and a
//! recording media engine stands in for WebRTC, so every scenario runs
//! in-process with paused time.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use url::Url;

use txrtc_client_core::{
    CallId, ClientBuilder, ClientError, ClientEvent, ClientManager, ClientResult, ConnectivityObserver,
    ConnectivityStatus, Credentials, IceCandidate, MediaEngine, MediaEngineFactory, MediaEvent, SdpKind,
};
use txrtc_signaling_transport::{Error as TransportError, Transport, TransportEvent, TransportFactory};
use txrtc_verto_core::IceServer;

/// Upper bound for any single wait in a scenario
pub const WAIT: Duration = Duration::from_secs(5);

pub const SESSION_ID: &str = "sess-1";

/// Transport whose server side is driven by the test
#[derive(Debug)]
pub struct MockTransport {
    events: mpsc::Sender<TransportEvent>,
    sent: Mutex<Vec<Value>>,
    connected: AtomicBool,
    url: Mutex<Option<Url>>,
    disconnects: AtomicUsize,
    refuse_connect: bool,
}

impl MockTransport {
    /// Push a raw frame from the server
    pub async fn inject(&self, frame: Value) {
        let _ = self.events.send(TransportEvent::TextReceived { text: frame.to_string() }).await;
    }

    /// Report an event as the real transport would
    pub async fn report(&self, event: TransportEvent) {
        if matches!(event, TransportEvent::Disconnected { .. }) {
            self.connected.store(false, Ordering::SeqCst);
        }
        let _ = self.events.send(event).await;
    }

    /// Lose the socket without the client asking
    pub async fn drop_connection(&self) {
        self.report(TransportEvent::Disconnected {
            reason: Some("connection reset".to_string()),
            for_reconnect: false,
            fallback_region: None,
        })
        .await;
    }

    /// Make sends fail without reporting a disconnect, as a half-open socket does
    pub fn stall(&self, stalled: bool) {
        self.connected.store(!stalled, Ordering::SeqCst);
    }

    pub fn url(&self) -> Option<Url> {
        self.url.lock().clone()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Frames sent with `method`
    pub fn sent_with(&self, method: &str) -> Vec<Value> {
        self.sent().into_iter().filter(|frame| frame["method"] == method).collect()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Wait until a frame with `method` has been sent and return the latest
    pub async fn wait_for_frame(&self, method: &str) -> Value {
        self.wait_for_nth_frame(method, 1).await
    }

    /// Wait until `count` frames with `method` have been sent and return the last
    pub async fn wait_for_nth_frame(&self, method: &str, count: usize) -> Value {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let frames = self.sent_with(method);
            if frames.len() >= count {
                return frames[count - 1].clone();
            }
            assert!(tokio::time::Instant::now() < deadline, "no {} frame #{} was sent", method, count);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &Url) -> txrtc_signaling_transport::Result<()> {
        *self.url.lock() = Some(url.clone());
        if self.refuse_connect {
            return Err(TransportError::ConnectFailed("refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Connected).await;
        Ok(())
    }

    async fn disconnect(&self, _for_reconnect: bool) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn send(&self, text: String) -> txrtc_signaling_transport::Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let frame: Value = serde_json::from_str(&text).map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.sent.lock().push(frame);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Hands out [`MockTransport`]s and remembers each one
#[derive(Default)]
pub struct MockTransportFactory {
    created: Mutex<Vec<Arc<MockTransport>>>,
    refuse_connect: AtomicBool,
}

impl MockTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later `connect` fail immediately
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        self.created.lock()[index].clone()
    }

    pub fn latest(&self) -> Arc<MockTransport> {
        let created = self.created.lock();
        created[created.len() - 1].clone()
    }

    /// Wait until at least `count` transports exist and return the latest
    pub async fn wait_for_transport(&self, count: usize) -> Arc<MockTransport> {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.created() < count {
            assert!(tokio::time::Instant::now() < deadline, "transport #{} was never created", count);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.transport(count - 1)
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self) -> (Arc<dyn Transport>, mpsc::Receiver<TransportEvent>) {
        let (events, rx) = mpsc::channel(64);
        let transport = Arc::new(MockTransport {
            events,
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            url: Mutex::new(None),
            disconnects: AtomicUsize::new(0),
            refuse_connect: self.refuse_connect.load(Ordering::SeqCst),
        });
        self.created.lock().push(transport.clone());
        (transport, rx)
    }
}

/// Media engine that produces canned SDP and records what it was told
#[derive(Debug)]
pub struct MockMediaEngine {
    pub call_id: CallId,
    events: mpsc::Sender<MediaEvent>,
    local: Mutex<Option<String>>,
    remote: Mutex<Vec<(String, SdpKind)>>,
    candidates: Mutex<Vec<IceCandidate>>,
    muted: AtomicBool,
    closed: AtomicBool,
    fail_offer: bool,
}

impl MockMediaEngine {
    /// Deliver a media event to the client
    pub async fn report(&self, event: MediaEvent) {
        let _ = self.events.send(event).await;
    }

    pub fn remote_descriptions(&self) -> Vec<(String, SdpKind)> {
        self.remote.lock().clone()
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().clone()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn gathered(&self, sdp: &str) -> String {
        let local = format!("{}a=candidate:1 1 udp 2122260223 192.0.2.10 50000 typ host\r\n", sdp);
        *self.local.lock() = Some(local);
        let _ = self
            .events
            .try_send(MediaEvent::LocalCandidate(IceCandidate::new(
                "candidate:1 1 udp 2122260223 192.0.2.10 50000 typ host",
                Some("0".to_string()),
                0,
            )));
        sdp.to_string()
    }
}

#[async_trait]
impl MediaEngine for MockMediaEngine {
    async fn create_offer(&self) -> ClientResult<String> {
        if self.fail_offer {
            return Err(ClientError::media_engine_failed("no audio device"));
        }
        Ok(self.gathered("v=0\r\no=- 1 1 IN IP4 192.0.2.10\r\ns=offer\r\n"))
    }

    async fn create_answer(&self) -> ClientResult<String> {
        Ok(self.gathered("v=0\r\no=- 2 2 IN IP4 192.0.2.10\r\ns=answer\r\n"))
    }

    async fn set_remote_description(&self, sdp: &str, kind: SdpKind) -> ClientResult<()> {
        self.remote.lock().push((sdp.to_string(), kind));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> ClientResult<()> {
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn local_description(&self) -> Option<String> {
        self.local.lock().clone()
    }

    async fn set_muted(&self, muted: bool) -> ClientResult<()> {
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    async fn restart_ice(&self) -> ClientResult<String> {
        Ok("v=0\r\no=- 3 3 IN IP4 192.0.2.10\r\ns=restart\r\n".to_string())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockMediaFactory {
    engines: Mutex<Vec<Arc<MockMediaEngine>>>,
    fail_offers: AtomicBool,
}

impl MockMediaFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn engines(&self) -> Vec<Arc<MockMediaEngine>> {
        self.engines.lock().clone()
    }

    pub fn engine_for(&self, call_id: CallId) -> Arc<MockMediaEngine> {
        self.engines
            .lock()
            .iter()
            .rev()
            .find(|engine| engine.call_id == call_id)
            .cloned()
            .unwrap_or_else(|| panic!("no media engine for call {}", call_id))
    }
}

impl MediaEngineFactory for MockMediaFactory {
    fn create(
        &self,
        call_id: CallId,
        _ice_servers: &[IceServer],
    ) -> ClientResult<(Arc<dyn MediaEngine>, mpsc::Receiver<MediaEvent>)> {
        let (events, rx) = mpsc::channel(32);
        let engine = Arc::new(MockMediaEngine {
            call_id,
            events,
            local: Mutex::new(None),
            remote: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
            muted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_offer: self.fail_offers.load(Ordering::SeqCst),
        });
        self.engines.lock().push(engine.clone());
        Ok((engine, rx))
    }
}

/// Connectivity observer the test reports through
#[derive(Default)]
pub struct MockConnectivity {
    tx: Mutex<Option<mpsc::Sender<ConnectivityStatus>>>,
}

impl MockConnectivity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn report(&self, status: ConnectivityStatus) {
        let tx = self.tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(status).await;
        }
    }
}

impl ConnectivityObserver for MockConnectivity {
    fn subscribe(&self) -> mpsc::Receiver<ConnectivityStatus> {
        let (tx, rx) = mpsc::channel(8);
        *self.tx.lock() = Some(tx);
        rx
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Everything a scenario needs to drive a client
pub struct Harness {
    pub client: Arc<ClientManager>,
    pub transports: Arc<MockTransportFactory>,
    pub media: Arc<MockMediaFactory>,
    pub connectivity: Arc<MockConnectivity>,
    pub events: broadcast::Receiver<ClientEvent>,
}

/// Builder preloaded with the mocks; customise it before [`Harness::start`]
pub fn builder(transports: &Arc<MockTransportFactory>, media: &Arc<MockMediaFactory>) -> ClientBuilder {
    ClientBuilder::new()
        .credentials(Credentials::sip_user("alice", "secret"))
        .transport(transports.clone())
        .media_engine(media.clone())
}

impl Harness {
    /// Client built with default settings, not yet connected
    pub async fn new() -> Self {
        Self::with(|builder| builder).await
    }

    /// Client built after `customise` adjusts the builder
    pub async fn with(customise: impl FnOnce(ClientBuilder) -> ClientBuilder) -> Self {
        init_tracing();
        let transports = MockTransportFactory::new();
        let media = MockMediaFactory::new();
        let connectivity = MockConnectivity::new();
        let client = customise(builder(&transports, &media).connectivity(connectivity.clone()))
            .build()
            .await
            .expect("client should build");
        let events = client.subscribe_events();
        Self { client, transports, media, connectivity, events }
    }

    /// Connect and walk the login, clientReady and REGED handshake
    pub async fn ready() -> Self {
        let mut harness = Self::new().await;
        harness.connect_and_register().await;
        harness
    }

    pub async fn connect_and_register(&mut self) {
        self.client.connect().await.expect("connect should start");
        let transport = self.transports.wait_for_transport(self.transports.created().max(1)).await;
        register(&transport, &mut self.events).await;
    }

    pub fn transport(&self) -> Arc<MockTransport> {
        self.transports.latest()
    }

    /// Next event matching `predicate`, skipping everything else
    pub async fn wait_for_event<F>(&mut self, predicate: F) -> ClientEvent
    where
        F: Fn(&ClientEvent) -> bool,
    {
        wait_for_event(&mut self.events, predicate).await
    }

    /// Push an inbound invite and return the id of the ringing call
    pub async fn incoming_call(&mut self, wire_call_id: &str) -> CallId {
        self.transport().inject(invite_frame(wire_call_id)).await;
        match self.wait_for_event(|e| matches!(e, ClientEvent::IncomingCall { .. })).await {
            ClientEvent::IncomingCall { info, .. } => info.call_id,
            _ => unreachable!(),
        }
    }
}

/// Answer the login, announce readiness and report the gateway registered
pub async fn register(transport: &MockTransport, events: &mut broadcast::Receiver<ClientEvent>) {
    let login = transport.wait_for_frame("login").await;
    transport.inject(login_result(&login, SESSION_ID)).await;
    transport.inject(request("telnyx_rtc.clientReady", json!({}))).await;
    let poll = transport.wait_for_frame("telnyx_rtc.gatewayState").await;
    transport.inject(gateway_result(&poll, "REGED")).await;
    wait_for_event(events, |e| matches!(e, ClientEvent::ClientReady { .. })).await;
}

pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<ClientEvent>, predicate: F) -> ClientEvent
where
    F: Fn(&ClientEvent) -> bool,
{
    let found = tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await;
    found.expect("expected event was not emitted")
}

/// Poll `check` until it holds
pub async fn eventually<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check().await {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn request(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": uuid::Uuid::new_v4().to_string(), "method": method, "params": params })
}

pub fn login_result(login: &Value, session_id: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": login["id"], "result": { "sessid": session_id } })
}

pub fn gateway_result(poll: &Value, state: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": poll["id"], "result": { "params": { "state": state } } })
}

pub fn invite_frame(wire_call_id: &str) -> Value {
    request(
        "telnyx_rtc.invite",
        json!({
            "callID": wire_call_id,
            "sdp": "v=0\r\no=- 9 9 IN IP4 198.51.100.7\r\ns=remote\r\n",
            "caller_id_name": "Bob",
            "caller_id_number": "+15550001111",
            "telnyx_session_id": "tx-session",
            "telnyx_leg_id": "tx-leg",
        }),
    )
}

pub fn call_frame(method: &str, wire_call_id: &str, extra: Value) -> Value {
    let mut params = json!({ "callID": wire_call_id });
    if let (Some(params), Value::Object(extra)) = (params.as_object_mut(), extra) {
        params.extend(extra);
    }
    request(method, params)
}

/// `dialogParams.callID` of an outgoing call frame
pub fn dialog_call_id(frame: &Value) -> String {
    frame["params"]["dialogParams"]["callID"].as_str().unwrap_or_default().to_string()
}
