//! Client manager: the signaling session and the event loop behind it
//!
//! [`ClientManager`] owns one signaling session at a time. Everything that
//! mutates the session (transport events, media engine events, connectivity
//! changes and timer expiries) is delivered over a single channel to one
//! event-loop task and handled in arrival order. Public API calls take the
//! same state lock, so no two mutations ever interleave.
//!
//! Events are never published while the lock is held: handlers queue them on
//! the session and the queue is drained and delivered once the lock is
//! released.
//!
//! ```text
//!  Transport ──┐
//!  MediaEngine ┼──► loop channel ──► event loop ──┬──► broadcast subscribers
//!  Connectivity┤                        ▲         └──► EventEmitter handlers
//!  Timers ─────┘                        │
//!                         public API ───┘ (same lock)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, MutexGuard, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use txrtc_signaling_transport::{Timer, TransportEvent, TransportFactory, WebSocketTransportFactory};
use txrtc_verto_core::requests::{
    AiConversationRequest, AnonymousLoginRequest, DisablePushRequest, LoginRequest, VertoRequest,
};
use txrtc_verto_core::{signaling_url, CallInfo, GatewayState, Message, Region};

use crate::call::{Call, CallId};
use crate::connectivity::{ConnectivityObserver, ConnectivityStatus};
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventEmitter, EventSubscription};
use crate::media::{MediaEngineFactory, MediaEvent};
use crate::push::{PushAction, PushMetadata};

use super::config::{ClientConfig, Credentials};
use super::session::{ActiveTransport, PushContext, SessionState};

/// Capacity of the broadcast channel behind [`ClientManager::subscribe_events`]
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Work delivered to the event loop
#[derive(Debug)]
pub(crate) enum LoopMessage {
    Transport { epoch: u64, event: TransportEvent },
    Media { call_id: CallId, event: MediaEvent },
    Connectivity(ConnectivityStatus),
    GatewayRetry { cycle: u64 },
    ReconnectTimeout { episode: u64 },
    ReconnectAttempt { episode: u64 },
}

/// State shared between the manager and its event loop
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    transport_factory: Arc<dyn TransportFactory>,
    pub(super) media_factory: Arc<dyn MediaEngineFactory>,
    pub(crate) state: Mutex<SessionState>,
    events_tx: broadcast::Sender<ClientEvent>,
    emitter: EventEmitter,
    loop_tx: mpsc::UnboundedSender<LoopMessage>,
    shutdown: Notify,
    pub(super) gateway_timer: Timer,
    pub(super) reconnect_timer: Timer,
    pub(super) reconnect_attempt_timer: Timer,
}

impl ClientInner {
    /// Deliver queued events after releasing the lock, then hand back `result`
    pub(super) async fn release<T>(&self, mut state: MutexGuard<'_, SessionState>, result: T) -> T {
        let events = state.take_events();
        drop(state);
        self.publish(events).await;
        result
    }

    async fn publish(&self, events: Vec<ClientEvent>) {
        for event in events {
            // No receivers is fine
            let _ = self.events_tx.send(event.clone());
            self.emitter.emit(event).await;
        }
    }

    /// Arm `timer` to post `message` to the loop
    pub(super) fn arm(&self, timer: &Timer, delay: Duration, message: LoopMessage) {
        let loop_tx = self.loop_tx.clone();
        timer.arm(delay, async move {
            let _ = loop_tx.send(message);
        });
    }

    /// Forward one call's media events to the loop
    pub(super) fn forward_media(&self, call_id: CallId, mut events: mpsc::Receiver<MediaEvent>) -> JoinHandle<()> {
        let loop_tx = self.loop_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if loop_tx.send(LoopMessage::Media { call_id, event }).is_err() {
                    break;
                }
            }
        })
    }

    pub(super) async fn send_message(&self, state: &SessionState, message: Message) -> ClientResult<()> {
        let transport = match state.transport() {
            Some(transport) if state.socket_connected => transport,
            _ => return Err(ClientError::SocketNotConnected),
        };
        debug!(
            method = %message.method.as_ref().map(|m| m.as_str()).unwrap_or("result"),
            id = %message.id,
            "Sending frame"
        );
        transport.send(message.encode()).await?;
        Ok(())
    }

    /// Send, reporting a failure as an event instead of returning it
    pub(super) async fn send_or_report(&self, state: &mut SessionState, message: Message, call_id: Option<CallId>) {
        if let Err(e) = self.send_message(state, message).await {
            warn!(error = %e, "Failed to send frame");
            state.emit(ClientEvent::client_error(e, call_id));
        }
    }

    fn connect_url(&self, state: &SessionState) -> ClientResult<Url> {
        let host = &self.config.server.signaling_host;
        match &state.push {
            Some(push) => push.metadata.signaling_url(host, state.region),
            None => Ok(signaling_url(host, state.region, None)?),
        }
    }

    /// Replace the transport with a fresh one and start connecting it
    pub(super) async fn open_transport(&self, state: &mut SessionState) -> ClientResult<()> {
        let url = self.connect_url(state)?;
        let (transport, mut events) = self.transport_factory.create();

        state.transport_epoch += 1;
        let epoch = state.transport_epoch;
        let loop_tx = self.loop_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if loop_tx.send(LoopMessage::Transport { epoch, event }).is_err() {
                    break;
                }
            }
        });
        state.transport = Some(ActiveTransport { transport: transport.clone(), epoch, forwarder });
        state.socket_connected = false;

        info!(url = %url, epoch = epoch, "Connecting signaling socket");
        if let Err(e) = transport.connect(&url).await {
            state.take_transport();
            return Err(e.into());
        }
        Ok(())
    }

    /// Forget the session bound to the last transport
    pub(super) fn reset_session(&self, state: &mut SessionState) {
        state.session_id = None;
        state.registration.reset();
        self.gateway_timer.cancel();
    }

    async fn send_login(&self, state: &mut SessionState) -> ClientResult<()> {
        let session_id = Uuid::new_v4().to_string();
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or_else(|| ClientError::invalid_configuration("credentials", "no credentials configured"))?;

        let message = match credentials {
            Credentials::Anonymous { target_id, target_type, target_version_id } => {
                let mut request = AnonymousLoginRequest::new(target_id.clone(), session_id);
                request.target_type = target_type.clone();
                request.target_version_id = target_version_id.clone();
                request.reconnection = state.reconnect.in_progress;
                request.user_agent = self.config.user_agent.clone();
                request.to_message()
            }
            other => {
                let login = other
                    .login_credentials()
                    .ok_or_else(|| ClientError::invalid_configuration("credentials", "not usable for login"))?;
                let (from_push, decline_push) = match state.push.as_mut() {
                    Some(push) => {
                        push.declined = push.pending_action == PushAction::RejectCall;
                        (true, push.declined)
                    }
                    None => (false, false),
                };
                LoginRequest::new(login, session_id)
                    .with_push(self.config.push.registration())
                    .with_user_agent(self.config.user_agent.clone())
                    .from_push(from_push, decline_push)
                    .to_message()
            }
        };
        debug!(reconnecting = state.reconnect.in_progress, "Logging in");
        self.send_message(state, message).await
    }

    async fn on_transport_event(&self, state: &mut SessionState, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Signaling socket connected");
                state.socket_connected = true;
                state.emit(ClientEvent::socket_connected());
                if let Err(e) = self.send_login(state).await {
                    warn!(error = %e, "Login could not be sent");
                    state.emit(ClientEvent::client_error(e, None));
                }
            }
            TransportEvent::Disconnected { reason, for_reconnect, fallback_region } => {
                self.on_socket_lost(state, reason, for_reconnect, fallback_region).await;
            }
            TransportEvent::TextReceived { text } => self.on_frame(state, &text).await,
            TransportEvent::Error { error } => {
                warn!(error = %error, "Transport error");
                state.emit(ClientEvent::client_error(ClientError::transport_failed(error), None));
            }
        }
    }

    async fn handle(&self, message: LoopMessage) {
        let mut state = self.state.lock().await;
        match message {
            LoopMessage::Transport { epoch, event } => {
                if state.is_current_transport(epoch) {
                    self.on_transport_event(&mut state, event).await;
                } else {
                    debug!(epoch = epoch, "Ignoring event from a replaced transport");
                }
            }
            LoopMessage::Media { call_id, event } => self.on_media_event(&mut state, call_id, event).await,
            LoopMessage::Connectivity(status) => self.on_connectivity(&mut state, status).await,
            LoopMessage::GatewayRetry { cycle } => self.on_gateway_retry(&mut state, cycle).await,
            LoopMessage::ReconnectTimeout { episode } => self.on_reconnect_timeout(&mut state, episode).await,
            LoopMessage::ReconnectAttempt { episode } => self.on_reconnect_attempt(&mut state, episode).await,
        }
        self.release(state, ()).await;
    }

    async fn run(self: Arc<Self>, mut loop_rx: mpsc::UnboundedReceiver<LoopMessage>) {
        debug!("Client event loop started");
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                message = loop_rx.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => break,
                },
            }
        }
        debug!("Client event loop stopped");
    }

    /// Hang up everything and close the transport
    async fn end_session(&self, state: &mut SessionState) {
        state.user_disconnected = true;
        for call_id in state.call_ids() {
            self.terminate_call(state, call_id, None, "client disconnected").await;
        }
        self.cancel_reconnect(state);

        if let Some(transport) = state.take_transport() {
            transport.disconnect(false).await;
            state.emit(ClientEvent::socket_disconnected(Some("disconnected by client".to_string()), false));
        }
        self.reset_session(state);
        state.push = None;
        state.voice_sdk_id = None;
        info!("Client disconnected");
    }

    async fn begin_push_session(&self, state: &mut SessionState, push: PushMetadata) -> ClientResult<Option<CallId>> {
        state.user_disconnected = false;

        let placeholder = match push.call_id.as_deref() {
            Some(wire_call_id) => match state.find_by_wire_id(wire_call_id) {
                Some(call_id) => Some(call_id),
                None => {
                    let mut info = CallInfo::from_wire_id(wire_call_id);
                    info.caller_name = push.caller_name.clone();
                    info.caller_number = push.caller_number.clone();
                    let call = Call::placeholder(info);
                    let call_id = call.id();
                    state.insert_call(call)?;
                    Some(call_id)
                }
            },
            None => None,
        };

        info!(
            voice_sdk_id = %push.voice_sdk_id,
            call_id = ?push.call_id,
            action = ?push.action,
            "Processing push notification"
        );
        state.voice_sdk_id = Some(push.voice_sdk_id.clone());
        state.push = Some(PushContext::new(push));

        if let Some(stale) = state.take_transport() {
            stale.disconnect(false).await;
            self.reset_session(state);
        }
        self.cancel_reconnect(state);
        self.open_transport(state).await?;
        Ok(placeholder)
    }
}

/// High-level client for the Telnyx signaling service
///
/// Create one with [`ClientBuilder`](super::ClientBuilder) or
/// [`ClientManager::new`], then [`connect`](Self::connect). Readiness, calls
/// and errors are reported as [`ClientEvent`]s.
pub struct ClientManager {
    pub(super) inner: Arc<ClientInner>,
    connectivity: Option<Arc<dyn ConnectivityObserver>>,
    loop_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<LoopMessage>>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ClientManager {
    /// Client using the WebSocket transport
    pub fn new(config: ClientConfig, media_factory: Arc<dyn MediaEngineFactory>) -> Arc<Self> {
        let transport_factory = Arc::new(WebSocketTransportFactory::new(config.transport_config()));
        Self::with_parts(config, transport_factory, media_factory, None)
    }

    pub(crate) fn with_parts(
        config: ClientConfig,
        transport_factory: Arc<dyn TransportFactory>,
        media_factory: Arc<dyn MediaEngineFactory>,
        connectivity: Option<Arc<dyn ConnectivityObserver>>,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (loop_tx, loop_rx) = mpsc::unbounded_channel();
        let state = SessionState::new(config.server.region, config.gateway_max_attempts);

        let inner = Arc::new(ClientInner {
            config,
            transport_factory,
            media_factory,
            state: Mutex::new(state),
            events_tx,
            emitter: EventEmitter::new(),
            loop_tx,
            shutdown: Notify::new(),
            gateway_timer: Timer::new(),
            reconnect_timer: Timer::new(),
            reconnect_attempt_timer: Timer::new(),
        });

        Arc::new(Self {
            inner,
            connectivity,
            loop_rx: parking_lot::Mutex::new(Some(loop_rx)),
            tasks: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Spawn the event loop and the connectivity forwarder, once
    fn ensure_started(&self) {
        let Some(loop_rx) = self.loop_rx.lock().take() else {
            return;
        };
        let mut tasks = self.tasks.lock();

        if let Some(observer) = &self.connectivity {
            let mut statuses = observer.subscribe();
            let loop_tx = self.inner.loop_tx.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(status) = statuses.recv().await {
                    if loop_tx.send(LoopMessage::Connectivity(status)).is_err() {
                        break;
                    }
                }
            }));
        }

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(inner.run(loop_rx)));
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open the signaling socket and log in.
    ///
    /// Returns once the connection attempt is under way; [`ClientEvent::ClientReady`]
    /// follows when the gateway registers.
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before any I/O.
    pub async fn connect(&self) -> ClientResult<()> {
        self.inner.config.validate()?;
        self.ensure_started();

        let mut state = self.inner.state.lock().await;
        state.user_disconnected = false;
        let result = if state.transport.is_some() {
            debug!("Already connected or connecting");
            Ok(())
        } else {
            self.inner.open_transport(&mut state).await
        };
        self.inner.release(state, result).await
    }

    /// Hang up every call, clear the registry and close the socket.
    ///
    /// Calling it again has no further effect.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let mut state = self.inner.state.lock().await;
        self.inner.end_session(&mut state).await;
        self.inner.release(state, Ok(())).await
    }

    /// Connect for a push notification.
    ///
    /// Any existing socket is replaced by one decorated with the push
    /// identifier. When the push names a call, a placeholder is registered for
    /// it right away and its id returned; `answer` or `hangup` on that id before
    /// the invite arrives is applied once it does.
    pub async fn process_push(&self, push: PushMetadata) -> ClientResult<Option<CallId>> {
        push.validate()?;
        self.inner.config.validate()?;
        self.ensure_started();

        let mut state = self.inner.state.lock().await;
        let result = self.inner.begin_push_session(&mut state, push).await;
        self.inner.release(state, result).await
    }

    /// Send a text message to the AI assistant of an anonymous session
    pub async fn send_ai_message(&self, text: impl Into<String>) -> ClientResult<()> {
        let state = self.inner.state.lock().await;
        state.require_session()?;
        let message = AiConversationRequest::text(text).to_message();
        let result = self.inner.send_message(&state, message).await;
        self.inner.release(state, result).await
    }

    /// Ask the server to stop push notifications for this device
    pub async fn disable_push_notifications(&self) -> ClientResult<()> {
        let credentials = self
            .inner
            .config
            .credentials
            .as_ref()
            .and_then(Credentials::login_credentials)
            .ok_or_else(|| ClientError::invalid_configuration("credentials", "push requires user or token credentials"))?;
        let state = self.inner.state.lock().await;
        state.require_session()?;
        let request = DisablePushRequest { credentials, push: self.inner.config.push.registration() };
        let result = self.inner.send_message(&state, request.to_message()).await;
        self.inner.release(state, result).await
    }

    /// Receive every event
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Register a handler subscription; returns its id
    pub fn subscribe(&self, subscription: EventSubscription) -> Uuid {
        self.inner.emitter.subscribe(subscription)
    }

    pub fn unsubscribe(&self, subscription_id: Uuid) -> bool {
        self.inner.emitter.unsubscribe(subscription_id)
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.socket_connected
    }

    pub async fn session_id(&self) -> Option<String> {
        self.inner.state.lock().await.session_id.clone()
    }

    /// Gateway reached `REGED` in the current session
    pub async fn is_ready(&self) -> bool {
        self.inner.state.lock().await.registration.is_ready()
    }

    pub async fn gateway_state(&self) -> Option<GatewayState> {
        self.inner.state.lock().await.registration.state()
    }

    /// Region in force, `auto` after a fallback
    pub async fn region(&self) -> Region {
        self.inner.state.lock().await.region
    }

    /// Push identifier of the current session, if any
    pub async fn voice_sdk_id(&self) -> Option<String> {
        self.inner.state.lock().await.voice_sdk_id.clone()
    }

    pub async fn is_reconnecting(&self) -> bool {
        self.inner.state.lock().await.reconnect.in_progress
    }

    /// Disconnect and stop the event loop
    pub async fn shutdown(&self) -> ClientResult<()> {
        self.disconnect().await?;
        self.inner.shutdown.notify_one();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ClientManager {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
