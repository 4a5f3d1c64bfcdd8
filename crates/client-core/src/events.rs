//! Event handling for client-core operations
//!
//! Everything the client observes is reported as a [`ClientEvent`]: socket and
//! session changes, gateway registration, incoming calls, call state changes,
//! connectivity and errors raised off the caller's path. Events reach
//! applications two ways:
//!
//! - [`ClientManager::subscribe_events`](crate::ClientManager::subscribe_events)
//!   returns a `broadcast::Receiver` carrying every event
//! - [`EventSubscription`]s registered with
//!   [`ClientManager::subscribe`](crate::ClientManager::subscribe) deliver
//!   filtered events to a [`ClientEventHandler`]
//!
//! # Event Types
//!
//! - **Session Events** - socket up/down, session id, client ready, gateway state
//! - **Call Events** - incoming calls, state changes, remote hangups
//! - **Network Events** - connectivity changes
//! - **Error Events** - asynchronous client errors
//!
//! # Usage Examples
//!
//! ```rust
//! use txrtc_client_core::events::{CallStatusInfo, ClientEventHandler, IncomingCallInfo};
//! use async_trait::async_trait;
//!
//! struct MyEventHandler;
//!
//! #[async_trait]
//! impl ClientEventHandler for MyEventHandler {
//!     async fn on_incoming_call(&self, call_info: IncomingCallInfo) {
//!         println!("Incoming call from: {:?}", call_info.caller_number);
//!     }
//!
//!     async fn on_call_state_changed(&self, status_info: CallStatusInfo) {
//!         println!("Call {} is now {}", status_info.call_id, status_info.new_state);
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use txrtc_verto_core::{GatewayState, JsonObject};

use crate::call::{CallId, CallState, TerminationReason};
use crate::connectivity::ConnectivityStatus;
use crate::error::ClientError;

/// Information about an incoming call
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCallInfo {
    /// Unique call identifier assigned by the client
    pub call_id: CallId,
    /// The id as it appears on the wire
    pub wire_call_id: String,
    pub caller_name: Option<String>,
    pub caller_number: Option<String>,
    /// Server-side session of the call, if the invite named one
    pub telnyx_session_id: Option<String>,
    pub telnyx_leg_id: Option<String>,
    /// Timestamp when the invite was received
    pub created_at: DateTime<Utc>,
}

/// Information about a call state change
///
/// # Examples
///
/// ```rust
/// use txrtc_client_core::events::CallStatusInfo;
/// use txrtc_client_core::call::CallState;
/// use chrono::Utc;
///
/// let status_info = CallStatusInfo {
///     call_id: uuid::Uuid::new_v4(),
///     new_state: CallState::Active,
///     previous_state: Some(CallState::Ringing),
///     reason: Some("remote answer".to_string()),
///     timestamp: Utc::now(),
/// };
///
/// assert!(status_info.new_state.is_active());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CallStatusInfo {
    /// Call that changed state
    pub call_id: CallId,
    /// New call state after the transition
    pub new_state: CallState,
    /// Previous call state, `None` when the call was just created
    pub previous_state: Option<CallState>,
    /// What caused the change
    pub reason: Option<String>,
    /// When the state change occurred
    pub timestamp: DateTime<Utc>,
}

/// Event filtering options for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only receive events for specific calls (None = all calls)
    pub call_ids: Option<HashSet<CallId>>,
    /// Only receive specific call state changes (None = all states)
    pub call_states: Option<HashSet<CallState>>,
    /// Minimum event priority level (None = all priorities)
    pub min_priority: Option<EventPriority>,
}

/// Event priority levels for filtering and handling
///
/// ```rust
/// use txrtc_client_core::events::EventPriority;
///
/// assert!(EventPriority::Critical > EventPriority::High);
/// assert!(EventPriority::High > EventPriority::Normal);
/// assert!(EventPriority::Normal > EventPriority::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventPriority {
    /// Routine status (session id, AI conversation traffic)
    Low,
    /// State changes
    Normal,
    /// Incoming calls, readiness, connectivity
    High,
    /// Failures that end calls or sessions
    Critical,
}

/// Client event types, each with its priority
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Signaling socket connected
    SocketConnected { priority: EventPriority },
    /// Signaling socket closed
    SocketDisconnected {
        reason: Option<String>,
        /// The client is already reconnecting
        reconnecting: bool,
        priority: EventPriority,
    },
    /// Login accepted; a new session id is in force
    SessionUpdated { session_id: String, priority: EventPriority },
    /// Gateway reached `REGED`; calls can be placed and answered
    ClientReady { priority: EventPriority },
    /// Gateway registration changed
    GatewayStateChanged { state: GatewayState, priority: EventPriority },
    /// Incoming call received from a remote party
    IncomingCall { info: IncomingCallInfo, priority: EventPriority },
    /// Call state changed
    CallStateChanged { info: CallStatusInfo, priority: EventPriority },
    /// The remote side hung up
    RemoteCallEnded {
        call_id: CallId,
        reason: TerminationReason,
        priority: EventPriority,
    },
    /// Client error occurred
    ClientError {
        error: ClientError,
        /// Call the error relates to, if any
        call_id: Option<CallId>,
        priority: EventPriority,
    },
    /// Network connectivity changed
    NetworkEvent {
        status: ConnectivityStatus,
        priority: EventPriority,
    },
    /// Inbound AI assistant conversation frame
    AiConversation { params: JsonObject, priority: EventPriority },
}

impl ClientEvent {
    pub fn socket_connected() -> Self {
        ClientEvent::SocketConnected { priority: EventPriority::Normal }
    }

    pub fn socket_disconnected(reason: Option<String>, reconnecting: bool) -> Self {
        ClientEvent::SocketDisconnected { reason, reconnecting, priority: EventPriority::High }
    }

    pub fn session_updated(session_id: impl Into<String>) -> Self {
        ClientEvent::SessionUpdated { session_id: session_id.into(), priority: EventPriority::Low }
    }

    pub fn client_ready() -> Self {
        ClientEvent::ClientReady { priority: EventPriority::High }
    }

    pub fn gateway_state_changed(state: GatewayState) -> Self {
        ClientEvent::GatewayStateChanged { state, priority: EventPriority::Normal }
    }

    pub fn incoming_call(info: IncomingCallInfo) -> Self {
        ClientEvent::IncomingCall { info, priority: EventPriority::High }
    }

    /// State change event; entering `DONE` is reported as high priority
    pub fn call_state_changed(
        call_id: CallId,
        previous_state: Option<CallState>,
        new_state: CallState,
        reason: Option<String>,
    ) -> Self {
        let priority = if new_state.is_terminated() { EventPriority::High } else { EventPriority::Normal };
        ClientEvent::CallStateChanged {
            info: CallStatusInfo { call_id, new_state, previous_state, reason, timestamp: Utc::now() },
            priority,
        }
    }

    pub fn remote_call_ended(call_id: CallId, reason: TerminationReason) -> Self {
        ClientEvent::RemoteCallEnded { call_id, reason, priority: EventPriority::High }
    }

    /// Error event; unrecoverable errors are critical
    pub fn client_error(error: ClientError, call_id: Option<CallId>) -> Self {
        let priority = if error.is_recoverable() { EventPriority::High } else { EventPriority::Critical };
        ClientEvent::ClientError { error, call_id, priority }
    }

    pub fn network(status: ConnectivityStatus) -> Self {
        ClientEvent::NetworkEvent { status, priority: EventPriority::High }
    }

    pub fn ai_conversation(params: JsonObject) -> Self {
        ClientEvent::AiConversation { params, priority: EventPriority::Low }
    }

    /// Get the priority of this event
    pub fn priority(&self) -> EventPriority {
        match self {
            ClientEvent::SocketConnected { priority }
            | ClientEvent::SocketDisconnected { priority, .. }
            | ClientEvent::SessionUpdated { priority, .. }
            | ClientEvent::ClientReady { priority }
            | ClientEvent::GatewayStateChanged { priority, .. }
            | ClientEvent::IncomingCall { priority, .. }
            | ClientEvent::CallStateChanged { priority, .. }
            | ClientEvent::RemoteCallEnded { priority, .. }
            | ClientEvent::ClientError { priority, .. }
            | ClientEvent::NetworkEvent { priority, .. }
            | ClientEvent::AiConversation { priority, .. } => *priority,
        }
    }

    /// Get the call ID associated with this event (if any)
    ///
    /// ```rust
    /// use txrtc_client_core::events::ClientEvent;
    ///
    /// assert_eq!(ClientEvent::client_ready().call_id(), None);
    /// ```
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            ClientEvent::IncomingCall { info, .. } => Some(info.call_id),
            ClientEvent::CallStateChanged { info, .. } => Some(info.call_id),
            ClientEvent::RemoteCallEnded { call_id, .. } => Some(*call_id),
            ClientEvent::ClientError { call_id, .. } => *call_id,
            _ => None,
        }
    }

    /// Check if this event passes the given filter
    pub fn passes_filter(&self, filter: &EventFilter) -> bool {
        if let Some(min_priority) = filter.min_priority {
            if self.priority() < min_priority {
                return false;
            }
        }

        if let Some(call_ids) = &filter.call_ids {
            match self.call_id() {
                Some(call_id) if call_ids.contains(&call_id) => {}
                _ => return false,
            }
        }

        if let Some(call_states) = &filter.call_states {
            if let ClientEvent::CallStateChanged { info, .. } = self {
                if !call_states.contains(&info.new_state) {
                    return false;
                }
            }
        }

        true
    }
}

/// Handler for client events
///
/// Only the two call callbacks are required; everything else defaults to a
/// no-op.
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// A call is ringing locally and can be answered
    async fn on_incoming_call(&self, call_info: IncomingCallInfo);

    /// A call changed state
    async fn on_call_state_changed(&self, status_info: CallStatusInfo);

    /// Client is registered and ready for calls
    async fn on_client_ready(&self) {}

    /// Gateway registration changed
    async fn on_gateway_state_changed(&self, _state: GatewayState) {}

    /// Socket connected or disconnected
    async fn on_socket_state_changed(&self, _connected: bool, _reason: Option<String>) {}

    /// New session id after login
    async fn on_session_updated(&self, _session_id: String) {}

    /// The remote side hung up
    async fn on_remote_call_ended(&self, _call_id: CallId, _reason: TerminationReason) {}

    /// Asynchronous client errors
    async fn on_client_error(&self, _error: ClientError, _call_id: Option<CallId>) {}

    /// Connectivity changes
    async fn on_network_event(&self, _status: ConnectivityStatus) {}

    /// AI assistant conversation frames
    async fn on_ai_conversation(&self, _params: JsonObject) {}

    /// Dispatch to the specific callbacks
    async fn on_client_event(&self, event: ClientEvent) {
        match event {
            ClientEvent::SocketConnected { .. } => self.on_socket_state_changed(true, None).await,
            ClientEvent::SocketDisconnected { reason, .. } => self.on_socket_state_changed(false, reason).await,
            ClientEvent::SessionUpdated { session_id, .. } => self.on_session_updated(session_id).await,
            ClientEvent::ClientReady { .. } => self.on_client_ready().await,
            ClientEvent::GatewayStateChanged { state, .. } => self.on_gateway_state_changed(state).await,
            ClientEvent::IncomingCall { info, .. } => self.on_incoming_call(info).await,
            ClientEvent::CallStateChanged { info, .. } => self.on_call_state_changed(info).await,
            ClientEvent::RemoteCallEnded { call_id, reason, .. } => {
                self.on_remote_call_ended(call_id, reason).await
            }
            ClientEvent::ClientError { error, call_id, .. } => self.on_client_error(error, call_id).await,
            ClientEvent::NetworkEvent { status, .. } => self.on_network_event(status).await,
            ClientEvent::AiConversation { params, .. } => self.on_ai_conversation(params).await,
        }
    }
}

/// Subscription of a handler to filtered events
#[derive(Clone)]
pub struct EventSubscription {
    handler: Arc<dyn ClientEventHandler>,
    filter: EventFilter,
    id: uuid::Uuid,
}

impl EventSubscription {
    /// Create a new event subscription with filtering
    pub fn new(handler: Arc<dyn ClientEventHandler>, filter: EventFilter) -> Self {
        Self { handler, filter, id: uuid::Uuid::new_v4() }
    }

    /// Create a subscription that receives all events
    pub fn all_events(handler: Arc<dyn ClientEventHandler>) -> Self {
        Self::new(handler, EventFilter::default())
    }

    /// Create a subscription for one call's events only
    pub fn call_events(handler: Arc<dyn ClientEventHandler>, call_id: CallId) -> Self {
        let filter = EventFilter {
            call_ids: Some(HashSet::from([call_id])),
            ..Default::default()
        };
        Self::new(handler, filter)
    }

    /// Create a subscription for high and critical priority events only
    pub fn high_priority_events(handler: Arc<dyn ClientEventHandler>) -> Self {
        let filter = EventFilter {
            min_priority: Some(EventPriority::High),
            ..Default::default()
        };
        Self::new(handler, filter)
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn should_receive(&self, event: &ClientEvent) -> bool {
        event.passes_filter(&self.filter)
    }

    /// Deliver an event if it passes this subscription's filter
    pub async fn deliver_event(&self, event: ClientEvent) {
        if self.should_receive(&event) {
            self.handler.on_client_event(event).await;
        }
    }
}

/// Fans events out to every matching subscription
#[derive(Default)]
pub struct EventEmitter {
    subscriptions: RwLock<Vec<EventSubscription>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription and return its id
    pub fn subscribe(&self, subscription: EventSubscription) -> uuid::Uuid {
        let id = subscription.id();
        self.subscriptions.write().push(subscription);
        id
    }

    /// Remove a subscription; `false` if the id is unknown
    pub fn unsubscribe(&self, subscription_id: uuid::Uuid) -> bool {
        let mut subscriptions = self.subscriptions.write();
        match subscriptions.iter().position(|s| s.id() == subscription_id) {
            Some(pos) => {
                subscriptions.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Deliver `event` to every matching subscription in parallel and wait for all of them
    pub async fn emit(&self, event: ClientEvent) {
        let subscriptions: Vec<EventSubscription> = self
            .subscriptions
            .read()
            .iter()
            .filter(|subscription| subscription.should_receive(&event))
            .cloned()
            .collect();

        let tasks: Vec<_> = subscriptions
            .into_iter()
            .map(|subscription| {
                let event = event.clone();
                tokio::spawn(async move {
                    subscription.deliver_event(event).await;
                })
            })
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Error delivering event: {}", e);
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingHandler {
        incoming: AtomicUsize,
        state_changes: AtomicUsize,
        errors: AtomicUsize,
    }

    #[async_trait]
    impl ClientEventHandler for CountingHandler {
        async fn on_incoming_call(&self, _call_info: IncomingCallInfo) {
            self.incoming.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_call_state_changed(&self, _status_info: CallStatusInfo) {
            self.state_changes.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_client_error(&self, _error: ClientError, _call_id: Option<CallId>) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_priorities() {
        let done = ClientEvent::call_state_changed(Uuid::new_v4(), Some(CallState::Active), CallState::Done(None), None);
        assert_eq!(done.priority(), EventPriority::High);

        let fatal = ClientEvent::client_error(ClientError::GatewayNotRegistered { attempts: 3 }, None);
        assert_eq!(fatal.priority(), EventPriority::Critical);

        let transient = ClientEvent::client_error(ClientError::SocketNotConnected, None);
        assert_eq!(transient.priority(), EventPriority::High);
    }

    #[test]
    fn test_call_filter_rejects_session_events() {
        let call_id = Uuid::new_v4();
        let filter = EventFilter { call_ids: Some(HashSet::from([call_id])), ..Default::default() };

        assert!(!ClientEvent::client_ready().passes_filter(&filter));
        assert!(ClientEvent::call_state_changed(call_id, None, CallState::Ringing, None).passes_filter(&filter));
        assert!(!ClientEvent::call_state_changed(Uuid::new_v4(), None, CallState::Ringing, None).passes_filter(&filter));
    }

    #[test]
    fn test_state_filter() {
        let filter = EventFilter {
            call_states: Some(HashSet::from([CallState::Active])),
            ..Default::default()
        };
        let id = Uuid::new_v4();
        assert!(ClientEvent::call_state_changed(id, None, CallState::Active, None).passes_filter(&filter));
        assert!(!ClientEvent::call_state_changed(id, None, CallState::Held, None).passes_filter(&filter));
        // Non state-change events are not affected by a state filter
        assert!(ClientEvent::client_ready().passes_filter(&filter));
    }

    #[tokio::test]
    async fn test_emitter_delivers_to_matching_subscriptions() {
        let emitter = EventEmitter::new();
        let all = Arc::new(CountingHandler::default());
        let urgent = Arc::new(CountingHandler::default());

        emitter.subscribe(EventSubscription::all_events(all.clone()));
        let urgent_id = emitter.subscribe(EventSubscription::high_priority_events(urgent.clone()));
        assert_eq!(emitter.subscription_count(), 2);

        let id = Uuid::new_v4();
        emitter.emit(ClientEvent::call_state_changed(id, Some(CallState::New), CallState::Connecting, None)).await;
        emitter.emit(ClientEvent::client_error(ClientError::SessionIdRequired, Some(id))).await;

        assert_eq!(all.state_changes.load(Ordering::SeqCst), 1);
        assert_eq!(all.errors.load(Ordering::SeqCst), 1);
        assert_eq!(urgent.state_changes.load(Ordering::SeqCst), 0);
        assert_eq!(urgent.errors.load(Ordering::SeqCst), 1);

        assert!(emitter.unsubscribe(urgent_id));
        assert!(!emitter.unsubscribe(urgent_id));
        assert_eq!(emitter.subscription_count(), 1);
    }
}
