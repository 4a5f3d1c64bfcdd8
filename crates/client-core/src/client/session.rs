//! Mutable session state guarded by the client's lock

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use txrtc_signaling_transport::Transport;
use txrtc_verto_core::Region;

use crate::call::{Call, CallId, CallState};
use crate::connectivity::ConnectivityStatus;
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::push::{PushAction, PushMetadata};
use crate::registration::GatewayRegistration;

use super::reconnect::ReconnectState;

/// The transport currently owned by the session
pub(crate) struct ActiveTransport {
    pub(crate) transport: Arc<dyn Transport>,
    /// Tag of the events forwarded from this transport
    pub(crate) epoch: u64,
    pub(crate) forwarder: JoinHandle<()>,
}

/// Bookkeeping for a push-originated session
#[derive(Debug, Clone)]
pub(crate) struct PushContext {
    pub(crate) metadata: PushMetadata,
    /// `telnyx_rtc.attachCalls` still to be sent after `REGED`
    pub(crate) attach_pending: bool,
    /// Answer or reject to apply once the pushed call's invite arrives
    pub(crate) pending_action: PushAction,
    /// Login carried `decline_push`
    pub(crate) declined: bool,
}

impl PushContext {
    pub(crate) fn new(metadata: PushMetadata) -> Self {
        let pending_action = metadata.action;
        Self { metadata, attach_pending: true, pending_action, declined: false }
    }

    /// Whether `wire_call_id` is the call announced by this push
    pub(crate) fn is_pushed_call(&self, wire_call_id: &str) -> bool {
        self.metadata
            .call_id
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(wire_call_id))
    }
}

pub(crate) struct SessionState {
    pub(crate) session_id: Option<String>,
    calls: HashMap<CallId, Call>,
    /// Lower-cased wire id to registry key
    wire_index: HashMap<String, CallId>,
    pub(crate) transport: Option<ActiveTransport>,
    pub(crate) transport_epoch: u64,
    pub(crate) socket_connected: bool,
    /// Region in force; falls back to `auto` after a pinned region fails
    pub(crate) region: Region,
    pub(crate) voice_sdk_id: Option<String>,
    pub(crate) registration: GatewayRegistration,
    pub(crate) reconnect: ReconnectState,
    pub(crate) push: Option<PushContext>,
    pub(crate) connectivity: Option<ConnectivityStatus>,
    /// Clear between `connect()` (or a push) and `disconnect()`; while set
    /// the client never opens a socket on its own
    pub(crate) user_disconnected: bool,
    events: Vec<ClientEvent>,
}

impl SessionState {
    pub(crate) fn new(region: Region, gateway_max_attempts: u32) -> Self {
        Self {
            session_id: None,
            calls: HashMap::new(),
            wire_index: HashMap::new(),
            transport: None,
            transport_epoch: 0,
            socket_connected: false,
            region,
            voice_sdk_id: None,
            registration: GatewayRegistration::new(gateway_max_attempts),
            reconnect: ReconnectState::default(),
            push: None,
            connectivity: None,
            user_disconnected: true,
            events: Vec::new(),
        }
    }

    /// Queue an event for delivery once the lock is released
    pub(crate) fn emit(&mut self, event: ClientEvent) {
        self.events.push(event);
    }

    pub(crate) fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.as_ref().map(|active| active.transport.clone())
    }

    pub(crate) fn is_current_transport(&self, epoch: u64) -> bool {
        self.transport.as_ref().is_some_and(|active| active.epoch == epoch)
    }

    /// Detach the current transport; its later events are ignored
    pub(crate) fn take_transport(&mut self) -> Option<Arc<dyn Transport>> {
        self.socket_connected = false;
        self.transport.take().map(|active| {
            active.forwarder.abort();
            active.transport
        })
    }

    /// Session id or [`ClientError::SessionIdRequired`]
    pub(crate) fn require_session(&self) -> ClientResult<String> {
        self.session_id.clone().ok_or(ClientError::SessionIdRequired)
    }

    pub(crate) fn insert_call(&mut self, call: Call) -> ClientResult<()> {
        let id = call.id();
        if self.calls.contains_key(&id) {
            return Err(ClientError::internal_error(format!("call {} already registered", id)));
        }
        self.wire_index.insert(call.wire_call_id().to_lowercase(), id);
        self.calls.insert(id, call);
        Ok(())
    }

    pub(crate) fn remove_call(&mut self, call_id: &CallId) -> Option<Call> {
        let call = self.calls.remove(call_id)?;
        self.wire_index.remove(&call.wire_call_id().to_lowercase());
        debug!(call_id = %call_id, "Call removed from registry");
        Some(call)
    }

    pub(crate) fn call(&self, call_id: &CallId) -> Option<&Call> {
        self.calls.get(call_id)
    }

    pub(crate) fn call_mut(&mut self, call_id: &CallId) -> Option<&mut Call> {
        self.calls.get_mut(call_id)
    }

    /// Existing call or [`ClientError::CallNotFound`]
    pub(crate) fn require_call(&mut self, call_id: &CallId) -> ClientResult<&mut Call> {
        self.calls.get_mut(call_id).ok_or(ClientError::CallNotFound { call_id: *call_id })
    }

    pub(crate) fn find_by_wire_id(&self, wire_call_id: &str) -> Option<CallId> {
        self.wire_index.get(&wire_call_id.to_lowercase()).copied()
    }

    pub(crate) fn calls(&self) -> impl Iterator<Item = &Call> {
        self.calls.values()
    }

    pub(crate) fn call_ids(&self) -> Vec<CallId> {
        self.calls.keys().copied().collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Move a call to `next` and queue the matching event.
    ///
    /// Returns `Ok(false)` when the call already was in `next`.
    pub(crate) fn set_call_state(
        &mut self,
        call_id: &CallId,
        next: CallState,
        reason: Option<&str>,
    ) -> ClientResult<bool> {
        let call = self.require_call(call_id)?;
        let Some(previous) = call.transition(next.clone())? else {
            return Ok(false);
        };
        debug!(call_id = %call_id, from = %previous, to = %next, "Call state changed");
        self.emit(ClientEvent::call_state_changed(
            *call_id,
            Some(previous),
            next,
            reason.map(str::to_string),
        ));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txrtc_verto_core::{CallInfo, CallOptions};
    use uuid::Uuid;

    fn outbound(wire: &str) -> Call {
        let mut info = CallInfo::new(Uuid::new_v4());
        info.wire_call_id = wire.to_string();
        Call::outbound(info, CallOptions::new("1000"))
    }

    #[test]
    fn test_registry_rejects_duplicates_and_indexes_wire_ids() {
        let mut state = SessionState::new(Region::Auto, 3);
        let call = outbound("ABCDEF");
        let id = call.id();
        state.insert_call(call).unwrap();

        let mut duplicate = outbound("other");
        duplicate.info.call_id = id;
        assert!(state.insert_call(duplicate).is_err());
        assert_eq!(state.call_count(), 1);

        assert_eq!(state.find_by_wire_id("abcdef"), Some(id));
        assert!(state.remove_call(&id).is_some());
        assert!(state.remove_call(&id).is_none());
        assert_eq!(state.find_by_wire_id("abcdef"), None);
    }

    #[test]
    fn test_set_call_state_queues_one_event_per_change() {
        let mut state = SessionState::new(Region::Auto, 3);
        let call = outbound("wire-1");
        let id = call.id();
        state.insert_call(call).unwrap();

        assert!(state.set_call_state(&id, CallState::Connecting, None).unwrap());
        assert!(!state.set_call_state(&id, CallState::Connecting, None).unwrap());
        assert_eq!(state.take_events().len(), 1);
        assert!(state.take_events().is_empty());

        let missing = Uuid::new_v4();
        assert_eq!(
            state.set_call_state(&missing, CallState::Active, None),
            Err(ClientError::CallNotFound { call_id: missing })
        );
    }

    #[test]
    fn test_session_required() {
        let mut state = SessionState::new(Region::Auto, 3);
        assert_eq!(state.require_session(), Err(ClientError::SessionIdRequired));
        state.session_id = Some("sess".into());
        assert_eq!(state.require_session().unwrap(), "sess");
    }
}
