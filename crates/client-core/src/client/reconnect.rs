//! Recovery of the signaling session after network loss
//!
//! When the socket drops unexpectedly, or the connectivity observer reports a
//! loss or an interface switch, every call past `NEW` moves to `RECONNECTING`.
//! A fresh transport is opened (right away for the first attempt, then on
//! [`RetryConfig::reconnect`] backoff). The next `REGED` completes the episode
//! and restores each call to the state it had before.
//!
//! The reconnect timeout only guards calls: it is armed once per episode, when
//! the first call degrades. Expiry ends those calls with
//! `RECOVERY_ON_TIMER_EXPIRE` and reports [`ClientError::ReconnectFailed`]
//! exactly once. An idle client keeps retrying until it is back or the user
//! disconnects.

use tracing::{debug, info, warn};

use txrtc_verto_core::{CauseCode, Region};

use crate::call::{CallId, CallState, NetworkReason, TerminationReason};
use crate::connectivity::ConnectivityStatus;
use crate::error::ClientError;
use crate::events::ClientEvent;

use super::manager::{ClientInner, LoopMessage};
use super::recovery::RetryConfig;
use super::session::SessionState;

/// Reconnect bookkeeping of a session
#[derive(Debug, Default)]
pub(crate) struct ReconnectState {
    pub(crate) in_progress: bool,
    /// Tags the timers of one reconnect episode
    pub(crate) episode: u64,
    /// Transports opened in the current episode
    pub(crate) attempts: u32,
    /// Reconnect timeout running for degraded calls
    pub(crate) deadline_armed: bool,
}

impl ReconnectState {
    fn begin(&mut self) -> u64 {
        self.in_progress = true;
        self.episode += 1;
        self.attempts = 0;
        self.deadline_armed = false;
        self.episode
    }

    fn finish(&mut self) {
        self.in_progress = false;
        self.attempts = 0;
        self.deadline_armed = false;
    }

    fn is_current(&self, episode: u64) -> bool {
        self.in_progress && self.episode == episode
    }
}

impl ClientInner {
    /// Degrade calls and open an episode.
    ///
    /// Without calls to protect an episode only starts when the client will
    /// retry on its own (`retrying`); the timeout is armed with the first
    /// degraded call.
    pub(super) fn begin_reconnect(&self, state: &mut SessionState, reason: NetworkReason, retrying: bool) {
        let affected: Vec<CallId> = state
            .calls()
            .filter(|call| call.state().is_in_progress() && !matches!(call.state(), CallState::Reconnecting(_)))
            .map(|call| call.id())
            .collect();
        let degraded = !affected.is_empty();

        for call_id in affected {
            if let Some(call) = state.call_mut(&call_id) {
                call.state_before_reconnect = Some(call.state().clone());
            }
            if let Err(e) = state.set_call_state(&call_id, CallState::Reconnecting(reason), Some("signaling lost")) {
                warn!(call_id = %call_id, error = %e, "Failed to mark call as reconnecting");
            }
        }

        if !state.reconnect.in_progress {
            if !degraded && !retrying {
                return;
            }
            let episode = state.reconnect.begin();
            info!(episode = episode, reason = %reason, calls = state.call_count(), "Reconnect started");
        }
        if degraded && !state.reconnect.deadline_armed {
            state.reconnect.deadline_armed = true;
            let episode = state.reconnect.episode;
            debug!(
                episode = episode,
                timeout_ms = self.config.reconnect_timeout.as_millis() as u64,
                "Reconnect timeout armed"
            );
            self.arm(
                &self.reconnect_timer,
                self.config.reconnect_timeout,
                LoopMessage::ReconnectTimeout { episode },
            );
        }
    }

    /// The current transport reported a disconnect
    pub(super) async fn on_socket_lost(
        &self,
        state: &mut SessionState,
        reason: Option<String>,
        for_reconnect: bool,
        fallback_region: Option<Region>,
    ) {
        state.take_transport();
        self.reset_session(state);

        if let Some(region) = fallback_region {
            info!(from = %state.region, to = %region, "Falling back to region");
            state.region = region;
        }

        if state.user_disconnected {
            state.emit(ClientEvent::socket_disconnected(reason, false));
            return;
        }

        let reconnecting = for_reconnect || self.config.auto_reconnect;
        warn!(reason = ?reason, reconnecting = reconnecting, "Signaling socket lost");
        state.emit(ClientEvent::socket_disconnected(reason, reconnecting));
        self.begin_reconnect(state, NetworkReason::NetworkLost, reconnecting);

        if !reconnecting {
            return;
        }
        if for_reconnect || state.reconnect.attempts == 0 {
            self.reconnect_now(state).await;
        } else {
            self.schedule_reconnect_attempt(state);
        }
    }

    /// Connectivity observer reported a change.
    ///
    /// A reachable network reopens the socket of any client the user has not
    /// disconnected, including one whose last episode already gave up.
    pub(super) async fn on_connectivity(&self, state: &mut SessionState, status: ConnectivityStatus) {
        let previous = state.connectivity.replace(status);
        if previous == Some(status) {
            return;
        }
        state.emit(ClientEvent::network(status));

        if previous.is_none() || state.user_disconnected {
            return;
        }
        let has_session = state.transport.is_some() || state.reconnect.in_progress;
        let retrying = self.config.auto_reconnect;

        match status {
            ConnectivityStatus::NoConnection => {
                if !has_session {
                    return;
                }
                info!("Network lost");
                self.begin_reconnect(state, NetworkReason::NetworkLost, retrying);
            }
            _ => {
                if !has_session && !retrying {
                    return;
                }
                let switched = previous.is_some_and(|p| p.is_reachable());
                info!(status = %status, switched = switched, "Network available");
                if switched {
                    self.begin_reconnect(state, NetworkReason::NetworkSwitch, retrying);
                } else {
                    self.begin_reconnect(state, NetworkReason::NetworkLost, retrying);
                }
                if retrying {
                    self.reconnect_now(state).await;
                }
            }
        }
    }

    /// Tear down whatever transport is left and open a new one
    pub(super) async fn reconnect_now(&self, state: &mut SessionState) {
        if let Some(stale) = state.take_transport() {
            stale.disconnect(true).await;
            self.reset_session(state);
        }
        state.reconnect.attempts += 1;
        debug!(attempt = state.reconnect.attempts, region = %state.region, "Reconnect attempt");
        if let Err(e) = self.open_transport(state).await {
            warn!(error = %e, "Reconnect attempt failed to start");
            if !e.is_recoverable() {
                state.emit(ClientEvent::client_error(e, None));
            }
            self.schedule_reconnect_attempt(state);
        }
    }

    fn schedule_reconnect_attempt(&self, state: &mut SessionState) {
        let delay = RetryConfig::reconnect().delay_for_attempt(state.reconnect.attempts.max(1));
        let episode = state.reconnect.episode;
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnect attempt");
        self.arm(&self.reconnect_attempt_timer, delay, LoopMessage::ReconnectAttempt { episode });
    }

    pub(super) async fn on_reconnect_attempt(&self, state: &mut SessionState, episode: u64) {
        if !state.reconnect.is_current(episode) || state.transport.is_some() || state.user_disconnected {
            return;
        }
        self.reconnect_now(state).await;
    }

    /// Abandon any running episode without touching calls
    pub(super) fn cancel_reconnect(&self, state: &mut SessionState) {
        if state.reconnect.in_progress {
            debug!(episode = state.reconnect.episode, "Reconnect cancelled");
        }
        self.reconnect_timer.cancel();
        self.reconnect_attempt_timer.cancel();
        state.reconnect.finish();
    }

    /// Registration came back; restore degraded calls
    pub(super) fn complete_reconnect(&self, state: &mut SessionState) {
        if !state.reconnect.in_progress {
            return;
        }
        self.reconnect_timer.cancel();
        self.reconnect_attempt_timer.cancel();
        state.reconnect.finish();

        let restored: Vec<(CallId, CallState)> = state
            .call_ids()
            .into_iter()
            .filter_map(|call_id| {
                let call = state.call_mut(&call_id)?;
                let previous = call.state_before_reconnect.take()?;
                matches!(call.state(), CallState::Reconnecting(_)).then_some((call_id, previous))
            })
            .collect();

        info!(calls = restored.len(), "Reconnect completed");
        for (call_id, previous) in restored {
            if let Err(e) = state.set_call_state(&call_id, previous, Some("reconnected")) {
                warn!(call_id = %call_id, error = %e, "Failed to restore call state");
            }
        }
    }

    pub(super) async fn on_reconnect_timeout(&self, state: &mut SessionState, episode: u64) {
        if !state.reconnect.is_current(episode) {
            return;
        }
        let stranded: Vec<CallId> = state
            .calls()
            .filter(|call| matches!(call.state(), CallState::Reconnecting(_)))
            .map(|call| call.id())
            .collect();

        // Every degraded call ended while we were away
        if stranded.is_empty() {
            debug!(episode = episode, "Reconnect timeout with no calls left");
            if self.config.auto_reconnect {
                state.reconnect.deadline_armed = false;
            } else {
                self.cancel_reconnect(state);
            }
            return;
        }

        let timeout_ms = self.config.reconnect_timeout.as_millis() as u64;
        warn!(timeout_ms = timeout_ms, calls = stranded.len(), "Reconnect timed out");
        state.reconnect.finish();
        self.reconnect_attempt_timer.cancel();

        for call_id in stranded {
            self.finish_call(
                state,
                call_id,
                Some(TerminationReason::new(CauseCode::RecoveryOnTimerExpire)),
                "reconnect timed out",
            )
            .await;
        }

        if let Some(transport) = state.take_transport() {
            transport.disconnect(false).await;
            state.emit(ClientEvent::socket_disconnected(Some("reconnect timed out".to_string()), false));
        }
        self.reset_session(state);
        state.emit(ClientEvent::client_error(ClientError::ReconnectFailed { timeout_ms }, None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episodes_are_tagged() {
        let mut reconnect = ReconnectState::default();
        assert!(!reconnect.is_current(0));

        let first = reconnect.begin();
        reconnect.attempts = 3;
        assert!(reconnect.is_current(first));

        reconnect.finish();
        assert!(!reconnect.is_current(first));
        assert_eq!(reconnect.attempts, 0);

        let second = reconnect.begin();
        assert_ne!(first, second);
        assert!(!reconnect.is_current(first));
    }

    #[test]
    fn test_new_episode_has_no_deadline() {
        let mut reconnect = ReconnectState::default();
        reconnect.begin();
        reconnect.deadline_armed = true;

        reconnect.finish();
        assert!(!reconnect.deadline_armed);
        reconnect.begin();
        assert!(!reconnect.deadline_armed);
    }
}
