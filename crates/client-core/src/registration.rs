//! Gateway registration tracking
//!
//! After login the signaling server registers the client with its SIP gateway
//! and announces `telnyx_rtc.clientReady`. The client then polls
//! `telnyx_rtc.gatewayState` on a fixed interval until the gateway reports
//! `REGED` or the poll budget is spent.
//!
//! [`GatewayRegistration`] is the pure state machine behind that loop; the
//! client owns the timer and the socket and asks it what to do next.
//!
//! ```rust
//! use txrtc_client_core::registration::{GatewayRegistration, RegistrationUpdate, RetryDecision};
//! use txrtc_verto_core::GatewayState;
//!
//! let mut registration = GatewayRegistration::new(3);
//! let attempt = registration.start();
//! assert_eq!(registration.on_retry_expired(attempt), RetryDecision::PollAgain);
//! assert_eq!(registration.on_state(GatewayState::Reged), RegistrationUpdate::Ready);
//! assert_eq!(registration.on_state(GatewayState::Reged), RegistrationUpdate::Unchanged);
//! ```

use txrtc_verto_core::GatewayState;

/// Default number of gateway polls before giving up
pub const DEFAULT_GATEWAY_MAX_ATTEMPTS: u32 = 3;

/// Outcome of a gateway state report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationUpdate {
    /// First `REGED` of this session
    Ready,
    /// Some other state than before
    Changed(GatewayState),
    /// Nothing new
    Unchanged,
}

/// What to do when the retry timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Timer belongs to an older poll cycle or registration already finished
    Stale,
    /// Send another poll and re-arm
    PollAgain,
    /// Budget spent; report the failure
    GiveUp { attempts: u32 },
}

/// Gateway registration sub-state machine of a session
#[derive(Debug, Clone)]
pub struct GatewayRegistration {
    state: Option<GatewayState>,
    polls_sent: u32,
    max_attempts: u32,
    ready: bool,
    failure_reported: bool,
    cycle: u64,
}

impl GatewayRegistration {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: None,
            polls_sent: 0,
            max_attempts: max_attempts.max(1),
            ready: false,
            failure_reported: false,
            cycle: 0,
        }
    }

    /// Begin a poll cycle with its first poll; returns the cycle number to tag
    /// the retry timer with
    pub fn start(&mut self) -> u64 {
        self.cycle += 1;
        self.polls_sent = 1;
        self.failure_reported = false;
        self.cycle
    }

    /// Decide what a fired retry timer means
    pub fn on_retry_expired(&mut self, cycle: u64) -> RetryDecision {
        if cycle != self.cycle || self.ready || self.failure_reported {
            return RetryDecision::Stale;
        }
        if self.polls_sent >= self.max_attempts {
            self.failure_reported = true;
            return RetryDecision::GiveUp { attempts: self.polls_sent };
        }
        self.polls_sent += 1;
        RetryDecision::PollAgain
    }

    /// Record a reported gateway state
    pub fn on_state(&mut self, state: GatewayState) -> RegistrationUpdate {
        let previous = self.state.replace(state);
        if state.is_registered() {
            if self.ready {
                return RegistrationUpdate::Unchanged;
            }
            self.ready = true;
            return RegistrationUpdate::Ready;
        }
        if previous == Some(state) {
            RegistrationUpdate::Unchanged
        } else {
            RegistrationUpdate::Changed(state)
        }
    }

    /// Forget everything; the next session starts unregistered
    pub fn reset(&mut self) {
        *self = Self { cycle: self.cycle + 1, ..Self::new(self.max_attempts) };
    }

    pub fn state(&self) -> Option<GatewayState> {
        self.state
    }

    /// `REGED` seen in this session
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn polls_sent(&self) -> u32 {
        self.polls_sent
    }
}

impl Default for GatewayRegistration {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_once_after_budget() {
        let mut registration = GatewayRegistration::new(3);
        let cycle = registration.start();

        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::PollAgain);
        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::PollAgain);
        assert_eq!(registration.polls_sent(), 3);
        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::GiveUp { attempts: 3 });
        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::Stale);
    }

    #[test]
    fn test_new_cycle_after_giving_up_gets_full_budget() {
        let mut registration = GatewayRegistration::new(2);
        let first = registration.start();
        assert_eq!(registration.on_retry_expired(first), RetryDecision::PollAgain);
        assert_eq!(registration.on_retry_expired(first), RetryDecision::GiveUp { attempts: 2 });

        let second = registration.start();
        assert_eq!(registration.polls_sent(), 1);
        assert_eq!(registration.on_retry_expired(second), RetryDecision::PollAgain);
        assert_eq!(registration.on_retry_expired(second), RetryDecision::GiveUp { attempts: 2 });
        assert_eq!(registration.on_retry_expired(second), RetryDecision::Stale);
    }

    #[test]
    fn test_stale_cycle_is_ignored() {
        let mut registration = GatewayRegistration::default();
        let old = registration.start();
        let current = registration.start();
        assert_eq!(registration.on_retry_expired(old), RetryDecision::Stale);
        assert_eq!(registration.on_retry_expired(current), RetryDecision::PollAgain);
    }

    #[test]
    fn test_non_registered_states_keep_polling() {
        let mut registration = GatewayRegistration::default();
        let cycle = registration.start();
        assert_eq!(registration.on_state(GatewayState::Trying), RegistrationUpdate::Changed(GatewayState::Trying));
        assert_eq!(registration.on_state(GatewayState::Trying), RegistrationUpdate::Unchanged);
        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::PollAgain);

        assert_eq!(registration.on_state(GatewayState::Reged), RegistrationUpdate::Ready);
        assert!(registration.is_ready());
        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::Stale);
    }

    #[test]
    fn test_reset_allows_a_new_ready() {
        let mut registration = GatewayRegistration::default();
        let cycle = registration.start();
        registration.on_state(GatewayState::Reged);
        registration.reset();

        assert!(!registration.is_ready());
        assert_eq!(registration.state(), None);
        assert_eq!(registration.on_retry_expired(cycle), RetryDecision::Stale);
        assert_eq!(registration.on_state(GatewayState::Reged), RegistrationUpdate::Ready);
    }
}
