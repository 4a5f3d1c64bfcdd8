//! Gateway registration states reported by `telnyx_rtc.gatewayState`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The backend's view of whether this client is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayState {
    Noreg,
    Trying,
    Register,
    Reged,
    Unregister,
    Failed,
    FailWait,
    Expired,
    Unreged,
}

impl GatewayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Noreg => "NOREG",
            GatewayState::Trying => "TRYING",
            GatewayState::Register => "REGISTER",
            GatewayState::Reged => "REGED",
            GatewayState::Unregister => "UNREGISTER",
            GatewayState::Failed => "FAILED",
            GatewayState::FailWait => "FAIL_WAIT",
            GatewayState::Expired => "EXPIRED",
            GatewayState::Unreged => "UNREGED",
        }
    }

    /// Only a registered gateway lets calls be placed or answered
    pub fn is_registered(&self) -> bool {
        matches!(self, GatewayState::Reged)
    }
}

impl FromStr for GatewayState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOREG" => Ok(GatewayState::Noreg),
            "TRYING" => Ok(GatewayState::Trying),
            "REGISTER" => Ok(GatewayState::Register),
            "REGED" => Ok(GatewayState::Reged),
            "UNREGISTER" => Ok(GatewayState::Unregister),
            "FAILED" => Ok(GatewayState::Failed),
            "FAIL_WAIT" => Ok(GatewayState::FailWait),
            "EXPIRED" => Ok(GatewayState::Expired),
            "UNREGED" => Ok(GatewayState::Unreged),
            other => Err(Error::UnknownGatewayState(other.to_string())),
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_reged_is_registered() {
        let all = [
            GatewayState::Noreg,
            GatewayState::Trying,
            GatewayState::Register,
            GatewayState::Reged,
            GatewayState::Unregister,
            GatewayState::Failed,
            GatewayState::FailWait,
            GatewayState::Expired,
            GatewayState::Unreged,
        ];
        for state in all {
            assert_eq!(state.is_registered(), state == GatewayState::Reged);
            assert_eq!(state.as_str().parse::<GatewayState>().unwrap(), state);
        }
    }

    #[test]
    fn test_unknown_state_is_an_error() {
        assert_eq!(
            "HALF_REGED".parse::<GatewayState>(),
            Err(Error::UnknownGatewayState("HALF_REGED".to_string()))
        );
    }
}
