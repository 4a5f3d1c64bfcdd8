//! Hangup cause codes carried by `telnyx_rtc.bye`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Q.850 / SIP-style cause of a hangup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CauseCode {
    NormalClearing,
    UserBusy,
    CallRejected,
    UnallocatedNumber,
    IncompatibleDestination,
    RecoveryOnTimerExpire,
    MandatoryIeMissing,
    AllottedTimeout,
    NormalTemporaryFailure,
    InvalidGateway,
    OriginatorCancel,
}

impl Default for CauseCode {
    fn default() -> Self {
        CauseCode::NormalClearing
    }
}

impl CauseCode {
    const TABLE: [(CauseCode, u16, &'static str); 11] = [
        (CauseCode::NormalClearing, 16, "NORMAL_CLEARING"),
        (CauseCode::UserBusy, 17, "USER_BUSY"),
        (CauseCode::CallRejected, 21, "CALL_REJECTED"),
        (CauseCode::UnallocatedNumber, 1, "UNALLOCATED_NUMBER"),
        (CauseCode::IncompatibleDestination, 88, "INCOMPATIBLE_DESTINATION"),
        (CauseCode::RecoveryOnTimerExpire, 102, "RECOVERY_ON_TIMER_EXPIRE"),
        (CauseCode::MandatoryIeMissing, 96, "MANDATORY_IE_MISSING"),
        (CauseCode::AllottedTimeout, 602, "ALLOTTED_TIMEOUT"),
        (CauseCode::NormalTemporaryFailure, 41, "NORMAL_TEMPORARY_FAILURE"),
        (CauseCode::InvalidGateway, 608, "INVALID_GATEWAY"),
        (CauseCode::OriginatorCancel, 487, "ORIGINATOR_CANCEL"),
    ];

    fn entry(&self) -> (CauseCode, u16, &'static str) {
        Self::TABLE
            .iter()
            .copied()
            .find(|(cause, _, _)| cause == self)
            .unwrap_or((CauseCode::NormalClearing, 16, "NORMAL_CLEARING"))
    }

    /// Numeric code sent as `causeCode`
    pub fn code(&self) -> u16 {
        self.entry().1
    }

    /// Canonical cause string sent as `cause`
    pub fn cause(&self) -> &'static str {
        self.entry().2
    }

    /// Look a numeric code up in the table
    pub fn from_code(code: u16) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(cause, _, _)| *cause)
    }

    /// Look a cause string up in the table.
    ///
    /// `MANAGER_REQUEST` and `PROGRESS_TIMEOUT` are server-side aliases of normal
    /// clearing.
    pub fn from_cause(cause: &str) -> Option<Self> {
        match cause {
            "MANAGER_REQUEST" | "PROGRESS_TIMEOUT" => Some(CauseCode::NormalClearing),
            other => Self::TABLE
                .iter()
                .find(|(_, _, name)| *name == other)
                .map(|(cause, _, _)| *cause),
        }
    }
}

impl fmt::Display for CauseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.cause(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        assert_eq!(CauseCode::default().code(), 16);
        assert_eq!(CauseCode::default().cause(), "NORMAL_CLEARING");
        assert_eq!(CauseCode::UserBusy.code(), 17);
        assert_eq!(CauseCode::OriginatorCancel.cause(), "ORIGINATOR_CANCEL");
        assert_eq!(CauseCode::from_code(608), Some(CauseCode::InvalidGateway));
        assert_eq!(CauseCode::from_code(999), None);
    }

    #[test]
    fn test_every_code_maps_back_to_itself() {
        for (cause, code, name) in CauseCode::TABLE {
            assert_eq!(CauseCode::from_code(code), Some(cause));
            assert_eq!(CauseCode::from_cause(name), Some(cause));
        }
    }

    #[test]
    fn test_normal_clearing_aliases() {
        assert_eq!(CauseCode::from_cause("MANAGER_REQUEST"), Some(CauseCode::NormalClearing));
        assert_eq!(CauseCode::from_cause("PROGRESS_TIMEOUT"), Some(CauseCode::NormalClearing));
    }
}
