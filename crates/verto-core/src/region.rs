//! Signaling edge regions.
//!
//! A region is selected by prefixing the signaling host with the region value:
//!
//! ```text
//! auto        wss://rtc.telnyx.com
//! us-east     wss://us-east.rtc.telnyx.com
//! eu          wss://eu1.rtc.telnyx.com
//! ```
//!
//! `auto` lets the platform pick the edge and has no further fallback.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "eu1", alias = "eu")]
    Eu,
    #[serde(rename = "us-central")]
    UsCentral,
    #[serde(rename = "us-east")]
    UsEast,
    #[serde(rename = "us-west")]
    UsWest,
    #[serde(rename = "ca-central")]
    CaCentral,
    #[serde(rename = "apac")]
    Apac,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Auto,
        Region::Eu,
        Region::UsCentral,
        Region::UsEast,
        Region::UsWest,
        Region::CaCentral,
        Region::Apac,
    ];

    /// Value used as the host prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Auto => "auto",
            Region::Eu => "eu1",
            Region::UsCentral => "us-central",
            Region::UsEast => "us-east",
            Region::UsWest => "us-west",
            Region::CaCentral => "ca-central",
            Region::Apac => "apac",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Region::Auto => "AUTO",
            Region::Eu => "EU",
            Region::UsCentral => "US-CENTRAL",
            Region::UsEast => "US-EAST",
            Region::UsWest => "US-WEST",
            Region::CaCentral => "CA-CENTRAL",
            Region::Apac => "APAC",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_display_name(name: &str) -> Option<Region> {
        let upper = name.to_uppercase();
        Self::ALL.into_iter().find(|r| r.display_name() == upper)
    }

    /// Exact lookup by host-prefix value; `eu` is accepted for `eu1`
    pub fn from_value(value: &str) -> Option<Region> {
        if value == "eu" {
            return Some(Region::Eu);
        }
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Region::Auto)
    }

    /// Region a host is pinned to, read from its leading label.
    ///
    /// Hosts whose first label is not a region value (including IP addresses
    /// and the bare signaling host) are `Auto`.
    pub fn from_host(host: &str) -> Region {
        host.split('.')
            .next()
            .filter(|_| host.contains('.'))
            .and_then(Region::from_value)
            .unwrap_or(Region::Auto)
    }

    /// Rewrite `base` so that it targets this region.
    ///
    /// Any region prefix already on the host is replaced; `Auto` strips it.
    pub fn apply_to_url(&self, base: &Url) -> Result<Url> {
        let host = base.host_str().ok_or_else(|| Error::InvalidUrl {
            url: base.to_string(),
            reason: "missing host".to_string(),
        })?;

        let bare_host = if Region::from_host(host).is_auto() {
            host
        } else {
            host.split_once('.').map(|(_, rest)| rest).unwrap_or(host)
        };
        let new_host = if self.is_auto() {
            bare_host.to_string()
        } else {
            format!("{}.{}", self.as_str(), bare_host)
        };

        let mut url = base.clone();
        url.set_host(Some(&new_host)).map_err(|e| Error::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        Ok(url)
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Region::from_value(s)
            .or_else(|| Region::from_display_name(s))
            .ok_or_else(|| Error::UnknownRegion(s.to_string()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_are_case_insensitive() {
        assert_eq!(Region::from_display_name("us-central"), Some(Region::UsCentral));
        assert_eq!(Region::from_display_name("Apac"), Some(Region::Apac));
        assert_eq!(Region::from_display_name("INVALID"), None);
        assert_eq!(Region::from_display_name(""), None);
    }

    #[test]
    fn test_from_host_reads_leading_label() {
        assert_eq!(Region::from_host("us-east.rtc.telnyx.com"), Region::UsEast);
        assert_eq!(Region::from_host("eu1.rtc.telnyx.com"), Region::Eu);
        assert_eq!(Region::from_host("rtc.telnyx.com"), Region::Auto);
        assert_eq!(Region::from_host("127.0.0.1"), Region::Auto);
        assert_eq!(Region::from_host("apac"), Region::Auto);
    }

    #[test]
    fn test_apply_to_url() {
        let base = Url::parse("wss://rtc.telnyx.com").unwrap();
        let pinned = Region::UsWest.apply_to_url(&base).unwrap();
        assert_eq!(pinned.host_str(), Some("us-west.rtc.telnyx.com"));

        let moved = Region::CaCentral.apply_to_url(&pinned).unwrap();
        assert_eq!(moved.host_str(), Some("ca-central.rtc.telnyx.com"));

        let auto = Region::Auto.apply_to_url(&moved).unwrap();
        assert_eq!(auto.host_str(), Some("rtc.telnyx.com"));
    }

    #[test]
    fn test_parse_accepts_values_and_display_names() {
        assert_eq!("us-east".parse::<Region>().unwrap(), Region::UsEast);
        assert_eq!("EU".parse::<Region>().unwrap(), Region::Eu);
        assert_eq!("eu".parse::<Region>().unwrap(), Region::Eu);
        assert!("mars".parse::<Region>().is_err());
    }
}
