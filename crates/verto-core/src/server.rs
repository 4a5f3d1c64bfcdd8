//! Signaling hosts, ICE servers and URL construction.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::region::Region;

/// Production signaling host
pub const PRODUCTION_HOST: &str = "wss://rtc.telnyx.com";
/// Development signaling host
pub const DEVELOPMENT_HOST: &str = "wss://rtcdev.telnyx.com";

pub const PRODUCTION_STUN_SERVER: &str = "stun:stun.telnyx.com:3478";
pub const PRODUCTION_TURN_SERVER_UDP: &str = "turn:turn.telnyx.com:3478?transport=udp";
pub const PRODUCTION_TURN_SERVER_TCP: &str = "turn:turn.telnyx.com:3478?transport=tcp";
pub const DEVELOPMENT_STUN_SERVER: &str = "stun:stundev.telnyx.com:3478";
pub const DEVELOPMENT_TURN_SERVER_UDP: &str = "turn:turndev.telnyx.com:3478?transport=udp";
pub const DEVELOPMENT_TURN_SERVER_TCP: &str = "turn:turndev.telnyx.com:3478?transport=tcp";

const TURN_USERNAME: &str = "testuser";
const TURN_CREDENTIAL: &str = "testpassword";

/// Query parameter that ties a reconnecting socket to a push session
pub const VOICE_SDK_ID_PARAM: &str = "voice_sdk_id";

/// One ICE server entry handed to the media engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self { urls: vec![url.into()], username: None, credential: None }
    }

    pub fn turn(url: impl Into<String>, username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    /// STUN, then TURN over UDP, then TURN over TCP for restrictive firewalls
    pub fn production_defaults() -> Vec<IceServer> {
        vec![
            IceServer::stun(PRODUCTION_STUN_SERVER),
            IceServer::turn(PRODUCTION_TURN_SERVER_UDP, TURN_USERNAME, TURN_CREDENTIAL),
            IceServer::turn(PRODUCTION_TURN_SERVER_TCP, TURN_USERNAME, TURN_CREDENTIAL),
        ]
    }

    pub fn development_defaults() -> Vec<IceServer> {
        vec![
            IceServer::stun(DEVELOPMENT_STUN_SERVER),
            IceServer::turn(DEVELOPMENT_TURN_SERVER_UDP, TURN_USERNAME, TURN_CREDENTIAL),
            IceServer::turn(DEVELOPMENT_TURN_SERVER_TCP, TURN_USERNAME, TURN_CREDENTIAL),
        ]
    }
}

/// Build the socket URL for `host`, pinned to `region`, optionally tagged with a
/// push session id.
///
/// # Examples
///
/// ```rust
/// use txrtc_verto_core::{signaling_url, Region};
///
/// let url = signaling_url("wss://rtc.telnyx.com", Region::UsEast, Some("abc")).unwrap();
/// assert_eq!(url.as_str(), "wss://us-east.rtc.telnyx.com/?voice_sdk_id=abc");
/// ```
pub fn signaling_url(host: &str, region: Region, voice_sdk_id: Option<&str>) -> Result<Url> {
    let base = Url::parse(host).map_err(|e| Error::InvalidUrl {
        url: host.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(base.scheme(), "ws" | "wss") {
        return Err(Error::InvalidUrl {
            url: host.to_string(),
            reason: format!("unsupported scheme {}", base.scheme()),
        });
    }
    let mut url = region.apply_to_url(&base)?;
    if let Some(id) = voice_sdk_id.filter(|id| !id.is_empty()) {
        url.query_pairs_mut().append_pair(VOICE_SDK_ID_PARAM, id);
    }
    Ok(url)
}

/// Socket URL for a push-provided server address (`rtc_ip`/`rtc_port`)
pub fn push_server_url(rtc_ip: &str, rtc_port: &str, voice_sdk_id: Option<&str>) -> Result<Url> {
    signaling_url(&format!("wss://{}:{}", rtc_ip, rtc_port), Region::Auto, voice_sdk_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_region_keeps_host() {
        let url = signaling_url(PRODUCTION_HOST, Region::Auto, None).unwrap();
        assert_eq!(url.host_str(), Some("rtc.telnyx.com"));
        assert!(url.query().is_none());
    }

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let err = signaling_url("https://rtc.telnyx.com", Region::Auto, None).unwrap_err();
        assert!(err.is_url_error());
    }

    #[test]
    fn test_push_server_url() {
        let url = push_server_url("10.0.0.5", "14938", Some("sdk-1")).unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.5"));
        assert_eq!(url.port(), Some(14938));
        assert_eq!(url.query(), Some("voice_sdk_id=sdk-1"));
    }

    #[test]
    fn test_default_ice_servers() {
        let servers = IceServer::production_defaults();
        assert_eq!(servers.len(), 3);
        assert_eq!(servers[0].urls, vec![PRODUCTION_STUN_SERVER.to_string()]);
        assert_eq!(servers[1].username.as_deref(), Some("testuser"));
        assert_eq!(servers[2].urls[0], "turn:turn.telnyx.com:3478?transport=tcp");
    }
}
