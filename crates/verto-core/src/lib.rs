//! Verto JSON-RPC message layer for the txrtc signaling stack
//!
//! This crate holds everything that is pure protocol: the frame envelope and
//! its forgiving decoder, the method table, typed builders for every request
//! the client sends, a typed classification of inbound frames, hangup cause
//! codes, gateway states, regions and signaling URL construction.
//!
//! Nothing here does I/O. The socket lives in `txrtc-signaling-transport` and
//! the call and session logic in `txrtc-client-core`.
//!
//! # Examples
//!
//! ```rust
//! use txrtc_verto_core::prelude::*;
//! use txrtc_verto_core::requests::{GatewayStateRequest, VertoRequest};
//!
//! let poll = GatewayStateRequest.to_message();
//! let decoded = Message::decode(&poll.encode()).unwrap();
//! assert_eq!(decoded.method, Some(Method::GatewayState));
//!
//! let inbound = Message::decode(r#"{"id":"1","result":{"params":{"state":"REGED"}}}"#).unwrap();
//! assert_eq!(Payload::from_message(&inbound), Payload::GatewayState(GatewayState::Reged));
//! ```

pub mod cause;
pub mod dialog;
pub mod error;
pub mod gateway;
pub mod message;
pub mod method;
pub mod payload;
pub mod region;
pub mod requests;
pub mod server;

pub use cause::CauseCode;
pub use dialog::{CallInfo, CallOptions, CustomHeader, DialogParams, DEFAULT_REMOTE_CALLER_NAME};
pub use error::{Error, Result};
pub use gateway::GatewayState;
pub use message::{new_message_id, JsonObject, Message, RpcError, JSONRPC_VERSION};
pub use method::Method;
pub use payload::{HoldState, Payload, RemoteHangup, RemoteOffer};
pub use region::Region;
pub use server::{push_server_url, signaling_url, IceServer, DEVELOPMENT_HOST, PRODUCTION_HOST};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        CallInfo, CallOptions, CauseCode, CustomHeader, Error, GatewayState, IceServer, Message,
        Method, Payload, Region, Result,
    };
    pub use crate::requests::VertoRequest;
}
