//! Client manager and everything it drives
//!
//! - [`ClientManager`]: connection, login, gateway registration, push and
//!   reconnect handling, plus the call operations in `calls`
//! - [`ClientBuilder`]: assembles a manager from config and collaborators
//! - [`config`]: [`ClientConfig`] and its parts
//! - [`recovery`]: retry, timeout and error-context utilities

pub mod builder;
mod calls;
pub mod config;
mod manager;
mod reconnect;
pub mod recovery;
mod routing;
mod session;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, Credentials, PushConfig, ServerConfig};
pub use manager::ClientManager;
