//! Server-side proxy that holds the model credential.
//!
//! Clients POST a chat payload to one local path; the gateway attaches the
//! credential and forwards it upstream unchanged.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::{DEFAULT_BIND, DEFAULT_PATH, GatewayConfig, UpstreamFlavor};
pub use error::GatewayError;
pub use proxy::{GatewayState, router};
