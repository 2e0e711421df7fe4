//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod gateway;
pub mod http;
pub mod partner;
pub mod storage;
pub mod telemetry;

/// User agent shared by every outbound client.
pub(crate) fn user_agent() -> &'static str {
    concat!("leafline/", env!("CARGO_PKG_VERSION"))
}
