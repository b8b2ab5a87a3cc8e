//! Byte-stream transport for conduitwire.
//!
//! Establishes the reliable stream a session runs on:
//! - plain TCP
//! - TCP wrapped in TLS, either verified against the platform trust store or
//!   accepting any peer certificate (private testbed deployments)
//!
//! This is the lowest layer of conduitwire. Everything else builds on top of
//! the [`ConduitStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(feature = "tls")]
pub mod tls;

pub use error::{Result, TransportError};
pub use stream::{ConduitStream, TlsPolicy};
pub use tcp::connect;
