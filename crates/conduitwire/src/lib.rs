//! Client for the conduit protocol.
//!
//! conduitwire talks to a conduit peer over TCP (optionally TLS). Messages are
//! JSON objects, LZ4-compressed and framed with a checksummed header.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP/TLS stream establishment
//! - [`frame`]: checksum, compression, frame codec and async reader/writer
//! - [`session`]: command model, connection session and conduit membership

/// Re-export transport types.
pub mod transport {
    pub use conduit_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use conduit_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use conduit_session::*;
}

pub use conduit_session::{
    Command, ConduitId, InboundEvent, Session, SessionConfig, SessionError, SessionState,
    TlsPolicy,
};

/// Port conduit peers listen on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 16666;
