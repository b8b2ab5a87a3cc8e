//! Client session for the conduit protocol.
//!
//! A [`Session`] owns one connection at a time. Commands are JSON objects
//! sent as frames through a FIFO send queue; events from the peer are decoded
//! by a receive loop and handed to a single observer in arrival order.
//! Conduit membership is tracked on the session and survives reconnects.

pub mod command;
pub mod error;
pub mod membership;
pub mod session;

pub use command::{timestamp_now, Action, Command, ConduitId, InboundEvent};
pub use conduit_frame::{FrameConfig, ResyncPolicy};
pub use conduit_transport::TlsPolicy;
pub use error::{Result, SessionError};
pub use membership::{Membership, ReconcilePlan};
pub use session::{Session, SessionConfig, SessionState};
