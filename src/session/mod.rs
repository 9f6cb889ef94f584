//! Session Layer
//!
//! Async hosting of a match. This layer is **non-deterministic** (wall-clock
//! pacing, channel scheduling); every state change still goes through the
//! engine in `game/`, so the order of executed messages is the only thing
//! peers need to agree on.

pub mod protocol;
pub mod runner;
pub mod replica;

pub use protocol::{Broadcast, CodecError, Envelope, Wire};
pub use runner::{PeerHandle, Session, SessionConfig, SessionError, SessionHandle, SessionId, SessionSummary};
pub use replica::{Replica, ReplicaError};
