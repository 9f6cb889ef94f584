//! Protocol Messages
//!
//! Wire format between a session host and its peers. Peers send
//! [`Envelope`]s (proposals); the host fans out [`Broadcast`]s (executed
//! messages, stamped with their frame). Both encode as bincode for
//! production or JSON for debugging ease.

use serde::{de::DeserializeOwned, Serialize, Deserialize};
use thiserror::Error;

use crate::game::message::{Applied, Message, Sender};

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Binary encoding or decoding failed.
    #[error("binary codec error: {0}")]
    Binary(#[from] bincode::Error),

    /// JSON encoding or decoding failed.
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode/decode helpers shared by every wire type.
pub trait Wire: Serialize + DeserializeOwned {
    /// Serialize to bytes (bincode).
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes (bincode).
    fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(data)?)
    }

    /// Serialize to JSON text.
    fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON text.
    fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// PEER -> HOST
// =============================================================================

/// A proposal sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Claimed sender; the host refuses `Referee`
    pub sender: Sender,
    /// Proposed message
    pub message: Message,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(sender: Sender, message: Message) -> Self {
        Self { sender, message }
    }
}

impl Wire for Envelope {}

// =============================================================================
// HOST -> PEER
// =============================================================================

/// An executed message, in authoritative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Frame the message executed in
    pub frame: u64,
    /// Who proposed it
    pub sender: Sender,
    /// The message
    pub message: Message,
}

impl Broadcast {
    /// Broadcast for a message executed during `frame`.
    pub fn from_applied(frame: u64, applied: &Applied) -> Self {
        Self {
            frame,
            sender: applied.sender,
            message: applied.message.clone(),
        }
    }
}

impl Wire for Broadcast {}
