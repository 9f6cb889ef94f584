//! Token Identity
//!
//! Every simulated entity is a token with a world-unique id. The registry is
//! the identity table: ids are handed out from a monotonic counter, so two
//! worlds that apply the same messages in the same order agree on every id.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Unique token identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Players are tokens; the alias keeps signatures readable.
pub type PlayerId = TokenId;

/// Identifier of an actor (GUI, AI, remote peer) proposing messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Kind of token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenKind {
    /// A participant
    Player = 0,
    /// A player's launcher
    Cannon = 1,
    /// A fired projectile
    Bullet = 2,
    /// Owned or final target
    Target = 3,
    /// Repulsive neutral body
    Obstacle = 4,
}

impl TokenKind {
    /// Collision-type tag handed to an external rigid-body engine.
    /// Only field objects carry one.
    pub fn collision_tag(self) -> Option<u8> {
        match self {
            TokenKind::Bullet => Some(1),
            TokenKind::Target => Some(2),
            TokenKind::Obstacle => Some(3),
            TokenKind::Player | TokenKind::Cannon => None,
        }
    }
}

/// Identity table corruption. The only fatal error in the simulation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// An id was registered twice.
    #[error("token {0} is already registered")]
    AlreadyRegistered(TokenId),

    /// An id was removed that was never registered.
    #[error("token {0} is not registered")]
    NotRegistered(TokenId),

    /// The registry and the world disagree about a token's kind.
    #[error("token {id} registered as {registered:?}, world holds {found:?}")]
    KindMismatch {
        /// Token in question
        id: TokenId,
        /// Kind in the registry
        registered: TokenKind,
        /// Kind the world tried to remove
        found: TokenKind,
    },

    /// A token was registered but the world never placed it.
    #[error("token {0} is registered but absent from the world")]
    Orphaned(TokenId),

    /// A token was unregistered but the world still holds it.
    #[error("token {0} was unregistered but is still in the world")]
    StillPresent(TokenId),
}

/// The world's identity table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRegistry {
    next_id: u64,
    live: BTreeMap<TokenId, TokenKind>,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    /// Create an empty registry. The first id handed out is 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            live: BTreeMap::new(),
        }
    }

    /// Id the next registration will receive.
    pub fn peek_next_id(&self) -> TokenId {
        TokenId(self.next_id)
    }

    /// Register tokens in order, returning the ids assigned to them.
    pub fn register_all(&mut self, kinds: &[TokenKind]) -> Result<Vec<TokenId>, RegistryError> {
        let mut ids = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let id = TokenId(self.next_id);
            if self.live.contains_key(&id) {
                return Err(RegistryError::AlreadyRegistered(id));
            }
            self.next_id += 1;
            self.live.insert(id, *kind);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Unregister one token.
    pub fn unregister(&mut self, id: TokenId, kind: TokenKind) -> Result<(), RegistryError> {
        match self.live.get(&id) {
            None => Err(RegistryError::NotRegistered(id)),
            Some(registered) if *registered != kind => Err(RegistryError::KindMismatch {
                id,
                registered: *registered,
                found: kind,
            }),
            Some(_) => {
                self.live.remove(&id);
                Ok(())
            }
        }
    }

    /// Kind of a live token.
    pub fn kind_of(&self, id: TokenId) -> Option<TokenKind> {
        self.live.get(&id).copied()
    }

    /// Is this id currently registered?
    pub fn contains(&self, id: TokenId) -> bool {
        self.live.contains_key(&id)
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// No live tokens.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live tokens in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, TokenKind)> + '_ {
        self.live.iter().map(|(id, kind)| (*id, *kind))
    }
}
