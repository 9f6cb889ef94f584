//! Game Events
//!
//! What happened in a frame, derived from executed and rejected messages.
//! Events are for logs, replays and UIs; they never feed back into the
//! world.

use serde::{Serialize, Deserialize};

use crate::game::message::{Applied, Effect, Rejection, Sender};
use crate::game::token::{ActorId, PlayerId, TokenId, TokenKind};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Game flow changes first
    Phase = 0,
    /// Then destruction
    Destruction = 1,
    /// Then spawns
    Spawn = 2,
    /// Then bookkeeping
    Sync = 3,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A player joined
    PlayerJoined {
        /// New player
        player: PlayerId,
        /// Controlling actor
        actor: ActorId,
    },
    /// The field was laid out and play began
    GameStarted {
        /// Players in the match
        players: usize,
    },
    /// A bullet was fired
    BulletFired {
        /// New bullet
        bullet: TokenId,
        /// Firing player
        shooter: PlayerId,
    },
    /// A bullet struck something
    BulletHit {
        /// The bullet
        bullet: TokenId,
        /// Firing player
        shooter: PlayerId,
        /// What it struck
        struck: TokenId,
        /// Kind of what it struck
        struck_kind: TokenKind,
        /// Whether that was destroyed
        destroyed: bool,
    },
    /// Field objects were overwritten by a snapshot
    WorldsSynced {
        /// Snapshot size
        bodies: usize,
    },
    /// A winner was recorded
    GameEnded {
        /// Winning player
        winner: PlayerId,
    },
    /// A message was refused
    MessageRejected {
        /// Who proposed it
        sender: Sender,
        /// Message name
        message: String,
        /// Why
        reason: String,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Frame when the event occurred
    pub frame: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Position in the frame's message order (for tie-breaking)
    pub sequence: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(frame: u64, sequence: u32, priority: EventPriority, data: GameEventData) -> Self {
        Self {
            frame,
            priority,
            sequence,
            data,
        }
    }

    /// Event for an executed message, if it did anything worth reporting.
    pub fn from_applied(frame: u64, sequence: u32, applied: &Applied) -> Option<Self> {
        let (priority, data) = match &applied.effect {
            Effect::None => return None,
            Effect::PlayerCreated { player, actor } => (
                EventPriority::Spawn,
                GameEventData::PlayerJoined { player: *player, actor: *actor },
            ),
            Effect::GameStarted { players } => (
                EventPriority::Phase,
                GameEventData::GameStarted { players: *players },
            ),
            Effect::BulletFired { bullet, shooter, .. } => (
                EventPriority::Spawn,
                GameEventData::BulletFired { bullet: *bullet, shooter: *shooter },
            ),
            Effect::Hit(hit) => (
                EventPriority::Destruction,
                GameEventData::BulletHit {
                    bullet: hit.bullet,
                    shooter: hit.shooter,
                    struck: hit.struck,
                    struck_kind: hit.struck_kind,
                    destroyed: hit.struck_destroyed,
                },
            ),
            Effect::WorldsSynced { bodies } => (
                EventPriority::Sync,
                GameEventData::WorldsSynced { bodies: *bodies },
            ),
            Effect::GameEnded { winner } => (
                EventPriority::Phase,
                GameEventData::GameEnded { winner: *winner },
            ),
        };
        Some(Self::new(frame, sequence, priority, data))
    }

    /// Event for a refused message.
    pub fn rejected(frame: u64, sequence: u32, rejection: &Rejection) -> Self {
        Self::new(
            frame,
            sequence,
            EventPriority::Other,
            GameEventData::MessageRejected {
                sender: rejection.sender,
                message: rejection.message.name().to_string(),
                reason: rejection.error.to_string(),
            },
        )
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame
            && self.priority == other.priority
            && self.sequence == other.sequence
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: frame, then priority, then message order
        self.frame
            .cmp(&other.frame)
            .then(self.priority.cmp(&other.priority))
            .then(self.sequence.cmp(&other.sequence))
    }
}
