//! Game Logic Module
//!
//! All game simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `config`: Tunables and JSON loading
//! - `token`: Token ids and the identity registry
//! - `body`: Field object physics
//! - `state`: Players, cannons, field objects and the world
//! - `layout`: Where StartGame places things
//! - `message`: Messages, validation and execution
//! - `collision`: Contact detection
//! - `tick`: Authoritative physics step
//! - `referee`: Game flow authority
//! - `actor`: Message proposers and their subscriptions
//! - `extension`: Per-actor-kind token behaviour
//! - `ai`: Computer player
//! - `engine`: Frame loop tying it together
//! - `events`: Game events for logs and replay

pub mod config;
pub mod token;
pub mod body;
pub mod state;
pub mod layout;
pub mod message;
pub mod collision;
pub mod tick;
pub mod referee;
pub mod actor;
pub mod extension;
pub mod ai;
pub mod engine;
pub mod events;

// Re-export key types
pub use config::{ConfigError, GameConfig};
pub use token::{ActorId, PlayerId, RegistryError, TokenId, TokenKind};
pub use state::{GamePhase, World};
pub use message::{Message, MessageError, Outcome, Sender};
pub use tick::TickReport;
pub use actor::{Actor, ActorKind};
pub use engine::{Engine, FrameReport};
pub use events::GameEvent;
