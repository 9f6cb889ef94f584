//! # Pie in the Sky Server
//!
//! Authoritative world simulation for Pie in the Sky, a two-dimensional
//! artillery game where bullets fly through a gravity field.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PIE IN THE SKY SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector math                            │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── token.rs    - Token ids and identity registry           │
//! │  ├── state.rs    - Players, cannons, field objects, world    │
//! │  ├── message.rs  - Check/execute message layer               │
//! │  ├── tick.rs     - Gravity, motion and contact step          │
//! │  ├── referee.rs  - Game flow authority                       │
//! │  └── engine.rs   - Frame loop over actors and messages       │
//! │                                                              │
//! │  session/        - Async hosting (non-deterministic)         │
//! │  ├── runner.rs   - Session host task                         │
//! │  ├── protocol.rs - Wire types                                │
//! │  └── replica.rs  - Follower world                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - Token ids from a monotonic counter, never reused
//! - All randomness from seeded Xorshift128+
//!
//! Floating point is plain IEEE-754 `f64` with a fixed operation order, so
//! two worlds fed the same messages on the same platform hash identically.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod session;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::DeterministicRng;
pub use game::config::GameConfig;
pub use game::engine::{Engine, FrameReport};
pub use game::message::{Message, MessageError, Sender};
pub use game::state::World;
pub use game::token::{ActorId, PlayerId, TokenId, TokenKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
