//! Core deterministic primitives.
//!
//! Vector math, seeded randomness and state hashing. Everything the
//! simulation needs below the game rules lives here.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
