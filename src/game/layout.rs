//! StartGame Layout
//!
//! Where StartGame places everything. The field is split into one vertical
//! lane per player (in player id order):
//!
//! - one cannon per player, centred in its lane on the bottom edge
//! - `targets_per_player` owned targets spread across the lane's top edge
//! - one ownerless final target on the centre line, below the owned row
//! - `obstacle_count` obstacles spread across the middle band
//!
//! The layout is a pure function of the configuration and the player list,
//! so the token kinds it declares and the tokens it places always agree.

use crate::core::vec2::Vec2;
use crate::game::config::GameConfig;
use crate::game::token::{PlayerId, TokenKind};

/// One token StartGame will create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Spawn {
    /// A player's cannon
    Cannon {
        /// Owning player
        owner: PlayerId,
        /// Fixed position
        position: Vec2,
    },
    /// A target; `None` owner is the final target
    Target {
        /// Player that must destroy it
        owner: Option<PlayerId>,
        /// Initial position
        position: Vec2,
    },
    /// A repulsive obstacle
    Obstacle {
        /// Initial position
        position: Vec2,
    },
}

impl Spawn {
    /// Token kind this spawn registers.
    pub fn kind(&self) -> TokenKind {
        match self {
            Spawn::Cannon { .. } => TokenKind::Cannon,
            Spawn::Target { .. } => TokenKind::Target,
            Spawn::Obstacle { .. } => TokenKind::Obstacle,
        }
    }

    /// Where the token is placed.
    pub fn position(&self) -> Vec2 {
        match self {
            Spawn::Cannon { position, .. }
            | Spawn::Target { position, .. }
            | Spawn::Obstacle { position } => *position,
        }
    }
}

/// Spawns for a match between `players` (ascending id order).
pub fn start_layout(config: &GameConfig, players: &[PlayerId]) -> Vec<Spawn> {
    let width = config.field.width;
    let height = config.field.height;
    let margin = config.edge_margin;

    let mut spawns = Vec::with_capacity(players.len() * (1 + config.targets_per_player) + 1 + config.obstacle_count);
    if players.is_empty() {
        return spawns;
    }

    let lane_width = width / players.len() as f64;
    let top = height - margin;

    for (lane, owner) in players.iter().enumerate() {
        let lane_start = lane as f64 * lane_width;

        spawns.push(Spawn::Cannon {
            owner: *owner,
            position: Vec2::new(lane_start + lane_width * 0.5, margin),
        });

        let slots = config.targets_per_player as f64 + 1.0;
        for slot in 1..=config.targets_per_player {
            spawns.push(Spawn::Target {
                owner: Some(*owner),
                position: Vec2::new(lane_start + lane_width * slot as f64 / slots, top),
            });
        }
    }

    // Below the owned row by a few target diameters, clamped to the upper half.
    let final_y = (top - 4.0 * config.target.radius).max(height * 0.5);
    spawns.push(Spawn::Target {
        owner: None,
        position: Vec2::new(width * 0.5, final_y),
    });

    let slots = config.obstacle_count as f64 + 1.0;
    for slot in 1..=config.obstacle_count {
        spawns.push(Spawn::Obstacle {
            position: Vec2::new(width * slot as f64 / slots, height * 0.5),
        });
    }

    spawns
}
