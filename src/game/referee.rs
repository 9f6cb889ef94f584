//! Referee
//!
//! The privileged participant. It starts the game once enough players have
//! joined, periodically snapshots field objects for peers, and declares the
//! winner when the final target falls. StartGame, SyncWorlds and EndGame
//! are only accepted from the referee.

use tracing::{debug, info};

use crate::game::message::{Applied, BodySnapshot, Effect, Message};
use crate::game::state::{GamePhase, World};

/// Authoritative game-flow driver.
#[derive(Clone, Debug)]
pub struct Referee {
    expected_players: Option<usize>,
    start_requested: bool,
    end_requested: bool,
    sync_interval: f64,
    since_sync: f64,
}

impl Referee {
    /// Create a referee syncing every `sync_interval` seconds (0 disables).
    pub fn new(sync_interval: f64) -> Self {
        Self {
            expected_players: None,
            start_requested: false,
            end_requested: false,
            sync_interval,
            since_sync: 0.0,
        }
    }

    /// Players the referee is waiting for, once told.
    pub fn expected_players(&self) -> Option<usize> {
        self.expected_players
    }

    /// Record how many players must join before StartGame is proposed.
    ///
    /// If they are already present, StartGame is proposed immediately.
    pub fn on_start_game(&mut self, num_players: usize, world: &World) -> Vec<Message> {
        self.expected_players = Some(num_players);
        self.maybe_start(world).into_iter().collect()
    }

    /// Periodic work: a SyncWorlds snapshot every `sync_interval` of play.
    pub fn on_update(&mut self, world: &World, dt: f64) -> Vec<Message> {
        if world.phase() != GamePhase::Playing || self.sync_interval <= 0.0 {
            return Vec::new();
        }

        self.since_sync += dt;
        if self.since_sync < self.sync_interval {
            return Vec::new();
        }
        self.since_sync -= self.sync_interval;
        vec![Self::snapshot(world)]
    }

    /// React to an executed message.
    pub fn on_applied(&mut self, world: &World, applied: &Applied) -> Vec<Message> {
        match &applied.effect {
            Effect::PlayerCreated { .. } => self.maybe_start(world).into_iter().collect(),
            Effect::Hit(hit) if hit.final_target && hit.struck_destroyed && !self.end_requested => {
                self.end_requested = true;
                info!(winner = %hit.shooter, "Final target destroyed");
                vec![Message::EndGame { winner: hit.shooter }]
            }
            _ => Vec::new(),
        }
    }

    /// Snapshot of every field object's motion.
    pub fn snapshot(world: &World) -> Message {
        let bodies = world
            .field_objects()
            .values()
            .map(|object| BodySnapshot {
                id: object.id,
                position: object.body.position,
                velocity: object.body.velocity,
            })
            .collect();
        Message::SyncWorlds { bodies }
    }

    fn maybe_start(&mut self, world: &World) -> Option<Message> {
        let expected = self.expected_players?;
        if self.start_requested || world.players().len() < expected {
            return None;
        }
        self.start_requested = true;
        debug!(players = world.players().len(), "All players joined, starting");
        Some(Message::StartGame)
    }
}
