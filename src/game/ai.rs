//! Computer Player
//!
//! Joins as soon as the match starts, then fires at a steady cadence:
//! first at its own targets in id order, then at the final target once
//! those are gone. Aim is perturbed by seeded jitter so two AIs with
//! different seeds do not play identically, yet any one AI is reproducible.

use tracing::debug;

use crate::core::rng::{derive_seed, DeterministicRng};
use crate::game::actor::{Actor, ActorKind};
use crate::game::message::{Message, Rejection};
use crate::game::state::{GamePhase, World};
use crate::game::token::{ActorId, PlayerId, TokenId};

/// A scripted opponent.
#[derive(Clone, Debug)]
pub struct AiActor {
    id: ActorId,
    name: String,
    player: Option<PlayerId>,
    rng: DeterministicRng,
    fire_interval: f64,
    aim_jitter: f64,
    cooldown: f64,
    rejections: u32,
}

impl AiActor {
    /// Create an AI whose jitter stream is derived from `seed` and its id.
    pub fn new(id: ActorId, name: impl Into<String>, seed: u64, fire_interval: f64, aim_jitter: f64) -> Self {
        let seed = derive_seed(b"PIE_IN_THE_SKY_AI", &[seed.to_le_bytes().as_slice(), id.0.to_le_bytes().as_slice()]);
        Self {
            id,
            name: name.into(),
            player: None,
            rng: DeterministicRng::new(seed),
            fire_interval,
            aim_jitter,
            cooldown: 0.0,
            rejections: 0,
        }
    }

    /// The player this AI controls, once joined.
    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// Proposals of this AI that were refused.
    pub fn rejections(&self) -> u32 {
        self.rejections
    }

    /// What to shoot at: the first own target still standing, else the
    /// final target.
    fn pick_target(&self, world: &World) -> Option<TokenId> {
        let player = world.player(self.player?)?;
        player
            .targets
            .iter()
            .copied()
            .find(|id| world.field_object(*id).is_some())
            .or_else(|| world.final_target().map(|t| t.id))
    }
}

impl Actor for AiActor {
    fn id(&self) -> ActorId {
        self.id
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Ai
    }

    fn on_start_game(&mut self, _num_players: usize) -> Vec<Message> {
        vec![Message::CreatePlayer {
            actor: self.id,
            name: self.name.clone(),
        }]
    }

    fn on_update_game(&mut self, world: &World, dt: f64) -> Vec<Message> {
        if world.phase() != GamePhase::Playing {
            return Vec::new();
        }

        self.cooldown -= dt;
        if self.cooldown > 0.0 {
            return Vec::new();
        }

        let Some(player) = self.player.and_then(|id| world.player(id)) else {
            return Vec::new();
        };
        if !player.can_afford(world.config().bullet_mass) {
            return Vec::new();
        }
        let Some(cannon) = player.cannons.first().and_then(|id| world.cannon(*id)) else {
            return Vec::new();
        };
        let Some(target) = self.pick_target(world).and_then(|id| world.field_object(id)) else {
            return Vec::new();
        };

        let jitter = self.rng.next_range(-self.aim_jitter, self.aim_jitter);
        let aim = (target.body.position - cannon.position).rotate(jitter);
        self.cooldown = self.fire_interval;

        vec![Message::ShootBullet { cannon: cannon.id, aim }]
    }

    fn on_create_player(&mut self, _world: &World, player: PlayerId, actor: ActorId) {
        if actor == self.id {
            self.player = Some(player);
        }
    }

    fn on_rejected(&mut self, rejection: &Rejection) {
        self.rejections += 1;
        debug!(actor = %self.id, error = %rejection.error, "AI proposal rejected");
    }
}
