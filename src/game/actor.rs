//! Actors
//!
//! An actor proposes messages on behalf of one player and observes what the
//! world accepts. GUIs, AIs and remote peers are all actors; the engine
//! treats them the same and only their [`ActorKind`] differs.
//!
//! Every subscription callback has an empty default, so an actor implements
//! only what it reacts to.

use serde::{Serialize, Deserialize};

use crate::game::message::{Applied, Effect, HitOutcome, Message, Rejection, Sender};
use crate::game::state::World;
use crate::game::token::{ActorId, PlayerId, TokenId, TokenKind};

/// Kind of actor. Keys the token extension table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    /// Local human interface
    Gui,
    /// Computer player
    Ai,
    /// Peer on another process
    Remote,
}

/// A participant that proposes messages.
pub trait Actor {
    /// Unique id; every message this actor proposes is sent as it.
    fn id(&self) -> ActorId;

    /// Kind, used to resolve token extensions.
    fn kind(&self) -> ActorKind;

    /// The engine is starting a match for `num_players`.
    fn on_start_game(&mut self, _num_players: usize) -> Vec<Message> {
        Vec::new()
    }

    /// Once per frame while the engine runs.
    fn on_update_game(&mut self, _world: &World, _dt: f64) -> Vec<Message> {
        Vec::new()
    }

    /// A player joined.
    fn on_create_player(&mut self, _world: &World, _player: PlayerId, _actor: ActorId) {}

    /// The field was laid out.
    fn on_start_game_applied(&mut self, _world: &World) {}

    /// A bullet was fired.
    fn on_shoot_bullet(&mut self, _world: &World, _bullet: TokenId, _shooter: PlayerId) {}

    /// Two bullets destroyed each other.
    fn on_hit_bullet(&mut self, _world: &World, _hit: &HitOutcome) {}

    /// A bullet struck a target.
    fn on_hit_target(&mut self, _world: &World, _hit: &HitOutcome) {}

    /// A bullet struck an obstacle.
    fn on_hit_obstacle(&mut self, _world: &World, _hit: &HitOutcome) {}

    /// Field objects were overwritten by a snapshot.
    fn on_sync_worlds(&mut self, _world: &World) {}

    /// A winner was recorded.
    fn on_end_game(&mut self, _world: &World, _winner: PlayerId) {}

    /// One of this actor's own proposals was refused.
    fn on_rejected(&mut self, _rejection: &Rejection) {}
}

/// Route an executed message to the matching subscription callback.
pub fn dispatch_applied(actor: &mut dyn Actor, world: &World, applied: &Applied) {
    match &applied.effect {
        Effect::None => {}
        Effect::PlayerCreated { player, actor: owner } => actor.on_create_player(world, *player, *owner),
        Effect::GameStarted { .. } => actor.on_start_game_applied(world),
        Effect::BulletFired { bullet, shooter, .. } => actor.on_shoot_bullet(world, *bullet, *shooter),
        Effect::Hit(hit) => match hit.struck_kind {
            TokenKind::Bullet => actor.on_hit_bullet(world, hit),
            TokenKind::Target => actor.on_hit_target(world, hit),
            _ => actor.on_hit_obstacle(world, hit),
        },
        Effect::WorldsSynced { .. } => actor.on_sync_worlds(world),
        Effect::GameEnded { winner } => actor.on_end_game(world, *winner),
    }
}

/// Deliver a rejection to the actor that proposed it, and only that actor.
pub fn dispatch_rejected(actor: &mut dyn Actor, rejection: &Rejection) {
    if rejection.sender == Sender::Actor(actor.id()) {
        actor.on_rejected(rejection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::message::MessageError;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl Actor for Recorder {
        fn id(&self) -> ActorId {
            ActorId(7)
        }

        fn kind(&self) -> ActorKind {
            ActorKind::Gui
        }

        fn on_create_player(&mut self, _world: &World, _player: PlayerId, _actor: ActorId) {
            self.calls.push("create");
        }

        fn on_hit_obstacle(&mut self, _world: &World, _hit: &HitOutcome) {
            self.calls.push("obstacle");
        }

        fn on_rejected(&mut self, _rejection: &Rejection) {
            self.calls.push("rejected");
        }
    }

    #[test]
    fn test_dispatch_routes_by_effect() {
        let world = World::new(GameConfig::default());
        let mut recorder = Recorder::default();

        let created = Applied {
            sender: Sender::Actor(ActorId(1)),
            message: Message::CreatePlayer { actor: ActorId(1), name: "a".into() },
            added: vec![(TokenId(1), TokenKind::Player)],
            removed: Vec::new(),
            effect: Effect::PlayerCreated { player: TokenId(1), actor: ActorId(1) },
        };
        dispatch_applied(&mut recorder, &world, &created);

        let hit = Applied {
            sender: Sender::Referee,
            message: Message::HitObstacle { bullet: TokenId(5), obstacle: TokenId(3) },
            added: Vec::new(),
            removed: vec![(TokenId(5), TokenKind::Bullet)],
            effect: Effect::Hit(HitOutcome {
                shooter: TokenId(1),
                bullet: TokenId(5),
                struck: TokenId(3),
                struck_kind: TokenKind::Obstacle,
                struck_destroyed: false,
                final_target: false,
            }),
        };
        dispatch_applied(&mut recorder, &world, &hit);

        assert_eq!(recorder.calls, vec!["create", "obstacle"]);
    }

    #[test]
    fn test_rejections_go_to_proposer_only() {
        let mut recorder = Recorder::default();
        let foreign = Rejection {
            sender: Sender::Actor(ActorId(1)),
            message: Message::StartGame,
            error: MessageError::RefereeOnly("StartGame"),
        };
        dispatch_rejected(&mut recorder, &foreign);
        assert!(recorder.calls.is_empty());

        let own = Rejection {
            sender: Sender::Actor(ActorId(7)),
            ..foreign
        };
        dispatch_rejected(&mut recorder, &own);
        assert_eq!(recorder.calls, vec!["rejected"]);
    }
}
