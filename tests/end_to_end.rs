//! Full match flow through the public engine API.

use pie_in_the_sky::game::actor::{Actor, ActorKind};
use pie_in_the_sky::game::message::{BodySnapshot, Effect, MessageError};
use pie_in_the_sky::game::state::{FieldKind, GamePhase};
use pie_in_the_sky::{ActorId, Engine, GameConfig, Message, Sender, TokenId, TokenKind, Vec2};

const DT: f64 = 1.0 / 60.0;

/// Joins on start and otherwise waits for submitted proposals.
struct Scripted(ActorId);

impl Actor for Scripted {
    fn id(&self) -> ActorId {
        self.0
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Gui
    }

    fn on_start_game(&mut self, _num_players: usize) -> Vec<Message> {
        vec![Message::CreatePlayer { actor: self.0, name: format!("player-{}", self.0 .0) }]
    }
}

fn started_match() -> Engine {
    let mut engine = Engine::new(GameConfig::default()).unwrap();
    engine.add_actor(Box::new(Scripted(ActorId(1))));
    engine.add_actor(Box::new(Scripted(ActorId(2))));
    let report = engine.start().unwrap();
    assert!(report.rejected.is_empty());
    engine
}

fn close(a: Vec2, b: Vec2) -> bool {
    a.distance(b) < 1e-9
}

#[test]
fn test_start_game_lays_out_field() {
    let engine = started_match();
    let world = engine.world();
    let config = world.config();

    assert_eq!(world.phase(), GamePhase::Playing);
    assert_eq!(world.players().len(), 2);
    assert_eq!(world.cannons().len(), 2);
    assert_eq!(world.targets().count(), 2 * config.targets_per_player + 1);
    assert_eq!(world.obstacles().count(), config.obstacle_count);
    assert_eq!(world.bullets().count(), 0);

    let cannons: Vec<Vec2> = world.cannons().values().map(|c| c.position).collect();
    assert_eq!(cannons, vec![Vec2::new(200.0, 30.0), Vec2::new(600.0, 30.0)]);

    let final_target = world.final_target().unwrap();
    assert!(close(final_target.body.position, Vec2::new(400.0, 506.0)));

    let owned: Vec<(TokenId, Vec2)> = world
        .targets()
        .filter(|t| matches!(t.kind, FieldKind::Target { owner: Some(_) }))
        .map(|t| (t.id, t.body.position))
        .collect();
    let expected = [
        (TokenId(4), Vec2::new(400.0 / 3.0, 570.0)),
        (TokenId(5), Vec2::new(800.0 / 3.0, 570.0)),
        (TokenId(7), Vec2::new(400.0 + 400.0 / 3.0, 570.0)),
        (TokenId(8), Vec2::new(400.0 + 800.0 / 3.0, 570.0)),
    ];
    assert_eq!(owned.len(), expected.len());
    for ((id, position), (want_id, want_position)) in owned.iter().zip(expected.iter()) {
        assert_eq!(id, want_id);
        assert!(close(*position, *want_position), "{id}: {position:?}");
    }

    for obstacle in world.obstacles() {
        assert_eq!(obstacle.body.position.y, 300.0);
        assert!(obstacle.body.mass < 0.0);
    }

    // Every placed token is in the identity table with the right kind.
    for (id, kind) in world.registry().iter() {
        match kind {
            TokenKind::Player => assert!(world.player(id).is_some()),
            TokenKind::Cannon => assert!(world.cannon(id).is_some()),
            _ => assert_eq!(world.field_object(id).map(|o| o.token_kind()), Some(kind)),
        }
    }
}

#[test]
fn test_second_start_game_is_rejected() {
    let mut engine = started_match();
    let tokens = engine.world().registry().len();

    engine.submit(Sender::Referee, Message::StartGame);
    let report = engine.update(DT).unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].error, MessageError::TargetsAlreadyExist);
    assert_eq!(engine.world().cannons().len(), 2);
    assert_eq!(engine.world().registry().len(), tokens);
    assert_eq!(engine.world().registry().peek_next_id(), TokenId(12));
}

#[test]
fn test_firing_until_arsenal_empty() {
    let mut engine = started_match();
    let shooter = Sender::Actor(ActorId(1));
    let max = engine.world().config().max_arsenal;
    let mass = engine.world().config().bullet_mass;
    let shots = max / mass;

    for _ in 0..=shots {
        engine.submit(shooter, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP });
    }
    let report = engine.update(DT).unwrap();

    let fired = report
        .applied
        .iter()
        .filter(|a| matches!(a.effect, Effect::BulletFired { .. }))
        .count();
    assert_eq!(fired as u32, shots);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(
        report.rejected[0].error,
        MessageError::InsufficientArsenal { available: 0, required: mass }
    );

    let player = engine.world().player(TokenId(1)).unwrap();
    assert_eq!(player.arsenal(), 0);
    assert_eq!(engine.world().bullets().count() as u32, shots);

    // The other player's arsenal is untouched.
    assert_eq!(engine.world().player(TokenId(2)).unwrap().arsenal(), max);
}

#[test]
fn test_final_target_hit_names_winner() {
    let mut engine = started_match();
    let shooter = Sender::Actor(ActorId(2));
    let cannon = TokenId(6);

    // Player 2 owns targets 7 and 8; the final target is 9.
    for target in [TokenId(7), TokenId(8), TokenId(9)] {
        engine.submit(shooter, Message::ShootBullet { cannon, aim: Vec2::UP });
        let fired = engine.update(DT).unwrap();
        let bullet = fired
            .applied
            .iter()
            .find_map(|a| match a.effect {
                Effect::BulletFired { bullet, .. } => Some(bullet),
                _ => None,
            })
            .unwrap();

        let position = engine.world().field_object(target).unwrap().body.position;
        engine.submit(
            Sender::Referee,
            Message::SyncWorlds {
                bodies: vec![BodySnapshot { id: bullet, position, velocity: Vec2::ZERO }],
            },
        );
        engine.update(DT).unwrap();

        let report = engine.update(DT).unwrap();
        assert!(report
            .applied
            .iter()
            .any(|a| a.message == Message::HitTarget { bullet, target }));
        assert!(engine.world().field_object(target).is_none());
    }

    assert!(engine.world().is_over());
    assert_eq!(engine.world().winner(), Some(TokenId(2)));
    assert_eq!(engine.world().phase(), GamePhase::Ended);

    // Player 1 still has targets; play is over regardless.
    assert_eq!(engine.world().player(TokenId(1)).unwrap().targets.len(), 2);
    engine.submit(Sender::Actor(ActorId(1)), Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP });
    let report = engine.update(DT).unwrap();
    assert_eq!(report.rejected[0].error, MessageError::GameAlreadyOver);
}

#[test]
fn test_final_target_survives_early_hit() {
    let mut engine = started_match();
    let shooter = Sender::Actor(ActorId(1));

    engine.submit(shooter, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP });
    let fired = engine.update(DT).unwrap();
    let bullet = fired
        .applied
        .iter()
        .find_map(|a| match a.effect {
            Effect::BulletFired { bullet, .. } => Some(bullet),
            _ => None,
        })
        .unwrap();

    let position = engine.world().final_target().unwrap().body.position;
    engine.submit(
        Sender::Referee,
        Message::SyncWorlds {
            bodies: vec![BodySnapshot { id: bullet, position, velocity: Vec2::ZERO }],
        },
    );
    engine.update(DT).unwrap();
    engine.update(DT).unwrap();

    // Bullet spent, final target intact, no winner.
    assert!(engine.world().field_object(bullet).is_none());
    assert!(engine.world().final_target().is_some());
    assert!(!engine.world().is_over());
}
