//! Messages
//!
//! Every change to a [`World`] after creation is a message. A message goes
//! through two states before it touches anything:
//!
//! 1. [`Proposal`]: a sender wants this message applied
//! 2. [`Checked`]: the rules accepted it against the current world
//!
//! Only a `Checked` can be executed, and it holds the world mutably until it
//! is, so nothing can slip between validation and execution.
//!
//! Execution is fixed: tokens the message declares are registered (ids
//! assigned in order), the message applies itself, then tokens it declared
//! for removal are unregistered. A disagreement between the registry and
//! the world at that point is a [`RegistryError`] and is fatal.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::body::Body;
use crate::game::layout::{start_layout, Spawn};
use crate::game::state::{Cannon, FieldKind, FieldObject, GamePhase, Player, World};
use crate::game::token::{ActorId, PlayerId, RegistryError, TokenId, TokenKind};

// =============================================================================
// SENDER
// =============================================================================

/// Who proposed a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sender {
    /// The authoritative referee
    Referee,
    /// A player-controlling actor
    Actor(ActorId),
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Referee => write!(f, "referee"),
            Sender::Actor(id) => write!(f, "{id}"),
        }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Position and velocity of one field object, as sent by SyncWorlds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    /// Field object
    pub id: TokenId,
    /// Authoritative position
    pub position: Vec2,
    /// Authoritative velocity
    pub velocity: Vec2,
}

/// A proposed change to the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Join the game as a new player.
    CreatePlayer {
        /// Actor that will control the player
        actor: ActorId,
        /// Display name
        name: String,
    },
    /// Lay out cannons, targets and obstacles and begin play.
    StartGame,
    /// Fire a bullet from a cannon.
    ShootBullet {
        /// Cannon to fire
        cannon: TokenId,
        /// Direction; only its heading matters
        aim: Vec2,
    },
    /// A bullet touched another bullet.
    HitBullet {
        /// Reporting bullet
        bullet: TokenId,
        /// Bullet it touched
        other: TokenId,
    },
    /// A bullet touched a target.
    HitTarget {
        /// Bullet
        bullet: TokenId,
        /// Target it touched
        target: TokenId,
    },
    /// A bullet touched an obstacle.
    HitObstacle {
        /// Bullet
        bullet: TokenId,
        /// Obstacle it touched
        obstacle: TokenId,
    },
    /// Overwrite field object motion with authoritative values.
    SyncWorlds {
        /// One snapshot per synced object
        bodies: Vec<BodySnapshot>,
    },
    /// Record the winner and end play.
    EndGame {
        /// Winning player
        winner: PlayerId,
    },
}

/// Why a message was rejected. Rejections leave the world untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// An actor proposed on behalf of a different actor.
    #[error("{sender} may not act for {actor}")]
    Impersonation {
        /// Who sent it
        sender: Sender,
        /// Who the message names
        actor: ActorId,
    },

    /// Only the referee may propose this message.
    #[error("only the referee may propose {0}")]
    RefereeOnly(&'static str),

    /// The actor already controls a player.
    #[error("player already exists for {0}")]
    PlayerAlreadyExists(ActorId),

    /// Joining or starting after play has begun.
    #[error("game already started")]
    GameAlreadyStarted,

    /// StartGame on a world that already has targets.
    #[error("targets already exist")]
    TargetsAlreadyExist,

    /// StartGame with nobody to play.
    #[error("no players have joined")]
    NoPlayers,

    /// Gameplay message before StartGame.
    #[error("game has not started")]
    GameNotStarted,

    /// Gameplay message after EndGame.
    #[error("game already over")]
    GameAlreadyOver,

    /// The message names a token the world does not hold.
    #[error("unknown token {0}")]
    UnknownToken(TokenId),

    /// The message names a token of the wrong kind.
    #[error("token {id} is a {found:?}, expected {expected:?}")]
    WrongKind {
        /// Token in question
        id: TokenId,
        /// Kind the message needs
        expected: TokenKind,
        /// Kind the world holds
        found: TokenKind,
    },

    /// The cannon belongs to someone else.
    #[error("cannon {cannon} is not controlled by {sender}")]
    NotYourCannon {
        /// Cannon named
        cannon: TokenId,
        /// Who tried to fire it
        sender: Sender,
    },

    /// Zero or non-finite aim.
    #[error("aim direction must be non-zero and finite")]
    InvalidAim,

    /// Not enough arsenal for the bullet.
    #[error("player has too many bullets in play (arsenal {available}, bullet mass {required})")]
    InsufficientArsenal {
        /// Arsenal left
        available: u32,
        /// Bullet mass
        required: u32,
    },

    /// The reported hit does not hold in the current world.
    #[error("bullet {bullet} is not touching {other}")]
    BulletMissed {
        /// Bullet named
        bullet: TokenId,
        /// Object named
        other: TokenId,
    },

    /// EndGame names a player who does not exist.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// A SyncWorlds snapshot carries a non-finite value.
    #[error("snapshot for {0} is not finite")]
    InvalidSnapshot(TokenId),
}

impl Message {
    /// Stable name for logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            Message::CreatePlayer { .. } => "CreatePlayer",
            Message::StartGame => "StartGame",
            Message::ShootBullet { .. } => "ShootBullet",
            Message::HitBullet { .. } => "HitBullet",
            Message::HitTarget { .. } => "HitTarget",
            Message::HitObstacle { .. } => "HitObstacle",
            Message::SyncWorlds { .. } => "SyncWorlds",
            Message::EndGame { .. } => "EndGame",
        }
    }

    /// Messages only the referee may propose.
    pub fn is_referee_only(&self) -> bool {
        matches!(
            self,
            Message::StartGame | Message::SyncWorlds { .. } | Message::EndGame { .. }
        )
    }

    /// Check this message against the rules and the current world.
    pub fn validate(&self, sender: Sender, world: &World) -> Result<(), MessageError> {
        if self.is_referee_only() && sender != Sender::Referee {
            return Err(MessageError::RefereeOnly(self.name()));
        }

        match self {
            Message::CreatePlayer { actor, .. } => {
                if sender != Sender::Actor(*actor) {
                    return Err(MessageError::Impersonation { sender, actor: *actor });
                }
                if world.phase() != GamePhase::Waiting {
                    return Err(MessageError::GameAlreadyStarted);
                }
                if world.player_for_actor(*actor).is_some() {
                    return Err(MessageError::PlayerAlreadyExists(*actor));
                }
                Ok(())
            }

            Message::StartGame => {
                if world.targets().next().is_some() {
                    return Err(MessageError::TargetsAlreadyExist);
                }
                if world.phase() != GamePhase::Waiting {
                    return Err(MessageError::GameAlreadyStarted);
                }
                if world.players().is_empty() {
                    return Err(MessageError::NoPlayers);
                }
                Ok(())
            }

            Message::ShootBullet { cannon, aim } => {
                require_playing(world)?;
                let cannon_state = world
                    .cannon(*cannon)
                    .ok_or(MessageError::UnknownToken(*cannon))?;
                let player = world
                    .player(cannon_state.owner)
                    .ok_or(MessageError::UnknownPlayer(cannon_state.owner))?;
                if sender != Sender::Actor(player.actor) {
                    return Err(MessageError::NotYourCannon { cannon: *cannon, sender });
                }
                if !aim.is_finite() || aim.try_normalize().is_none() {
                    return Err(MessageError::InvalidAim);
                }
                let required = world.config().bullet_mass;
                if !player.can_afford(required) {
                    return Err(MessageError::InsufficientArsenal {
                        available: player.arsenal(),
                        required,
                    });
                }
                Ok(())
            }

            Message::HitBullet { bullet, other } => {
                require_playing(world)?;
                check_hit(world, *bullet, *other, TokenKind::Bullet)
            }

            Message::HitTarget { bullet, target } => {
                require_playing(world)?;
                check_hit(world, *bullet, *target, TokenKind::Target)
            }

            Message::HitObstacle { bullet, obstacle } => {
                require_playing(world)?;
                check_hit(world, *bullet, *obstacle, TokenKind::Obstacle)
            }

            Message::SyncWorlds { bodies } => {
                for snapshot in bodies {
                    if world.field_object(snapshot.id).is_none() {
                        return Err(MessageError::UnknownToken(snapshot.id));
                    }
                    if !(snapshot.position.is_finite() && snapshot.velocity.is_finite()) {
                        return Err(MessageError::InvalidSnapshot(snapshot.id));
                    }
                }
                Ok(())
            }

            Message::EndGame { winner } => {
                require_playing(world)?;
                if world.player(*winner).is_none() {
                    return Err(MessageError::UnknownPlayer(*winner));
                }
                Ok(())
            }
        }
    }

    /// Kinds of the tokens this message creates, in creation order.
    pub fn tokens_to_add(&self, world: &World) -> Vec<TokenKind> {
        match self {
            Message::CreatePlayer { .. } => vec![TokenKind::Player],
            Message::StartGame => layout_for(world).iter().map(Spawn::kind).collect(),
            Message::ShootBullet { .. } => vec![TokenKind::Bullet],
            _ => Vec::new(),
        }
    }

    /// Tokens this message destroys.
    pub fn tokens_to_remove(&self, world: &World) -> Vec<(TokenId, TokenKind)> {
        match self {
            Message::HitBullet { bullet, other } => vec![
                (*bullet, TokenKind::Bullet),
                (*other, TokenKind::Bullet),
            ],
            Message::HitTarget { bullet, target } => {
                let mut removed = vec![(*bullet, TokenKind::Bullet)];
                if target_destroyed(world, *bullet, *target) {
                    removed.push((*target, TokenKind::Target));
                }
                removed
            }
            Message::HitObstacle { bullet, .. } => vec![(*bullet, TokenKind::Bullet)],
            _ => Vec::new(),
        }
    }

    /// Apply to a world that has already registered `added`.
    fn apply(&self, world: &mut World, added: &[TokenId]) -> Effect {
        match self {
            Message::CreatePlayer { actor, name } => {
                let config = world.config();
                let (max_arsenal, rate) = (config.max_arsenal, config.arsenal_recharge_rate);
                let Some(&id) = added.first() else {
                    return Effect::None;
                };
                world.insert_player(Player::new(id, *actor, name.clone(), max_arsenal, rate));
                Effect::PlayerCreated { player: id, actor: *actor }
            }

            Message::StartGame => {
                let spawns = layout_for(world);
                let config = world.config().clone();

                for (spawn, id) in spawns.iter().zip(added.iter().copied()) {
                    match *spawn {
                        Spawn::Cannon { owner, position } => {
                            world.insert_cannon(Cannon {
                                id,
                                owner,
                                position,
                                muzzle_speed: config.muzzle_speed,
                                muzzle_offset: config.muzzle_offset,
                            });
                            if let Some(player) = world.player_mut(owner) {
                                player.cannons.push(id);
                            }
                        }
                        Spawn::Target { owner, position } => {
                            world.insert_field_object(FieldObject {
                                id,
                                kind: FieldKind::Target { owner },
                                body: Body::new(position, Vec2::ZERO, config.target.mass, config.target.radius),
                            });
                            if let Some(player) = owner.and_then(|o| world.player_mut(o)) {
                                player.targets.push(id);
                            }
                        }
                        Spawn::Obstacle { position } => {
                            world.insert_field_object(FieldObject {
                                id,
                                kind: FieldKind::Obstacle,
                                body: Body::new(position, Vec2::ZERO, config.obstacle.mass, config.obstacle.radius),
                            });
                        }
                    }
                }

                world.set_phase(GamePhase::Playing);
                Effect::GameStarted { players: world.players().len() }
            }

            Message::ShootBullet { cannon, aim } => {
                let Some(&id) = added.first() else {
                    return Effect::None;
                };
                let Some(cannon_state) = world.cannon(*cannon) else {
                    return Effect::None;
                };
                let Some((position, velocity)) = cannon_state.muzzle(*aim) else {
                    return Effect::None;
                };
                let shooter = cannon_state.owner;
                let cost = world.config().bullet_mass;
                let bullet = world.config().bullet_body();

                if let Some(player) = world.player_mut(shooter) {
                    player.spend_arsenal(cost);
                }
                world.insert_field_object(FieldObject {
                    id,
                    kind: FieldKind::Bullet { cannon: *cannon, shooter },
                    body: Body::new(position, velocity, bullet.mass, bullet.radius),
                });
                Effect::BulletFired { bullet: id, cannon: *cannon, shooter }
            }

            Message::HitBullet { bullet, other } => {
                let Some(shooter) = world.field_object(*bullet).and_then(FieldObject::shooter) else {
                    return Effect::None;
                };
                world.remove_field_object(*bullet);
                world.remove_field_object(*other);
                hit_effect(shooter, *bullet, *other, TokenKind::Bullet, true, false)
            }

            Message::HitTarget { bullet, target } => {
                let Some(shooter) = world.field_object(*bullet).and_then(FieldObject::shooter) else {
                    return Effect::None;
                };
                let destroyed = target_destroyed(world, *bullet, *target);
                let (owner, is_final) = match world.field_object(*target).map(|o| o.kind) {
                    Some(FieldKind::Target { owner }) => (owner, owner.is_none()),
                    _ => (None, false),
                };

                world.remove_field_object(*bullet);
                if destroyed {
                    world.remove_field_object(*target);
                    if let Some(player) = owner.and_then(|o| world.player_mut(o)) {
                        player.remove_target(*target);
                    }
                }
                hit_effect(shooter, *bullet, *target, TokenKind::Target, destroyed, is_final)
            }

            Message::HitObstacle { bullet, obstacle } => {
                let Some(shooter) = world.field_object(*bullet).and_then(FieldObject::shooter) else {
                    return Effect::None;
                };
                world.remove_field_object(*bullet);
                hit_effect(shooter, *bullet, *obstacle, TokenKind::Obstacle, false, false)
            }

            Message::SyncWorlds { bodies } => {
                for snapshot in bodies {
                    if let Some(object) = world.field_object_mut(snapshot.id) {
                        object.body.set_state(snapshot.position, snapshot.velocity);
                    }
                }
                Effect::WorldsSynced { bodies: bodies.len() }
            }

            Message::EndGame { winner } => {
                world.set_winner(*winner);
                Effect::GameEnded { winner: *winner }
            }
        }
    }
}

fn require_playing(world: &World) -> Result<(), MessageError> {
    match world.phase() {
        GamePhase::Waiting => Err(MessageError::GameNotStarted),
        GamePhase::Ended => Err(MessageError::GameAlreadyOver),
        GamePhase::Playing => Ok(()),
    }
}

fn expect_kind(world: &World, id: TokenId, expected: TokenKind) -> Result<&FieldObject, MessageError> {
    let object = world.field_object(id).ok_or(MessageError::UnknownToken(id))?;
    let found = object.token_kind();
    if found != expected {
        return Err(MessageError::WrongKind { id, expected, found });
    }
    Ok(object)
}

fn check_hit(world: &World, bullet: TokenId, other: TokenId, other_kind: TokenKind) -> Result<(), MessageError> {
    let b = expect_kind(world, bullet, TokenKind::Bullet)?;
    let o = expect_kind(world, other, other_kind)?;
    if bullet == other || !b.body.is_touching(&o.body) {
        return Err(MessageError::BulletMissed { bullet, other });
    }
    Ok(())
}

fn layout_for(world: &World) -> Vec<Spawn> {
    let players: Vec<PlayerId> = world.players().keys().copied().collect();
    start_layout(world.config(), &players)
}

/// Does this hit destroy the target?
///
/// Owned targets fall only to their owner. The final target falls only to a
/// shooter with no owned targets left.
fn target_destroyed(world: &World, bullet: TokenId, target: TokenId) -> bool {
    let Some(shooter) = world.field_object(bullet).and_then(FieldObject::shooter) else {
        return false;
    };
    match world.field_object(target).map(|o| o.kind) {
        Some(FieldKind::Target { owner: Some(owner) }) => owner == shooter,
        Some(FieldKind::Target { owner: None }) => world
            .player(shooter)
            .is_some_and(|p| !p.has_remaining_targets()),
        _ => false,
    }
}

fn hit_effect(
    shooter: PlayerId,
    bullet: TokenId,
    struck: TokenId,
    struck_kind: TokenKind,
    struck_destroyed: bool,
    final_target: bool,
) -> Effect {
    Effect::Hit(HitOutcome {
        shooter,
        bullet,
        struck,
        struck_kind,
        struck_destroyed,
        final_target,
    })
}

// =============================================================================
// EXECUTION RESULTS
// =============================================================================

/// What a bullet hit did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitOutcome {
    /// Player whose cannon fired the bullet
    pub shooter: PlayerId,
    /// The bullet (always destroyed)
    pub bullet: TokenId,
    /// What it hit
    pub struck: TokenId,
    /// Kind of what it hit
    pub struck_kind: TokenKind,
    /// Whether the struck token was destroyed
    pub struck_destroyed: bool,
    /// Whether the struck token is the final target
    pub final_target: bool,
}

/// Message-specific result of execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Nothing beyond token bookkeeping
    None,
    /// A player joined
    PlayerCreated {
        /// New player
        player: PlayerId,
        /// Controlling actor
        actor: ActorId,
    },
    /// The field was laid out
    GameStarted {
        /// Number of players in the match
        players: usize,
    },
    /// A bullet left a cannon
    BulletFired {
        /// New bullet
        bullet: TokenId,
        /// Cannon it left
        cannon: TokenId,
        /// Owner of the cannon
        shooter: PlayerId,
    },
    /// A bullet hit something
    Hit(HitOutcome),
    /// Field objects were overwritten
    WorldsSynced {
        /// Number of snapshots applied
        bodies: usize,
    },
    /// A winner was recorded
    GameEnded {
        /// Winning player
        winner: PlayerId,
    },
}

/// An accepted and executed message.
#[derive(Clone, Debug, PartialEq)]
pub struct Applied {
    /// Who proposed it
    pub sender: Sender,
    /// The message
    pub message: Message,
    /// Tokens created, in id order
    pub added: Vec<(TokenId, TokenKind)>,
    /// Tokens destroyed
    pub removed: Vec<(TokenId, TokenKind)>,
    /// What it did
    pub effect: Effect,
}

/// A refused message.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    /// Who proposed it
    pub sender: Sender,
    /// The message
    pub message: Message,
    /// Why
    pub error: MessageError,
}

/// Result of handling one message.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Validated and executed
    Accepted(Applied),
    /// Refused; the world is unchanged
    Rejected(Rejection),
}

// =============================================================================
// PROPOSAL -> CHECKED -> APPLIED
// =============================================================================

/// A message some sender wants applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Who proposed it
    pub sender: Sender,
    /// What they proposed
    pub message: Message,
}

impl Proposal {
    /// Create a proposal.
    pub fn new(sender: Sender, message: Message) -> Self {
        Self { sender, message }
    }

    /// Validate against the world. On success the returned [`Checked`]
    /// holds the world until it is executed.
    pub fn check(self, world: &mut World) -> Result<Checked<'_>, Rejection> {
        match self.message.validate(self.sender, world) {
            Ok(()) => Ok(Checked {
                world,
                sender: self.sender,
                message: self.message,
            }),
            Err(error) => Err(Rejection {
                sender: self.sender,
                message: self.message,
                error,
            }),
        }
    }
}

/// A validated message, ready to execute.
pub struct Checked<'w> {
    world: &'w mut World,
    sender: Sender,
    message: Message,
}

impl Checked<'_> {
    /// The message awaiting execution.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Register new tokens, apply, then unregister destroyed tokens.
    pub fn execute(self) -> Result<Applied, RegistryError> {
        let Checked { world, sender, message } = self;

        let kinds = message.tokens_to_add(world);
        let removed = message.tokens_to_remove(world);

        let ids = world.registry_mut().register_all(&kinds)?;
        let effect = message.apply(world, &ids);

        for (id, kind) in &removed {
            world.registry_mut().unregister(*id, *kind)?;
            if world.holds(*id) {
                return Err(RegistryError::StillPresent(*id));
            }
        }
        if let Some(id) = ids.iter().find(|id| !world.holds(**id)) {
            return Err(RegistryError::Orphaned(*id));
        }

        Ok(Applied {
            sender,
            message,
            added: ids.into_iter().zip(kinds).collect(),
            removed,
            effect,
        })
    }
}

impl World {
    /// Check and, if accepted, execute one message.
    ///
    /// Rejection is an ordinary outcome. `Err` means the identity table is
    /// corrupt and the world must not be used further.
    pub fn handle(&mut self, sender: Sender, message: Message) -> Result<Outcome, RegistryError> {
        match Proposal::new(sender, message).check(self) {
            Ok(checked) => checked.execute().map(Outcome::Accepted),
            Err(rejection) => Ok(Outcome::Rejected(rejection)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;

    const P1: Sender = Sender::Actor(ActorId(1));
    const P2: Sender = Sender::Actor(ActorId(2));

    fn accept(world: &mut World, sender: Sender, message: Message) -> Applied {
        match world.handle(sender, message).unwrap() {
            Outcome::Accepted(applied) => applied,
            Outcome::Rejected(r) => panic!("unexpected rejection: {}", r.error),
        }
    }

    fn reject(world: &mut World, sender: Sender, message: Message) -> MessageError {
        match world.handle(sender, message).unwrap() {
            Outcome::Rejected(r) => r.error,
            Outcome::Accepted(a) => panic!("unexpected acceptance: {:?}", a.effect),
        }
    }

    fn join(world: &mut World, actor: u32) -> PlayerId {
        let applied = accept(
            world,
            Sender::Actor(ActorId(actor)),
            Message::CreatePlayer { actor: ActorId(actor), name: format!("p{actor}") },
        );
        applied.added[0].0
    }

    /// Two players; ids 1..=11 laid out as
    /// p1, p2, cannon 3, targets 4 5, cannon 6, targets 7 8, final 9, obstacles 10 11.
    fn started_world() -> World {
        let mut world = World::new(GameConfig::default());
        join(&mut world, 1);
        join(&mut world, 2);
        accept(&mut world, Sender::Referee, Message::StartGame);
        world
    }

    fn fire(world: &mut World, sender: Sender, cannon: u64) -> TokenId {
        let applied = accept(
            world,
            sender,
            Message::ShootBullet { cannon: TokenId(cannon), aim: Vec2::UP },
        );
        applied.added[0].0
    }

    fn move_onto(world: &mut World, bullet: TokenId, target: TokenId) {
        let position = world.field_object(target).unwrap().body.position;
        accept(
            world,
            Sender::Referee,
            Message::SyncWorlds {
                bodies: vec![BodySnapshot { id: bullet, position, velocity: Vec2::ZERO }],
            },
        );
    }

    fn assert_registry_matches(world: &World) {
        let held = world.players().len() + world.cannons().len() + world.field_objects().len();
        assert_eq!(world.registry().len(), held);
        for (id, _) in world.registry().iter() {
            assert!(world.holds(id));
        }
    }

    #[test]
    fn test_create_player() {
        let mut world = World::new(GameConfig::default());

        let err = reject(
            &mut world,
            P2,
            Message::CreatePlayer { actor: ActorId(1), name: "x".into() },
        );
        assert!(matches!(err, MessageError::Impersonation { .. }));

        let id = join(&mut world, 1);
        assert_eq!(id, TokenId(1));
        assert_eq!(world.player(id).unwrap().arsenal(), 10);

        let err = reject(
            &mut world,
            P1,
            Message::CreatePlayer { actor: ActorId(1), name: "again".into() },
        );
        assert_eq!(err, MessageError::PlayerAlreadyExists(ActorId(1)));
    }

    #[test]
    fn test_start_game_rules() {
        let mut world = World::new(GameConfig::default());
        assert_eq!(reject(&mut world, Sender::Referee, Message::StartGame), MessageError::NoPlayers);

        join(&mut world, 1);
        join(&mut world, 2);
        assert_eq!(
            reject(&mut world, P1, Message::StartGame),
            MessageError::RefereeOnly("StartGame")
        );

        let applied = accept(&mut world, Sender::Referee, Message::StartGame);
        assert_eq!(applied.added.len(), 9);
        assert_eq!(world.phase(), GamePhase::Playing);
        assert_eq!(world.cannons().len(), 2);
        assert_eq!(world.targets().count(), 5);
        assert_eq!(world.obstacles().count(), 2);
        assert_eq!(world.player(TokenId(1)).unwrap().targets, vec![TokenId(4), TokenId(5)]);
        assert_eq!(world.final_target().unwrap().id, TokenId(9));

        assert_eq!(
            reject(&mut world, Sender::Referee, Message::StartGame),
            MessageError::TargetsAlreadyExist
        );
        assert_eq!(
            reject(&mut world, Sender::Actor(ActorId(3)), Message::CreatePlayer { actor: ActorId(3), name: "late".into() }),
            MessageError::GameAlreadyStarted
        );
        assert_registry_matches(&world);
    }

    #[test]
    fn test_shoot_rules() {
        let mut world = started_world();

        let err = reject(&mut world, P2, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP });
        assert!(matches!(err, MessageError::NotYourCannon { .. }));

        let err = reject(&mut world, P1, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::ZERO });
        assert_eq!(err, MessageError::InvalidAim);

        let err = reject(&mut world, P1, Message::ShootBullet { cannon: TokenId(4), aim: Vec2::UP });
        assert_eq!(err, MessageError::UnknownToken(TokenId(4)));

        let bullet = fire(&mut world, P1, 3);
        let object = world.field_object(bullet).unwrap();
        assert_eq!(object.body.position, Vec2::new(200.0, 42.0));
        assert_eq!(object.body.velocity, Vec2::new(0.0, 300.0));
        assert_eq!(object.shooter(), Some(TokenId(1)));
    }

    #[test]
    fn test_arsenal_exhaustion() {
        let mut world = started_world();
        for _ in 0..10 {
            fire(&mut world, P1, 3);
        }
        assert_eq!(world.player(TokenId(1)).unwrap().arsenal(), 0);

        let err = reject(&mut world, P1, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP });
        assert_eq!(err, MessageError::InsufficientArsenal { available: 0, required: 1 });
        assert!(err.to_string().contains("too many bullets in play"));
        assert_eq!(world.bullets().count(), 10);
    }

    #[test]
    fn test_hit_own_target_destroys_it() {
        let mut world = started_world();
        let bullet = fire(&mut world, P1, 3);
        move_onto(&mut world, bullet, TokenId(4));

        let applied = accept(&mut world, Sender::Referee, Message::HitTarget { bullet, target: TokenId(4) });
        assert_eq!(applied.removed, vec![(bullet, TokenKind::Bullet), (TokenId(4), TokenKind::Target)]);
        assert!(world.field_object(TokenId(4)).is_none());
        assert_eq!(world.player(TokenId(1)).unwrap().targets, vec![TokenId(5)]);
        assert_registry_matches(&world);
    }

    #[test]
    fn test_hit_foreign_target_only_consumes_bullet() {
        let mut world = started_world();
        let bullet = fire(&mut world, P1, 3);
        move_onto(&mut world, bullet, TokenId(7));

        let applied = accept(&mut world, Sender::Referee, Message::HitTarget { bullet, target: TokenId(7) });
        assert_eq!(applied.removed, vec![(bullet, TokenKind::Bullet)]);
        assert!(world.field_object(TokenId(7)).is_some());
        assert!(world.field_object(bullet).is_none());
    }

    #[test]
    fn test_final_target_requires_own_targets_cleared() {
        let mut world = started_world();

        let early = fire(&mut world, P1, 3);
        move_onto(&mut world, early, TokenId(9));
        let applied = accept(&mut world, Sender::Referee, Message::HitTarget { bullet: early, target: TokenId(9) });
        assert!(matches!(applied.effect, Effect::Hit(HitOutcome { struck_destroyed: false, final_target: true, .. })));
        assert!(world.final_target().is_some());

        for target in [4, 5] {
            let bullet = fire(&mut world, P1, 3);
            move_onto(&mut world, bullet, TokenId(target));
            accept(&mut world, Sender::Referee, Message::HitTarget { bullet, target: TokenId(target) });
        }
        assert!(!world.player(TokenId(1)).unwrap().has_remaining_targets());

        let last = fire(&mut world, P1, 3);
        move_onto(&mut world, last, TokenId(9));
        let applied = accept(&mut world, Sender::Referee, Message::HitTarget { bullet: last, target: TokenId(9) });
        assert_eq!(
            applied.effect,
            Effect::Hit(HitOutcome {
                shooter: TokenId(1),
                bullet: last,
                struck: TokenId(9),
                struck_kind: TokenKind::Target,
                struck_destroyed: true,
                final_target: true,
            })
        );
        assert!(world.final_target().is_none());
        assert_registry_matches(&world);
    }

    #[test]
    fn test_hit_requires_contact() {
        let mut world = started_world();
        let bullet = fire(&mut world, P1, 3);

        let err = reject(&mut world, Sender::Referee, Message::HitObstacle { bullet, obstacle: TokenId(10) });
        assert_eq!(err, MessageError::BulletMissed { bullet, other: TokenId(10) });

        let err = reject(&mut world, Sender::Referee, Message::HitObstacle { bullet, obstacle: TokenId(9) });
        assert!(matches!(err, MessageError::WrongKind { expected: TokenKind::Obstacle, .. }));
    }

    #[test]
    fn test_hit_bullet_destroys_both() {
        let mut world = started_world();
        let a = fire(&mut world, P1, 3);
        let b = fire(&mut world, P2, 6);
        move_onto(&mut world, a, b);

        let applied = accept(&mut world, Sender::Referee, Message::HitBullet { bullet: a, other: b });
        assert_eq!(applied.removed.len(), 2);
        assert_eq!(world.bullets().count(), 0);
        assert_registry_matches(&world);
    }

    #[test]
    fn test_hit_obstacle_keeps_obstacle() {
        let mut world = started_world();
        let bullet = fire(&mut world, P2, 6);
        move_onto(&mut world, bullet, TokenId(11));

        accept(&mut world, Sender::Referee, Message::HitObstacle { bullet, obstacle: TokenId(11) });
        assert!(world.field_object(TokenId(11)).is_some());
        assert!(world.field_object(bullet).is_none());
    }

    #[test]
    fn test_sync_worlds_rules() {
        let mut world = started_world();
        let snapshot = BodySnapshot { id: TokenId(99), position: Vec2::ZERO, velocity: Vec2::ZERO };
        assert_eq!(
            reject(&mut world, Sender::Referee, Message::SyncWorlds { bodies: vec![snapshot] }),
            MessageError::UnknownToken(TokenId(99))
        );
        assert_eq!(
            reject(&mut world, P1, Message::SyncWorlds { bodies: Vec::new() }),
            MessageError::RefereeOnly("SyncWorlds")
        );

        let snapshot = BodySnapshot { id: TokenId(10), position: Vec2::new(5.0, 5.0), velocity: Vec2::RIGHT };
        accept(&mut world, Sender::Referee, Message::SyncWorlds { bodies: vec![snapshot] });
        let body = &world.field_object(TokenId(10)).unwrap().body;
        assert_eq!(body.position, Vec2::new(5.0, 5.0));
        assert_eq!(body.velocity, Vec2::RIGHT);
    }

    #[test]
    fn test_end_game_closes_play() {
        let mut world = started_world();
        assert_eq!(
            reject(&mut world, P1, Message::EndGame { winner: TokenId(1) }),
            MessageError::RefereeOnly("EndGame")
        );
        assert!(!world.is_over());

        assert_eq!(
            reject(&mut world, Sender::Referee, Message::EndGame { winner: TokenId(42) }),
            MessageError::UnknownPlayer(TokenId(42))
        );

        accept(&mut world, Sender::Referee, Message::EndGame { winner: TokenId(2) });
        assert_eq!(world.winner(), Some(TokenId(2)));
        assert!(world.is_over());

        assert_eq!(
            reject(&mut world, Sender::Referee, Message::EndGame { winner: TokenId(1) }),
            MessageError::GameAlreadyOver
        );
        assert_eq!(
            reject(&mut world, P1, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP }),
            MessageError::GameAlreadyOver
        );
    }

    #[test]
    fn test_rejection_leaves_world_untouched() {
        let mut world = started_world();
        let before = world.compute_hash();
        reject(&mut world, P2, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::UP });
        reject(&mut world, Sender::Referee, Message::StartGame);
        assert_eq!(world.compute_hash(), before);
    }

    #[test]
    fn test_checked_message_executes_once() {
        let mut world = started_world();
        let checked = Proposal::new(P1, Message::ShootBullet { cannon: TokenId(3), aim: Vec2::RIGHT })
            .check(&mut world)
            .unwrap();
        assert_eq!(checked.message().name(), "ShootBullet");
        let applied = checked.execute().unwrap();
        assert_eq!(applied.added, vec![(TokenId(12), TokenKind::Bullet)]);
    }
}
