//! World State Definitions
//!
//! Players, cannons, field objects and the world that owns them.
//! Uses BTreeMap for deterministic iteration order.
//!
//! Everything here is readable from outside the crate, but mutation is
//! `pub(crate)`: the only paths that change a world are message execution
//! and the physics tick.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::core::vec2::Vec2;
use crate::game::body::Body;
use crate::game::config::GameConfig;
use crate::game::message::Message;
use crate::game::token::{ActorId, PlayerId, TokenId, TokenKind, TokenRegistry};

// =============================================================================
// PLAYER
// =============================================================================

/// A participant in the match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Token id
    pub id: PlayerId,
    /// Actor that controls this player
    pub actor: ActorId,
    /// Display name
    pub name: String,
    /// Cannons owned by this player
    pub cannons: Vec<TokenId>,
    /// Owned targets still standing
    pub targets: Vec<TokenId>,
    arsenal: u32,
    max_arsenal: u32,
    recharge_rate: f64,
    recharge_progress: f64,
}

impl Player {
    /// Create a player with a full arsenal.
    pub fn new(id: PlayerId, actor: ActorId, name: String, max_arsenal: u32, recharge_rate: f64) -> Self {
        Self {
            id,
            actor,
            name,
            cannons: Vec::new(),
            targets: Vec::new(),
            arsenal: max_arsenal,
            max_arsenal,
            recharge_rate,
            recharge_progress: 0.0,
        }
    }

    /// Current arsenal capacity.
    #[inline]
    pub fn arsenal(&self) -> u32 {
        self.arsenal
    }

    /// Arsenal ceiling.
    #[inline]
    pub fn max_arsenal(&self) -> u32 {
        self.max_arsenal
    }

    /// Fractional recharge carried towards the next whole unit.
    #[inline]
    pub fn recharge_progress(&self) -> f64 {
        self.recharge_progress
    }

    /// Can a bullet of this mass be fired right now?
    #[inline]
    pub fn can_afford(&self, mass: u32) -> bool {
        mass <= self.arsenal
    }

    /// Does the player still have owned targets to destroy?
    #[inline]
    pub fn has_remaining_targets(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Spend arsenal on a bullet. Callers check `can_afford` first;
    /// the subtraction saturates regardless.
    pub(crate) fn spend_arsenal(&mut self, mass: u32) {
        self.arsenal = self.arsenal.saturating_sub(mass);
    }

    /// Recharge proportionally to `dt`. Whole units are promoted from the
    /// fractional accumulator; a full arsenal holds no progress.
    pub(crate) fn recharge(&mut self, dt: f64) {
        if self.arsenal >= self.max_arsenal {
            self.arsenal = self.max_arsenal;
            self.recharge_progress = 0.0;
            return;
        }

        self.recharge_progress += self.recharge_rate * dt.max(0.0);
        let whole = self.recharge_progress.floor();
        if whole >= 1.0 {
            let room = (self.max_arsenal - self.arsenal) as f64;
            let gained = whole.min(room);
            self.arsenal += gained as u32;
            self.recharge_progress -= whole;
        }

        if self.arsenal >= self.max_arsenal {
            self.recharge_progress = 0.0;
        }
    }

    /// Drop a target from the active list.
    pub(crate) fn remove_target(&mut self, target: TokenId) {
        self.targets.retain(|t| *t != target);
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.id.0);
        hasher.update_u32(self.actor.0);
        hasher.update_u32(self.name.len() as u32);
        hasher.update_bytes(self.name.as_bytes());
        hasher.update_u32(self.arsenal);
        hasher.update_u32(self.max_arsenal);
        hasher.update_f64(self.recharge_progress);
        hasher.update_u32(self.cannons.len() as u32);
        for cannon in &self.cannons {
            hasher.update_u64(cannon.0);
        }
        hasher.update_u32(self.targets.len() as u32);
        for target in &self.targets {
            hasher.update_u64(target.0);
        }
    }
}

// =============================================================================
// CANNON
// =============================================================================

/// A player's launcher. Never changes owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cannon {
    /// Token id
    pub id: TokenId,
    /// Owning player
    pub owner: PlayerId,
    /// Fixed position on the field
    pub position: Vec2,
    /// Launch speed of fired bullets
    pub muzzle_speed: f64,
    /// Spawn distance of fired bullets from the cannon
    pub muzzle_offset: f64,
}

impl Cannon {
    /// Spawn position and velocity of a bullet fired along `aim`.
    ///
    /// Returns None for a zero or non-finite aim.
    pub fn muzzle(&self, aim: Vec2) -> Option<(Vec2, Vec2)> {
        if !aim.is_finite() {
            return None;
        }
        let direction = aim.try_normalize()?;
        Some((
            self.position + direction * self.muzzle_offset,
            direction * self.muzzle_speed,
        ))
    }
}

// =============================================================================
// FIELD OBJECTS
// =============================================================================

/// Kind-specific data of a field object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A fired projectile
    Bullet {
        /// Cannon that fired it
        cannon: TokenId,
        /// Player that owns that cannon
        shooter: PlayerId,
    },
    /// A target; `None` owner marks the final target
    Target {
        /// Player that must destroy it
        owner: Option<PlayerId>,
    },
    /// Neutral repulsive body
    Obstacle,
}

/// A bullet, target or obstacle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldObject {
    /// Token id
    pub id: TokenId,
    /// Kind-specific data
    pub kind: FieldKind,
    /// Physical state
    pub body: Body,
}

impl FieldObject {
    /// Token kind of this object.
    pub fn token_kind(&self) -> TokenKind {
        match self.kind {
            FieldKind::Bullet { .. } => TokenKind::Bullet,
            FieldKind::Target { .. } => TokenKind::Target,
            FieldKind::Obstacle => TokenKind::Obstacle,
        }
    }

    /// Is this a bullet?
    #[inline]
    pub fn is_bullet(&self) -> bool {
        matches!(self.kind, FieldKind::Bullet { .. })
    }

    /// Is this the ownerless final target?
    #[inline]
    pub fn is_final_target(&self) -> bool {
        matches!(self.kind, FieldKind::Target { owner: None })
    }

    /// Shooter, if this is a bullet.
    #[inline]
    pub fn shooter(&self) -> Option<PlayerId> {
        match self.kind {
            FieldKind::Bullet { shooter, .. } => Some(shooter),
            _ => None,
        }
    }

    /// The message this object asks for when a bullet touches it.
    pub fn on_hit_by_bullet(&self, bullet: TokenId) -> Message {
        match self.kind {
            FieldKind::Bullet { .. } => Message::HitBullet { bullet, other: self.id },
            FieldKind::Target { .. } => Message::HitTarget { bullet, target: self.id },
            FieldKind::Obstacle => Message::HitObstacle { bullet, obstacle: self.id },
        }
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.id.0);
        match self.kind {
            FieldKind::Bullet { cannon, shooter } => {
                hasher.update_u8(TokenKind::Bullet as u8);
                hasher.update_u64(cannon.0);
                hasher.update_u64(shooter.0);
            }
            FieldKind::Target { owner } => {
                hasher.update_u8(TokenKind::Target as u8);
                hasher.update_option_u64(owner.map(|o| o.0));
            }
            FieldKind::Obstacle => hasher.update_u8(TokenKind::Obstacle as u8),
        }
        hasher.update_vec2(self.body.position);
        hasher.update_vec2(self.body.velocity);
        hasher.update_f64(self.body.mass);
        hasher.update_f64(self.body.radius);
    }
}

// =============================================================================
// GAME PHASE
// =============================================================================

/// Current phase of the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum GamePhase {
    /// Players are joining
    #[default]
    Waiting,
    /// Active gameplay
    Playing,
    /// A winner has been recorded
    Ended,
}

// =============================================================================
// WORLD
// =============================================================================

/// Authoritative simulation state.
///
/// Serializable for inspection only; a world is built by messages, never
/// loaded.
#[derive(Clone, Debug, Serialize)]
pub struct World {
    config: GameConfig,
    phase: GamePhase,
    frame: u64,
    registry: TokenRegistry,
    players: BTreeMap<PlayerId, Player>,
    cannons: BTreeMap<TokenId, Cannon>,
    field_objects: BTreeMap<TokenId, FieldObject>,
    winner: Option<PlayerId>,
}

impl World {
    /// Create an empty world.
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            phase: GamePhase::Waiting,
            frame: 0,
            registry: TokenRegistry::new(),
            players: BTreeMap::new(),
            cannons: BTreeMap::new(),
            field_objects: BTreeMap::new(),
            winner: None,
        }
    }

    /// Simulation configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Frames advanced since creation.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Identity table.
    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// All players by id.
    pub fn players(&self) -> &BTreeMap<PlayerId, Player> {
        &self.players
    }

    /// A player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// The player controlled by an actor.
    pub fn player_for_actor(&self, actor: ActorId) -> Option<&Player> {
        self.players.values().find(|p| p.actor == actor)
    }

    /// All cannons by id.
    pub fn cannons(&self) -> &BTreeMap<TokenId, Cannon> {
        &self.cannons
    }

    /// A cannon by id.
    pub fn cannon(&self, id: TokenId) -> Option<&Cannon> {
        self.cannons.get(&id)
    }

    /// All bullets, targets and obstacles by id.
    pub fn field_objects(&self) -> &BTreeMap<TokenId, FieldObject> {
        &self.field_objects
    }

    /// A field object by id.
    pub fn field_object(&self, id: TokenId) -> Option<&FieldObject> {
        self.field_objects.get(&id)
    }

    /// Bullets in id order.
    pub fn bullets(&self) -> impl Iterator<Item = &FieldObject> + '_ {
        self.field_objects.values().filter(|o| o.is_bullet())
    }

    /// Targets (owned and final) in id order.
    pub fn targets(&self) -> impl Iterator<Item = &FieldObject> + '_ {
        self.field_objects
            .values()
            .filter(|o| matches!(o.kind, FieldKind::Target { .. }))
    }

    /// Obstacles in id order.
    pub fn obstacles(&self) -> impl Iterator<Item = &FieldObject> + '_ {
        self.field_objects
            .values()
            .filter(|o| matches!(o.kind, FieldKind::Obstacle))
    }

    /// The ownerless final target, while it stands.
    pub fn final_target(&self) -> Option<&FieldObject> {
        self.field_objects.values().find(|o| o.is_final_target())
    }

    /// Winner, once the game has ended.
    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// Has the game ended?
    pub fn is_over(&self) -> bool {
        matches!(self.phase, GamePhase::Ended)
    }

    /// Does the world hold a token with this id in any collection?
    pub fn holds(&self, id: TokenId) -> bool {
        self.players.contains_key(&id)
            || self.cannons.contains_key(&id)
            || self.field_objects.contains_key(&id)
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.frame, |hasher| {
            hasher.update_u8(self.phase as u8);
            hasher.update_option_u64(self.winner.map(|w| w.0));
            hasher.update_u64(self.registry.peek_next_id().0);

            for player in self.players.values() {
                player.hash_into(hasher);
            }

            for cannon in self.cannons.values() {
                hasher.update_u64(cannon.id.0);
                hasher.update_u64(cannon.owner.0);
                hasher.update_vec2(cannon.position);
            }

            for object in self.field_objects.values() {
                object.hash_into(hasher);
            }
        })
    }

    // -------------------------------------------------------------------------
    // Crate-internal mutation
    // -------------------------------------------------------------------------

    pub(crate) fn registry_mut(&mut self) -> &mut TokenRegistry {
        &mut self.registry
    }

    pub(crate) fn set_phase(&mut self, phase: GamePhase) {
        self.phase = phase;
    }

    pub(crate) fn advance_frame(&mut self) {
        self.frame += 1;
    }

    pub(crate) fn set_winner(&mut self, winner: PlayerId) {
        self.winner = Some(winner);
        self.phase = GamePhase::Ended;
    }

    pub(crate) fn insert_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> + '_ {
        self.players.values_mut()
    }

    pub(crate) fn insert_cannon(&mut self, cannon: Cannon) {
        self.cannons.insert(cannon.id, cannon);
    }

    pub(crate) fn insert_field_object(&mut self, object: FieldObject) {
        self.field_objects.insert(object.id, object);
    }

    pub(crate) fn remove_field_object(&mut self, id: TokenId) -> Option<FieldObject> {
        self.field_objects.remove(&id)
    }

    pub(crate) fn field_object_mut(&mut self, id: TokenId) -> Option<&mut FieldObject> {
        self.field_objects.get_mut(&id)
    }

    pub(crate) fn field_objects_mut(&mut self) -> &mut BTreeMap<TokenId, FieldObject> {
        &mut self.field_objects
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn player(max: u32, rate: f64) -> Player {
        Player::new(TokenId(1), ActorId(1), "p".into(), max, rate)
    }

    #[test]
    fn test_world_dump_is_json() {
        let world = World::new(GameConfig::default());
        let json = serde_json::to_value(&world).unwrap();
        assert_eq!(json["frame"], 0);
        assert_eq!(json["phase"], "Waiting");
        assert!(json["players"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_player_starts_full() {
        let p = player(10, 1.0);
        assert_eq!(p.arsenal(), 10);
        assert!(p.can_afford(10));
        assert!(!p.can_afford(11));
    }

    #[test]
    fn test_recharge_promotes_whole_units() {
        let mut p = player(10, 2.0);
        p.spend_arsenal(5);
        assert_eq!(p.arsenal(), 5);

        p.recharge(0.25);
        assert_eq!(p.arsenal(), 5);
        assert!((p.recharge_progress() - 0.5).abs() < 1e-12);

        p.recharge(0.25);
        assert_eq!(p.arsenal(), 6);
        assert!(p.recharge_progress().abs() < 1e-12);

        p.recharge(100.0);
        assert_eq!(p.arsenal(), 10);
        assert_eq!(p.recharge_progress(), 0.0);
    }

    #[test]
    fn test_full_arsenal_holds_no_progress() {
        let mut p = player(3, 5.0);
        p.recharge(0.1);
        assert_eq!(p.arsenal(), 3);
        assert_eq!(p.recharge_progress(), 0.0);
    }

    #[test]
    fn test_cannon_muzzle() {
        let cannon = Cannon {
            id: TokenId(2),
            owner: TokenId(1),
            position: Vec2::new(10.0, 0.0),
            muzzle_speed: 100.0,
            muzzle_offset: 5.0,
        };
        let (pos, vel) = cannon.muzzle(Vec2::new(0.0, 3.0)).unwrap();
        assert_eq!(pos, Vec2::new(10.0, 5.0));
        assert_eq!(vel, Vec2::new(0.0, 100.0));

        assert!(cannon.muzzle(Vec2::ZERO).is_none());
        assert!(cannon.muzzle(Vec2::new(f64::NAN, 1.0)).is_none());
    }

    #[test]
    fn test_hit_message_matches_kind() {
        let body = Body::new(Vec2::ZERO, Vec2::ZERO, 1.0, 1.0);
        let target = FieldObject {
            id: TokenId(5),
            kind: FieldKind::Target { owner: None },
            body: body.clone(),
        };
        assert!(target.is_final_target());
        assert_eq!(
            target.on_hit_by_bullet(TokenId(9)),
            Message::HitTarget { bullet: TokenId(9), target: TokenId(5) }
        );

        let obstacle = FieldObject {
            id: TokenId(6),
            kind: FieldKind::Obstacle,
            body,
        };
        assert_eq!(
            obstacle.on_hit_by_bullet(TokenId(9)),
            Message::HitObstacle { bullet: TokenId(9), obstacle: TokenId(6) }
        );
    }

    #[test]
    fn test_empty_world_hash_is_stable() {
        let a = World::new(GameConfig::default());
        let b = World::new(GameConfig::default());
        assert_eq!(a.compute_hash(), b.compute_hash());

        let mut c = World::new(GameConfig::default());
        c.advance_frame();
        assert_ne!(a.compute_hash(), c.compute_hash());
    }

    #[derive(Debug, Clone)]
    enum ArsenalOp {
        Spend(u32),
        Recharge(f64),
    }

    fn arsenal_op() -> impl Strategy<Value = ArsenalOp> {
        prop_oneof![
            (0u32..15).prop_map(ArsenalOp::Spend),
            (0.0f64..3.0).prop_map(ArsenalOp::Recharge),
        ]
    }

    proptest! {
        #[test]
        fn prop_arsenal_stays_in_bounds(
            max in 1u32..20,
            rate in 0.0f64..10.0,
            ops in proptest::collection::vec(arsenal_op(), 0..64),
        ) {
            let mut p = player(max, rate);
            for op in ops {
                match op {
                    ArsenalOp::Spend(mass) => {
                        if p.can_afford(mass) {
                            let before = p.arsenal();
                            p.spend_arsenal(mass);
                            prop_assert_eq!(p.arsenal(), before - mass);
                        }
                    }
                    ArsenalOp::Recharge(dt) => p.recharge(dt),
                }
                prop_assert!(p.arsenal() <= p.max_arsenal());
                prop_assert!(p.recharge_progress() >= 0.0 && p.recharge_progress() < 1.0);
            }
        }
    }
}
