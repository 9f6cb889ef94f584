//! Authoritative Simulation Tick
//!
//! One physics step of the world. Must be 100% deterministic: every pass
//! walks field objects in ascending id order, and the same world ticked with
//! the same `dt` produces bit-identical state.
//!
//! The tick never destroys anything. Bullet contacts become hit messages in
//! the [`TickReport`]; they change the world only once the referee has
//! checked and executed them.

use crate::core::vec2::Vec2;
use crate::game::collision::{find_bounce_pairs, find_bullet_hits};
use crate::game::message::Message;
use crate::game::state::{FieldObject, GamePhase, World};

/// Result of a tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Hit messages for the referee, in detection order
    pub hits: Vec<Message>,
    /// Elastic bounces resolved between non-bullet objects
    pub bounces: u32,
    /// Objects whose velocity was reflected by a wall
    pub wall_bounces: u32,
}

/// Run one simulation tick.
///
/// Does nothing unless the game is being played. In order:
///
/// 1. recharge every arsenal
/// 2. accumulate inverse-square forces between non-touching pairs
/// 3. integrate, reflect off walls, commit
/// 4. report bullet contacts
/// 5. bounce touching, approaching non-bullet pairs
pub fn tick(world: &mut World, dt: f64) -> TickReport {
    let mut report = TickReport::default();
    if world.phase() != GamePhase::Playing {
        return report;
    }

    // 1. Arsenals
    for player in world.players_mut() {
        player.recharge(dt);
    }

    let gravity = world.config().gravity_constant;
    let field = world.config().field;
    let objects = world.field_objects_mut();

    // 2. Forces
    let accelerations = pairwise_accelerations(objects.values(), gravity);
    for (object, acceleration) in objects.values_mut().zip(accelerations) {
        object.body.add_next_acceleration(acceleration);
    }

    // 3. Motion
    for object in objects.values_mut() {
        object.body.calculate_motion(dt);
        if object.body.check_wall_bounce(&field) {
            report.wall_bounces += 1;
        }
        object.body.commit_motion();
    }

    // 4. Bullet contacts
    let snapshot: Vec<&FieldObject> = objects.values().collect();
    report.hits = find_bullet_hits(&snapshot);
    let pairs = find_bounce_pairs(&snapshot);

    // 5. Bounces
    let mut bodies: Vec<&mut FieldObject> = objects.values_mut().collect();
    for (i, j) in pairs {
        let (left, right) = bodies.split_at_mut(j);
        let (a, b) = (&mut left[i].body, &mut right[0].body);
        // An earlier bounce this tick may already have separated them.
        if a.is_approaching(b) {
            a.bounce(b);
            report.bounces += 1;
        }
    }

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(
        frame = world.frame(),
        hits = report.hits.len(),
        bounces = report.bounces,
        walls = report.wall_bounces,
        "Tick"
    );

    report
}

/// Gravity-like acceleration on each object from every other, in the
/// iteration order of `objects`.
///
/// Force magnitude is `G * m1 * m2 / r^2`; each side divides by the
/// magnitude of its own mass, so a negative product pushes both apart.
/// Touching pairs, massless objects and coincident centres exert nothing.
pub fn pairwise_accelerations<'a, I>(objects: I, gravity: f64) -> Vec<Vec2>
where
    I: IntoIterator<Item = &'a FieldObject>,
{
    let objects: Vec<&FieldObject> = objects.into_iter().collect();
    let mut accelerations = vec![Vec2::ZERO; objects.len()];

    for i in 0..objects.len() {
        for j in (i + 1)..objects.len() {
            let (a, b) = (&objects[i].body, &objects[j].body);
            if a.mass == 0.0 || b.mass == 0.0 || a.is_touching(b) {
                continue;
            }

            let offset = b.position - a.position;
            let distance_sq = offset.length_squared();
            let Some(direction) = offset.try_normalize() else {
                continue;
            };

            let force = gravity * a.mass * b.mass / distance_sq;
            accelerations[i] += direction * (force / a.mass.abs());
            accelerations[j] -= direction * (force / b.mass.abs());
        }
    }

    accelerations
}
