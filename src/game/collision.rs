//! Collision Detection
//!
//! Deterministic contact detection between field objects. Pairs are visited
//! in ascending id order, so two worlds in the same state report the same
//! contacts in the same order.

use std::collections::BTreeSet;

use crate::core::vec2::Vec2;
use crate::game::message::Message;
use crate::game::state::FieldObject;
use crate::game::token::TokenId;

/// Check if two circles overlap.
///
/// Strict: circles whose edges exactly meet are not touching. This is the
/// only contact predicate in the simulation.
#[inline]
pub fn circles_overlap(pos_a: Vec2, radius_a: f64, pos_b: Vec2, radius_b: f64) -> bool {
    let reach = radius_a + radius_b;
    pos_a.distance_squared(pos_b) < reach * reach
}

/// Find the hit reports for this tick.
///
/// Each bullet, in id order, claims the first object it touches (also in id
/// order) and asks that object which hit message to send. A bullet claimed
/// by an earlier bullet-bullet contact is skipped, so each bullet appears in
/// at most one report.
pub fn find_bullet_hits(objects: &[&FieldObject]) -> Vec<Message> {
    let mut hits = Vec::new();
    let mut claimed: BTreeSet<TokenId> = BTreeSet::new();

    for bullet in objects.iter().filter(|o| o.is_bullet()) {
        if claimed.contains(&bullet.id) {
            continue;
        }

        let struck = objects.iter().find(|other| {
            other.id != bullet.id
                && !claimed.contains(&other.id)
                && bullet.body.is_touching(&other.body)
        });

        if let Some(other) = struck {
            claimed.insert(bullet.id);
            if other.is_bullet() {
                claimed.insert(other.id);
            }
            hits.push(other.on_hit_by_bullet(bullet.id));
        }
    }

    hits
}

/// Index pairs `(i, j)`, `i < j`, of non-bullet objects that touch and are
/// closing on each other.
pub fn find_bounce_pairs(objects: &[&FieldObject]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();

    for i in 0..objects.len() {
        if objects[i].is_bullet() {
            continue;
        }
        for j in (i + 1)..objects.len() {
            if objects[j].is_bullet() {
                continue;
            }
            let (a, b) = (&objects[i].body, &objects[j].body);
            if a.is_touching(b) && a.is_approaching(b) {
                pairs.push((i, j));
            }
        }
    }

    pairs
}
