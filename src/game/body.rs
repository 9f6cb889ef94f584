//! Field Object Physics
//!
//! The physical half of every bullet, target and obstacle: a circle with a
//! signed mass. Motion is integrated in two steps so forces from every pair
//! can be accumulated before anything moves:
//!
//! 1. `add_next_acceleration` for each force contribution
//! 2. `calculate_motion(dt)` predicts `next_velocity` / `next_position`
//! 3. `commit_motion` makes the prediction current and clears accumulators

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::collision::circles_overlap;
use crate::game::config::FieldConfig;

/// Physical state of a field object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Committed position
    pub position: Vec2,
    /// Committed velocity
    pub velocity: Vec2,
    /// Signed mass (negative repels)
    pub mass: f64,
    /// Collision radius
    pub radius: f64,
    next_acceleration: Vec2,
    next_velocity: Vec2,
    next_position: Vec2,
}

impl Body {
    /// Create a body at rest-free state with empty accumulators.
    pub fn new(position: Vec2, velocity: Vec2, mass: f64, radius: f64) -> Self {
        Self {
            position,
            velocity,
            mass,
            radius,
            next_acceleration: Vec2::ZERO,
            next_velocity: velocity,
            next_position: position,
        }
    }

    /// Accumulate one acceleration contribution for this tick.
    #[inline]
    pub fn add_next_acceleration(&mut self, acceleration: Vec2) {
        self.next_acceleration += acceleration;
    }

    /// Acceleration accumulated so far this tick.
    #[inline]
    pub fn next_acceleration(&self) -> Vec2 {
        self.next_acceleration
    }

    /// Predicted velocity after `calculate_motion`.
    #[inline]
    pub fn next_velocity(&self) -> Vec2 {
        self.next_velocity
    }

    /// Predicted position after `calculate_motion`.
    #[inline]
    pub fn next_position(&self) -> Vec2 {
        self.next_position
    }

    /// Semi-implicit Euler step. Committed state is left untouched.
    pub fn calculate_motion(&mut self, dt: f64) {
        let dv = self.next_acceleration * dt;
        self.next_velocity = self.velocity + dv;
        self.next_position = self.position + self.next_velocity * dt;
    }

    /// Point the predicted velocity back into the field on every axis where
    /// the predicted position has left it. Position is not clamped.
    ///
    /// Returns true if any component was reflected.
    pub fn check_wall_bounce(&mut self, field: &FieldConfig) -> bool {
        let mut reflected = false;

        if self.next_position.x < 0.0 && self.next_velocity.x < 0.0 {
            self.next_velocity.x = -self.next_velocity.x;
            reflected = true;
        } else if self.next_position.x > field.width && self.next_velocity.x > 0.0 {
            self.next_velocity.x = -self.next_velocity.x;
            reflected = true;
        }

        if self.next_position.y < 0.0 && self.next_velocity.y < 0.0 {
            self.next_velocity.y = -self.next_velocity.y;
            reflected = true;
        } else if self.next_position.y > field.height && self.next_velocity.y > 0.0 {
            self.next_velocity.y = -self.next_velocity.y;
            reflected = true;
        }

        reflected
    }

    /// Make the predicted motion current and clear the accumulators.
    pub fn commit_motion(&mut self) {
        self.position = self.next_position;
        self.velocity = self.next_velocity;
        self.next_acceleration = Vec2::ZERO;
    }

    /// Overwrite committed state (used by world sync).
    pub fn set_state(&mut self, position: Vec2, velocity: Vec2) {
        self.position = position;
        self.velocity = velocity;
        self.next_position = position;
        self.next_velocity = velocity;
        self.next_acceleration = Vec2::ZERO;
    }

    /// Circles overlap: centre distance strictly less than the radius sum.
    #[inline]
    pub fn is_touching(&self, other: &Body) -> bool {
        circles_overlap(self.position, self.radius, other.position, other.radius)
    }

    /// Are the two bodies closing along the line between their centres?
    #[inline]
    pub fn is_approaching(&self, other: &Body) -> bool {
        let axis = other.position - self.position;
        (self.velocity - other.velocity).dot(axis) > 0.0
    }

    /// Elastic collision along the line between the centres.
    ///
    /// Only the velocity components along that line change; the orthogonal
    /// components are kept. Mass magnitudes are used, so a repulsive body
    /// bounces like an ordinary one. Coincident centres have no axis and
    /// leave both bodies unchanged.
    pub fn bounce(&mut self, other: &mut Body) {
        let Some(axis) = (other.position - self.position).try_normalize() else {
            return;
        };

        let m1 = self.mass.abs();
        let m2 = other.mass.abs();
        let total = m1 + m2;
        if total == 0.0 {
            return;
        }

        let u1 = self.velocity.dot(axis);
        let u2 = other.velocity.dot(axis);

        let v1 = ((m1 - m2) * u1 + 2.0 * m2 * u2) / total;
        let v2 = ((m2 - m1) * u2 + 2.0 * m1 * u1) / total;

        self.velocity += axis * (v1 - u1);
        other.velocity += axis * (v2 - u2);
        self.next_velocity = self.velocity;
        other.next_velocity = other.velocity;
    }
}

// =============================================================================
// TESTS
// =============================================================================
