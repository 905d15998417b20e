// Copyright 2025 the Aster Engine contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Velocity constraints resolved by sequential impulses.

use crate::math::{Vec3, KINDA_SMALL};
use crate::physics::body::BodyState;

/// A velocity-level constraint between two bodies.
///
/// `solve` returns the impulse to apply (positively to body B, negatively to
/// body A) and accumulates its multiplier into the caller-owned lambda slot.
pub trait Constraint {
    /// Computes the impulse for the current body states, updating the
    /// accumulated lambda in place.
    fn solve(&self, body_a: &BodyState, body_b: &BodyState, accumulated_lambda: &mut f32) -> Vec3;

    /// Sets the contact data this constraint acts on. `penetration` is the
    /// overlap depth along the contact normal; separated contacts pass `0`.
    fn set_contact(&mut self, point: Vec3, normal: Vec3, penetration: f32);

    /// The world-space point the impulse acts at. The solver derives each
    /// body's lever arm from it.
    fn contact_point(&self) -> Vec3;
}

/// Relative velocity of body B with respect to body A at a world-space
/// contact point, including the rotational contribution at each body's lever
/// arm.
pub fn relative_contact_velocity(body_a: &BodyState, body_b: &BodyState, point: Vec3) -> Vec3 {
    let radius_a = point - body_a.position;
    let radius_b = point - body_b.position;

    let vel_a = body_a.linear_velocity + body_a.angular_velocity.cross(radius_a);
    let vel_b = body_b.linear_velocity + body_b.angular_velocity.cross(radius_b);

    vel_b - vel_a
}

/// A velocity constraint along a fixed direction, reusable for contacts and
/// motor-like constraints.
#[derive(Debug, Clone)]
pub struct VelocityConstraint {
    direction: Vec3,
    desired_speed: f32,
    bias: f32,
    min_lambda: f32,
    contact_point: Vec3,
    contact_normal: Vec3,
    position_error: f32,
}

impl VelocityConstraint {
    /// Creates a constraint driving the relative velocity along `direction`
    /// toward `desired_speed`, with the accumulated multiplier bounded below
    /// by `min_lambda` (use `0.0` for non-sticky contacts, `f32::MIN` for an
    /// unbounded bilateral constraint).
    pub fn new(direction: Vec3, desired_speed: f32, min_lambda: f32) -> Self {
        Self {
            direction,
            desired_speed,
            bias: 0.0,
            min_lambda,
            contact_point: Vec3::ZERO,
            contact_normal: Vec3::ZERO,
            position_error: 0.0,
        }
    }

    /// Sets the Baumgarte position-correction coefficient.
    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    /// Builder-style variant of [`set_bias`](Self::set_bias).
    pub fn with_bias(mut self, bias: f32) -> Self {
        self.bias = bias;
        self
    }

    /// The contact normal recorded by the last
    /// [`set_contact`](Constraint::set_contact) call.
    pub fn contact_normal(&self) -> Vec3 {
        self.contact_normal
    }

    /// Effective mass seen by this constraint: the sum of both inverse masses
    /// plus the angular terms `(r x d) . I^-1 (r x d)` at each body.
    fn effective_mass(&self, body_a: &BodyState, body_b: &BodyState) -> f32 {
        let radius_a = self.contact_point - body_a.position;
        let radius_b = self.contact_point - body_b.position;

        let cross_a = radius_a.cross(self.direction);
        let cross_b = radius_b.cross(self.direction);

        let angular_a = cross_a.dot(body_a.inverse_inertia_world() * cross_a);
        let angular_b = cross_b.dot(body_b.inverse_inertia_world() * cross_b);

        body_a.inverse_mass + body_b.inverse_mass + angular_a + angular_b
    }
}

impl Constraint for VelocityConstraint {
    fn solve(&self, body_a: &BodyState, body_b: &BodyState, accumulated_lambda: &mut f32) -> Vec3 {
        let relative = relative_contact_velocity(body_a, body_b, self.contact_point);
        let projected_speed = relative.dot(self.direction);

        let velocity_error = projected_speed - self.desired_speed;
        let position_correction = self.bias * self.position_error;

        let effective_mass = self.effective_mass(body_a, body_b);
        if effective_mass < KINDA_SMALL {
            // Both bodies are immovable along this direction; no impulse can
            // change anything.
            return Vec3::ZERO;
        }

        let delta_lambda = -(velocity_error + position_correction) / effective_mass;

        let old_lambda = *accumulated_lambda;
        let new_lambda = (old_lambda + delta_lambda).max(self.min_lambda);
        *accumulated_lambda = new_lambda;

        self.direction * (new_lambda - old_lambda)
    }

    fn set_contact(&mut self, point: Vec3, normal: Vec3, penetration: f32) {
        self.contact_point = point;
        self.contact_normal = normal;
        // Stored as signed separation: penetrating contacts carry a negative
        // position error, which the bias turns into a separating impulse.
        self.position_error = -penetration;
    }

    fn contact_point(&self) -> Vec3 {
        self.contact_point
    }
}
