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

//! The rigid-body contract consumed by the solver.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::math::{Mat3, Quaternion, Vec3, KINDA_SMALL};

/// Interface contract for rigid bodies the solver acts upon.
///
/// The physics core never owns bodies; the surrounding game state does. The
/// solver reads their kinematic state through this trait and writes back only
/// through the two impulse methods.
pub trait RigidBody {
    /// Mass of the body in kilograms.
    fn mass(&self) -> f32;
    /// Inverse mass; `0.0` for static bodies.
    fn inverse_mass(&self) -> f32;
    /// World-space position.
    fn position(&self) -> Vec3;
    /// World-space orientation.
    fn rotation(&self) -> Quaternion;
    /// Linear velocity.
    fn linear_velocity(&self) -> Vec3;
    /// Angular velocity (radians per second around each axis).
    fn angular_velocity(&self) -> Vec3;
    /// Diagonal of the local-space inertia tensor.
    fn local_inertia(&self) -> Vec3;
    /// Whether the body is immovable.
    fn is_static(&self) -> bool;
    /// Applies a linear impulse: `velocity += impulse * inverse_mass`.
    fn apply_linear_impulse(&mut self, impulse: Vec3);
    /// Applies an angular impulse: `angular_velocity += I_world^-1 * impulse`.
    fn apply_angular_impulse(&mut self, impulse: Vec3);
}

/// Shared owning handle to a rigid body.
pub type BodyRef = Rc<RefCell<dyn RigidBody>>;

/// Non-owning handle to a rigid body. An expired handle is treated as a
/// static body and skipped for updates.
pub type BodyWeak = Weak<RefCell<dyn RigidBody>>;

/// Rotates a local diagonal inertia tensor into world space and inverts it:
/// `R * diag(1/I) * R^T`.
///
/// Components at or below the geometric tolerance are treated as infinite
/// inertia and contribute a zero row, so static bodies produce the zero
/// matrix.
pub fn world_inverse_inertia(rotation: Quaternion, inertia_local: Vec3) -> Mat3 {
    let inv_diag = Vec3::new(
        if inertia_local.x > KINDA_SMALL {
            1.0 / inertia_local.x
        } else {
            0.0
        },
        if inertia_local.y > KINDA_SMALL {
            1.0 / inertia_local.y
        } else {
            0.0
        },
        if inertia_local.z > KINDA_SMALL {
            1.0 / inertia_local.z
        } else {
            0.0
        },
    );

    let rot = Mat3::from_quat(rotation);
    rot * Mat3::from_diagonal(inv_diag) * rot.transpose()
}

/// A snapshot of the physical state of a body relevant to impulse resolution.
#[derive(Debug, Clone, Copy)]
pub struct BodyState {
    /// Mass of the body.
    pub mass: f32,
    /// Inverse mass; `0.0` for static bodies.
    pub inverse_mass: f32,
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation.
    pub rotation: Quaternion,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
    /// Diagonal of the local-space inertia tensor.
    pub inertia_local: Vec3,
    /// Whether the body is immovable.
    pub is_static: bool,
}

impl BodyState {
    /// The sentinel state used for expired body references: immovable, with
    /// zero inverse mass, so constraints against it apply no impulse to it.
    pub const STATIC: Self = Self {
        mass: 0.0,
        inverse_mass: 0.0,
        position: Vec3::ZERO,
        rotation: Quaternion::IDENTITY,
        linear_velocity: Vec3::ZERO,
        angular_velocity: Vec3::ZERO,
        inertia_local: Vec3::ZERO,
        is_static: true,
    };

    /// Captures the current state of a body.
    pub fn capture(body: &dyn RigidBody) -> Self {
        Self {
            mass: body.mass(),
            inverse_mass: if body.is_static() {
                0.0
            } else {
                body.inverse_mass()
            },
            position: body.position(),
            rotation: body.rotation(),
            linear_velocity: body.linear_velocity(),
            angular_velocity: body.angular_velocity(),
            inertia_local: body.local_inertia(),
            is_static: body.is_static(),
        }
    }

    /// The world-space inverse inertia tensor of this state. Static bodies
    /// yield the zero matrix.
    pub fn inverse_inertia_world(&self) -> Mat3 {
        if self.is_static || self.inverse_mass <= 0.0 {
            return Mat3::ZERO;
        }
        world_inverse_inertia(self.rotation, self.inertia_local)
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, FRAC_PI_2};

    #[test]
    fn world_inertia_of_identity_rotation_is_diagonal() {
        let inv = world_inverse_inertia(Quaternion::IDENTITY, Vec3::new(2.0, 4.0, 8.0));
        let v = inv * Vec3::ONE;
        assert!(approx_eq(v.x, 0.5));
        assert!(approx_eq(v.y, 0.25));
        assert!(approx_eq(v.z, 0.125));
    }

    #[test]
    fn world_inertia_follows_rotation() {
        // Rotating the body 90 degrees around Z swaps the X and Y axes of the
        // tensor.
        let q = Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2);
        let inv = world_inverse_inertia(q, Vec3::new(2.0, 8.0, 1.0));
        let vx = inv * Vec3::X;
        assert!(approx_eq(vx.x, 0.125));

        let vy = inv * Vec3::Y;
        assert!(approx_eq(vy.y, 0.5));
    }

    #[test]
    fn zero_inertia_components_are_infinite() {
        let inv = world_inverse_inertia(Quaternion::IDENTITY, Vec3::ZERO);
        assert_eq!(inv * Vec3::ONE, Vec3::ZERO);
    }

    #[test]
    fn static_sentinel_has_no_response() {
        let s = BodyState::STATIC;
        assert_eq!(s.inverse_mass, 0.0);
        assert_eq!(s.inverse_inertia_world() * Vec3::ONE, Vec3::ZERO);
    }
}
