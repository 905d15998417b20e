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

//! Collider components binding collision shapes to rigid bodies.

use std::cell::{Cell, RefCell};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use aster_core::math::{Transform, Vec3};
use aster_core::physics::{Boundable, BodyWeak, CollisionShape, ConvexShape};

/// Opaque handle to a registered collider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct ColliderId(pub u64);

/// A collision component: a convex shape attached to a rigid body.
///
/// Colliders are owned by the [`CollisionManager`](crate::CollisionManager);
/// the broad-phase tree tracks them through non-owning references. Destruction
/// is deferred: [`mark_destroyed`](Self::mark_destroyed) flags the component
/// and the manager reaps it during the next tick's cleanup step, never in the
/// middle of a solve.
pub struct Collider {
    id: ColliderId,
    shape: RefCell<CollisionShape>,
    body: BodyWeak,
    restitution: f32,
    destroyed: Cell<bool>,
    dirty: Cell<bool>,
    last_transform: Cell<Transform>,
}

impl Collider {
    pub(crate) fn new(
        id: ColliderId,
        shape: CollisionShape,
        body: BodyWeak,
        restitution: f32,
    ) -> Self {
        Self {
            id,
            shape: RefCell::new(shape),
            body,
            restitution,
            destroyed: Cell::new(false),
            dirty: Cell::new(false),
            last_transform: Cell::new(Transform::IDENTITY),
        }
    }

    /// The stable handle of this collider.
    #[inline]
    pub fn id(&self) -> ColliderId {
        self.id
    }

    /// A copy of the current collision shape.
    pub fn shape(&self) -> CollisionShape {
        *self.shape.borrow()
    }

    /// Resizes the shape and marks the bounds dirty so the broad phase refits
    /// the leaf on the next update.
    pub fn set_half_extent(&self, half_extent: Vec3) {
        self.shape.borrow_mut().set_half_extent(half_extent);
        self.dirty.set(true);
    }

    /// Restitution applied to contacts involving this collider.
    #[inline]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// The non-owning body reference this collider follows.
    pub fn body(&self) -> BodyWeak {
        self.body.clone()
    }

    /// Flags this collider for removal at the next cleanup step.
    pub fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }

    /// Whether the collider is awaiting removal, either explicitly flagged or
    /// because its body has expired.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get() || self.body.upgrade().is_none()
    }

    /// The collider's world transform, read from its body. While the body is
    /// gone the last observed transform is reported, so the cleanup step can
    /// still reason about the component.
    pub fn world_transform(&self) -> Transform {
        match self.body.upgrade() {
            Some(body) => {
                let body = body.borrow();
                let transform =
                    Transform::from_position_rotation(body.position(), body.rotation());
                self.last_transform.set(transform);
                transform
            }
            None => self.last_transform.get(),
        }
    }
}

impl Boundable for Collider {
    fn half_extent(&self) -> Vec3 {
        self.shape.borrow().half_extent()
    }

    fn transform(&self) -> Transform {
        self.world_transform()
    }

    fn bounds_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn clear_dirty(&self) {
        self.dirty.set(false);
    }
}

impl std::fmt::Debug for Collider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collider")
            .field("id", &self.id)
            .field("shape", &*self.shape.borrow())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use aster_core::math::Quaternion;
    use aster_core::physics::{BodyRef, RigidBody};
    use std::rc::Rc;

    struct FixedBody {
        position: Vec3,
    }

    impl RigidBody for FixedBody {
        fn mass(&self) -> f32 {
            1.0
        }
        fn inverse_mass(&self) -> f32 {
            1.0
        }
        fn position(&self) -> Vec3 {
            self.position
        }
        fn rotation(&self) -> Quaternion {
            Quaternion::IDENTITY
        }
        fn linear_velocity(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn angular_velocity(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn local_inertia(&self) -> Vec3 {
            Vec3::ONE
        }
        fn is_static(&self) -> bool {
            false
        }
        fn apply_linear_impulse(&mut self, _impulse: Vec3) {}
        fn apply_angular_impulse(&mut self, _impulse: Vec3) {}
    }

    #[test]
    fn follows_the_body_transform() {
        let body: BodyRef = Rc::new(RefCell::new(FixedBody {
            position: Vec3::new(3.0, 1.0, 0.0),
        }));
        let collider = Collider::new(
            ColliderId(1),
            CollisionShape::sphere(1.0),
            Rc::downgrade(&body),
            0.2,
        );

        assert_eq!(collider.transform().position, Vec3::new(3.0, 1.0, 0.0));
        assert!(!collider.is_destroyed());
    }

    #[test]
    fn expired_body_marks_collider_destroyed_and_keeps_last_transform() {
        let body: BodyRef = Rc::new(RefCell::new(FixedBody {
            position: Vec3::new(7.0, 0.0, 0.0),
        }));
        let collider = Collider::new(
            ColliderId(2),
            CollisionShape::sphere(1.0),
            Rc::downgrade(&body),
            0.2,
        );

        // Observe once so the transform is cached.
        assert_eq!(collider.world_transform().position.x, 7.0);

        drop(body);
        assert!(collider.is_destroyed());
        assert_eq!(collider.world_transform().position.x, 7.0);
    }

    #[test]
    fn resizing_marks_bounds_dirty() {
        let body: BodyRef = Rc::new(RefCell::new(FixedBody {
            position: Vec3::ZERO,
        }));
        let collider = Collider::new(
            ColliderId(3),
            CollisionShape::cuboid(Vec3::ONE),
            Rc::downgrade(&body),
            0.2,
        );

        assert!(!collider.bounds_dirty());
        collider.set_half_extent(Vec3::splat(2.0));
        assert!(collider.bounds_dirty());
        assert_eq!(collider.half_extent(), Vec3::splat(2.0));

        collider.clear_dirty();
        assert!(!collider.bounds_dirty());
    }
}
