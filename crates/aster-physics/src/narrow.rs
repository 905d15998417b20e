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

//! Narrow-phase contact detection.
//!
//! The manager treats the detector as an injected collaborator; any
//! implementation of [`ContactDetector`] can replace [`DefaultDetector`].

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use aster_core::math::{Transform, Vec3};
use aster_core::physics::{CollisionShape, ConvexShape};

/// A single contact between two shapes. The normal points from the first
/// shape toward the second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Encode, Decode)]
pub struct Contact {
    /// World-space contact point.
    pub point: Vec3,
    /// Unit contact normal, from shape A to shape B.
    pub normal: Vec3,
    /// Overlap depth along the normal.
    pub penetration: f32,
    /// Whether the shapes actually touch.
    pub is_touching: bool,
}

impl Contact {
    /// Returns the contact with the normal flipped, describing the same
    /// contact from the other body's perspective.
    pub fn inverted(&self) -> Self {
        Self {
            normal: -self.normal,
            ..*self
        }
    }
}

/// Produces contacts for candidate pairs coming out of the broad phase.
pub trait ContactDetector {
    /// Detects a contact between two shapes. Returns `None` when the shapes
    /// are separated.
    fn detect(
        &self,
        shape_a: &CollisionShape,
        transform_a: &Transform,
        shape_b: &CollisionShape,
        transform_b: &Transform,
    ) -> Option<Contact>;
}

/// Analytic detector for sphere and box shapes.
///
/// Sphere-sphere and sphere-box are exact. Box-box falls back to sampling
/// the support functions along the center axis, which is exact for
/// face-to-face contact and approximate for edge cases; transforms are
/// assumed to carry unit scale.
#[derive(Debug, Default)]
pub struct DefaultDetector;

impl DefaultDetector {
    /// Creates a new detector.
    pub fn new() -> Self {
        Self
    }

    fn sphere_sphere(
        radius_a: f32,
        transform_a: &Transform,
        radius_b: f32,
        transform_b: &Transform,
    ) -> Option<Contact> {
        let delta = transform_b.position - transform_a.position;
        let dist_sq = delta.length_squared();
        let total_radius = radius_a + radius_b;
        if dist_sq >= total_radius * total_radius {
            return None;
        }

        let dist = dist_sq.sqrt();
        let normal = if dist > 1e-4 { delta / dist } else { Vec3::Y };
        Some(Contact {
            point: transform_a.position + normal * radius_a,
            normal,
            penetration: total_radius - dist,
            is_touching: true,
        })
    }

    fn sphere_box(
        radius: f32,
        sphere_transform: &Transform,
        half_extent: Vec3,
        box_transform: &Transform,
    ) -> Option<Contact> {
        // Sphere center in the box's local frame.
        let to_center = sphere_transform.position - box_transform.position;
        let local_center = box_transform.rotation.conjugate().rotate_vec3(to_center);

        let closest = Vec3::new(
            local_center.x.clamp(-half_extent.x, half_extent.x),
            local_center.y.clamp(-half_extent.y, half_extent.y),
            local_center.z.clamp(-half_extent.z, half_extent.z),
        );

        let delta = local_center - closest;
        let dist_sq = delta.length_squared();
        if dist_sq >= radius * radius {
            return None;
        }

        let dist = dist_sq.sqrt();
        let local_normal = if dist > 1e-4 { delta / dist } else { Vec3::Y };
        // Normal from the sphere toward the box surface.
        let normal = box_transform.rotation.rotate_vec3(-local_normal);
        Some(Contact {
            point: box_transform.transform_point(closest),
            normal,
            penetration: radius - dist,
            is_touching: true,
        })
    }

    fn box_box(
        shape_a: &CollisionShape,
        transform_a: &Transform,
        shape_b: &CollisionShape,
        transform_b: &Transform,
    ) -> Option<Contact> {
        let delta = transform_b.position - transform_a.position;
        let axis = delta.normalize();
        let axis = if axis == Vec3::ZERO { Vec3::Y } else { axis };

        // Overlap of the support extents along the center axis.
        let farthest_a = shape_a.support_point(axis, transform_a);
        let farthest_b = shape_b.support_point(-axis, transform_b);
        let penetration = (farthest_a - farthest_b).dot(axis);
        if penetration <= 0.0 {
            return None;
        }

        Some(Contact {
            point: (farthest_a + farthest_b) * 0.5,
            normal: axis,
            penetration,
            is_touching: true,
        })
    }
}

impl ContactDetector for DefaultDetector {
    fn detect(
        &self,
        shape_a: &CollisionShape,
        transform_a: &Transform,
        shape_b: &CollisionShape,
        transform_b: &Transform,
    ) -> Option<Contact> {
        match (shape_a, shape_b) {
            (CollisionShape::Sphere { radius: ra }, CollisionShape::Sphere { radius: rb }) => {
                Self::sphere_sphere(*ra, transform_a, *rb, transform_b)
            }
            (CollisionShape::Sphere { radius }, CollisionShape::Box { half_extent }) => {
                Self::sphere_box(*radius, transform_a, *half_extent, transform_b)
            }
            // Mirror sphere-box for box-sphere.
            (CollisionShape::Box { .. }, CollisionShape::Sphere { .. }) => self
                .detect(shape_b, transform_b, shape_a, transform_a)
                .map(|contact| contact.inverted()),
            (CollisionShape::Box { .. }, CollisionShape::Box { .. }) => {
                Self::box_box(shape_a, transform_a, shape_b, transform_b)
            }
        }
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use aster_core::math::approx_eq;

    #[test]
    fn sphere_sphere_overlap() {
        let detector = DefaultDetector::new();
        let a = CollisionShape::sphere(1.0);
        let b = CollisionShape::sphere(1.0);
        let ta = Transform::from_position(Vec3::ZERO);
        let tb = Transform::from_position(Vec3::new(1.5, 0.0, 0.0));

        let contact = detector.detect(&a, &ta, &b, &tb).unwrap();
        assert!(contact.is_touching);
        assert!(approx_eq(contact.normal.x, 1.0));
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_eq(contact.point.x, 1.0));
    }

    #[test]
    fn separated_spheres_produce_nothing() {
        let detector = DefaultDetector::new();
        let a = CollisionShape::sphere(1.0);
        let b = CollisionShape::sphere(1.0);
        let ta = Transform::from_position(Vec3::ZERO);
        let tb = Transform::from_position(Vec3::new(2.5, 0.0, 0.0));

        assert!(detector.detect(&a, &ta, &b, &tb).is_none());
    }

    #[test]
    fn sphere_box_side_contact() {
        let detector = DefaultDetector::new();
        let sphere = CollisionShape::sphere(1.0);
        let cube = CollisionShape::cuboid(Vec3::ONE);
        let ts = Transform::from_position(Vec3::new(1.5, 0.0, 0.0));
        let tb = Transform::from_position(Vec3::new(-0.0, 0.0, 0.0));

        let contact = detector.detect(&sphere, &ts, &cube, &tb).unwrap();
        // The sphere sits to the +X side, so its contact normal points toward
        // the box: -X.
        assert!(approx_eq(contact.normal.x, -1.0));
        assert!(approx_eq(contact.penetration, 0.5));
        assert!(approx_eq(contact.point.x, 1.0));
    }

    #[test]
    fn box_sphere_is_mirrored() {
        let detector = DefaultDetector::new();
        let sphere = CollisionShape::sphere(1.0);
        let cube = CollisionShape::cuboid(Vec3::ONE);
        let ts = Transform::from_position(Vec3::new(1.5, 0.0, 0.0));
        let tb = Transform::from_position(Vec3::ZERO);

        let forward = detector.detect(&sphere, &ts, &cube, &tb).unwrap();
        let mirrored = detector.detect(&cube, &tb, &sphere, &ts).unwrap();
        assert!(approx_eq(forward.normal.x, -mirrored.normal.x));
        assert!(approx_eq(forward.penetration, mirrored.penetration));
    }

    #[test]
    fn box_box_face_overlap() {
        let detector = DefaultDetector::new();
        let a = CollisionShape::cuboid(Vec3::ONE);
        let b = CollisionShape::cuboid(Vec3::ONE);
        let ta = Transform::from_position(Vec3::ZERO);
        let tb = Transform::from_position(Vec3::new(1.5, 0.0, 0.0));

        let contact = detector.detect(&a, &ta, &b, &tb).unwrap();
        assert!(approx_eq(contact.normal.x, 1.0));
        assert!(approx_eq(contact.penetration, 0.5));
    }

    #[test]
    fn separated_boxes_produce_nothing() {
        let detector = DefaultDetector::new();
        let a = CollisionShape::cuboid(Vec3::ONE);
        let b = CollisionShape::cuboid(Vec3::ONE);
        let ta = Transform::from_position(Vec3::ZERO);
        let tb = Transform::from_position(Vec3::new(4.0, 0.0, 0.0));

        assert!(detector.detect(&a, &ta, &b, &tb).is_none());
    }
}
