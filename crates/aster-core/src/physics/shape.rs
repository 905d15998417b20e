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

//! Convex collision shapes.

use serde::{Deserialize, Serialize};

use crate::math::{Aabb, Transform, Vec3};

/// Capability interface of a convex collision shape.
///
/// All methods are pure functions of the shape parameters and the given world
/// transform.
pub trait ConvexShape {
    /// Returns the farthest world-space point of the shape along `direction`.
    ///
    /// The result is unspecified for a near-zero `direction`.
    fn support_point(&self, direction: Vec3, transform: &Transform) -> Vec3;

    /// Returns the diagonal of the local-space inertia tensor for the given
    /// mass.
    fn inertia_tensor(&self, mass: f32) -> Vec3;

    /// Computes the world-space AABB of the shape under `transform`.
    fn world_aabb(&self, transform: &Transform) -> Aabb;

    /// Returns the local half-extent of the shape. For a sphere all three
    /// components equal the radius.
    fn half_extent(&self) -> Vec3;
}

/// Supported collision shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    /// Box with half-extents.
    Box {
        /// Distance from the center to each face.
        half_extent: Vec3,
    },
    /// Solid sphere with a radius.
    Sphere {
        /// Radius of the sphere.
        radius: f32,
    },
}

impl CollisionShape {
    /// Creates a box shape from its half-extent.
    #[inline]
    pub fn cuboid(half_extent: Vec3) -> Self {
        Self::Box { half_extent }
    }

    /// Creates a sphere shape from its radius.
    #[inline]
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Replaces the half-extent of the shape. For a sphere the x component is
    /// taken as the new radius.
    pub fn set_half_extent(&mut self, value: Vec3) {
        match self {
            Self::Box { half_extent } => *half_extent = value,
            Self::Sphere { radius } => *radius = value.x,
        }
    }
}

impl ConvexShape for CollisionShape {
    fn support_point(&self, direction: Vec3, transform: &Transform) -> Vec3 {
        match self {
            Self::Box { half_extent } => {
                // Pick the corner whose local direction signs match, then map
                // through the full modeling transform.
                let local_dir = transform.rotation.conjugate().rotate_vec3(direction);
                let local = Vec3::new(
                    if local_dir.x >= 0.0 {
                        half_extent.x
                    } else {
                        -half_extent.x
                    },
                    if local_dir.y >= 0.0 {
                        half_extent.y
                    } else {
                        -half_extent.y
                    },
                    if local_dir.z >= 0.0 {
                        half_extent.z
                    } else {
                        -half_extent.z
                    },
                );
                transform.transform_point(local)
            }
            Self::Sphere { radius } => transform.position + direction.normalize() * *radius,
        }
    }

    fn inertia_tensor(&self, mass: f32) -> Vec3 {
        match self {
            Self::Box { half_extent } => {
                let sq = *half_extent * *half_extent;
                Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0)
            }
            Self::Sphere { radius } => {
                // Solid sphere: I = (2/5) m r^2 on every axis.
                Vec3::splat(0.4 * mass * radius * radius)
            }
        }
    }

    fn world_aabb(&self, transform: &Transform) -> Aabb {
        match self {
            Self::Box { half_extent } => {
                let h = *half_extent;
                let corners = [
                    Vec3::new(-h.x, -h.y, -h.z),
                    Vec3::new(h.x, -h.y, -h.z),
                    Vec3::new(-h.x, h.y, -h.z),
                    Vec3::new(h.x, h.y, -h.z),
                    Vec3::new(-h.x, -h.y, h.z),
                    Vec3::new(h.x, -h.y, h.z),
                    Vec3::new(-h.x, h.y, h.z),
                    Vec3::new(h.x, h.y, h.z),
                ];

                let first = transform.transform_vector(corners[0]);
                let mut min_pt = first;
                let mut max_pt = first;
                for corner in &corners[1..] {
                    let rotated = transform.transform_vector(*corner);
                    min_pt = min_pt.min(rotated);
                    max_pt = max_pt.max(rotated);
                }

                Aabb {
                    min: min_pt + transform.position,
                    max: max_pt + transform.position,
                }
            }
            Self::Sphere { radius } => {
                Aabb::from_center_half_extents(transform.position, Vec3::splat(*radius))
            }
        }
    }

    fn half_extent(&self) -> Vec3 {
        match self {
            Self::Box { half_extent } => *half_extent,
            Self::Sphere { radius } => Vec3::splat(*radius),
        }
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Quaternion, FRAC_PI_2};

    fn vec3_approx_eq(a: Vec3, b: Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn box_support_point_axis_aligned() {
        let shape = CollisionShape::cuboid(Vec3::new(1.0, 2.0, 3.0));
        let t = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));

        let support = shape.support_point(Vec3::new(1.0, -1.0, 1.0), &t);
        assert!(vec3_approx_eq(support, Vec3::new(11.0, -2.0, 3.0)));
    }

    #[test]
    fn box_support_point_rotated() {
        // 90 degrees around Z: the local +X face now points along +Y.
        let shape = CollisionShape::cuboid(Vec3::new(2.0, 1.0, 1.0));
        let t = Transform::from_position_rotation(
            Vec3::ZERO,
            Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2),
        );

        let support = shape.support_point(Vec3::Y, &t);
        assert!(approx_eq(support.y, 2.0));
    }

    #[test]
    fn sphere_support_point() {
        let shape = CollisionShape::sphere(2.0);
        let t = Transform::from_position(Vec3::new(1.0, 1.0, 0.0));

        let support = shape.support_point(Vec3::new(0.0, 3.0, 0.0), &t);
        assert!(vec3_approx_eq(support, Vec3::new(1.0, 3.0, 0.0)));
    }

    #[test]
    fn sphere_inertia() {
        let shape = CollisionShape::sphere(2.0);
        let inertia = shape.inertia_tensor(3.0);
        assert!(vec3_approx_eq(inertia, Vec3::splat(4.8)));
    }

    #[test]
    fn box_inertia() {
        let shape = CollisionShape::cuboid(Vec3::new(1.0, 2.0, 3.0));
        let inertia = shape.inertia_tensor(12.0);
        // m/12 * (hy^2 + hz^2, hx^2 + hz^2, hx^2 + hy^2)
        assert!(vec3_approx_eq(inertia, Vec3::new(13.0, 10.0, 5.0)));
    }

    #[test]
    fn world_aabb_of_rotated_box() {
        let shape = CollisionShape::cuboid(Vec3::ONE);
        let t = Transform::from_position_rotation(
            Vec3::new(5.0, 0.0, 0.0),
            Quaternion::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_4),
        );

        let aabb = shape.world_aabb(&t);
        let sqrt2 = 2.0f32.sqrt();
        assert!(approx_eq(aabb.min.x, 5.0 - sqrt2));
        assert!(approx_eq(aabb.max.x, 5.0 + sqrt2));
        assert!(approx_eq(aabb.min.y, -1.0));
        assert!(approx_eq(aabb.max.y, 1.0));
    }

    #[test]
    fn sphere_half_extent_roundtrip() {
        let mut shape = CollisionShape::sphere(1.5);
        assert_eq!(shape.half_extent(), Vec3::splat(1.5));

        shape.set_half_extent(Vec3::new(4.0, 9.0, 9.0));
        assert_eq!(shape.half_extent(), Vec3::splat(4.0));
    }
}
