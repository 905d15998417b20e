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

//! A decomposed rigid transform: position, rotation, and scale.

use serde::{Deserialize, Serialize};

use super::{Mat3, Mat4, Quaternion, Vec3};

/// A 3D transform stored in decomposed form.
///
/// The derived modeling matrix applies scale first, then rotation, then
/// translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation.
    pub rotation: Quaternion,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quaternion::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Creates a transform at `position` with no rotation and unit scale.
    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Creates a transform from a position and rotation with unit scale.
    #[inline]
    pub fn from_position_rotation(position: Vec3, rotation: Quaternion) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Derives the modeling matrix (`translate * rotate * scale`).
    pub fn modeling_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
    }

    /// Returns the 3x3 rotation matrix of this transform.
    #[inline]
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.rotation)
    }

    /// Transforms a local-space point into world space.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate_vec3(p * self.scale) + self.position
    }

    /// Transforms a local-space direction into world space (rotation and
    /// scale, no translation).
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate_vec3(v * self.scale)
    }
}

impl Default for Transform {
    /// Returns the identity transform.
    fn default() -> Self {
        Self::IDENTITY
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, FRAC_PI_2};
    use approx::assert_relative_eq;

    fn vec3_approx_eq(a: Vec3, b: Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn scale_applies_before_rotation_and_translation() {
        let t = Transform {
            position: Vec3::new(5.0, 0.0, 0.0),
            rotation: Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };

        // (1,0,0) scaled to (2,0,0), rotated to (0,2,0), translated to (5,2,0).
        let p = t.transform_point(Vec3::X);
        assert!(vec3_approx_eq(p, Vec3::new(5.0, 2.0, 0.0)));

        // The modeling matrix agrees with the decomposed application.
        let pm = t.modeling_matrix().transform_point(Vec3::X);
        assert_relative_eq!(pm.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(pm.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(pm.z, p.z, epsilon = 1e-5);
    }

    #[test]
    fn vector_transform_ignores_translation() {
        let t = Transform::from_position(Vec3::new(100.0, -4.0, 3.0));
        assert!(vec3_approx_eq(t.transform_vector(Vec3::Y), Vec3::Y));
    }
}
