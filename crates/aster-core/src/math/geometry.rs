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

//! Provides geometric primitive shapes for spatial calculations.
//!
//! This module contains the axis-aligned bounding box used throughout the
//! broad phase. Containment and overlap tests are epsilon-tolerant so that
//! boxes touching at a face count as overlapping despite float rounding.

use super::{Transform, Vec3, KINDA_SMALL};

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// An AABB is a rectangular prism aligned with the coordinate axes, defined by
/// its minimum and maximum corner points. Invariant: `min <= max` on all axes
/// for every valid box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb` where `min` components are positive infinity and
    /// `max` are negative infinity.
    ///
    /// This is useful as a neutral starting point for merging operations.
    pub const INVALID: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corner points.
    ///
    /// This constructor automatically ensures that the `min` field holds the
    /// component-wise minimum and `max` holds the component-wise maximum,
    /// regardless of the order the points are passed in.
    #[inline]
    pub fn from_min_max(min_pt: Vec3, max_pt: Vec3) -> Self {
        Self {
            min: min_pt.min(max_pt),
            max: min_pt.max(max_pt),
        }
    }

    /// Creates a new `Aabb` from a center point and its half-extents.
    /// The provided `half_extents` are made non-negative.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let safe_half_extents = half_extents.abs();
        Self {
            min: center - safe_half_extents,
            max: center + safe_half_extents,
        }
    }

    /// Computes the tight world-space enclosure of an oriented box.
    ///
    /// `half_extent` is the local half-extent of the box; the world radius on
    /// each axis is the sum of the absolute axis-transformed half-extent
    /// vectors, and the box is centered at the transform's position.
    pub fn from_oriented(half_extent: Vec3, transform: &Transform) -> Self {
        let rot = transform.rotation_matrix();
        let scaled = half_extent * transform.scale;

        let radius = (rot.cols[0] * scaled.x).abs()
            + (rot.cols[1] * scaled.y).abs()
            + (rot.cols[2] * scaled.z).abs();

        Self {
            min: transform.position - radius,
            max: transform.position + radius,
        }
    }

    /// Calculates the center point of the `Aabb`.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Calculates the half-extents (half the size on each axis) of the `Aabb`.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Calculates the full size (width, height, depth) of the `Aabb`.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Calculates the surface area of the box, the cost metric of the
    /// surface-area heuristic: `2 * (xy + yz + zx)` of the size vector.
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Checks if the `Aabb` is valid (i.e., `min` <= `max` on all axes).
    /// Degenerate boxes where `min == max` are considered valid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Checks whether this `Aabb` fully contains another, with an epsilon
    /// tolerance of [`KINDA_SMALL`] on every face.
    #[inline]
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        self.min.x - KINDA_SMALL <= other.min.x
            && self.min.y - KINDA_SMALL <= other.min.y
            && self.min.z - KINDA_SMALL <= other.min.z
            && self.max.x + KINDA_SMALL >= other.max.x
            && self.max.y + KINDA_SMALL >= other.max.y
            && self.max.z + KINDA_SMALL >= other.max.z
    }

    /// Checks if this `Aabb` intersects another, with an epsilon tolerance of
    /// [`KINDA_SMALL`]: boxes separated by less than the tolerance still count
    /// as intersecting.
    #[inline]
    pub fn intersects_aabb(&self, other: &Aabb) -> bool {
        self.min.x - KINDA_SMALL <= other.max.x
            && self.max.x + KINDA_SMALL >= other.min.x
            && self.min.y - KINDA_SMALL <= other.max.y
            && self.max.y + KINDA_SMALL >= other.min.y
            && self.min.z - KINDA_SMALL <= other.max.z
            && self.max.z + KINDA_SMALL >= other.min.z
    }

    /// Returns this box grown by `margin` on every face.
    #[inline]
    pub fn extend(&self, margin: f32) -> Self {
        self.extend_each(Vec3::splat(margin))
    }

    /// Returns this box grown by a per-axis margin on every face.
    #[inline]
    pub fn extend_each(&self, margin: Vec3) -> Self {
        let margin = margin.abs();
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Creates a new `Aabb` that encompasses both this `Aabb` and another one.
    #[inline]
    pub fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for Aabb {
    /// Returns the default `Aabb`, which is `Aabb::INVALID`.
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}
