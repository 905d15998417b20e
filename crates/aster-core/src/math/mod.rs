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

//! Provides foundational mathematics primitives for 3D space.
//!
//! This module contains the vector, matrix, quaternion, and bounding-volume
//! types that form the mathematical backbone of the physics core. All angular
//! functions operate in **radians**.

// --- Fundamental Constants ---

/// A small constant for general floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

/// The tolerance used by geometric predicates (AABB containment and overlap
/// tests, degenerate effective-mass detection).
pub const KINDA_SMALL: f32 = 1e-4;

// Re-export standard mathematical constants for convenience.
pub use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

// --- Declare Sub-Modules ---

pub mod geometry;
pub mod matrix;
pub mod quaternion;
pub mod transform;
pub mod vector;

// --- Re-export Principal Types ---

pub use self::geometry::Aabb;
pub use self::matrix::{Mat3, Mat4};
pub use self::quaternion::Quaternion;
pub use self::transform::Transform;
pub use self::vector::{Vec3, Vec4};

// --- Utility Functions ---

/// Performs an approximate equality comparison between two floats with a
/// custom tolerance.
#[inline]
pub fn approx_eq_eps(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

/// Performs an approximate equality comparison using the module's default
/// [`EPSILON`].
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    approx_eq_eps(a, b, EPSILON)
}
