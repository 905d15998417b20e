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

//! # Physics Core
//!
//! The broad-phase and constraint-resolution machinery of the engine: convex
//! collision shapes, the fat-bounds dynamic AABB tree, and the warm-started
//! sequential-impulse constraint solver.

pub mod body;
pub mod config;
pub mod constraint;
pub mod dynamic_tree;
pub mod shape;
pub mod solver;

pub use body::{world_inverse_inertia, BodyRef, BodyState, BodyWeak, RigidBody};
pub use config::PhysicsConfig;
pub use constraint::{relative_contact_velocity, Constraint, VelocityConstraint};
pub use dynamic_tree::{Boundable, DynamicAabbTree, NULL_NODE};
pub use shape::{CollisionShape, ConvexShape};
pub use solver::{CategoryTag, ConstraintSolver, PhysicsPair};
