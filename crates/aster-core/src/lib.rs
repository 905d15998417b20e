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

//! # Aster Core
//!
//! Foundational crate of the Aster Engine: math primitives, the per-frame
//! arena allocator, the generic event dispatcher, and the physics core
//! (collision shapes, dynamic AABB tree, sequential-impulse constraint
//! solver).

#![warn(missing_docs)]

pub mod event;
pub mod math;
pub mod memory;
pub mod physics;
