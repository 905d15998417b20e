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

//! # Aster Physics
//!
//! The orchestration layer of the physics subsystem: collider components,
//! the narrow-phase contact detector, and the [`CollisionManager`] that
//! drives the broad phase, constraint solving, and collision events every
//! tick.

#![warn(missing_docs)]

pub mod collider;
pub mod events;
pub mod manager;
pub mod narrow;

pub use collider::{Collider, ColliderId};
pub use events::{CollisionEvent, CollisionState};
pub use manager::{CollisionManager, CollisionPair};
pub use narrow::{Contact, ContactDetector, DefaultDetector};
