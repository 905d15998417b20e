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

//! Collision events broadcast by the manager.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::collider::ColliderId;
use crate::narrow::Contact;

/// Phase of a collision pair relative to the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum CollisionState {
    /// The pair started touching this tick.
    Enter,
    /// The pair was already touching and still is.
    Stay,
    /// The pair stopped touching this tick.
    Exit,
}

/// A collision notification delivered to subscribers.
///
/// The collider pair is reported in canonical order (smaller id first).
/// `contact` carries the narrow-phase result for `Enter` and `Stay`; `Exit`
/// events have none.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Encode, Decode)]
pub struct CollisionEvent {
    /// First collider of the canonical pair.
    pub first: ColliderId,
    /// Second collider of the canonical pair.
    pub second: ColliderId,
    /// Phase of the pair.
    pub state: CollisionState,
    /// Contact data, absent on `Exit`.
    pub contact: Option<Contact>,
}
