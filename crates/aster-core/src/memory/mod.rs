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

//! Frame-scoped memory management.
//!
//! The physics tick allocates narrow-phase contacts and temporary constraint
//! data every frame. A bump allocator gives O(1) allocation and a single O(n)
//! teardown, so per-tick allocation cost stays amortized regardless of how
//! many contacts a frame produces.

pub mod arena;

pub use arena::{ArenaError, FrameArena};
