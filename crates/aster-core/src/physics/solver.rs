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

//! # Constraint Solver
//!
//! Resolves velocity constraints with warm-started sequential impulses.
//! Constraints are grouped by the unordered body pair and a category tag;
//! each group's accumulated multipliers survive across frames so resting
//! contacts converge in few iterations.

use std::collections::HashMap;
use std::rc::Rc;

use crate::math::Vec3;
use crate::physics::body::{BodyRef, BodyState, BodyWeak};
use crate::physics::constraint::Constraint;

/// Tag separating constraint groups that act on the same body pair for
/// different purposes (e.g. contacts vs. joints).
pub type CategoryTag = &'static str;

/// Returns the address of the managed allocation, or `0` for an expired
/// handle. Used as the identity of a body in group keys.
fn body_key(body: &BodyWeak) -> usize {
    body.upgrade()
        .map(|rc| Rc::as_ptr(&rc).cast::<()>() as usize)
        .unwrap_or(0)
}

/// An unordered pair of bodies, canonicalized so `(A, B)` and `(B, A)`
/// produce the same key.
#[derive(Debug, Clone)]
pub struct PhysicsPair {
    body_a: BodyWeak,
    body_b: BodyWeak,
}

impl PhysicsPair {
    /// Creates a canonical pair: the body at the smaller address comes first.
    pub fn new(first: BodyWeak, second: BodyWeak) -> Self {
        if body_key(&first) <= body_key(&second) {
            Self {
                body_a: first,
                body_b: second,
            }
        } else {
            Self {
                body_a: second,
                body_b: first,
            }
        }
    }

    /// The canonical identity key. Expired handles canonicalize to the `0`
    /// sentinel.
    pub fn key(&self) -> (usize, usize) {
        (body_key(&self.body_a), body_key(&self.body_b))
    }

    /// True when both body handles have expired.
    pub fn is_expired(&self) -> bool {
        self.body_a.upgrade().is_none() && self.body_b.upgrade().is_none()
    }
}

/// The map key of a constraint group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GroupKey {
    pair: (usize, usize),
    category: CategoryTag,
}

/// A body pair plus every constraint currently acting on it under one
/// category, with the accumulated multiplier of each constraint slot.
struct ConstraintGroup {
    pair: PhysicsPair,
    constraints: Vec<Box<dyn Constraint>>,
    accumulated_lambda: Vec<f32>,
}

/// A sequential-impulse solver over grouped velocity constraints.
#[derive(Default)]
pub struct ConstraintSolver {
    groups: HashMap<GroupKey, ConstraintGroup>,
}

impl ConstraintSolver {
    /// Creates an empty solver.
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }

    fn key_for(body_a: &BodyRef, body_b: &BodyRef, category: CategoryTag) -> GroupKey {
        let a = Rc::as_ptr(body_a).cast::<()>() as usize;
        let b = Rc::as_ptr(body_b).cast::<()>() as usize;
        GroupKey {
            pair: (a.min(b), a.max(b)),
            category,
        }
    }

    /// Appends a constraint to the group for `(body_a, body_b, category)`,
    /// creating the group on first submission.
    ///
    /// The lambda slot backing the new constraint is extended with `0.0` only
    /// when the slot is new; an existing slot keeps its converged value from
    /// the previous frame, which is what warm-starts the solve.
    pub fn submit(
        &mut self,
        body_a: &BodyRef,
        body_b: &BodyRef,
        category: CategoryTag,
        constraint: Box<dyn Constraint>,
    ) {
        let key = Self::key_for(body_a, body_b, category);
        let group = self.groups.entry(key).or_insert_with(|| ConstraintGroup {
            pair: PhysicsPair::new(Rc::downgrade(body_a), Rc::downgrade(body_b)),
            constraints: Vec::new(),
            accumulated_lambda: Vec::new(),
        });

        group.constraints.push(constraint);
        if group.accumulated_lambda.len() < group.constraints.len() {
            group.accumulated_lambda.push(0.0);
        }
    }

    /// Removes the whole group for `(body_a, body_b, category)`, discarding
    /// its accumulated multipliers. Unknown groups are a no-op.
    pub fn unsubmit(&mut self, body_a: &BodyRef, body_b: &BodyRef, category: CategoryTag) {
        self.groups
            .remove(&Self::key_for(body_a, body_b, category));
    }

    /// Starts a new frame: drops every group whose pair has fully expired and
    /// clears each surviving group's constraint list while keeping its
    /// accumulated lambdas for warm-starting the re-submissions.
    pub fn begin_frame(&mut self) {
        self.groups.retain(|_, group| {
            if group.pair.is_expired() {
                log::trace!("Dropping constraint group with expired body pair.");
                return false;
            }
            group.constraints.clear();
            true
        });
    }

    /// Runs `iterations` passes of sequential impulses over every group.
    pub fn solve_all(&mut self, iterations: usize) {
        for _ in 0..iterations {
            for group in self.groups.values_mut() {
                Self::solve_group(group);
            }
        }
    }

    /// Like [`solve_all`](Self::solve_all), restricted to groups with the
    /// given category tag.
    pub fn solve_category(&mut self, category: CategoryTag, iterations: usize) {
        for _ in 0..iterations {
            for (key, group) in self.groups.iter_mut() {
                if key.category == category {
                    Self::solve_group(group);
                }
            }
        }
    }

    /// Removes every group.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Number of live constraint groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The accumulated multipliers of a group, mainly for inspection in
    /// tests and debug overlays.
    pub fn group_lambdas(
        &self,
        body_a: &BodyRef,
        body_b: &BodyRef,
        category: CategoryTag,
    ) -> Option<&[f32]> {
        self.groups
            .get(&Self::key_for(body_a, body_b, category))
            .map(|g| g.accumulated_lambda.as_slice())
    }

    fn solve_group(group: &mut ConstraintGroup) {
        if group.constraints.is_empty() {
            return;
        }

        let rc_a = group.pair.body_a.upgrade();
        let rc_b = group.pair.body_b.upgrade();
        if rc_a.is_none() && rc_b.is_none() {
            return;
        }

        for (index, constraint) in group.constraints.iter().enumerate() {
            // States are re-captured per constraint so each impulse is seen
            // by the next solve within the same iteration.
            let state_a = rc_a
                .as_ref()
                .map(|body| BodyState::capture(&*body.borrow()))
                .unwrap_or(BodyState::STATIC);
            let state_b = rc_b
                .as_ref()
                .map(|body| BodyState::capture(&*body.borrow()))
                .unwrap_or(BodyState::STATIC);

            let impulse = constraint.solve(&state_a, &state_b, &mut group.accumulated_lambda[index]);
            if impulse == Vec3::ZERO {
                continue;
            }

            let point = constraint.contact_point();
            if let Some(body) = &rc_a {
                if !state_a.is_static {
                    let lever = point - state_a.position;
                    let mut body = body.borrow_mut();
                    body.apply_linear_impulse(-impulse);
                    body.apply_angular_impulse(-lever.cross(impulse));
                }
            }
            if let Some(body) = &rc_b {
                if !state_b.is_static {
                    let lever = point - state_b.position;
                    let mut body = body.borrow_mut();
                    body.apply_linear_impulse(impulse);
                    body.apply_angular_impulse(lever.cross(impulse));
                }
            }
        }
    }
}
