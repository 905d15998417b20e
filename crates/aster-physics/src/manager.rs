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

//! # Collision Manager
//!
//! Owns the collider registry and drives the physics tick: cleanup, broad
//! phase, narrow phase, constraint emission, solving, and event dispatch, in
//! that fixed order. Component destruction is deferred to the cleanup step,
//! so nothing mutates the registry while constraints are being solved.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use aster_core::event::{EventDispatcher, SubscriberTag};
use aster_core::memory::FrameArena;
use aster_core::physics::{
    relative_contact_velocity, BodyRef, BodyState, Boundable, CategoryTag, CollisionShape,
    Constraint, ConstraintSolver, DynamicAabbTree, PhysicsConfig, VelocityConstraint,
};

use crate::collider::{Collider, ColliderId};
use crate::events::{CollisionEvent, CollisionState};
use crate::narrow::{Contact, ContactDetector, DefaultDetector};

/// Category tag of the contact constraints the manager submits.
const CONTACT_CATEGORY: CategoryTag = "contact";

/// Size of the per-tick scratch arena. Contacts are small records, so this
/// covers far more simultaneous contacts than the expected collider counts
/// can produce.
const FRAME_ARENA_BYTES: usize = 1 << 20;

/// A registered collider and its broad-phase leaf.
struct ComponentSlot {
    collider: Rc<Collider>,
    node_id: usize,
}

/// A per-tick contact, stored in the frame arena.
struct ContactRecord {
    index_a: usize,
    index_b: usize,
    contact: Contact,
}

/// Manager-side record of a currently touching collider pair.
///
/// The indices reference the manager's registration vector. They only move
/// during the cleanup step at the start of a tick, which rewrites them
/// atomically with the compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPair {
    /// Registry index of the first collider.
    pub index_a: usize,
    /// Registry index of the second collider.
    pub index_b: usize,
    /// Tick on which the pair started touching.
    pub first_seen_tick: u64,
    /// Most recent tick on which the pair was touching.
    pub last_seen_tick: u64,
    /// Current phase of the pair.
    pub state: CollisionState,
}

/// The collision subsystem: registry, broad phase, solver, and events.
pub struct CollisionManager {
    config: PhysicsConfig,
    components: Vec<ComponentSlot>,
    active_pairs: HashMap<(ColliderId, ColliderId), CollisionPair>,
    tree: Option<DynamicAabbTree>,
    solver: Option<ConstraintSolver>,
    detector: Option<Box<dyn ContactDetector>>,
    arena: Option<FrameArena>,
    dispatcher: EventDispatcher<CollisionEvent>,
    next_collider_id: u64,
    tick_count: u64,
    is_initialized: bool,
}

impl CollisionManager {
    /// Creates an uninitialized manager with the given configuration.
    /// Out-of-range configuration values are clamped.
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config: config.validated(),
            components: Vec::new(),
            active_pairs: HashMap::new(),
            tree: None,
            solver: None,
            detector: None,
            arena: None,
            dispatcher: EventDispatcher::new(),
            next_collider_id: 1,
            tick_count: 0,
            is_initialized: false,
        }
    }

    /// Constructs the subsystems with the default narrow-phase detector.
    /// Idempotent.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        self.initialize_with(Box::new(DefaultDetector::new()))
    }

    /// Constructs the subsystems with an injected narrow-phase detector.
    /// Idempotent; a second call keeps the existing subsystems.
    pub fn initialize_with(&mut self, detector: Box<dyn ContactDetector>) -> anyhow::Result<()> {
        if self.is_initialized {
            log::debug!("CollisionManager already initialized.");
            return Ok(());
        }

        self.components.reserve(self.config.initial_capacity);
        self.tree = Some(DynamicAabbTree::with_config(
            self.config.initial_capacity,
            self.config.aabb_extension,
            self.config.min_margin,
        ));
        self.solver = Some(ConstraintSolver::new());
        self.detector = Some(detector);
        self.arena = Some(FrameArena::new(FRAME_ARENA_BYTES));
        self.is_initialized = true;
        log::info!(
            "CollisionManager initialized (capacity {}, {} solver iterations).",
            self.config.initial_capacity,
            self.config.solver_iterations
        );
        Ok(())
    }

    /// Unregisters every component and tears the subsystems down.
    /// Idempotent; also safe to call after a failed initialization.
    pub fn release(&mut self) {
        if !self.is_initialized && self.tree.is_none() {
            return;
        }
        self.unregister_all();
        self.tree = None;
        self.solver = None;
        self.detector = None;
        self.arena = None;
        self.is_initialized = false;
        log::info!("CollisionManager released.");
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// The validated configuration in effect.
    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Creates a collider for `body` with the configuration's default
    /// restitution, inserts it into the broad phase, and registers it.
    /// Returns `None` when the manager is uninitialized or the broad-phase
    /// insertion fails.
    pub fn create(&mut self, body: &BodyRef, shape: CollisionShape) -> Option<Rc<Collider>> {
        let restitution = self.config.restitution;
        self.create_with_restitution(body, shape, restitution)
    }

    /// Like [`create`](Self::create), with an explicit restitution for this
    /// collider. Contacts use the larger restitution of the two colliders
    /// involved.
    pub fn create_with_restitution(
        &mut self,
        body: &BodyRef,
        shape: CollisionShape,
        restitution: f32,
    ) -> Option<Rc<Collider>> {
        if !self.is_initialized {
            log::warn!("create() called on uninitialized CollisionManager.");
            return None;
        }
        let tree = self.tree.as_mut()?;

        let id = ColliderId(self.next_collider_id);
        let collider = Rc::new(Collider::new(id, shape, Rc::downgrade(body), restitution));

        let boundable: Rc<dyn Boundable> = collider.clone();
        let node_id = match tree.insert(&boundable) {
            Some(node_id) => node_id,
            None => {
                log::error!("Broad-phase insertion failed for new collider {id:?}.");
                return None;
            }
        };

        self.next_collider_id += 1;
        self.components.push(ComponentSlot {
            collider: collider.clone(),
            node_id,
        });
        Some(collider)
    }

    /// Removes every component from the broad phase and clears all pair and
    /// solver state.
    pub fn unregister_all(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            for slot in &self.components {
                tree.remove(slot.node_id);
            }
        }
        self.components.clear();
        self.active_pairs.clear();
        if let Some(solver) = self.solver.as_mut() {
            solver.clear();
        }
    }

    /// Registers a collision-event subscriber.
    pub fn subscribe(&mut self) -> (SubscriberTag, flume::Receiver<CollisionEvent>) {
        self.dispatcher.subscribe()
    }

    /// Unregisters a collision-event subscriber.
    pub fn unsubscribe(&mut self, tag: SubscriberTag) {
        self.dispatcher.unsubscribe(tag);
    }

    /// Number of registered components.
    #[inline]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of currently touching pairs.
    #[inline]
    pub fn active_pair_count(&self) -> usize {
        self.active_pairs.len()
    }

    /// Looks up the active pair record for two colliders, in either order.
    pub fn active_pair(&self, a: ColliderId, b: ColliderId) -> Option<&CollisionPair> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.active_pairs.get(&key)
    }

    /// Ticks completed so far.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// ASCII dump of the broad-phase tree for debugging.
    pub fn tree_structure(&self) -> Option<String> {
        self.tree.as_ref().map(DynamicAabbTree::fmt_structure)
    }

    /// Runs one physics tick: cleanup, broad phase, narrow phase, constraint
    /// emission, solve, and event dispatch.
    pub fn tick(&mut self) {
        if !self.is_initialized {
            log::warn!("tick() called on uninitialized CollisionManager; ignored.");
            return;
        }

        // 1. Cleanup: reap destroyed components before anything references
        //    registry indices.
        self.reap_destroyed();

        // 2. Broad phase: refit the tree and gather deduplicated candidates.
        let candidates = self.broad_phase();

        // Per-tick contact storage lives in the frame arena; taking it out of
        // the manager scopes the arena borrows to this block.
        let mut arena = match self.arena.take() {
            Some(arena) => arena,
            None => return,
        };
        {
            // 3. Narrow phase.
            let contacts = self.detect_contacts(&arena, &candidates);

            // 4. Constraint emission.
            self.emit_constraints(&contacts);

            // 5. Solve.
            if let Some(solver) = self.solver.as_mut() {
                solver.solve_all(self.config.solver_iterations);
            }

            // 6. Event dispatch.
            self.dispatch_events(&contacts);
        }
        arena.reset();
        self.arena = Some(arena);

        self.tick_count += 1;
    }

    /// Reaps components flagged destroyed (or whose body expired): removes
    /// their tree leaves, drops pairs referencing them, and compacts the
    /// registry by swap-and-pop, rewriting pair indices that referenced the
    /// moved tail element.
    fn reap_destroyed(&mut self) {
        let destroyed: Vec<usize> = self
            .components
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.collider.is_destroyed())
            .map(|(index, _)| index)
            .collect();

        for index in destroyed.into_iter().rev() {
            let slot = self.components.swap_remove(index);
            if let Some(tree) = self.tree.as_mut() {
                tree.remove(slot.node_id);
            }

            let dead_id = slot.collider.id();
            log::debug!("Reaping destroyed collider {dead_id:?}.");

            // Pairs referencing the reaped collider vanish without an Exit
            // event; their solver groups go with them.
            let dropped: Vec<(ColliderId, ColliderId)> = self
                .active_pairs
                .keys()
                .filter(|key| key.0 == dead_id || key.1 == dead_id)
                .copied()
                .collect();
            for key in dropped {
                self.active_pairs.remove(&key);

                let other_id = if key.0 == dead_id { key.1 } else { key.0 };
                let other_body = self
                    .components
                    .iter()
                    .find(|s| s.collider.id() == other_id)
                    .and_then(|s| s.collider.body().upgrade());
                if let (Some(dead_body), Some(other_body)) =
                    (slot.collider.body().upgrade(), other_body)
                {
                    if let Some(solver) = self.solver.as_mut() {
                        solver.unsubmit(&dead_body, &other_body, CONTACT_CATEGORY);
                    }
                }
            }

            // The previous tail element now lives at `index`.
            let moved = self.components.len();
            if index != moved {
                for pair in self.active_pairs.values_mut() {
                    if pair.index_a == moved {
                        pair.index_a = index;
                    }
                    if pair.index_b == moved {
                        pair.index_b = index;
                    }
                }
            }
        }
    }

    /// Updates the tree and collects overlapping component pairs,
    /// deduplicated through the canonical id pair.
    fn broad_phase(&mut self) -> Vec<(usize, usize)> {
        let tree = match self.tree.as_mut() {
            Some(tree) => tree,
            None => return Vec::new(),
        };
        tree.update();

        let node_to_index: HashMap<usize, usize> = self
            .components
            .iter()
            .enumerate()
            .map(|(index, slot)| (slot.node_id, index))
            .collect();

        let mut seen: HashSet<(ColliderId, ColliderId)> = HashSet::new();
        let mut candidates = Vec::new();

        for (index, slot) in self.components.iter().enumerate() {
            let query = match tree.bounds(slot.node_id) {
                Some(bounds) => *bounds,
                None => continue,
            };
            tree.query_overlap(&query, |node_id| {
                let other = match node_to_index.get(&node_id) {
                    Some(&other) => other,
                    None => return,
                };
                if other == index {
                    return;
                }
                let id_a = slot.collider.id();
                let id_b = self.components[other].collider.id();
                let key = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
                if seen.insert(key) {
                    candidates.push((index, other));
                }
            });
        }
        candidates
    }

    /// Runs the detector over the candidates and stores touching contacts in
    /// the frame arena.
    fn detect_contacts<'a>(
        &self,
        arena: &'a FrameArena,
        candidates: &[(usize, usize)],
    ) -> Vec<&'a ContactRecord> {
        let detector = match self.detector.as_ref() {
            Some(detector) => detector,
            None => return Vec::new(),
        };

        let mut records: Vec<&'a ContactRecord> = Vec::with_capacity(candidates.len());
        for &(index_a, index_b) in candidates {
            let collider_a = &self.components[index_a].collider;
            let collider_b = &self.components[index_b].collider;

            let contact = detector.detect(
                &collider_a.shape(),
                &collider_a.world_transform(),
                &collider_b.shape(),
                &collider_b.world_transform(),
            );
            let contact = match contact {
                Some(contact) if contact.is_touching => contact,
                _ => continue,
            };

            match arena.alloc(ContactRecord {
                index_a,
                index_b,
                contact,
            }) {
                Ok(record) => records.push(record),
                Err(error) => {
                    log::error!("Frame arena exhausted during narrow phase: {error}");
                    break;
                }
            }
        }
        records
    }

    /// Submits one normal velocity constraint per touching contact.
    fn emit_constraints(&mut self, contacts: &[&ContactRecord]) {
        let solver = match self.solver.as_mut() {
            Some(solver) => solver,
            None => return,
        };
        solver.begin_frame();

        for record in contacts {
            let collider_a = &self.components[record.index_a].collider;
            let collider_b = &self.components[record.index_b].collider;

            let (body_a, body_b) = match (
                collider_a.body().upgrade(),
                collider_b.body().upgrade(),
            ) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            let state_a = BodyState::capture(&*body_a.borrow());
            let state_b = BodyState::capture(&*body_b.borrow());
            let contact = &record.contact;

            // Closing speed along the normal; negative while approaching.
            let closing_speed =
                relative_contact_velocity(&state_a, &state_b, contact.point).dot(contact.normal);

            // Restitution only above the threshold speed; slow impacts are
            // resolved as perfectly inelastic to avoid jitter.
            let restitution = collider_a.restitution().max(collider_b.restitution());
            let desired_speed = if closing_speed < -self.config.restitution_threshold {
                -restitution * closing_speed
            } else {
                0.0
            };

            let corrected_penetration =
                (contact.penetration - self.config.penetration_slop).max(0.0);

            let mut constraint = VelocityConstraint::new(contact.normal, desired_speed, 0.0)
                .with_bias(self.config.baumgarte_bias);
            constraint.set_contact(contact.point, contact.normal, corrected_penetration);

            solver.submit(&body_a, &body_b, CONTACT_CATEGORY, Box::new(constraint));
        }
    }

    /// Diffs the touching set against the active pairs and broadcasts
    /// Enter/Stay/Exit events.
    fn dispatch_events(&mut self, contacts: &[&ContactRecord]) {
        let tick = self.tick_count;

        let mut current: HashMap<(ColliderId, ColliderId), (usize, usize, Contact)> =
            HashMap::new();
        for record in contacts {
            let id_a = self.components[record.index_a].collider.id();
            let id_b = self.components[record.index_b].collider.id();
            let key = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
            current
                .entry(key)
                .or_insert((record.index_a, record.index_b, record.contact));
        }

        // Pairs that stopped touching.
        let exited: Vec<(ColliderId, ColliderId)> = self
            .active_pairs
            .keys()
            .filter(|key| !current.contains_key(*key))
            .copied()
            .collect();
        for key in exited {
            self.active_pairs.remove(&key);
            self.unsubmit_pair(key);
            self.dispatcher.publish(&CollisionEvent {
                first: key.0,
                second: key.1,
                state: CollisionState::Exit,
                contact: None,
            });
        }

        // New and persisting pairs.
        for (key, (index_a, index_b, contact)) in current {
            let state = match self.active_pairs.get_mut(&key) {
                Some(pair) => {
                    pair.last_seen_tick = tick;
                    pair.state = CollisionState::Stay;
                    pair.index_a = index_a;
                    pair.index_b = index_b;
                    CollisionState::Stay
                }
                None => {
                    self.active_pairs.insert(
                        key,
                        CollisionPair {
                            index_a,
                            index_b,
                            first_seen_tick: tick,
                            last_seen_tick: tick,
                            state: CollisionState::Enter,
                        },
                    );
                    CollisionState::Enter
                }
            };
            self.dispatcher.publish(&CollisionEvent {
                first: key.0,
                second: key.1,
                state,
                contact: Some(contact),
            });
        }
    }

    /// Removes the solver group of a pair whose colliders are still
    /// registered.
    fn unsubmit_pair(&mut self, key: (ColliderId, ColliderId)) {
        let body_of = |id: ColliderId| -> Option<BodyRef> {
            self.components
                .iter()
                .find(|slot| slot.collider.id() == id)
                .and_then(|slot| slot.collider.body().upgrade())
        };
        let (body_a, body_b) = match (body_of(key.0), body_of(key.1)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        if let Some(solver) = self.solver.as_mut() {
            solver.unsubmit(&body_a, &body_b, CONTACT_CATEGORY);
        }
    }
}

impl Drop for CollisionManager {
    fn drop(&mut self) {
        self.release();
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use aster_core::math::{Quaternion, Vec3};
    use aster_core::physics::RigidBody;
    use std::cell::RefCell;

    struct InertBody;

    impl RigidBody for InertBody {
        fn mass(&self) -> f32 {
            1.0
        }
        fn inverse_mass(&self) -> f32 {
            1.0
        }
        fn position(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn rotation(&self) -> Quaternion {
            Quaternion::IDENTITY
        }
        fn linear_velocity(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn angular_velocity(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn local_inertia(&self) -> Vec3 {
            Vec3::ONE
        }
        fn is_static(&self) -> bool {
            false
        }
        fn apply_linear_impulse(&mut self, _impulse: Vec3) {}
        fn apply_angular_impulse(&mut self, _impulse: Vec3) {}
    }

    #[test]
    fn initialize_and_release_are_idempotent() {
        let mut manager = CollisionManager::new(PhysicsConfig::default());
        assert!(!manager.is_initialized());

        manager.initialize().unwrap();
        manager.initialize().unwrap();
        assert!(manager.is_initialized());

        manager.release();
        manager.release();
        assert!(!manager.is_initialized());
    }

    #[test]
    fn create_requires_initialization() {
        let mut manager = CollisionManager::new(PhysicsConfig::default());
        let body: BodyRef = Rc::new(RefCell::new(InertBody));
        assert!(manager
            .create(&body, CollisionShape::sphere(1.0))
            .is_none());

        manager.initialize().unwrap();
        assert!(manager
            .create(&body, CollisionShape::sphere(1.0))
            .is_some());
        assert_eq!(manager.component_count(), 1);
    }

    #[test]
    fn tick_on_uninitialized_manager_is_a_no_op() {
        let mut manager = CollisionManager::new(PhysicsConfig::default());
        manager.tick();
        assert_eq!(manager.tick_count(), 0);
    }

    #[test]
    fn collider_ids_are_unique_and_stable() {
        let mut manager = CollisionManager::new(PhysicsConfig::default());
        manager.initialize().unwrap();

        let body: BodyRef = Rc::new(RefCell::new(InertBody));
        let a = manager.create(&body, CollisionShape::sphere(0.2)).unwrap();
        let b = manager.create(&body, CollisionShape::sphere(0.2)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn release_clears_registrations() {
        let mut manager = CollisionManager::new(PhysicsConfig::default());
        manager.initialize().unwrap();

        let body: BodyRef = Rc::new(RefCell::new(InertBody));
        manager.create(&body, CollisionShape::sphere(1.0)).unwrap();
        manager.release();
        assert_eq!(manager.component_count(), 0);

        // Reinitialization starts from a clean slate.
        manager.initialize().unwrap();
        assert_eq!(manager.component_count(), 0);
        assert_eq!(manager.active_pair_count(), 0);
    }
}
