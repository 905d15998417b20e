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

//! # Dynamic AABB Tree
//!
//! A self-balancing bounding-volume hierarchy used as the broad phase. Each
//! leaf tracks one boundable object through a "fat" AABB, so small motion is
//! absorbed without restructuring the tree; a leaf is only reinserted when
//! its tight bounds escape the fat bounds or the object reports a change.

use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use crate::math::{Aabb, Transform, Vec3};

/// Sentinel node id: no node.
pub const NULL_NODE: usize = usize::MAX;

/// Default fat-bounds expansion as a fraction of the object's half-extent.
pub const AABB_EXTENSION: f32 = 0.1;

/// Default absolute fat-bounds padding, so very small objects still get a
/// usable margin.
pub const MIN_MARGIN: f32 = 0.01;

/// An entity the tree can bound and track.
///
/// Implementations use interior mutability for the dirty flag so the tree can
/// clear it through a shared reference.
pub trait Boundable {
    /// Local half-extent of the object's bounding volume.
    fn half_extent(&self) -> Vec3;
    /// Current world transform.
    fn transform(&self) -> Transform;
    /// Whether the bounding volume changed since the last update (resized
    /// shape, teleport). Plain motion is caught by the fat-bounds test
    /// instead.
    fn bounds_dirty(&self) -> bool;
    /// Acknowledges the change after the tree has refit the leaf.
    fn clear_dirty(&self);
}

/// A node in the dynamic tree.
#[derive(Clone)]
pub struct TreeNode {
    /// Tight AABB of the referenced object (for internal nodes, the merge of
    /// both children).
    pub bounds: Aabb,
    /// Enlarged AABB; leaf refits are skipped while the tight bounds stay
    /// inside it.
    pub fat_bounds: Aabb,
    /// Object position when the bounds were last computed.
    pub last_position: Vec3,
    /// Object half-extent when the bounds were last computed.
    pub last_half_extent: Vec3,
    /// Parent node id, or [`NULL_NODE`] for the root. Repurposed as the
    /// free-list link while the node is unallocated.
    pub parent: usize,
    /// Left child id; [`NULL_NODE`] for leaves.
    pub left: usize,
    /// Right child id; [`NULL_NODE`] for leaves.
    pub right: usize,
    /// The tracked object; present exactly on leaves.
    pub object: Option<Weak<dyn Boundable>>,
    /// Height above the deepest leaf; leaves are 0, freed nodes -1.
    pub height: i32,
}

impl TreeNode {
    fn empty() -> Self {
        Self {
            bounds: Aabb::INVALID,
            fat_bounds: Aabb::INVALID,
            last_position: Vec3::ZERO,
            last_half_extent: Vec3::ZERO,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            object: None,
            height: 0,
        }
    }

    /// Returns true if this node is a live leaf.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left == NULL_NODE && self.object.is_some()
    }
}

/// A dynamic AABB tree for efficient spatial queries.
pub struct DynamicAabbTree {
    nodes: Vec<TreeNode>,
    free_list: usize,
    root: usize,
    node_count: usize,
    aabb_extension: f32,
    min_margin: f32,
}

impl Default for DynamicAabbTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicAabbTree {
    /// Creates a new, empty dynamic tree with default fattening constants.
    pub fn new() -> Self {
        Self::with_config(0, AABB_EXTENSION, MIN_MARGIN)
    }

    /// Creates a tree with a pre-reserved node pool and custom fat-bounds
    /// constants. The pool grows by doubling when exceeded.
    pub fn with_config(initial_capacity: usize, aabb_extension: f32, min_margin: f32) -> Self {
        Self {
            nodes: Vec::with_capacity(initial_capacity),
            free_list: NULL_NODE,
            root: NULL_NODE,
            node_count: 0,
            aabb_extension,
            min_margin,
        }
    }

    /// Inserts a new leaf tracking `object` and returns its node id.
    ///
    /// Returns `None` when the object is already referenced by a live leaf;
    /// the tree is left unchanged in that case.
    pub fn insert(&mut self, object: &Rc<dyn Boundable>) -> Option<usize> {
        // Duplicate detection by identity, linear over live nodes. Object
        // counts stay small enough that this beats maintaining a side map.
        if self.find_leaf(object).is_some() {
            log::warn!("Rejected duplicate insertion into the dynamic AABB tree.");
            return None;
        }

        let leaf = self.allocate_node();
        self.refresh_leaf_bounds(leaf, object);
        self.nodes[leaf].object = Some(Rc::downgrade(object));
        self.nodes[leaf].height = 0;

        self.insert_leaf(leaf);
        Some(leaf)
    }

    /// Removes a leaf. Invalid, freed, or non-leaf ids are silent no-ops.
    pub fn remove(&mut self, node_id: usize) {
        if !self.is_leaf_node(node_id) {
            log::warn!("Ignored removal of invalid tree node {node_id}.");
            return;
        }
        self.remove_leaf(node_id);
        self.free_node(node_id);
    }

    /// Lazily refits every leaf whose object reports dirty bounds or whose
    /// current tight AABB escaped its fat bounds. Leaves with expired objects
    /// are removed.
    pub fn update(&mut self) {
        for leaf in self.leaf_ids() {
            if !self.is_leaf_node(leaf) {
                continue;
            }
            let object = match self.nodes[leaf].object.as_ref().and_then(Weak::upgrade) {
                Some(object) => object,
                None => {
                    log::warn!("Dropping tree leaf {leaf} with expired boundable.");
                    self.remove_leaf(leaf);
                    self.free_node(leaf);
                    continue;
                }
            };

            let tight = Aabb::from_oriented(object.half_extent(), &object.transform());
            let needs_refit =
                object.bounds_dirty() || !self.nodes[leaf].fat_bounds.contains_aabb(&tight);

            if needs_refit {
                self.remove_leaf(leaf);
                self.refresh_leaf_bounds(leaf, &object);
                self.insert_leaf(leaf);
            }
            object.clear_dirty();
        }
    }

    /// Visits every leaf whose tight bounds overlap `query`, using the
    /// epsilon-tolerant intersection test.
    pub fn query_overlap<F: FnMut(usize)>(&self, query: &Aabb, mut visit: F) {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if !node.bounds.intersects_aabb(query) {
                continue;
            }
            if node.is_leaf() {
                visit(node_id);
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Returns the tight bounds of a live node.
    pub fn bounds(&self, node_id: usize) -> Option<&Aabb> {
        self.is_valid_id(node_id).then(|| &self.nodes[node_id].bounds)
    }

    /// Returns the fat bounds of a live node.
    pub fn fat_bounds(&self, node_id: usize) -> Option<&Aabb> {
        self.is_valid_id(node_id)
            .then(|| &self.nodes[node_id].fat_bounds)
    }

    /// Upgrades the object tracked by a live leaf.
    pub fn object(&self, node_id: usize) -> Option<Rc<dyn Boundable>> {
        if !self.is_leaf_node(node_id) {
            return None;
        }
        self.nodes[node_id].object.as_ref().and_then(Weak::upgrade)
    }

    /// Number of live nodes (internal nodes included).
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Whether `node_id` refers to a live node.
    #[inline]
    pub fn is_valid_id(&self, node_id: usize) -> bool {
        node_id < self.nodes.len() && self.nodes[node_id].height >= 0
    }

    /// Whether `node_id` refers to a live leaf.
    #[inline]
    pub fn is_leaf_node(&self, node_id: usize) -> bool {
        self.is_valid_id(node_id) && self.nodes[node_id].is_leaf()
    }

    /// Ids of every live leaf.
    pub fn leaf_ids(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&id| self.nodes[id].height >= 0 && self.nodes[id].is_leaf())
            .collect()
    }

    /// Number of live leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaf_ids().len()
    }

    /// Renders the tree as an indented ASCII structure for debugging. The
    /// exact format is not a stable surface.
    pub fn fmt_structure(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "DynamicAabbTree ({} nodes)", self.node_count);
        if self.root != NULL_NODE {
            self.fmt_subtree(self.root, 0, &mut out);
        }
        out
    }

    fn fmt_subtree(&self, node_id: usize, depth: usize, out: &mut String) {
        let node = &self.nodes[node_id];
        let kind = if node.is_leaf() { "leaf" } else { "node" };
        let b = &node.bounds;
        let _ = writeln!(
            out,
            "{:indent$}{kind} #{node_id} h={} min=({:.2}, {:.2}, {:.2}) max=({:.2}, {:.2}, {:.2})",
            "",
            node.height,
            b.min.x,
            b.min.y,
            b.min.z,
            b.max.x,
            b.max.y,
            b.max.z,
            indent = depth * 2
        );
        if !node.is_leaf() {
            self.fmt_subtree(node.left, depth + 1, out);
            self.fmt_subtree(node.right, depth + 1, out);
        }
    }

    // --- Internal Leaf Management ---

    fn find_leaf(&self, object: &Rc<dyn Boundable>) -> Option<usize> {
        let target = Rc::as_ptr(object).cast::<()>() as usize;
        self.leaf_ids().into_iter().find(|&id| {
            self.nodes[id]
                .object
                .as_ref()
                .and_then(Weak::upgrade)
                .map(|existing| Rc::as_ptr(&existing).cast::<()>() as usize == target)
                .unwrap_or(false)
        })
    }

    /// Recomputes tight and fat bounds of a leaf from the object's current
    /// state and snapshots position and half-extent.
    fn refresh_leaf_bounds(&mut self, leaf: usize, object: &Rc<dyn Boundable>) {
        let half_extent = object.half_extent();
        let transform = object.transform();

        let tight = Aabb::from_oriented(half_extent, &transform);
        let margin = half_extent * self.aabb_extension + Vec3::splat(self.min_margin);

        let node = &mut self.nodes[leaf];
        node.bounds = tight;
        node.fat_bounds = tight.extend_each(margin);
        node.last_position = transform.position;
        node.last_half_extent = half_extent;
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Find the best sibling for the new leaf by surface-area cost.
        let leaf_bounds = self.nodes[leaf].bounds;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let left = self.nodes[index].left;
            let right = self.nodes[index].right;

            let area = self.nodes[index].bounds.surface_area();
            let combined_area = self.nodes[index].bounds.merge(&leaf_bounds).surface_area();

            // Cost of creating a new parent for this node and the new leaf.
            let cost = 2.0 * combined_area;

            // Minimum cost of pushing the leaf further down the tree.
            let inheritance_cost = 2.0 * (combined_area - area);

            let descend_cost = |child: usize| {
                let child_node = &self.nodes[child];
                let new_area = child_node.bounds.merge(&leaf_bounds).surface_area();
                if child_node.is_leaf() {
                    new_area + inheritance_cost
                } else {
                    (new_area - child_node.bounds.surface_area()) + inheritance_cost
                }
            };

            let cost_left = descend_cost(left);
            let cost_right = descend_cost(right);

            // Stop when staying here is the cheapest option.
            if cost < cost_left && cost < cost_right {
                break;
            }

            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;

        // Splice a new parent between the sibling and its old parent.
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_bounds = self.nodes[sibling].bounds;
            let sibling_height = self.nodes[sibling].height;
            let node = &mut self.nodes[new_parent];
            node.parent = old_parent;
            node.bounds = leaf_bounds.merge(&sibling_bounds);
            node.fat_bounds = node.bounds;
            node.height = sibling_height + 1;
            node.left = sibling;
            node.right = leaf;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        if old_parent != NULL_NODE {
            if self.nodes[old_parent].left == sibling {
                self.nodes[old_parent].left = new_parent;
            } else {
                self.nodes[old_parent].right = new_parent;
            }
        } else {
            self.root = new_parent;
        }

        // Walk back up the tree fixing heights and bounds.
        let mut index = self.nodes[leaf].parent;
        while index != NULL_NODE {
            index = self.balance(index);
            self.refit_node(index);
            index = self.nodes[index].parent;
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grand_parent != NULL_NODE {
            // Promote the sibling into the grandparent slot.
            if self.nodes[grand_parent].left == parent {
                self.nodes[grand_parent].left = sibling;
            } else {
                self.nodes[grand_parent].right = sibling;
            }
            self.nodes[sibling].parent = grand_parent;
            self.free_node(parent);

            // Refit and rebalance the ancestors.
            let mut index = grand_parent;
            while index != NULL_NODE {
                index = self.balance(index);
                self.refit_node(index);
                index = self.nodes[index].parent;
            }
        } else {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Recomputes bounds and height of an internal node from its children.
    fn refit_node(&mut self, index: usize) {
        let left = self.nodes[index].left;
        let right = self.nodes[index].right;
        debug_assert!(left != NULL_NODE && right != NULL_NODE);

        let bounds = self.nodes[left].bounds.merge(&self.nodes[right].bounds);
        let height = 1 + self.nodes[left].height.max(self.nodes[right].height);

        let node = &mut self.nodes[index];
        node.bounds = bounds;
        node.fat_bounds = bounds;
        node.height = height;
    }

    // --- Node Allocation ---

    fn allocate_node(&mut self) -> usize {
        let index = if self.free_list != NULL_NODE {
            let index = self.free_list;
            self.free_list = self.nodes[index].parent;
            self.nodes[index] = TreeNode::empty();
            index
        } else {
            self.nodes.push(TreeNode::empty());
            self.nodes.len() - 1
        };
        self.node_count += 1;
        index
    }

    fn free_node(&mut self, index: usize) {
        debug_assert!(index != NULL_NODE);
        let node = &mut self.nodes[index];
        node.object = None;
        node.left = NULL_NODE;
        node.right = NULL_NODE;
        node.height = -1;
        node.parent = self.free_list;
        self.free_list = index;
        self.node_count -= 1;
    }

    // --- Balancing (Tree Rotations) ---

    /// Restores the height invariant at `a` with a single rotation, returning
    /// the id now occupying `a`'s slot.
    fn balance(&mut self, a: usize) -> usize {
        debug_assert!(a != NULL_NODE);

        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let left = self.nodes[a].left;
        let right = self.nodes[a].right;
        let balance = self.nodes[right].height - self.nodes[left].height;

        if balance > 1 {
            self.rotate_up(a, right)
        } else if balance < -1 {
            self.rotate_up(a, left)
        } else {
            a
        }
    }

    /// Promotes `child` into `a`'s slot; `a` becomes its inner child and the
    /// shorter grandchild is re-parented under `a`.
    fn rotate_up(&mut self, a: usize, child: usize) -> usize {
        let grand_left = self.nodes[child].left;
        let grand_right = self.nodes[child].right;
        let was_left_child = self.nodes[a].left == child;

        // Swap `a` and `child`.
        self.nodes[child].left = a;
        self.nodes[child].parent = self.nodes[a].parent;
        self.nodes[a].parent = child;

        let new_parent = self.nodes[child].parent;
        if new_parent != NULL_NODE {
            if self.nodes[new_parent].left == a {
                self.nodes[new_parent].left = child;
            } else {
                self.nodes[new_parent].right = child;
            }
        } else {
            self.root = child;
        }

        // Keep the taller grandchild under the promoted node; hand the other
        // one to `a` in the slot `child` vacated.
        let (kept, moved) = if self.nodes[grand_left].height > self.nodes[grand_right].height {
            (grand_left, grand_right)
        } else {
            (grand_right, grand_left)
        };

        self.nodes[child].right = kept;
        if was_left_child {
            self.nodes[a].left = moved;
        } else {
            self.nodes[a].right = moved;
        }
        self.nodes[moved].parent = a;

        self.refit_node(a);
        self.refit_node(child);

        child
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Minimal boundable with settable position and half-extent.
    struct TestBoundable {
        position: Cell<Vec3>,
        half_extent: Cell<Vec3>,
        dirty: Cell<bool>,
    }

    impl TestBoundable {
        fn new(position: Vec3, half_extent: Vec3) -> Rc<Self> {
            Rc::new(Self {
                position: Cell::new(position),
                half_extent: Cell::new(half_extent),
                dirty: Cell::new(false),
            })
        }

        fn set_position(&self, position: Vec3) {
            self.position.set(position);
        }

        fn set_half_extent(&self, half_extent: Vec3) {
            self.half_extent.set(half_extent);
            self.dirty.set(true);
        }
    }

    impl Boundable for TestBoundable {
        fn half_extent(&self) -> Vec3 {
            self.half_extent.get()
        }
        fn transform(&self) -> Transform {
            Transform::from_position(self.position.get())
        }
        fn bounds_dirty(&self) -> bool {
            self.dirty.get()
        }
        fn clear_dirty(&self) {
            self.dirty.set(false);
        }
    }

    fn as_boundable(b: &Rc<TestBoundable>) -> Rc<dyn Boundable> {
        b.clone()
    }

    /// Asserts every structural invariant of the tree.
    fn validate(tree: &DynamicAabbTree) {
        let mut live_from_root = Vec::new();
        if tree.root != NULL_NODE {
            let mut stack = vec![tree.root];
            while let Some(id) = stack.pop() {
                live_from_root.push(id);
                let node = &tree.nodes[id];
                assert!(node.height >= 0, "freed node {id} reachable from root");

                if node.is_leaf() {
                    assert_eq!(node.height, 0, "leaf {id} must have height 0");
                    assert!(node.object.is_some());
                } else {
                    assert!(node.object.is_none(), "internal node {id} holds an object");
                    let (l, r) = (node.left, node.right);
                    assert!(l != NULL_NODE && r != NULL_NODE);
                    assert_eq!(tree.nodes[l].parent, id);
                    assert_eq!(tree.nodes[r].parent, id);

                    // Containment of both children, within tolerance.
                    assert!(node.bounds.contains_aabb(&tree.nodes[l].bounds));
                    assert!(node.bounds.contains_aabb(&tree.nodes[r].bounds));

                    // Height bookkeeping and the balance invariant.
                    let (hl, hr) = (tree.nodes[l].height, tree.nodes[r].height);
                    assert_eq!(node.height, 1 + hl.max(hr));
                    assert!((hl - hr).abs() <= 1, "unbalanced at node {id}");

                    stack.push(l);
                    stack.push(r);
                }
                assert!(node.fat_bounds.contains_aabb(&node.bounds));
            }
        }
        assert_eq!(live_from_root.len(), tree.node_count());

        // The free list must be disjoint from the live set.
        let mut free = tree.free_list;
        while free != NULL_NODE {
            assert!(tree.nodes[free].height < 0);
            assert!(!live_from_root.contains(&free));
            free = tree.nodes[free].parent;
        }
    }

    #[test]
    fn insert_remove_roundtrip() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let b = TestBoundable::new(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE);

        let id_a = tree.insert(&as_boundable(&a)).unwrap();
        let id_b = tree.insert(&as_boundable(&b)).unwrap();
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.node_count(), 3);
        validate(&tree);

        tree.remove(id_a);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.node_count(), 1);
        validate(&tree);

        tree.remove(id_b);
        assert_eq!(tree.node_count(), 0);
        validate(&tree);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);

        let first = tree.insert(&as_boundable(&a));
        assert!(first.is_some());
        assert!(tree.insert(&as_boundable(&a)).is_none());
        assert_eq!(tree.leaf_count(), 1);
        validate(&tree);
    }

    #[test]
    fn invalid_ids_are_no_ops() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let id = tree.insert(&as_boundable(&a)).unwrap();

        tree.remove(9999);
        tree.remove(NULL_NODE);
        assert!(tree.bounds(9999).is_none());
        assert_eq!(tree.leaf_count(), 1);

        // Double remove: second call must be ignored.
        tree.remove(id);
        tree.remove(id);
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn small_motion_keeps_the_leaf_in_place() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let id = tree.insert(&as_boundable(&a)).unwrap();

        let before = *tree.bounds(id).unwrap();

        // Fat bounds cover half_extent * 0.1 + 0.01 = 0.11 of slack; a 0.05
        // drift stays inside, so the stored bounds must not move.
        a.set_position(Vec3::new(0.05, 0.0, 0.0));
        tree.update();
        assert_eq!(*tree.bounds(id).unwrap(), before);

        // A 0.5 drift escapes the fat bounds and forces a refit.
        a.set_position(Vec3::new(0.5, 0.0, 0.0));
        tree.update();
        let after = tree.bounds(id).unwrap();
        assert!((after.center().x - 0.5).abs() < 1e-5);
        validate(&tree);
    }

    #[test]
    fn dirty_flag_forces_refit_and_is_cleared() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let id = tree.insert(&as_boundable(&a)).unwrap();

        a.set_half_extent(Vec3::splat(2.0));
        assert!(a.bounds_dirty());

        tree.update();
        assert!(!a.bounds_dirty());
        let bounds = tree.bounds(id).unwrap();
        assert!((bounds.half_extents().x - 2.0).abs() < 1e-5);
        validate(&tree);
    }

    #[test]
    fn expired_objects_are_dropped_on_update() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let b = TestBoundable::new(Vec3::new(4.0, 0.0, 0.0), Vec3::ONE);

        tree.insert(&as_boundable(&a)).unwrap();
        tree.insert(&as_boundable(&b)).unwrap();

        drop(a);
        tree.update();
        assert_eq!(tree.leaf_count(), 1);
        validate(&tree);
    }

    #[test]
    fn query_visits_exactly_the_overlapping_leaves() {
        let mut tree = DynamicAabbTree::new();
        let near = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let far_x = TestBoundable::new(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE);
        let far_y = TestBoundable::new(Vec3::new(0.0, 10.0, 0.0), Vec3::ONE);

        let id_near = tree.insert(&as_boundable(&near)).unwrap();
        let id_far_x = tree.insert(&as_boundable(&far_x)).unwrap();
        let id_far_y = tree.insert(&as_boundable(&far_y)).unwrap();

        let mut visited = Vec::new();
        tree.query_overlap(
            &Aabb::from_min_max(Vec3::splat(-2.0), Vec3::splat(2.0)),
            |id| visited.push(id),
        );
        assert_eq!(visited, vec![id_near]);

        let mut visited = Vec::new();
        tree.query_overlap(
            &Aabb::from_min_max(Vec3::splat(-2.0), Vec3::splat(11.0)),
            |id| visited.push(id),
        );
        visited.sort_unstable();
        let mut expected = vec![id_near, id_far_x, id_far_y];
        expected.sort_unstable();
        assert_eq!(visited, expected);
    }

    #[test]
    fn query_matches_brute_force() {
        // Deterministic pseudo-random layout via a small LCG.
        let mut seed = 0x2545_F491u64;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as f32 / u32::MAX as f32) * 100.0 - 50.0
        };

        let mut tree = DynamicAabbTree::new();
        let mut objects = Vec::new();
        for _ in 0..64 {
            let object = TestBoundable::new(
                Vec3::new(next(), next(), next()),
                Vec3::new(
                    next().abs() * 0.1 + 0.5,
                    next().abs() * 0.1 + 0.5,
                    next().abs() * 0.1 + 0.5,
                ),
            );
            let id = tree.insert(&as_boundable(&object)).unwrap();
            objects.push((id, object));
        }
        validate(&tree);

        for _ in 0..16 {
            let center = Vec3::new(next(), next(), next());
            let query = Aabb::from_center_half_extents(center, Vec3::splat(12.0));

            let mut visited: Vec<usize> = Vec::new();
            tree.query_overlap(&query, |id| visited.push(id));
            visited.sort_unstable();

            let mut expected: Vec<usize> = objects
                .iter()
                .filter(|(id, _)| tree.bounds(*id).unwrap().intersects_aabb(&query))
                .map(|(id, _)| *id)
                .collect();
            expected.sort_unstable();

            assert_eq!(visited, expected);
        }
    }

    #[test]
    fn tree_stays_balanced_under_sorted_insertion() {
        // Inserting a sorted line of boxes is the classic degenerate case;
        // the rotations must keep sibling heights within one.
        let mut tree = DynamicAabbTree::new();
        let mut keep_alive = Vec::new();
        for i in 0..32 {
            let object = TestBoundable::new(Vec3::new(i as f32 * 3.0, 0.0, 0.0), Vec3::ONE);
            tree.insert(&as_boundable(&object)).unwrap();
            keep_alive.push(object);
            validate(&tree);
        }
        assert_eq!(tree.leaf_count(), 32);
    }

    #[test]
    fn removal_keeps_invariants() {
        let mut tree = DynamicAabbTree::new();
        let mut entries = Vec::new();
        for i in 0..16 {
            let object = TestBoundable::new(Vec3::new(i as f32 * 2.5, 0.0, 0.0), Vec3::ONE);
            let id = tree.insert(&as_boundable(&object)).unwrap();
            entries.push((id, object));
        }

        // Remove every other leaf.
        for (id, _) in entries.iter().step_by(2) {
            tree.remove(*id);
            validate(&tree);
        }
        assert_eq!(tree.leaf_count(), 8);

        // Freed slots are recycled.
        let extra = TestBoundable::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::ONE);
        tree.insert(&as_boundable(&extra)).unwrap();
        validate(&tree);
    }

    #[test]
    fn structure_dump_mentions_every_leaf() {
        let mut tree = DynamicAabbTree::new();
        let a = TestBoundable::new(Vec3::ZERO, Vec3::ONE);
        let b = TestBoundable::new(Vec3::new(4.0, 0.0, 0.0), Vec3::ONE);
        tree.insert(&as_boundable(&a)).unwrap();
        tree.insert(&as_boundable(&b)).unwrap();

        let dump = tree.fmt_structure();
        assert_eq!(dump.matches("leaf").count(), 2);
        assert_eq!(dump.matches("node").count(), 2); // header + one internal
    }
}
