use super::arena::Arena;
use super::handle::Handle;
use super::node::{Color, Node};
use crate::error::{Error, Result};
use crate::range::Range;

/// Hard ceiling on the node capacity: half the ID domain plus one.
///
/// Worst case, alternating IDs occupy every other slot; once the tree holds
/// that many runs, any further ID is adjacent to an existing run and merges
/// instead of claiming a cell.
pub(crate) const MAX_CAPACITY: usize = (1 << 31) + 1;

/// `value_2` follows `value_1` immediately, without wrapping past `u32::MAX`.
const fn consecutive(value_1: u32, value_2: u32) -> bool {
    value_1 != u32::MAX && value_1 + 1 == value_2
}

/// Red-black tree of coalesced custody ID runs, backed by a fixed arena.
///
/// Between public calls the tree upholds: root black, no red node with a red
/// child, equal black depth on every path, in-order runs pairwise disjoint
/// and non-adjacent, and arena occupancy equal to the node count.
#[derive(Clone)]
pub(crate) struct RawRangeTree {
    nodes: Arena<Node>,
    root: Option<Handle>,
}

impl RawRangeTree {
    /// Reserves an arena of exactly `capacity` node cells.
    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if capacity > MAX_CAPACITY {
            return Err(Error::CapacityExceeded);
        }
        let nodes = Arena::try_with_capacity(capacity).map_err(|_| Error::AllocationFailed)?;
        Ok(Self { nodes, root: None })
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.nodes.is_full()
    }

    /// Recycles every node. The arena reservation is kept.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    pub(crate) fn root(&self) -> Option<Handle> {
        self.root
    }

    pub(crate) fn range_of(&self, handle: Handle) -> Range {
        self.node(handle).range
    }

    pub(crate) fn left(&self, handle: Handle) -> Option<Handle> {
        self.node(handle).left
    }

    pub(crate) fn right(&self, handle: Handle) -> Option<Handle> {
        self.node(handle).right
    }

    fn node(&self, handle: Handle) -> &Node {
        self.nodes.get(handle)
    }

    fn node_mut(&mut self, handle: Handle) -> &mut Node {
        self.nodes.get_mut(handle)
    }

    fn parent(&self, handle: Handle) -> Option<Handle> {
        self.node(handle).parent
    }

    fn is_red(&self, handle: Option<Handle>) -> bool {
        handle.is_some_and(|h| self.node(h).is_red())
    }

    /// NIL counts as black.
    fn is_black(&self, handle: Option<Handle>) -> bool {
        !self.is_red(handle)
    }

    fn is_left_child(&self, handle: Handle) -> bool {
        self.parent(handle).is_some_and(|p| self.node(p).left == Some(handle))
    }

    fn sibling(&self, handle: Handle) -> Option<Handle> {
        let parent = self.parent(handle)?;
        if self.node(parent).left == Some(handle) {
            self.node(parent).right
        } else {
            self.node(parent).left
        }
    }

    fn leftmost(&self, mut handle: Handle) -> Handle {
        while let Some(left) = self.left(handle) {
            handle = left;
        }
        handle
    }

    fn rightmost(&self, mut handle: Handle) -> Handle {
        while let Some(right) = self.right(handle) {
            handle = right;
        }
        handle
    }

    /// Rightmost node of the left subtree: the in-order predecessor.
    fn left_successor(&self, handle: Handle) -> Option<Handle> {
        self.left(handle).map(|l| self.rightmost(l))
    }

    /// Leftmost node of the right subtree: the in-order successor.
    fn right_successor(&self, handle: Handle) -> Option<Handle> {
        self.right(handle).map(|r| self.leftmost(r))
    }

    fn successor(&self, handle: Handle) -> Option<Handle> {
        self.left_successor(handle).or_else(|| self.right_successor(handle))
    }

    /// Points `node`'s parent slot (or the root) at `new_child` instead.
    fn replace_in_parent(&mut self, node: Handle, new_child: Option<Handle>) {
        let parent = self.parent(node);
        match parent {
            None => self.root = new_child,
            Some(p) => {
                if self.node(p).left == Some(node) {
                    self.node_mut(p).left = new_child;
                } else {
                    self.node_mut(p).right = new_child;
                }
            }
        }
        if let Some(child) = new_child {
            self.node_mut(child).parent = parent;
        }
    }

    fn rotate_left(&mut self, node: Handle) {
        let pivot = self.right(node).expect("`rotate_left()` - node has no right child!");
        let inner = self.left(pivot);
        self.node_mut(node).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(node);
        }
        self.replace_in_parent(node, Some(pivot));
        self.node_mut(pivot).left = Some(node);
        self.node_mut(node).parent = Some(pivot);
    }

    fn rotate_right(&mut self, node: Handle) {
        let pivot = self.left(node).expect("`rotate_right()` - node has no left child!");
        let inner = self.right(pivot);
        self.node_mut(node).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(node);
        }
        self.replace_in_parent(node, Some(pivot));
        self.node_mut(pivot).right = Some(node);
        self.node_mut(node).parent = Some(pivot);
    }

    /// Descends to the node whose run covers `value`.
    pub(crate) fn find(&self, value: u32) -> Option<Handle> {
        let mut cursor = self.root;
        while let Some(handle) = cursor {
            let range = self.node(handle).range;
            if range.contains(value) {
                return Some(handle);
            }
            cursor = if value < range.value { self.node(handle).left } else { self.node(handle).right };
        }
        None
    }

    pub(crate) fn contains(&self, value: u32) -> bool {
        self.find(value).is_some()
    }

    pub(crate) fn range_containing(&self, value: u32) -> Option<Range> {
        self.find(value).map(|h| self.node(h).range)
    }

    pub(crate) fn first(&self) -> Option<Range> {
        self.root.map(|r| self.node(self.leftmost(r)).range)
    }

    pub(crate) fn last(&self) -> Option<Range> {
        self.root.map(|r| self.node(self.rightmost(r)).range)
    }

    /// Inserts `value`, merging it into an adjacent run where one exists.
    pub(crate) fn insert(&mut self, value: u32) -> Result<()> {
        if let Some(new) = self.binary_insert_or_merge(value)? {
            self.insert_rebalance(new);
        }
        Ok(())
    }

    /// Merge-aware binary-search descent.
    ///
    /// Returns the handle of a newly attached red node still awaiting
    /// fix-up, or `None` when the value was absorbed into an existing run.
    /// On `Err` the tree is untouched.
    fn binary_insert_or_merge(&mut self, value: u32) -> Result<Option<Handle>> {
        let Some(mut cursor) = self.root else {
            let root = self.nodes.try_alloc(Node::new(value, Color::Black)).ok_or(Error::TreeFull)?;
            self.root = Some(root);
            return Ok(None);
        };
        loop {
            let range = self.node(cursor).range;
            if consecutive(value, range.value) {
                // The value extends this run downward. A run in the left
                // subtree ending at `value - 1` becomes contiguous too.
                if let Some(below) = self.left_successor(cursor) {
                    let below_range = self.node(below).range;
                    if consecutive(below_range.last(), value) {
                        self.node_mut(cursor).range =
                            Range::new(below_range.value, range.offset + below_range.offset + 2);
                        self.remove_node(below);
                        return Ok(None);
                    }
                }
                self.node_mut(cursor).range = Range::new(value, range.offset + 1);
                return Ok(None);
            } else if value < range.value {
                match self.node(cursor).left {
                    Some(left) => cursor = left,
                    None => {
                        let new = self.nodes.try_alloc(Node::new(value, Color::Red)).ok_or(Error::TreeFull)?;
                        self.node_mut(new).parent = Some(cursor);
                        self.node_mut(cursor).left = Some(new);
                        return Ok(Some(new));
                    }
                }
            } else if consecutive(range.last(), value) {
                // Upward extension, symmetric to the left-adjacent case.
                if let Some(above) = self.right_successor(cursor) {
                    let above_range = self.node(above).range;
                    if consecutive(value, above_range.value) {
                        self.node_mut(cursor).range =
                            Range::new(range.value, range.offset + above_range.offset + 2);
                        self.remove_node(above);
                        return Ok(None);
                    }
                }
                self.node_mut(cursor).range = Range::new(range.value, range.offset + 1);
                return Ok(None);
            } else if value > range.last() {
                match self.node(cursor).right {
                    Some(right) => cursor = right,
                    None => {
                        let new = self.nodes.try_alloc(Node::new(value, Color::Red)).ok_or(Error::TreeFull)?;
                        self.node_mut(new).parent = Some(cursor);
                        self.node_mut(cursor).right = Some(new);
                        return Ok(Some(new));
                    }
                }
            } else {
                // The run already covers the value.
                return Err(Error::DuplicateValue);
            }
        }
    }

    /// Restores the red-black rules after attaching the red node `node`.
    fn insert_rebalance(&mut self, mut node: Handle) {
        loop {
            let Some(parent) = self.parent(node) else {
                self.node_mut(node).color = Color::Black;
                return;
            };
            if self.is_black(Some(parent)) {
                return;
            }
            // The parent is red, so a grandparent exists: the root is black.
            let grandparent =
                self.parent(parent).expect("`insert_rebalance()` - red parent has no parent!");
            if let Some(uncle) = self.sibling(parent) {
                if self.node(uncle).is_red() {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    node = grandparent;
                    continue;
                }
            }
            // Straighten an inner grandchild so one rotation at the
            // grandparent finishes the repair.
            if self.node(grandparent).left == Some(parent) && self.node(parent).right == Some(node) {
                self.rotate_left(parent);
                node = self.left(node).expect("`insert_rebalance()` - rotation lost the parent!");
            } else if self.node(grandparent).right == Some(parent) && self.node(parent).left == Some(node) {
                self.rotate_right(parent);
                node = self.right(node).expect("`insert_rebalance()` - rotation lost the parent!");
            }
            let parent = self.parent(node).expect("`insert_rebalance()` - straightened node has no parent!");
            let grandparent =
                self.parent(parent).expect("`insert_rebalance()` - straightened node has no grandparent!");
            if self.is_left_child(node) {
                self.rotate_right(grandparent);
            } else {
                self.rotate_left(grandparent);
            }
            self.node_mut(parent).color = Color::Black;
            self.node_mut(grandparent).color = Color::Red;
            return;
        }
    }

    /// Removes `value` from whichever run covers it: drops a singleton node,
    /// trims a run edge, or splits a run around an interior value.
    pub(crate) fn remove(&mut self, value: u32) -> Result<()> {
        let node = self.find(value).ok_or(Error::ValueNotFound)?;
        let range = self.node(node).range;
        if range.offset == 0 {
            self.remove_node(node);
        } else if value == range.value {
            self.node_mut(node).range = Range::new(range.value + 1, range.offset - 1);
        } else if value == range.last() {
            self.node_mut(node).range = Range::new(range.value, range.offset - 1);
        } else {
            // Interior value: the upper segment needs a fresh cell. Check
            // occupancy before touching the run so a full arena fails with
            // nothing modified.
            if self.nodes.is_full() {
                return Err(Error::TreeFull);
            }
            self.node_mut(node).range = Range::new(range.value, value - range.value - 1);
            let upper = self
                .binary_insert_or_merge(value + 1)?
                .expect("`remove()` - split insert must attach a new node!");
            self.node_mut(upper).range = Range::new(value + 1, range.last() - value - 1);
            self.insert_rebalance(upper);
        }
        Ok(())
    }

    /// Unlinks a node and releases its cell, rebalancing as needed.
    pub(crate) fn remove_node(&mut self, node: Handle) {
        match self.successor(node) {
            Some(successor) => {
                // Swap payloads and delete at the successor's position,
                // which has at most one child. Links stay untouched.
                let node_range = self.node(node).range;
                let successor_range = self.node(successor).range;
                self.node_mut(node).range = successor_range;
                self.node_mut(successor).range = node_range;
                self.delete_one_child(successor);
            }
            None if self.parent(node).is_none() => {
                // Childless root.
                self.root = None;
                self.nodes.free(node);
            }
            None => self.delete_one_child(node),
        }
    }

    /// Deletes a node with at most one child.
    fn delete_one_child(&mut self, node: Handle) {
        let child = self.left(node).or_else(|| self.right(node));
        let node_was_black = self.is_black(Some(node));
        match child {
            None => {
                // A black leaf leaves its path one black short; repair while
                // the node still occupies its position, then detach it.
                if node_was_black {
                    self.delete_rebalance(node);
                }
                self.replace_in_parent(node, None);
            }
            Some(child) => {
                self.replace_in_parent(node, Some(child));
                if node_was_black {
                    if self.node(child).is_red() {
                        self.node_mut(child).color = Color::Black;
                    } else {
                        // A lone child of a black node is red in a balanced
                        // tree; kept for totality.
                        self.delete_rebalance(child);
                    }
                }
            }
        }
        self.nodes.free(node);
    }

    /// Repairs the tree when `node`'s subtree is one black node short.
    fn delete_rebalance(&mut self, mut node: Handle) {
        // Once the deficit reaches the root it applies to every path equally.
        while let Some(parent) = self.parent(node) {
            // A red sibling is rotated up so the cases below see a black one.
            let sibling = self.sibling(node).expect("`delete_rebalance()` - short node has no sibling!");
            if self.node(sibling).is_red() {
                self.node_mut(parent).color = Color::Red;
                self.node_mut(sibling).color = Color::Black;
                if self.is_left_child(node) {
                    self.rotate_left(parent);
                } else {
                    self.rotate_right(parent);
                }
            }

            let sibling = self.sibling(node).expect("`delete_rebalance()` - short node has no sibling!");
            let nephews_black = self.is_black(self.left(sibling)) && self.is_black(self.right(sibling));
            if nephews_black && self.is_black(Some(sibling)) {
                if self.is_black(Some(parent)) {
                    // Shortening the sibling side moves the deficit up a level.
                    self.node_mut(sibling).color = Color::Red;
                    node = parent;
                    continue;
                }
                // Trading the parent's red for the sibling evens both sides.
                self.node_mut(sibling).color = Color::Red;
                self.node_mut(parent).color = Color::Black;
                return;
            }

            // The sibling is black with at least one red child. Straighten a
            // near red nephew onto the far side first.
            if self.is_left_child(node) {
                if let Some(near) = self.left(sibling) {
                    if self.node(near).is_red() && self.is_black(self.right(sibling)) {
                        self.node_mut(sibling).color = Color::Red;
                        self.node_mut(near).color = Color::Black;
                        self.rotate_right(sibling);
                    }
                }
            } else if let Some(near) = self.right(sibling) {
                if self.node(near).is_red() && self.is_black(self.left(sibling)) {
                    self.node_mut(sibling).color = Color::Red;
                    self.node_mut(near).color = Color::Black;
                    self.rotate_left(sibling);
                }
            }

            // The far nephew is red: rotating the parent toward the short
            // side restores its missing black node.
            let sibling = self.sibling(node).expect("`delete_rebalance()` - short node has no sibling!");
            let parent_color = self.node(parent).color;
            self.node_mut(sibling).color = parent_color;
            self.node_mut(parent).color = Color::Black;
            if self.is_left_child(node) {
                let far = self.right(sibling).expect("`delete_rebalance()` - far nephew missing!");
                self.node_mut(far).color = Color::Black;
                self.rotate_left(parent);
            } else {
                let far = self.left(sibling).expect("`delete_rebalance()` - far nephew missing!");
                self.node_mut(far).color = Color::Black;
                self.rotate_right(parent);
            }
            return;
        }
    }

    /// Handle of the lowest run, where in-order traversal starts.
    pub(crate) fn first_handle(&self) -> Option<Handle> {
        self.root.map(|r| self.leftmost(r))
    }

    /// Removes the lowest run with full rebalancing and returns it.
    pub(crate) fn pop_first(&mut self) -> Option<Range> {
        let first = self.first_handle()?;
        let range = self.node(first).range;
        self.remove_node(first);
        Some(range)
    }

    /// Unlinks the minimum node `min` without rebalancing; returns its run
    /// and the next in-order handle.
    ///
    /// The minimum has no left child, so splicing its right child into its
    /// place preserves in-order position but not black depth. Only the
    /// consuming drain calls this: the tree is never searched again.
    pub(crate) fn splice_min(&mut self, min: Handle) -> (Range, Option<Handle>) {
        let range = self.node(min).range;
        let right = self.right(min);
        let next = match right {
            Some(right) => Some(self.leftmost(right)),
            None => self.parent(min),
        };
        self.replace_in_parent(min, right);
        self.nodes.free(min);
        (range, next)
    }
}
