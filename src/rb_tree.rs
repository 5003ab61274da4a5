use alloc::vec::Vec;
use core::{cmp::Ordering, iter::FusedIterator};

use crate::{Error, Violation};

/// Arena index standing in for every absent child and for the root's parent.
///
/// The sentinel is never materialised: it has no key, no parent, and reads as black.
const NIL: usize = usize::MAX;

/// Red-Black tree node colors used to maintain tree balance properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

/// Child slot of a node. Every rebalancing case has a mirror image, written once
/// in terms of a side and its opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left = 0,
    Right = 1,
}

impl Side {
    #[inline]
    const fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone)]
struct Node<K> {
    key: K,
    color: Color,
    /// Cleared when the slot goes back to the free list
    live: bool,
    /// Index of parent node in the arena (`NIL` for the root)
    parent: usize,
    /// Left and right child indices (`NIL` when absent)
    children: [usize; 2],
}

/// Handle to a live node of an [`RbTree`].
///
/// A handle stays valid until the node it names is deleted. Deleting a node
/// with two children relocates its predecessor's key, see [`Removal::reseat`].
/// [`RbTree::delete`] refuses a handle whose slot has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(usize);

/// How [`RbTree::insert`] treats a key equal to one already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Equal keys are stored as separate nodes. A new key is placed after every
    /// equal key already present in in-order position.
    #[default]
    Allow,
    /// Insert of an equal key fails with [`Error::DuplicateKey`] and leaves the tree untouched.
    Reject,
}

/// Outcome of [`RbTree::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal<K> {
    key: K,
    relocation: Option<(NodeRef, NodeRef)>,
}

impl<K: Copy> Removal<K> {
    /// The key that left the tree
    #[inline]
    pub fn key(&self) -> K {
        self.key
    }

    /// `(from, to)` when the predecessor's key was copied from `from` into
    /// `to` and the `from` slot was released.
    #[inline]
    pub const fn relocation(&self) -> Option<(NodeRef, NodeRef)> {
        self.relocation
    }

    /// Maps a handle taken before the delete to the node holding the same
    /// value afterwards. Handles to the removed element itself are not
    /// meaningful and must not be reseated.
    #[inline]
    pub fn reseat(&self, node: NodeRef) -> NodeRef {
        match self.relocation {
            Some((from, to)) if from == node => to,
            _ => node,
        }
    }
}

/// A red-black tree whose nodes live in a growable arena addressed by index.
///
/// Parent links are plain indices, so the parent/child graph carries no
/// ownership cycles. Released slots go to a free list and are reused by later
/// inserts.
///
/// Insert, delete, and search are `O(log n)`; the height never exceeds
/// `2 * log2(n + 1)`.
#[derive(Debug, Clone)]
pub struct RbTree<K> {
    /// Node arena, live and released slots alike
    nodes: Vec<Node<K>>,
    /// Released slots available for reuse (LIFO)
    free_list: Vec<usize>,
    /// Index of the root node, `NIL` when the tree is empty
    root: usize,
    /// Number of live nodes
    len: usize,
    policy: DuplicatePolicy,
}

impl<K: Ord + Copy> Default for RbTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy> RbTree<K> {
    /// Creates an empty tree that accepts duplicate keys.
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NIL,
            len: 0,
            policy: DuplicatePolicy::Allow,
        }
    }

    /// Creates an empty tree with room for `capacity` nodes before the arena grows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Creates an empty tree with the given duplicate-key policy.
    pub const fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NIL,
            len: 0,
            policy,
        }
    }

    /// Number of keys stored, counting duplicates.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the tree holds no keys.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The duplicate-key policy fixed at construction.
    #[inline]
    pub const fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Removes every key, keeping the arena allocation.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.root = NIL;
        self.len = 0;
    }

    /// The key held by `node`.
    ///
    /// # Panics
    ///
    /// Panics if `node` never belonged to this tree. Debug builds also panic
    /// on a handle to a deleted node.
    #[inline]
    pub fn key(&self, node: NodeRef) -> &K {
        debug_assert!(self.is_live(node), "stale node handle");
        &self.node_at(node.0).key
    }

    /// Returns `true` while `node` names a node that has not been deleted.
    #[inline]
    pub fn is_live(&self, node: NodeRef) -> bool {
        self.nodes.get(node.0).is_some_and(|slot| slot.live)
    }

    /// Inserts `key` and returns a handle to its new node.
    ///
    /// Keys strictly less than a node descend left, everything else descends
    /// right. Under [`DuplicatePolicy::Reject`] an equal key fails with
    /// [`Error::DuplicateKey`] before anything is modified.
    pub fn insert(&mut self, key: K) -> Result<NodeRef, Error> {
        let mut parent = NIL;
        let mut side = Side::Left;
        let mut current = self.root;

        while current != NIL {
            let node = self.node_at(current);
            side = match key.cmp(&node.key) {
                Ordering::Less => Side::Left,
                Ordering::Equal if self.policy == DuplicatePolicy::Reject => {
                    return Err(Error::DuplicateKey);
                }
                _ => Side::Right,
            };
            parent = current;
            current = node.children[side as usize];
        }

        let idx = self.allocate_node(Node {
            key,
            color: Color::Red,
            live: true,
            parent,
            children: [NIL; 2],
        });

        if parent == NIL {
            self.root = idx;
        } else {
            self.set_child(parent, side, idx);
        }
        self.len += 1;

        self.fix_insertion_violations(idx);

        Ok(NodeRef(idx))
    }

    /// Finds a node holding `key`. With duplicates present, any one of them.
    pub fn search(&self, key: &K) -> Option<NodeRef> {
        let mut current = self.root;

        while current != NIL {
            let node = self.node_at(current);
            current = match key.cmp(&node.key) {
                Ordering::Equal => return Some(NodeRef(current)),
                Ordering::Less => node.children[Side::Left as usize],
                Ordering::Greater => node.children[Side::Right as usize],
            };
        }
        None
    }

    /// Returns `true` if some node holds `key`.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Leftmost node of the subtree rooted at `node`.
    #[inline]
    pub fn minimum(&self, node: NodeRef) -> NodeRef {
        NodeRef(self.extreme(node.0, Side::Left))
    }

    /// Rightmost node of the subtree rooted at `node`.
    #[inline]
    pub fn maximum(&self, node: NodeRef) -> NodeRef {
        NodeRef(self.extreme(node.0, Side::Right))
    }

    /// Node holding the smallest key.
    #[inline]
    pub fn first(&self) -> Option<NodeRef> {
        (self.root != NIL).then(|| NodeRef(self.extreme(self.root, Side::Left)))
    }

    /// Node holding the largest key.
    #[inline]
    pub fn last(&self) -> Option<NodeRef> {
        (self.root != NIL).then(|| NodeRef(self.extreme(self.root, Side::Right)))
    }

    /// Smallest key stored.
    pub fn min(&self) -> Option<K> {
        self.first().map(|node| *self.key(node))
    }

    /// Largest key stored.
    pub fn max(&self) -> Option<K> {
        self.last().map(|node| *self.key(node))
    }

    /// Next node in in-order position, `None` past the last node.
    #[inline]
    pub fn successor(&self, node: NodeRef) -> Option<NodeRef> {
        debug_assert!(self.is_live(node), "stale node handle");
        self.neighbor(node.0, Side::Right)
    }

    /// Previous node in in-order position, `None` before the first node.
    #[inline]
    pub fn predecessor(&self, node: NodeRef) -> Option<NodeRef> {
        debug_assert!(self.is_live(node), "stale node handle");
        self.neighbor(node.0, Side::Left)
    }

    /// Removes the node and returns what left the tree.
    ///
    /// A node with two children is not unlinked itself: the in-order
    /// predecessor's key is copied into it and the predecessor's slot is
    /// removed instead. The returned [`Removal`] records that move so
    /// outstanding handles can be reseated.
    ///
    /// # Errors
    ///
    /// [`Error::StaleHandle`] when `node` was already deleted or never
    /// belonged to this tree; the tree is left untouched.
    pub fn delete(&mut self, node: NodeRef) -> Result<Removal<K>, Error> {
        if !self.is_live(node) {
            return Err(Error::StaleHandle);
        }
        let mut target = node.0;
        let key = self.node_at(target).key;
        let mut relocation = None;

        let [left, right] = self.node_at(target).children;
        if left != NIL && right != NIL {
            let predecessor = self.extreme(left, Side::Right);
            self.node_at_mut(target).key = self.node_at(predecessor).key;
            relocation = Some((NodeRef(predecessor), NodeRef(target)));
            target = predecessor;
        }

        let [left, right] = self.node_at(target).children;
        let child = if left != NIL { left } else { right };
        let parent = self.node_at(target).parent;
        let removed_color = self.node_at(target).color;

        self.transplant(target, child);

        if removed_color == Color::Black {
            if self.is_red(child) {
                self.set_color(child, Color::Black);
            } else {
                self.fix_deletion_violations(child, parent);
            }
        }

        self.deallocate_node(target);
        self.len -= 1;

        Ok(Removal { key, relocation })
    }

    /// Removes one occurrence of `key`.
    pub fn remove(&mut self, key: &K) -> Result<K, Error> {
        let node = self.search(key).ok_or(Error::KeyNotFound)?;
        Ok(self.delete(node)?.key())
    }

    /// In-order iterator over the keys.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            tree: self,
            next: self.first(),
            remaining: self.len,
        }
    }

    /// Number of nodes on the longest root-to-sentinel path.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack = Vec::new();
        if self.root != NIL {
            stack.push((self.root, 1));
        }
        while let Some((idx, depth)) = stack.pop() {
            height = height.max(depth);
            for child in self.node_at(idx).children {
                if child != NIL {
                    stack.push((child, depth + 1));
                }
            }
        }
        height
    }

    /// Returns `true` when every red-black property and every back-reference holds.
    #[inline]
    pub fn check_invariants(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates the tree in `O(n)` without recursion.
    ///
    /// Checks:
    ///
    /// * The root is black and has no parent.
    /// * No red node has a red child.
    /// * Every child points back at its parent.
    /// * Every root-to-sentinel path has the same number of black nodes.
    /// * In-order keys are non-decreasing, strictly increasing under
    ///   [`DuplicatePolicy::Reject`].
    /// * The number of reachable nodes equals [`len`](Self::len).
    ///
    /// Returns the number of black nodes on any root-to-sentinel path.
    pub fn validate(&self) -> Result<usize, Error> {
        if self.root == NIL {
            return if self.len == 0 {
                Ok(0)
            } else {
                Err(Violation::LengthMismatch {
                    expected: self.len,
                    found: 0,
                }
                .into())
            };
        }
        if self.is_red(self.root) {
            return Err(Violation::RedRoot.into());
        }
        if self.node_at(self.root).parent != NIL {
            return Err(Violation::RootHasParent.into());
        }

        let mut black_height = None;
        let mut reached = 0;
        let mut stack = Vec::with_capacity(self.height_bound());
        stack.push((self.root, 1));

        while let Some((idx, blacks)) = stack.pop() {
            reached += 1;
            if reached > self.len {
                return Err(Violation::LengthMismatch {
                    expected: self.len,
                    found: reached,
                }
                .into());
            }

            let node = self.node_at(idx);
            for child in node.children {
                if child == NIL {
                    match black_height {
                        None => black_height = Some(blacks),
                        Some(height) if height != blacks => {
                            return Err(Violation::BlackHeightMismatch.into());
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                let child_node = self.node_at(child);
                if child_node.parent != idx {
                    return Err(Violation::BrokenParentLink.into());
                }
                if node.color == Color::Red && child_node.color == Color::Red {
                    return Err(Violation::RedRedEdge.into());
                }
                let weight = usize::from(child_node.color == Color::Black);
                stack.push((child, blacks + weight));
            }
        }

        if reached != self.len {
            return Err(Violation::LengthMismatch {
                expected: self.len,
                found: reached,
            }
            .into());
        }

        let strict = self.policy == DuplicatePolicy::Reject;
        let mut keys = self.iter();
        if let Some(mut prev) = keys.next() {
            for key in keys {
                match prev.cmp(key) {
                    Ordering::Greater => return Err(Violation::OutOfOrder.into()),
                    Ordering::Equal if strict => return Err(Violation::OutOfOrder.into()),
                    _ => {}
                }
                prev = key;
            }
        }

        Ok(black_height.unwrap_or(0))
    }

    /// Upper bound on the height for the current length, `2 * log2(n + 1)`.
    fn height_bound(&self) -> usize {
        2 * (usize::BITS - self.len.leading_zeros()) as usize + 1
    }

    fn allocate_node(&mut self, node: Node<K>) -> usize {
        match self.free_list.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn deallocate_node(&mut self, idx: usize) {
        let node = self.node_at_mut(idx);
        node.live = false;
        node.parent = NIL;
        node.children = [NIL; 2];
        self.free_list.push(idx);
    }

    #[inline]
    fn node_at(&self, idx: usize) -> &Node<K> {
        debug_assert!(idx != NIL, "sentinel has no node");
        &self.nodes[idx]
    }

    #[inline]
    fn node_at_mut(&mut self, idx: usize) -> &mut Node<K> {
        debug_assert!(idx != NIL, "sentinel has no node");
        &mut self.nodes[idx]
    }

    #[inline]
    fn color_of(&self, idx: usize) -> Color {
        if idx == NIL {
            Color::Black
        } else {
            self.node_at(idx).color
        }
    }

    #[inline]
    fn set_color(&mut self, idx: usize, color: Color) {
        if idx != NIL {
            self.node_at_mut(idx).color = color;
        }
    }

    #[inline]
    fn is_red(&self, idx: usize) -> bool {
        self.color_of(idx) == Color::Red
    }

    #[inline]
    fn is_black(&self, idx: usize) -> bool {
        self.color_of(idx) == Color::Black
    }

    #[inline]
    fn parent_of(&self, idx: usize) -> usize {
        if idx == NIL {
            NIL
        } else {
            self.node_at(idx).parent
        }
    }

    #[inline]
    fn child(&self, idx: usize, side: Side) -> usize {
        if idx == NIL {
            NIL
        } else {
            self.node_at(idx).children[side as usize]
        }
    }

    #[inline]
    fn set_child(&mut self, idx: usize, side: Side, child: usize) {
        self.node_at_mut(idx).children[side as usize] = child;
    }

    /// Which side of `parent` the slot holding `idx` is on. `idx` may be the
    /// sentinel, in which case the empty side of `parent` is meant.
    #[inline]
    fn side_in(&self, parent: usize, idx: usize) -> Side {
        if self.child(parent, Side::Left) == idx {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Walks to the far end of the subtree at `idx` on `side`.
    fn extreme(&self, mut idx: usize, side: Side) -> usize {
        loop {
            let next = self.child(idx, side);
            if next == NIL {
                return idx;
            }
            idx = next;
        }
    }

    /// In-order neighbour of `idx` towards `side`.
    fn neighbor(&self, idx: usize, side: Side) -> Option<NodeRef> {
        let down = self.child(idx, side);
        if down != NIL {
            return Some(NodeRef(self.extreme(down, side.opposite())));
        }

        let mut current = idx;
        let mut parent = self.parent_of(idx);
        while parent != NIL && self.child(parent, side) == current {
            current = parent;
            parent = self.parent_of(parent);
        }
        (parent != NIL).then_some(NodeRef(parent))
    }

    /// Points the slot of `parent` that held `old` at `new`; re-roots when
    /// `parent` is the sentinel.
    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if parent == NIL {
            self.root = new;
        } else {
            let side = self.side_in(parent, old);
            self.set_child(parent, side, new);
        }
    }

    /// Puts `new` (possibly the sentinel) where `old` hangs.
    fn transplant(&mut self, old: usize, new: usize) {
        let parent = self.node_at(old).parent;
        self.replace_child(parent, old, new);
        if new != NIL {
            self.node_at_mut(new).parent = parent;
        }
    }

    /// Rotates `x` down towards `side`; its child on the opposite side takes its place.
    fn rotate(&mut self, x: usize, side: Side) {
        let up = side.opposite();
        let y = self.child(x, up);
        debug_assert!(y != NIL, "rotation needs a child to lift");

        let inner = self.child(y, side);
        self.set_child(x, up, inner);
        if inner != NIL {
            self.node_at_mut(inner).parent = x;
        }

        let parent = self.node_at(x).parent;
        self.node_at_mut(y).parent = parent;
        self.replace_child(parent, x, y);

        self.set_child(y, side, x);
        self.node_at_mut(x).parent = y;
    }

    #[inline]
    fn rotate_left(&mut self, x: usize) {
        self.rotate(x, Side::Left);
    }

    #[inline]
    fn rotate_right(&mut self, x: usize) {
        self.rotate(x, Side::Right);
    }

    fn rotate_towards(&mut self, x: usize, side: Side) {
        match side {
            Side::Left => self.rotate_left(x),
            Side::Right => self.rotate_right(x),
        }
    }

    fn fix_insertion_violations(&mut self, mut node: usize) {
        while self.is_red(self.parent_of(node)) {
            // A red parent is never the root, so the grandparent is real.
            let parent = self.parent_of(node);
            let grandparent = self.parent_of(parent);
            let side = self.side_in(grandparent, parent);
            let uncle = self.child(grandparent, side.opposite());

            if self.is_red(uncle) {
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grandparent, Color::Red);
                node = grandparent;
                continue;
            }

            if node == self.child(parent, side.opposite()) {
                node = parent;
                self.rotate_towards(node, side);
            }
            let parent = self.parent_of(node);
            let grandparent = self.parent_of(parent);
            self.set_color(parent, Color::Black);
            self.set_color(grandparent, Color::Red);
            self.rotate_towards(grandparent, side.opposite());
        }
        self.set_color(self.root, Color::Black);
    }

    /// Restores the black height after a black node was spliced out. `node`
    /// is the replacement (possibly the sentinel) and `parent` its parent.
    fn fix_deletion_violations(&mut self, mut node: usize, mut parent: usize) {
        while node != self.root && self.is_black(node) {
            let side = self.side_in(parent, node);
            let far = side.opposite();
            let mut sibling = self.child(parent, far);

            if self.is_red(sibling) {
                self.set_color(sibling, Color::Black);
                self.set_color(parent, Color::Red);
                self.rotate_towards(parent, side);
                sibling = self.child(parent, far);
            }

            if self.is_black(self.child(sibling, Side::Left))
                && self.is_black(self.child(sibling, Side::Right))
            {
                self.set_color(sibling, Color::Red);
                if self.is_red(parent) {
                    self.set_color(parent, Color::Black);
                    return;
                }
                node = parent;
                parent = self.parent_of(node);
                continue;
            }

            if self.is_black(self.child(sibling, far)) {
                self.set_color(self.child(sibling, side), Color::Black);
                self.set_color(sibling, Color::Red);
                self.rotate_towards(sibling, far);
                sibling = self.child(parent, far);
            }

            self.set_color(sibling, self.color_of(parent));
            self.set_color(parent, Color::Black);
            self.set_color(self.child(sibling, far), Color::Black);
            self.rotate_towards(parent, side);
            node = self.root;
        }
        self.set_color(node, Color::Black);
    }
}

/// In-order iterator over the keys of an [`RbTree`], created by [`RbTree::iter`].
#[derive(Debug, Clone)]
pub struct Iter<'a, K> {
    tree: &'a RbTree<K>,
    next: Option<NodeRef>,
    remaining: usize,
}

impl<'a, K: Ord + Copy> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = self.tree.successor(node);
        self.remaining = self.remaining.saturating_sub(1);
        Some(self.tree.key(node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Ord + Copy> ExactSizeIterator for Iter<'_, K> {}

impl<K: Ord + Copy> FusedIterator for Iter<'_, K> {}

impl<'a, K: Ord + Copy> IntoIterator for &'a RbTree<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
