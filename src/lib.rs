//! An intrusive AVL tree.
//!
//! Every node carries a balance factor, `h(right) - h(left)`, in its [`Links`]. In a valid tree
//! the balance factor of every node is -1, 0 or +1; values of ±2 only exist transiently while a
//! fix-up routine is running.

// Conventions used in comments:
// - The height of the subtree rooted at `x` is denoted `h(x)`; a missing subtree has height 0.
// - The balance factor of `x` is denoted `b(x)` and is always `h(right(x)) - h(left(x))`.
// - A node is `d`-heavy if its balance factor leans towards direction `d`.
//
// Rebalancing after insertion walks up from the new leaf while the subtree it just left grew
// taller. Rebalancing after removal walks up while the subtree it just left grew shorter. Both
// walks stop as soon as a subtree's height is unchanged, and both resolve a ±2 balance factor
// with the same single or double rotation.

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod bst;
mod cursor;
mod debug;
pub mod equal_paths;
mod error;
mod iter;
pub mod map;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use error::KeyError;
pub use iter::Iter;
pub use map::AvlMap;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// The tree owns every node inserted into it until the node is removed, at which point ownership
/// is returned to the caller as a `T::Handle`.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The links embedded in every node of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The change in a parent's balance factor when the subtree on this side grows.
    #[inline]
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }

    /// The side a non-zero balance factor leans towards.
    #[inline]
    fn heavy(balance: i8) -> Dir {
        debug_assert_ne!(balance, 0);

        if balance < 0 {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// The `diff` applied to a parent's balance factor when the subtree on this side shrinks.
    ///
    /// A shrunken left subtree yields +1 and a shrunken right subtree yields -1.
    #[inline]
    fn shrink_diff(self) -> i8 {
        match self {
            Dir::Left => 1,
            Dir::Right => -1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

/// The restructuring needed at a node whose balance factor has reached ±2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Rotation {
    /// The heavy child leans the same way as its parent, or not at all. The heavy child is
    /// rotated up into the parent's place.
    Single,
    /// The heavy child leans away from its parent. The heavy child's inner child is rotated up
    /// twice into the parent's place.
    Double,
}

impl Rotation {
    fn classify(heavy: Dir, child_balance: i8) -> Rotation {
        if child_balance * heavy.sign() >= 0 {
            Rotation::Single
        } else {
            Rotation::Double
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of nodes on the longest path from the root to a leaf.
    ///
    /// An empty tree has height 0.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut opt_cur = self.root;

        // The balance factor always points at a tallest subtree.
        while let Some(cur) = opt_cur {
            height += 1;

            unsafe {
                let links = self.links(cur);
                opt_cur = if links.balance() > 0 {
                    links.right()
                } else {
                    links.left()
                };
            }
        }

        height
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root {
            unsafe {
                assert_eq!(self.links(root).parent(), None, "root must not have a parent");
                self.assert_invariants_at(root, &mut count);
            }
        }

        assert_eq!(count, self.len, "stored length does not match node count");

        // In-order traversal must yield strictly increasing keys.
        let mut prev: Option<&T::Key> = None;
        for item in self.iter() {
            if let Some(prev) = prev {
                assert!(prev < item.key(), "keys out of order: {prev:?} >= {:?}", item.key());
            }
            prev = Some(item.key());
        }
    }

    // Returns the height of the subtree rooted at `node`.
    unsafe fn assert_invariants_at(&self, node: NonNull<T>, count: &mut usize) -> usize {
        *count += 1;

        let mut heights = [0; 2];

        unsafe {
            let key = node.as_ref().key();

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = self.links(node).child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = self
                        .links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    // Ensure the child is on the correct side of this node.
                    let expected = match dir {
                        Dir::Left => Ordering::Less,
                        Dir::Right => Ordering::Greater,
                    };
                    assert_eq!(child.as_ref().key().cmp(key), expected);

                    heights[dir as usize] = self.assert_invariants_at(child, count);
                }
            }

            let [left, right] = heights;
            let balance = self.links(node).balance();

            // Ensure the balance factor matches the actual subtree heights.
            assert_eq!(
                balance as isize,
                right as isize - left as isize,
                "balance factor of {key:?} is stale",
            );

            // Ensure the tree is balanced.
            assert!(
                (-1..=1).contains(&balance),
                "{key:?} is unbalanced ({balance})"
            );

            1 + left.max(right)
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        unsafe { Some(self.remove_at(first)) }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        unsafe { Some(self.remove_at(last)) }
    }

    /// Returns an iterator over the elements of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns an editing cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns an editing cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    /// Returns `true` if every leaf of the tree lies at the same depth.
    ///
    /// An empty tree trivially satisfies this.
    pub fn equal_paths(&self) -> bool {
        equal_paths::leaves_at_equal_depth(self.root, |node| unsafe {
            let links = self.links(node);
            [links.left(), links.right()]
        })
    }

    // Performs a rotation at `x`, moving `x` down towards `dir` and promoting its `!dir` child.
    //
    // `rotate(x, Dir::Left)` is a left rotation: `x`'s right child `y` takes `x`'s place, `x`
    // becomes `y`'s left child, and `y`'s former left subtree becomes `x`'s right subtree.
    //
    // Balance factors of affected nodes are not updated.
    unsafe fn rotate(&mut self, x: NonNull<T>, dir: Dir) {
        unsafe {
            let y = self
                .links(x)
                .child(!dir)
                .expect("rotation requires a child on the promoted side");

            // `across` goes from the `dir` child of `y` to the `!dir` child of `x`.
            let across = self.links(y).child(dir);
            self.links_mut(x).set_child(!dir, across);
            self.maybe_set_parent(across, Some(x));

            // `y` takes `x`'s place below `x`'s parent.
            let parent = self.links(x).parent();
            self.links_mut(y).set_parent(parent);
            self.replace_child_or_set_root(parent, x, Some(y));

            self.links_mut(y).set_child(dir, Some(x));
            self.links_mut(x).set_parent(Some(y));
        }
    }

    // Restores the balance of `node`, whose balance factor has reached ±2.
    //
    // Returns `true` if the subtree now rooted at `node`'s former position is one level shorter
    // than it was before the imbalance arose, which only happens after a removal.
    unsafe fn rotate_heavy(&mut self, node: NonNull<T>) -> bool {
        unsafe {
            let heavy = Dir::heavy(self.links(node).balance());
            debug_assert_eq!(self.links(node).balance(), 2 * heavy.sign());

            let s = heavy.sign();
            let child = self
                .links(node)
                .child(heavy)
                .expect("heavy side of an unbalanced node must be occupied");
            let child_balance = self.links(child).balance();

            let rotation = Rotation::classify(heavy, child_balance);
            tracing::trace!(key = ?node.as_ref().key(), ?heavy, ?rotation, "rebalancing");

            match rotation {
                Rotation::Single => {
                    self.rotate(node, !heavy);

                    if child_balance == 0 {
                        // Only reachable after a removal: the child's inner subtree is as tall
                        // as its outer one, so the rotated subtree keeps its height.
                        self.links_mut(node).set_balance(s);
                        self.links_mut(child).set_balance(-s);
                        false
                    } else {
                        self.links_mut(node).set_balance(0);
                        self.links_mut(child).set_balance(0);
                        true
                    }
                }

                Rotation::Double => {
                    let grandchild = self
                        .links(child)
                        .child(!heavy)
                        .expect("inner child of an opposite-leaning child must be occupied");
                    let grandchild_balance = self.links(grandchild).balance();

                    self.rotate(child, heavy);
                    self.rotate(node, !heavy);

                    let (node_balance, child_balance) = match grandchild_balance {
                        0 => (0, 0),
                        b if b == s => (-s, 0),
                        _ => (0, s),
                    };

                    self.links_mut(node).set_balance(node_balance);
                    self.links_mut(child).set_balance(child_balance);
                    self.links_mut(grandchild).set_balance(0);
                    true
                }
            }
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with an equal key, `item` takes over that item's
    /// position and balance factor, and the replaced item is returned. The shape of the tree is
    /// left unchanged in that case.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe { self.links_mut(ptr).clear() };

        let root = match self.root {
            Some(root) => root,
            None => {
                // Tree is empty. Set `item` as the root and return.
                self.root = Some(ptr);
                self.len += 1;
                return None;
            }
        };

        let mut parent = root;

        // Descend the tree, looking for a suitable leaf.
        let dir = loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return unsafe { Some(self.replace_at(parent, ptr)) },
                Ordering::Greater => Dir::Right,
            };

            match unsafe { self.links(parent).child(dir) } {
                // Descend.
                Some(child) => parent = child,
                None => break dir,
            }
        };

        unsafe {
            self.links_mut(parent).set_child(dir, Some(ptr));
            self.links_mut(ptr).set_parent(Some(parent));

            if self.links(parent).balance() != 0 {
                // The new leaf filled the parent's shorter side; the parent's height is unchanged.
                self.links_mut(parent).set_balance(0);
            } else {
                self.links_mut(parent).set_balance(dir.sign());
                self.rebalance_inserted(parent, ptr);
            }
        }

        self.len += 1;
        None
    }

    // Performs a bottom-up rebalance of the tree after the subtree rooted at `parent` grew taller.
    //
    // Invariants:
    // - `node` is a child of `parent`.
    // - `b(parent)` is ±1, leaning towards `node`.
    unsafe fn rebalance_inserted(&mut self, mut parent: NonNull<T>, mut node: NonNull<T>) {
        unsafe {
            while let Some(grandparent) = self.links(parent).parent() {
                debug_assert_eq!(
                    self.links(parent).balance(),
                    self.which_child(parent, node).sign()
                );

                let dir = self.which_child(grandparent, parent);
                let balance = self.links_mut(grandparent).update_balance(dir.sign());

                match balance {
                    // The grandparent's shorter side caught up; its height is unchanged.
                    0 => return,

                    // The grandparent grew taller on the side of `parent`. Ascend.
                    b if b == dir.sign() => {
                        node = parent;
                        parent = grandparent;
                    }

                    // The grandparent is now unbalanced towards `parent`. A rotation restores its
                    // original height, so nothing above it changes.
                    _ => {
                        self.rotate_heavy(grandparent);
                        return;
                    }
                }
            }
        }
    }

    // Puts `new` in the exact position of `old`, which is removed from the tree and returned.
    unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            let old_links = self.links(old);
            let balance = old_links.balance();
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();

            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            let new_links = self.links_mut(new);
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_balance(balance);

            self.links_mut(old).clear();

            T::from_ptr(old)
        }
    }

    /// Removes the item corresponding to `key` from the tree.
    ///
    /// Returns `None` and leaves the tree untouched if no such item exists.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        unsafe { Some(self.remove_at(node)) }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            // If `node` has two children, it trades places with its predecessor[^1], which has at
            // most one child. `node` is then removed from the predecessor's former position.
            //
            // [^1]: The predecessor of a node `a` is the greatest node in `a`'s left subtree.
            if let (Some(left), Some(_)) = (self.links(node).left(), self.links(node).right()) {
                let predecessor = self.max_in_subtree(left);
                self.swap_nodes(node, predecessor);
            }

            let links = self.links(node);
            let parent = links.parent();
            let child = links.left().or(links.right());

            // Splice `node` out, elevating its child (if any).
            let diff = match parent {
                Some(parent) => {
                    let dir = self.which_child(parent, node);
                    self.links_mut(parent).set_child(dir, child);
                    dir.shrink_diff()
                }
                None => {
                    self.root = child;
                    0
                }
            };
            self.maybe_set_parent(child, parent);

            self.links_mut(node).clear();
            self.len -= 1;

            if let Some(parent) = parent {
                self.rebalance_removed(parent, diff);
            }

            T::from_ptr(node)
        }
    }

    // Performs a bottom-up rebalance of the tree after one of `node`'s subtrees grew shorter.
    //
    // `diff` is +1 if the left subtree shrank and -1 if the right subtree shrank.
    unsafe fn rebalance_removed(&mut self, node: NonNull<T>, mut diff: i8) {
        let mut opt_cur = Some(node);

        while let Some(cur) = opt_cur {
            unsafe {
                // Record which side of its parent `cur` is on before any rotation moves it.
                let parent = self.links(cur).parent();
                let next_diff = parent
                    .map(|p| self.which_child(p, cur).shrink_diff())
                    .unwrap_or(0);

                let balance = self.links_mut(cur).update_balance(diff);

                let shrank = match balance {
                    // Both sides are now equally tall, one level shorter than before.
                    0 => true,

                    // The shorter side used to be the same height as the other; the subtree
                    // height is unchanged.
                    -1 | 1 => false,

                    -2 | 2 => self.rotate_heavy(cur),

                    _ => unreachable!("balance factor out of range: {balance}"),
                };

                if !shrank {
                    tracing::trace!(key = ?cur.as_ref().key(), "height unchanged, stopping");
                    return;
                }

                opt_cur = parent;
                diff = next_diff;
            }
        }
    }

    // Exchanges the positions of `a` and `b` in the tree, along with their balance factors.
    //
    // Each node's key and contents stay with the node; only the tree structure around them moves.
    unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        unsafe {
            self.swap_positions(a, b);

            let a_balance = self.links(a).balance();
            let b_balance = self.links_mut(b).set_balance(a_balance);
            self.links_mut(a).set_balance(b_balance);
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.min_in_subtree(cur);
                let parent = self.links(cur).parent();
                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn links_mut<'a>(&self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) -> i8 {
        mem::replace(&mut self.inner.get_mut().balance, balance)
    }

    // Adds `diff` to the balance factor, returning the new balance factor.
    #[inline]
    fn update_balance(&mut self, diff: i8) -> i8 {
        let inner = self.inner.get_mut();
        inner.balance = inner.balance.checked_add(diff).unwrap();
        inner.balance
    }

    // Resets the links to their unlinked state.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
