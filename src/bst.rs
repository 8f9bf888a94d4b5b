//! Plain binary search tree plumbing: descent, extrema, neighbours and relinking.
//!
//! Nothing in this module reads or writes balance factors.

use core::{borrow::Borrow, cmp::Ordering, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = self.links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = self.links(cur).right(),
                }
            }
        }
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.min_in_subtree(root) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.max_in_subtree(root) })
    }

    // Returns the minimum node in the subtree rooted at `root`.
    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Left) }
    }

    // Returns the maximum node in the subtree rooted at `root`.
    #[inline]
    pub(crate) unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Right) }
    }

    #[inline]
    unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        cur
    }

    /// Returns the in-order successor of `node`.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    /// Returns the in-order predecessor of `node`.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    // Returns the nearest node in direction `dir` in key order.
    //
    // If `node` has a `dir` subtree, this is the extreme node on the `!dir` side of that subtree.
    // Otherwise it is the first ancestor reached from its `!dir` side.
    unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = self.links(node).child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            let mut cur = node;
            while let Some(parent) = self.links(cur).parent() {
                if self.which_child(parent, cur) == !dir {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    #[inline]
    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if self.links(parent).left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    self.links(parent).right(),
                    Some(child),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }

    #[inline]
    pub(crate) unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            if let Some(new_child) = new_child {
                debug_assert_ne!(
                    self.links(parent).child(!dir),
                    Some(new_child),
                    "`new_child` must not be a child of `parent`"
                );
            }

            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    // Exchanges the positions of `a` and `b` in the tree.
    //
    // Afterwards `a` has the parent and children `b` had and vice versa. The nodes themselves, and
    // everything stored in them besides their position, stay put. Either node may be the parent
    // of the other.
    pub(crate) unsafe fn swap_positions(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if a == b {
            return;
        }

        // Where a link pointed at one of the pair, it now points at the other.
        let swap = |link: Link<T>| match link {
            Some(n) if n == a => Some(b),
            Some(n) if n == b => Some(a),
            other => other,
        };

        unsafe {
            let a_parent = self.links(a).parent();
            let a_children = [self.links(a).left(), self.links(a).right()];
            let a_dir = a_parent.map(|p| self.which_child(p, a));

            let b_parent = self.links(b).parent();
            let b_children = [self.links(b).left(), self.links(b).right()];
            let b_dir = b_parent.map(|p| self.which_child(p, b));

            // Rewrite the pair's own links.
            self.links_mut(a).set_parent(swap(b_parent));
            self.links_mut(a).set_left(swap(b_children[0]));
            self.links_mut(a).set_right(swap(b_children[1]));

            self.links_mut(b).set_parent(swap(a_parent));
            self.links_mut(b).set_left(swap(a_children[0]));
            self.links_mut(b).set_right(swap(a_children[1]));

            // Point the surrounding parents at their new children. A parent that is one of the
            // pair already had its child slot rewritten above.
            for (node, parent, dir) in [(b, a_parent, a_dir), (a, b_parent, b_dir)] {
                match (parent, dir) {
                    (Some(p), _) if p == a || p == b => {}
                    (Some(p), Some(dir)) => {
                        self.links_mut(p).set_child(dir, Some(node));
                    }
                    _ => self.root = Some(node),
                }
            }

            // Point the surrounding children at their new parents.
            for node in [a, b] {
                for dir in [Dir::Left, Dir::Right] {
                    let child = self.links(node).child(dir);
                    self.maybe_set_parent(child, Some(node));
                }
            }
        }
    }
}
