use core::{marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{AvlTree, Link, Links, TreeNode};

/// A read-only cursor over an [`AvlTree`].
///
/// The cursor rests either on an element or on a "ghost" position that sits after the maximum
/// element and before the minimum one. Stepping off either end lands on the ghost; stepping from
/// the ghost wraps around.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn first(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw::first(tree.into()),
            phantom: PhantomData,
        }
    }

    pub(crate) fn last(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw::last(tree.into()),
            phantom: PhantomData,
        }
    }

    /// Steps to the element with the next greater key, or onto the ghost after the maximum.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Steps to the element with the next smaller key, or onto the ghost before the minimum.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns the element under the cursor, or `None` on the ghost.
    pub fn get(&self) -> Option<&'tree T> {
        unsafe { self.curs.get() }
    }

    /// Returns the element [`move_next`](Self::move_next) would land on.
    pub fn peek_next(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns the element [`move_prev`](Self::move_prev) would land on.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_prev() }
    }
}

/// A cursor over an [`AvlTree`] which can remove the element it rests on.
///
/// Positioning follows the same rules as [`Cursor`].
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree mut AvlTree<T>>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn first(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw::first(tree.into()),
            phantom: PhantomData,
        }
    }

    pub(crate) fn last(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw::last(tree.into()),
            phantom: PhantomData,
        }
    }

    /// Returns a read-only cursor at the same position.
    ///
    /// The `CursorMut` stays borrowed for as long as the returned `Cursor` lives.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Steps to the element with the next greater key, or onto the ghost after the maximum.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Steps to the element with the next smaller key, or onto the ghost before the minimum.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns the element under the cursor, or `None` on the ghost.
    pub fn get(&self) -> Option<&T> {
        unsafe { self.curs.get() }
    }

    /// Returns a pinned mutable reference to the element under the cursor.
    ///
    /// # Safety
    ///
    /// The caller must not change the element's key in a way that alters how it compares against
    /// the other keys in the tree.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        unsafe { self.curs.get_mut() }
    }

    /// Returns the element [`move_next`](Self::move_next) would land on.
    pub fn peek_next(&self) -> Option<&T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns the element [`move_prev`](Self::move_prev) would land on.
    pub fn peek_prev(&self) -> Option<&T> {
        unsafe { self.curs.peek_prev() }
    }

    /// Removes the element under the cursor and steps to the next one.
    ///
    /// On the ghost this does nothing and returns `None`.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current() }
    }

    /// Removes the element under the cursor and steps to the previous one.
    ///
    /// On the ghost this does nothing and returns `None`.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current_and_move_prev() }
    }
}

struct CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<AvlTree<T>>,
    ptr: Link<T>,
}

impl<T> CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn first(tree: NonNull<AvlTree<T>>) -> CursorRaw<T> {
        CursorRaw {
            tree,
            ptr: unsafe { tree.as_ref().first_raw() },
        }
    }

    fn last(tree: NonNull<AvlTree<T>>) -> CursorRaw<T> {
        CursorRaw {
            tree,
            ptr: unsafe { tree.as_ref().last_raw() },
        }
    }

    unsafe fn next_ptr(&self) -> Link<T> {
        unsafe {
            let tree = self.tree.as_ref();

            match self.ptr {
                Some(p) => tree.successor_raw(p),
                None => tree.first_raw(),
            }
        }
    }

    unsafe fn prev_ptr(&self) -> Link<T> {
        unsafe {
            let tree = self.tree.as_ref();

            match self.ptr {
                Some(p) => tree.predecessor_raw(p),
                None => tree.last_raw(),
            }
        }
    }

    unsafe fn move_next(&mut self) {
        self.ptr = unsafe { self.next_ptr() };
    }

    unsafe fn move_prev(&mut self) {
        self.ptr = unsafe { self.prev_ptr() };
    }

    unsafe fn get<'a>(&self) -> Option<&'a T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn get_mut<'a>(&mut self) -> Option<Pin<&'a mut T>> {
        self.ptr
            .map(|mut p| unsafe { Pin::new_unchecked(p.as_mut()) })
    }

    unsafe fn peek_next<'a>(&self) -> Option<&'a T> {
        unsafe { self.next_ptr() }.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn peek_prev<'a>(&self) -> Option<&'a T> {
        unsafe { self.prev_ptr() }.map(|p| unsafe { p.as_ref() })
    }

    // Rebalancing after a removal rotates nodes but never reorders the survivors, so a neighbour
    // found before the removal is still the neighbour afterwards.
    unsafe fn remove_current(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.move_next();
            Some(self.tree.as_mut().remove_at(remove))
        }
    }

    unsafe fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.move_prev();
            Some(self.tree.as_mut().remove_at(remove))
        }
    }
}
