//! Checks whether every leaf of a binary tree lies at the same depth.
//!
//! The check works on any binary tree, balanced or not. A tree with no nodes passes trivially.

/// A node of a binary tree with up to two children.
pub trait BinaryNode {
    fn left(&self) -> Option<&Self>;

    fn right(&self) -> Option<&Self>;
}

/// A plain, unbalanced binary tree node that owns its children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlainNode<K> {
    pub key: K,
    pub left: Option<Box<PlainNode<K>>>,
    pub right: Option<Box<PlainNode<K>>>,
}

impl<K> PlainNode<K> {
    /// Returns a node with no children.
    pub fn leaf(key: K) -> Self {
        PlainNode {
            key,
            left: None,
            right: None,
        }
    }

    /// Sets `child` as the left child, replacing any previous one.
    #[must_use]
    pub fn with_left(mut self, child: PlainNode<K>) -> Self {
        self.left = Some(Box::new(child));
        self
    }

    /// Sets `child` as the right child, replacing any previous one.
    #[must_use]
    pub fn with_right(mut self, child: PlainNode<K>) -> Self {
        self.right = Some(Box::new(child));
        self
    }
}

impl<K> BinaryNode for PlainNode<K> {
    fn left(&self) -> Option<&Self> {
        self.left.as_deref()
    }

    fn right(&self) -> Option<&Self> {
        self.right.as_deref()
    }
}

/// Returns `true` if every leaf below `root` lies at the same depth.
pub fn equal_paths<N>(root: Option<&N>) -> bool
where
    N: BinaryNode + ?Sized,
{
    leaves_at_equal_depth(root, |node| [node.left(), node.right()])
}

pub(crate) fn leaves_at_equal_depth<N, F>(root: Option<N>, children: F) -> bool
where
    N: Copy,
    F: Fn(N) -> [Option<N>; 2],
{
    let Some(root) = root else {
        return true;
    };

    // Depth of the first leaf reached; every later leaf must match it.
    let mut leaf_depth = None;
    check_paths(root, 0, &mut leaf_depth, &children)
}

fn check_paths<N, F>(node: N, depth: usize, leaf_depth: &mut Option<usize>, children: &F) -> bool
where
    N: Copy,
    F: Fn(N) -> [Option<N>; 2],
{
    let [left, right] = children(node);

    if left.is_none() && right.is_none() {
        return *leaf_depth.get_or_insert(depth) == depth;
    }

    // A missing child has no leaves and so cannot disagree.
    [left, right].into_iter().flatten().all(|child| {
        check_paths(child, depth + 1, leaf_depth, children)
    })
}
