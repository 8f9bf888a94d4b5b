use std::ops::Range;

use proptest::prelude::*;

use crate::{
    equal_paths::{equal_paths, PlainNode},
    model::{self, TestNode},
};

use super::*;

// (key, left key, right key, balance) for every node, in pre-order.
type Shape = Vec<(u32, Option<u32>, Option<u32>, i8)>;

fn shape(tree: &AvlTree<TestNode>) -> Shape {
    fn key(link: Link<TestNode>) -> Option<u32> {
        link.map(|n| unsafe { n.as_ref().key })
    }

    fn walk(tree: &AvlTree<TestNode>, node: Link<TestNode>, out: &mut Shape) {
        let Some(node) = node else {
            return;
        };

        let links = unsafe { tree.links(node) };
        out.push((
            unsafe { node.as_ref().key },
            key(links.left()),
            key(links.right()),
            links.balance(),
        ));

        walk(tree, links.left(), out);
        walk(tree, links.right(), out);
    }

    let mut out = Vec::new();
    walk(tree, tree.root, &mut out);
    out
}

fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

// Calls `f` with every permutation of `0..n`.
fn for_each_permutation(n: u32, mut f: impl FnMut(&[u32])) {
    fn permute(items: &mut Vec<u32>, k: usize, f: &mut impl FnMut(&[u32])) {
        if k == items.len() {
            f(items);
            return;
        }

        for i in k..items.len() {
            items.swap(k, i);
            permute(items, k + 1, f);
            items.swap(k, i);
        }
    }

    let mut items: Vec<u32> = (0..n).collect();
    permute(&mut items, 0, &mut f);
}

// Deterministic shuffle of `0..n` using a linear congruential generator.
fn scrambled(n: u32, seed: u64) -> Vec<u32> {
    let mut state = seed;
    let mut items: Vec<u32> = (0..n).collect();

    for i in (1..items.len()).rev() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        items.swap(i, j);
    }

    items
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    assert_eq!(tree.len(), keys.len());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn up_to_six_elems_find() {
    for n in 2..=6 {
        for_each_permutation(n, insert_find_all);
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let removed = tree.remove(key).expect("item not found");
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_up_to_six() {
    for n in 2..=6 {
        for_each_permutation(n, insert_remove_all);
    }
}

#[test]
fn remove_in_every_order_from_seven() {
    let insert_order = [3, 1, 5, 0, 2, 4, 6];

    for_each_permutation(7, |remove_order| {
        let mut tree = tree_of(&insert_order);

        for key in remove_order {
            assert!(tree.remove(key).is_some());
            tree.assert_invariants();
        }

        assert!(tree.is_empty());
    });
}

#[test]
fn large_scrambled_insert_remove() {
    let insert_order = scrambled(2000, 1);
    let remove_order = scrambled(2000, 2);

    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in &insert_order {
        tree.insert(TestNode::new(key));
    }
    tree.assert_invariants();
    assert!(tree.height() <= model::height_bound(tree.len()));

    for (i, key) in remove_order.iter().enumerate() {
        assert!(tree.remove(key).is_some());

        if i % 97 == 0 {
            tree.assert_invariants();
        }
    }

    tree.assert_invariants();
    assert!(tree.is_empty());
}

#[test]
fn ascending_inserts_stay_balanced() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in 0..1023 {
        tree.insert(TestNode::new(key));
    }

    tree.assert_invariants();

    // 1023 keys inserted in order fill a perfect tree of ten levels.
    assert_eq!(tree.height(), 10);
    assert!(tree.equal_paths());
}

#[test]
fn right_right_insert_rotates_left() {
    let tree = tree_of(&[10, 20, 30]);

    assert_eq!(
        shape(&tree),
        vec![
            (20, Some(10), Some(30), 0),
            (10, None, None, 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn left_left_insert_rotates_right() {
    let tree = tree_of(&[30, 20, 10]);

    assert_eq!(
        shape(&tree),
        vec![
            (20, Some(10), Some(30), 0),
            (10, None, None, 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn left_right_insert_rotates_twice() {
    let tree = tree_of(&[30, 10, 20]);

    assert_eq!(
        shape(&tree),
        vec![
            (20, Some(10), Some(30), 0),
            (10, None, None, 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn right_left_insert_rotates_twice() {
    let tree = tree_of(&[10, 30, 20]);

    assert_eq!(
        shape(&tree),
        vec![
            (20, Some(10), Some(30), 0),
            (10, None, None, 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn insert_into_shorter_side_stops_at_parent() {
    let tree = tree_of(&[20, 10, 30, 5, 15]);

    assert_eq!(
        shape(&tree),
        vec![
            (20, Some(10), Some(30), -1),
            (10, Some(5), Some(15), 0),
            (5, None, None, 0),
            (15, None, None, 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn double_rotation_uses_grandchild_balance() {
    // 30 becomes left-heavy with its left child 10 leaning right through 20, which leans left.
    let tree = tree_of(&[30, 10, 40, 5, 20, 15]);

    assert_eq!(
        shape(&tree),
        vec![
            (20, Some(10), Some(30), 0),
            (10, Some(5), Some(15), 0),
            (5, None, None, 0),
            (15, None, None, 0),
            (30, None, Some(40), 1),
            (40, None, None, 0),
        ]
    );
}

#[test]
fn remove_root_of_complete_tree_uses_predecessor() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

    let removed = tree.remove(&4).expect("root must be present");
    assert_eq!(removed.key, 4);
    tree.assert_invariants();

    assert_eq!(keys(&tree), vec![1, 2, 3, 5, 6, 7]);
    assert_eq!(
        shape(&tree),
        vec![
            (3, Some(2), Some(6), 0),
            (2, Some(1), None, -1),
            (1, None, None, 0),
            (6, Some(5), Some(7), 0),
            (5, None, None, 0),
            (7, None, None, 0),
        ]
    );
}

#[test]
fn remove_with_balanced_sibling_keeps_height() {
    let mut tree = tree_of(&[2, 1, 4, 3, 5]);

    tree.remove(&1);
    tree.assert_invariants();

    // 2 became right-heavy by two with a balanced right child: one rotation, no height change.
    assert_eq!(
        shape(&tree),
        vec![
            (4, Some(2), Some(5), -1),
            (2, None, Some(3), 1),
            (3, None, None, 0),
            (5, None, None, 0),
        ]
    );
}

#[test]
fn remove_with_opposite_leaning_sibling_rotates_twice() {
    let mut tree = tree_of(&[2, 1, 4, 3]);

    tree.remove(&1);
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![
            (3, Some(2), Some(4), 0),
            (2, None, None, 0),
            (4, None, None, 0),
        ]
    );
}

#[test]
fn remove_propagates_through_several_ancestors() {
    // A minimal AVL tree of height five: every internal node leans left, so removing the
    // rightmost leaf shortens a subtree at every level on the way up.
    let mut tree = tree_of(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
    assert_eq!(tree.height(), 5);

    tree.remove(&12);
    tree.assert_invariants();

    assert_eq!(tree.height(), 4);
    assert_eq!(keys(&tree), (1..=11).collect::<Vec<_>>());
}

#[test]
fn insert_duplicate_replaces_in_place() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [4, 2, 6, 1, 3] {
        tree.insert(TestNode::with_value(key, key * 10));
    }

    let before = shape(&tree);
    let old = tree
        .insert(TestNode::with_value(2, 99))
        .expect("duplicate key must replace the existing item");
    tree.assert_invariants();

    assert_eq!(old.key, 2);
    assert_eq!(old.value, 20);
    assert_eq!(tree.get(&2).map(|node| node.value), Some(99));
    assert_eq!(tree.len(), 5);
    assert_eq!(shape(&tree), before);
}

#[test]
fn remove_absent_key_is_noop() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3]);
    let before = shape(&tree);

    assert!(tree.remove(&5).is_none());
    assert!(tree.remove(&100).is_none());
    tree.assert_invariants();

    assert_eq!(tree.len(), 5);
    assert_eq!(shape(&tree), before);

    let mut empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.remove(&0).is_none());
    assert!(empty.is_empty());
}

#[test]
fn swap_positions_exchanges_parent_and_child() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3]);
    let before = shape(&tree);

    let root = tree.root.unwrap();
    let left = tree.get_raw(&2).unwrap();

    unsafe {
        tree.swap_nodes(root, left);

        assert_eq!(tree.root, Some(left));
        assert_eq!(tree.links(root).parent(), Some(left));
        assert_eq!(tree.links(left).left(), Some(root));
        // Balance factors travel with the position.
        assert_eq!(tree.links(left).balance(), -1);
        assert_eq!(tree.links(root).balance(), 0);

        tree.swap_nodes(root, left);
    }

    assert_eq!(shape(&tree), before);
    tree.assert_invariants();
}

#[test]
fn swap_positions_exchanges_distant_nodes() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
    let before = shape(&tree);

    let a = tree.get_raw(&1).unwrap();
    let b = tree.get_raw(&6).unwrap();

    unsafe {
        tree.swap_positions(a, b);

        let two = tree.get_raw(&2);
        assert_eq!(tree.links(a).parent(), tree.root);
        assert_eq!(tree.links(b).parent(), two);
        assert_eq!(tree.links(a).left().map(|n| n.as_ref().key), Some(5));

        tree.swap_positions(a, b);
    }

    assert_eq!(shape(&tree), before);
}

#[test]
fn first_last_and_pop() {
    let mut tree = tree_of(&[5, 3, 8, 1, 4]);

    assert_eq!(tree.first().map(|n| n.key), Some(1));
    assert_eq!(tree.last().map(|n| n.key), Some(8));

    assert_eq!(tree.pop_first().map(|n| n.key), Some(1));
    tree.assert_invariants();
    assert_eq!(tree.pop_last().map(|n| n.key), Some(8));
    tree.assert_invariants();

    assert_eq!(keys(&tree), vec![3, 4, 5]);
}

#[test]
fn iter_runs_both_ways() {
    let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);

    let forward: Vec<u32> = tree.iter().map(|n| n.key).collect();
    let mut backward: Vec<u32> = tree.iter().rev().map(|n| n.key).collect();
    backward.reverse();

    assert_eq!(forward, vec![1, 3, 4, 5, 7, 8, 9]);
    assert_eq!(forward, backward);

    let mut iter = tree.iter();
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.next().map(|n| n.key), Some(1));
    assert_eq!(iter.next_back().map(|n| n.key), Some(9));
    assert_eq!(iter.len(), 5);
}

#[test]
fn cursor_wraps_through_ghost() {
    let tree = tree_of(&[2, 1, 3]);
    let mut cursor = tree.cursor_last();

    assert_eq!(cursor.get().map(|n| n.key), Some(3));
    cursor.move_next();
    assert!(cursor.get().is_none());
    assert_eq!(cursor.peek_next().map(|n| n.key), Some(1));
    assert_eq!(cursor.peek_prev().map(|n| n.key), Some(3));
    cursor.move_next();
    assert_eq!(cursor.get().map(|n| n.key), Some(1));
}

#[test]
fn clear_empties_tree() {
    let mut tree = tree_of(&scrambled(100, 7));
    tree.clear();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    tree.assert_invariants();
}

#[test]
fn dotgraph_labels_balance() {
    let tree = tree_of(&[2, 1, 3, 4]);

    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();

    assert!(out.contains("\"grapht-2\" [label=\"2:1\"]"));
    assert!(out.contains("\"grapht-3\" [label=\"3:1\"]"));
    assert!(out.contains("\"grapht-2\" -> \"grapht-3\";"));

    let empty: AvlTree<TestNode> = AvlTree::new();
    let mut out = String::new();
    empty.dotgraph("e", &mut out).unwrap();
    assert_eq!(out, "digraph \"graph-e\" {}");
}

#[test]
fn map_overwrites_and_looks_up() {
    let mut map = AvlMap::new();

    assert_eq!(map.insert(10, "a"), None);
    assert_eq!(map.insert(20, "b"), None);
    assert_eq!(map.insert(30, "c"), None);
    assert_eq!(map.insert(20, "B"), Some("b"));
    map.assert_invariants();

    assert_eq!(map.len(), 3);
    assert_eq!(map[&20], "B");
    assert_eq!(map.at(&30), Ok(&"c"));
    assert_eq!(map.at(&40), Err(KeyError));
    assert_eq!(KeyError.to_string(), "key not found");

    if let Some(v) = map.get_mut(&10) {
        *v = "A";
    }

    assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
    assert_eq!(map.values().copied().collect::<Vec<_>>(), vec!["A", "B", "c"]);
    assert_eq!(format!("{map:?}"), r#"{10: "A", 20: "B", 30: "c"}"#);

    assert_eq!(map.remove(&20), Some("B"));
    assert_eq!(map.remove(&20), None);
    map.assert_invariants();

    assert_eq!(map.pop_first(), Some((10, "A")));
    assert_eq!(map.pop_last(), Some((30, "c")));
    assert!(map.is_empty());
}

#[test]
#[should_panic(expected = "no entry found for key")]
fn map_index_missing_key_panics() {
    let map: AvlMap<u32, u32> = AvlMap::new();
    let _value = map[&1];
}

#[test]
fn equal_paths_on_plain_trees() {
    // Leaves at depths {2, 2, 2}.
    let even = PlainNode::leaf(1)
        .with_left(PlainNode::leaf(2).with_left(PlainNode::leaf(4)).with_right(PlainNode::leaf(5)))
        .with_right(PlainNode::leaf(3).with_left(PlainNode::leaf(6)));
    assert!(equal_paths(Some(&even)));

    // Leaves at depths {1, 3}.
    let uneven = PlainNode::leaf(1)
        .with_left(PlainNode::leaf(2))
        .with_right(PlainNode::leaf(3).with_right(PlainNode::leaf(4).with_left(PlainNode::leaf(5))));
    assert!(!equal_paths(Some(&uneven)));

    // A chain has a single leaf.
    let chain = PlainNode::leaf(1).with_left(PlainNode::leaf(2).with_right(PlainNode::leaf(3)));
    assert!(equal_paths(Some(&chain)));

    assert!(equal_paths::<PlainNode<u32>>(None));
    assert!(equal_paths(Some(&PlainNode::leaf(0))));
}

#[test]
fn equal_paths_on_avl_trees() {
    assert!(AvlTree::<TestNode>::new().equal_paths());
    assert!(tree_of(&[4, 2, 6, 1, 3, 5, 7]).equal_paths());
    assert!(tree_of(&[1, 2]).equal_paths());
    assert!(!tree_of(&[2, 1, 3, 4]).equal_paths());

    let mut map = AvlMap::new();
    for key in 0..3 {
        map.insert(key, ());
    }
    assert!(map.equal_paths());
}

#[test]
fn rotation_classification() {
    assert_eq!(Rotation::classify(Dir::Left, -1), Rotation::Single);
    assert_eq!(Rotation::classify(Dir::Left, 0), Rotation::Single);
    assert_eq!(Rotation::classify(Dir::Left, 1), Rotation::Double);
    assert_eq!(Rotation::classify(Dir::Right, 1), Rotation::Single);
    assert_eq!(Rotation::classify(Dir::Right, 0), Rotation::Single);
    assert_eq!(Rotation::classify(Dir::Right, -1), Rotation::Double);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }

    #[test]
    fn insert_all_remove_all_round_trip(
        keys in proptest::collection::btree_set(any::<u32>(), 0..300),
        seed in any::<u64>(),
    ) {
        let keys: Vec<u32> = keys.into_iter().collect();
        let mut map = AvlMap::new();

        for &key in &keys {
            prop_assert_eq!(map.insert(key, key), None);
            map.assert_invariants();
        }

        prop_assert!(map.height() <= model::height_bound(map.len()));

        for i in scrambled(keys.len() as u32, seed) {
            let key = keys[i as usize];
            prop_assert_eq!(map.remove(&key), Some(key));
            map.assert_invariants();
        }

        prop_assert!(map.is_empty());
        prop_assert_eq!(map.iter().next(), None);
    }

    #[test]
    fn remove_absent_keeps_order(
        keys in proptest::collection::btree_set(0u32..500, 0..200),
        absent in 500u32..1000,
    ) {
        let mut map = AvlMap::new();
        for &key in &keys {
            map.insert(key, ());
        }

        let before: Vec<u32> = map.keys().copied().collect();
        let height = map.height();

        prop_assert_eq!(map.remove(&absent), None);
        map.assert_invariants();

        prop_assert_eq!(map.keys().copied().collect::<Vec<_>>(), before);
        prop_assert_eq!(map.height(), height);
    }
}
