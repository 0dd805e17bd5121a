//! Randomized operation sequences checked against std collections, with the
//! full red-black invariant check after every mutation.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use rb_pool_tree::{First, Less, OrderedSet, Pool, PoolConfig, RbTree};

#[derive(Debug, Clone)]
enum Op {
    InsertUnique(u8),
    InsertEqual(u8),
    EraseKey(u8),
    EraseFirst,
    EraseLast,
    EraseRange(u8, u8),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => any::<u8>().prop_map(Op::InsertUnique),
        8 => any::<u8>().prop_map(Op::InsertEqual),
        6 => any::<u8>().prop_map(Op::EraseKey),
        2 => Just(Op::EraseFirst),
        2 => Just(Op::EraseLast),
        2 => (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::EraseRange(a.min(b), a.max(b))),
        1 => Just(Op::Clear),
    ]
}

fn expand(model: &BTreeMap<u8, usize>) -> Vec<u8> {
    model
        .iter()
        .flat_map(|(&k, &n)| std::iter::repeat(k).take(n))
        .collect()
}

fn decrement(model: &mut BTreeMap<u8, usize>, key: u8) {
    if let Some(n) = model.get_mut(&key) {
        *n -= 1;
        if *n == 0 {
            let _ignore = model.remove(&key);
        }
    }
}

proptest! {
    /// Every mutation keeps the tree valid and equal to a counted multiset.
    #[test]
    fn prop_tree_matches_multiset_model(ops in prop::collection::vec(op_strategy(), 1..300)) {
        let mut tree = RbTree::new();
        let mut model: BTreeMap<u8, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::InsertUnique(k) => {
                    let (pos, inserted) = tree.insert_unique(k).unwrap();
                    prop_assert_eq!(inserted, !model.contains_key(&k));
                    prop_assert_eq!(tree.get(pos), Some(&k));
                    let _ignore = model.entry(k).or_insert(1);
                }
                Op::InsertEqual(k) => {
                    let pos = tree.insert_equal(k).unwrap();
                    prop_assert_eq!(tree.get(pos), Some(&k));
                    // lands after every equivalent key
                    prop_assert!(tree.get(tree.next(pos)).map_or(true, |&next| next > k));
                    *model.entry(k).or_insert(0) += 1;
                }
                Op::EraseKey(k) => {
                    let removed = tree.erase_key(&k);
                    prop_assert_eq!(removed, model.remove(&k).unwrap_or(0));
                }
                Op::EraseFirst => {
                    if let Some(&min) = tree.first() {
                        let begin = tree.begin();
                        let next = tree.erase(begin);
                        prop_assert_eq!(next, tree.begin());
                        decrement(&mut model, min);
                    }
                }
                Op::EraseLast => {
                    if !tree.is_empty() {
                        let last = tree.prev(tree.end());
                        let value = tree.remove(last);
                        prop_assert_eq!(Some(&value), model.keys().next_back());
                        decrement(&mut model, value);
                    }
                }
                Op::EraseRange(lo, hi) => {
                    let first = tree.lower_bound(&lo);
                    let last = tree.upper_bound(&hi);
                    prop_assert_eq!(tree.erase_range(first, last), last);
                    model.retain(|&k, _| k < lo || k > hi);
                }
                Op::Clear => {
                    tree.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(tree.validate(), Ok(()));
            let expected = expand(&model);
            prop_assert_eq!(tree.len(), expected.len());
            prop_assert_eq!(tree.iter().copied().collect::<Vec<_>>(), expected);
        }
    }

    /// Lookups agree with the model for every key.
    #[test]
    fn prop_lookups_match_model(keys in prop::collection::vec(0u8..64, 0..200)) {
        let mut tree = RbTree::new();
        tree.insert_equal_iter(keys.iter().copied()).unwrap();
        let sorted: Vec<u8> = {
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            sorted
        };

        for k in 0u8..=64 {
            let count = sorted.iter().filter(|&&x| x == k).count();
            prop_assert_eq!(tree.count(&k), count);
            prop_assert_eq!(tree.contains(&k), count > 0);

            let below = sorted.iter().filter(|&&x| x < k).count();
            let lower: Vec<u8> = tree.cursor_range(tree.lower_bound(&k), tree.end()).copied().collect();
            prop_assert_eq!(lower.as_slice(), &sorted[below..]);
            let upper: Vec<u8> = tree.cursor_range(tree.begin(), tree.upper_bound(&k)).copied().collect();
            prop_assert_eq!(upper.as_slice(), &sorted[..below + count]);
        }
    }

    /// Equal keys keep their insertion order whatever the interleaving.
    #[test]
    fn prop_insert_equal_is_stable(keys in prop::collection::vec(0u8..8, 0..200)) {
        let mut tree: RbTree<(u8, usize), First> = RbTree::with_parts(First, Less, Pool::new());
        let mut model: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
        for (seq, &k) in keys.iter().enumerate() {
            let _ignore = tree.insert_equal((k, seq)).unwrap();
            model.entry(k).or_default().push(seq);
        }
        prop_assert_eq!(tree.validate(), Ok(()));
        let expected: Vec<(u8, usize)> = model
            .iter()
            .flat_map(|(&k, seqs)| seqs.iter().map(move |&seq| (k, seq)))
            .collect();
        prop_assert_eq!(tree.iter().copied().collect::<Vec<_>>(), expected);
    }

    /// The tree stays correct over any valid pool configuration.
    #[test]
    fn prop_tree_over_any_pool_config(
        align_shift in 3u32..6,
        classes in 1usize..20,
        batch in 1usize..30,
        keys in prop::collection::vec(any::<u16>(), 0..200)
    ) {
        let align = 1usize << align_shift;
        let config = PoolConfig { align, max_bytes: align * classes, batch };
        let mut tree = RbTree::with_pool(Pool::with_config(config).unwrap());
        for &k in &keys {
            let _ignore = tree.insert_unique(k).unwrap();
        }
        prop_assert_eq!(tree.validate(), Ok(()));
        for k in keys.iter().step_by(2) {
            let _ignore = tree.erase_key(k);
        }
        prop_assert_eq!(tree.validate(), Ok(()));
        let copy = tree.try_clone().unwrap();
        prop_assert_eq!(&copy, &tree);
    }

    /// The set container behaves like `BTreeSet`.
    #[test]
    fn prop_set_matches_btreeset(
        inserts in prop::collection::vec(any::<i16>(), 0..200),
        removes in prop::collection::vec(any::<i16>(), 0..100)
    ) {
        let mut set = OrderedSet::new();
        let mut model = BTreeSet::new();
        for v in inserts {
            prop_assert_eq!(set.insert(v).unwrap(), model.insert(v));
        }
        for v in removes {
            prop_assert_eq!(set.remove(&v), model.remove(&v));
        }
        prop_assert_eq!(set.len(), model.len());
        prop_assert!(set.iter().eq(model.iter()));
        prop_assert_eq!(set.first(), model.first());
        prop_assert_eq!(set.last(), model.last());
    }

    /// Live pool blocks never overlap, whatever the mix of sizes.
    #[test]
    fn prop_pool_blocks_do_not_overlap(sizes in prop::collection::vec(0usize..300, 1..100)) {
        let mut pool = Pool::new();
        let mut live = Vec::new();
        for (i, &size) in sizes.iter().enumerate() {
            let tag = i as u8;
            let block = pool.allocate(size).unwrap();
            unsafe { std::ptr::write_bytes(block.as_ptr(), tag, size) };
            live.push((block, size, tag));
            if i % 3 == 2 {
                let (block, size, _) = live.remove(0);
                unsafe { pool.deallocate(block, size) };
            }
        }
        for &(block, size, tag) in &live {
            let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr(), size) };
            prop_assert!(bytes.iter().all(|&b| b == tag));
        }
        for (block, size, _) in live {
            unsafe { pool.deallocate(block, size) };
        }
    }
}
