use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, RangeBounds};

use tracing::trace;

use crate::error::AllocError;
use crate::index::{DefaultIx, IndexType, NodeIndex};
use crate::iter::{IntoIter, Iter, Range};
use crate::key::{Compare, Identity, KeyOfValue, Less};
use crate::node::{Color, Node};
use crate::pool::Pool;
use crate::store::NodeStore;

/// A position in an `RbTree`: either an entry or `end()`.
///
/// Cursors are plain handles and stay valid across inserts and across the
/// removal of any other entry. Using a cursor whose entry was erased is a
/// logic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor<Ix = DefaultIx>(pub(crate) NodeIndex<Ix>);

impl<Ix: IndexType> Cursor<Ix> {
    /// Returns `true` for the past-the-end position.
    #[inline]
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.0.is_header()
    }
}

/// An ordered collection of values kept in a red-black tree.
///
/// The ordering key is extracted from each value by `KoV` and ordered by `C`.
/// Nodes are allocated from a size-class `Pool` owned by the tree.
///
/// # Example
/// ```rust
/// use rb_pool_tree::RbTree;
///
/// let mut tree = RbTree::new();
/// for k in [5, 3, 8, 1, 4, 7, 9] {
///     tree.insert_unique(k).unwrap();
/// }
/// assert_eq!(tree.iter().copied().collect::<Vec<_>>(), [1, 3, 4, 5, 7, 8, 9]);
/// assert_eq!(tree.get(tree.find(&4)), Some(&4));
/// assert_eq!(tree.erase_key(&5), 1);
/// assert_eq!(tree.iter().copied().collect::<Vec<_>>(), [1, 3, 4, 7, 8, 9]);
/// ```
pub struct RbTree<V, KoV = Identity, C = Less, Ix = DefaultIx> {
    /// Nodes and the header sentinel
    pub(crate) store: NodeStore<V, Ix>,
    /// Key projection
    pub(crate) key_of: KoV,
    /// Strict weak ordering over keys
    pub(crate) compare: C,
    /// Number of elements in the tree
    pub(crate) len: usize,
}

impl<V: Ord> RbTree<V> {
    /// Create an empty tree ordered by `Ord`.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool(Pool::new())
    }

    /// Create an empty tree ordered by `Ord` allocating from `pool`.
    #[inline]
    #[must_use]
    pub fn with_pool(pool: Pool) -> Self {
        Self::with_parts(Identity, Less, pool)
    }
}

impl<V: Ord> Default for RbTree<V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C> RbTree<V, Identity, C>
where
    C: Compare<V>,
{
    /// Create an empty tree ordered by `compare`.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::{Greater, RbTree};
    ///
    /// let mut tree = RbTree::with_compare(Greater);
    /// tree.insert_unique_iter([2, 9, 4]).unwrap();
    /// assert_eq!(tree.first(), Some(&9));
    /// ```
    #[inline]
    #[must_use]
    pub fn with_compare(compare: C) -> Self {
        Self::with_parts(Identity, compare, Pool::new())
    }
}

impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    /// Create an empty tree from a key projection, an ordering and a pool.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::{First, Less, Pool, RbTree};
    ///
    /// let mut map: RbTree<(u32, &str), First> = RbTree::with_parts(First, Less, Pool::new());
    /// map.insert_unique((2, "two")).unwrap();
    /// map.insert_unique((1, "one")).unwrap();
    /// assert_eq!(map.get(map.find(&2)), Some(&(2, "two")));
    /// ```
    #[inline]
    #[must_use]
    pub fn with_parts(key_of: KoV, compare: C, pool: Pool) -> Self {
        Self {
            store: NodeStore::new(pool),
            key_of,
            compare,
            len: 0,
        }
    }

    /// Return the number of elements in the tree.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return `true` if the tree contains no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pool backing the nodes.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Pool {
        self.store.pool()
    }

    /// Position of the smallest element, `end()` when empty.
    #[inline]
    #[must_use]
    pub fn begin(&self) -> Cursor<Ix> {
        Cursor(self.leftmost())
    }

    /// The past-the-end position.
    #[inline]
    #[must_use]
    pub fn end(&self) -> Cursor<Ix> {
        Cursor(NodeIndex::header())
    }

    /// The in-order successor of `cursor`; `end()` stays at `end()`.
    #[inline]
    #[must_use]
    pub fn next(&self, cursor: Cursor<Ix>) -> Cursor<Ix> {
        Cursor(self.increment(cursor.0))
    }

    /// The in-order predecessor of `cursor`.
    ///
    /// `prev(end())` is the largest element and `prev(begin())` is `end()`.
    #[inline]
    #[must_use]
    pub fn prev(&self, cursor: Cursor<Ix>) -> Cursor<Ix> {
        Cursor(self.decrement(cursor.0))
    }

    /// The value at `cursor`, `None` for `end()` or an erased entry.
    #[inline]
    #[must_use]
    pub fn get(&self, cursor: Cursor<Ix>) -> Option<&V> {
        if cursor.is_end() || !self.store.is_live(cursor.0) {
            return None;
        }
        self.store.node(cursor.0).value.as_ref()
    }

    /// Mutable access to the value at `cursor`.
    ///
    /// The key of the value must not be changed in a way that alters its order.
    #[inline]
    pub fn get_mut(&mut self, cursor: Cursor<Ix>) -> Option<&mut V> {
        if cursor.is_end() || !self.store.is_live(cursor.0) {
            return None;
        }
        self.store.node_mut(cursor.0).value.as_mut()
    }

    /// The smallest element in O(1).
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&V> {
        self.get(self.begin())
    }

    /// The largest element in O(1).
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&V> {
        self.get(Cursor(self.rightmost()))
    }

    /// Get an iterator over the elements of the tree, in order.
    #[inline]
    #[must_use]
    pub fn iter(&self) -> Iter<'_, V, KoV, C, Ix> {
        Iter::new(self)
    }

    /// Iterate over `[first, last)`.
    ///
    /// `last` must be reachable from `first`.
    #[inline]
    #[must_use]
    pub fn cursor_range(&self, first: Cursor<Ix>, last: Cursor<Ix>) -> Range<'_, V, KoV, C, Ix> {
        Range::new(self, first.0, last.0)
    }

    /// Erase the entry at `pos` and return the position that followed it.
    ///
    /// Only cursors to the erased entry are invalidated.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is `end()` or refers to an erased entry.
    #[inline]
    pub fn erase(&mut self, pos: Cursor<Ix>) -> Cursor<Ix> {
        let next = self.increment(pos.0);
        let _ignore = self.remove_node(pos.0);
        Cursor(next)
    }

    /// Erase the entry at `pos` and return its value.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is `end()` or refers to an erased entry.
    #[inline]
    pub fn remove(&mut self, pos: Cursor<Ix>) -> V {
        self.remove_node(pos.0)
    }

    /// Erase every entry in `[first, last)` and return `last`.
    pub fn erase_range(&mut self, first: Cursor<Ix>, last: Cursor<Ix>) -> Cursor<Ix> {
        if first == self.begin() && last == self.end() {
            self.clear();
            return self.end();
        }
        let mut cur = first;
        while cur != last {
            cur = self.erase(cur);
        }
        last
    }

    /// Remove all elements from the tree.
    #[inline]
    pub fn clear(&mut self) {
        trace!(len = self.len, "clearing tree");
        self.erase_subtree(self.root());
        self.store.reset();
        self.len = 0;
    }

    /// Exchange the contents of two trees, including their pools and orderings.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }
}

impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    KoV: KeyOfValue<V>,
    C: Compare<KoV::Key>,
    Ix: IndexType,
{
    /// Insert `value` unless an equivalent key is present.
    ///
    /// Returns the position of the inserted or blocking entry, and whether the
    /// insertion happened. On allocation failure the tree is left untouched.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// let (pos, inserted) = tree.insert_unique(3).unwrap();
    /// assert!(inserted);
    /// assert_eq!(tree.insert_unique(3).unwrap(), (pos, false));
    /// assert_eq!(tree.len(), 1);
    /// ```
    pub fn insert_unique(&mut self, value: V) -> Result<(Cursor<Ix>, bool), AllocError> {
        match self.unique_position(self.key_of.key(&value)) {
            Ok((x, p)) => self.insert_at(x, p, value).map(|pos| (pos, true)),
            Err(existing) => Ok((Cursor(existing), false)),
        }
    }

    /// Insert `value` after every entry with an equivalent key.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::{First, Less, Pool, RbTree};
    ///
    /// let mut tree: RbTree<(u8, char), First> = RbTree::with_parts(First, Less, Pool::new());
    /// for pair in [(1, 'a'), (0, 'b'), (1, 'c')] {
    ///     tree.insert_equal(pair).unwrap();
    /// }
    /// assert_eq!(tree.iter().map(|p| p.1).collect::<String>(), "bac");
    /// ```
    pub fn insert_equal(&mut self, value: V) -> Result<Cursor<Ix>, AllocError> {
        let p = self.equal_position(self.key_of.key(&value));
        self.insert_at(NodeIndex::nil(), p, value)
    }

    /// Insert `value` unless an equivalent key is present, starting the search
    /// at `hint`.
    ///
    /// Inserting right before a correct hint takes amortized constant time.
    pub fn insert_unique_hint(
        &mut self,
        hint: Cursor<Ix>,
        value: V,
    ) -> Result<(Cursor<Ix>, bool), AllocError> {
        let pos = hint.0;
        let nil = NodeIndex::nil();
        let k = self.key_of.key(&value);
        let target = if pos.is_header() {
            let max = self.rightmost();
            (self.len > 0 && self.less(self.key(max), k)).then_some((nil, max))
        } else if self.less(k, self.key(pos)) {
            if pos == self.leftmost() {
                Some((pos, pos))
            } else {
                let before = self.decrement(pos);
                self.less(self.key(before), k).then(|| {
                    if self.node_ref(before, Node::right).is_nil() {
                        (nil, before)
                    } else {
                        (pos, pos)
                    }
                })
            }
        } else if self.less(self.key(pos), k) {
            if pos == self.rightmost() {
                Some((nil, pos))
            } else {
                let after = self.increment(pos);
                self.less(k, self.key(after)).then(|| {
                    if self.node_ref(pos, Node::right).is_nil() {
                        (nil, pos)
                    } else {
                        (after, after)
                    }
                })
            }
        } else {
            return Ok((hint, false));
        };

        match target {
            Some((x, p)) => self.insert_at(x, p, value).map(|pos| (pos, true)),
            None => self.insert_unique(value),
        }
    }

    /// Insert `value` as close as possible to `hint`.
    ///
    /// An equivalent key is placed next to the hint rather than after all of
    /// its equals.
    pub fn insert_equal_hint(&mut self, hint: Cursor<Ix>, value: V) -> Result<Cursor<Ix>, AllocError> {
        let pos = hint.0;
        let nil = NodeIndex::nil();
        let k = self.key_of.key(&value);
        let target = if pos.is_header() {
            let max = self.rightmost();
            (self.len > 0 && !self.less(k, self.key(max))).then_some((nil, max))
        } else if !self.less(self.key(pos), k) {
            if pos == self.leftmost() {
                Some((pos, pos))
            } else {
                let before = self.decrement(pos);
                (!self.less(k, self.key(before))).then(|| {
                    if self.node_ref(before, Node::right).is_nil() {
                        (nil, before)
                    } else {
                        (pos, pos)
                    }
                })
            }
        } else if pos == self.rightmost() {
            Some((nil, pos))
        } else {
            let after = self.increment(pos);
            (!self.less(self.key(after), k)).then(|| {
                if self.node_ref(pos, Node::right).is_nil() {
                    (nil, pos)
                } else {
                    (after, after)
                }
            })
        };

        match target {
            Some((x, p)) => self.insert_at(x, p, value),
            None => self.insert_equal(value),
        }
    }

    /// Insert every value of `iter` with `insert_unique`, appending at `end()`.
    ///
    /// Stops at the first allocation failure.
    pub fn insert_unique_iter<I>(&mut self, iter: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = V>,
    {
        for value in iter {
            let _ignore = self.insert_unique_hint(self.end(), value)?;
        }
        Ok(())
    }

    /// Insert every value of `iter` with `insert_equal`, appending at `end()`.
    ///
    /// Stops at the first allocation failure.
    pub fn insert_equal_iter<I>(&mut self, iter: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = V>,
    {
        for value in iter {
            let _ignore = self.insert_equal_hint(self.end(), value)?;
        }
        Ok(())
    }

    /// Position of an entry equivalent to `key`, or `end()`.
    #[inline]
    #[must_use]
    pub fn find(&self, key: &KoV::Key) -> Cursor<Ix> {
        let j = self.lower_bound_from(self.root(), NodeIndex::header(), key);
        if j.is_header() || self.less(key, self.key(j)) {
            self.end()
        } else {
            Cursor(j)
        }
    }

    /// Return `true` if an entry equivalent to `key` is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &KoV::Key) -> bool {
        !self.find(key).is_end()
    }

    /// Number of entries equivalent to `key`.
    #[inline]
    #[must_use]
    pub fn count(&self, key: &KoV::Key) -> usize {
        let (first, last) = self.equal_range(key);
        self.cursor_range(first, last).count()
    }

    /// Position of the first entry not ordered before `key`.
    #[inline]
    #[must_use]
    pub fn lower_bound(&self, key: &KoV::Key) -> Cursor<Ix> {
        Cursor(self.lower_bound_from(self.root(), NodeIndex::header(), key))
    }

    /// Position of the first entry ordered after `key`.
    #[inline]
    #[must_use]
    pub fn upper_bound(&self, key: &KoV::Key) -> Cursor<Ix> {
        Cursor(self.upper_bound_from(self.root(), NodeIndex::header(), key))
    }

    /// The positions bracketing every entry equivalent to `key`.
    #[must_use]
    pub fn equal_range(&self, key: &KoV::Key) -> (Cursor<Ix>, Cursor<Ix>) {
        let mut x = self.root();
        let mut y = NodeIndex::header();
        while !x.is_nil() {
            if self.less(self.key(x), key) {
                x = self.node_ref(x, Node::right);
            } else if self.less(key, self.key(x)) {
                y = x;
                x = self.node_ref(x, Node::left);
            } else {
                let (xu, yu) = (self.node_ref(x, Node::right), y);
                let lower = self.lower_bound_from(self.node_ref(x, Node::left), x, key);
                let upper = self.upper_bound_from(xu, yu, key);
                return (Cursor(lower), Cursor(upper));
            }
        }
        (Cursor(y), Cursor(y))
    }

    /// Iterate over the entries whose keys fall in `range`.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// tree.insert_unique_iter(0..10).unwrap();
    /// assert_eq!(tree.range(3..6).copied().collect::<Vec<_>>(), [3, 4, 5]);
    /// assert_eq!(tree.range(7..).rev().copied().collect::<Vec<_>>(), [9, 8, 7]);
    /// ```
    #[must_use]
    pub fn range<R>(&self, range: R) -> Range<'_, V, KoV, C, Ix>
    where
        R: RangeBounds<KoV::Key>,
    {
        let front = match range.start_bound() {
            Bound::Included(k) => self.lower_bound(k),
            Bound::Excluded(k) => self.upper_bound(k),
            Bound::Unbounded => self.begin(),
        };
        let back = match range.end_bound() {
            Bound::Included(k) => self.upper_bound(k),
            Bound::Excluded(k) => self.lower_bound(k),
            Bound::Unbounded => self.end(),
        };
        let empty = match (range.start_bound(), range.end_bound()) {
            (Bound::Included(s), Bound::Included(e)) => self.less(e, s),
            (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
                !self.less(s, e)
            }
            _ => false,
        };
        if empty {
            return self.cursor_range(front, front);
        }
        self.cursor_range(front, back)
    }

    /// Erase every entry equivalent to `key` and return how many were removed.
    pub fn erase_key(&mut self, key: &KoV::Key) -> usize {
        let (first, last) = self.equal_range(key);
        let old_len = self.len;
        let _ignore = self.erase_range(first, last);
        old_len - self.len
    }

    /// Structural copy of the tree into a fresh pool with the same configuration.
    ///
    /// The copy keeps the shape and colors of the original. The new pool uses
    /// the process allocator. On allocation failure nothing is leaked.
    pub fn try_clone(&self) -> Result<Self, AllocError>
    where
        V: Clone,
        KoV: Clone,
        C: Clone,
    {
        let mut tree = Self::with_parts(
            self.key_of.clone(),
            self.compare.clone(),
            self.pool().with_same_config(),
        );
        let root = self.root();
        if !root.is_nil() {
            let copy = tree.copy_subtree(self, root, NodeIndex::header())?;
            let (min, max) = (tree.minimum(copy), tree.maximum(copy));
            let header = NodeIndex::header();
            tree.node_mut(header, Node::set_parent(copy));
            tree.node_mut(header, Node::set_left(min));
            tree.node_mut(header, Node::set_right(max));
            tree.len = self.len;
        }
        Ok(tree)
    }
}

// Structure maintenance, independent of the ordering
impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    /// The root, `nil` for an empty tree.
    pub(crate) fn root(&self) -> NodeIndex<Ix> {
        self.node_ref(NodeIndex::header(), Node::parent)
    }

    pub(crate) fn leftmost(&self) -> NodeIndex<Ix> {
        self.node_ref(NodeIndex::header(), Node::left)
    }

    pub(crate) fn rightmost(&self) -> NodeIndex<Ix> {
        self.node_ref(NodeIndex::header(), Node::right)
    }

    /// Null links count as black.
    pub(crate) fn is_red(&self, x: NodeIndex<Ix>) -> bool {
        !x.is_nil() && self.node_ref(x, Node::is_red)
    }

    pub(crate) fn minimum(&self, mut x: NodeIndex<Ix>) -> NodeIndex<Ix> {
        while !self.node_ref(x, Node::left).is_nil() {
            x = self.node_ref(x, Node::left);
        }
        x
    }

    pub(crate) fn maximum(&self, mut x: NodeIndex<Ix>) -> NodeIndex<Ix> {
        while !self.node_ref(x, Node::right).is_nil() {
            x = self.node_ref(x, Node::right);
        }
        x
    }

    /// Link the detached node `z` as a child of `p` and rebalance.
    fn link_and_rebalance(&mut self, insert_left: bool, z: NodeIndex<Ix>, p: NodeIndex<Ix>) {
        let header = NodeIndex::header();
        self.node_mut(z, Node::set_parent(p));
        if insert_left {
            // also makes leftmost = z when p is the header
            self.node_mut(p, Node::set_left(z));
            if p.is_header() {
                self.node_mut(header, Node::set_parent(z));
                self.node_mut(header, Node::set_right(z));
            } else if p == self.leftmost() {
                self.node_mut(header, Node::set_left(z));
            }
        } else {
            self.node_mut(p, Node::set_right(z));
            if p == self.rightmost() {
                self.node_mut(header, Node::set_right(z));
            }
        }
        self.insert_fixup(z);
    }

    /// Restore red-black tree properties after an insert.
    fn insert_fixup(&mut self, mut x: NodeIndex<Ix>) {
        while x != self.root() && self.parent_ref(x, Node::is_red) {
            let xp = self.node_ref(x, Node::parent);
            let xpp = self.node_ref(xp, Node::parent);
            if xp == self.node_ref(xpp, Node::left) {
                let y = self.node_ref(xpp, Node::right);
                if self.is_red(y) {
                    self.node_mut(xp, Node::set_color(Color::Black));
                    self.node_mut(y, Node::set_color(Color::Black));
                    self.node_mut(xpp, Node::set_color(Color::Red));
                    x = xpp;
                } else {
                    if x == self.node_ref(xp, Node::right) {
                        x = xp;
                        self.rotate_left(x);
                    }
                    self.parent_mut(x, Node::set_color(Color::Black));
                    self.node_mut(xpp, Node::set_color(Color::Red));
                    self.rotate_right(xpp);
                }
            } else {
                let y = self.node_ref(xpp, Node::left);
                if self.is_red(y) {
                    self.node_mut(xp, Node::set_color(Color::Black));
                    self.node_mut(y, Node::set_color(Color::Black));
                    self.node_mut(xpp, Node::set_color(Color::Red));
                    x = xpp;
                } else {
                    if x == self.node_ref(xp, Node::left) {
                        x = xp;
                        self.rotate_right(x);
                    }
                    self.parent_mut(x, Node::set_color(Color::Black));
                    self.node_mut(xpp, Node::set_color(Color::Red));
                    self.rotate_left(xpp);
                }
            }
        }
        let root = self.root();
        self.node_mut(root, Node::set_color(Color::Black));
    }

    /// Unlink `z` from the tree, leaving it detached but allocated.
    ///
    /// A node with two children is replaced by its successor node itself, so
    /// no other entry changes identity.
    fn unlink(&mut self, z: NodeIndex<Ix>) {
        let header = NodeIndex::header();
        let z_left = self.node_ref(z, Node::left);
        let z_right = self.node_ref(z, Node::right);
        let z_parent = self.node_ref(z, Node::parent);
        let z_is_root = z == self.root();

        let mut y = z;
        let x = if z_left.is_nil() {
            z_right
        } else if z_right.is_nil() {
            z_left
        } else {
            y = self.minimum(z_right);
            self.node_ref(y, Node::right)
        };

        let x_parent;
        if y != z {
            // relink the successor y in place of z
            self.node_mut(z_left, Node::set_parent(y));
            self.node_mut(y, Node::set_left(z_left));
            if y != z_right {
                x_parent = self.node_ref(y, Node::parent);
                if !x.is_nil() {
                    self.node_mut(x, Node::set_parent(x_parent));
                }
                // y was a left child
                self.node_mut(x_parent, Node::set_left(x));
                self.node_mut(y, Node::set_right(z_right));
                self.node_mut(z_right, Node::set_parent(y));
            } else {
                x_parent = y;
            }
            self.replace_child(z_is_root, z_parent, z, y);
            self.node_mut(y, Node::set_parent(z_parent));
            let y_color = self.node_ref(y, Node::color);
            let z_color = self.node_ref(z, Node::color);
            self.node_mut(y, Node::set_color(z_color));
            self.node_mut(z, Node::set_color(y_color));
        } else {
            x_parent = z_parent;
            if !x.is_nil() {
                self.node_mut(x, Node::set_parent(z_parent));
            }
            self.replace_child(z_is_root, z_parent, z, x);
            if self.leftmost() == z {
                // z_left is nil here, so z_parent is the header when z was the root
                let min = if z_right.is_nil() {
                    z_parent
                } else {
                    self.minimum(x)
                };
                self.node_mut(header, Node::set_left(min));
            }
            if self.rightmost() == z {
                let max = if z_left.is_nil() {
                    z_parent
                } else {
                    self.maximum(x)
                };
                self.node_mut(header, Node::set_right(max));
            }
        }

        // z now carries the color of the node that physically left the tree
        if self.node_ref(z, Node::is_black) {
            self.erase_fixup(x, x_parent);
        }
    }

    /// Point the link that referenced `old` at `new`.
    fn replace_child(
        &mut self,
        old_is_root: bool,
        parent: NodeIndex<Ix>,
        old: NodeIndex<Ix>,
        new: NodeIndex<Ix>,
    ) {
        if old_is_root {
            self.node_mut(NodeIndex::header(), Node::set_parent(new));
        } else if self.node_ref(parent, Node::left) == old {
            self.node_mut(parent, Node::set_left(new));
        } else {
            self.node_mut(parent, Node::set_right(new));
        }
    }

    /// Restore red-black tree properties after a remove.
    ///
    /// `x` may be nil, so its parent is tracked separately.
    fn erase_fixup(&mut self, mut x: NodeIndex<Ix>, mut x_parent: NodeIndex<Ix>) {
        while x != self.root() && !self.is_red(x) {
            if x == self.node_ref(x_parent, Node::left) {
                let mut w = self.node_ref(x_parent, Node::right);
                if self.is_red(w) {
                    self.node_mut(w, Node::set_color(Color::Black));
                    self.node_mut(x_parent, Node::set_color(Color::Red));
                    self.rotate_left(x_parent);
                    w = self.node_ref(x_parent, Node::right);
                }
                let w_left = self.node_ref(w, Node::left);
                let w_right = self.node_ref(w, Node::right);
                if !self.is_red(w_left) && !self.is_red(w_right) {
                    self.node_mut(w, Node::set_color(Color::Red));
                    x = x_parent;
                    x_parent = self.node_ref(x_parent, Node::parent);
                } else {
                    if !self.is_red(w_right) {
                        self.node_mut(w_left, Node::set_color(Color::Black));
                        self.node_mut(w, Node::set_color(Color::Red));
                        self.rotate_right(w);
                        w = self.node_ref(x_parent, Node::right);
                    }
                    let parent_color = self.node_ref(x_parent, Node::color);
                    self.node_mut(w, Node::set_color(parent_color));
                    self.node_mut(x_parent, Node::set_color(Color::Black));
                    let w_right = self.node_ref(w, Node::right);
                    if !w_right.is_nil() {
                        self.node_mut(w_right, Node::set_color(Color::Black));
                    }
                    self.rotate_left(x_parent);
                    break;
                }
            } else {
                let mut w = self.node_ref(x_parent, Node::left);
                if self.is_red(w) {
                    self.node_mut(w, Node::set_color(Color::Black));
                    self.node_mut(x_parent, Node::set_color(Color::Red));
                    self.rotate_right(x_parent);
                    w = self.node_ref(x_parent, Node::left);
                }
                let w_left = self.node_ref(w, Node::left);
                let w_right = self.node_ref(w, Node::right);
                if !self.is_red(w_right) && !self.is_red(w_left) {
                    self.node_mut(w, Node::set_color(Color::Red));
                    x = x_parent;
                    x_parent = self.node_ref(x_parent, Node::parent);
                } else {
                    if !self.is_red(w_left) {
                        self.node_mut(w_right, Node::set_color(Color::Black));
                        self.node_mut(w, Node::set_color(Color::Red));
                        self.rotate_left(w);
                        w = self.node_ref(x_parent, Node::left);
                    }
                    let parent_color = self.node_ref(x_parent, Node::color);
                    self.node_mut(w, Node::set_color(parent_color));
                    self.node_mut(x_parent, Node::set_color(Color::Black));
                    let w_left = self.node_ref(w, Node::left);
                    if !w_left.is_nil() {
                        self.node_mut(w_left, Node::set_color(Color::Black));
                    }
                    self.rotate_right(x_parent);
                    break;
                }
            }
        }
        if !x.is_nil() {
            self.node_mut(x, Node::set_color(Color::Black));
        }
    }

    /// Binary tree left rotate.
    fn rotate_left(&mut self, x: NodeIndex<Ix>) {
        let y = self.node_ref(x, Node::right);
        let y_left = self.node_ref(y, Node::left);
        self.node_mut(x, Node::set_right(y_left));
        if !y_left.is_nil() {
            self.node_mut(y_left, Node::set_parent(x));
        }

        self.replace_parent(x, y);
        self.node_mut(y, Node::set_left(x));
    }

    /// Binary tree right rotate.
    fn rotate_right(&mut self, x: NodeIndex<Ix>) {
        let y = self.node_ref(x, Node::left);
        let y_right = self.node_ref(y, Node::right);
        self.node_mut(x, Node::set_left(y_right));
        if !y_right.is_nil() {
            self.node_mut(y_right, Node::set_parent(x));
        }

        self.replace_parent(x, y);
        self.node_mut(y, Node::set_right(x));
    }

    /// Replace parent during a rotation.
    fn replace_parent(&mut self, x: NodeIndex<Ix>, y: NodeIndex<Ix>) {
        let xp = self.node_ref(x, Node::parent);
        self.node_mut(y, Node::set_parent(xp));
        let x_is_root = x == self.root();
        self.replace_child(x_is_root, xp, x, y);
        self.node_mut(x, Node::set_parent(y));
    }

    fn remove_node(&mut self, z: NodeIndex<Ix>) -> V {
        assert!(!z.is_header(), "cannot erase end()");
        self.unlink(z);
        self.len -= 1;
        match self.store.destroy(z) {
            Some(value) => value,
            None => panic!("node holds no value"),
        }
    }

    /// Free a subtree bottom-up without rebalancing.
    fn erase_subtree(&mut self, mut x: NodeIndex<Ix>) {
        while !x.is_nil() {
            self.erase_subtree(self.node_ref(x, Node::right));
            let y = self.node_ref(x, Node::left);
            let _ignore = self.store.destroy(x);
            x = y;
        }
    }
}

// Ordered search helpers
impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    KoV: KeyOfValue<V>,
    C: Compare<KoV::Key>,
    Ix: IndexType,
{
    pub(crate) fn key(&self, x: NodeIndex<Ix>) -> &KoV::Key {
        self.key_of.key(self.store.node(x).value())
    }

    pub(crate) fn less(&self, a: &KoV::Key, b: &KoV::Key) -> bool {
        self.compare.less(a, b)
    }

    /// Where `insert_unique` links a key: `Ok((x, parent))` or `Err(existing)`.
    fn unique_position(&self, k: &KoV::Key) -> Result<(NodeIndex<Ix>, NodeIndex<Ix>), NodeIndex<Ix>> {
        let mut x = self.root();
        let mut y = NodeIndex::header();
        let mut comp = true;
        while !x.is_nil() {
            y = x;
            comp = self.less(k, self.key(x));
            x = if comp {
                self.node_ref(x, Node::left)
            } else {
                self.node_ref(x, Node::right)
            };
        }
        let mut j = y;
        if comp {
            if j == self.leftmost() {
                return Ok((x, y));
            }
            j = self.decrement(j);
        }
        if self.less(self.key(j), k) {
            return Ok((x, y));
        }
        Err(j)
    }

    /// Parent under which `insert_equal` links a key, after all its equals.
    fn equal_position(&self, k: &KoV::Key) -> NodeIndex<Ix> {
        let mut x = self.root();
        let mut y = NodeIndex::header();
        while !x.is_nil() {
            y = x;
            x = if self.less(k, self.key(x)) {
                self.node_ref(x, Node::left)
            } else {
                self.node_ref(x, Node::right)
            };
        }
        y
    }

    /// Allocate a node for `value` and link it below `p`.
    ///
    /// The new node goes left when `x` is a real node, when `p` is the header,
    /// or when the key orders before `p`.
    fn insert_at(
        &mut self,
        x: NodeIndex<Ix>,
        p: NodeIndex<Ix>,
        value: V,
    ) -> Result<Cursor<Ix>, AllocError> {
        let insert_left =
            !x.is_nil() || p.is_header() || self.less(self.key_of.key(&value), self.key(p));
        let z = self.store.create(value)?;
        self.link_and_rebalance(insert_left, z, p);
        self.len += 1;
        Ok(Cursor(z))
    }

    fn lower_bound_from(
        &self,
        mut x: NodeIndex<Ix>,
        mut y: NodeIndex<Ix>,
        k: &KoV::Key,
    ) -> NodeIndex<Ix> {
        while !x.is_nil() {
            if !self.less(self.key(x), k) {
                y = x;
                x = self.node_ref(x, Node::left);
            } else {
                x = self.node_ref(x, Node::right);
            }
        }
        y
    }

    fn upper_bound_from(
        &self,
        mut x: NodeIndex<Ix>,
        mut y: NodeIndex<Ix>,
        k: &KoV::Key,
    ) -> NodeIndex<Ix> {
        while !x.is_nil() {
            if self.less(k, self.key(x)) {
                y = x;
                x = self.node_ref(x, Node::left);
            } else {
                x = self.node_ref(x, Node::right);
            }
        }
        y
    }

    fn clone_node(&mut self, src: &Self, x: NodeIndex<Ix>) -> Result<NodeIndex<Ix>, AllocError>
    where
        V: Clone,
    {
        let y = self.store.create(src.store.node(x).value().clone())?;
        self.node_mut(y, Node::set_color(src.node_ref(x, Node::color)));
        Ok(y)
    }

    /// Copy the subtree of `src` rooted at `x` below `p`, recursing only on
    /// right children.
    fn copy_subtree(
        &mut self,
        src: &Self,
        x: NodeIndex<Ix>,
        p: NodeIndex<Ix>,
    ) -> Result<NodeIndex<Ix>, AllocError>
    where
        V: Clone,
    {
        let top = self.clone_node(src, x)?;
        self.node_mut(top, Node::set_parent(p));
        let x_right = src.node_ref(x, Node::right);
        if !x_right.is_nil() {
            let right = self.copy_subtree(src, x_right, top)?;
            self.node_mut(top, Node::set_right(right));
        }

        let mut p = top;
        let mut x = src.node_ref(x, Node::left);
        while !x.is_nil() {
            let y = self.clone_node(src, x)?;
            self.node_mut(p, Node::set_left(y));
            self.node_mut(y, Node::set_parent(p));
            let x_right = src.node_ref(x, Node::right);
            if !x_right.is_nil() {
                let right = self.copy_subtree(src, x_right, y)?;
                self.node_mut(y, Node::set_right(right));
            }
            p = y;
            x = src.node_ref(x, Node::left);
        }
        Ok(top)
    }
}

// Convenient methods for reference or mutate current/parent node
impl<'a, V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    pub(crate) fn node_ref<F, R>(&'a self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a Node<V, Ix>) -> R,
    {
        op(self.store.node(node))
    }

    pub(crate) fn node_mut<F, R>(&'a mut self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a mut Node<V, Ix>) -> R,
    {
        op(self.store.node_mut(node))
    }

    fn parent_ref<F, R>(&'a self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a Node<V, Ix>) -> R,
    {
        let parent = self.store.node(node).parent();
        op(self.store.node(parent))
    }

    fn parent_mut<F, R>(&'a mut self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a mut Node<V, Ix>) -> R,
    {
        let parent = self.store.node(node).parent();
        op(self.store.node_mut(parent))
    }
}

impl<V, KoV, C, Ix> Clone for RbTree<V, KoV, C, Ix>
where
    V: Clone,
    KoV: KeyOfValue<V> + Clone,
    C: Compare<KoV::Key> + Clone,
    Ix: IndexType,
{
    /// # Panics
    ///
    /// Panics when the copy runs out of memory, see `try_clone`.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(tree) => tree,
            Err(err) => panic!("failed to clone tree: {err}"),
        }
    }
}

impl<V, KoV, C, Ix> fmt::Debug for RbTree<V, KoV, C, Ix>
where
    V: fmt::Debug,
    Ix: IndexType,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<V, KoV, C, Ix> PartialEq for RbTree<V, KoV, C, Ix>
where
    V: PartialEq,
    Ix: IndexType,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<V, KoV, C, Ix> Eq for RbTree<V, KoV, C, Ix>
where
    V: Eq,
    Ix: IndexType,
{
}

impl<V, KoV, C, Ix> PartialOrd for RbTree<V, KoV, C, Ix>
where
    V: PartialOrd,
    Ix: IndexType,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<V, KoV, C, Ix> Ord for RbTree<V, KoV, C, Ix>
where
    V: Ord,
    Ix: IndexType,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<'a, V, KoV, C, Ix> IntoIterator for &'a RbTree<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    type Item = &'a V;
    type IntoIter = Iter<'a, V, KoV, C, Ix>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V, KoV, C, Ix> IntoIterator for RbTree<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    type Item = V;
    type IntoIter = IntoIter<V, KoV, C, Ix>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}
