use std::fmt;
use std::ops::RangeBounds;

use crate::error::AllocError;
use crate::index::DefaultIx;
use crate::iter::{IntoIter, Iter, Range};
use crate::key::{Compare, Identity, Less};
use crate::pool::Pool;
use crate::tree::RbTree;

/// An ordered set of unique values backed by an `RbTree`.
///
/// # Example
/// ```rust
/// use rb_pool_tree::OrderedSet;
///
/// let mut set = OrderedSet::new();
/// assert!(set.insert("pear").unwrap());
/// assert!(set.insert("apple").unwrap());
/// assert!(!set.insert("pear").unwrap());
/// assert_eq!(set.iter().copied().collect::<Vec<_>>(), ["apple", "pear"]);
/// assert!(set.remove(&"apple"));
/// assert_eq!(set.len(), 1);
/// ```
pub struct OrderedSet<T, C = Less> {
    tree: RbTree<T, Identity, C, DefaultIx>,
}

impl<T: Ord> OrderedSet<T> {
    /// Create an empty set ordered by `Ord`.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool(Pool::new())
    }

    /// Create an empty set ordered by `Ord` allocating from `pool`.
    #[inline]
    #[must_use]
    pub fn with_pool(pool: Pool) -> Self {
        OrderedSet {
            tree: RbTree::with_parts(Identity, Less, pool),
        }
    }
}

impl<T: Ord> Default for OrderedSet<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> OrderedSet<T, C>
where
    C: Compare<T>,
{
    /// Create an empty set ordered by `compare`.
    #[inline]
    #[must_use]
    pub fn with_compare(compare: C) -> Self {
        OrderedSet {
            tree: RbTree::with_parts(Identity, compare, Pool::new()),
        }
    }

    /// Add `value` unless an equivalent one is present.
    ///
    /// Returns whether the set changed.
    #[inline]
    pub fn insert(&mut self, value: T) -> Result<bool, AllocError> {
        self.tree
            .insert_unique(value)
            .map(|(_, inserted)| inserted)
    }

    /// Remove the value equivalent to `value`, returning whether one was present.
    #[inline]
    pub fn remove(&mut self, value: &T) -> bool {
        self.tree.erase_key(value) > 0
    }

    /// Remove and return the value equivalent to `value`.
    #[inline]
    pub fn take(&mut self, value: &T) -> Option<T> {
        let pos = self.tree.find(value);
        (!pos.is_end()).then(|| self.tree.remove(pos))
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.tree.contains(value)
    }

    /// `1` if an equivalent value is present, `0` otherwise.
    #[inline]
    #[must_use]
    pub fn count(&self, value: &T) -> usize {
        self.tree.count(value)
    }

    /// Iterate over the values in `range`, in order.
    #[inline]
    #[must_use]
    pub fn range<R>(&self, range: R) -> Range<'_, T, Identity, C, DefaultIx>
    where
        R: RangeBounds<T>,
    {
        self.tree.range(range)
    }
}

impl<T, C> OrderedSet<T, C> {
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.tree.first()
    }

    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.tree.last()
    }

    #[inline]
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T, Identity, C, DefaultIx> {
        self.tree.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The pool backing the set.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Pool {
        self.tree.pool()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }
}

impl<T, C> Clone for OrderedSet<T, C>
where
    T: Clone,
    C: Compare<T> + Clone,
{
    fn clone(&self) -> Self {
        OrderedSet {
            tree: self.tree.clone(),
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for OrderedSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, C> PartialEq for OrderedSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<T: Eq, C> Eq for OrderedSet<T, C> {}

impl<T: PartialOrd, C> PartialOrd for OrderedSet<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.tree.partial_cmp(&other.tree)
    }
}

impl<T: Ord, C> Ord for OrderedSet<T, C> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tree.cmp(&other.tree)
    }
}

impl<'a, T, C> IntoIterator for &'a OrderedSet<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, Identity, C, DefaultIx>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, C> IntoIterator for OrderedSet<T, C> {
    type Item = T;
    type IntoIter = IntoIter<T, Identity, C, DefaultIx>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}
