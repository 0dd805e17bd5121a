use std::iter::FusedIterator;

use crate::index::{IndexType, NodeIndex};
use crate::node::Node;
use crate::tree::RbTree;

// In-order stepping through the header sentinel
impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    /// The in-order successor of `x`, the header past the maximum.
    pub(crate) fn increment(&self, mut x: NodeIndex<Ix>) -> NodeIndex<Ix> {
        // an empty header links to itself on both sides
        if x.is_header() {
            return x;
        }
        let right = self.node_ref(x, Node::right);
        if !right.is_nil() {
            return self.minimum(right);
        }
        let mut y = self.node_ref(x, Node::parent);
        while x == self.node_ref(y, Node::right) {
            x = y;
            y = self.node_ref(y, Node::parent);
        }
        // climbing from the maximum ends on the header, whose right link is the maximum
        if self.node_ref(x, Node::right) != y {
            x = y;
        }
        x
    }

    /// The in-order predecessor of `x`.
    ///
    /// The header steps back to the maximum, and the minimum steps to the header.
    pub(crate) fn decrement(&self, mut x: NodeIndex<Ix>) -> NodeIndex<Ix> {
        if x.is_header() {
            return self.rightmost();
        }
        if x == self.leftmost() {
            return NodeIndex::header();
        }
        let left = self.node_ref(x, Node::left);
        if !left.is_nil() {
            return self.maximum(left);
        }
        let mut y = self.node_ref(x, Node::parent);
        while x == self.node_ref(y, Node::left) {
            x = y;
            y = self.node_ref(y, Node::parent);
        }
        y
    }
}

/// An iterator over the elements of an `RbTree`, in order.
pub struct Iter<'a, V, KoV, C, Ix> {
    /// Reference to the tree
    tree_ref: &'a RbTree<V, KoV, C, Ix>,
    /// Next node from the front
    front: NodeIndex<Ix>,
    /// One past the next node from the back
    back: NodeIndex<Ix>,
    /// Elements left
    len: usize,
}

impl<'a, V, KoV, C, Ix> Iter<'a, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    pub(crate) fn new(tree_ref: &'a RbTree<V, KoV, C, Ix>) -> Self {
        Iter {
            tree_ref,
            front: tree_ref.leftmost(),
            back: NodeIndex::header(),
            len: tree_ref.len(),
        }
    }
}

impl<'a, V, KoV, C, Ix> Iterator for Iter<'a, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let x = self.front;
        self.front = self.tree_ref.increment(x);
        self.len -= 1;
        Some(self.tree_ref.node_ref(x, Node::value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, V, KoV, C, Ix> DoubleEndedIterator for Iter<'a, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.back = self.tree_ref.decrement(self.back);
        self.len -= 1;
        Some(self.tree_ref.node_ref(self.back, Node::value))
    }
}

impl<V, KoV, C, Ix> ExactSizeIterator for Iter<'_, V, KoV, C, Ix> where Ix: IndexType {}

impl<V, KoV, C, Ix> FusedIterator for Iter<'_, V, KoV, C, Ix> where Ix: IndexType {}

impl<V, KoV, C, Ix> Clone for Iter<'_, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

/// An iterator over a half-open span of positions in an `RbTree`.
pub struct Range<'a, V, KoV, C, Ix> {
    /// Reference to the tree
    tree_ref: &'a RbTree<V, KoV, C, Ix>,
    /// Next node from the front
    front: NodeIndex<Ix>,
    /// One past the next node from the back
    back: NodeIndex<Ix>,
}

impl<'a, V, KoV, C, Ix> Range<'a, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    pub(crate) fn new(
        tree_ref: &'a RbTree<V, KoV, C, Ix>,
        front: NodeIndex<Ix>,
        back: NodeIndex<Ix>,
    ) -> Self {
        Range {
            tree_ref,
            front,
            back,
        }
    }
}

impl<'a, V, KoV, C, Ix> Iterator for Range<'a, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let x = self.front;
        self.front = self.tree_ref.increment(x);
        Some(self.tree_ref.node_ref(x, Node::value))
    }
}

impl<'a, V, KoV, C, Ix> DoubleEndedIterator for Range<'a, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back = self.tree_ref.decrement(self.back);
        Some(self.tree_ref.node_ref(self.back, Node::value))
    }
}

impl<V, KoV, C, Ix> FusedIterator for Range<'_, V, KoV, C, Ix> where Ix: IndexType {}

impl<V, KoV, C, Ix> Clone for Range<'_, V, KoV, C, Ix>
where
    Ix: IndexType,
{
    fn clone(&self) -> Self {
        Range { ..*self }
    }
}

/// An owning iterator over the elements of an `RbTree`, in order.
pub struct IntoIter<V, KoV, C, Ix> {
    tree: RbTree<V, KoV, C, Ix>,
    front: NodeIndex<Ix>,
    back: NodeIndex<Ix>,
    len: usize,
}

impl<V, KoV, C, Ix> IntoIter<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    pub(crate) fn new(tree: RbTree<V, KoV, C, Ix>) -> Self {
        IntoIter {
            front: tree.leftmost(),
            back: NodeIndex::header(),
            len: tree.len(),
            tree,
        }
    }

    /// Move the value out, leaving the node linked so stepping still works.
    fn take(&mut self, x: NodeIndex<Ix>) -> Option<V> {
        self.tree.store.node_mut(x).value.take()
    }
}

impl<V, KoV, C, Ix> Iterator for IntoIter<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    type Item = V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let x = self.front;
        self.front = self.tree.increment(x);
        self.len -= 1;
        self.take(x)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<V, KoV, C, Ix> DoubleEndedIterator for IntoIter<V, KoV, C, Ix>
where
    Ix: IndexType,
{
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.back = self.tree.decrement(self.back);
        self.len -= 1;
        self.take(self.back)
    }
}

impl<V, KoV, C, Ix> ExactSizeIterator for IntoIter<V, KoV, C, Ix> where Ix: IndexType {}

impl<V, KoV, C, Ix> FusedIterator for IntoIter<V, KoV, C, Ix> where Ix: IndexType {}
