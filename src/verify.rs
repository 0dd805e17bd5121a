use crate::error::InvariantError;
use crate::index::{IndexType, NodeIndex};
use crate::key::{Compare, KeyOfValue};
use crate::node::Node;
use crate::tree::RbTree;

impl<V, KoV, C, Ix> RbTree<V, KoV, C, Ix>
where
    KoV: KeyOfValue<V>,
    C: Compare<KoV::Key>,
    Ix: IndexType,
{
    /// Check every red-black tree invariant in O(n).
    ///
    /// Verifies that the root is black, that no red node has a red child,
    /// that every path carries the same number of black nodes, that parent
    /// links mirror child links, that the entries are ordered, that the header
    /// caches the real minimum and maximum, and that `len()` matches the node
    /// count.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// tree.insert_equal_iter([3, 1, 4, 1, 5, 9, 2, 6]).unwrap();
    /// assert_eq!(tree.validate(), Ok(()));
    /// ```
    pub fn validate(&self) -> Result<(), InvariantError> {
        let header = NodeIndex::header();
        let root = self.root();
        if root.is_nil() {
            if self.leftmost() != header || self.rightmost() != header {
                return Err(InvariantError::HeaderCache);
            }
            if self.len != 0 {
                return Err(InvariantError::Len {
                    len: self.len,
                    found: 0,
                });
            }
            return Ok(());
        }

        if self.node_ref(root, Node::is_red) {
            return Err(InvariantError::RedRoot);
        }
        if self.node_ref(root, Node::parent) != header {
            return Err(InvariantError::ParentLink(root.index()));
        }
        let mut found = 0;
        let _height = self.check_subtree(root, &mut found)?;
        if found != self.len {
            return Err(InvariantError::Len {
                len: self.len,
                found,
            });
        }
        if self.leftmost() != self.minimum(root) || self.rightmost() != self.maximum(root) {
            return Err(InvariantError::HeaderCache);
        }

        let mut prev = self.leftmost();
        let mut x = self.increment(prev);
        while !x.is_header() {
            if self.less(self.key(x), self.key(prev)) {
                return Err(InvariantError::Order(x.index()));
            }
            prev = x;
            x = self.increment(x);
        }
        Ok(())
    }

    /// Black height of the subtree at `x`, counting the null leaves.
    fn check_subtree(&self, x: NodeIndex<Ix>, found: &mut usize) -> Result<usize, InvariantError> {
        if x.is_nil() {
            return Ok(1);
        }
        *found += 1;
        let left = self.node_ref(x, Node::left);
        let right = self.node_ref(x, Node::right);
        for child in [left, right] {
            if !child.is_nil() && self.node_ref(child, Node::parent) != x {
                return Err(InvariantError::ParentLink(child.index()));
            }
        }
        if self.is_red(x) && (self.is_red(left) || self.is_red(right)) {
            return Err(InvariantError::RedRed(x.index()));
        }
        let left_height = self.check_subtree(left, found)?;
        let right_height = self.check_subtree(right, found)?;
        if left_height != right_height {
            return Err(InvariantError::BlackHeight(
                x.index(),
                left_height,
                right_height,
            ));
        }
        Ok(left_height + usize::from(self.node_ref(x, Node::is_black)))
    }
}
