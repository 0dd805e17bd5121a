//! Typed node storage over a `Pool`.
//!
//! Every node lives in its own pool block and is addressed by a stable
//! `NodeIndex` into a slot table, so links never move when other nodes are
//! created or destroyed. Slot `0` is reserved for the header, which is kept
//! inline.

use std::alloc::Layout;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::error::AllocError;
use crate::index::{IndexType, NodeIndex};
use crate::node::Node;
use crate::pool::Pool;

pub(crate) struct NodeStore<V, Ix> {
    pool: Pool,
    header: Node<V, Ix>,
    slots: Vec<Option<NonNull<Node<V, Ix>>>>,
    /// Released slots, reused before the table grows
    vacant: Vec<NodeIndex<Ix>>,
    marker: PhantomData<Node<V, Ix>>,
}

impl<V, Ix> NodeStore<V, Ix>
where
    Ix: IndexType,
{
    const LAYOUT: Layout = Layout::new::<Node<V, Ix>>();

    pub(crate) fn new(pool: Pool) -> Self {
        Self {
            pool,
            header: Node::header(),
            slots: vec![None],
            vacant: Vec::new(),
            marker: PhantomData,
        }
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Construct a detached red node holding `value`.
    ///
    /// Nothing is touched when the pool is exhausted.
    pub(crate) fn create(&mut self, value: V) -> Result<NodeIndex<Ix>, AllocError> {
        let block = self.pool.allocate_layout(Self::LAYOUT)?.cast::<Node<V, Ix>>();
        // SAFETY: the block is a fresh lease sized and aligned for a node.
        unsafe { block.as_ptr().write(Node::new(value)) };
        let idx = match self.vacant.pop() {
            Some(idx) => {
                self.slots[idx.index()] = Some(block);
                idx
            }
            None => {
                let idx = NodeIndex::new(self.slots.len());
                // check for max capacity, except if we use usize
                assert!(
                    <Ix as IndexType>::max().index() == !0 || !idx.is_nil(),
                    "Reached maximum number of nodes"
                );
                self.slots.push(Some(block));
                idx
            }
        };
        Ok(idx)
    }

    /// Destroy a node and return its value, `None` if it was moved out already.
    ///
    /// # Panics
    ///
    /// Panics if `idx` does not refer to a live node.
    pub(crate) fn destroy(&mut self, idx: NodeIndex<Ix>) -> Option<V> {
        let Some(block) = self.slots.get_mut(idx.index()).and_then(Option::take) else {
            panic!("no live node at {idx:?}");
        };
        // SAFETY: the slot owned the node, which is read out exactly once
        // before its block goes back to the pool it came from.
        let node = unsafe {
            let node = block.as_ptr().read();
            self.pool.deallocate_layout(block.cast(), Self::LAYOUT);
            node
        };
        self.vacant.push(idx);
        node.value
    }

    /// Forget every slot once all nodes were destroyed.
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.slots.iter().all(Option::is_none));
        self.slots.truncate(1);
        self.vacant.clear();
        self.header = Node::header();
    }

    pub(crate) fn is_live(&self, idx: NodeIndex<Ix>) -> bool {
        idx.is_header() || matches!(self.slots.get(idx.index()), Some(Some(_)))
    }

    /// # Panics
    ///
    /// Panics if `idx` is neither the header nor a live node.
    pub(crate) fn node(&self, idx: NodeIndex<Ix>) -> &Node<V, Ix> {
        if idx.is_header() {
            return &self.header;
        }
        match self.slots.get(idx.index()) {
            // SAFETY: occupied slots point at initialized nodes owned by `self`.
            Some(Some(block)) => unsafe { block.as_ref() },
            _ => panic!("no live node at {idx:?}"),
        }
    }

    /// # Panics
    ///
    /// Panics if `idx` is neither the header nor a live node.
    pub(crate) fn node_mut(&mut self, idx: NodeIndex<Ix>) -> &mut Node<V, Ix> {
        if idx.is_header() {
            return &mut self.header;
        }
        match self.slots.get_mut(idx.index()) {
            // SAFETY: occupied slots point at initialized nodes owned by `self`,
            // and `&mut self` makes this the only reference.
            Some(Some(block)) => unsafe { block.as_mut() },
            _ => panic!("no live node at {idx:?}"),
        }
    }
}

impl<V, Ix> Drop for NodeStore<V, Ix> {
    fn drop(&mut self) {
        let layout = Layout::new::<Node<V, Ix>>();
        for block in self.slots.iter_mut().filter_map(Option::take) {
            // SAFETY: each occupied slot owns an initialized node in a block
            // leased from `self.pool` with `layout`.
            unsafe {
                ptr::drop_in_place(block.as_ptr());
                self.pool.deallocate_layout(block.cast(), layout);
            }
        }
    }
}
