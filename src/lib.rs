//! `rb_pool_tree` is an ordered container engine built from two pieces: a
//! red-black tree and the size-class pool allocator its nodes live in.
//!
//! The tree keeps a header sentinel whose links cache the root, the minimum
//! and the maximum, so `begin()`, `end()`, `first()` and `last()` are O(1) and
//! stepping past either end lands on `end()`. Links are stable `NodeIndex`
//! handles into a slot table rather than pointers, and every node is a block
//! leased from the tree's own `Pool`. Insertion allocates before it links
//! anything, so an exhausted pool leaves the tree exactly as it was.
//!
//! The pool rounds small requests up to a multiple of its alignment and serves
//! them from one free list per size class, refilling in batches from a
//! growable arena. Requests above `PoolConfig::max_bytes` go straight to the
//! system allocator.
//!
//! # Example
//!
//! ```rust
//! use rb_pool_tree::{First, Less, Pool, RbTree};
//!
//! let mut map: RbTree<(u32, &str), First> = RbTree::with_parts(First, Less, Pool::new());
//! map.insert_equal((2, "b")).unwrap();
//! map.insert_equal((1, "a")).unwrap();
//! map.insert_equal((2, "c")).unwrap();
//!
//! assert_eq!(map.count(&2), 2);
//! let (first, last) = map.equal_range(&2);
//! let names: Vec<_> = map.cursor_range(first, last).map(|p| p.1).collect();
//! assert_eq!(names, ["b", "c"]);
//! assert_eq!(map.pool().stats().system_chunks, 1);
//! ```

mod error;
#[cfg(feature = "graphviz")]
mod graphviz;
mod index;
mod iter;
mod key;
mod node;
mod pool;
mod set;
mod store;
mod system;
mod tree;
mod verify;


pub use error::{AllocError, ConfigError, InvariantError};
pub use index::{DefaultIx, IndexType, NodeIndex};
pub use iter::{IntoIter, Iter, Range};
pub use key::{By, Compare, First, Greater, Identity, KeyOfValue, Less};
pub use pool::{Pool, PoolConfig, PoolStats};
pub use set::OrderedSet;
pub use system::{Global, Limited, SystemAllocator};
pub use tree::{Cursor, RbTree};
