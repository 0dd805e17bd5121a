//! The system allocator seam used by `Pool` for arena chunks and large blocks.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;

/// Source of raw memory behind a `Pool`.
pub trait SystemAllocator {
    /// Return a block for `layout`, or `None` when the system is out of memory.
    ///
    /// `layout` always has a non-zero size.
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>>;

    /// Release a block obtained from `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator with the same `layout`
    /// and must not be used afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// The process allocator from `std::alloc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

impl SystemAllocator for Global {
    #[inline]
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: callers never pass a zero-sized layout.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    #[inline]
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}

/// A `Global` wrapper that refuses requests once `budget` bytes are in use.
///
/// # Example
/// ```rust
/// use rb_pool_tree::{Limited, Pool, PoolConfig};
///
/// let mut pool = Pool::with_system(PoolConfig::default(), Limited::new(0)).unwrap();
/// assert!(pool.allocate(16).is_err());
/// ```
#[derive(Clone, Copy, Default)]
pub struct Limited {
    budget: usize,
    in_use: usize,
    requests: usize,
}

impl Limited {
    /// Create an allocator that hands out at most `budget` bytes at a time.
    #[inline]
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            in_use: 0,
            requests: 0,
        }
    }

    /// Bytes currently handed out.
    #[inline]
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of `allocate` calls, successful or not.
    #[inline]
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl SystemAllocator for Limited {
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        self.requests += 1;
        let in_use = self.in_use.checked_add(layout.size())?;
        if in_use > self.budget {
            return None;
        }
        let ptr = Global.allocate(layout)?;
        self.in_use = in_use;
        Some(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.in_use -= layout.size();
        Global.deallocate(ptr, layout);
    }
}

impl fmt::Debug for Limited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limited")
            .field("budget", &self.budget)
            .field("in_use", &self.in_use)
            .finish()
    }
}
