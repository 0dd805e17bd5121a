//! A size-class pool allocator.
//!
//! Requests up to `PoolConfig::max_bytes` are rounded up to a multiple of
//! `PoolConfig::align` and served from one free list per size class. Empty
//! lists are refilled in batches carved out of a growable arena; larger
//! requests go straight to the system allocator.
//!
//! Free blocks are never coalesced. The arena remainder that cannot hold a
//! requested block is donated to the free list of its own size class before
//! the arena grows, and when the system allocator refuses to grow the arena a
//! larger free block is repurposed as the new arena.

use std::alloc::Layout;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

use tracing::{debug, error, trace, warn};

use crate::error::{AllocError, ConfigError};
use crate::system::{Global, SystemAllocator};

/// Arena fill attempts before `chunk_alloc` gives up.
const MAX_CHUNK_ATTEMPTS: usize = 3;

/// Link stored in the first word of every free block.
#[repr(C)]
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Tuning of a `Pool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PoolConfig {
    /// Size-class granularity and alignment of every pooled block
    pub align: usize,
    /// Largest pooled block, bigger requests bypass the pool
    pub max_bytes: usize,
    /// Blocks requested from the arena per refill
    pub batch: usize,
}

impl Default for PoolConfig {
    #[inline]
    fn default() -> Self {
        Self {
            align: 8,
            max_bytes: 128,
            batch: 20,
        }
    }
}

impl PoolConfig {
    /// Check that the configuration describes a usable pool.
    ///
    /// # Example
    /// ```rust
    /// use rb_pool_tree::{ConfigError, PoolConfig};
    ///
    /// assert!(PoolConfig::default().validate().is_ok());
    /// let config = PoolConfig { batch: 0, ..PoolConfig::default() };
    /// assert_eq!(config.validate(), Err(ConfigError::ZeroBatch));
    /// ```
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.align.is_power_of_two() {
            return Err(ConfigError::AlignNotPowerOfTwo(self.align));
        }
        let min = mem::size_of::<FreeBlock>();
        if self.align < min {
            return Err(ConfigError::AlignTooSmall {
                align: self.align,
                min,
            });
        }
        if self.max_bytes == 0 || self.max_bytes % self.align != 0 {
            return Err(ConfigError::MaxBytesNotMultiple {
                max_bytes: self.max_bytes,
                align: self.align,
            });
        }
        if self.batch == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        Ok(())
    }

    /// Number of size classes
    fn classes(&self) -> usize {
        self.max_bytes / self.align
    }
}

/// Counters describing how a `Pool` obtained its memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Bytes ever obtained from the system allocator for the arena
    pub heap_size: usize,
    /// Arena chunks obtained from the system allocator
    pub system_chunks: usize,
    /// Free-list refills served by the arena
    pub refills: usize,
    /// Free blocks repurposed as arena after the system allocator failed
    pub scavenged: usize,
    /// Blocks that bypassed the pool
    pub large_allocs: usize,
}

/// A size-class free-list allocator over a growable arena.
///
/// A block is either leased to a caller or linked into exactly one free
/// list. Arena chunks are returned to the system allocator when the pool is
/// dropped, so every pooled block must be released or abandoned before that.
///
/// # Example
/// ```rust
/// use rb_pool_tree::Pool;
///
/// let mut pool = Pool::new();
/// let block = pool.allocate(24).unwrap();
/// unsafe { pool.deallocate(block, 24) };
/// assert_eq!(pool.allocate(20).unwrap(), block);
/// assert_eq!(pool.stats().system_chunks, 1);
/// ```
pub struct Pool {
    config: PoolConfig,
    system: Box<dyn SystemAllocator>,
    /// Unused arena range `[start, end)`
    start: *mut u8,
    end: *mut u8,
    free_lists: Box<[Option<NonNull<FreeBlock>>]>,
    /// Chunks owned by the arena, released on drop
    chunks: Vec<(NonNull<u8>, Layout)>,
    stats: PoolStats,
}

impl Pool {
    /// Create a pool with the default configuration over the process allocator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::build(PoolConfig::default(), Box::new(Global))
    }

    /// Create a pool with `config` over the process allocator.
    #[inline]
    pub fn with_config(config: PoolConfig) -> Result<Self, ConfigError> {
        Self::with_system(config, Global)
    }

    /// Create a pool with `config` over a custom system allocator.
    #[inline]
    pub fn with_system<S>(config: PoolConfig, system: S) -> Result<Self, ConfigError>
    where
        S: SystemAllocator + 'static,
    {
        config.validate()?;
        Ok(Self::build(config, Box::new(system)))
    }

    fn build(config: PoolConfig, system: Box<dyn SystemAllocator>) -> Self {
        Self {
            config,
            system,
            start: ptr::null_mut(),
            end: ptr::null_mut(),
            free_lists: vec![None; config.classes()].into_boxed_slice(),
            chunks: Vec::new(),
            stats: PoolStats::default(),
        }
    }

    /// An empty pool with the same configuration over the process allocator.
    pub(crate) fn with_same_config(&self) -> Self {
        Self::build(self.config, Box::new(Global))
    }

    /// The configuration this pool was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Snapshot of the allocation counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Bytes left in the arena.
    #[inline]
    #[must_use]
    pub fn arena_remaining(&self) -> usize {
        self.end as usize - self.start as usize
    }

    /// Length of the free list serving `bytes`, zero for unpooled sizes.
    #[must_use]
    pub fn free_blocks(&self, bytes: usize) -> usize {
        if bytes > self.config.max_bytes {
            return 0;
        }
        let mut count = 0;
        let mut cur = self.free_lists[self.class_index(bytes)];
        while let Some(block) = cur {
            count += 1;
            // SAFETY: every block on a free list starts with a valid link.
            cur = unsafe { block.as_ref().next };
        }
        count
    }

    /// Lease a block of at least `bytes` bytes aligned to `PoolConfig::align`.
    ///
    /// # Errors
    ///
    /// Returns `AllocError::OutOfMemory` when the system allocator and every
    /// free list are exhausted.
    pub fn allocate(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        if bytes > self.config.max_bytes {
            let layout = self.large_layout(bytes, self.config.align)?;
            return self.allocate_large(layout);
        }
        match self.pop_free(self.class_index(bytes)) {
            Some(block) => Ok(block),
            None => self.refill(self.block_size(bytes)),
        }
    }

    /// Give a block back to the pool.
    ///
    /// # Safety
    ///
    /// `block` must have been leased by `allocate` (or `reallocate`) on this
    /// pool for the same `bytes`, and must not be used afterwards.
    pub unsafe fn deallocate(&mut self, block: NonNull<u8>, bytes: usize) {
        if bytes > self.config.max_bytes {
            if let Ok(layout) = self.large_layout(bytes, self.config.align) {
                self.system.deallocate(block, layout);
            }
            return;
        }
        self.push_free(self.class_index(bytes), block);
    }

    /// Resize a leased block, preserving the first `min(old_bytes, new_bytes)` bytes.
    ///
    /// A request that rounds to the same block size returns `block` itself.
    /// On failure the original block is left untouched and still leased.
    ///
    /// # Safety
    ///
    /// Same contract as `deallocate` for `block` and `old_bytes`.
    pub unsafe fn reallocate(
        &mut self,
        block: NonNull<u8>,
        old_bytes: usize,
        new_bytes: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if self.block_size(old_bytes) == self.block_size(new_bytes) {
            return Ok(block);
        }
        let fresh = self.allocate(new_bytes)?;
        ptr::copy_nonoverlapping(block.as_ptr(), fresh.as_ptr(), old_bytes.min(new_bytes));
        self.deallocate(block, old_bytes);
        Ok(fresh)
    }

    /// Lease a block fitting `layout`.
    ///
    /// Layouts that fit a size class come from the free lists, anything larger
    /// or more strictly aligned goes to the system allocator.
    pub fn allocate_layout(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if self.is_pooled(layout) {
            return self.allocate(layout.size());
        }
        let layout = self.large_layout(layout.size(), layout.align())?;
        self.allocate_large(layout)
    }

    /// Give back a block leased by `allocate_layout`.
    ///
    /// # Safety
    ///
    /// `block` must have been leased by `allocate_layout` on this pool with the
    /// same `layout`, and must not be used afterwards.
    pub unsafe fn deallocate_layout(&mut self, block: NonNull<u8>, layout: Layout) {
        if self.is_pooled(layout) {
            self.deallocate(block, layout.size());
        } else if let Ok(layout) = self.large_layout(layout.size(), layout.align()) {
            self.system.deallocate(block, layout);
        }
    }
}

impl Pool {
    fn is_pooled(&self, layout: Layout) -> bool {
        layout.align() <= self.config.align && layout.size() <= self.config.max_bytes
    }

    fn align_up(&self, bytes: usize) -> usize {
        bytes.saturating_add(self.config.align - 1) & !(self.config.align - 1)
    }

    /// Size of the block actually handed out for `bytes`.
    fn block_size(&self, bytes: usize) -> usize {
        self.align_up(bytes.max(1))
    }

    /// Free-list slot serving `bytes`, which must not exceed `max_bytes`.
    fn class_index(&self, bytes: usize) -> usize {
        self.block_size(bytes) / self.config.align - 1
    }

    fn large_layout(&self, bytes: usize, align: usize) -> Result<Layout, AllocError> {
        Layout::from_size_align(bytes.max(1), align)
            .map(|layout| layout.pad_to_align())
            .map_err(|_| AllocError::InvalidLayout { bytes, align })
    }

    fn allocate_large(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        match self.system.allocate(layout) {
            Some(block) => {
                self.stats.large_allocs += 1;
                Ok(block)
            }
            None => {
                error!(bytes = layout.size(), "system allocator refused a large block");
                Err(AllocError::OutOfMemory {
                    bytes: layout.size(),
                })
            }
        }
    }

    fn pop_free(&mut self, index: usize) -> Option<NonNull<u8>> {
        let head = self.free_lists[index]?;
        // SAFETY: every block on a free list starts with a valid link.
        self.free_lists[index] = unsafe { head.as_ref().next };
        Some(head.cast())
    }

    /// # Safety
    ///
    /// `block` must span at least one block of class `index` and be owned by
    /// nobody else.
    unsafe fn push_free(&mut self, index: usize, block: NonNull<u8>) {
        let block = block.cast::<FreeBlock>();
        block.as_ptr().write(FreeBlock {
            next: self.free_lists[index],
        });
        self.free_lists[index] = Some(block);
    }

    /// Return one block of `bytes` and link the rest of a batch into its free list.
    ///
    /// `bytes` is already rounded to a size class.
    fn refill(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        let mut nobjs = self.config.batch;
        let chunk = self.chunk_alloc(bytes, &mut nobjs)?;
        self.stats.refills += 1;
        trace!(bytes, nobjs, "refilled free list");
        if nobjs == 1 {
            return Ok(chunk);
        }

        let index = self.class_index(bytes);
        let mut next = self.free_lists[index];
        for i in (1..nobjs).rev() {
            // SAFETY: `chunk` spans `nobjs * bytes` bytes carved from the arena.
            let block = unsafe { NonNull::new_unchecked(chunk.as_ptr().add(i * bytes)) }
                .cast::<FreeBlock>();
            unsafe { block.as_ptr().write(FreeBlock { next }) };
            next = Some(block);
        }
        self.free_lists[index] = next;
        Ok(chunk)
    }

    /// Carve up to `nobjs` blocks of `bytes` from the arena.
    ///
    /// On return `nobjs` holds the number of blocks actually granted.
    fn chunk_alloc(&mut self, bytes: usize, nobjs: &mut usize) -> Result<NonNull<u8>, AllocError> {
        for _ in 0..MAX_CHUNK_ATTEMPTS {
            let total = bytes.saturating_mul(*nobjs);
            let left = self.arena_remaining();
            if left >= total {
                return Ok(self.carve(total));
            }
            if left >= bytes {
                *nobjs = left / bytes;
                return Ok(self.carve(*nobjs * bytes));
            }

            // The remainder is a whole number of alignment units below `bytes`.
            if let Some(rest) = NonNull::new(self.start).filter(|_| left > 0) {
                let index = self.class_index(left);
                unsafe { self.push_free(index, rest) };
            }
            self.start = ptr::null_mut();
            self.end = ptr::null_mut();

            let to_get = total
                .saturating_mul(2)
                .saturating_add(self.align_up(self.stats.heap_size >> 4));
            if self.grow(to_get) || self.scavenge(bytes) {
                continue;
            }
            error!(
                bytes = total,
                heap_size = self.stats.heap_size,
                "pool is out of memory"
            );
            return Err(AllocError::OutOfMemory { bytes: total });
        }
        Err(AllocError::OutOfMemory {
            bytes: bytes.saturating_mul(*nobjs),
        })
    }

    /// Take `total` bytes off the front of the arena, which must hold them.
    fn carve(&mut self, total: usize) -> NonNull<u8> {
        let block = self.start;
        // SAFETY: callers checked `arena_remaining() >= total > 0`, so the arena
        // is non-null and `start + total` stays inside it.
        unsafe {
            self.start = self.start.add(total);
            NonNull::new_unchecked(block)
        }
    }

    /// Replace the (empty) arena with a fresh system chunk of `bytes`.
    fn grow(&mut self, bytes: usize) -> bool {
        let Ok(layout) = Layout::from_size_align(bytes, self.config.align) else {
            return false;
        };
        let Some(chunk) = self.system.allocate(layout) else {
            return false;
        };
        self.chunks.push((chunk, layout));
        self.start = chunk.as_ptr();
        // SAFETY: the chunk spans `bytes` bytes.
        self.end = unsafe { self.start.add(bytes) };
        self.stats.heap_size += bytes;
        self.stats.system_chunks += 1;
        debug!(
            chunk = bytes,
            heap_size = self.stats.heap_size,
            "grew pool arena"
        );
        true
    }

    /// Repurpose a free block of at least `bytes` as the (empty) arena.
    fn scavenge(&mut self, bytes: usize) -> bool {
        let mut size = bytes;
        while size <= self.config.max_bytes {
            if let Some(block) = self.pop_free(self.class_index(size)) {
                self.start = block.as_ptr();
                // SAFETY: blocks of this class span `size` bytes.
                self.end = unsafe { self.start.add(size) };
                self.stats.scavenged += 1;
                warn!(
                    block = size,
                    wanted = bytes,
                    "system allocator exhausted, reusing a free block as arena"
                );
                return true;
            }
            size += self.config.align;
        }
        false
    }
}

impl Default for Pool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        for (chunk, layout) in self.chunks.drain(..) {
            // SAFETY: every chunk came from `self.system` with this layout.
            unsafe { self.system.deallocate(chunk, layout) };
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("arena_remaining", &self.arena_remaining())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::system::Limited;

    fn small_batch() -> PoolConfig {
        PoolConfig {
            batch: 2,
            ..PoolConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PoolConfig::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let base = PoolConfig::default();
        assert_eq!(
            PoolConfig { align: 12, ..base }.validate(),
            Err(ConfigError::AlignNotPowerOfTwo(12))
        );
        assert_eq!(
            PoolConfig { align: 2, ..base }.validate(),
            Err(ConfigError::AlignTooSmall {
                align: 2,
                min: mem::size_of::<usize>(),
            })
        );
        assert_eq!(
            PoolConfig {
                max_bytes: 100,
                ..base
            }
            .validate(),
            Err(ConfigError::MaxBytesNotMultiple {
                max_bytes: 100,
                align: 8,
            })
        );
        assert_eq!(
            PoolConfig { batch: 0, ..base }.validate(),
            Err(ConfigError::ZeroBatch)
        );
        assert!(Pool::with_config(PoolConfig { batch: 0, ..base }).is_err());
    }

    #[test]
    fn twenty_five_small_blocks_take_two_refills() {
        let mut pool = Pool::new();
        let first: Vec<_> = (0..20).map(|_| pool.allocate(16).unwrap()).collect();
        assert_eq!(pool.stats().refills, 1);
        assert_eq!(pool.stats().system_chunks, 1);
        assert_eq!(pool.stats().heap_size, 640);
        assert_eq!(pool.free_blocks(16), 0);
        assert_eq!(pool.arena_remaining(), 320);

        let rest: Vec<_> = (0..5).map(|_| pool.allocate(16).unwrap()).collect();
        assert_eq!(pool.stats().refills, 2);
        assert_eq!(pool.stats().system_chunks, 1);
        assert_eq!(pool.free_blocks(16), 15);
        assert_eq!(pool.arena_remaining(), 0);

        let mut addrs: Vec<_> = first
            .iter()
            .chain(rest.iter())
            .map(|b| b.as_ptr() as usize)
            .collect();
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), 25);
        assert!(addrs.windows(2).all(|w| w[1] - w[0] >= 16));
    }

    #[test]
    fn deallocate_then_allocate_reuses_the_block() {
        let mut pool = Pool::new();
        let block = pool.allocate(24).unwrap();
        let stats = pool.stats();
        unsafe { pool.deallocate(block, 24) };
        assert_eq!(pool.free_blocks(24), 20);
        assert_eq!(pool.allocate(17).unwrap(), block);
        assert_eq!(pool.stats(), stats);
    }

    #[test]
    fn zero_bytes_use_the_smallest_class() {
        let mut pool = Pool::new();
        let block = pool.allocate(0).unwrap();
        assert_eq!(block.as_ptr() as usize % 8, 0);
        assert_eq!(pool.free_blocks(8), 19);
        unsafe { pool.deallocate(block, 0) };
        assert_eq!(pool.free_blocks(1), 20);
    }

    #[test]
    fn large_blocks_bypass_the_pool() {
        let mut pool = Pool::with_system(PoolConfig::default(), Limited::new(1024)).unwrap();
        let block = pool.allocate(129).unwrap();
        assert_eq!(pool.stats().large_allocs, 1);
        assert_eq!(pool.stats().system_chunks, 0);
        assert_eq!(pool.arena_remaining(), 0);
        unsafe { pool.deallocate(block, 129) };
        assert_eq!(
            pool.allocate(2048),
            Err(AllocError::OutOfMemory { bytes: 2048 })
        );
    }

    #[test]
    fn over_aligned_layout_goes_to_the_system() {
        let mut pool = Pool::new();
        let layout = Layout::from_size_align(32, 64).unwrap();
        let block = pool.allocate_layout(layout).unwrap();
        assert_eq!(block.as_ptr() as usize % 64, 0);
        assert_eq!(pool.stats().large_allocs, 1);
        unsafe { pool.deallocate_layout(block, layout) };

        let layout = Layout::new::<[u64; 3]>();
        let block = pool.allocate_layout(layout).unwrap();
        assert_eq!(pool.stats().refills, 1);
        unsafe { pool.deallocate_layout(block, layout) };
        assert_eq!(pool.free_blocks(24), 20);
    }

    #[test]
    fn arena_remainder_is_donated_before_growing() {
        let mut pool = Pool::with_config(small_batch()).unwrap();
        let _a = pool.allocate(64).unwrap();
        assert_eq!(pool.arena_remaining(), 128);
        let _c = pool.allocate(48).unwrap();
        assert_eq!(pool.arena_remaining(), 32);
        let _b = pool.allocate(64).unwrap();
        assert_eq!(pool.free_blocks(32), 0);

        let _d = pool.allocate(64).unwrap();
        assert_eq!(pool.free_blocks(32), 1);
        assert_eq!(pool.stats().system_chunks, 2);
        assert_eq!(pool.stats().heap_size, 256 + 272);
        assert_eq!(pool.arena_remaining(), 144);
    }

    #[test]
    fn exhausted_system_falls_back_to_larger_free_blocks() {
        let mut pool = Pool::with_system(small_batch(), Limited::new(256)).unwrap();
        let a = pool.allocate(64).unwrap();
        unsafe { pool.deallocate(a, 64) };
        let _c = pool.allocate(128).unwrap();
        assert_eq!(pool.arena_remaining(), 0);
        assert_eq!(pool.free_blocks(64), 2);

        let d = pool.allocate(32).unwrap();
        assert_eq!(d, a);
        assert_eq!(pool.stats().scavenged, 1);
        assert_eq!(pool.stats().system_chunks, 1);
        assert_eq!(pool.free_blocks(64), 1);
        assert_eq!(pool.free_blocks(32), 1);

        let _e = pool.allocate(32).unwrap();
        let _f = pool.allocate(32).unwrap();
        assert_eq!(pool.stats().scavenged, 2);
        assert_eq!(pool.free_blocks(64), 0);

        assert_eq!(
            pool.allocate(128),
            Err(AllocError::OutOfMemory { bytes: 256 })
        );
        assert_eq!(pool.free_blocks(32), 1);
    }

    #[test]
    fn reallocate_preserves_contents() {
        let mut pool = Pool::new();
        let text = b"sixteen bytes!!!";
        let block = pool.allocate(16).unwrap();
        unsafe { ptr::copy_nonoverlapping(text.as_ptr(), block.as_ptr(), text.len()) };

        let same = unsafe { pool.reallocate(block, 16, 12) }.unwrap();
        assert_eq!(same, block);

        let moved = unsafe { pool.reallocate(block, 16, 100) }.unwrap();
        assert_ne!(moved, block);
        assert_eq!(unsafe { std::slice::from_raw_parts(moved.as_ptr(), 16) }, text);
        assert_eq!(pool.free_blocks(16), 20);

        let large = unsafe { pool.reallocate(moved, 100, 1000) }.unwrap();
        assert_eq!(unsafe { std::slice::from_raw_parts(large.as_ptr(), 16) }, text);
        assert_eq!(pool.stats().large_allocs, 1);
        unsafe { pool.deallocate(large, 1000) };
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_deserializes_with_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{ "batch": 4 }"#).unwrap();
        assert_eq!(
            config,
            PoolConfig {
                batch: 4,
                ..PoolConfig::default()
            }
        );
        let stats = serde_json::to_value(PoolStats::default()).unwrap();
        assert_eq!(stats["refills"], 0);
    }
}
