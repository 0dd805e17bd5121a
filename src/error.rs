use thiserror::Error;

/// Failure to obtain memory from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AllocError {
    /// Both the system allocator and every free list are exhausted.
    #[error("out of memory while allocating {bytes} bytes")]
    OutOfMemory {
        /// Bytes requested from the arena when the failure surfaced.
        bytes: usize,
    },
    /// The requested size cannot be expressed as a valid layout.
    #[error("invalid layout: {bytes} bytes aligned to {align}")]
    InvalidLayout {
        /// Requested size
        bytes: usize,
        /// Requested alignment
        align: usize,
    },
}

/// Rejected `PoolConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("alignment {0} is not a power of two")]
    AlignNotPowerOfTwo(usize),
    #[error("alignment {align} cannot hold a free-list link of {min} bytes")]
    AlignTooSmall { align: usize, min: usize },
    #[error("max block size {max_bytes} is not a non-zero multiple of the alignment {align}")]
    MaxBytesNotMultiple { max_bytes: usize, align: usize },
    #[error("refill batch must be at least one block")]
    ZeroBatch,
}

/// A broken red-black tree invariant reported by `RbTree::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvariantError {
    #[error("the root is red")]
    RedRoot,
    #[error("red node at slot {0} has a red child")]
    RedRed(usize),
    #[error("black height differs below slot {0}: {1} on the left, {2} on the right")]
    BlackHeight(usize, usize, usize),
    #[error("child at slot {0} does not point back to its parent")]
    ParentLink(usize),
    #[error("node at slot {0} is out of order")]
    Order(usize),
    #[error("header caches a stale minimum or maximum")]
    HeaderCache,
    #[error("tree holds {found} nodes but reports a length of {len}")]
    Len { len: usize, found: usize },
}
