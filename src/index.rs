use std::fmt;
use std::hash::Hash;

pub type DefaultIx = u32;

/// # Safety
///
/// `new(x).index()` must return `x` for every `x` below `max().index()`.
pub unsafe trait IndexType: Copy + Default + Hash + Ord + fmt::Debug + 'static {
    fn new(x: usize) -> Self;
    fn index(&self) -> usize;
    fn max() -> Self;
}

unsafe impl IndexType for u32 {
    #[inline(always)]
    fn new(x: usize) -> Self {
        x as u32
    }
    #[inline(always)]
    fn index(&self) -> usize {
        *self as usize
    }
    #[inline(always)]
    fn max() -> Self {
        u32::MAX
    }
}

unsafe impl IndexType for usize {
    #[inline(always)]
    fn new(x: usize) -> Self {
        x
    }
    #[inline(always)]
    fn index(&self) -> usize {
        *self
    }
    #[inline(always)]
    fn max() -> Self {
        usize::MAX
    }
}

/// Node identifier.
///
/// Slot `0` is always the header sentinel and the maximum index value
/// stands for a null link.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct NodeIndex<Ix = DefaultIx>(Ix);

impl<Ix: IndexType> NodeIndex<Ix> {
    #[inline]
    pub fn new(x: usize) -> Self {
        NodeIndex(IndexType::new(x))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0.index()
    }

    /// The null link.
    #[inline]
    pub fn nil() -> Self {
        NodeIndex(IndexType::max())
    }

    /// The header sentinel, which doubles as `end()`.
    #[inline]
    pub fn header() -> Self {
        NodeIndex::new(0)
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self == Self::nil()
    }

    #[inline]
    pub fn is_header(self) -> bool {
        self == Self::header()
    }
}

impl<Ix: fmt::Debug> fmt::Debug for NodeIndex<Ix> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeIndex({:?})", self.0)
    }
}
