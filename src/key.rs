//! Key projection and ordering capabilities supplied to `RbTree`.

use std::marker::PhantomData;

/// Extracts the ordering key from a stored value.
pub trait KeyOfValue<V> {
    type Key: ?Sized;

    fn key<'a>(&self, value: &'a V) -> &'a Self::Key;
}

/// The value is its own key, as in a set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl<V> KeyOfValue<V> for Identity {
    type Key = V;

    #[inline]
    fn key<'a>(&self, value: &'a V) -> &'a V {
        value
    }
}

/// The key is the first field of a pair, as in a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct First;

impl<K, T> KeyOfValue<(K, T)> for First {
    type Key = K;

    #[inline]
    fn key<'a>(&self, value: &'a (K, T)) -> &'a K {
        &value.0
    }
}

/// A strict weak ordering over keys.
///
/// Any `Fn(&K, &K) -> bool` returning "a sorts before b" is a `Compare`.
pub trait Compare<K: ?Sized> {
    fn less(&self, a: &K, b: &K) -> bool;
}

/// Ascending order by `Ord`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Less;

impl<K: Ord + ?Sized> Compare<K> for Less {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Descending order by `Ord`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Greater;

impl<K: Ord + ?Sized> Compare<K> for Greater {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a > b
    }
}

impl<K, F> Compare<K> for F
where
    K: ?Sized,
    F: Fn(&K, &K) -> bool,
{
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        self(a, b)
    }
}

/// Orders by a projection of the key, e.g. a struct field.
///
/// # Example
/// ```rust
/// use rb_pool_tree::{By, Compare};
///
/// let by_len = By::new(|s: &&str| s.len());
/// assert!(by_len.less(&"ab", &"abc"));
/// ```
pub struct By<K: ?Sized, F> {
    project: F,
    marker: PhantomData<fn(&K)>,
}

impl<K: ?Sized, F> By<K, F> {
    #[inline]
    pub fn new(project: F) -> Self {
        Self {
            project,
            marker: PhantomData,
        }
    }
}

impl<K, F, P> Compare<K> for By<K, F>
where
    K: ?Sized,
    F: Fn(&K) -> P,
    P: Ord,
{
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        (self.project)(a) < (self.project)(b)
    }
}

impl<K: ?Sized, F: Clone> Clone for By<K, F> {
    fn clone(&self) -> Self {
        Self::new(self.project.clone())
    }
}
