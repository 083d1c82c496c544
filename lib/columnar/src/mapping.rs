//! Row mappings and the shared remap cache.
//!
//! A mapping is an `i32` array interpreted as a per-row lookup into an
//! underlying column: position `i` of a mapped view reads the underlying row
//! `mapping[i]`. Negative and out-of-range entries are deliberate sentinels
//! for missing rows; they must survive composition unchanged and are never
//! normalized away.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;
use tracing::trace;

/// Composes two mappings into the mapping of the doubly-mapped view.
///
/// `inner` addresses rows of the view described by `outer`, so the combined
/// view reads `outer[inner[i]]` at position `i`. Sentinel entries of `inner`
/// and entries addressing outside of `outer` turn into `-1`.
pub fn compose(outer: &[i32], inner: &[i32]) -> Vec<i32> {
    inner
        .iter()
        .map(|&row| {
            if row >= 0 && (row as usize) < outer.len() {
                outer[row as usize]
            } else {
                -1
            }
        })
        .collect()
}

/// A cache deduplicating mapping compositions across the columns of one
/// mapping operation.
///
/// When a row selection is applied to a whole table, every column sharing
/// the same view mapping needs the identical composition. The cache is keyed
/// by the identity of the already-present mapping array, the composition
/// runs at most once per key even under concurrent access, and every caller
/// observes the same result allocation.
///
/// Keys are raw buffer addresses, so a cache is only meaningful for the
/// duration of the single bulk operation it was created for.
#[derive(Default)]
pub struct RemapCache {
    inner: Mutex<HashMap<usize, Arc<OnceLock<Arc<[i32]>>>>>,
}

impl RemapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached composition for `key`, computing it at most once.
    pub fn get_or_compute<F>(&self, key: &Arc<[i32]>, compute: F) -> Arc<[i32]>
    where
        F: FnOnce() -> Vec<i32>,
    {
        let cell = {
            let mut inner = self.inner.lock();
            Arc::clone(inner.entry(key.as_ptr() as usize).or_default())
        };
        cell.get_or_init(|| {
            trace!(len = key.len(), "composing uncached mapping");
            compute().into()
        })
        .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn compose_keeps_sentinels() {
        let outer = [3, -1, 0, 7];
        let inner = [0, 1, 2, 3, -1, 4, -20];
        assert_eq!(compose(&outer, &inner), vec![3, -1, 0, 7, -1, -1, -1]);
    }

    #[test]
    fn compose_empty_inner() {
        assert_eq!(compose(&[1, 2, 3], &[]), Vec::<i32>::new());
    }

    #[test]
    fn cache_computes_once_per_key() {
        let cache = RemapCache::new();
        let key: Arc<[i32]> = vec![1, 0, 2].into();
        let computations = AtomicUsize::new(0);

        let first = cache.get_or_compute(&key, || {
            computations.fetch_add(1, Ordering::Relaxed);
            vec![5, 6, 7]
        });
        let second = cache.get_or_compute(&key, || {
            computations.fetch_add(1, Ordering::Relaxed);
            vec![8, 9, 10]
        });

        assert_eq!(computations.load(Ordering::Relaxed), 1);
        assert_eq!(&*first, &[5, 6, 7]);
        // identical allocation, not merely equal contents
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn cache_deduplicates_across_threads() {
        let cache = RemapCache::new();
        let key: Arc<[i32]> = (0..64).collect::<Vec<_>>().into();
        let computations = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache.get_or_compute(&key, || {
                            computations.fetch_add(1, Ordering::Relaxed);
                            key.iter().rev().copied().collect()
                        })
                    })
                })
                .collect::<Vec<_>>();
            let results = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>();
            for result in &results[1..] {
                assert!(Arc::ptr_eq(&results[0], result));
            }
        });

        assert_eq!(computations.load(Ordering::Relaxed), 1);
    }
}
