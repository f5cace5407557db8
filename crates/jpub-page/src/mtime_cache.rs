//! Stamp-validated cache shared by definitions and templates.
//!
//! Every lookup compares the stamp stored with an entry (an mtime, or a pair
//! of mtimes) against the live stamp of the backing source, and reloads on
//! mismatch. The hit path takes a read lock only. Loads are serialized per
//! key with a lazily created lock, so concurrent cold lookups of one key read
//! the source once while other keys proceed independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// Immutable snapshot of a cached value and the stamp it was loaded at.
///
/// Entries are replaced on reload, never mutated.
pub struct CacheEntry<V, S> {
    value: Arc<V>,
    stamp: S,
}

impl<V, S> CacheEntry<V, S> {
    #[must_use]
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// Stamp of the source when the value was read.
    #[must_use]
    pub fn stamp(&self) -> &S {
        &self.stamp
    }
}

impl<V: fmt::Debug, S: fmt::Debug> fmt::Debug for CacheEntry<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("value", &self.value)
            .field("stamp", &self.stamp)
            .finish()
    }
}

pub(crate) struct MtimeCache<V, S> {
    entries: RwLock<HashMap<String, Arc<CacheEntry<V, S>>>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<V, S> MtimeCache<V, S>
where
    S: PartialEq + fmt::Debug,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current entry for a key, valid or not.
    pub(crate) fn entry(&self, key: &str) -> Option<Arc<CacheEntry<V, S>>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Drop the entry for a key. Returns whether one was present.
    pub(crate) fn remove(&self, key: &str) -> bool {
        let removed = self.entries.write().unwrap().remove(key).is_some();
        self.release_key_lock(key);
        removed
    }

    pub(crate) fn clear(&self) {
        self.entries.write().unwrap().clear();
        self.key_locks
            .lock()
            .unwrap()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Cached keys, sorted.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().unwrap().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap();
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }

    /// Forget the lock of a key nobody is holding or waiting on.
    fn release_key_lock(&self, key: &str) {
        let mut locks = self.key_locks.lock().unwrap();
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn key_lock_count(&self) -> usize {
        self.key_locks.lock().unwrap().len()
    }

    /// Return the value for `key`, loading it if absent or stale.
    ///
    /// `stamp` reads the live stamp of the source. `load` reads and parses the
    /// source; it receives the stale value, if any, so it can reload in place.
    ///
    /// The stamp is taken before the load and checked again after it. If the
    /// source changed in between, the load is retried once; if it changed
    /// again, the value is stored under the pre-load stamp so the next lookup
    /// reloads. Errors from either closure are returned as-is and nothing is
    /// stored.
    ///
    /// # Panics
    ///
    /// Panics if internal locks are poisoned.
    pub(crate) fn get_or_load<E>(
        &self,
        key: &str,
        stamp: impl FnMut() -> Result<S, E>,
        load: impl FnMut(Option<&Arc<V>>) -> Result<Arc<V>, E>,
    ) -> Result<Arc<V>, E> {
        self.get_or_evict(key, |_| false, stamp, load)
    }

    /// Like [`get_or_load`](Self::get_or_load), but an error for which
    /// `is_gone` holds also drops the cached entry.
    ///
    /// The entry is only dropped while holding the key's lock, after the
    /// source was found missing under that lock, so a value loaded from a
    /// recreated source is never evicted by a stale observation.
    ///
    /// # Panics
    ///
    /// Panics if internal locks are poisoned.
    pub(crate) fn get_or_evict<E>(
        &self,
        key: &str,
        is_gone: impl Fn(&E) -> bool,
        mut stamp: impl FnMut() -> Result<S, E>,
        mut load: impl FnMut(Option<&Arc<V>>) -> Result<Arc<V>, E>,
    ) -> Result<Arc<V>, E> {
        // Fast path: read lock only
        match stamp() {
            Ok(live) => {
                if let Some(entry) = self.entry(key)
                    && entry.stamp == live
                {
                    tracing::trace!(key, "Cache hit");
                    return Ok(Arc::clone(&entry.value));
                }
            }
            // Nothing cached to evict
            Err(e) if !is_gone(&e) || self.entry(key).is_none() => return Err(e),
            Err(_) => {}
        }

        let lock = self.key_lock(key);
        let guard = lock.lock().unwrap();
        let result = self.load_locked(key, &mut stamp, &mut load);
        let evicted = matches!(&result, Err(e) if is_gone(e))
            && self.entries.write().unwrap().remove(key).is_some();
        drop(guard);
        drop(lock);

        if evicted {
            tracing::debug!(key, "Evicted");
            self.release_key_lock(key);
        }
        result
    }

    /// Check-then-load for one key. The caller holds the key's lock.
    fn load_locked<E>(
        &self,
        key: &str,
        stamp: &mut impl FnMut() -> Result<S, E>,
        load: &mut impl FnMut(Option<&Arc<V>>) -> Result<Arc<V>, E>,
    ) -> Result<Arc<V>, E> {
        // Double-check: another thread may have loaded while we waited
        let live = stamp()?;
        let current = self.entry(key);
        if let Some(entry) = &current
            && entry.stamp == live
        {
            return Ok(Arc::clone(&entry.value));
        }

        let previous = current.map(|entry| Arc::clone(&entry.value));
        let mut before = live;
        let mut retried = false;
        loop {
            let value = load(previous.as_ref())?;
            let after = stamp()?;
            if after == before || retried {
                if after != before {
                    tracing::warn!(key, stored = ?before, live = ?after, "Source changed during load");
                }
                tracing::debug!(key, stamp = ?before, reload = previous.is_some(), "Loaded");
                let entry = Arc::new(CacheEntry {
                    value: Arc::clone(&value),
                    stamp: before,
                });
                self.entries.write().unwrap().insert(key.to_owned(), entry);
                return Ok(value);
            }
            retried = true;
            before = after;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::*;

    static_assertions::assert_impl_all!(MtimeCache<String, f64>: Send, Sync);

    #[derive(Debug)]
    struct NotFound;

    /// Source whose stamp can change while a load is in progress.
    struct Source {
        stamps: Mutex<Vec<f64>>,
        loads: AtomicUsize,
    }

    impl Source {
        fn new(stamps: &[f64]) -> Self {
            Self {
                stamps: Mutex::new(stamps.iter().rev().copied().collect()),
                loads: AtomicUsize::new(0),
            }
        }

        /// Pops the next stamp, repeating the last one forever.
        fn stamp(&self) -> Result<f64, NotFound> {
            let mut stamps = self.stamps.lock().unwrap();
            if stamps.len() > 1 {
                Ok(stamps.pop().unwrap())
            } else {
                stamps.last().copied().ok_or(NotFound)
            }
        }

        fn load(&self) -> Result<Arc<String>, NotFound> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Arc::new(format!("v{n}")))
        }
    }

    #[allow(clippy::float_cmp)]
    #[test]
    fn test_hit_returns_same_value() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let source = Source::new(&[1.0]);

        let first = cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();
        let second = cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(*cache.entry("a").unwrap().stamp(), 1.0);
    }

    #[allow(clippy::float_cmp)]
    #[test]
    fn test_stale_entry_reloads_with_previous() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let stamp = Mutex::new(1.0);
        let seen_previous = Mutex::new(None);

        cache
            .get_or_load("a", || Ok::<_, NotFound>(*stamp.lock().unwrap()), |_| {
                Ok(Arc::new("old".to_owned()))
            })
            .unwrap();
        *stamp.lock().unwrap() = 2.0;
        let value = cache
            .get_or_load(
                "a",
                || Ok::<_, NotFound>(*stamp.lock().unwrap()),
                |previous| {
                    *seen_previous.lock().unwrap() = previous.map(|p| p.as_str().to_owned());
                    Ok(Arc::new("new".to_owned()))
                },
            )
            .unwrap();

        assert_eq!(*value, "new");
        assert_eq!(seen_previous.lock().unwrap().as_deref(), Some("old"));
        assert_eq!(*cache.entry("a").unwrap().stamp(), 2.0);
    }

    #[allow(clippy::float_cmp)]
    #[test]
    fn test_change_during_load_retries_once() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        // before=1, after=2 (changed), retry: after=2 (stable)
        let source = Source::new(&[1.0, 1.0, 2.0, 2.0]);

        let value = cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();

        assert_eq!(*value, "v2");
        assert_eq!(*cache.entry("a").unwrap().stamp(), 2.0);
    }

    #[allow(clippy::float_cmp)]
    #[test]
    fn test_repeated_change_keeps_pre_load_stamp() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        // before=1, after=2, retry before=2, after=3
        let source = Source::new(&[1.0, 1.0, 2.0, 3.0]);

        cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(*cache.entry("a").unwrap().stamp(), 2.0);
        // Live stamp is now 3, so the next lookup reloads
        let value = cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();
        assert_eq!(*value, "v3");
    }

    #[test]
    fn test_load_error_not_stored() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();

        let result = cache.get_or_load("a", || Ok(1.0), |_| Err(NotFound));

        assert!(result.is_err());
        assert!(cache.entry("a").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_stamp_error_propagates() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let loads = AtomicUsize::new(0);

        let result = cache.get_or_load(
            "a",
            || Err::<f64, _>(NotFound),
            |_| {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(String::new()))
            },
        );

        assert!(result.is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_gone_source_evicts_entry() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let source = Source::new(&[1.0]);
        cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();

        let result = cache.get_or_evict(
            "a",
            |_: &NotFound| true,
            || Err(NotFound),
            |_| source.load(),
        );

        assert!(result.is_err());
        assert!(cache.entry("a").is_none());
        assert_eq!(cache.key_lock_count(), 0);
    }

    #[test]
    fn test_gone_source_recreated_before_lock_is_kept() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let source = Source::new(&[1.0]);
        cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();
        // Missing on the unlocked check, back again once the key is locked
        let mut stamps = vec![Ok(2.0), Err(NotFound)];

        let value = cache
            .get_or_evict(
                "a",
                |_| true,
                || stamps.pop().unwrap_or(Ok(2.0)),
                |_| source.load(),
            )
            .unwrap();

        assert_eq!(*value, "v2");
        assert_eq!(*cache.entry("a").unwrap().value(), value);
    }

    #[test]
    fn test_miss_without_entry_takes_no_lock() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();

        for i in 0..100 {
            let key = format!("missing-{i}");
            let result = cache.get_or_evict(
                &key,
                |_: &NotFound| true,
                || Err(NotFound),
                |_| Ok(Arc::new(String::new())),
            );
            assert!(result.is_err());
        }

        assert_eq!(cache.key_lock_count(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let source = Source::new(&[1.0]);
        cache.get_or_load("b", || source.stamp(), |_| source.load()).unwrap();
        cache.get_or_load("a", || source.stamp(), |_| source.load()).unwrap();

        assert_eq!(cache.keys(), vec!["a", "b"]);
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.key_lock_count(), 0);
    }

    #[test]
    fn test_concurrent_cold_loads_once() {
        let cache: MtimeCache<String, f64> = MtimeCache::new();
        let loads = AtomicUsize::new(0);
        let threads = 8;
        let barrier = Barrier::new(threads);

        let values: Vec<Arc<String>> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_load(
                                "a",
                                || Ok::<_, NotFound>(1.0),
                                |_| {
                                    loads.fetch_add(1, Ordering::SeqCst);
                                    thread::sleep(Duration::from_millis(20));
                                    Ok(Arc::new("v".to_owned()))
                                },
                            )
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }
}
