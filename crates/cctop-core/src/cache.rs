//! Stamped read-through caches and the time/stat seams they are checked against.
//!
//! Every memoized lookup in the engine stores a "stamp" next to its value,
//! usually a file modification time. A lookup only hits when the caller's
//! current stamp equals the stored one, so staleness is detected by a cheap
//! comparison instead of a TTL.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::time::SystemTime;

/// Source of "now" for freshness windows
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Source of file modification times
pub trait StatProvider: Send + Sync {
    /// Modification time of `path`, or `None` if it cannot be read
    fn modified(&self, path: &Path) -> Option<SystemTime>;
}

/// Reads modification times from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStat;

impl StatProvider for FsStat {
    fn modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

#[derive(Debug, Clone)]
struct Stamped<S, V> {
    stamp: S,
    value: V,
}

/// Map whose entries are only valid while their stamp matches
#[derive(Debug, Clone)]
pub struct StampedCache<K, S, V> {
    entries: HashMap<K, Stamped<S, V>>,
}

impl<K, S, V> Default for StampedCache<K, S, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, S, V> StampedCache<K, S, V>
where
    K: Eq + Hash,
    S: PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key` if it was stored under the same `stamp`
    pub fn get(&self, key: &K, stamp: &S) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|e| e.stamp == *stamp)
            .map(|e| &e.value)
    }

    /// Store `value` for `key` under `stamp`, replacing any previous entry
    pub fn insert(&mut self, key: K, stamp: S, value: V) {
        self.entries.insert(key, Stamped { stamp, value });
    }

    /// Return the cached value, computing and storing it on miss or stale stamp
    pub fn get_or_insert_with(&mut self, key: K, stamp: S, f: impl FnOnce() -> V) -> &V {
        match self.entries.entry(key) {
            Entry::Occupied(mut o) => {
                if o.get().stamp != stamp {
                    o.insert(Stamped { stamp, value: f() });
                }
                &o.into_mut().value
            }
            Entry::Vacant(v) => &v.insert(Stamped { stamp, value: f() }).value,
        }
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), but a stale
    /// entry is handed to `f` so it can be brought up to date instead of
    /// rebuilt.
    pub fn get_or_update_with(
        &mut self,
        key: K,
        stamp: S,
        f: impl FnOnce(Option<V>) -> V,
    ) -> &V {
        let value = match self.entries.remove(&key) {
            Some(e) if e.stamp == stamp => e.value,
            previous => f(previous.map(|e| e.value)),
        };
        &self.entries.entry(key).or_insert(Stamped { stamp, value }).value
    }

    /// Drop the entry for `key` if its stamp differs from `current`.
    ///
    /// Returns true when an entry was removed.
    pub fn invalidate_if_stale(&mut self, key: &K, current: &S) -> bool {
        let stale = self
            .entries
            .get(key)
            .map(|e| e.stamp != *current)
            .unwrap_or(false);
        if stale {
            self.entries.remove(key);
        }
        stale
    }

    /// Drop every entry
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Keep only entries whose key satisfies `f`
    pub fn retain_keys(&mut self, mut f: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| f(k));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
