//! Cache store — the ordered collection of memoized requests.
//!
//! A [`CacheStore`] belongs to exactly one memoizer. Lookup and reservation
//! happen under one lock acquisition, so two calls with equal parameters can
//! never both miss: the second always finds the entry the first reserved.
//!
//! ## Core types
//!
//! - [`CacheEntry`] — one request/response pairing and its settlement state.
//! - [`EntryState`] — `Pending`, `Resolved`, or `Errored`.
//! - [`InFlight`] — awaitable handle on a pending entry.
//! - [`Lookup`] — result of [`CacheStore::lookup_or_reserve`].
//! - [`schedule_eviction`] — deferred removal of a settled entry.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::http::{RequestInfo, RequestInit};

mod entry;
mod evict;

pub use entry::{CacheEntry, EntryState, InFlight};
pub use evict::schedule_eviction;

/// Result of [`CacheStore::lookup_or_reserve`].
#[derive(Debug)]
pub enum Lookup {
    /// An entry with equal parameters already existed.
    Hit(Arc<CacheEntry>),
    /// No entry matched; this fresh pending entry was appended to the store.
    Reserved(Arc<CacheEntry>),
}

/// An ordered, exclusively owned collection of [`CacheEntry`].
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<Vec<Arc<CacheEntry>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first entry, in insertion order, whose parameters equal
    /// `(input, init)`, or reserves a new pending entry at the end.
    pub fn lookup_or_reserve(&self, input: &RequestInfo, init: Option<&RequestInit>) -> Lookup {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.iter().find(|entry| entry.matches(input, init)) {
            return Lookup::Hit(Arc::clone(entry));
        }

        let entry = Arc::new(CacheEntry::new(input.clone(), init.cloned()));
        entries.push(Arc::clone(&entry));
        Lookup::Reserved(entry)
    }

    /// Returns the matching entry without reserving one.
    pub fn find(&self, input: &RequestInfo, init: Option<&RequestInit>) -> Option<Arc<CacheEntry>> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.matches(input, init))
            .cloned()
    }

    /// Removes `entry` by identity. Returns `false` if it was already gone.
    pub fn remove(&self, entry: &Arc<CacheEntry>) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|e| Arc::ptr_eq(e, entry)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every entry. In-flight requests still run to settlement.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn reserved(lookup: Lookup) -> Arc<CacheEntry> {
        match lookup {
            Lookup::Reserved(entry) => entry,
            Lookup::Hit(_) => panic!("expected a miss"),
        }
    }

    fn hit(lookup: Lookup) -> Arc<CacheEntry> {
        match lookup {
            Lookup::Hit(entry) => entry,
            Lookup::Reserved(_) => panic!("expected a hit"),
        }
    }

    #[test]
    fn miss_then_hit_returns_same_entry() {
        let store = CacheStore::new();
        let first = reserved(store.lookup_or_reserve(&"/a".into(), None));
        let second = hit(store.lookup_or_reserve(&"/a".into(), None));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_but_equal_inits_match() {
        let store = CacheStore::new();
        let a = RequestInit::new().method(Method::Post).body("x");
        let b = RequestInit::new().method(Method::Post).body("x");
        reserved(store.lookup_or_reserve(&"/a".into(), Some(&a)));
        hit(store.lookup_or_reserve(&"/a".into(), Some(&b)));
    }

    #[test]
    fn any_differing_field_misses() {
        let store = CacheStore::new();
        let base = RequestInit::new().method(Method::Post).body("x");
        reserved(store.lookup_or_reserve(&"/a".into(), Some(&base)));
        reserved(store.lookup_or_reserve(&"/a".into(), Some(&base.clone().body("y"))));
        reserved(store.lookup_or_reserve(&"/a".into(), Some(&base.clone().method(Method::Put))));
        reserved(store.lookup_or_reserve(&"/a".into(), None));
        reserved(store.lookup_or_reserve(&"/b".into(), Some(&base)));
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn remove_is_by_identity_and_idempotent() {
        let store = CacheStore::new();
        let entry = reserved(store.lookup_or_reserve(&"/a".into(), None));
        let lookalike = Arc::new(CacheEntry::new("/a".into(), None));

        assert!(!store.remove(&lookalike));
        assert_eq!(store.len(), 1);
        assert!(store.remove(&entry));
        assert!(!store.remove(&entry));
        assert!(store.is_empty());
    }

    #[test]
    fn removal_makes_next_lookup_a_miss() {
        let store = CacheStore::new();
        let old = reserved(store.lookup_or_reserve(&"/a".into(), None));
        store.remove(&old);
        let fresh = reserved(store.lookup_or_reserve(&"/a".into(), None));
        assert!(!Arc::ptr_eq(&old, &fresh));
    }

    #[test]
    fn find_does_not_reserve() {
        let store = CacheStore::new();
        assert!(store.find(&"/a".into(), None).is_none());
        assert!(store.is_empty());
    }
}
