//! Generic weak-keyed interning table ("unique table"), shared by every
//! canonicalized handle type (SDD nodes, homomorphisms, unified flat sets).
//! See spec §3 and SPEC_FULL.md §3.1.
//!
//! The table never owns its entries: it stores [`Weak`] references and an
//! entry disappears on its own once the last strong [`Rc`] handle drops
//! (each canonicalized type's own `Drop` impl removes its table slot). This
//! mirrors the original's unique table / `ptr<Unique>` pair without needing
//! unsafe code: ownership lives entirely in `Rc`/`Weak`.
use std::hash::Hash;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;

/// Resize the backing map once it is this full, rather than waiting for the
/// std map's own (unspecified) growth policy -- keeps probe chains short
/// under the heavy churn of memoized SDD/Hom construction.
const LOAD_FACTOR: f64 = 0.9;

/// A weak-keyed interning table: maps a canonical key to the (possibly
/// already-dropped) node built for it.
pub struct UniqueTable<K, V> {
  map: FxHashMap<K, Weak<V>>,
}

impl<K: Eq + Hash + Clone, V> Default for UniqueTable<K, V> {
  fn default() -> Self { UniqueTable { map: FxHashMap::default() } }
}

impl<K: Eq + Hash + Clone, V> UniqueTable<K, V> {
  pub fn new() -> Self { Self::default() }

  pub fn with_capacity(cap: usize) -> Self {
    UniqueTable { map: FxHashMap::with_capacity_and_hasher(cap, Default::default()) }
  }

  /// Look up `key`; if a live entry exists, return it. Otherwise build a
  /// fresh value with `make`, install it, and return that.
  ///
  /// `make` receives the key by value since canonical keys are frequently
  /// reused as part of the constructed node itself (e.g. an SDD node's own
  /// key is its arc vector).
  pub fn unify(&mut self, key: K, make: impl FnOnce(K) -> Rc<V>) -> Rc<V> {
    if let Some(weak) = self.map.get(&key) {
      if let Some(strong) = weak.upgrade() {
        return strong;
      }
    }
    self.maybe_grow();
    let value = make(key.clone());
    self.map.insert(key, Rc::downgrade(&value));
    value
  }

  /// Remove the slot for `key`, if present. Called from a node's `Drop` impl
  /// once its last strong handle goes away. A no-op if the slot was already
  /// replaced by a newer value for the same key (the check guards against
  /// that race within a single thread: construction-during-drop).
  pub fn remove(&mut self, key: &K) {
    if let Some(weak) = self.map.get(key) {
      if weak.strong_count() == 0 {
        self.map.remove(key);
      }
    }
  }

  /// Number of entries whose value is still alive. O(n); intended for the
  /// manager's invariant-8 teardown assertion and for tests, not hot paths.
  pub fn resident(&self) -> usize {
    self.map.values().filter(|w| w.strong_count() > 0).count()
  }

  pub fn is_empty_resident(&self) -> bool { self.resident() == 0 }

  fn maybe_grow(&mut self) {
    let cap = self.map.capacity().max(1);
    if (self.map.len() as f64) / (cap as f64) >= LOAD_FACTOR {
      trace!("unique table: load factor reached, growing from {cap} buckets");
      self.map.reserve(cap);
    }
  }
}

include!("test-unique.rs");
