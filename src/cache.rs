//! Memoization tables keyed by operand identity. See spec §3 ("Operation
//! cache") and §4.4/§4.6.
//!
//! A cache never stores a failed computation (§7): callers only insert once
//! an operation has actually produced a value. Capacity is bounded per
//! `ManagerConfig`'s `sdd_*_cache_size`/`hom_cache_size` knobs; once full,
//! the oldest entry is evicted to make room (FIFO), rather than growing
//! without bound. `Manager::shutdown` clears every cache outright, which is
//! what lets invariant 8 (residency reaches zero after teardown) hold even
//! though the cache itself holds strong references while live.
use std::collections::VecDeque;
use std::hash::Hash;

use fxhash::FxHashMap;

/// A bounded memoization table for a single operation (one `(operand...) ->
/// result` relation). Tracks hit/test counts so callers can expose cache
/// effectiveness the way the teacher's `wip::COUNT_CACHE_TESTS`/`_HITS`
/// thread-locals do for BDD `ite`.
pub(crate) struct OpCache<K, V> {
  map: FxHashMap<K, V>,
  order: VecDeque<K>,
  capacity: usize,
  tests: u64,
  hits: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> OpCache<K, V> {
  pub fn with_capacity(capacity: usize) -> Self {
    OpCache {
      map: FxHashMap::with_capacity_and_hasher(capacity.min(1024), Default::default()),
      order: VecDeque::new(),
      capacity: capacity.max(1),
      tests: 0,
      hits: 0,
    }
  }

  pub fn get(&mut self, key: &K) -> Option<V> {
    self.tests += 1;
    let hit = self.map.get(key).cloned();
    if hit.is_some() { self.hits += 1; }
    hit
  }

  pub fn insert(&mut self, key: K, value: V) {
    if !self.map.contains_key(&key) {
      if self.map.len() >= self.capacity {
        trace!("op cache: at capacity ({}), evicting oldest entry", self.capacity);
        if let Some(oldest) = self.order.pop_front() {
          self.map.remove(&oldest);
        }
      }
      self.order.push_back(key.clone());
    }
    self.map.insert(key, value);
  }

  pub fn clear(&mut self) {
    self.map.clear();
    self.order.clear();
  }

  pub fn len(&self) -> usize { self.map.len() }
  pub fn is_empty(&self) -> bool { self.map.is_empty() }

  /// `(tests, hits)`, for instrumentation (spec §8 invariant 3: a second
  /// call with the same operands must observably hit the cache).
  pub fn stats(&self) -> (u64, u64) { (self.tests, self.hits) }
}

include!("test-cache.rs");
