//! Process-wide (thread-local) lifecycle owner of the unique tables and
//! operation caches. See spec §5 ("Shared resources") and §6 (config keys),
//! and SPEC_FULL.md §5.1 for the lifecycle rendering chosen here.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::cache::OpCache;
use crate::error::ConfigError;
use crate::sdd::{Node, Sdd};
use crate::unique::UniqueTable;
use crate::values::ValuesSet;

/// Recognized configuration knobs (spec §6), with their documented
/// defaults. Unlike the original's global `conf` singleton, every knob here
/// is a plain field threaded through `Manager::init`/`Manager::with_config`
/// -- no ambient mutable state beyond the `Manager` itself.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
  pub sdd_unique_table_size: usize,
  pub sdd_difference_cache_size: usize,
  pub sdd_intersection_cache_size: usize,
  pub sdd_sum_cache_size: usize,
  pub sdd_arena_size: usize,
  pub hom_unique_table_size: usize,
  pub hom_cache_size: usize,
  pub flat_set_unique_table_size: usize,
  /// Resolves spec.md's Open Question on flat-set uniquing (SPEC_FULL.md
  /// §3.2): whether `FlatSetValues` construction goes through the
  /// thread-local interning table or allocates a private `Rc`.
  pub unify_flat_sets: bool,
}

impl Default for ManagerConfig {
  fn default() -> Self {
    ManagerConfig {
      sdd_unique_table_size: 10_000_000,
      sdd_difference_cache_size: 500_000,
      sdd_intersection_cache_size: 500_000,
      sdd_sum_cache_size: 1_000_000,
      sdd_arena_size: 16 * 1024 * 1024,
      hom_unique_table_size: 1_000_000,
      hom_cache_size: 1_000_000,
      flat_set_unique_table_size: 5_000,
      unify_flat_sets: true,
    }
  }
}

impl ManagerConfig {
  /// Surfaced at init time per the error-policy table (spec §7,
  /// `ConfigError`): a manager with a zero-sized table or cache can never
  /// hold a single entry, so reject it rather than silently thrashing.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let fields: [(&str, usize); 7] = [
      ("sdd_unique_table_size", self.sdd_unique_table_size),
      ("sdd_difference_cache_size", self.sdd_difference_cache_size),
      ("sdd_intersection_cache_size", self.sdd_intersection_cache_size),
      ("sdd_sum_cache_size", self.sdd_sum_cache_size),
      ("hom_unique_table_size", self.hom_unique_table_size),
      ("hom_cache_size", self.hom_cache_size),
      ("flat_set_unique_table_size", self.flat_set_unique_table_size),
    ];
    for (name, value) in fields {
      if value == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be > 0")));
      }
    }
    Ok(())
  }
}

/// A small buffer-reuse pool: recently freed allocations of a given byte
/// size are kept around (up to `capacity` total buffers, evicted FIFO) so
/// the arena-heavy churn of node construction/teardown doesn't constantly
/// round-trip through the system allocator. See spec §4.1/§5.
#[derive(Default)]
pub(crate) struct Arena {
  pool: std::collections::HashMap<usize, Vec<Vec<u8>>>,
  count: usize,
  capacity: usize,
}

impl Arena {
  fn new(byte_budget: usize) -> Self {
    // A buffer is assumed to average ~64 bytes; this only bounds the pool,
    // it does not preallocate anything.
    Arena { pool: Default::default(), count: 0, capacity: (byte_budget / 64).max(1) }
  }

  pub fn recycle(&mut self, buf: Vec<u8>) {
    if self.count >= self.capacity {
      // Drop the oldest size bucket's oldest entry to make room, FIFO.
      if let Some((&size, _)) = self.pool.iter().next().map(|(k, v)| (k, v)) {
        if let Some(bucket) = self.pool.get_mut(&size) {
          if !bucket.is_empty() { bucket.remove(0); self.count -= 1; }
        }
      }
    }
    self.count += 1;
    self.pool.entry(buf.capacity()).or_default().push(buf);
  }

  pub fn allocate(&mut self, size: usize) -> Vec<u8> {
    if let Some(bucket) = self.pool.get_mut(&size) {
      if let Some(buf) = bucket.pop() {
        self.count -= 1;
        return buf;
      }
    }
    Vec::with_capacity(size)
  }
}

/// Process-wide (thread-local) owner of the unique table backing `Sdd<VS>`
/// and the three binary-operation caches. Homomorphisms and their cache
/// live in `crate::hom::HomManager` (keyed additionally by identifier type
/// `I`), obtained the same way.
pub struct Manager<VS: ValuesSet> {
  config: ManagerConfig,
  sdd_table: Rc<RefCell<UniqueTable<Node<VS>, Node<VS>>>>,
  zero: Sdd<VS>,
  one: Sdd<VS>,
  pub(crate) sum_cache: RefCell<OpCache<(Sdd<VS>, Sdd<VS>), Sdd<VS>>>,
  pub(crate) intersection_cache: RefCell<OpCache<(Sdd<VS>, Sdd<VS>), Sdd<VS>>>,
  pub(crate) difference_cache: RefCell<OpCache<(Sdd<VS>, Sdd<VS>), Sdd<VS>>>,
  pub(crate) arena: RefCell<Arena>,
}

impl<VS: ValuesSet + 'static> Manager<VS> {
  /// Construct a standalone `Manager`, bypassing the thread-local default
  /// entirely. Every core operation (`Sdd::flat`, `sdd_ops::union`, `eval`,
  /// ...) already takes its `&Manager<VS>` as an explicit parameter, so a
  /// caller holding one of these needs no further ceremony to use the
  /// explicit-context style called out in spec §9's two lifecycle options,
  /// alongside the thread-local singleton `Manager::current()` uses.
  pub fn new(config: ManagerConfig) -> Self {
    let sdd_table = Rc::new(RefCell::new(UniqueTable::with_capacity(config.sdd_unique_table_size.min(1 << 16))));
    Manager {
      sdd_table,
      sum_cache: RefCell::new(OpCache::with_capacity(config.sdd_sum_cache_size)),
      intersection_cache: RefCell::new(OpCache::with_capacity(config.sdd_intersection_cache_size)),
      difference_cache: RefCell::new(OpCache::with_capacity(config.sdd_difference_cache_size)),
      arena: RefCell::new(Arena::new(config.sdd_arena_size)),
      // Terminals are singletons, never entered in `sdd_table` (see
      // `resident_nodes`'s doc comment), so they carry no table backref --
      // their own `Drop` upgrade of an empty `Weak` is always a no-op.
      zero: Sdd::wrap(Rc::new(Node::Zero), Weak::new()),
      one: Sdd::wrap(Rc::new(Node::One), Weak::new()),
      config,
    }
  }

  pub fn config(&self) -> &ManagerConfig { &self.config }

  pub fn zero(&self) -> Sdd<VS> { self.zero.clone() }
  pub fn one(&self) -> Sdd<VS> { self.one.clone() }

  /// Every `Sdd` built here carries a weak back-reference to this exact
  /// `sdd_table`, captured at construction time, so its `Drop` impl removes
  /// the entry from the table that actually holds it -- not from whichever
  /// manager happens to be the thread-local "current" one when the handle is
  /// dropped. This is what makes `Manager::new`'s explicit-context style
  /// (alongside `Manager::current()`) safe to mix: an explicit `Manager`'s
  /// nodes tear down correctly even if a *different* manager is current at
  /// drop time.
  pub(crate) fn unify_node(&self, node: Node<VS>) -> Sdd<VS> {
    let rc = self.sdd_table.borrow_mut().unify(node, Rc::new);
    Sdd::wrap(rc, Rc::downgrade(&self.sdd_table))
  }

  /// Number of live (strongly-referenced) canonical SDD nodes. Used by
  /// `shutdown`'s invariant-8 assertion and exposed for diagnostics.
  pub fn resident_nodes(&self) -> usize { self.sdd_table.borrow().resident() }

  /// `(tests, hits)` per operation cache, for instrumentation (spec §8
  /// invariant 3). Order: sum, intersection, difference.
  pub fn cache_stats(&self) -> [(u64, u64); 3] {
    [
      self.sum_cache.borrow().stats(),
      self.intersection_cache.borrow().stats(),
      self.difference_cache.borrow().stats(),
    ]
  }

  fn clear_caches(&self) {
    self.sum_cache.borrow_mut().clear();
    self.intersection_cache.borrow_mut().clear();
    self.difference_cache.borrow_mut().clear();
  }

  fn thread_slot() -> &'static std::thread::LocalKey<RefCell<Option<Rc<Manager<VS>>>>> {
    thread_local! {
      static CURRENT: RefCell<Option<Rc<Manager<VS>>>> = const { RefCell::new(None) };
    }
    &CURRENT
  }

  /// Install a fresh manager as the thread-local default. Errors if one is
  /// already installed (spec §9: "creating two managers concurrently is
  /// undefined" -- on a single thread we reject it outright instead).
  pub fn init(config: ManagerConfig) -> Result<(), ConfigError> {
    config.validate()?;
    Self::thread_slot().with(|cell| {
      if cell.borrow().is_some() { return Err(ConfigError::AlreadyInitialized); }
      debug!("sdd: installing manager (sdd_unique_table_size={}, hom_unique_table_size={})",
        config.sdd_unique_table_size, config.hom_unique_table_size);
      *cell.borrow_mut() = Some(Rc::new(Manager::new(config)));
      Ok(())
    })
  }

  /// Install a manager if none is installed yet; otherwise a no-op. Lets
  /// library code that merely *uses* SDDs (tests, examples) get a working
  /// default without every call site calling `init` explicitly.
  pub fn ensure_default() {
    Self::thread_slot().with(|cell| {
      if cell.borrow().is_none() {
        *cell.borrow_mut() = Some(Rc::new(Manager::new(ManagerConfig::default())));
      }
    });
  }

  /// The current thread-local manager, installing a default one on first
  /// use (mirrors the teacher's `gbase_ref()` ergonomics in `int.rs`).
  pub fn current() -> Rc<Manager<VS>> {
    Self::ensure_default();
    Self::thread_slot().with(|cell| cell.borrow().clone().expect("Manager::ensure_default just ran"))
  }

  /// Tear down the thread-local manager. Clears every cache first (a cache
  /// holding a strong `Sdd` reference would otherwise keep nodes resident
  /// forever), then asserts invariant 8: no canonical node may still be
  /// live. Returns the manager to the slot (without clearing) on failure,
  /// so callers can drop their remaining handles and retry.
  pub fn shutdown() -> Result<(), ConfigError> {
    Self::thread_slot().with(|cell| {
      let Some(mgr) = cell.borrow_mut().take() else { return Ok(()) };
      mgr.clear_caches();
      let resident = mgr.resident_nodes();
      if resident > 0 {
        *cell.borrow_mut() = Some(mgr);
        return Err(ConfigError::ResidentNodesOnTeardown(resident));
      }
      Ok(())
    })
  }

}

include!("test-manager.rs");
