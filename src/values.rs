//! Finite sets of values labelling flat arcs. See spec §3 ("Values set").
//!
//! Two concrete backends are provided, matching the original's
//! `sdd::values::bitset` and `sdd::values::flat_set`/`unique_flat_set`:
//! a fixed-width bitset for small dense integer domains, and a sorted,
//! deduplicated vector for arbitrary value types. Both are cheap to clone
//! (`Copy` for the bitset, `Rc`-backed for the flat set).
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::unique::UniqueTable;

/// Behavior every values-set backend must provide: union, intersection,
/// difference, size, membership, emptiness, equality and hashing.
pub trait ValuesSet: Clone + Eq + Hash + fmt::Debug {
  /// The element type this set ranges over.
  type Value;

  fn empty() -> Self;
  fn is_empty(&self) -> bool;
  fn size(&self) -> usize;
  fn contains(&self, v: &Self::Value) -> bool;
  fn union(&self, other: &Self) -> Self;
  fn intersection(&self, other: &Self) -> Self;
  fn difference(&self, other: &Self) -> Self;

  /// Concrete elements of the set, in a stable order. Used by the path
  /// enumerator (`crate::count::paths`) to expand a multi-valued arc into
  /// one tuple per element; not on the hot path of set algebra itself.
  fn elements(&self) -> Vec<Self::Value>;
}

/// A fixed-width bit vector of values, for small dense integer domains
/// (the arc label is a set of bit positions, e.g. "value is 0, 1, or 3").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitsetValues { bits: u64 }

impl BitsetValues {
  pub fn from_bits(bits: u64) -> Self { BitsetValues { bits } }
  pub fn singleton(v: u32) -> Self {
    assert!(v < 64, "BitsetValues only supports values in 0..64, got {v}");
    BitsetValues { bits: 1 << v }
  }
  pub fn bits(&self) -> u64 { self.bits }
}

impl fmt::Debug for BitsetValues {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{{")?;
    let mut first = true;
    for i in 0..64 {
      if self.bits & (1 << i) != 0 {
        if !first { write!(f, ",")?; }
        write!(f, "{i}")?;
        first = false;
      }
    }
    write!(f, "}}")
  }
}

impl ValuesSet for BitsetValues {
  type Value = u32;
  fn empty() -> Self { BitsetValues { bits: 0 } }
  fn is_empty(&self) -> bool { self.bits == 0 }
  fn size(&self) -> usize { self.bits.count_ones() as usize }
  fn contains(&self, v: &u32) -> bool { *v < 64 && (self.bits & (1 << v)) != 0 }
  fn union(&self, other: &Self) -> Self { BitsetValues { bits: self.bits | other.bits } }
  fn intersection(&self, other: &Self) -> Self { BitsetValues { bits: self.bits & other.bits } }
  fn difference(&self, other: &Self) -> Self { BitsetValues { bits: self.bits & !other.bits } }
  fn elements(&self) -> Vec<u32> { (0..64).filter(|i| self.bits & (1 << i) != 0).collect() }
}

/// Bound required of a flat-set element: orderable (so the set can be kept
/// sorted/deduplicated), hashable, cheaply cloneable.
pub trait FlatValue: Ord + Clone + Hash + fmt::Debug {}
impl<T: Ord + Clone + Hash + fmt::Debug> FlatValue for T {}

/// A sorted, deduplicated sequence of values. `Rc`-backed, so cloning is
/// O(1) regardless of whether the content came through the manager's
/// uniquing table (see [`crate::manager::ManagerConfig::unify_flat_sets`]);
/// uniquing only affects whether two equal sets end up pointer-identical,
/// never the (always content-based) equality or hash below.
#[derive(Clone)]
pub struct FlatSetValues<V: FlatValue>(Rc<Vec<V>>);

impl<V: FlatValue> FlatSetValues<V> {
  /// Construct directly from a sorted, deduplicated vector. Callers that
  /// want canonicalization should go through
  /// [`crate::manager::Manager::unify_flat_set`] instead.
  pub fn from_sorted_vec(v: Vec<V>) -> Self {
    debug_assert!(v.windows(2).all(|w| w[0] < w[1]), "FlatSetValues requires a sorted, deduplicated vector");
    FlatSetValues(Rc::new(v))
  }

  pub fn from_values(mut v: Vec<V>) -> Self {
    v.sort();
    v.dedup();
    FlatSetValues(Rc::new(v))
  }

  pub fn singleton(v: V) -> Self { FlatSetValues(Rc::new(vec![v])) }

  pub fn as_slice(&self) -> &[V] { &self.0 }

  pub fn rc(&self) -> &Rc<Vec<V>> { &self.0 }

  /// Build a set the same way [`FlatSetValues::from_values`] does, but
  /// intern the backing vector in a thread-local table first, so that
  /// repeated equal sets share one allocation (`ManagerConfig::unify_flat_sets`
  /// controls whether callers reach for this constructor or the plain one).
  ///
  /// The backing table is declared inside this generic function rather than
  /// at module scope: a `thread_local!` lexically nested in a generic
  /// function is monomorphized along with it, so each distinct `V` gets its
  /// own table for free.
  pub fn unify(values: Vec<V>) -> Self
  where
    V: 'static,
  {
    thread_local! {
      static TABLE: RefCell<UniqueTable<Vec<V>, Vec<V>>> = RefCell::new(UniqueTable::new());
    }
    let mut v = values;
    v.sort();
    v.dedup();
    TABLE.with(|table| FlatSetValues(table.borrow_mut().unify(v, Rc::new)))
  }
}

impl<V: FlatValue> PartialEq for FlatSetValues<V> {
  fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0 }
}
impl<V: FlatValue> Eq for FlatSetValues<V> {}

impl<V: FlatValue> Hash for FlatSetValues<V> {
  fn hash<H: Hasher>(&self, state: &mut H) { self.0.hash(state) }
}

impl<V: FlatValue> fmt::Debug for FlatSetValues<V> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:?}", self.0) }
}

impl<V: FlatValue> ValuesSet for FlatSetValues<V> {
  type Value = V;

  fn empty() -> Self { FlatSetValues(Rc::new(Vec::new())) }
  fn is_empty(&self) -> bool { self.0.is_empty() }
  fn size(&self) -> usize { self.0.len() }
  fn contains(&self, v: &V) -> bool { self.0.binary_search(v).is_ok() }

  fn union(&self, other: &Self) -> Self {
    let mut merged: Vec<V> = Vec::with_capacity(self.0.len() + other.0.len());
    let (mut i, mut j) = (0, 0);
    while i < self.0.len() && j < other.0.len() {
      match self.0[i].cmp(&other.0[j]) {
        std::cmp::Ordering::Less => { merged.push(self.0[i].clone()); i += 1; }
        std::cmp::Ordering::Greater => { merged.push(other.0[j].clone()); j += 1; }
        std::cmp::Ordering::Equal => { merged.push(self.0[i].clone()); i += 1; j += 1; }
      }
    }
    merged.extend_from_slice(&self.0[i..]);
    merged.extend_from_slice(&other.0[j..]);
    FlatSetValues::from_sorted_vec(merged)
  }

  fn intersection(&self, other: &Self) -> Self {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < self.0.len() && j < other.0.len() {
      match self.0[i].cmp(&other.0[j]) {
        std::cmp::Ordering::Less => i += 1,
        std::cmp::Ordering::Greater => j += 1,
        std::cmp::Ordering::Equal => { result.push(self.0[i].clone()); i += 1; j += 1; }
      }
    }
    FlatSetValues::from_sorted_vec(result)
  }

  fn difference(&self, other: &Self) -> Self {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < self.0.len() && j < other.0.len() {
      match self.0[i].cmp(&other.0[j]) {
        std::cmp::Ordering::Less => { result.push(self.0[i].clone()); i += 1; }
        std::cmp::Ordering::Greater => j += 1,
        std::cmp::Ordering::Equal => { i += 1; j += 1; }
      }
    }
    result.extend_from_slice(&self.0[i..]);
    FlatSetValues::from_sorted_vec(result)
  }

  fn elements(&self) -> Vec<V> { self.0.as_slice().to_vec() }
}

include!("test-values.rs");
