//! Path counting and the shared traversal ("visit") contract. See spec §6
//! ("DOT rendering traverses ... via the visit contract") and SPEC_FULL.md
//! §2.1, which recovers the upstream `paths`/`visit` pair from
//! `original_source/sdd/dd/{paths,visit}.hh`.
use fxhash::FxHashMap;

use crate::sdd::Sdd;
use crate::values::ValuesSet;

/// Unifies DOT rendering (out of scope) and path counting behind one
/// traversal shape: `(zero|one|flat|hierarchical)`. Node kinds are visited
/// through their public accessors on [`Sdd`] rather than exposing `Node`
/// itself, so an external DOT renderer can be written purely against this
/// trait without reaching into `crate::sdd` internals.
pub trait Visit<VS: ValuesSet> {
  type Output;
  fn zero(&mut self) -> Self::Output;
  fn one(&mut self) -> Self::Output;
  fn flat(&mut self, s: &Sdd<VS>, arcs: &[(VS, Sdd<VS>)]) -> Self::Output;
  fn hierarchical(&mut self, s: &Sdd<VS>, arcs: &[(Sdd<VS>, Sdd<VS>)]) -> Self::Output;
}

/// Dispatch `s` to the matching method of `visitor`. The one non-obvious
/// case the original flags as `assert(false)`/unreachable -- visiting `Zero`
/// anywhere but at the very top of a walk -- can't happen here either:
/// reducedness (spec invariant 2) guarantees no arc's successor is `Zero`,
/// so a recursive walk started from a non-`Zero` root never descends into one.
pub fn visit<VS: ValuesSet, V: Visit<VS>>(visitor: &mut V, s: &Sdd<VS>) -> V::Output {
  if s.is_zero() { return visitor.zero(); }
  if s.is_one() { return visitor.one(); }
  if let Some(arcs) = s.flat_arcs() { return visitor.flat(s, arcs); }
  if let Some(arcs) = s.hierarchical_arcs() { return visitor.hierarchical(s, arcs); }
  unreachable!("Sdd is none of Zero/One/Flat/Hierarchical")
}

/// Count the number of tuples (paths from the root to `One`) encoded by `s`.
/// `count_paths(Zero) = 0`, `count_paths(One) = 1` (spec §8 invariant 4).
///
/// Memoized per node address, exactly like the original's
/// `count_paths_visitor` (`sdd/dd/paths.hh`): because nodes are unified, two
/// calls that reach the same node only do the multiplication once. The
/// original widens to an arbitrary-precision integer (`cpp_int`); this
/// implementation uses `u128` instead, since no bignum crate is otherwise
/// pulled into this stack -- see DESIGN.md for the tradeoff. `u128` is
/// sufficient for every scenario in spec §8 and for state spaces many orders
/// of magnitude past what a saturation-driven exploration would materialize
/// before running out of memory first.
pub fn count_paths<VS: ValuesSet + 'static>(s: &Sdd<VS>) -> u128 {
  if s.is_zero() { return 0; }
  let mut cache = FxHashMap::default();
  count_paths_rec(s, &mut cache)
}

fn count_paths_rec<VS: ValuesSet>(s: &Sdd<VS>, cache: &mut FxHashMap<usize, u128>) -> u128 {
  if s.is_one() { return 1; }
  let key = s.ptr_key();
  if let Some(&cached) = cache.get(&key) { return cached; }

  let total = if let Some(arcs) = s.flat_arcs() {
    arcs.iter().fold(0u128, |acc, (vals, succ)| {
      acc + (vals.size() as u128) * count_paths_rec(succ, cache)
    })
  } else if let Some(arcs) = s.hierarchical_arcs() {
    arcs.iter().fold(0u128, |acc, (nested, succ)| {
      acc + count_paths_rec(nested, cache) * count_paths_rec(succ, cache)
    })
  } else {
    unreachable!("count_paths: encountered Zero below the root, which reducedness precludes")
  };

  cache.insert(key, total);
  total
}

/// One component of an enumerated tuple: either a leaf value from a flat
/// level, or a fully-expanded sub-tuple from a hierarchical level's nested
/// SDD.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathValue<V> {
  Flat(V),
  Nested(Vec<PathValue<V>>),
}

/// Enumerate every tuple `s` encodes, one `Vec<PathValue<_>>` per path from
/// the root to `One`. This is the general form of [`count_paths`] the
/// upstream `paths.hh` comment alludes to (SPEC_FULL.md §2.1): rather than a
/// stackful coroutine, each level's expansion is built from the standard
/// `Iterator::flat_map` chain, so laziness comes from the combinators
/// themselves (a path further down the chain is only materialized once
/// something actually pulls it) instead of a hand-rolled state machine.
pub fn paths<VS>(s: &Sdd<VS>) -> Box<dyn Iterator<Item = Vec<PathValue<VS::Value>>>>
where
  VS: ValuesSet + 'static,
  VS::Value: Clone + 'static,
{
  if s.is_zero() {
    return Box::new(std::iter::empty());
  }
  if s.is_one() {
    return Box::new(std::iter::once(Vec::new()));
  }
  if let Some(arcs) = s.flat_arcs() {
    let arcs: Vec<_> = arcs.to_vec();
    return Box::new(arcs.into_iter().flat_map(|(vals, succ)| {
      let succ_paths: Vec<Vec<PathValue<VS::Value>>> = paths(&succ).collect();
      let elements = vals.elements();
      elements.into_iter().flat_map(move |v| {
        succ_paths.clone().into_iter().map(move |mut rest| {
          rest.insert(0, PathValue::Flat(v.clone()));
          rest
        })
      }).collect::<Vec<_>>().into_iter()
    }));
  }
  if let Some(arcs) = s.hierarchical_arcs() {
    let arcs: Vec<_> = arcs.to_vec();
    return Box::new(arcs.into_iter().flat_map(|(nested, succ)| {
      let nested_paths: Vec<Vec<PathValue<VS::Value>>> = paths(&nested).collect();
      let succ_paths: Vec<Vec<PathValue<VS::Value>>> = paths(&succ).collect();
      nested_paths.into_iter().flat_map(move |np| {
        succ_paths.clone().into_iter().map(move |mut rest| {
          rest.insert(0, PathValue::Nested(np.clone()));
          rest
        })
      }).collect::<Vec<_>>()
    }));
  }
  unreachable!("paths(): sdd is none of Zero/One/Flat/Hierarchical")
}

include!("test-count.rs");
