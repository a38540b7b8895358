//! End-to-end scenarios exercising the full stack the way a user of this
//! crate actually would: build an order, construct SDDs, drive them with
//! homomorphisms, and read the results back out through `count_paths`/`paths`.
use std::hash::Hasher;

use sdd::{
  count_paths, eval, paths, rewrite, sdd_ops, erased_eq, erased_hash,
  AsAny, BitsetValues, Hom, HomManager, Manager, Order, OrderBuilder,
  PathValue, PointFunction, Sdd, ValuesSet, Variable,
};

const POS: [&str; 5] = ["p0", "p1", "p2", "p3", "p4"];

fn positions_order(n: usize) -> Order<&'static str> {
  let mut b = OrderBuilder::new();
  for i in (0..n).rev() {
    b = b.push(POS[i]);
  }
  b.build().unwrap()
}

fn variables(order: &Order<&'static str>, n: usize) -> Vec<Variable> {
  let mut vars = Vec::with_capacity(n);
  let mut o = order.clone();
  for _ in 0..n {
    vars.push(o.variable());
    o = o.next();
  }
  vars
}

/// The single state in which every level holds `value`.
fn all_at(mgr: &Manager<BitsetValues>, vars: &[Variable], value: u32) -> Sdd<BitsetValues> {
  let mut s = mgr.one();
  for &v in vars.iter().rev() {
    s = Sdd::flat(mgr, v, vec![(BitsetValues::singleton(value), s)]);
  }
  s
}

fn letter(c: char) -> u32 {
  match c {
    'a' => 0, 'b' => 1, 'c' => 2, 'd' => 3, 'r' => 4, 't' => 5,
    _ => panic!("unmapped letter {c}"),
  }
}

fn word_sdd(mgr: &Manager<BitsetValues>, word: &str) -> Sdd<BitsetValues> {
  let chars: Vec<char> = word.chars().collect();
  build_word(mgr, positions_order(chars.len()), &chars, 0)
}

fn build_word(mgr: &Manager<BitsetValues>, order: Order<&'static str>, chars: &[char], i: usize) -> Sdd<BitsetValues> {
  if i == chars.len() {
    return mgr.one();
  }
  let rest = build_word(mgr, order.next(), chars, i + 1);
  Sdd::flat(mgr, order.variable(), vec![(BitsetValues::singleton(letter(chars[i])), rest)])
}

// --- Scenario 1: dictionary encoding -----------------------------------

#[test]
fn dictionary_encoding_via_union_and_count_paths() {
  let mgr = Manager::<BitsetValues>::current();
  let cat = word_sdd(&mgr, "cat");
  let car = word_sdd(&mgr, "car");
  let cab = word_sdd(&mgr, "cab");

  let dict = sdd_ops::union(&mgr, &cat, &car).unwrap();
  let dict = sdd_ops::union(&mgr, &dict, &cab).unwrap();
  assert_eq!(count_paths(&dict), 3);

  // Re-inserting a word already present is idempotent at the node level:
  // canonicalization means the union lands back on the very same pointer.
  let dict_again = sdd_ops::union(&mgr, &dict, &cat).unwrap();
  assert_eq!(dict_again, dict);
  assert_eq!(count_paths(&dict_again), 3);
}

// --- Scenario 2/3: Towers of Hanoi and saturation ----------------------

#[derive(Debug, Clone, PartialEq)]
struct MoveRing { from: u32, to: u32 }
impl PointFunction<BitsetValues> for MoveRing {
  fn apply(&self, values: &BitsetValues) -> BitsetValues {
    if values.contains(&self.from) { BitsetValues::singleton(self.to) } else { *values }
  }
  fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
  fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
}

#[derive(Debug, Clone, PartialEq)]
struct ExcludePoles { blocked: [u32; 2] }
impl PointFunction<BitsetValues> for ExcludePoles {
  fn apply(&self, values: &BitsetValues) -> BitsetValues {
    if values.contains(&self.blocked[0]) || values.contains(&self.blocked[1]) {
      BitsetValues::empty()
    } else {
      *values
    }
  }
  fn selector(&self) -> bool { true }
  fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
  fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
}

/// Move `ring` from `from` to `to`, guarded by every smaller ring being off
/// both poles -- the textbook Towers of Hanoi legal-move rule.
fn hanoi_event(ring: usize, from: u32, to: u32) -> Hom<BitsetValues, &'static str> {
  let mut h = Hom::function(POS[ring], MoveRing { from, to });
  for smaller in 0..ring {
    h = Hom::compose(Hom::function(POS[smaller], ExcludePoles { blocked: [from, to] }), h);
  }
  h
}

fn hanoi_events(rings: usize) -> Vec<Hom<BitsetValues, &'static str>> {
  let mut events = Vec::new();
  for ring in 0..rings {
    for from in 0..3u32 {
      for to in 0..3u32 {
        if from != to {
          events.push(hanoi_event(ring, from, to));
        }
      }
    }
  }
  events
}

#[test]
fn towers_of_hanoi_three_rings_reaches_every_configuration() {
  let mgr = Manager::<BitsetValues>::current();
  let hm = HomManager::<BitsetValues, &'static str>::current();
  let order = positions_order(3);
  let vars = variables(&order, 3);
  let start = all_at(&mgr, &vars, 0);

  let h = Hom::fixpoint(Hom::sum(hanoi_events(3)));
  let reached = eval(&h, &mgr, &hm, &order, &start).unwrap();

  // All 3^3 = 27 configurations are reachable under the standard rule.
  assert_eq!(count_paths(&reached), 27);
}

struct HanoiRun { count: u128, eval_cache_len: usize }

fn run_hanoi_fixpoint(rings: usize, apply_rewrite: bool) -> HanoiRun {
  std::thread::spawn(move || {
    let mgr = Manager::<BitsetValues>::current();
    let hm = HomManager::<BitsetValues, &'static str>::current();
    let order = positions_order(rings);
    let vars = variables(&order, rings);
    let start = all_at(&mgr, &vars, 0);

    let h = Hom::fixpoint(Hom::sum(hanoi_events(rings)));
    let h = if apply_rewrite { rewrite(&h, &order) } else { h };
    let reached = eval(&h, &mgr, &hm, &order, &start).unwrap();
    HanoiRun { count: count_paths(&reached), eval_cache_len: hm.eval_cache_len() }
  })
  .join()
  .unwrap()
}

#[test]
fn saturation_rewrite_matches_direct_fixpoint_with_no_more_caching() {
  let direct = run_hanoi_fixpoint(5, false);
  let rewritten = run_hanoi_fixpoint(5, true);

  assert_eq!(direct.count, 243); // 3^5
  assert_eq!(rewritten.count, direct.count);
  assert!(
    rewritten.eval_cache_len <= direct.eval_cache_len,
    "saturation ({}) should need no more memoized (Hom, Sdd) pairs than the unrewritten fixed point ({})",
    rewritten.eval_cache_len, direct.eval_cache_len,
  );
}

// --- Scenario 4: difference ---------------------------------------------

#[test]
fn difference_removes_the_shared_word() {
  let mgr = Manager::<BitsetValues>::current();
  let ab = word_sdd(&mgr, "ab");
  let ac = word_sdd(&mgr, "ac");
  let ad = word_sdd(&mgr, "ad");

  let a_set = sdd_ops::union(&mgr, &sdd_ops::union(&mgr, &ab, &ac).unwrap(), &ad).unwrap();
  let diff = sdd_ops::difference(&mgr, &a_set, &ab).unwrap();
  assert_eq!(count_paths(&diff), 2);

  let encoded: Vec<Vec<u32>> = paths(&diff)
    .map(|tuple| {
      tuple.into_iter().map(|v| match v {
        PathValue::Flat(x) => x,
        PathValue::Nested(_) => panic!("word encoding is flat-only"),
      }).collect()
    })
    .collect();
  assert!(encoded.contains(&vec![letter('a'), letter('c')]));
  assert!(encoded.contains(&vec![letter('a'), letter('d')]));
  assert!(!encoded.contains(&vec![letter('a'), letter('b')]));
}

// --- Scenario 5: intersecting selectors commutes with composing them ----

#[derive(Debug, Clone, PartialEq)]
struct KeepBelow(u32);
impl PointFunction<BitsetValues> for KeepBelow {
  fn apply(&self, values: &BitsetValues) -> BitsetValues {
    BitsetValues::from_bits(values.bits() & ((1u64 << self.0) - 1))
  }
  fn selector(&self) -> bool { true }
  fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
  fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
}

#[derive(Debug, Clone, PartialEq)]
struct KeepEvenBits;
impl PointFunction<BitsetValues> for KeepEvenBits {
  fn apply(&self, values: &BitsetValues) -> BitsetValues {
    BitsetValues::from_bits(values.bits() & 0b0101_0101)
  }
  fn selector(&self) -> bool { true }
  fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
  fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
}

#[test]
fn intersecting_selectors_commutes_with_composing_them() {
  let mgr = Manager::<BitsetValues>::current();
  let hm = HomManager::<BitsetValues, &'static str>::current();
  let order = positions_order(1);
  let s = Sdd::flat(&mgr, order.variable(), vec![(BitsetValues::from_bits(0b111), mgr.one())]);

  let keep_low = Hom::function(POS[0], KeepBelow(2));
  let keep_even = Hom::function(POS[0], KeepEvenBits);
  assert!(keep_low.selector());
  assert!(keep_even.selector());

  let via_intersection = eval(&Hom::intersection(vec![keep_low.clone(), keep_even.clone()]), &mgr, &hm, &order, &s).unwrap();
  let via_composition_1 = eval(&Hom::compose(keep_low.clone(), keep_even.clone()), &mgr, &hm, &order, &s).unwrap();
  let via_composition_2 = eval(&Hom::compose(keep_even, keep_low), &mgr, &hm, &order, &s).unwrap();

  assert_eq!(via_intersection, via_composition_1);
  assert_eq!(via_composition_1, via_composition_2);
}

// --- Scenario 6: scheduling with dependencies ---------------------------

#[derive(Debug, Clone, PartialEq)]
struct RequireScheduled(u32);
impl PointFunction<BitsetValues> for RequireScheduled {
  fn apply(&self, values: &BitsetValues) -> BitsetValues {
    if values.contains(&self.0) { *values } else { BitsetValues::empty() }
  }
  fn selector(&self) -> bool { true }
  fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
  fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
}

#[derive(Debug, Clone, PartialEq)]
struct ScheduleTask;
impl PointFunction<BitsetValues> for ScheduleTask {
  fn apply(&self, values: &BitsetValues) -> BitsetValues {
    if values.contains(&0) { BitsetValues::singleton(1) } else { *values }
  }
  fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
  fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
}

/// Schedule `task` (0 -> 1), guarded on `dependency` (if any) already being
/// scheduled.
fn schedule_event(task: usize, dependency: Option<usize>) -> Hom<BitsetValues, &'static str> {
  let mut h = Hom::function(POS[task], ScheduleTask);
  if let Some(dep) = dependency {
    h = Hom::compose(Hom::function(POS[dep], RequireScheduled(1)), h);
  }
  h
}

#[test]
fn scheduling_respects_dependencies_and_filtering_selects_the_final_state() {
  let mgr = Manager::<BitsetValues>::current();
  let hm = HomManager::<BitsetValues, &'static str>::current();
  let order = positions_order(3);
  let vars = variables(&order, 3);
  let start = all_at(&mgr, &vars, 0); // nothing scheduled yet

  // A chain: B depends on A, C depends on B.
  let events = vec![
    schedule_event(0, None),
    schedule_event(1, Some(0)),
    schedule_event(2, Some(1)),
  ];
  let h = Hom::fixpoint(Hom::sum(events));
  let reached = eval(&h, &mgr, &hm, &order, &start).unwrap();

  // Only the four dependency-respecting prefixes are reachable, not all
  // 2^3 = 8 assignments: {}, {A}, {A,B}, {A,B,C}.
  assert_eq!(count_paths(&reached), 4);

  let all_scheduled = eval(&Hom::function(POS[2], RequireScheduled(1)), &mgr, &hm, &order, &reached).unwrap();
  assert_eq!(count_paths(&all_scheduled), 1);
}
