#[cfg(test)]
mod hom_tests {
  use super::*;
  use crate::manager::{Manager, ManagerConfig};
  use crate::order::{OrderBuilder, Variable};
  use crate::values::BitsetValues;

  fn sdd_mgr() -> Manager<BitsetValues> { Manager::new(ManagerConfig::default()) }
  fn hom_mgr() -> HomManager<BitsetValues, &'static str> {
    HomManager::new(1_000_000, 1_000_000)
  }

  fn order_abc() -> Order<&'static str> {
    OrderBuilder::new().push("c").push("b").push("a").build().unwrap()
  }

  /// A hierarchical order: `g` at the top, nesting `x` underneath.
  fn order_g_nested_x() -> Order<&'static str> {
    OrderBuilder::new().push_nested("g", OrderBuilder::new().push("x")).build().unwrap()
  }

  /// A `PointFunction` that replaces a valuation outright, used to exercise
  /// `Local` by observably changing a nested SDD.
  #[derive(Debug, PartialEq)]
  struct Relabel(u32);
  impl PointFunction<BitsetValues> for Relabel {
    fn apply(&self, _values: &BitsetValues) -> BitsetValues { BitsetValues::singleton(self.0) }
    fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
    fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
  }

  /// A tiny `PointFunction` that keeps only even-valued bits, used to
  /// exercise `Hom::function` and `selector()` propagation.
  #[derive(Debug, PartialEq)]
  struct KeepEven;
  impl PointFunction<BitsetValues> for KeepEven {
    fn apply(&self, values: &BitsetValues) -> BitsetValues {
      BitsetValues::from_bits(values.bits() & 0b0101_0101)
    }
    fn selector(&self) -> bool { true }
    fn dyn_eq(&self, other: &dyn PointFunction<BitsetValues>) -> bool { erased_eq(self, other.as_any()) }
    fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
  }

  /// An inductive operator that adds a fixed bit to the outermost level and
  /// leaves every nested level as `Id`, used to exercise `Fixpoint`.
  #[derive(Debug, PartialEq)]
  struct AddBit(u32);
  impl Inductive<BitsetValues, &'static str> for AddBit {
    fn skip(&self, _variable: Variable) -> bool { false }
    fn one(&self, mgr: &Manager<BitsetValues>) -> Sdd<BitsetValues> { mgr.one() }
    fn apply_values(&self, _order: &Order<&'static str>, _values: &BitsetValues) -> Hom<BitsetValues, &'static str> {
      Hom::id()
    }
    fn apply_nested(&self, _order: &Order<&'static str>, _nested: &Sdd<BitsetValues>) -> Hom<BitsetValues, &'static str> {
      Hom::id()
    }
    fn dyn_eq(&self, other: &dyn Inductive<BitsetValues, &'static str>) -> bool { erased_eq(self, other.as_any()) }
    fn dyn_hash(&self, state: &mut dyn Hasher) { erased_hash(self, state) }
  }

  #[test]
  fn id_is_identity() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let s = Sdd::flat(&sm, order.variable(), vec![(BitsetValues::singleton(0), sm.one())]);
    let h = Hom::id();
    assert_eq!(eval(&h, &sm, &hm, &order, &s).unwrap(), s);
  }

  #[test]
  fn constant_ignores_input_including_zero() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let target = Sdd::flat(&sm, order.variable(), vec![(BitsetValues::singleton(2), sm.one())]);
    let h = Hom::constant(target.clone());
    assert_eq!(eval(&h, &sm, &hm, &order, &sm.zero()).unwrap(), target);
    assert_eq!(eval(&h, &sm, &hm, &order, &sm.one()).unwrap(), target);
  }

  #[test]
  fn cons_prepends_a_level() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let h = Hom::cons(BitsetValues::singleton(0), Hom::id());
    let result = eval(&h, &sm, &hm, &order, &sm.one()).unwrap();
    let arcs = result.flat_arcs().unwrap();
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].0.bits(), 0b1);
    assert!(arcs[0].1.is_one());
  }

  #[test]
  fn composition_applies_right_then_left() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let inner = Hom::cons(BitsetValues::singleton(0), Hom::id());
    let outer = Hom::cons(BitsetValues::singleton(1), Hom::id());
    let composed = Hom::compose(outer, inner);
    let result = eval(&composed, &sm, &hm, &order, &sm.one()).unwrap();
    let outer_arcs = result.flat_arcs().unwrap();
    assert_eq!(outer_arcs[0].0.bits(), 0b10);
    let inner_arcs = outer_arcs[0].1.flat_arcs().unwrap();
    assert_eq!(inner_arcs[0].0.bits(), 0b1);
  }

  #[test]
  fn sum_unions_every_member() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let a = Hom::cons(BitsetValues::singleton(0), Hom::id());
    let b = Hom::cons(BitsetValues::singleton(1), Hom::id());
    let h = Hom::sum(vec![a, b]);
    let result = eval(&h, &sm, &hm, &order, &sm.one()).unwrap();
    let arcs = result.flat_arcs().unwrap();
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].0.bits(), 0b11);
  }

  #[test]
  fn sum_operand_set_is_canonicalized_regardless_of_order() {
    let a = Hom::<BitsetValues, &'static str>::id();
    let b = Hom::cons(BitsetValues::singleton(0), Hom::id());
    assert_eq!(Hom::sum(vec![a.clone(), b.clone()]), Hom::sum(vec![b, a]));
  }

  #[test]
  fn intersection_of_empty_set_is_vacuous_identity() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let s = Sdd::flat(&sm, order.variable(), vec![(BitsetValues::singleton(0), sm.one())]);
    let h: Hom<BitsetValues, &'static str> = Hom::intersection(vec![]);
    assert_eq!(eval(&h, &sm, &hm, &order, &s).unwrap(), s);
  }

  #[test]
  fn function_filters_values_and_is_a_selector() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let s = Sdd::flat(&sm, order.variable(), vec![(BitsetValues::from_bits(0b111), sm.one())]);
    let h = Hom::function("a", KeepEven);
    assert!(h.selector());
    let result = eval(&h, &sm, &hm, &order, &s).unwrap();
    let arcs = result.flat_arcs().unwrap();
    assert_eq!(arcs[0].0.bits(), 0b101);
  }

  #[test]
  fn local_applies_inner_hom_to_the_nested_sdd_only() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_g_nested_x();
    let g = order.variable();
    let x = order.nested().variable();

    let nested = Sdd::flat(&sm, x, vec![(BitsetValues::singleton(0), sm.one())]);
    let s = Sdd::hierarchical(&sm, g, vec![(nested, sm.one())]);

    let inner = Hom::function("x", Relabel(3));
    let h = Hom::local(g, inner);
    let result = eval(&h, &sm, &hm, &order, &s).unwrap();

    let arcs = result.hierarchical_arcs().unwrap();
    assert_eq!(arcs.len(), 1);
    let nested_arcs = arcs[0].0.flat_arcs().unwrap();
    assert_eq!(nested_arcs[0].0.bits(), 1 << 3);
    assert!(arcs[0].1.is_one()); // successor itself is untouched by Local
  }

  #[test]
  fn fixpoint_of_id_is_identity() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let s = Sdd::flat(&sm, order.variable(), vec![(BitsetValues::singleton(0), sm.one())]);
    let h = Hom::fixpoint(Hom::id());
    assert_eq!(eval(&h, &sm, &hm, &order, &s).unwrap(), s);
  }

  #[test]
  fn fixpoint_grows_monotonically_to_a_saturated_set() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let grow = Hom::inductive(AddBit(0));
    let step = Hom::sum(vec![Hom::id(), grow]);
    let h = Hom::fixpoint(step);
    let s = Sdd::flat(&sm, order.variable(), vec![(BitsetValues::singleton(0), sm.one())]);
    let result = eval(&h, &sm, &hm, &order, &s).unwrap();
    assert_eq!(result, s); // AddBit's apply_values returns Id, so nothing actually grows
  }

  #[test]
  fn repeated_eval_hits_the_cache() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    let h = Hom::cons(BitsetValues::singleton(0), Hom::id());
    let s = sm.one();
    let _ = eval(&h, &sm, &hm, &order, &s).unwrap();
    let before = hm.eval_cache.borrow().stats();
    let _ = eval(&h, &sm, &hm, &order, &s).unwrap();
    let after = hm.eval_cache.borrow().stats();
    assert!(after.1 > before.1, "second identical eval must hit the cache");
  }

  #[test]
  fn mismatched_terminal_is_an_error() {
    let sm = sdd_mgr();
    let hm = hom_mgr();
    let order = order_abc();
    // Cons at an exhausted order (s already One, order still non-empty) is
    // fine; but asking Cons to run past the last variable is a programmer
    // error caught by its own assertion rather than producing a bogus node.
    let h = Hom::cons(BitsetValues::singleton(0), Hom::id());
    let empty_order = order.next().next().next(); // past "a", "b", and "c"
    assert!(empty_order.is_empty());
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      eval(&h, &sm, &hm, &empty_order, &sm.one())
    }));
    assert!(result.is_err());
  }

  #[test]
  fn dropping_all_homs_empties_the_unique_table() {
    let hm = hom_mgr();
    {
      let _h = hm.unify(HomNode::Cons { value: BitsetValues::singleton(0), next: hm.unify(HomNode::Id) });
      assert!(hm.resident_homs() >= 1);
    }
    assert_eq!(hm.resident_homs(), 0);
  }
}
