#[cfg(test)]
mod sdd_ops_tests {
  use super::*;
  use crate::manager::{Manager, ManagerConfig};
  use crate::order::Variable;
  use crate::values::BitsetValues;

  fn mgr() -> Manager<BitsetValues> { Manager::new(ManagerConfig::default()) }

  fn var(n: u32) -> Variable {
    // Variable's only public constructor path is via Order; for unit tests
    // against raw Sdd nodes we rely on Default + repeated `next_variable`-
    // free construction being unnecessary, since equality only needs two
    // nodes to agree on the *same* variable value, not a specific one.
    let _ = n;
    Variable::default()
  }

  #[test]
  fn union_with_zero_is_identity() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::singleton(0), m.one())]);
    assert_eq!(union(&m, &a, &m.zero()).unwrap(), a);
    assert_eq!(union(&m, &m.zero(), &a).unwrap(), a);
  }

  #[test]
  fn set_laws_self_union_intersection_difference() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::singleton(0), m.one())]);
    assert_eq!(union(&m, &a, &a).unwrap(), a);
    assert_eq!(intersection(&m, &a, &a).unwrap(), a);
    assert!(difference(&m, &a, &a).unwrap().is_zero());
  }

  #[test]
  fn union_merges_overlapping_and_disjoint_valuations() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::from_bits(0b011), m.one())]);
    let b = Sdd::flat(&m, var(0), vec![(BitsetValues::from_bits(0b110), m.one())]);
    let u = union(&m, &a, &b).unwrap();
    let arcs = u.flat_arcs().unwrap();
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].0.bits(), 0b111);
  }

  #[test]
  fn intersection_keeps_only_the_overlap() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::from_bits(0b011), m.one())]);
    let b = Sdd::flat(&m, var(0), vec![(BitsetValues::from_bits(0b110), m.one())]);
    let i = intersection(&m, &a, &b).unwrap();
    let arcs = i.flat_arcs().unwrap();
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].0.bits(), 0b010);
  }

  #[test]
  fn difference_removes_the_overlap() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::from_bits(0b011), m.one())]);
    let b = Sdd::flat(&m, var(0), vec![(BitsetValues::from_bits(0b110), m.one())]);
    let d = difference(&m, &a, &b).unwrap();
    let arcs = d.flat_arcs().unwrap();
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].0.bits(), 0b001);
  }

  #[test]
  fn mismatched_terminal_and_node_is_top() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::singleton(0), m.one())]);
    assert!(union(&m, &a, &m.one()).is_err());
  }

  #[test]
  fn hierarchical_union_merges_nested_valuations_sharing_a_successor() {
    let m = mgr();
    let inner = var(1);
    let outer = var(0);
    let n0 = Sdd::flat(&m, inner, vec![(BitsetValues::singleton(0), m.one())]);
    let n1 = Sdd::flat(&m, inner, vec![(BitsetValues::singleton(1), m.one())]);
    let a = Sdd::hierarchical(&m, outer, vec![(n0.clone(), m.one())]);
    let b = Sdd::hierarchical(&m, outer, vec![(n1.clone(), m.one())]);
    let u = union(&m, &a, &b).unwrap();
    let arcs = u.hierarchical_arcs().unwrap();
    // Both arcs lead to `One`, so the binary-op merge unions their nested
    // valuations into a single arc rather than keeping two.
    assert_eq!(arcs.len(), 1);
    let nested_arcs = arcs[0].0.flat_arcs().unwrap();
    assert_eq!(nested_arcs[0].0.bits(), 0b11);
  }

  #[test]
  fn hierarchical_intersection_of_disjoint_nested_valuations_is_zero() {
    let m = mgr();
    let inner = var(1);
    let outer = var(0);
    let n0 = Sdd::flat(&m, inner, vec![(BitsetValues::singleton(0), m.one())]);
    let n1 = Sdd::flat(&m, inner, vec![(BitsetValues::singleton(1), m.one())]);
    let a = Sdd::hierarchical(&m, outer, vec![(n0, m.one())]);
    let b = Sdd::hierarchical(&m, outer, vec![(n1, m.one())]);
    assert!(intersection(&m, &a, &b).unwrap().is_zero());
  }

  #[test]
  fn repeated_operation_hits_the_cache() {
    let m = mgr();
    let a = Sdd::flat(&m, var(0), vec![(BitsetValues::singleton(0), m.one())]);
    let b = Sdd::flat(&m, var(0), vec![(BitsetValues::singleton(1), m.one())]);
    let _ = union(&m, &a, &b).unwrap();
    let before = m.sum_cache.borrow().stats();
    let _ = union(&m, &a, &b).unwrap();
    let after = m.sum_cache.borrow().stats();
    assert!(after.1 > before.1, "second identical union must hit the cache");
  }
}
