#[cfg(test)]
mod count_tests {
  use super::*;
  use crate::manager::{Manager, ManagerConfig};
  use crate::order::Variable;
  use crate::values::BitsetValues;

  fn mgr() -> Manager<BitsetValues> { Manager::new(ManagerConfig::default()) }

  #[test]
  fn zero_and_one_terminals() {
    let m = mgr();
    assert_eq!(count_paths(&m.zero()), 0);
    assert_eq!(count_paths(&m.one()), 1);
  }

  #[test]
  fn flat_node_counts_arc_sizes() {
    let m = mgr();
    let v = Variable::default();
    let s = Sdd::flat(&m, v, vec![(BitsetValues::from_bits(0b101), m.one())]);
    assert_eq!(count_paths(&s), 2);
  }

  #[test]
  fn shared_subgraph_is_memoized_not_double_counted() {
    let m = mgr();
    let v = Variable::default();
    let leaf = Sdd::flat(&m, v, vec![(BitsetValues::singleton(0), m.one())]);
    // Two arcs at a higher level fan into the same canonical successor;
    // count_paths must still add each arc's own contribution once.
    let top = Sdd::flat(&m, v, vec![
      (BitsetValues::singleton(1), leaf.clone()),
      (BitsetValues::singleton(2), leaf.clone()),
    ]);
    assert_eq!(count_paths(&top), 2);
  }

  #[test]
  fn paths_enumerates_every_tuple() {
    let m = mgr();
    let v = Variable::default();
    let s = Sdd::flat(&m, v, vec![(BitsetValues::from_bits(0b011), m.one())]);
    let all: Vec<_> = paths(&s).collect();
    assert_eq!(all.len(), 2);
    assert!(all.contains(&vec![PathValue::Flat(0u32)]));
    assert!(all.contains(&vec![PathValue::Flat(1u32)]));
  }

  #[test]
  fn paths_count_matches_count_paths() {
    let m = mgr();
    let v = Variable::default();
    let leaf = Sdd::flat(&m, v, vec![(BitsetValues::singleton(0), m.one())]);
    let top = Sdd::flat(&m, v, vec![
      (BitsetValues::singleton(1), leaf.clone()),
      (BitsetValues::singleton(2), leaf.clone()),
    ]);
    assert_eq!(paths(&top).count() as u128, count_paths(&top));
  }
}
