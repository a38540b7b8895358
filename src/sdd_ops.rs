//! Set-algebraic operations over SDDs: union, intersection, difference.
//! See spec §4.4. Each operation is memoized in its own cache on the
//! manager (`sum_cache`/`intersection_cache`/`difference_cache`), keyed by
//! the pointer-identity pair of operands.
use crate::error::SddError;
use crate::manager::Manager;
use crate::sdd::{Node, Sdd};
use crate::values::ValuesSet;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BinOp { Union, Intersection, Difference }

pub fn union<VS: ValuesSet + 'static>(mgr: &Manager<VS>, a: &Sdd<VS>, b: &Sdd<VS>) -> Result<Sdd<VS>, SddError> {
  combine(mgr, BinOp::Union, a, b)
}

pub fn intersection<VS: ValuesSet + 'static>(mgr: &Manager<VS>, a: &Sdd<VS>, b: &Sdd<VS>) -> Result<Sdd<VS>, SddError> {
  combine(mgr, BinOp::Intersection, a, b)
}

pub fn difference<VS: ValuesSet + 'static>(mgr: &Manager<VS>, a: &Sdd<VS>, b: &Sdd<VS>) -> Result<Sdd<VS>, SddError> {
  combine(mgr, BinOp::Difference, a, b)
}

fn cache_get<VS: ValuesSet + 'static>(mgr: &Manager<VS>, op: BinOp, a: &Sdd<VS>, b: &Sdd<VS>) -> Option<Sdd<VS>> {
  let key = (a.clone(), b.clone());
  match op {
    BinOp::Union => mgr.sum_cache.borrow_mut().get(&key),
    BinOp::Intersection => mgr.intersection_cache.borrow_mut().get(&key),
    BinOp::Difference => mgr.difference_cache.borrow_mut().get(&key),
  }
}

fn cache_put<VS: ValuesSet + 'static>(mgr: &Manager<VS>, op: BinOp, a: &Sdd<VS>, b: &Sdd<VS>, result: Sdd<VS>) {
  let key = (a.clone(), b.clone());
  match op {
    BinOp::Union => mgr.sum_cache.borrow_mut().insert(key, result),
    BinOp::Intersection => mgr.intersection_cache.borrow_mut().insert(key, result),
    BinOp::Difference => mgr.difference_cache.borrow_mut().insert(key, result),
  }
}

fn combine<VS: ValuesSet + 'static>(mgr: &Manager<VS>, op: BinOp, a: &Sdd<VS>, b: &Sdd<VS>) -> Result<Sdd<VS>, SddError> {
  // Zero is the identity/annihilator per op, handled before touching the cache.
  if a.is_zero() {
    return Ok(match op {
      BinOp::Union => b.clone(),
      BinOp::Intersection => mgr.zero(),
      BinOp::Difference => mgr.zero(),
    });
  }
  if b.is_zero() {
    return Ok(match op {
      BinOp::Union => a.clone(),
      BinOp::Intersection => mgr.zero(),
      BinOp::Difference => a.clone(),
    });
  }
  if a.is_one() && b.is_one() {
    return Ok(match op {
      BinOp::Union => mgr.one(),
      BinOp::Intersection => mgr.one(),
      BinOp::Difference => mgr.zero(),
    });
  }
  if a.is_one() != b.is_one() {
    warn!("sdd: Top -- combined a terminal One with a node (incompatible depths)");
    return Err(SddError::DepthMismatch);
  }

  if let Some(cached) = cache_get(mgr, op, a, b) {
    return Ok(cached);
  }

  let result = match (a.node(), b.node()) {
    (Node::Flat { variable: va, arcs: arcs_a }, Node::Flat { variable: vb, arcs: arcs_b }) => {
      if va != vb {
        warn!("sdd: Top -- flat nodes at the same depth branch on different variables");
        return Err(SddError::VariableMismatch { left: format!("{va:?}"), right: format!("{vb:?}") });
      }
      let merged = square_union_flat(mgr, op, arcs_a, arcs_b)?;
      Sdd::flat(mgr, *va, merged)
    }
    (Node::Hierarchical { variable: va, arcs: arcs_a }, Node::Hierarchical { variable: vb, arcs: arcs_b }) => {
      if va != vb {
        warn!("sdd: Top -- hierarchical nodes at the same depth branch on different variables");
        return Err(SddError::VariableMismatch { left: format!("{va:?}"), right: format!("{vb:?}") });
      }
      let merged = square_union_hier(mgr, op, arcs_a, arcs_b)?;
      Sdd::hierarchical(mgr, *va, merge_hier_by_successor(mgr, merged)?)
    }
    _ => {
      warn!("sdd: Top -- combined a flat node with a hierarchical node (shapes differ)");
      return Err(SddError::VariableMismatch { left: format!("{:?}", a), right: format!("{:?}", b) });
    }
  };

  cache_put(mgr, op, a, b, result.clone());
  Ok(result)
}

/// The "square union" merge for flat arcs (spec §4.4): pair every left arc
/// with every right arc whose valuation intersects, recursing on
/// successors; then append whatever valuation residue is left over on each
/// side. `Sdd::flat` itself performs the final same-successor merge and
/// drops zero/empty arcs, so this only needs to produce a (possibly
/// redundant) candidate arc list.
fn square_union_flat<VS: ValuesSet + 'static>(
  mgr: &Manager<VS>,
  op: BinOp,
  left: &[(VS, Sdd<VS>)],
  right: &[(VS, Sdd<VS>)],
) -> Result<Vec<(VS, Sdd<VS>)>, SddError> {
  let mut left_residue: Vec<VS> = left.iter().map(|(v, _)| v.clone()).collect();
  let mut right_residue: Vec<VS> = right.iter().map(|(v, _)| v.clone()).collect();
  let mut result = Vec::new();

  for (i, (lv, ls)) in left.iter().enumerate() {
    for (j, (rv, rs)) in right.iter().enumerate() {
      let overlap = lv.intersection(rv);
      if overlap.is_empty() { continue; }
      let succ = combine(mgr, op, ls, rs)?;
      if !succ.is_zero() {
        result.push((overlap.clone(), succ));
      }
      left_residue[i] = left_residue[i].difference(&overlap);
      right_residue[j] = right_residue[j].difference(&overlap);
    }
  }

  match op {
    BinOp::Union => {
      for (i, (_, ls)) in left.iter().enumerate() {
        if !left_residue[i].is_empty() { result.push((left_residue[i].clone(), ls.clone())); }
      }
      for (j, (_, rs)) in right.iter().enumerate() {
        if !right_residue[j].is_empty() { result.push((right_residue[j].clone(), rs.clone())); }
      }
    }
    BinOp::Difference => {
      for (i, (_, ls)) in left.iter().enumerate() {
        if !left_residue[i].is_empty() { result.push((left_residue[i].clone(), ls.clone())); }
      }
    }
    BinOp::Intersection => {}
  }
  Ok(result)
}

/// Same algorithm as [`square_union_flat`], but valuations are nested SDDs,
/// so "intersection"/"difference" of valuations are themselves recursive
/// calls into this module rather than `ValuesSet` methods (spec §4.4:
/// "Hierarchical nodes: same structure, with inner operations on nested
/// SDDs replacing value-set operations").
fn square_union_hier<VS: ValuesSet + 'static>(
  mgr: &Manager<VS>,
  op: BinOp,
  left: &[(Sdd<VS>, Sdd<VS>)],
  right: &[(Sdd<VS>, Sdd<VS>)],
) -> Result<Vec<(Sdd<VS>, Sdd<VS>)>, SddError> {
  let mut left_residue: Vec<Sdd<VS>> = left.iter().map(|(v, _)| v.clone()).collect();
  let mut right_residue: Vec<Sdd<VS>> = right.iter().map(|(v, _)| v.clone()).collect();
  let mut result = Vec::new();

  for (i, (lv, ls)) in left.iter().enumerate() {
    for (j, (rv, rs)) in right.iter().enumerate() {
      let overlap = intersection(mgr, lv, rv)?;
      if overlap.is_zero() { continue; }
      let succ = combine(mgr, op, ls, rs)?;
      if !succ.is_zero() {
        result.push((overlap.clone(), succ));
      }
      left_residue[i] = difference(mgr, &left_residue[i], &overlap)?;
      right_residue[j] = difference(mgr, &right_residue[j], &overlap)?;
    }
  }

  match op {
    BinOp::Union => {
      for (i, (_, ls)) in left.iter().enumerate() {
        if !left_residue[i].is_zero() { result.push((left_residue[i].clone(), ls.clone())); }
      }
      for (j, (_, rs)) in right.iter().enumerate() {
        if !right_residue[j].is_zero() { result.push((right_residue[j].clone(), rs.clone())); }
      }
    }
    BinOp::Difference => {
      for (i, (_, ls)) in left.iter().enumerate() {
        if !left_residue[i].is_zero() { result.push((left_residue[i].clone(), ls.clone())); }
      }
    }
    BinOp::Intersection => {}
  }
  Ok(result)
}

/// `Sdd::hierarchical` requires arcs to already have pairwise-distinct
/// successors (merging would itself require an SDD union of nested
/// valuations, which can fail); do that merge here, in the one place that
/// builds candidate hierarchical arc lists from a binary operation.
pub(crate) fn merge_hier_by_successor<VS: ValuesSet + 'static>(
  mgr: &Manager<VS>,
  arcs: Vec<(Sdd<VS>, Sdd<VS>)>,
) -> Result<Vec<(Sdd<VS>, Sdd<VS>)>, SddError> {
  let mut merged: Vec<(Sdd<VS>, Sdd<VS>)> = Vec::with_capacity(arcs.len());
  'arc: for (nested, succ) in arcs {
    for existing in merged.iter_mut() {
      if existing.1 == succ {
        existing.0 = union(mgr, &existing.0, &nested)?;
        continue 'arc;
      }
    }
    merged.push((nested, succ));
  }
  Ok(merged)
}

include!("test-sdd-ops.rs");
