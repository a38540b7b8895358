//! The saturation rewriter. See spec §4.8: recognizes `Fixpoint(Sum(H))`
//! and rewrites it into a level-local `SaturationSum`, so that most of the
//! fixed-point iteration happens at the deepest (smallest) levels first --
//! this is the optimization that makes large state-space explorations
//! (e.g. Towers of Hanoi at scale) tractable.
use crate::hom::{Hom, HomNode};
use crate::order::{Identifier, Order};
use crate::values::ValuesSet;

/// Rewrite `h` for saturation at the current `order` level. A no-op
/// (returns `h` unchanged) unless `h` is exactly `Fixpoint(Sum(members))`
/// and `order` is non-empty -- every other shape is left untouched, since
/// saturation is only ever applied at the root of a fixed point.
pub fn rewrite<VS, I>(h: &Hom<VS, I>, order: &Order<I>) -> Hom<VS, I>
where
  VS: ValuesSet + 'static,
  I: Identifier + 'static,
{
  if order.is_empty() {
    return h.clone();
  }
  let HomNode::Fixpoint(inner) = h.node() else { return h.clone() };
  let HomNode::Sum(members) = inner.node() else { return h.clone() };

  let v = order.variable();
  let mut f = Vec::new();
  let mut g = Vec::new();
  let mut l = Vec::new();
  let mut has_id = false;

  for m in members {
    if m.is_id() {
      has_id = true;
      continue;
    }
    if let HomNode::Local { variable, inner } = m.node() {
      if *variable == v {
        l.push(inner.clone());
        continue;
      }
    }
    if m.skip(order) {
      f.push(m.clone());
    } else {
      g.push(m.clone());
    }
  }

  // Nothing below this level to saturate and no hierarchy to descend into:
  // the plain fixed point is already as good as a saturated one here.
  if f.is_empty() && l.is_empty() {
    return h.clone();
  }

  let f_prime = if f.is_empty() && !has_id {
    None
  } else {
    if has_id {
      f.push(Hom::id());
    }
    Some(rewrite(&Hom::fixpoint(Hom::sum(f)), &order.next()))
  };

  let l_prime = if l.is_empty() {
    None
  } else {
    Some(Hom::local(v, rewrite(&Hom::fixpoint(Hom::sum(l)), &order.nested())))
  };

  debug!(
    "rewrite: saturating at {v:?} (f={}, g={}, l={})",
    f_prime.is_some(), g.len(), l_prime.is_some()
  );
  Hom::fixpoint(Hom::saturation_sum(v, f_prime, g, l_prime))
}

include!("test-rewrite.rs");
