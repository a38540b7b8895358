//! The SDD data structure itself: node kinds, canonical constructors, and
//! the handle type client code actually holds. See spec §3 ("SDD").
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::manager::Manager;
use crate::order::Variable;
use crate::unique::UniqueTable;
use crate::values::ValuesSet;

/// Weak back-reference to the `sdd_table` a node was unified into, carried
/// by every [`Sdd`] handle so `Drop` can deregister from the table that
/// actually owns the node instead of guessing at a thread-local "current"
/// manager (see `Manager::unify_node`'s doc comment). Terminals carry an
/// empty `Weak` since they are singletons never entered in the table.
type TableRef<VS> = Weak<RefCell<UniqueTable<Node<VS>, Node<VS>>>>;

/// The canonical representation of a node. Never constructed directly by
/// client code; go through [`Sdd::flat`] / [`Sdd::hierarchical`] / the
/// terminals on [`Manager`], which enforce reducedness and canonicalize
/// through the manager's unique table.
///
/// Arcs are `(valuation, successor)` pairs. A `Flat` node's valuation is a
/// set of leaf values; a `Hierarchical` node's valuation is itself a nested
/// `Sdd`. Constructors require arcs to already be reduced: no empty
/// valuation, no `Zero` successor, and (since valuations partition the
/// variable's domain) no two arcs sharing a successor -- callers that merge
/// overlapping alphas (the binary operations in [`crate::sdd_ops`]) must
/// union them before calling in.
#[derive(Clone)]
pub(crate) enum Node<VS: ValuesSet> {
  Zero,
  One,
  Flat { variable: Variable, arcs: Vec<(VS, Sdd<VS>)> },
  Hierarchical { variable: Variable, arcs: Vec<(Sdd<VS>, Sdd<VS>)> },
}

impl<VS: ValuesSet> PartialEq for Node<VS> {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Node::Zero, Node::Zero) | (Node::One, Node::One) => true,
      (Node::Flat { variable: v1, arcs: a1 }, Node::Flat { variable: v2, arcs: a2 }) => v1 == v2 && a1 == a2,
      (Node::Hierarchical { variable: v1, arcs: a1 }, Node::Hierarchical { variable: v2, arcs: a2 }) => v1 == v2 && a1 == a2,
      _ => false,
    }
  }
}
impl<VS: ValuesSet> Eq for Node<VS> {}

impl<VS: ValuesSet> Hash for Node<VS> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    match self {
      Node::Zero => 0u8.hash(state),
      Node::One => 1u8.hash(state),
      Node::Flat { variable, arcs } => { 2u8.hash(state); variable.hash(state); arcs.hash(state); }
      Node::Hierarchical { variable, arcs } => { 3u8.hash(state); variable.hash(state); arcs.hash(state); }
    }
  }
}

impl<VS: ValuesSet> Node<VS> {
  /// Tear down one level: hand back the `Rc`s this node was holding onto,
  /// without going through `Sdd::drop` for them. Used by the iterative
  /// teardown in [`Sdd::drop`] so a long chain of single-reference nodes
  /// unwinds with a worklist instead of the call stack.
  fn into_child_rcs(self) -> Vec<Rc<Node<VS>>> {
    match self {
      Node::Zero | Node::One => Vec::new(),
      Node::Flat { arcs, .. } => arcs.into_iter().map(|(_, succ)| succ.into_rc()).collect(),
      Node::Hierarchical { arcs, .. } => {
        let mut out = Vec::with_capacity(arcs.len() * 2);
        for (nested, succ) in arcs {
          out.push(nested.into_rc());
          out.push(succ.into_rc());
        }
        out
      }
    }
  }
}

/// A canonicalized, reference-counted handle to an SDD node. Two handles
/// compare equal (and hash identically) iff they point at the same node --
/// structural equality never needs to walk the diagram, because
/// construction always canonicalizes through the manager's unique table.
pub struct Sdd<VS: ValuesSet>(Option<Rc<Node<VS>>>, TableRef<VS>);

impl<VS: ValuesSet> Sdd<VS> {
  pub(crate) fn wrap(rc: Rc<Node<VS>>, table: TableRef<VS>) -> Self { Sdd(Some(rc), table) }

  fn rc(&self) -> &Rc<Node<VS>> {
    self.0.as_ref().expect("Sdd handle used after its Rc was taken for teardown")
  }

  /// Consume the handle and hand back its `Rc` without running this
  /// handle's own `Drop` logic on it (the `Drop` impl below sees an empty
  /// `Option` and does nothing once `self.0` has been taken).
  fn into_rc(mut self) -> Rc<Node<VS>> {
    self.0.take().expect("Sdd handle used after its Rc was taken for teardown")
  }

  pub(crate) fn node(&self) -> &Node<VS> { self.rc() }

  /// Stable identity key for this handle's underlying node, usable as a
  /// cache key by callers (e.g. `crate::count::count_paths`) that need to
  /// memoize over shared subgraphs without borrowing `VS` into their key type.
  pub(crate) fn ptr_key(&self) -> usize { Rc::as_ptr(self.rc()) as *const () as usize }

  pub fn is_zero(&self) -> bool { matches!(self.node(), Node::Zero) }
  pub fn is_one(&self) -> bool { matches!(self.node(), Node::One) }
  pub fn is_terminal(&self) -> bool { self.is_zero() || self.is_one() }

  /// The branching variable, or `None` for a terminal.
  pub fn variable(&self) -> Option<Variable> {
    match self.node() {
      Node::Zero | Node::One => None,
      Node::Flat { variable, .. } | Node::Hierarchical { variable, .. } => Some(*variable),
    }
  }

  pub fn flat_arcs(&self) -> Option<&[(VS, Sdd<VS>)]> {
    match self.node() { Node::Flat { arcs, .. } => Some(arcs), _ => None }
  }

  pub fn hierarchical_arcs(&self) -> Option<&[(Sdd<VS>, Sdd<VS>)]> {
    match self.node() { Node::Hierarchical { arcs, .. } => Some(arcs), _ => None }
  }

  /// Construct (or retrieve the existing canonical) flat node. Arcs with an
  /// empty valuation or a `Zero` successor are dropped; arcs sharing a
  /// successor are merged by unioning their valuations. A node with no arcs
  /// left after reduction collapses to `Zero`.
  ///
  /// Square union (spec §4.3) also merges arcs sharing the same *valuation*
  /// by unioning their successors, but doing so here would require a
  /// fallible SDD union (two successors can be of incompatible shape,
  /// yielding `Top`) inside what is otherwise an infallible constructor.
  /// Like [`Sdd::hierarchical`], this constructor instead requires callers
  /// to pre-merge any arcs that would share a valuation; the binary
  /// operations in [`crate::sdd_ops`] -- the only internal callers that
  /// build multi-arc nodes -- already produce arcs with pairwise distinct
  /// valuations; debug builds assert this.
  pub fn flat(mgr: &Manager<VS>, variable: Variable, arcs: Vec<(VS, Sdd<VS>)>) -> Sdd<VS> {
    let arcs = reduce_flat_arcs(arcs);
    debug_assert!(
      {
        let mut ok = true;
        for i in 0..arcs.len() {
          for j in (i + 1)..arcs.len() {
            if arcs[i].0 == arcs[j].0 { ok = false; }
          }
        }
        ok
      },
      "flat(): caller must merge arcs sharing a valuation before construction"
    );
    if arcs.is_empty() { return mgr.zero(); }
    mgr.unify_node(Node::Flat { variable, arcs })
  }

  /// Construct (or retrieve the existing canonical) hierarchical node.
  /// Arcs with a `Zero` nested valuation or `Zero` successor are dropped.
  /// Unlike the flat case, merging two arcs that share a successor would
  /// require unioning their nested valuations (itself a possibly-failing
  /// SDD operation), so callers (the binary operations in
  /// [`crate::sdd_ops`]) are required to hand in arcs whose successors are
  /// already pairwise distinct.
  pub fn hierarchical(mgr: &Manager<VS>, variable: Variable, arcs: Vec<(Sdd<VS>, Sdd<VS>)>) -> Sdd<VS> {
    let arcs: Vec<_> = arcs.into_iter().filter(|(nested, succ)| !nested.is_zero() && !succ.is_zero()).collect();
    debug_assert!(
      {
        let mut ok = true;
        for i in 0..arcs.len() {
          for j in (i + 1)..arcs.len() {
            if arcs[i].1 == arcs[j].1 { ok = false; }
          }
        }
        ok
      },
      "hierarchical(): caller must merge arcs sharing a successor before construction"
    );
    if arcs.is_empty() { return mgr.zero(); }
    mgr.unify_node(Node::Hierarchical { variable, arcs })
  }
}

fn reduce_flat_arcs<VS: ValuesSet>(arcs: Vec<(VS, Sdd<VS>)>) -> Vec<(VS, Sdd<VS>)> {
  let mut merged: Vec<(VS, Sdd<VS>)> = Vec::with_capacity(arcs.len());
  'arc: for (val, succ) in arcs {
    if val.is_empty() || succ.is_zero() { continue; }
    for existing in merged.iter_mut() {
      if existing.1 == succ {
        existing.0 = existing.0.union(&val);
        continue 'arc;
      }
    }
    merged.push((val, succ));
  }
  merged
}

impl<VS: ValuesSet> Clone for Sdd<VS> {
  fn clone(&self) -> Self { Sdd(Some(self.rc().clone()), self.1.clone()) }
}

impl<VS: ValuesSet> PartialEq for Sdd<VS> {
  fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(self.rc(), other.rc()) }
}
impl<VS: ValuesSet> Eq for Sdd<VS> {}

impl<VS: ValuesSet> Hash for Sdd<VS> {
  fn hash<H: Hasher>(&self, state: &mut H) { (Rc::as_ptr(self.rc()) as usize).hash(state) }
}

impl<VS: ValuesSet> fmt::Debug for Sdd<VS> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.node() {
      Node::Zero => write!(f, "0"),
      Node::One => write!(f, "1"),
      Node::Flat { variable, arcs } => write!(f, "Flat({variable:?}, {} arc(s))", arcs.len()),
      Node::Hierarchical { variable, arcs } => write!(f, "Hierarchical({variable:?}, {} arc(s))", arcs.len()),
    }
  }
}

/// Drops a chain of single-reference nodes iteratively instead of letting
/// the compiler-generated recursive field drop walk the whole chain on the
/// call stack (spec requires teardown to be stack-depth independent).
impl<VS: ValuesSet> Drop for Sdd<VS> {
  fn drop(&mut self) {
    let Some(rc) = self.0.take() else { return };
    let table = std::mem::replace(&mut self.1, Weak::new());
    if Rc::strong_count(&rc) != 1 { return; }
    deregister(&table, &rc);
    let mut worklist = match Rc::try_unwrap(rc) {
      Ok(node) => vec![node],
      Err(_) => return,
    };
    while let Some(node) = worklist.pop() {
      for child_rc in node.into_child_rcs() {
        if Rc::strong_count(&child_rc) == 1 {
          deregister(&table, &child_rc);
          if let Ok(child_node) = Rc::try_unwrap(child_rc) {
            worklist.push(child_node);
          }
        }
      }
    }
  }
}

/// Every descendant torn down in the same cascade belongs to the same
/// manager as the node that started it (mixing managers within one SDD is
/// not a supported configuration), so the top node's table reference is
/// reused for the whole worklist rather than threading a `TableRef` through
/// `Node::into_child_rcs`'s plain `Rc<Node<VS>>` results.
fn deregister<VS: ValuesSet>(table: &TableRef<VS>, node: &Rc<Node<VS>>) {
  if let Some(t) = table.upgrade() {
    if let Ok(mut tbl) = t.try_borrow_mut() {
      tbl.remove(node);
    }
  }
}

include!("test-sdd.rs");
