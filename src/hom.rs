//! The homomorphism algebra and its evaluation engine. See spec §3
//! ("Homomorphism"), §4.6 (evaluation), and §4.7 (the `Inductive` user
//! contract).
//!
//! Like [`crate::sdd::Sdd`], a [`Hom`] is a canonicalized, reference-counted
//! handle; two homomorphisms compare equal iff they are the same pointer.
//! Canonicalization lives in its own thread-local [`HomManager`] (distinct
//! from [`crate::manager::Manager`], which only knows about `Sdd<VS>`
//! nodes) because a homomorphism additionally carries the identifier type
//! `I`, and Rust's `thread_local!` needs a concrete type per instantiation
//! -- the same reason `FlatSetValues::unify` nests its table inside a
//! generic function (see `values.rs`).
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::cache::OpCache;
use crate::error::{ConfigError, Result};
use crate::manager::Manager;
use crate::order::{Identifier, Order, Variable};
use crate::sdd::Sdd;
use crate::sdd_ops;
use crate::unique::UniqueTable;
use crate::values::ValuesSet;

/// Gives any `'static` value a path to `&dyn Any`, so trait objects built
/// over it can support downcast-based equality/hashing without every
/// implementor hand-writing the cast. Public: [`PointFunction`] and
/// [`Inductive`] are the extension points downstream crates implement, so
/// their supertrait bound must be nameable from outside this crate too.
pub trait AsAny: Any {
  fn as_any(&self) -> &dyn Any;
}
impl<T: Any> AsAny for T {
  fn as_any(&self) -> &dyn Any { self }
}

/// Adapts a `&mut dyn Hasher` back into something `Hash::hash` (which wants
/// a `Sized` generic `H: Hasher`) can be called with.
struct HasherMut<'a>(&'a mut dyn Hasher);
impl Hasher for HasherMut<'_> {
  fn finish(&self) -> u64 { self.0.finish() }
  fn write(&mut self, bytes: &[u8]) { self.0.write(bytes) }
}

/// Structural equality for a `T: PartialEq + Any` downcast from `&dyn Any`,
/// for implementing [`PointFunction::dyn_eq`] / [`Inductive::dyn_eq`].
pub fn erased_eq<T: PartialEq + Any>(this: &T, other: &dyn Any) -> bool {
  other.downcast_ref::<T>().is_some_and(|o| this == o)
}

/// Hashing for a `T: Hash + 'static` folding in `TypeId`, for implementing
/// [`PointFunction::dyn_hash`] / [`Inductive::dyn_hash`].
pub fn erased_hash<T: Hash + 'static>(this: &T, state: &mut dyn Hasher) {
  TypeId::of::<T>().hash(&mut HasherMut(state));
  Hash::hash(this, &mut HasherMut(state));
}

/// A point transformation on a flat level's valuation (spec §3:
/// `Function(order, identifier, f)`), e.g. a filter or a relabeling.
/// Implementors are ordinary structs (not bare closures) because the core
/// needs structural `==`/hash over `f`'s own parameters to canonicalize and
/// cache `Hom::function(...)` -- see `erased_eq`/`erased_hash` above for
/// the two one-line methods every implementor provides.
pub trait PointFunction<VS: ValuesSet>: fmt::Debug + AsAny {
  fn apply(&self, values: &VS) -> VS;
  /// Whether this function's image is always a subset of its input ("never
  /// adds tuples"). Default `false`; override for filters.
  fn selector(&self) -> bool { false }
  fn dyn_eq(&self, other: &dyn PointFunction<VS>) -> bool;
  fn dyn_hash(&self, state: &mut dyn Hasher);
}

/// The user-provided inductive operator (spec §4.7): describes, level by
/// level, how a homomorphism transforms an SDD without the user having to
/// hand-write the recursive descent themselves.
pub trait Inductive<VS: ValuesSet, I: Identifier>: fmt::Debug + AsAny {
  /// Does this operator leave `variable`'s level untouched? When true, the
  /// evaluation engine descends through the level generically instead of
  /// calling `apply_values`/`apply_nested`.
  fn skip(&self, variable: Variable) -> bool;
  fn selector(&self) -> bool { false }
  /// The image of the `One` terminal (the empty-tuple set), once reached.
  fn one(&self, mgr: &Manager<VS>) -> Sdd<VS>;
  /// Per-arc handler at a flat level: given this arc's valuation, return
  /// the homomorphism to apply to its successor.
  fn apply_values(&self, order: &Order<I>, values: &VS) -> Hom<VS, I>;
  /// Per-arc handler at a hierarchical level: given this arc's nested SDD,
  /// return the homomorphism to apply to its successor.
  fn apply_nested(&self, order: &Order<I>, nested: &Sdd<VS>) -> Hom<VS, I>;
  fn dyn_eq(&self, other: &dyn Inductive<VS, I>) -> bool;
  fn dyn_hash(&self, state: &mut dyn Hasher);
}

/// The canonical representation of a homomorphism. See spec §3 for the
/// full variant list; `SaturationSum` is the rewriter's output (§4.8), not
/// something client code constructs directly.
#[derive(Clone)]
pub(crate) enum HomNode<VS: ValuesSet, I: Identifier> {
  Id,
  Constant(Sdd<VS>),
  Cons { value: VS, next: Hom<VS, I> },
  Composition(Hom<VS, I>, Hom<VS, I>),
  Sum(Vec<Hom<VS, I>>),
  Intersection(Vec<Hom<VS, I>>),
  Fixpoint(Hom<VS, I>),
  Local { variable: Variable, inner: Hom<VS, I> },
  Function { identifier: I, f: Rc<dyn PointFunction<VS>> },
  Inductive(Rc<dyn Inductive<VS, I>>),
  SaturationSum { variable: Variable, f: Option<Hom<VS, I>>, g: Vec<Hom<VS, I>>, l: Option<Hom<VS, I>> },
}

impl<VS: ValuesSet, I: Identifier> PartialEq for HomNode<VS, I> {
  fn eq(&self, other: &Self) -> bool {
    use HomNode::*;
    match (self, other) {
      (Id, Id) => true,
      (Constant(a), Constant(b)) => a == b,
      (Cons { value: v1, next: n1 }, Cons { value: v2, next: n2 }) => v1 == v2 && n1 == n2,
      (Composition(f1, g1), Composition(f2, g2)) => f1 == f2 && g1 == g2,
      (Sum(a), Sum(b)) => a == b,
      (Intersection(a), Intersection(b)) => a == b,
      (Fixpoint(a), Fixpoint(b)) => a == b,
      (Local { variable: v1, inner: i1 }, Local { variable: v2, inner: i2 }) => v1 == v2 && i1 == i2,
      (Function { identifier: id1, f: f1 }, Function { identifier: id2, f: f2 }) => id1 == id2 && f1.dyn_eq(&**f2),
      (Inductive(a), Inductive(b)) => a.dyn_eq(&**b),
      (
        SaturationSum { variable: v1, f: f1, g: g1, l: l1 },
        SaturationSum { variable: v2, f: f2, g: g2, l: l2 },
      ) => v1 == v2 && f1 == f2 && g1 == g2 && l1 == l2,
      _ => false,
    }
  }
}
impl<VS: ValuesSet, I: Identifier> Eq for HomNode<VS, I> {}

impl<VS: ValuesSet, I: Identifier> Hash for HomNode<VS, I> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    use HomNode::*;
    match self {
      Id => 0u8.hash(state),
      Constant(c) => { 1u8.hash(state); c.hash(state); }
      Cons { value, next } => { 2u8.hash(state); value.hash(state); next.hash(state); }
      Composition(f, g) => { 3u8.hash(state); f.hash(state); g.hash(state); }
      Sum(members) => { 4u8.hash(state); members.hash(state); }
      Intersection(members) => { 5u8.hash(state); members.hash(state); }
      Fixpoint(h) => { 6u8.hash(state); h.hash(state); }
      Local { variable, inner } => { 7u8.hash(state); variable.hash(state); inner.hash(state); }
      Function { identifier, f } => { 8u8.hash(state); identifier.hash(state); f.dyn_hash(&mut HasherMut(state)); }
      Inductive(op) => { 9u8.hash(state); op.dyn_hash(&mut HasherMut(state)); }
      SaturationSum { variable, f, g, l } => {
        10u8.hash(state);
        variable.hash(state); f.hash(state); g.hash(state); l.hash(state);
      }
    }
  }
}

impl<VS: ValuesSet, I: Identifier> fmt::Debug for HomNode<VS, I> {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
    use HomNode::*;
    match self {
      Id => write!(fmt, "Id"),
      Constant(_) => write!(fmt, "Constant"),
      Cons { .. } => write!(fmt, "Cons"),
      Composition(..) => write!(fmt, "Composition"),
      Sum(members) => write!(fmt, "Sum({})", members.len()),
      Intersection(members) => write!(fmt, "Intersection({})", members.len()),
      Fixpoint(_) => write!(fmt, "Fixpoint"),
      Local { variable, .. } => write!(fmt, "Local({variable:?})"),
      Function { identifier, .. } => write!(fmt, "Function({identifier:?})"),
      Inductive(op) => write!(fmt, "Inductive({op:?})"),
      SaturationSum { variable, .. } => write!(fmt, "SaturationSum({variable:?})"),
    }
  }
}

impl<VS: ValuesSet, I: Identifier> HomNode<VS, I> {
  fn child_rcs(&self) -> Vec<Rc<HomNode<VS, I>>> {
    use HomNode::*;
    match self {
      Id | Constant(_) | Function { .. } | Inductive(_) => Vec::new(),
      Cons { next, .. } => vec![next.0.clone().unwrap()],
      Composition(f, g) => vec![f.0.clone().unwrap(), g.0.clone().unwrap()],
      Sum(members) | Intersection(members) => members.iter().map(|h| h.0.clone().unwrap()).collect(),
      Fixpoint(h) => vec![h.0.clone().unwrap()],
      Local { inner, .. } => vec![inner.0.clone().unwrap()],
      SaturationSum { f, g, l, .. } => {
        let mut out: Vec<_> = g.iter().map(|h| h.0.clone().unwrap()).collect();
        if let Some(f) = f { out.push(f.0.clone().unwrap()); }
        if let Some(l) = l { out.push(l.0.clone().unwrap()); }
        out
      }
    }
  }
}

/// Weak back-reference to the `HomManager` table a node was unified into,
/// carried by every [`Hom`] handle for the same reason `crate::sdd::Sdd`
/// carries one: `Drop` must deregister from the table that actually owns
/// the node, not from whichever `HomManager` happens to be thread-local
/// "current" when the handle is dropped.
type TableRef<VS, I> = Weak<RefCell<UniqueTable<HomNode<VS, I>, HomNode<VS, I>>>>;

/// A canonicalized, reference-counted handle to a homomorphism node.
pub struct Hom<VS: ValuesSet, I: Identifier>(Option<Rc<HomNode<VS, I>>>, TableRef<VS, I>);

impl<VS: ValuesSet, I: Identifier> Hom<VS, I> {
  fn wrap(rc: Rc<HomNode<VS, I>>, table: TableRef<VS, I>) -> Self { Hom(Some(rc), table) }

  fn rc(&self) -> &Rc<HomNode<VS, I>> {
    self.0.as_ref().expect("Hom handle used after its Rc was taken for teardown")
  }

  pub(crate) fn node(&self) -> &HomNode<VS, I> { self.rc() }

  pub fn id() -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Id)
  }

  pub fn constant(sdd: Sdd<VS>) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Constant(sdd))
  }

  pub fn cons(value: VS, next: Hom<VS, I>) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Cons { value, next })
  }

  pub fn compose(f: Hom<VS, I>, g: Hom<VS, I>) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Composition(f, g))
  }

  /// Builds a `Sum` from an arbitrary-order operand list. The operands are
  /// canonicalized into a deterministic order (by pointer address) before
  /// construction, so `Hom::sum(vec![a, b]) == Hom::sum(vec![b, a])` --
  /// matching the SDD arc-set canonical invariant (spec §3, invariant 4)
  /// applied here to homomorphism operand *sets*.
  pub fn sum(mut members: Vec<Hom<VS, I>>) -> Self where VS: 'static, I: 'static {
    canonicalize_operand_set(&mut members);
    HomManager::<VS, I>::current().unify(HomNode::Sum(members))
  }

  pub fn intersection(mut members: Vec<Hom<VS, I>>) -> Self where VS: 'static, I: 'static {
    canonicalize_operand_set(&mut members);
    HomManager::<VS, I>::current().unify(HomNode::Intersection(members))
  }

  pub fn fixpoint(inner: Hom<VS, I>) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Fixpoint(inner))
  }

  pub fn local(variable: Variable, inner: Hom<VS, I>) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Local { variable, inner })
  }

  pub fn function(identifier: I, f: impl PointFunction<VS> + 'static) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Function { identifier, f: Rc::new(f) })
  }

  pub fn inductive(op: impl Inductive<VS, I> + 'static) -> Self where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::Inductive(Rc::new(op)))
  }

  pub(crate) fn saturation_sum(variable: Variable, f: Option<Hom<VS, I>>, g: Vec<Hom<VS, I>>, l: Option<Hom<VS, I>>) -> Self
  where VS: 'static, I: 'static {
    HomManager::<VS, I>::current().unify(HomNode::SaturationSum { variable, f, g, l })
  }

  pub fn is_id(&self) -> bool { matches!(self.node(), HomNode::Id) }

  /// Does this operator leave `order`'s current level untouched? See spec
  /// §3/§4.6. `Id` always skips; a handful of variants need the ambient
  /// order to decide (`Local`, `Function`, `Inductive`, `SaturationSum`).
  pub fn skip(&self, order: &Order<I>) -> bool {
    use HomNode::*;
    match self.node() {
      Id => true,
      Constant(_) | Cons { .. } => false,
      Composition(f, g) => f.skip(order) && g.skip(order),
      Sum(members) | Intersection(members) => members.iter().all(|h| h.skip(order)),
      Fixpoint(_) => false,
      Local { variable, .. } => order.is_empty() || order.variable() != *variable,
      Function { identifier, .. } => {
        order.is_empty() || !matches!(order.head(), crate::order::OrderLabel::User(id) if id == identifier)
      }
      Inductive(op) => order.is_empty() || op.skip(order.variable()),
      SaturationSum { variable, .. } => order.is_empty() || order.variable() != *variable,
    }
  }

  /// Is this homomorphism's image always a subset of its input? See spec
  /// §4.6 ("Selector propagation").
  pub fn selector(&self) -> bool {
    use HomNode::*;
    match self.node() {
      Id => true,
      Constant(_) | Cons { .. } => false,
      Composition(f, g) => f.selector() && g.selector(),
      Sum(members) | Intersection(members) => members.iter().all(|h| h.selector()),
      Fixpoint(h) => h.selector(),
      Local { inner, .. } => inner.selector(),
      Function { f, .. } => f.selector(),
      Inductive(op) => op.selector(),
      SaturationSum { .. } => false,
    }
  }
}

/// Sorts by `Hom`'s canonical pointer-identity order and removes duplicate
/// operands, so `Sum`/`Intersection` construction always yields the same
/// canonical node for the same operand *set*, regardless of call-site
/// order.
fn canonicalize_operand_set<VS: ValuesSet, I: Identifier>(members: &mut Vec<Hom<VS, I>>) {
  members.sort_by_key(|h| Rc::as_ptr(h.rc()) as usize);
  members.dedup_by(|a, b| Rc::ptr_eq(a.rc(), b.rc()));
}

impl<VS: ValuesSet, I: Identifier> Clone for Hom<VS, I> {
  fn clone(&self) -> Self { Hom(Some(self.rc().clone()), self.1.clone()) }
}

impl<VS: ValuesSet, I: Identifier> PartialEq for Hom<VS, I> {
  fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(self.rc(), other.rc()) }
}
impl<VS: ValuesSet, I: Identifier> Eq for Hom<VS, I> {}

impl<VS: ValuesSet, I: Identifier> Hash for Hom<VS, I> {
  fn hash<H: Hasher>(&self, state: &mut H) { (Rc::as_ptr(self.rc()) as usize).hash(state) }
}

impl<VS: ValuesSet, I: Identifier> fmt::Debug for Hom<VS, I> {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result { self.node().fmt(fmt) }
}

/// Iterative teardown, mirroring `Sdd`'s `Drop` (spec §5: cascaded drop
/// must be stack-depth independent, not structurally recursive).
impl<VS: ValuesSet, I: Identifier> Drop for Hom<VS, I> {
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
      for child in node.child_rcs() {
        if Rc::strong_count(&child) == 1 {
          deregister(&table, &child);
          if let Ok(child_node) = Rc::try_unwrap(child) {
            worklist.push(child_node);
          }
        }
      }
    }
  }
}

/// See `crate::sdd::deregister`: every descendant in one teardown cascade
/// belongs to the same `HomManager`, so the top node's table reference
/// covers the whole worklist.
fn deregister<VS: ValuesSet, I: Identifier>(table: &TableRef<VS, I>, node: &Rc<HomNode<VS, I>>) {
  if let Some(t) = table.upgrade() {
    if let Ok(mut tbl) = t.try_borrow_mut() {
      tbl.remove(node);
    }
  }
}

/// Thread-local owner of the homomorphism unique table and the `(Hom, Sdd)
/// -> Sdd` evaluation cache. See spec §3 ("Context") and §5.1 in
/// SPEC_FULL.md for why this is split from `crate::manager::Manager`.
pub struct HomManager<VS: ValuesSet, I: Identifier> {
  table: Rc<RefCell<UniqueTable<HomNode<VS, I>, HomNode<VS, I>>>>,
  pub(crate) eval_cache: RefCell<OpCache<(Hom<VS, I>, Sdd<VS>), Sdd<VS>>>,
}

impl<VS: ValuesSet + 'static, I: Identifier + 'static> HomManager<VS, I> {
  /// Construct a standalone `HomManager`, for the same explicit-context
  /// style `Manager::new` supports -- see its doc comment.
  pub fn new(hom_unique_table_size: usize, hom_cache_size: usize) -> Self {
    HomManager {
      table: Rc::new(RefCell::new(UniqueTable::with_capacity(hom_unique_table_size.min(1 << 16)))),
      eval_cache: RefCell::new(OpCache::with_capacity(hom_cache_size)),
    }
  }

  /// Every `Hom` built here carries a weak back-reference to this exact
  /// `table` (see `Hom`'s `TableRef`/`Drop`), so teardown targets the table
  /// that actually owns the node regardless of which `HomManager` is
  /// thread-local "current" when the handle drops.
  fn unify(&self, node: HomNode<VS, I>) -> Hom<VS, I> {
    let rc = self.table.borrow_mut().unify(node, Rc::new);
    Hom::wrap(rc, Rc::downgrade(&self.table))
  }

  pub fn resident_homs(&self) -> usize { self.table.borrow().resident() }

  /// `(tests, hits)` against the `(Hom, Sdd) -> Sdd` evaluation cache (spec
  /// §8 invariant 3: a repeated evaluation must observably hit the cache).
  pub fn eval_cache_stats(&self) -> (u64, u64) { self.eval_cache.borrow().stats() }

  /// Number of distinct `(Hom, Sdd)` pairs currently memoized. Saturation's
  /// whole performance case (spec §4.8, §8 scenario 3) is that it keeps this
  /// number smaller than the unrewritten fixed point's peak for the same
  /// computation.
  pub fn eval_cache_len(&self) -> usize { self.eval_cache.borrow().len() }

  fn thread_slot() -> &'static std::thread::LocalKey<RefCell<Option<Rc<HomManager<VS, I>>>>> {
    thread_local! {
      static CURRENT: RefCell<Option<Rc<HomManager<VS, I>>>> = const { RefCell::new(None) };
    }
    &CURRENT
  }

  pub fn init(hom_unique_table_size: usize, hom_cache_size: usize) -> std::result::Result<(), ConfigError> {
    Self::thread_slot().with(|cell| {
      if cell.borrow().is_some() { return Err(ConfigError::AlreadyInitialized); }
      *cell.borrow_mut() = Some(Rc::new(HomManager::new(hom_unique_table_size, hom_cache_size)));
      Ok(())
    })
  }

  fn ensure_default() {
    Self::thread_slot().with(|cell| {
      if cell.borrow().is_none() {
        *cell.borrow_mut() = Some(Rc::new(HomManager::new(1_000_000, 1_000_000)));
      }
    });
  }

  pub fn current() -> Rc<HomManager<VS, I>> {
    Self::ensure_default();
    Self::thread_slot().with(|cell| cell.borrow().clone().expect("ensure_default just ran"))
  }

  pub fn shutdown() -> std::result::Result<(), ConfigError> {
    Self::thread_slot().with(|cell| {
      let Some(mgr) = cell.borrow_mut().take() else { return Ok(()) };
      mgr.eval_cache.borrow_mut().clear();
      let resident = mgr.resident_homs();
      if resident > 0 {
        *cell.borrow_mut() = Some(mgr);
        return Err(ConfigError::ResidentNodesOnTeardown(resident));
      }
      Ok(())
    })
  }

}

/// Evaluate `h(order, s)`. See spec §4.6 for the dispatch algorithm this
/// implements verbatim: `Id`/`Zero` short-circuits, a `one()` override at
/// the `One` terminal, generic skip-and-descend, then the per-variant
/// handler -- each step consulting `hom_mgr`'s cache first.
pub fn eval<VS, I>(h: &Hom<VS, I>, sdd_mgr: &Manager<VS>, hom_mgr: &HomManager<VS, I>, order: &Order<I>, s: &Sdd<VS>) -> Result<Sdd<VS>>
where
  VS: ValuesSet + 'static,
  I: Identifier + 'static,
{
  if h.is_id() { return Ok(s.clone()); }
  // Constant ignores its argument entirely -- including Zero -- which is
  // what distinguishes it from every other (linear) variant below, all of
  // which satisfy h(Zero) = Zero.
  if let HomNode::Constant(c) = h.node() { return Ok(c.clone()); }
  if s.is_zero() { return Ok(sdd_mgr.zero()); }

  if s.is_one() {
    if let HomNode::Inductive(op) = h.node() {
      let image = op.one(sdd_mgr);
      #[cfg(debug_assertions)]
      verify_one_contract(op.as_ref(), sdd_mgr, &image)?;
      return Ok(image);
    }
  }

  let key = (h.clone(), s.clone());
  if let Some(cached) = hom_mgr.eval_cache.borrow_mut().get(&key) {
    return Ok(cached);
  }

  let result = if h.skip(order) && !s.is_terminal() {
    #[cfg(debug_assertions)]
    verify_skip_contract(h, order, s)?;
    descend(h, sdd_mgr, hom_mgr, order, s)?
  } else {
    dispatch(h, sdd_mgr, hom_mgr, order, s)?
  };

  hom_mgr.eval_cache.borrow_mut().insert(key, result.clone());
  Ok(result)
}

/// Debug-only check for the `Inductive` contract (spec §4.7/§7,
/// `EvaluationError::SkipContractViolated`): if a user operator's `skip(v)`
/// claims this level is untouched, its own `apply_values`/`apply_nested`
/// must agree and hand back `Id` for every arc -- otherwise the generic
/// descend below would silently apply the wrong transformation. Not run in
/// release builds: it duplicates the per-arc work the skip path exists to
/// avoid.
#[cfg(debug_assertions)]
fn verify_skip_contract<VS, I>(h: &Hom<VS, I>, order: &Order<I>, s: &Sdd<VS>) -> Result<()>
where
  VS: ValuesSet + 'static,
  I: Identifier + 'static,
{
  let HomNode::Inductive(op) = h.node() else { return Ok(()) };
  let name = format!("{op:?}");
  if let Some(arcs) = s.flat_arcs() {
    for (vals, _) in arcs {
      if !op.apply_values(order, vals).is_id() {
        return Err(crate::error::EvaluationError::SkipContractViolated { name }.into());
      }
    }
  } else if let Some(arcs) = s.hierarchical_arcs() {
    for (nested, _) in arcs {
      if !op.apply_nested(order, nested).is_id() {
        return Err(crate::error::EvaluationError::SkipContractViolated { name }.into());
      }
    }
  }
  Ok(())
}

/// Debug-only check for the `Inductive` contract's `one()` half (spec §4.7/
/// §7, `EvaluationError::BadOneImage`): the image of the `One` terminal must
/// be deterministic, since it is looked up outside the eval cache (the `One`
/// short-circuit above runs before the cache key is even built). An operator
/// whose `one()` isn't a pure function of its own parameters would make two
/// evaluations of the same `(h, One)` pair silently diverge.
#[cfg(debug_assertions)]
fn verify_one_contract<VS, I>(op: &dyn Inductive<VS, I>, mgr: &Manager<VS>, image: &Sdd<VS>) -> Result<()>
where
  VS: ValuesSet + 'static,
  I: Identifier + 'static,
{
  let second = op.one(mgr);
  if second != *image {
    return Err(crate::error::EvaluationError::BadOneImage { name: format!("{op:?}") }.into());
  }
  Ok(())
}

/// `h.skip(order)` held and `s` is a node: rebuild it at `order.variable()`
/// with every arc's successor replaced by `h(order.next(), successor)`,
/// leaving the arc's own valuation untouched.
fn descend<VS, I>(h: &Hom<VS, I>, sdd_mgr: &Manager<VS>, hom_mgr: &HomManager<VS, I>, order: &Order<I>, s: &Sdd<VS>) -> Result<Sdd<VS>>
where
  VS: ValuesSet + 'static,
  I: Identifier + 'static,
{
  let next_order = order.next();
  if let Some(arcs) = s.flat_arcs() {
    let mut new_arcs = Vec::with_capacity(arcs.len());
    for (vals, succ) in arcs {
      new_arcs.push((vals.clone(), eval(h, sdd_mgr, hom_mgr, &next_order, succ)?));
    }
    return Ok(Sdd::flat(sdd_mgr, s.variable().unwrap(), new_arcs));
  }
  if let Some(arcs) = s.hierarchical_arcs() {
    let mut new_arcs = Vec::with_capacity(arcs.len());
    for (nested, succ) in arcs {
      new_arcs.push((nested.clone(), eval(h, sdd_mgr, hom_mgr, &next_order, succ)?));
    }
    return Ok(Sdd::hierarchical(sdd_mgr, s.variable().unwrap(), new_arcs));
  }
  unreachable!("descend() is only called when s.is_terminal() is false")
}

fn dispatch<VS, I>(h: &Hom<VS, I>, sdd_mgr: &Manager<VS>, hom_mgr: &HomManager<VS, I>, order: &Order<I>, s: &Sdd<VS>) -> Result<Sdd<VS>>
where
  VS: ValuesSet + 'static,
  I: Identifier + 'static,
{
  match h.node() {
    HomNode::Id => unreachable!("Id is handled before dispatch"),
    HomNode::Constant(_) => unreachable!("Constant is handled before dispatch"),

    HomNode::Cons { value, next } => {
      assert!(!order.is_empty(), "Cons: order exhausted before homomorphism finished");
      let succ = eval(next, sdd_mgr, hom_mgr, &order.next(), s)?;
      Ok(Sdd::flat(sdd_mgr, order.variable(), vec![(value.clone(), succ)]))
    }

    HomNode::Composition(f, g) => {
      let mid = eval(g, sdd_mgr, hom_mgr, order, s)?;
      eval(f, sdd_mgr, hom_mgr, order, &mid)
    }

    HomNode::Sum(members) => {
      let mut acc = sdd_mgr.zero();
      for m in members {
        let r = eval(m, sdd_mgr, hom_mgr, order, s)?;
        acc = sdd_ops::union(sdd_mgr, &acc, &r)?;
      }
      Ok(acc)
    }

    HomNode::Intersection(members) => {
      if members.is_empty() { return Ok(s.clone()); }
      let mut iter = members.iter();
      let mut acc = eval(iter.next().unwrap(), sdd_mgr, hom_mgr, order, s)?;
      for m in iter {
        let r = eval(m, sdd_mgr, hom_mgr, order, s)?;
        acc = sdd_ops::intersection(sdd_mgr, &acc, &r)?;
      }
      Ok(acc)
    }

    HomNode::Fixpoint(inner) => {
      let mut x = s.clone();
      loop {
        let x_prime = eval(inner, sdd_mgr, hom_mgr, order, &x)?;
        if x_prime == x { break; }
        x = sdd_ops::union(sdd_mgr, &x_prime, &x)?;
      }
      Ok(x)
    }

    HomNode::Local { variable, inner } => {
      debug_assert!(order.is_empty() || order.variable() == *variable);
      match s.hierarchical_arcs() {
        Some(arcs) => {
          let nested_order = order.nested();
          let mut new_arcs = Vec::with_capacity(arcs.len());
          for (nested, succ) in arcs {
            new_arcs.push((eval(inner, sdd_mgr, hom_mgr, &nested_order, nested)?, succ.clone()));
          }
          Ok(Sdd::hierarchical(sdd_mgr, *variable, new_arcs))
        }
        None => Ok(s.clone()),
      }
    }

    HomNode::Function { identifier: _, f } => match s.flat_arcs() {
      Some(arcs) => {
        let new_arcs: Vec<_> = arcs.iter().map(|(vals, succ)| (f.apply(vals), succ.clone())).collect();
        Ok(Sdd::flat(sdd_mgr, s.variable().unwrap(), new_arcs))
      }
      None => Ok(s.clone()),
    },

    HomNode::Inductive(op) => {
      if let Some(arcs) = s.flat_arcs() {
        let next_order = order.next();
        let mut new_arcs = Vec::with_capacity(arcs.len());
        for (vals, succ) in arcs {
          let next_hom = op.apply_values(order, vals);
          new_arcs.push((vals.clone(), eval(&next_hom, sdd_mgr, hom_mgr, &next_order, succ)?));
        }
        return Ok(Sdd::flat(sdd_mgr, s.variable().unwrap(), new_arcs));
      }
      if let Some(arcs) = s.hierarchical_arcs() {
        let next_order = order.next();
        let mut new_arcs = Vec::with_capacity(arcs.len());
        for (nested, succ) in arcs {
          let next_hom = op.apply_nested(order, nested);
          new_arcs.push((nested.clone(), eval(&next_hom, sdd_mgr, hom_mgr, &next_order, succ)?));
        }
        return Ok(Sdd::hierarchical(sdd_mgr, s.variable().unwrap(), new_arcs));
      }
      Ok(s.clone())
    }

    HomNode::SaturationSum { variable, f, g, l } => {
      debug_assert!(order.is_empty() || order.variable() == *variable);
      let mut x = s.clone();
      loop {
        let mut y = x.clone();
        if let Some(f_hom) = f { y = eval(f_hom, sdd_mgr, hom_mgr, order, &y)?; }
        if let Some(l_hom) = l { y = eval(l_hom, sdd_mgr, hom_mgr, order, &y)?; }
        for g_hom in g {
          let r = eval(g_hom, sdd_mgr, hom_mgr, order, &y)?;
          y = sdd_ops::union(sdd_mgr, &y, &r)?;
        }
        if y == x { break; }
        x = y;
      }
      Ok(x)
    }
  }
}

include!("test-hom.rs");
