//! Variable orders: an immutable, possibly-hierarchical assignment of user
//! identifiers to numeric positions. See spec §3 ("Order") and §4.5.
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use fxhash::FxBuildHasher;

use crate::error::OrderError;

/// Bound required of a user identifier: opaque to the core, but must be
/// usable as a map key and totally ordered so positions are deterministic.
pub trait Identifier: Clone + Eq + std::hash::Hash + Ord + fmt::Debug {}
impl<T: Clone + Eq + std::hash::Hash + Ord + fmt::Debug> Identifier for T {}

/// A small non-negative integer assigned by the order to each identifier;
/// used internally as the ordered key on SDD nodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Variable(u32);

impl Variable {
  pub fn index(self) -> u32 { self.0 }
}

impl fmt::Display for Variable {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "v{}", self.0) }
}

/// Pre-order traversal index, unique per order, used to establish the
/// total order `compare()` relies on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Position(u32);

fn next_artificial_id() -> u32 {
  static COUNTER: AtomicU32 = AtomicU32::new(0);
  COUNTER.fetch_add(1, AtomicOrdering::Relaxed) + 1
}

/// Either a user-supplied identifier, or a synthetic one minted by the
/// builder for a purely-structural hierarchical grouping node.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum OrderLabel<I: Identifier> {
  User(I),
  Artificial(u32),
}

impl<I: Identifier + fmt::Display> fmt::Display for OrderLabel<I> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      OrderLabel::User(id) => write!(f, "{}", id),
      OrderLabel::Artificial(n) => write!(f, "@{}@", n),
    }
  }
}

struct OrderNode<I: Identifier> {
  label: OrderLabel<I>,
  variable: Variable,
  position: Position,
  next: Option<Rc<OrderNode<I>>>,
  nested: Option<Rc<OrderNode<I>>>,
  /// Ancestor positions of the enclosing hierarchy chain, shared by every
  /// node at this level (spec invariant iii).
  path: Rc<Vec<Position>>,
}

/// An immutable, persistent linked tree associating identifiers with
/// variable numbers and absolute positions, possibly with hierarchy.
#[derive(Clone)]
pub struct Order<I: Identifier> {
  node: Option<Rc<OrderNode<I>>>,
  index: Rc<HashMap<OrderLabel<I>, Rc<OrderNode<I>>, FxBuildHasher>>,
}

impl<I: Identifier> Order<I> {
  /// The empty order (no identifiers left at this level).
  pub fn empty(index: Rc<HashMap<OrderLabel<I>, Rc<OrderNode<I>>, FxBuildHasher>>) -> Self {
    Order { node: None, index }
  }

  pub fn is_empty(&self) -> bool { self.node.is_none() }

  fn node(&self) -> &Rc<OrderNode<I>> {
    self.node.as_ref().expect("called on an empty Order; check is_empty() first")
  }

  /// The identifier at the head of this (sub-)order.
  pub fn head(&self) -> &OrderLabel<I> { &self.node().label }

  /// The variable assigned to the head identifier.
  pub fn variable(&self) -> Variable { self.node().variable }

  /// The absolute pre-order position of the head identifier.
  pub fn position(&self) -> Position { self.node().position }

  /// The order starting at the next sibling (same hierarchy level).
  pub fn next(&self) -> Order<I> {
    Order { node: self.node().next.clone(), index: self.index.clone() }
  }

  /// The order nested under the head identifier (empty if the head is flat).
  pub fn nested(&self) -> Order<I> {
    Order { node: self.node().nested.clone(), index: self.index.clone() }
  }

  fn find(&self, label: &OrderLabel<I>) -> Result<&Rc<OrderNode<I>>, OrderError> {
    self.index.get(label).ok_or(OrderError::NotFound)
  }

  pub fn variable_of(&self, id: &I) -> Result<Variable, OrderError> {
    Ok(self.find(&OrderLabel::User(id.clone()))?.variable)
  }

  pub fn position_of(&self, id: &I) -> Result<Position, OrderError> {
    Ok(self.find(&OrderLabel::User(id.clone()))?.position)
  }

  /// Total order on identifiers by absolute position.
  pub fn compare(&self, a: &I, b: &I) -> Result<std::cmp::Ordering, OrderError> {
    Ok(self.position_of(a)?.cmp(&self.position_of(b)?))
  }

  /// Does `ancestor`'s level enclose `descendant`'s level (directly or
  /// transitively, via one or more `nested` steps)?
  pub fn contains(&self, ancestor: &I, descendant: &I) -> Result<bool, OrderError> {
    let anc = self.find(&OrderLabel::User(ancestor.clone()))?;
    let desc = self.find(&OrderLabel::User(descendant.clone()))?;
    Ok(desc.path.contains(&anc.position))
  }

  /// Are `a` and `b` nodes of the same hierarchy level (siblings, possibly
  /// at different positions along `next`)?
  pub fn same_hierarchy(&self, a: &I, b: &I) -> Result<bool, OrderError> {
    let na = self.find(&OrderLabel::User(a.clone()))?;
    let nb = self.find(&OrderLabel::User(b.clone()))?;
    Ok(Rc::ptr_eq(&na.path, &nb.path))
  }
}

/// A prototype node in an order under construction. Unlike `Order`, this
/// tree is mutable until `build()` freezes it.
struct ProtoNode<I: Identifier> {
  label: OrderLabel<I>,
  nested: Option<Box<ProtoNode<I>>>,
  next: Option<Box<ProtoNode<I>>>,
}

/// Assembles an order from flat identifiers, nested sub-orders, and
/// concatenation, then freezes it into an [`Order`].
pub struct OrderBuilder<I: Identifier> {
  head: Option<Box<ProtoNode<I>>>,
}

impl<I: Identifier> Default for OrderBuilder<I> {
  fn default() -> Self { OrderBuilder { head: None } }
}

impl<I: Identifier> OrderBuilder<I> {
  pub fn new() -> Self { Self::default() }

  /// Push a flat identifier at the top of this order (becomes the new head).
  pub fn push(mut self, id: I) -> Self {
    self.head = Some(Box::new(ProtoNode { label: OrderLabel::User(id), nested: None, next: self.head.take() }));
    self
  }

  /// Push an identifier with an associated nested sub-order at the top of this order.
  pub fn push_nested(mut self, id: I, nested: OrderBuilder<I>) -> Self {
    self.head = Some(Box::new(ProtoNode {
      label: OrderLabel::User(id),
      nested: nested.head,
      next: self.head.take(),
    }));
    self
  }

  /// Push a purely-structural hierarchical grouping with no user identifier;
  /// the builder mints a fresh artificial identifier for it.
  pub fn push_nested_grouped(mut self, nested: OrderBuilder<I>) -> Self {
    self.head = Some(Box::new(ProtoNode {
      label: OrderLabel::Artificial(next_artificial_id()),
      nested: nested.head,
      next: self.head.take(),
    }));
    self
  }

  /// Concatenate `next` after this order (`operator<<` in the original).
  pub fn concat(self, next: OrderBuilder<I>) -> Self {
    fn append<I: Identifier>(head: Option<Box<ProtoNode<I>>>, tail: Option<Box<ProtoNode<I>>>) -> Option<Box<ProtoNode<I>>> {
      match head {
        None => tail,
        Some(mut node) => { node.next = append(node.next.take(), tail); Some(node) }
      }
    }
    OrderBuilder { head: append(self.head, next.head) }
  }

  /// Freeze the order: check for duplicate identifiers, assign variables
  /// bottom-up (nested subtrees numbered before their enclosing node, so
  /// that walking `next` at a single level yields strictly increasing
  /// variable numbers), assign absolute pre-order positions top-down, and
  /// materialize the immutable linked structure.
  pub fn build(self) -> Result<Order<I>, OrderError> {
    let mut seen = std::collections::HashSet::new();
    check_duplicates(&self.head, &mut seen)?;

    let mut pos_counter = 0u32;
    let mut var_counter = 0u32;
    let mut index = HashMap::with_hasher(FxBuildHasher::default());
    let root_path = Rc::new(Vec::new());
    let node = freeze(self.head, &mut pos_counter, &mut var_counter, root_path, &mut index);
    Ok(Order { node, index: Rc::new(index) })
  }
}

fn check_duplicates<I: Identifier>(
  node: &Option<Box<ProtoNode<I>>>,
  seen: &mut std::collections::HashSet<OrderLabel<I>>,
) -> Result<(), OrderError> {
  if let Some(n) = node {
    if let OrderLabel::User(_) = &n.label {
      if !seen.insert(n.label.clone()) { return Err(OrderError::Duplicate); }
    }
    check_duplicates(&n.nested, seen)?;
    check_duplicates(&n.next, seen)?;
  }
  Ok(())
}

/// Freeze a prototype subtree. Variables are assigned bottom-up: a node's
/// `nested` subtree is numbered first (consuming the smaller variable
/// numbers), then the node itself takes the next counter value, then its
/// `next` sibling continues — so `next` strictly increases and every
/// nested variable is strictly below its enclosing node's variable.
/// Positions are assigned top-down pre-order with a separate counter.
fn freeze<I: Identifier>(
  node: Option<Box<ProtoNode<I>>>,
  pos_counter: &mut u32,
  var_counter: &mut u32,
  path: Rc<Vec<Position>>,
  index: &mut HashMap<OrderLabel<I>, Rc<OrderNode<I>>, FxBuildHasher>,
) -> Option<Rc<OrderNode<I>>> {
  let node = node?;
  let position = Position(*pos_counter);
  *pos_counter += 1;

  let nested_path = {
    let mut v = (*path).clone();
    v.push(position);
    Rc::new(v)
  };
  let nested = freeze(node.nested, pos_counter, var_counter, nested_path, index);
  let variable = Variable(*var_counter);
  *var_counter += 1;
  let next = freeze(node.next, pos_counter, var_counter, path, index);

  let frozen = Rc::new(OrderNode {
    label: node.label.clone(),
    variable,
    position,
    next,
    nested,
    path,
  });
  index.insert(node.label, frozen.clone());
  Some(frozen)
}

include!("test-order.rs");
