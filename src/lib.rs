//! A crate for working with Hierarchical Set Decision Diagrams (SDD) and
//! the homomorphisms that transform them.
//!
//! An [`Sdd`] is a canonicalized, reference-counted handle into a
//! process-wide (thread-local) set of unified nodes; two `Sdd`s are equal
//! iff they are the same pointer. A [`Hom`] is the same kind of handle over
//! a small, closed algebra of set-transforming operators — composition,
//! sum, fixed point, and a user-extensible `Inductive` case — evaluated
//! against an [`Order`] that assigns each user identifier a position.

#![allow(clippy::many_single_char_names)]

#[macro_use] extern crate log;

/// Process-wide manager: owns the unique tables and operation caches.
pub mod manager;
/// Error taxonomy for the core (`Top`, `OrderError`, `EvaluationError`, `ConfigError`).
pub mod error;
/// Generic weak-keyed interning table shared by every canonicalized type.
pub mod unique;
/// Variable orders: flat and hierarchical identifier-to-position mappings.
pub mod order;
/// Finite sets of values labelling flat arcs (bitset- and sorted-vector-backed).
pub mod values;
/// The SDD data structure: node kinds, canonical constructors, traversal.
pub mod sdd;
/// Set-algebraic operations over SDDs (union, intersection, difference).
pub mod sdd_ops;
/// Memoization tables keyed by operand identity.
pub mod cache;
/// The homomorphism algebra and its evaluation engine.
pub mod hom;
/// The saturation rewriter: turns `Fixpoint(Sum(H))` into a level-local saturated operator.
pub mod rewrite;
/// Path counting and the shared traversal ("visit") contract.
pub mod count;

pub use error::{ConfigError, EvaluationError, OrderError, SddError};
pub use manager::{Manager, ManagerConfig};
pub use order::{Identifier, Order, OrderBuilder, Variable};
pub use sdd::Sdd;
pub use hom::{erased_eq, erased_hash, eval, AsAny, Hom, HomManager, Inductive, PointFunction};
pub use values::{BitsetValues, FlatSetValues, ValuesSet};
pub use count::{count_paths, paths, PathValue, Visit};
pub use rewrite::rewrite;
