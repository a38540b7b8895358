//! Error taxonomy for the core. See spec §4.9 / §7.
//!
//! Errors are never cached: an operation that fails is simply recomputed
//! next time, rather than risking a stale failure wedged into a memo table.

use std::fmt::Debug;

/// Raised when two SDDs of incompatible shape are combined (different
/// depths, or mismatched variables at the same depth). Not recoverable by
/// the core; the caller built an inconsistent pair of diagrams.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SddError {
  #[error("Top: combined a terminal with a node (depths differ)")]
  DepthMismatch,
  #[error("Top: arcs at the same depth branch on different variables ({left:?} vs {right:?})")]
  VariableMismatch { left: String, right: String },
}

/// Raised by [`crate::order::OrderBuilder`] and by [`crate::order::Order`] queries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
  #[error("identifier not found in order")]
  NotFound,
  #[error("duplicate identifier in order builder")]
  Duplicate,
}

/// Raised when a user-supplied [`crate::hom::Inductive`] implementation
/// violates its own contract (e.g. declares `skip(v)` but its `apply_*`
/// handler is reached anyway, or returns a homomorphism that isn't `Id`
/// where the contract requires one).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
  #[error("inductive operator {name} violated its skip() contract")]
  SkipContractViolated { name: String },
  #[error("inductive operator {name} returned an inconsistent result for the One terminal")]
  BadOneImage { name: String },
}

/// Raised by [`crate::manager::Manager`] construction/teardown.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("manager already initialized on this thread")]
  AlreadyInitialized,
  #[error("manager torn down with {0} resident node(s) still live")]
  ResidentNodesOnTeardown(usize),
  #[error("invalid manager configuration: {0}")]
  Invalid(String),
}

/// Top-level error returned by any public entry point that can fail.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
  #[error(transparent)]
  Sdd(#[from] SddError),
  #[error(transparent)]
  Order(#[from] OrderError),
  #[error(transparent)]
  Evaluation(#[from] EvaluationError),
  #[error(transparent)]
  Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
