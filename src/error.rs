//! Error types.
//!
//! Definition errors are fatal to a build. Solver errors offer a reset path.
//! Execution errors are absorbed per branch and only surface when every
//! branch of a step dies.

use crate::solver::ConstraintId;
use crate::ts::{Action, State};

/// A malformed feature model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("the feature model has no root feature")]
    MissingRoot,

    #[error("a root feature is already set: {0}")]
    RootAlreadySet(String),

    #[error("duplicate feature name: {0}")]
    DuplicateFeature(String),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("{kind} group of feature {parent} must have exactly one child, found {children}")]
    GroupArity {
        kind: &'static str,
        parent: String,
        children: usize,
    },

    #[error("{kind} group of feature {parent} has no children")]
    EmptyGroup { kind: &'static str, parent: String },

    #[error("cardinality [{lower}..{upper:?}] of a group of feature {parent} is inconsistent with {children} children")]
    InvalidCardinality {
        parent: String,
        lower: usize,
        upper: Option<usize>,
        children: usize,
    },

    #[error("feature {feature} is not in the subtree of {lca}")]
    OutOfScope { feature: String, lca: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    /// The backend could not incorporate a formula. Its state is unchanged.
    #[error("solver initialization failed: {0}")]
    Initialization(String),

    /// The backend is unusable and must be rebuilt.
    #[error("fatal solver error: {0}")]
    Fatal(String),

    #[error("constraint {0} not found")]
    ConstraintNotFound(ConstraintId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("no branch can execute action {action} at step {step}")]
    NoMatchingTransition { action: Action, step: usize },

    #[error("transition starts in {found}, but the execution ends in {expected}")]
    Discontiguous { expected: State, found: State },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoverageError {
    #[error("execution failed during coverage computation: {0}")]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DissimilarityError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("union has {union} solutions but the intersection has {intersection}")]
    InconsistentCounts { intersection: String, union: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureModelError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}
