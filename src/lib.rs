//! # fts-rs: Featured Transition Systems for product-line testing
//!
//! **`fts-rs`** models the behaviour of a software product line as a
//! **featured transition system** (FTS): a transition system whose transitions
//! are guarded by boolean expressions over features. It ties such systems to
//! **feature models** and provides the analyses needed for model-based testing
//! of the whole family of products at once.
//!
//! ## Key Features
//!
//! - **Feature expressions**: [`FExpression`][crate::fexpr::FExpression] is a plain tagged union with simplification, NNF/CNF/DNF, assignment and evaluation.
//! - **Two solver backends behind one interface**: [`SolverFacade`][crate::solver::SolverFacade] is implemented by a clause-based solver (Tseitin + DPLL) and by the crate's own BDD manager. Both answer satisfiability, enumeration and exact model counting.
//! - **Feature models**: trees of mandatory, optional, or, alternative and cardinality groups with cross-tree constraints, compiled into a single formula bound to a solver.
//! - **Execution**: test cases are replayed on (featured) transition systems; non-determinism forks branches, guards accumulate into product constraints.
//! - **Coverage and selection**: structural coverage criteria and dissimilarity-based selection of diverse test suites.
//!
//! ## Quick Start
//!
//! ```rust
//! use fts_rs::execution::{Execution, TestCase};
//! use fts_rs::executor::FeaturedTransitionSystemExecutor;
//! use fts_rs::feature_model::{FeatureModelBuilder, GroupType};
//! use fts_rs::fexpr::FExpression;
//! use fts_rs::ts::{FeaturedTransitionSystemBuilder, Transition};
//!
//! // 1. A feature model: a coffee machine that optionally serves tea
//! let mut fm = FeatureModelBuilder::new();
//! let root = fm.set_root_feature("Machine").unwrap();
//! let group = fm.add_group(root, GroupType::Optional).unwrap();
//! fm.add_feature(group, "Tea").unwrap();
//! let mut fm = fm.build().unwrap();
//! assert_eq!(fm.number_of_solutions().unwrap(), 2u32.into());
//!
//! // 2. Its behaviour
//! let tea = FExpression::feature_expr("Tea");
//! let mut fts = FeaturedTransitionSystemBuilder::new("idle");
//! fts.add_transition("idle", "pay", "ready", FExpression::true_value());
//! fts.add_transition("ready", "coffee", "idle", FExpression::true_value());
//! fts.add_transition("ready", "tea", "idle", tea.clone());
//! let fts = fts.build();
//!
//! // 3. Which products can run a test case?
//! let path = [Transition::new("idle", "pay", "ready"), Transition::new("ready", "tea", "idle")];
//! let test = TestCase::new("tc1", Execution::from_transitions(path).unwrap());
//! let mut executor = FeaturedTransitionSystemExecutor::new(&fts).with_solver(fm.solver_mut());
//! assert_eq!(executor.product_constraint(&test).unwrap(), tea);
//! ```
//!
//! ## Core Components
//!
//! - **[`fexpr`]**, **[`configuration`]**: feature expressions and assignments.
//! - **[`solver`]**: the solver facade and its SAT and BDD backends, built on the BDD kernel in [`bdd`].
//! - **[`feature_model`]**: feature model construction, compilation and analyses.
//! - **[`ts`]**, **[`execution`]**, **[`executor`]**, **[`stats`]**: (featured) transition systems and their execution.
//! - **[`coverage`]**, **[`selection`]**: structural coverage and test selection.

pub mod bdd;
pub mod cache;
pub mod configuration;
pub mod coverage;
pub mod error;
pub mod execution;
pub mod executor;
pub mod feature_model;
pub mod fexpr;
pub mod paths;
pub mod reference;
pub mod sat;
pub mod selection;
pub mod solver;
pub mod stats;
pub mod table;
pub mod ts;
pub mod types;
pub mod utils;
