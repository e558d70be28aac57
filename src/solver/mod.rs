//! Satisfiability, model counting and enumeration behind one interface.
//!
//! A solver is built over a base formula (usually a compiled feature model)
//! and carries a stack of transient constraints. Two interchangeable
//! backends are provided: [`SatSolver`] (Tseitin CNF + DPLL) and
//! [`BddSolver`] (the crate's BDD manager). They agree on the set of
//! configurations and on their count.
//!
//! The counting universe is the set of features of the base formula and of
//! the active constraints. Solutions are total assignments over it.
//!
//! ```
//! use fts_rs::fexpr::FExpression;
//! use fts_rs::solver::{Solver, SolverFacade, SolverType};
//!
//! let a = FExpression::feature_expr("A");
//! let b = FExpression::feature_expr("B");
//! let mut solver = Solver::new(SolverType::Bdd, &a.or(&b)).unwrap();
//! assert_eq!(solver.number_of_solutions().unwrap(), 3u32.into());
//!
//! let id = solver.add_constraint(&a.not()).unwrap();
//! assert_eq!(solver.number_of_solutions().unwrap(), 1u32.into());
//! solver.remove_constraint(id).unwrap();
//! ```

use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigUint;

use crate::bdd::BddConfig;
use crate::configuration::Configuration;
use crate::error::SolverError;
use crate::fexpr::{FExpression, Feature};

pub mod bdd;
pub mod cnf;
pub mod dpll;
pub mod sat;

pub use self::bdd::BddSolver;
pub use self::sat::SatSolver;

/// Handle of a transient constraint, returned by [`SolverFacade::add_constraint`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u64);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait SolverFacade {
    /// Conjoin `constraint` to the current formula.
    fn add_constraint(&mut self, constraint: &FExpression) -> Result<ConstraintId, SolverError>;

    /// Remove a constraint previously returned by [`add_constraint`](SolverFacade::add_constraint).
    fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), SolverError>;

    fn is_satisfiable(&self) -> Result<bool, SolverError>;

    /// Lazily enumerate all solutions over [`features`](SolverFacade::features).
    ///
    /// Each call starts a fresh enumeration of the current formula.
    fn solutions(&self) -> Result<Box<dyn Iterator<Item = Configuration> + '_>, SolverError>;

    fn number_of_solutions(&self) -> Result<BigUint, SolverError>;

    /// Drop all transient constraints.
    fn reset(&mut self) -> Result<(), SolverError>;

    /// The counting universe.
    fn features(&self) -> BTreeSet<Feature>;
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum SolverType {
    #[default]
    Sat,
    Bdd,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SolverConfig {
    /// Sizing of the BDD manager (BDD backend only).
    pub bdd: BddConfig,
    /// Maximum number of BDD nodes (BDD backend only). `None` is unbounded.
    pub node_limit: Option<usize>,
}

impl SolverConfig {
    pub fn with_bdd(mut self, bdd: BddConfig) -> Self {
        self.bdd = bdd;
        self
    }

    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = Some(limit);
        self
    }
}

/// A solver with its backend chosen at construction.
pub enum Solver {
    Sat(SatSolver),
    Bdd(BddSolver),
}

impl Solver {
    pub fn new(kind: SolverType, base: &FExpression) -> Result<Self, SolverError> {
        Self::with_config(kind, base, SolverConfig::default())
    }

    pub fn with_config(
        kind: SolverType,
        base: &FExpression,
        config: SolverConfig,
    ) -> Result<Self, SolverError> {
        Ok(match kind {
            SolverType::Sat => Solver::Sat(SatSolver::new(base)),
            SolverType::Bdd => Solver::Bdd(BddSolver::with_config(base, config)?),
        })
    }

    pub fn kind(&self) -> SolverType {
        match self {
            Solver::Sat(_) => SolverType::Sat,
            Solver::Bdd(_) => SolverType::Bdd,
        }
    }

    fn inner(&self) -> &dyn SolverFacade {
        match self {
            Solver::Sat(s) => s,
            Solver::Bdd(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SolverFacade {
        match self {
            Solver::Sat(s) => s,
            Solver::Bdd(s) => s,
        }
    }
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver")
            .field("kind", &self.kind())
            .field("features", &self.features().len())
            .finish()
    }
}

impl SolverFacade for Solver {
    fn add_constraint(&mut self, constraint: &FExpression) -> Result<ConstraintId, SolverError> {
        self.inner_mut().add_constraint(constraint)
    }

    fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), SolverError> {
        self.inner_mut().remove_constraint(id)
    }

    fn is_satisfiable(&self) -> Result<bool, SolverError> {
        self.inner().is_satisfiable()
    }

    fn solutions(&self) -> Result<Box<dyn Iterator<Item = Configuration> + '_>, SolverError> {
        self.inner().solutions()
    }

    fn number_of_solutions(&self) -> Result<BigUint, SolverError> {
        self.inner().number_of_solutions()
    }

    fn reset(&mut self) -> Result<(), SolverError> {
        self.inner_mut().reset()
    }

    fn features(&self) -> BTreeSet<Feature> {
        self.inner().features()
    }
}

/// Active transient constraints with backend-specific payload `T`.
#[derive(Debug)]
pub(crate) struct ConstraintStack<T> {
    next_id: u64,
    entries: Vec<(ConstraintId, FExpression, T)>,
}

impl<T> Default for ConstraintStack<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> ConstraintStack<T> {
    pub(crate) fn push(&mut self, expr: FExpression, payload: T) -> ConstraintId {
        let id = ConstraintId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, expr, payload));
        id
    }

    pub(crate) fn remove(&mut self, id: ConstraintId) -> Result<T, SolverError> {
        let pos = self
            .entries
            .iter()
            .position(|(i, _, _)| *i == id)
            .ok_or(SolverError::ConstraintNotFound(id))?;
        let (_, _, payload) = self.entries.remove(pos);
        Ok(payload)
    }

    /// Drop all entries. Ids keep increasing so stale handles stay invalid.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn payloads(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, _, p)| p)
    }

    /// `base` extended with the features of every active constraint.
    pub(crate) fn universe(&self, base: &BTreeSet<Feature>) -> BTreeSet<Feature> {
        let mut features = base.clone();
        for (_, expr, _) in &self.entries {
            features.extend(expr.features());
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn var(name: &str) -> FExpression {
        FExpression::feature_expr(name)
    }

    fn solvers(base: &FExpression) -> Vec<Solver> {
        vec![
            Solver::new(SolverType::Sat, base).unwrap(),
            Solver::new(SolverType::Bdd, base).unwrap(),
        ]
    }

    fn sorted_solutions(solver: &Solver) -> Vec<String> {
        let mut all: Vec<String> = solver.solutions().unwrap().map(|c| c.to_string()).collect();
        all.sort();
        all
    }

    #[test]
    fn test_backends_agree() {
        let base = var("A").or(&var("B")).and(&var("C").not().or(&var("A")));
        let [sat, bdd]: [Solver; 2] = solvers(&base).try_into().unwrap();
        assert_eq!(sat.kind(), SolverType::Sat);
        assert_eq!(bdd.kind(), SolverType::Bdd);
        assert_eq!(sat.number_of_solutions().unwrap(), bdd.number_of_solutions().unwrap());
        assert_eq!(sorted_solutions(&sat), sorted_solutions(&bdd));
        // A with any B and C, or !A && B && !C
        assert_eq!(sat.number_of_solutions().unwrap(), BigUint::from(5u32));
    }

    #[test]
    fn test_constraint_extends_universe() {
        for mut solver in solvers(&var("A")) {
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::from(1u32));
            let id = solver.add_constraint(&var("B").or(&var("C"))).unwrap();
            assert_eq!(solver.features().len(), 3);
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::from(3u32));
            solver.remove_constraint(id).unwrap();
            assert_eq!(solver.features().len(), 1);
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::from(1u32));
        }
    }

    #[test]
    fn test_remove_is_id_matched() {
        for mut solver in solvers(&var("A").or(&var("B"))) {
            let not_a = solver.add_constraint(&var("A").not()).unwrap();
            let not_b = solver.add_constraint(&var("B").not()).unwrap();
            assert!(!solver.is_satisfiable().unwrap());

            solver.remove_constraint(not_a).unwrap();
            assert!(solver.is_satisfiable().unwrap());
            assert_eq!(sorted_solutions(&solver), vec!["{A, !B}"]);

            assert_eq!(
                solver.remove_constraint(not_a),
                Err(SolverError::ConstraintNotFound(not_a))
            );
            solver.remove_constraint(not_b).unwrap();
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::from(3u32));
        }
    }

    #[test]
    fn test_reset_drops_constraints() {
        for mut solver in solvers(&var("A")) {
            let id = solver.add_constraint(&FExpression::false_value()).unwrap();
            assert!(!solver.is_satisfiable().unwrap());
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::ZERO);
            assert_eq!(solver.solutions().unwrap().count(), 0);
            solver.reset().unwrap();
            assert!(solver.is_satisfiable().unwrap());
            assert!(matches!(
                solver.remove_constraint(id),
                Err(SolverError::ConstraintNotFound(_))
            ));
        }
    }

    #[test]
    fn test_solutions_restart() {
        for solver in solvers(&var("A").or(&var("B"))) {
            assert_eq!(solver.solutions().unwrap().count(), 3);
            assert_eq!(solver.solutions().unwrap().count(), 3);
        }
    }

    #[test]
    fn test_constant_base() {
        for solver in solvers(&FExpression::true_value()) {
            assert!(solver.features().is_empty());
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::from(1u32));
            assert_eq!(solver.solutions().unwrap().collect::<Vec<_>>(), vec![Configuration::new()]);
        }
        for solver in solvers(&FExpression::false_value()) {
            assert!(!solver.is_satisfiable().unwrap());
            assert_eq!(solver.number_of_solutions().unwrap(), BigUint::ZERO);
        }
    }
}
