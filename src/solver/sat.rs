use std::collections::BTreeSet;

use log::debug;
use num_bigint::BigUint;

use crate::configuration::Configuration;
use crate::error::SolverError;
use crate::fexpr::{FExpression, Feature};
use crate::solver::cnf::{encode, Clause, Cnf, Variables};
use crate::solver::dpll;
use crate::solver::{ConstraintId, ConstraintStack, SolverFacade};
use crate::types::{Lit, Var};

/// Clause-based backend.
///
/// The base formula and every constraint are Tseitin-encoded into their own
/// clause groups. Removing a constraint drops its group; its auxiliary
/// variables stay allocated but unconstrained.
#[derive(Debug)]
pub struct SatSolver {
    base_features: BTreeSet<Feature>,
    vars: Variables,
    base: Vec<Clause>,
    constraints: ConstraintStack<Vec<Clause>>,
}

impl SatSolver {
    pub fn new(base: &FExpression) -> Self {
        let mut vars = Variables::new();
        let clauses = encode(base, &mut vars);
        debug!(
            "SAT solver: base formula over {} variables, {} clauses",
            vars.num_vars(),
            clauses.len()
        );
        Self {
            base_features: base.features(),
            vars,
            base: clauses,
            constraints: ConstraintStack::default(),
        }
    }

    fn active_clauses(&self) -> Vec<&[Lit]> {
        self.base
            .iter()
            .chain(self.constraints.payloads().flatten())
            .map(|c| c.as_slice())
            .collect()
    }

    /// Current formula, base and active constraints, as a single CNF.
    pub fn to_cnf(&self) -> Cnf {
        Cnf {
            num_vars: self.vars.num_vars(),
            clauses: self.active_clauses().into_iter().map(|c| c.to_vec()).collect(),
        }
    }

    fn universe(&self) -> Vec<(Feature, Var)> {
        self.features()
            .into_iter()
            .filter_map(|f| self.vars.get(&f).map(|v| (f, v)))
            .collect()
    }
}

impl SolverFacade for SatSolver {
    fn add_constraint(&mut self, constraint: &FExpression) -> Result<ConstraintId, SolverError> {
        let clauses = encode(constraint, &mut self.vars);
        let id = self.constraints.push(constraint.clone(), clauses);
        debug!("add_constraint({}) -> {}", constraint, id);
        Ok(id)
    }

    fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), SolverError> {
        self.constraints.remove(id)?;
        debug!("remove_constraint({})", id);
        Ok(())
    }

    fn is_satisfiable(&self) -> Result<bool, SolverError> {
        Ok(dpll::solve(self.vars.num_vars(), &self.active_clauses()).is_some())
    }

    fn solutions(&self) -> Result<Box<dyn Iterator<Item = Configuration> + '_>, SolverError> {
        Ok(Box::new(SatSolutions {
            solver: self,
            universe: self.universe(),
            blocking: Vec::new(),
            done: false,
        }))
    }

    fn number_of_solutions(&self) -> Result<BigUint, SolverError> {
        let count = self.solutions()?.count();
        Ok(BigUint::from(count))
    }

    fn reset(&mut self) -> Result<(), SolverError> {
        debug!("reset: dropping {} constraints", self.constraints.len());
        self.constraints.clear();
        Ok(())
    }

    fn features(&self) -> BTreeSet<Feature> {
        self.constraints.universe(&self.base_features)
    }
}

/// Enumeration by blocking clauses: each found model is excluded over the
/// universe variables before searching again.
struct SatSolutions<'s> {
    solver: &'s SatSolver,
    universe: Vec<(Feature, Var)>,
    blocking: Vec<Clause>,
    done: bool,
}

impl Iterator for SatSolutions<'_> {
    type Item = Configuration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut clauses = self.solver.active_clauses();
        clauses.extend(self.blocking.iter().map(|c| c.as_slice()));
        let Some(model) = dpll::solve(self.solver.vars.num_vars(), &clauses) else {
            self.done = true;
            return None;
        };

        let mut configuration = Configuration::new();
        let mut block = Vec::with_capacity(self.universe.len());
        for (feature, var) in &self.universe {
            let value = model[var.index()];
            configuration.set(feature.clone(), value);
            block.push(if value { var.neg() } else { var.pos() });
        }
        self.blocking.push(block);
        Some(configuration)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn var(name: &str) -> FExpression {
        FExpression::feature_expr(name)
    }

    #[test]
    fn test_exactly_one_of_three() {
        let (a, b, c) = (var("A"), var("B"), var("C"));
        let alternative = FExpression::any([a.clone(), b.clone(), c.clone()])
            .and(&a.not().or(&b.not()))
            .and(&a.not().or(&c.not()))
            .and(&b.not().or(&c.not()));
        let solver = SatSolver::new(&alternative);
        assert_eq!(solver.number_of_solutions().unwrap(), BigUint::from(3u32));
        for configuration in solver.solutions().unwrap() {
            assert_eq!(configuration.selected().count(), 1);
        }
    }

    #[test]
    fn test_to_cnf_tracks_constraints() {
        let mut solver = SatSolver::new(&var("A"));
        assert_eq!(solver.to_cnf().clauses.len(), 1);
        let id = solver.add_constraint(&var("B").not()).unwrap();
        assert_eq!(solver.to_cnf().to_string(), "p cnf 2 2\n1 0\n-2 0\n");
        solver.remove_constraint(id).unwrap();
        assert_eq!(solver.to_cnf().clauses.len(), 1);
    }
}
