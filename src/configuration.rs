//! Feature assignments and solver-backed sets of them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use num_bigint::BigUint;

use crate::error::SolverError;
use crate::fexpr::{FExpression, Feature};
use crate::solver::SolverFacade;

/// A total or partial assignment of features to boolean values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Configuration {
    values: BTreeMap<Feature, bool>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: impl Into<Feature>, value: bool) -> Self {
        self.set(feature, value);
        self
    }

    pub fn set(&mut self, feature: impl Into<Feature>, value: bool) {
        self.values.insert(feature.into(), value);
    }

    pub fn get(&self, feature: &Feature) -> Option<bool> {
        self.values.get(feature).copied()
    }

    pub fn is_selected(&self, feature: &Feature) -> bool {
        self.get(feature) == Some(true)
    }

    /// Features assigned `true`, in name order.
    pub fn selected(&self) -> impl Iterator<Item = &Feature> {
        self.values.iter().filter(|(_, &v)| v).map(|(f, _)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Feature, bool)> {
        self.values.iter().map(|(f, &v)| (f, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The conjunction of literals fixing every assigned feature.
    pub fn to_expression(&self) -> FExpression {
        FExpression::all(self.values.iter().map(|(f, &v)| {
            let var = FExpression::feature_expr(f.clone());
            if v {
                var
            } else {
                var.not()
            }
        }))
    }
}

impl FromIterator<(Feature, bool)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (Feature, bool)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (feature, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if !value {
                write!(f, "!")?;
            }
            write!(f, "{}", feature)?;
        }
        write!(f, "}}")
    }
}

/// The configurations of a solver's formula that also satisfy an extra constraint.
///
/// Nothing is materialized: every query pushes the constraint onto the solver,
/// asks, and pops it again, so the solver is left as it was found.
pub struct ConfigurationSet<'s> {
    solver: &'s mut dyn SolverFacade,
    constraint: FExpression,
}

impl<'s> ConfigurationSet<'s> {
    pub fn new(solver: &'s mut dyn SolverFacade, constraint: FExpression) -> Self {
        Self { solver, constraint }
    }

    pub fn constraint(&self) -> &FExpression {
        &self.constraint
    }

    fn with_constraint<T>(
        &mut self,
        extra: Option<&FExpression>,
        query: impl FnOnce(&dyn SolverFacade) -> Result<T, SolverError>,
    ) -> Result<T, SolverError> {
        let expr = match extra {
            Some(e) => self.constraint.and(e),
            None => self.constraint.clone(),
        };
        let id = self.solver.add_constraint(&expr)?;
        let res = query(&*self.solver);
        self.solver.remove_constraint(id)?;
        res
    }

    pub fn size(&mut self) -> Result<BigUint, SolverError> {
        let size = self.with_constraint(None, |s| s.number_of_solutions())?;
        debug!("|{{{}}}| = {}", self.constraint, size);
        Ok(size)
    }

    /// Size of the set counted over the solver's features and `features`.
    ///
    /// Features absent from both the solver and the constraint count as free.
    /// Sizes of two sets are only comparable when counted over the same features.
    pub fn size_over(&mut self, features: &BTreeSet<Feature>) -> Result<BigUint, SolverError> {
        let frame = FExpression::all(features.iter().map(|f| {
            let x = FExpression::from(f.clone());
            x.or(&x.not())
        }));
        let size = self.with_constraint(Some(&frame), |s| s.number_of_solutions())?;
        debug!("|{{{}}}| over {} extra features = {}", self.constraint, features.len(), size);
        Ok(size)
    }

    pub fn is_empty(&mut self) -> Result<bool, SolverError> {
        Ok(!self.with_constraint(None, |s| s.is_satisfiable())?)
    }

    /// Whether `configuration` can be extended to a member of the set.
    ///
    /// For a total configuration this is plain membership.
    pub fn contains(&mut self, configuration: &Configuration) -> Result<bool, SolverError> {
        let cube = configuration.to_expression();
        self.with_constraint(Some(&cube), |s| s.is_satisfiable())
    }

    pub fn configurations(&mut self) -> Result<Vec<Configuration>, SolverError> {
        self.with_constraint(None, |s| Ok(s.solutions()?.collect()))
    }
}
