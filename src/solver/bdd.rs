use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::configuration::Configuration;
use crate::error::SolverError;
use crate::fexpr::{FExpression, Feature, Layer};
use crate::reference::Ref;
use crate::solver::{ConstraintId, ConstraintStack, SolverConfig, SolverFacade};
use crate::types::Var;

/// Decision-diagram backend.
///
/// Features get BDD variables in order of first appearance. The root is the
/// conjunction of the base formula and the active constraints; removing a
/// constraint recomputes it from the remaining ones.
pub struct BddSolver {
    bdd: Bdd,
    config: SolverConfig,
    base_expr: FExpression,
    base_features: BTreeSet<Feature>,
    vars: BTreeMap<Feature, Var>,
    base: Ref,
    constraints: ConstraintStack<Ref>,
    root: Ref,
}

fn compile(bdd: &Bdd, vars: &mut BTreeMap<Feature, Var>, expr: &FExpression) -> Ref {
    expr.fold(&mut |layer| match layer {
        Layer::Constant(true) => bdd.one(),
        Layer::Constant(false) => bdd.zero(),
        Layer::Variable(f) => {
            let next = Var::new(vars.len() as u32 + 1);
            let v = *vars.entry(f.clone()).or_insert(next);
            bdd.mk_var(v.id())
        }
        Layer::Not(r) => bdd.apply_not(r),
        Layer::And(rs) => bdd.apply_and_many(rs),
        Layer::Or(rs) => bdd.apply_or_many(rs),
    })
}

impl BddSolver {
    pub fn new(base: &FExpression) -> Result<Self, SolverError> {
        Self::with_config(base, SolverConfig::default())
    }

    pub fn with_config(base: &FExpression, config: SolverConfig) -> Result<Self, SolverError> {
        let bdd = Bdd::with_config(config.bdd);
        let mut vars = BTreeMap::new();
        let root = compile(&bdd, &mut vars, base);

        let solver = Self {
            bdd,
            config,
            base_expr: base.clone(),
            base_features: base.features(),
            vars,
            base: root,
            constraints: ConstraintStack::default(),
            root,
        };
        solver
            .check_limit()
            .map_err(SolverError::Initialization)?;
        debug!(
            "BDD solver: base formula over {} variables, {} nodes",
            solver.vars.len(),
            solver.bdd.size(root)
        );
        Ok(solver)
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    /// The BDD of the current formula.
    pub fn root(&self) -> Ref {
        self.root
    }

    fn check_limit(&self) -> Result<(), String> {
        match self.config.node_limit {
            Some(limit) if self.bdd.num_nodes() > limit => {
                warn!("BDD node limit exceeded: {} > {}", self.bdd.num_nodes(), limit);
                Err(format!(
                    "BDD node limit of {} exceeded ({} nodes)",
                    limit,
                    self.bdd.num_nodes()
                ))
            }
            _ => Ok(()),
        }
    }

    fn universe(&self) -> Vec<(Feature, Var)> {
        self.features()
            .into_iter()
            .filter_map(|f| self.vars.get(&f).map(|&v| (f, v)))
            .collect()
    }
}

impl SolverFacade for BddSolver {
    fn add_constraint(&mut self, constraint: &FExpression) -> Result<ConstraintId, SolverError> {
        let mut vars = self.vars.clone();
        let c = compile(&self.bdd, &mut vars, constraint);
        let root = self.bdd.apply_and(self.root, c);
        self.check_limit().map_err(SolverError::Initialization)?;

        self.vars = vars;
        self.root = root;
        let id = self.constraints.push(constraint.clone(), c);
        debug!("add_constraint({}) -> {}", constraint, id);
        Ok(id)
    }

    fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), SolverError> {
        self.constraints.remove(id)?;
        let remaining: Vec<Ref> = self.constraints.payloads().copied().collect();
        self.root = self.bdd.apply_and_many(std::iter::once(self.base).chain(remaining));
        self.check_limit().map_err(SolverError::Fatal)?;
        debug!("remove_constraint({})", id);
        Ok(())
    }

    fn is_satisfiable(&self) -> Result<bool, SolverError> {
        Ok(!self.bdd.is_zero(self.root))
    }

    fn solutions(&self) -> Result<Box<dyn Iterator<Item = Configuration> + '_>, SolverError> {
        let universe = self.universe();
        let by_var: BTreeMap<Var, Feature> = universe.iter().map(|(f, v)| (*v, f.clone())).collect();
        let vars: Vec<Var> = universe.iter().map(|(_, v)| *v).collect();
        Ok(Box::new(self.bdd.models(self.root, &vars).map(move |model| {
            model
                .into_iter()
                .filter_map(|lit| by_var.get(&lit.var()).map(|f| (f.clone(), lit.is_positive())))
                .collect()
        })))
    }

    fn number_of_solutions(&self) -> Result<BigUint, SolverError> {
        // Variables registered for removed constraints are free in the root
        // and must not be counted.
        let registered = self.vars.len();
        let universe = self.universe().len();
        Ok(self.bdd.sat_count(self.root, registered) >> (registered - universe))
    }

    fn reset(&mut self) -> Result<(), SolverError> {
        debug!("reset: dropping {} constraints", self.constraints.len());
        let bdd = Bdd::with_config(self.config.bdd);
        let mut vars = BTreeMap::new();
        let base = compile(&bdd, &mut vars, &self.base_expr);
        self.bdd = bdd;
        self.vars = vars;
        self.base = base;
        self.root = base;
        self.constraints.clear();
        self.check_limit().map_err(SolverError::Fatal)
    }

    fn features(&self) -> BTreeSet<Feature> {
        self.constraints.universe(&self.base_features)
    }
}
