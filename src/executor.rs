//! Step-wise execution of action sequences on (featured) transition systems.
//!
//! An executor tracks a set of branches. Each step extends every branch with
//! the outgoing transitions of its current state that carry the requested
//! action: a branch with no such transition dies, a branch with several forks.
//! A step that would kill every branch fails and leaves the executor as it
//! was before the step.

use log::{debug, trace, warn};

use crate::error::{ExecutionError, SolverError};
use crate::execution::{Execution, TestCase};
use crate::fexpr::FExpression;
use crate::solver::SolverFacade;
use crate::ts::{Action, FeaturedTransitionSystem, State, TransitionSystem};

pub trait Executor {
    /// The system the executor runs on.
    fn system(&self) -> &TransitionSystem;

    /// Drop all branches and restart from the initial state.
    fn reset(&mut self);

    fn execute_action(&mut self, action: &Action) -> Result<(), ExecutionError>;

    fn execute<'a, I>(&mut self, actions: I) -> Result<(), ExecutionError>
    where
        I: IntoIterator<Item = &'a Action>,
        Self: Sized,
    {
        for action in actions {
            self.execute_action(action)?;
        }
        Ok(())
    }

    /// Execute the actions of `test_case`, continuing from the current branches.
    fn execute_test_case(&mut self, test_case: &TestCase) -> Result<(), ExecutionError>
    where
        Self: Sized,
    {
        self.execute(test_case.actions())
    }

    /// The executions of all live branches.
    fn current_executions(&self) -> impl Iterator<Item = &Execution>;
}

fn current_state<'a>(ts: &'a TransitionSystem, execution: &'a Execution) -> &'a State {
    execution.end_state().unwrap_or(ts.initial_state())
}

pub struct TransitionSystemExecutor<'a> {
    ts: &'a TransitionSystem,
    branches: Vec<Execution>,
    steps: usize,
}

impl<'a> TransitionSystemExecutor<'a> {
    pub fn new(ts: &'a TransitionSystem) -> Self {
        Self {
            ts,
            branches: vec![Execution::new()],
            steps: 0,
        }
    }
}

impl Executor for TransitionSystemExecutor<'_> {
    fn system(&self) -> &TransitionSystem {
        self.ts
    }

    fn reset(&mut self) {
        self.branches = vec![Execution::new()];
        self.steps = 0;
    }

    fn execute_action(&mut self, action: &Action) -> Result<(), ExecutionError> {
        let mut next = Vec::new();
        for branch in &self.branches {
            for t in self.ts.outgoing_with(current_state(self.ts, branch), action) {
                let mut execution = branch.clone();
                execution.enqueue(t.clone())?;
                next.push(execution);
            }
        }
        if next.is_empty() {
            debug!("step {}: no branch can execute {}", self.steps, action);
            return Err(ExecutionError::NoMatchingTransition {
                action: action.clone(),
                step: self.steps,
            });
        }
        trace!("step {}: {} -> {} branches", self.steps, action, next.len());
        self.branches = next;
        self.steps += 1;
        Ok(())
    }

    fn current_executions(&self) -> impl Iterator<Item = &Execution> {
        self.branches.iter()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Simplify and prune branch constraints every this many steps. `0` disables pruning.
    pub simplify_every: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { simplify_every: 1 }
    }
}

impl ExecutorConfig {
    pub fn with_simplify_every(mut self, steps: usize) -> Self {
        self.simplify_every = steps;
        self
    }
}

#[derive(Debug, Clone)]
struct Branch {
    execution: Execution,
    /// Conjunction of the guards along `execution`.
    constraint: FExpression,
}

impl Branch {
    fn initial() -> Self {
        Self {
            execution: Execution::new(),
            constraint: FExpression::true_value(),
        }
    }
}

/// Executor for featured transition systems.
///
/// Every branch carries the product constraint of its path. Branches whose
/// constraint simplifies to `false`, or that the attached solver reports
/// unsatisfiable, are pruned.
pub struct FeaturedTransitionSystemExecutor<'a> {
    fts: &'a FeaturedTransitionSystem,
    solver: Option<&'a mut dyn SolverFacade>,
    config: ExecutorConfig,
    branches: Vec<Branch>,
    steps: usize,
}

impl<'a> FeaturedTransitionSystemExecutor<'a> {
    pub fn new(fts: &'a FeaturedTransitionSystem) -> Self {
        Self::with_config(fts, ExecutorConfig::default())
    }

    pub fn with_config(fts: &'a FeaturedTransitionSystem, config: ExecutorConfig) -> Self {
        Self {
            fts,
            solver: None,
            config,
            branches: vec![Branch::initial()],
            steps: 0,
        }
    }

    /// Prune branches whose constraint is inconsistent with `solver`'s formula.
    pub fn with_solver(mut self, solver: &'a mut dyn SolverFacade) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Live branches with their product constraints.
    pub fn current_featured_executions(&self) -> impl Iterator<Item = (&Execution, &FExpression)> {
        self.branches.iter().map(|b| (&b.execution, &b.constraint))
    }

    /// Products able to execute `test_case`: the disjunction of the
    /// constraints of the branches surviving it.
    pub fn product_constraint(&mut self, test_case: &TestCase) -> Result<FExpression, ExecutionError> {
        self.reset();
        self.execute_test_case(test_case)?;
        let constraint = FExpression::any(self.branches.iter().map(|b| b.constraint.clone()));
        Ok(constraint.apply_simplification())
    }

    fn prune(&mut self, branches: Vec<Branch>) -> Vec<Branch> {
        let mut kept = Vec::with_capacity(branches.len());
        for mut branch in branches {
            branch.constraint = branch.constraint.apply_simplification();
            if branch.constraint.is_false() {
                trace!("pruned {}: guards are contradictory", branch.execution);
                continue;
            }
            if let Some(solver) = self.solver.as_deref_mut() {
                match is_consistent(solver, &branch.constraint) {
                    Ok(true) => {}
                    Ok(false) => {
                        trace!("pruned {}: no product satisfies {}", branch.execution, branch.constraint);
                        continue;
                    }
                    Err(e) => warn!("keeping {} unchecked: {}", branch.execution, e),
                }
            }
            kept.push(branch);
        }
        kept
    }
}

fn is_consistent(solver: &mut dyn SolverFacade, constraint: &FExpression) -> Result<bool, SolverError> {
    let id = solver.add_constraint(constraint)?;
    let satisfiable = solver.is_satisfiable();
    solver.remove_constraint(id)?;
    satisfiable
}

impl Executor for FeaturedTransitionSystemExecutor<'_> {
    fn system(&self) -> &TransitionSystem {
        self.fts.ts()
    }

    fn reset(&mut self) {
        self.branches = vec![Branch::initial()];
        self.steps = 0;
    }

    fn execute_action(&mut self, action: &Action) -> Result<(), ExecutionError> {
        let ts = self.fts.ts();
        let mut next = Vec::new();
        for branch in &self.branches {
            for t in ts.outgoing_with(current_state(ts, &branch.execution), action) {
                let mut execution = branch.execution.clone();
                execution.enqueue(t.clone())?;
                let mut constraint = branch.constraint.clone();
                let guard = self.fts.guard(t);
                if !guard.is_true() {
                    constraint.and_with(guard);
                }
                next.push(Branch { execution, constraint });
            }
        }

        let step = self.steps + 1;
        if self.config.simplify_every > 0 && step % self.config.simplify_every == 0 {
            next = self.prune(next);
        }
        if next.is_empty() {
            debug!("step {}: no product can execute {}", self.steps, action);
            return Err(ExecutionError::NoMatchingTransition {
                action: action.clone(),
                step: self.steps,
            });
        }
        trace!("step {}: {} -> {} branches", self.steps, action, next.len());
        self.branches = next;
        self.steps = step;
        Ok(())
    }

    fn current_executions(&self) -> impl Iterator<Item = &Execution> {
        self.branches.iter().map(|b| &b.execution)
    }
}
