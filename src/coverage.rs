//! Structural coverage of transition systems by executions and test suites.
//!
//! A [`CoverageCriterion`] names the elements of a system that should be
//! exercised (states, actions, transitions, consecutive transition pairs) and
//! which of them a single execution exercises. [`StructuralCoverage`] binds a
//! criterion to an executor and reports covered/to-cover ratios.
//!
//! The ratio over an empty set of elements to cover is `0.0`.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use log::trace;

use crate::error::CoverageError;
use crate::execution::{Execution, TestCase, TestSet};
use crate::executor::Executor;
use crate::ts::{Action, State, Transition, TransitionSystem};

pub trait CoverageCriterion {
    type Element: Clone + Eq + Hash + fmt::Debug;

    fn elements_to_cover(&self, ts: &TransitionSystem) -> HashSet<Self::Element>;

    fn covered_elements(&self, execution: &Execution) -> HashSet<Self::Element>;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct ActionCoverage;

impl CoverageCriterion for ActionCoverage {
    type Element = Action;

    fn elements_to_cover(&self, ts: &TransitionSystem) -> HashSet<Action> {
        ts.actions().iter().cloned().collect()
    }

    fn covered_elements(&self, execution: &Execution) -> HashSet<Action> {
        execution.actions().cloned().collect()
    }
}

/// States visited by an execution. The empty execution visits none.
#[derive(Debug, Copy, Clone, Default)]
pub struct StateCoverage;

impl CoverageCriterion for StateCoverage {
    type Element = State;

    fn elements_to_cover(&self, ts: &TransitionSystem) -> HashSet<State> {
        ts.states().iter().cloned().collect()
    }

    fn covered_elements(&self, execution: &Execution) -> HashSet<State> {
        execution
            .iter()
            .flat_map(|t| [t.source.clone(), t.target.clone()])
            .collect()
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct TransitionCoverage;

impl CoverageCriterion for TransitionCoverage {
    type Element = Transition;

    fn elements_to_cover(&self, ts: &TransitionSystem) -> HashSet<Transition> {
        ts.transitions().iter().cloned().collect()
    }

    fn covered_elements(&self, execution: &Execution) -> HashSet<Transition> {
        execution.iter().cloned().collect()
    }
}

/// Two transitions fired one right after the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionPair {
    pub first: Transition,
    pub second: Transition,
}

impl fmt::Display for TransitionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}; {})", self.first, self.second)
    }
}

/// Every (incoming, outgoing) pair of every state must be fired in sequence.
#[derive(Debug, Copy, Clone, Default)]
pub struct TransitionPairCoverage;

impl CoverageCriterion for TransitionPairCoverage {
    type Element = TransitionPair;

    fn elements_to_cover(&self, ts: &TransitionSystem) -> HashSet<TransitionPair> {
        let mut pairs = HashSet::new();
        for state in ts.states() {
            for first in ts.incoming(state) {
                for second in ts.outgoing(state) {
                    pairs.insert(TransitionPair {
                        first: first.clone(),
                        second: second.clone(),
                    });
                }
            }
        }
        pairs
    }

    fn covered_elements(&self, execution: &Execution) -> HashSet<TransitionPair> {
        execution
            .transitions()
            .windows(2)
            .map(|w| TransitionPair {
                first: w[0].clone(),
                second: w[1].clone(),
            })
            .collect()
    }
}

/// A coverage criterion bound to an executor of the system under test.
pub struct StructuralCoverage<C: CoverageCriterion, E> {
    criterion: C,
    executor: E,
    elements_to_cover: HashSet<C::Element>,
}

impl<C, E> StructuralCoverage<C, E>
where
    C: CoverageCriterion,
    E: Executor,
{
    pub fn new(criterion: C, executor: E) -> Self {
        let elements_to_cover = criterion.elements_to_cover(executor.system());
        trace!("{} elements to cover", elements_to_cover.len());
        Self {
            criterion,
            executor,
            elements_to_cover,
        }
    }

    pub fn criterion(&self) -> &C {
        &self.criterion
    }

    pub fn elements_to_cover(&self) -> &HashSet<C::Element> {
        &self.elements_to_cover
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    fn ratio(&self, covered: &HashSet<C::Element>) -> f64 {
        if self.elements_to_cover.is_empty() {
            return 0.0;
        }
        let hit = covered.intersection(&self.elements_to_cover).count();
        hit as f64 / self.elements_to_cover.len() as f64
    }

    pub fn coverage_of_execution(&self, execution: &Execution) -> f64 {
        self.ratio(&self.criterion.covered_elements(execution))
    }

    /// Coverage of the union of `executions`. Nothing is re-executed.
    pub fn coverage_of_executions<'a>(&self, executions: impl IntoIterator<Item = &'a Execution>) -> f64 {
        let mut covered = HashSet::new();
        for execution in executions {
            covered.extend(self.criterion.covered_elements(execution));
        }
        self.ratio(&covered)
    }

    /// Elements covered by any branch of `test_case` executed from the initial state.
    pub fn covered_by_test_case(&mut self, test_case: &TestCase) -> Result<HashSet<C::Element>, CoverageError> {
        self.executor.reset();
        self.executor.execute_test_case(test_case)?;
        let mut covered = HashSet::new();
        for execution in self.executor.current_executions() {
            covered.extend(self.criterion.covered_elements(execution));
        }
        trace!("{} covers {} elements", test_case.id(), covered.len());
        Ok(covered)
    }

    pub fn coverage_of_test_case(&mut self, test_case: &TestCase) -> Result<f64, CoverageError> {
        let covered = self.covered_by_test_case(test_case)?;
        Ok(self.ratio(&covered))
    }

    pub fn coverage_of_test_set(&mut self, test_set: &TestSet) -> Result<f64, CoverageError> {
        let mut covered = HashSet::new();
        for test_case in test_set {
            covered.extend(self.covered_by_test_case(test_case)?);
        }
        Ok(self.ratio(&covered))
    }
}
