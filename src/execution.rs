//! Executions, test cases and test sets.

use std::fmt;

use crate::error::ExecutionError;
use crate::ts::{Action, State, Transition};

/// A contiguous sequence of transitions. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Execution {
    transitions: Vec<Transition>,
}

impl Execution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transitions(transitions: impl IntoIterator<Item = Transition>) -> Result<Self, ExecutionError> {
        let mut execution = Self::new();
        for t in transitions {
            execution.enqueue(t)?;
        }
        Ok(execution)
    }

    /// Append `transition`, which must start where the execution ends.
    pub fn enqueue(&mut self, transition: Transition) -> Result<(), ExecutionError> {
        if let Some(last) = self.transitions.last() {
            if last.target != transition.source {
                return Err(ExecutionError::Discontiguous {
                    expected: last.target.clone(),
                    found: transition.source,
                });
            }
        }
        self.transitions.push(transition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn first(&self) -> Option<&Transition> {
        self.transitions.first()
    }

    pub fn last(&self) -> Option<&Transition> {
        self.transitions.last()
    }

    /// The state reached after the last transition, `None` for an empty execution.
    pub fn end_state(&self) -> Option<&State> {
        self.last().map(|t| &t.target)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.transitions.iter()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.transitions.iter().map(|t| &t.action)
    }
}

impl<'a> IntoIterator for &'a Execution {
    type Item = &'a Transition;
    type IntoIter = std::slice::Iter<'a, Transition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.transitions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "]")
    }
}

/// An identified execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCase {
    id: String,
    execution: Execution,
}

impl TestCase {
    pub fn new(id: impl Into<String>, execution: Execution) -> Self {
        Self {
            id: id.into(),
            execution,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn len(&self) -> usize {
        self.execution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.execution.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.execution.actions()
    }
}

impl<'a> IntoIterator for &'a TestCase {
    type Item = &'a Transition;
    type IntoIter = std::slice::Iter<'a, Transition>;

    fn into_iter(self) -> Self::IntoIter {
        self.execution.iter()
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.execution)
    }
}

/// An ordered collection of test cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSet {
    test_cases: Vec<TestCase>,
}

impl TestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, test_case: TestCase) {
        self.test_cases.push(test_case);
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|tc| tc.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.test_cases.iter()
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }
}

impl FromIterator<TestCase> for TestSet {
    fn from_iter<I: IntoIterator<Item = TestCase>>(iter: I) -> Self {
        Self {
            test_cases: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TestSet {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for TestSet {
    type Item = TestCase;
    type IntoIter = std::vec::IntoIter<TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.test_cases.into_iter()
    }
}
