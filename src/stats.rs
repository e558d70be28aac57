//! Structural statistics of a transition system.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::ts::{State, TransitionSystem};

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSystemStats {
    pub states: usize,
    pub actions: usize,
    pub transitions: usize,
    /// Transitions per state.
    pub average_degree: f64,
    /// Largest breadth-first distance from the initial state.
    pub bfs_height: usize,
    /// Transitions going to a state of a strictly lower BFS level.
    pub back_level_transitions: usize,
    /// States not reachable from the initial state.
    pub unreachable_states: usize,
}

/// BFS level of every state reachable from the initial state.
pub fn bfs_levels(ts: &TransitionSystem) -> HashMap<&State, usize> {
    let mut levels = HashMap::new();
    let mut queue = VecDeque::new();
    levels.insert(ts.initial_state(), 0);
    queue.push_back(ts.initial_state());
    while let Some(state) = queue.pop_front() {
        let level = levels[state];
        for t in ts.outgoing(state) {
            if !levels.contains_key(&t.target) {
                levels.insert(&t.target, level + 1);
                queue.push_back(&t.target);
            }
        }
    }
    levels
}

impl TransitionSystemStats {
    pub fn compute(ts: &TransitionSystem) -> Self {
        let levels = bfs_levels(ts);
        let bfs_height = levels.values().copied().max().unwrap_or(0);
        let back_level_transitions = ts
            .transitions()
            .iter()
            .filter(|t| match (levels.get(&t.source), levels.get(&t.target)) {
                (Some(source), Some(target)) => source > target,
                _ => false,
            })
            .count();

        Self {
            states: ts.state_count(),
            actions: ts.action_count(),
            transitions: ts.transition_count(),
            average_degree: ts.transition_count() as f64 / ts.state_count() as f64,
            bfs_height,
            back_level_transitions,
            unreachable_states: ts.state_count() - levels.len(),
        }
    }
}

impl fmt::Display for TransitionSystemStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "states = {}", self.states)?;
        writeln!(f, "actions = {}", self.actions)?;
        writeln!(f, "transitions = {}", self.transitions)?;
        writeln!(f, "average degree = {:.3}", self.average_degree)?;
        writeln!(f, "bfs height = {}", self.bfs_height)?;
        writeln!(f, "back-level transitions = {}", self.back_level_transitions)?;
        write!(f, "unreachable states = {}", self.unreachable_states)
    }
}
