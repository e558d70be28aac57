//! A small DPLL engine: unit propagation and chronological backtracking.
//!
//! Decisions try `false` first and are flipped on conflict. Propagation uses
//! two watched literals per clause, so an assignment only visits the clauses
//! watching the literal it falsifies, and backtracking leaves the watches
//! untouched. There is no clause learning: hard instances are searched
//! exhaustively, which suits the formulas produced by feature models and
//! test constraints but not industrial SAT benchmarks.

use log::debug;

use crate::types::{Lit, Var};

#[derive(Debug, Copy, Clone)]
struct TrailEntry {
    var: Var,
    /// A decision whose other polarity has not been tried yet.
    decision: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Propagation {
    Fixpoint,
    Conflict,
}

/// Index of `lit` in the watch lists.
fn code(lit: Lit) -> usize {
    2 * lit.var().index() + usize::from(lit.is_negative())
}

pub struct Dpll<'a> {
    clauses: &'a [&'a [Lit]],
    /// Positions of the two watched literals in each clause.
    watched: Vec<[usize; 2]>,
    /// Clauses watching each literal, see [`code`].
    watches: Vec<Vec<usize>>,
    units: Vec<Lit>,
    has_empty_clause: bool,
    values: Vec<Option<bool>>,
    trail: Vec<TrailEntry>,
    /// Trail entries before this one have been propagated.
    queue_head: usize,
    decisions: usize,
    conflicts: usize,
}

impl<'a> Dpll<'a> {
    pub fn new(num_vars: usize, clauses: &'a [&'a [Lit]]) -> Self {
        let mut watches = vec![Vec::new(); 2 * num_vars];
        let mut units = Vec::new();
        let mut has_empty_clause = false;
        for (i, clause) in clauses.iter().enumerate() {
            match clause {
                [] => has_empty_clause = true,
                [unit] => units.push(*unit),
                [first, second, ..] => {
                    watches[code(*first)].push(i);
                    watches[code(*second)].push(i);
                }
            }
        }
        Self {
            clauses,
            watched: vec![[0, 1]; clauses.len()],
            watches,
            units,
            has_empty_clause,
            values: vec![None; num_vars],
            trail: Vec::new(),
            queue_head: 0,
            decisions: 0,
            conflicts: 0,
        }
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.var().index()].map(|v| v == lit.is_positive())
    }

    fn assign(&mut self, lit: Lit, decision: bool) {
        self.values[lit.var().index()] = Some(lit.is_positive());
        self.trail.push(TrailEntry {
            var: lit.var(),
            decision,
        });
    }

    fn propagate(&mut self) -> Propagation {
        while self.queue_head < self.trail.len() {
            let var = self.trail[self.queue_head].var;
            self.queue_head += 1;
            let falsified = match self.values[var.index()] {
                Some(true) => var.neg(),
                _ => var.pos(),
            };
            let mut watchers = std::mem::take(&mut self.watches[code(falsified)]);
            let mut i = 0;
            let mut conflict = false;
            while i < watchers.len() {
                let c = watchers[i];
                let clause = self.clauses[c];
                let [w0, w1] = self.watched[c];
                let slot = usize::from(clause[w0] != falsified);
                let other = clause[if slot == 0 { w1 } else { w0 }];
                if self.value(other) == Some(true) {
                    i += 1;
                    continue;
                }
                let replacement =
                    (0..clause.len()).find(|&k| k != w0 && k != w1 && self.value(clause[k]) != Some(false));
                if let Some(k) = replacement {
                    self.watched[c][slot] = k;
                    self.watches[code(clause[k])].push(c);
                    watchers.swap_remove(i);
                    continue;
                }
                i += 1;
                if self.value(other).is_none() {
                    self.assign(other, false);
                } else {
                    conflict = true;
                    break;
                }
            }
            // A replacement watch is never the falsified literal, so the list is still empty.
            self.watches[code(falsified)] = watchers;
            if conflict {
                return Propagation::Conflict;
            }
        }
        Propagation::Fixpoint
    }

    /// Undo assignments up to the latest open decision and flip it.
    fn backtrack(&mut self) -> bool {
        while let Some(entry) = self.trail.pop() {
            let value = self.values[entry.var.index()];
            self.values[entry.var.index()] = None;
            if entry.decision {
                self.queue_head = self.trail.len();
                let flipped = match value {
                    Some(true) => entry.var.neg(),
                    _ => entry.var.pos(),
                };
                self.assign(flipped, false);
                return true;
            }
        }
        false
    }

    /// Search for a model. Returns the value of every variable, or `None` if unsatisfiable.
    pub fn solve(mut self) -> Option<Vec<bool>> {
        if self.has_empty_clause {
            debug!("UNSAT: empty clause");
            return None;
        }
        for lit in std::mem::take(&mut self.units) {
            match self.value(lit) {
                Some(true) => {}
                Some(false) => {
                    debug!("UNSAT: conflicting unit clauses on {}", lit.var());
                    return None;
                }
                None => self.assign(lit, false),
            }
        }
        loop {
            if self.propagate() == Propagation::Conflict {
                self.conflicts += 1;
                if !self.backtrack() {
                    debug!(
                        "UNSAT after {} decisions, {} conflicts",
                        self.decisions, self.conflicts
                    );
                    return None;
                }
                continue;
            }
            match self.values.iter().position(Option::is_none) {
                Some(i) => {
                    self.decisions += 1;
                    self.assign(Var::new(i as u32 + 1).neg(), true);
                }
                None => {
                    debug!(
                        "SAT after {} decisions, {} conflicts",
                        self.decisions, self.conflicts
                    );
                    return Some(self.values.iter().map(|v| v.unwrap_or(false)).collect());
                }
            }
        }
    }
}

/// Convenience wrapper around [`Dpll`].
pub fn solve(num_vars: usize, clauses: &[&[Lit]]) -> Option<Vec<bool>> {
    Dpll::new(num_vars, clauses).solve()
}
