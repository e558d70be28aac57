//! Iterators over the satisfying assignments of a BDD.
//!
//! [`BddPaths`] yields the paths to ONE as partial assignments: a variable
//! skipped on a path is a don't-care. [`BddModels`] expands those don't-cares
//! over a fixed list of variables and yields total assignments, each one
//! exactly once.
//!
//! The number of paths can be exponential in the number of variables.

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::{Lit, Var};

impl Bdd {
    /// Returns an iterator over all paths to ONE.
    ///
    /// ```
    /// use fts_rs::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let f = bdd.apply_or(bdd.mk_var(1), bdd.mk_var(2));
    /// // {x1} and {~x1, x2}
    /// assert_eq!(bdd.paths(f).count(), 2);
    /// ```
    pub fn paths(&self, f: Ref) -> BddPaths<'_> {
        BddPaths::new(self, f)
    }

    /// Returns an iterator over all total assignments of `vars` satisfying `f`.
    ///
    /// Every variable `f` depends on must be listed in `vars`.
    ///
    /// ```
    /// use fts_rs::bdd::Bdd;
    /// use fts_rs::types::Var;
    ///
    /// let bdd = Bdd::default();
    /// let f = bdd.apply_or(bdd.mk_var(1), bdd.mk_var(2));
    /// let vars = [Var::new(1), Var::new(2)];
    /// assert_eq!(bdd.models(f, &vars).count(), 3);
    /// ```
    pub fn models<'a>(&'a self, f: Ref, vars: &[Var]) -> BddModels<'a> {
        BddModels::new(self, f, vars)
    }
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    High,
    Low,
}

#[derive(Debug)]
struct StackFrame {
    node: Ref,
    /// Which branch to explore next, `None` once both are done.
    next_branch: Option<Branch>,
}

/// An iterator over satisfying paths in a BDD.
///
/// Created by [`Bdd::paths()`]. Depth-first traversal with backtracking: the
/// current path is a single vector that grows and shrinks with the stack.
pub struct BddPaths<'a> {
    bdd: &'a Bdd,
    stack: Vec<StackFrame>,
    current_path: Vec<Lit>,
}

impl<'a> BddPaths<'a> {
    pub fn new(bdd: &'a Bdd, f: Ref) -> Self {
        BddPaths {
            bdd,
            stack: vec![StackFrame {
                node: f,
                next_branch: Some(Branch::High),
            }],
            current_path: Vec::new(),
        }
    }

    fn backtrack(&mut self) {
        self.stack.pop();
        // Pop the literal that led here, unless we are at the root
        if !self.stack.is_empty() {
            self.current_path.pop();
        }
    }
}

impl Iterator for BddPaths<'_> {
    type Item = Vec<Lit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;

            if self.bdd.is_one(node) {
                let result = self.current_path.clone();
                self.backtrack();
                return Some(result);
            }
            if self.bdd.is_zero(node) {
                self.backtrack();
                continue;
            }

            let var = Var::new(self.bdd.variable(node.index()));
            match frame.next_branch {
                Some(Branch::High) => {
                    frame.next_branch = Some(Branch::Low);
                    self.current_path.push(var.pos());
                    self.stack.push(StackFrame {
                        node: self.bdd.high_node(node),
                        next_branch: Some(Branch::High),
                    });
                }
                Some(Branch::Low) => {
                    frame.next_branch = None;
                    self.current_path.push(var.neg());
                    self.stack.push(StackFrame {
                        node: self.bdd.low_node(node),
                        next_branch: Some(Branch::High),
                    });
                }
                None => self.backtrack(),
            }
        }
    }
}

/// An iterator over total assignments satisfying a BDD.
///
/// Created by [`Bdd::models()`]. Each path is expanded by stepping an
/// odometer over the values of its don't-care variables, so paths with any
/// number of don't-cares are enumerated lazily.
pub struct BddModels<'a> {
    paths: BddPaths<'a>,
    vars: Vec<Var>,
    pending: Option<Pending>,
}

/// A path being expanded.
struct Pending {
    path: Vec<Lit>,
    /// Don't-care variables of `path`.
    free: Vec<Var>,
    /// Value of each free variable in the next model, `None` once exhausted.
    values: Option<Vec<bool>>,
}

impl Pending {
    fn new(path: Vec<Lit>, free: Vec<Var>) -> Self {
        let values = Some(vec![false; free.len()]);
        Self { path, free, values }
    }

    fn next_model(&mut self) -> Option<Vec<Lit>> {
        let values = self.values.as_mut()?;
        let mut model = self.path.clone();
        model.extend(self.free.iter().zip(values.iter()).map(|(&v, &b)| if b { v.pos() } else { v.neg() }));
        model.sort_by_key(|lit| lit.var());

        // Advance: flip trailing `true`s to `false` and the first `false` to `true`.
        match values.iter().position(|&b| !b) {
            Some(i) => {
                values[..i].iter_mut().for_each(|b| *b = false);
                values[i] = true;
            }
            None => self.values = None,
        }
        Some(model)
    }
}

impl<'a> BddModels<'a> {
    pub fn new(bdd: &'a Bdd, f: Ref, vars: &[Var]) -> Self {
        let mut vars = vars.to_vec();
        vars.sort();
        vars.dedup();
        BddModels {
            paths: bdd.paths(f),
            vars,
            pending: None,
        }
    }
}

impl Iterator for BddModels<'_> {
    type Item = Vec<Lit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(model) = self.pending.as_mut().and_then(Pending::next_model) {
                return Some(model);
            }

            let path = self.paths.next()?;
            let free = self
                .vars
                .iter()
                .copied()
                .filter(|v| path.iter().all(|lit| lit.var() != *v))
                .collect();
            self.pending = Some(Pending::new(path, free));
        }
    }
}
