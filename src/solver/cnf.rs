//! Tseitin encoding of feature expressions into DIMACS-style clauses.
//!
//! Every `And`/`Or` node with two or more non-constant operands gets a fresh
//! auxiliary variable constrained to be equivalent to it, so the encoding is
//! linear in the size of the expression and its models project one-to-one
//! onto the models of the expression.

use std::collections::BTreeMap;
use std::fmt;

use log::trace;

use crate::fexpr::{FExpression, Feature, Layer};
use crate::types::{Lit, Var};

pub type Clause = Vec<Lit>;

/// Allocates variables: one per feature, plus auxiliary ones.
#[derive(Debug, Default, Clone)]
pub struct Variables {
    features: BTreeMap<Feature, Var>,
    num_vars: u32,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars as usize
    }

    pub fn fresh(&mut self) -> Var {
        self.num_vars += 1;
        Var::new(self.num_vars)
    }

    pub fn feature(&mut self, feature: &Feature) -> Var {
        if let Some(&v) = self.features.get(feature) {
            return v;
        }
        let v = self.fresh();
        self.features.insert(feature.clone(), v);
        v
    }

    pub fn get(&self, feature: &Feature) -> Option<Var> {
        self.features.get(feature).copied()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Encoded {
    Const(bool),
    Lit(Lit),
}

/// Encode `expr` so that the returned clauses are satisfiable exactly when `expr` is.
pub fn encode(expr: &FExpression, vars: &mut Variables) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let top = expr.fold(&mut |layer| match layer {
        Layer::Constant(b) => Encoded::Const(b),
        Layer::Variable(f) => Encoded::Lit(vars.feature(f).pos()),
        Layer::Not(Encoded::Const(b)) => Encoded::Const(!b),
        Layer::Not(Encoded::Lit(l)) => Encoded::Lit(-l),
        Layer::And(operands) => gate(operands, true, vars, &mut clauses),
        Layer::Or(operands) => gate(operands, false, vars, &mut clauses),
    });
    match top {
        Encoded::Const(true) => {}
        Encoded::Const(false) => clauses.push(vec![]),
        Encoded::Lit(l) => clauses.push(vec![l]),
    }
    trace!("encoded {} into {} clauses", expr, clauses.len());
    clauses
}

/// Encode an `And` (`conjunctive`) or `Or` gate over already encoded operands.
fn gate(
    operands: Vec<Encoded>,
    conjunctive: bool,
    vars: &mut Variables,
    clauses: &mut Vec<Clause>,
) -> Encoded {
    let mut lits = Vec::with_capacity(operands.len());
    for operand in operands {
        match operand {
            // Identity
            Encoded::Const(b) if b == conjunctive => {}
            // Annihilator
            Encoded::Const(b) => return Encoded::Const(b),
            Encoded::Lit(l) => lits.push(l),
        }
    }
    match lits.len() {
        0 => Encoded::Const(conjunctive),
        1 => Encoded::Lit(lits[0]),
        _ => {
            // For And: g -> l_i, and (l_1 && ... && l_n) -> g.
            // Or is the dual, obtained by negating every literal.
            let g = vars.fresh().pos();
            let (g, lits): (Lit, Vec<Lit>) = if conjunctive {
                (g, lits)
            } else {
                (-g, lits.into_iter().map(|l| -l).collect())
            };
            for &l in &lits {
                clauses.push(vec![-g, l]);
            }
            let mut long = Vec::with_capacity(lits.len() + 1);
            long.push(g);
            long.extend(lits.iter().map(|&l| -l));
            clauses.push(long);
            Encoded::Lit(if conjunctive { g } else { -g })
        }
    }
}

/// A formula in conjunctive normal form over `num_vars` variables.
///
/// `Display` prints it in DIMACS format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cnf {
    pub num_vars: usize,
    pub clauses: Vec<Clause>,
}

impl fmt::Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for lit in clause {
                write!(f, "{} ", lit.to_dimacs())?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}
