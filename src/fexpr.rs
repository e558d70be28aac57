//! Boolean expressions over product features.
//!
//! [`FExpression`] is a closed tagged union. Functions over it (printing,
//! compilation to a solver, evaluation) are written either by matching on it
//! directly or through the [`FExpression::fold`] catamorphism.
//!
//! Empty groups follow the identity elements of boolean algebra: an empty
//! `And` is `true`, an empty `Or` is `false`.
//!
//! ```
//! use fts_rs::fexpr::FExpression;
//!
//! let a = FExpression::feature_expr("A");
//! let b = FExpression::feature_expr("B");
//! let e = (a.clone() | b) & !a;
//! assert_eq!(e.to_string(), "((A || B) && !A)");
//! assert_eq!(e.to_dnf().to_string(), "(B && !A)");
//! ```

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::configuration::Configuration;

/// A named unit of variability. Identity, order and hash are by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature(Arc<str>);

impl Feature {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Feature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Feature {
    fn from(name: &str) -> Self {
        Feature::new(name)
    }
}

impl From<String> for Feature {
    fn from(name: String) -> Self {
        Feature(Arc::from(name))
    }
}

impl From<&Feature> for Feature {
    fn from(feature: &Feature) -> Self {
        feature.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FExpression {
    Constant(bool),
    Variable(Feature),
    Not(Box<FExpression>),
    And(Vec<FExpression>),
    Or(Vec<FExpression>),
}

/// One layer of an [`FExpression`] whose children were already folded into `T`.
#[derive(Debug)]
pub enum Layer<'a, T> {
    Constant(bool),
    Variable(&'a Feature),
    Not(T),
    And(Vec<T>),
    Or(Vec<T>),
}

impl Default for FExpression {
    fn default() -> Self {
        FExpression::Constant(true)
    }
}

impl From<Feature> for FExpression {
    fn from(feature: Feature) -> Self {
        FExpression::Variable(feature)
    }
}

impl From<bool> for FExpression {
    fn from(value: bool) -> Self {
        FExpression::Constant(value)
    }
}

impl FExpression {
    pub fn true_value() -> Self {
        FExpression::Constant(true)
    }

    pub fn false_value() -> Self {
        FExpression::Constant(false)
    }

    pub fn feature_expr(feature: impl Into<Feature>) -> Self {
        FExpression::Variable(feature.into())
    }

    /// N-ary conjunction. `all([])` is `true`.
    pub fn all(operands: impl IntoIterator<Item = FExpression>) -> Self {
        FExpression::And(operands.into_iter().collect())
    }

    /// N-ary disjunction. `any([])` is `false`.
    pub fn any(operands: impl IntoIterator<Item = FExpression>) -> Self {
        FExpression::Or(operands.into_iter().collect())
    }

    pub fn and(&self, other: &FExpression) -> Self {
        FExpression::And(vec![self.clone(), other.clone()])
    }

    pub fn or(&self, other: &FExpression) -> Self {
        FExpression::Or(vec![self.clone(), other.clone()])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(&self) -> Self {
        FExpression::Not(Box::new(self.clone()))
    }

    /// Conjoin `other` in place. An existing `And` receiver is extended.
    pub fn and_with(&mut self, other: FExpression) {
        match self {
            FExpression::And(operands) => operands.push(other),
            _ => {
                let this = std::mem::take(self);
                *self = FExpression::And(vec![this, other]);
            }
        }
    }

    /// Disjoin `other` in place. An existing `Or` receiver is extended.
    pub fn or_with(&mut self, other: FExpression) {
        match self {
            FExpression::Or(operands) => operands.push(other),
            _ => {
                let this = std::mem::take(self);
                *self = FExpression::Or(vec![this, other]);
            }
        }
    }

    pub fn not_with(&mut self) {
        let this = std::mem::take(self);
        *self = FExpression::Not(Box::new(this));
    }

    /// Structural check, not a tautology test.
    pub fn is_true(&self) -> bool {
        matches!(self, FExpression::Constant(true))
    }

    /// Structural check, not an unsatisfiability test.
    pub fn is_false(&self) -> bool {
        matches!(self, FExpression::Constant(false))
    }

    pub fn is_literal(&self) -> bool {
        match self {
            FExpression::Variable(_) => true,
            FExpression::Not(e) => matches!(**e, FExpression::Variable(_)),
            _ => false,
        }
    }

    /// Bottom-up fold: `f` sees each node with its children already folded.
    pub fn fold<T, F>(&self, f: &mut F) -> T
    where
        F: FnMut(Layer<'_, T>) -> T,
    {
        let layer = match self {
            FExpression::Constant(b) => Layer::Constant(*b),
            FExpression::Variable(feature) => Layer::Variable(feature),
            FExpression::Not(e) => Layer::Not(e.fold(f)),
            FExpression::And(es) => Layer::And(es.iter().map(|e| e.fold(f)).collect()),
            FExpression::Or(es) => Layer::Or(es.iter().map(|e| e.fold(f)).collect()),
        };
        f(layer)
    }

    /// Distinct features occurring in the expression.
    pub fn features(&self) -> BTreeSet<Feature> {
        let mut features = BTreeSet::new();
        self.collect_features(&mut features);
        features
    }

    fn collect_features(&self, acc: &mut BTreeSet<Feature>) {
        match self {
            FExpression::Constant(_) => {}
            FExpression::Variable(feature) => {
                acc.insert(feature.clone());
            }
            FExpression::Not(e) => e.collect_features(acc),
            FExpression::And(es) | FExpression::Or(es) => {
                for e in es {
                    e.collect_features(acc);
                }
            }
        }
    }

    fn substitute(&self, lookup: &impl Fn(&Feature) -> Option<bool>) -> Self {
        match self {
            FExpression::Constant(b) => FExpression::Constant(*b),
            FExpression::Variable(feature) => match lookup(feature) {
                Some(value) => FExpression::Constant(value),
                None => self.clone(),
            },
            FExpression::Not(e) => FExpression::Not(Box::new(e.substitute(lookup))),
            FExpression::And(es) => FExpression::And(es.iter().map(|e| e.substitute(lookup)).collect()),
            FExpression::Or(es) => FExpression::Or(es.iter().map(|e| e.substitute(lookup)).collect()),
        }
    }

    /// Replace every feature bound in `configuration` by its value. The result is not simplified.
    pub fn assign(&self, configuration: &Configuration) -> Self {
        self.substitute(&|f| configuration.get(f))
    }

    pub fn assign_map(&self, values: &HashMap<Feature, bool>) -> Self {
        self.substitute(&|f| values.get(f).copied())
    }

    pub fn assign_true(&self, feature: &Feature) -> Self {
        self.substitute(&|f| (f == feature).then_some(true))
    }

    pub fn assign_false(&self, feature: &Feature) -> Self {
        self.substitute(&|f| (f == feature).then_some(false))
    }

    /// Value of the expression under `configuration`.
    ///
    /// Three-valued: `None` when the value depends on an unbound feature.
    /// A `false` operand decides an `And` (and `true` an `Or`) even if other
    /// operands are unknown.
    pub fn evaluate(&self, configuration: &Configuration) -> Option<bool> {
        self.fold(&mut |layer: Layer<'_, Option<bool>>| match layer {
            Layer::Constant(b) => Some(b),
            Layer::Variable(f) => configuration.get(f),
            Layer::Not(v) => v.map(|b| !b),
            Layer::And(vs) => {
                if vs.contains(&Some(false)) {
                    Some(false)
                } else if vs.contains(&None) {
                    None
                } else {
                    Some(true)
                }
            }
            Layer::Or(vs) => {
                if vs.contains(&Some(true)) {
                    Some(true)
                } else if vs.contains(&None) {
                    None
                } else {
                    Some(false)
                }
            }
        })
    }

    /// Algebraic simplification.
    ///
    /// Folds constants, removes double negations, flattens nested groups of
    /// the same kind, drops duplicate operands (keeping the first), turns a
    /// group holding both `x` and `!x` into its annihilator and collapses
    /// single-operand groups. The result is a fixpoint: simplifying it again
    /// changes nothing.
    pub fn apply_simplification(&self) -> Self {
        match self {
            FExpression::Constant(_) | FExpression::Variable(_) => self.clone(),
            FExpression::Not(e) => match e.apply_simplification() {
                FExpression::Constant(b) => FExpression::Constant(!b),
                FExpression::Not(inner) => *inner,
                other => FExpression::Not(Box::new(other)),
            },
            FExpression::And(es) => simplify_group(es, true),
            FExpression::Or(es) => simplify_group(es, false),
        }
    }

    /// Negation normal form: negations only on variables, no constants under a `Not`.
    pub fn to_nnf(&self) -> Self {
        self.nnf(false)
    }

    fn nnf(&self, negate: bool) -> Self {
        match self {
            FExpression::Constant(b) => FExpression::Constant(*b != negate),
            FExpression::Variable(_) => {
                if negate {
                    self.not()
                } else {
                    self.clone()
                }
            }
            FExpression::Not(e) => e.nnf(!negate),
            FExpression::And(es) => {
                let es = es.iter().map(|e| e.nnf(negate)).collect();
                if negate {
                    FExpression::Or(es)
                } else {
                    FExpression::And(es)
                }
            }
            FExpression::Or(es) => {
                let es = es.iter().map(|e| e.nnf(negate)).collect();
                if negate {
                    FExpression::And(es)
                } else {
                    FExpression::Or(es)
                }
            }
        }
    }

    /// Conjunctive normal form, simplified.
    pub fn to_cnf(&self) -> Self {
        let clauses = self.to_nnf().normal_form(true);
        FExpression::And(clauses.into_iter().map(FExpression::Or).collect()).apply_simplification()
    }

    /// Disjunctive normal form, simplified.
    pub fn to_dnf(&self) -> Self {
        let terms = self.to_nnf().normal_form(false);
        FExpression::Or(terms.into_iter().map(FExpression::And).collect()).apply_simplification()
    }

    /// Distributes an NNF expression into a list of literal groups.
    ///
    /// With `conjunctive`, the outer list is a conjunction of clauses,
    /// otherwise a disjunction of terms.
    fn normal_form(&self, conjunctive: bool) -> Vec<Vec<FExpression>> {
        match self {
            // The outer identity yields no groups, the annihilator one empty group.
            FExpression::Constant(b) => {
                if *b == conjunctive {
                    vec![]
                } else {
                    vec![vec![]]
                }
            }
            FExpression::Variable(_) | FExpression::Not(_) => vec![vec![self.clone()]],
            FExpression::And(es) | FExpression::Or(es) => {
                let is_outer = matches!(self, FExpression::And(_)) == conjunctive;
                if is_outer {
                    es.iter().flat_map(|e| e.normal_form(conjunctive)).collect()
                } else {
                    let mut acc: Vec<Vec<FExpression>> = vec![vec![]];
                    for e in es {
                        let groups = e.normal_form(conjunctive);
                        let mut next = Vec::with_capacity(acc.len() * groups.len());
                        for left in &acc {
                            for right in &groups {
                                let mut merged = left.clone();
                                merged.extend(right.iter().cloned());
                                next.push(merged);
                            }
                        }
                        acc = next;
                    }
                    acc
                }
            }
        }
    }
}

/// Simplify an `And` (`conjunctive`) or `Or` group.
fn simplify_group(operands: &[FExpression], conjunctive: bool) -> FExpression {
    let identity = conjunctive;
    let annihilator = !conjunctive;

    let mut flat: Vec<FExpression> = Vec::with_capacity(operands.len());
    for operand in operands {
        let s = operand.apply_simplification();
        match s {
            FExpression::Constant(b) if b == identity => {}
            FExpression::Constant(_) => return FExpression::Constant(annihilator),
            FExpression::And(inner) if conjunctive => flat.extend(inner),
            FExpression::Or(inner) if !conjunctive => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut unique: Vec<FExpression> = Vec::with_capacity(flat.len());
    for e in flat {
        if !unique.contains(&e) {
            unique.push(e);
        }
    }

    let has_complement = unique.iter().any(|e| match e {
        FExpression::Not(inner) => unique.contains(inner),
        _ => false,
    });
    if has_complement {
        return FExpression::Constant(annihilator);
    }

    match unique.len() {
        0 => FExpression::Constant(identity),
        1 => unique.pop().unwrap_or(FExpression::Constant(identity)),
        _ => {
            if conjunctive {
                FExpression::And(unique)
            } else {
                FExpression::Or(unique)
            }
        }
    }
}

impl fmt::Display for FExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.fold(&mut |layer: Layer<'_, String>| match layer {
            Layer::Constant(b) => b.to_string(),
            Layer::Variable(feature) => feature.to_string(),
            Layer::Not(s) => format!("!{}", s),
            Layer::And(parts) if parts.is_empty() => "true".to_string(),
            Layer::Or(parts) if parts.is_empty() => "false".to_string(),
            Layer::And(parts) => format!("({})", parts.join(" && ")),
            Layer::Or(parts) => format!("({})", parts.join(" || ")),
        });
        f.write_str(&text)
    }
}

impl std::ops::BitAnd for FExpression {
    type Output = FExpression;

    fn bitand(self, rhs: Self) -> Self::Output {
        FExpression::And(vec![self, rhs])
    }
}

impl std::ops::BitOr for FExpression {
    type Output = FExpression;

    fn bitor(self, rhs: Self) -> Self::Output {
        FExpression::Or(vec![self, rhs])
    }
}

impl std::ops::Not for FExpression {
    type Output = FExpression;

    fn not(self) -> Self::Output {
        FExpression::Not(Box::new(self))
    }
}
