//! Dissimilarity measures between test cases.
//!
//! Base metrics work on sets ([`Jaccard`], [`Dice`]) or on sequences
//! ([`Levenshtein`], [`LongestCommonSubsequence`]). All of them return values
//! in `[0, 1]`, with `0` for identical inputs. Test-case adapters lift them to
//! [`TestCase`]s, and [`FtsTestCaseDissimilarity`] adds the distance between
//! the sets of products able to execute each test case.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use log::trace;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::configuration::ConfigurationSet;
use crate::coverage::{CoverageCriterion, TransitionCoverage};
use crate::error::DissimilarityError;
use crate::execution::TestCase;
use crate::executor::{ExecutorConfig, FeaturedTransitionSystemExecutor};
use crate::fexpr::{FExpression, Feature};
use crate::solver::SolverFacade;
use crate::ts::FeaturedTransitionSystem;

pub trait SetDissimilarity {
    fn dissimilarity<T: Eq + Hash>(&self, a: &HashSet<T>, b: &HashSet<T>) -> f64;
}

pub trait SequenceDissimilarity {
    fn dissimilarity<T: Eq>(&self, a: &[T], b: &[T]) -> f64;
}

/// `1 - |a ∩ b| / |a ∪ b|`; two empty sets are identical.
#[derive(Debug, Copy, Clone, Default)]
pub struct Jaccard;

impl SetDissimilarity for Jaccard {
    fn dissimilarity<T: Eq + Hash>(&self, a: &HashSet<T>, b: &HashSet<T>) -> f64 {
        let union = a.union(b).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = a.intersection(b).count();
        1.0 - intersection as f64 / union as f64
    }
}

/// `1 - 2 |a ∩ b| / (|a| + |b|)`; two empty sets are identical.
#[derive(Debug, Copy, Clone, Default)]
pub struct Dice;

impl SetDissimilarity for Dice {
    fn dissimilarity<T: Eq + Hash>(&self, a: &HashSet<T>, b: &HashSet<T>) -> f64 {
        let total = a.len() + b.len();
        if total == 0 {
            return 0.0;
        }
        let intersection = a.intersection(b).count();
        1.0 - 2.0 * intersection as f64 / total as f64
    }
}

/// Edit distance normalised by the length of the longer sequence.
#[derive(Debug, Copy, Clone, Default)]
pub struct Levenshtein;

pub fn levenshtein<T: Eq>(a: &[T], b: &[T]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, x) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let cost = usize::from(x != y);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

impl SequenceDissimilarity for Levenshtein {
    fn dissimilarity<T: Eq>(&self, a: &[T], b: &[T]) -> f64 {
        let longest = a.len().max(b.len());
        if longest == 0 {
            return 0.0;
        }
        levenshtein(a, b) as f64 / longest as f64
    }
}

/// `1 - lcs(a, b) / max(|a|, |b|)`.
#[derive(Debug, Copy, Clone, Default)]
pub struct LongestCommonSubsequence;

pub fn lcs_length<T: Eq>(a: &[T], b: &[T]) -> usize {
    let mut prev = vec![0; b.len() + 1];
    let mut curr = vec![0; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

impl SequenceDissimilarity for LongestCommonSubsequence {
    fn dissimilarity<T: Eq>(&self, a: &[T], b: &[T]) -> f64 {
        let longest = a.len().max(b.len());
        if longest == 0 {
            return 0.0;
        }
        1.0 - lcs_length(a, b) as f64 / longest as f64
    }
}

pub trait TestCaseDissimilarity {
    fn dissimilarity(&mut self, a: &TestCase, b: &TestCase) -> Result<f64, DissimilarityError>;
}

/// Set metric over the elements a criterion sees covered by each test case's path.
#[derive(Debug, Clone, Default)]
pub struct ElementSetDissimilarity<C = TransitionCoverage, D = Jaccard> {
    criterion: C,
    metric: D,
}

impl<C, D> ElementSetDissimilarity<C, D> {
    pub fn new(criterion: C, metric: D) -> Self {
        Self { criterion, metric }
    }
}

impl<C: CoverageCriterion, D: SetDissimilarity> TestCaseDissimilarity for ElementSetDissimilarity<C, D> {
    fn dissimilarity(&mut self, a: &TestCase, b: &TestCase) -> Result<f64, DissimilarityError> {
        let ea = self.criterion.covered_elements(a.execution());
        let eb = self.criterion.covered_elements(b.execution());
        Ok(self.metric.dissimilarity(&ea, &eb))
    }
}

/// Sequence metric over the actions of each test case.
#[derive(Debug, Clone, Default)]
pub struct ActionSequenceDissimilarity<D = Levenshtein> {
    metric: D,
}

impl<D> ActionSequenceDissimilarity<D> {
    pub fn new(metric: D) -> Self {
        Self { metric }
    }
}

impl<D: SequenceDissimilarity> TestCaseDissimilarity for ActionSequenceDissimilarity<D> {
    fn dissimilarity(&mut self, a: &TestCase, b: &TestCase) -> Result<f64, DissimilarityError> {
        let sa: Vec<_> = a.actions().collect();
        let sb: Vec<_> = b.actions().collect();
        Ok(self.metric.dissimilarity(&sa, &sb))
    }
}

/// `intersection / union` as a float, for counts beyond the range of `f64`.
fn ratio(intersection: &BigUint, union: &BigUint) -> f64 {
    let shift = union.bits().saturating_sub(f64::MANTISSA_DIGITS as u64);
    let i = (intersection >> shift).to_f64().unwrap_or(0.0);
    let u = (union >> shift).to_f64().unwrap_or(1.0);
    i / u
}

/// Structural dissimilarity combined with the dissimilarity of the product
/// sets able to execute each test case.
///
/// The product term is `1 - |P(a) ∩ P(b)| / |P(a) ∪ P(b)|`, counted by the
/// solver of the feature model. A test case executable by every product
/// (product constraint `true`) does not restrict the other side: both the
/// intersection and the union are then the other test case's products.
/// Product constraints are cached by test-case id.
pub struct FtsTestCaseDissimilarity<'a, D = ElementSetDissimilarity> {
    fts: &'a FeaturedTransitionSystem,
    solver: &'a mut dyn SolverFacade,
    structural: D,
    combiner: Box<dyn Fn(f64, f64) -> f64 + 'a>,
    executor_config: ExecutorConfig,
    cache: HashMap<String, FExpression>,
}

impl<'a> FtsTestCaseDissimilarity<'a> {
    pub fn new(fts: &'a FeaturedTransitionSystem, solver: &'a mut dyn SolverFacade) -> Self {
        Self::with_structural(fts, solver, ElementSetDissimilarity::default())
    }
}

impl<'a, D> FtsTestCaseDissimilarity<'a, D> {
    pub fn with_structural(fts: &'a FeaturedTransitionSystem, solver: &'a mut dyn SolverFacade, structural: D) -> Self {
        Self {
            fts,
            solver,
            structural,
            combiner: Box::new(|x, y| x * y),
            executor_config: ExecutorConfig::default(),
            cache: HashMap::new(),
        }
    }

    /// Replace the default combiner (the product of both terms).
    pub fn with_combiner(mut self, combiner: impl Fn(f64, f64) -> f64 + 'a) -> Self {
        self.combiner = Box::new(combiner);
        self
    }

    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    /// The (cached) product constraint of `test_case`.
    pub fn product_constraint(&mut self, test_case: &TestCase) -> Result<FExpression, DissimilarityError> {
        if let Some(constraint) = self.cache.get(test_case.id()) {
            return Ok(constraint.clone());
        }
        let mut executor =
            FeaturedTransitionSystemExecutor::with_config(self.fts, self.executor_config).with_solver(&mut *self.solver);
        let constraint = executor.product_constraint(test_case)?;
        trace!("products of {}: {}", test_case.id(), constraint);
        self.cache.insert(test_case.id().to_string(), constraint.clone());
        Ok(constraint)
    }

    fn count(&mut self, constraint: FExpression, universe: &BTreeSet<Feature>) -> Result<BigUint, DissimilarityError> {
        Ok(ConfigurationSet::new(&mut *self.solver, constraint).size_over(universe)?)
    }

    pub fn product_dissimilarity(&mut self, a: &TestCase, b: &TestCase) -> Result<f64, DissimilarityError> {
        let ca = self.product_constraint(a)?;
        let cb = self.product_constraint(b)?;
        // Both terms are counted over the same features: those of the model
        // and of both constraints.
        let mut universe = self.solver.features();
        universe.extend(ca.features());
        universe.extend(cb.features());

        let (intersection, union) = if ca.is_true() {
            (cb.clone(), cb)
        } else if cb.is_true() {
            (ca.clone(), ca)
        } else {
            (ca.and(&cb).apply_simplification(), ca.or(&cb).apply_simplification())
        };

        let intersection = self.count(intersection, &universe)?;
        let union = self.count(union, &universe)?;
        if union < intersection {
            return Err(DissimilarityError::InconsistentCounts {
                intersection: intersection.to_string(),
                union: union.to_string(),
            });
        }
        if union.is_zero() {
            return Ok(0.0);
        }
        Ok(1.0 - ratio(&intersection, &union))
    }
}

impl<D: TestCaseDissimilarity> TestCaseDissimilarity for FtsTestCaseDissimilarity<'_, D> {
    fn dissimilarity(&mut self, a: &TestCase, b: &TestCase) -> Result<f64, DissimilarityError> {
        let structural = self.structural.dissimilarity(a, b)?;
        let products = self.product_dissimilarity(a, b)?;
        let combined = (self.combiner)(structural, products);
        trace!(
            "d({}, {}) = {} (structural {}, products {})",
            a.id(),
            b.id(),
            combined,
            structural,
            products
        );
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::execution::Execution;
    use crate::solver::{Solver, SolverType};
    use crate::ts::{FeaturedTransitionSystemBuilder, Transition};

    fn set(items: &[u32]) -> HashSet<u32> {
        items.iter().copied().collect()
    }

    fn test_case(id: &str, path: &[(&str, &str, &str)]) -> TestCase {
        let transitions = path.iter().map(|&(s, a, t)| Transition::new(s, a, t));
        TestCase::new(id, Execution::from_transitions(transitions).unwrap())
    }

    #[test]
    fn test_set_metrics() {
        let (a, b) = (set(&[1, 2, 3]), set(&[2, 3, 4]));
        assert!((Jaccard.dissimilarity(&a, &b) - 0.5).abs() < 1e-9);
        assert!((Dice.dissimilarity(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(Jaccard.dissimilarity(&a, &a), 0.0);
        assert_eq!(Jaccard.dissimilarity(&set(&[]), &set(&[])), 0.0);
        assert_eq!(Dice.dissimilarity(&set(&[1]), &set(&[])), 1.0);
    }

    #[test]
    fn test_sequence_metrics() {
        let kitten: Vec<char> = "kitten".chars().collect();
        let sitting: Vec<char> = "sitting".chars().collect();
        assert_eq!(levenshtein(&kitten, &sitting), 3);
        assert!((Levenshtein.dissimilarity(&kitten, &sitting) - 3.0 / 7.0).abs() < 1e-9);
        assert_eq!(lcs_length(&kitten, &sitting), 4);
        assert!((LongestCommonSubsequence.dissimilarity(&kitten, &sitting) - 3.0 / 7.0).abs() < 1e-9);
        let empty: [char; 0] = [];
        assert_eq!(Levenshtein.dissimilarity(&empty, &empty), 0.0);
        assert_eq!(LongestCommonSubsequence.dissimilarity(&kitten, &empty), 1.0);
    }

    #[test]
    fn test_adapters() {
        let a = test_case("a", &[("s0", "x", "s1"), ("s1", "y", "s0")]);
        let b = test_case("b", &[("s0", "x", "s1"), ("s1", "z", "s2")]);
        let mut transitions: ElementSetDissimilarity = ElementSetDissimilarity::default();
        // one shared transition out of three
        let d = transitions.dissimilarity(&a, &b).unwrap();
        assert!((d - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(transitions.dissimilarity(&a, &a).unwrap(), 0.0);

        let mut actions: ActionSequenceDissimilarity = ActionSequenceDissimilarity::default();
        assert!((actions.dissimilarity(&a, &b).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_of_huge_counts() {
        let union = BigUint::from(1u32) << 2000;
        let intersection = BigUint::from(1u32) << 1999;
        assert!((ratio(&intersection, &union) - 0.5).abs() < 1e-9);
        assert_eq!(ratio(&BigUint::from(1u32), &BigUint::from(4u32)), 0.25);
    }

    /// `s0 -a-> s1` for `A`, `s0 -b-> s2` for `B`, `s0 -c-> s0` for every product.
    fn vending() -> FeaturedTransitionSystem {
        let mut builder = FeaturedTransitionSystemBuilder::new("s0");
        builder.add_transition("s0", "a", "s1", FExpression::feature_expr("A"));
        builder.add_transition("s0", "b", "s2", FExpression::feature_expr("B"));
        builder.add_transition("s0", "c", "s0", FExpression::true_value());
        builder.build()
    }

    #[test]
    fn test_product_dissimilarity() {
        let fts = vending();
        let base = FExpression::feature_expr("A").or(&FExpression::feature_expr("B"));
        let mut solver = Solver::new(SolverType::Bdd, &base).unwrap();
        let mut d = FtsTestCaseDissimilarity::new(&fts, &mut solver);

        let a = test_case("a", &[("s0", "a", "s1")]);
        let b = test_case("b", &[("s0", "b", "s2")]);
        let c = test_case("c", &[("s0", "c", "s0")]);

        // A: 2 products, B: 2 products, A & B: 1, A | B: 3
        assert!((d.product_dissimilarity(&a, &b).unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(d.product_dissimilarity(&a, &a).unwrap(), 0.0);
        // `c` runs on every product and does not restrict `a`
        assert_eq!(d.product_dissimilarity(&a, &c).unwrap(), 0.0);
        assert!(d.product_constraint(&c).unwrap().is_true());

        let ab = d.dissimilarity(&a, &b).unwrap();
        let ba = d.dissimilarity(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert!((ab - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(d.dissimilarity(&a, &a).unwrap(), 0.0);

        drop(d);
        assert_eq!(solver.number_of_solutions().unwrap(), 3u32.into());
    }

    #[test]
    fn test_guards_outside_the_model() {
        let mut builder = FeaturedTransitionSystemBuilder::new("s0");
        let c = FExpression::feature_expr("C");
        builder.add_transition("s0", "x", "s1", c.clone());
        builder.add_transition("s0", "y", "s1", c.not().or(&FExpression::feature_expr("A")));
        let fts = builder.build();
        let x = test_case("x", &[("s0", "x", "s1")]);
        let y = test_case("y", &[("s0", "y", "s1")]);

        for backend in [SolverType::Sat, SolverType::Bdd] {
            let base = FExpression::feature_expr("A").or(&FExpression::feature_expr("B"));
            let mut solver = Solver::new(backend, &base).unwrap();
            let mut d = FtsTestCaseDissimilarity::new(&fts, &mut solver);
            // Over {A, B, C}: C && A has 2 products, C || !C || A (all of A | B) has 6
            let products = d.product_dissimilarity(&x, &y).unwrap();
            assert!((products - 2.0 / 3.0).abs() < 1e-9, "{:?}: {}", backend, products);
            assert_eq!(d.product_dissimilarity(&y, &x).unwrap(), products);
            drop(d);
            assert_eq!(solver.features().len(), 2);
        }
    }

    #[test]
    fn test_unsatisfiable_products() {
        let fts = vending();
        let base = FExpression::feature_expr("A").not().and(&FExpression::feature_expr("B").not());
        let mut solver = Solver::new(SolverType::Sat, &base).unwrap();
        let mut d = FtsTestCaseDissimilarity::new(&fts, &mut solver).with_combiner(|x, y| x + y);
        // Neither test case is executable: the solver prunes every branch.
        let a = test_case("a", &[("s0", "a", "s1")]);
        assert!(matches!(
            d.product_constraint(&a),
            Err(DissimilarityError::Execution(_))
        ));
        let c = test_case("c", &[("s0", "c", "s0")]);
        assert_eq!(d.dissimilarity(&c, &c).unwrap(), 0.0);
    }
}
