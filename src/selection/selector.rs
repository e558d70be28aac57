//! Greedy dissimilarity-based selection of test cases.
//!
//! The selector starts from the most dissimilar pair of the pool, then
//! repeatedly adds the candidate whose distance to the already selected test
//! cases is largest, the distance to a set being the minimum or the average
//! of the pairwise distances ([`Prioritization`]). An optional refinement
//! phase then swaps selected test cases for pool candidates while this
//! strictly improves the fitness of the selection.
//!
//! The pool is any iterator of test cases and is consumed lazily: each
//! candidate is pulled only after its predecessors have been compared with
//! each other, so an endless generator is fine as long as a running time is
//! set. Without one, the pool must be finite.
//!
//! Selection stops at `max_size` test cases or when the running time is
//! exhausted. The deadline is only checked between two dissimilarity
//! computations; a candidate whose distances could not all be computed in
//! time is dropped, and selection proceeds over the candidates already
//! compared.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::error::DissimilarityError;
use crate::execution::{TestCase, TestSet};
use crate::selection::dissimilarity::TestCaseDissimilarity;

/// How the distance between a candidate and a set of test cases is derived
/// from the pairwise distances.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Prioritization {
    /// Distance to the closest member.
    #[default]
    Minimum,
    /// Average distance to all members.
    Average,
}

impl Prioritization {
    fn aggregate(self, distances: &[f64]) -> f64 {
        if distances.is_empty() {
            return 0.0;
        }
        match self {
            Prioritization::Minimum => distances.iter().copied().fold(f64::INFINITY, f64::min),
            Prioritization::Average => distances.iter().sum::<f64>() / distances.len() as f64,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    /// Upper bound on the number of selected test cases.
    pub max_size: usize,
    pub running_time: Option<Duration>,
    /// Run the swap-based refinement after the greedy phase.
    pub refine: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_size: usize::MAX,
            running_time: None,
            refine: false,
        }
    }
}

impl SelectionConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_running_time(mut self, running_time: Duration) -> Self {
        self.running_time = Some(running_time);
        self
    }

    pub fn with_refine(mut self, refine: bool) -> Self {
        self.refine = refine;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    /// Selected test cases, in selection order.
    pub test_set: TestSet,
    /// Score of each test case against the ones before it in `test_set`.
    /// Both members of the initial pair carry their mutual distance.
    pub scores: Vec<f64>,
    /// Fitness of the selection before refinement and after every accepted swap.
    pub fitness_history: Vec<f64>,
    /// Whether the running time ran out before selection finished.
    pub timed_out: bool,
}

pub struct DissimilarTestCaseSelector<D> {
    dissimilarity: D,
    prioritization: Prioritization,
    config: SelectionConfig,
}

/// Candidates pulled so far, their memoised pairwise distances and the
/// cooperative deadline.
struct Distances<'d, D> {
    pool: Vec<TestCase>,
    dissimilarity: &'d mut D,
    memo: HashMap<(usize, usize), f64>,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<D: TestCaseDissimilarity> Distances<'_, D> {
    fn expired(&mut self) -> bool {
        if !self.timed_out && self.deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Selection running time exhausted");
            self.timed_out = true;
        }
        self.timed_out
    }

    /// Distance between pool members `i` and `j`, or `None` once the deadline has passed.
    fn get(&mut self, i: usize, j: usize) -> Result<Option<f64>, DissimilarityError> {
        if i == j {
            return Ok(Some(0.0));
        }
        let key = (i.min(j), i.max(j));
        if let Some(&d) = self.memo.get(&key) {
            return Ok(Some(d));
        }
        if self.expired() {
            return Ok(None);
        }
        let d = self.dissimilarity.dissimilarity(&self.pool[key.0], &self.pool[key.1])?;
        trace!("d({}, {}) = {}", self.pool[key.0].id(), self.pool[key.1].id(), d);
        self.memo.insert(key, d);
        Ok(Some(d))
    }

    /// Score of `candidate` against `selected`, `None` once the deadline has passed.
    fn score(
        &mut self,
        prioritization: Prioritization,
        candidate: usize,
        selected: &[usize],
    ) -> Result<Option<f64>, DissimilarityError> {
        let mut distances = Vec::with_capacity(selected.len());
        for &s in selected {
            match self.get(candidate, s)? {
                Some(d) => distances.push(d),
                None => return Ok(None),
            }
        }
        Ok(Some(prioritization.aggregate(&distances)))
    }

    /// Aggregate of all pairwise distances within `selected`.
    fn fitness(&mut self, prioritization: Prioritization, selected: &[usize]) -> Result<Option<f64>, DissimilarityError> {
        let mut distances = Vec::new();
        for (k, &i) in selected.iter().enumerate() {
            for &j in &selected[k + 1..] {
                match self.get(i, j)? {
                    Some(d) => distances.push(d),
                    None => return Ok(None),
                }
            }
        }
        Ok(Some(prioritization.aggregate(&distances)))
    }
}

impl<D: TestCaseDissimilarity> DissimilarTestCaseSelector<D> {
    pub fn new(dissimilarity: D, prioritization: Prioritization) -> Self {
        Self {
            dissimilarity,
            prioritization,
            config: SelectionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SelectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn prioritization(&self) -> Prioritization {
        self.prioritization
    }

    pub fn into_dissimilarity(self) -> D {
        self.dissimilarity
    }

    /// Select at most `max_size` test cases from `pool`, which may be a
    /// [`TestSet`], a reference to one, or any iterator of test cases.
    pub fn select<I>(&mut self, pool: I) -> Result<Selection, DissimilarityError>
    where
        I: IntoIterator,
        I::Item: Borrow<TestCase>,
    {
        let start = Instant::now();
        let mut distances = Distances {
            pool: Vec::new(),
            dissimilarity: &mut self.dissimilarity,
            memo: HashMap::new(),
            deadline: self.config.running_time.map(|t| start + t),
            timed_out: false,
        };

        let seed = pull(&mut distances, pool, self.config.max_size)?;
        let budget = self.config.max_size.min(distances.pool.len());

        let (mut selected, mut scores) = match (budget, seed) {
            (0, _) => (Vec::new(), Vec::new()),
            (1, _) | (_, None) => (vec![0], vec![0.0]),
            (_, Some((i, j, d))) => (vec![i, j], vec![d, d]),
        };

        // Greedy phase
        'greedy: while selected.len() < budget {
            let mut best: Option<(usize, f64)> = None;
            for candidate in 0..distances.pool.len() {
                if selected.contains(&candidate) {
                    continue;
                }
                let Some(score) = distances.score(self.prioritization, candidate, &selected)? else {
                    break 'greedy;
                };
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((candidate, score));
                }
            }
            match best {
                Some((candidate, score)) => {
                    debug!("selected {} with score {}", distances.pool[candidate].id(), score);
                    selected.push(candidate);
                    scores.push(score);
                }
                None => break,
            }
        }

        let mut fitness_history = Vec::new();
        if self.config.refine && !distances.timed_out {
            if let Some(fitness) = distances.fitness(self.prioritization, &selected)? {
                fitness_history.push(fitness);
                refine(&mut distances, self.prioritization, &mut selected, &mut fitness_history)?;
            }
        }
        if fitness_history.len() > 1 {
            rescore(&mut distances, self.prioritization, &selected, &mut scores)?;
        }

        let timed_out = distances.timed_out;
        info!(
            "Selected {} of {} test cases in {:.2?}{}",
            selected.len(),
            distances.pool.len(),
            start.elapsed(),
            if timed_out { " (timed out)" } else { "" }
        );
        Ok(Selection {
            test_set: selected.iter().map(|&i| distances.pool[i].clone()).collect(),
            scores,
            fitness_history,
            timed_out,
        })
    }
}

/// Pull candidates from `pool` until it is exhausted or the deadline passes,
/// and return the most dissimilar pair among them. Ties go to the pair that
/// comes first in pool order. A `max_size` below two needs no distances, so only the first
/// `max_size` candidates are pulled.
fn pull<D, I>(
    distances: &mut Distances<'_, D>,
    pool: I,
    max_size: usize,
) -> Result<Option<(usize, usize, f64)>, DissimilarityError>
where
    D: TestCaseDissimilarity,
    I: IntoIterator,
    I::Item: Borrow<TestCase>,
{
    let mut best: Option<(usize, usize, f64)> = None;
    let limit = if max_size < 2 { max_size } else { usize::MAX };
    'pool: for candidate in pool.into_iter().take(limit) {
        let index = distances.pool.len();
        distances.pool.push(candidate.borrow().clone());
        for earlier in 0..index {
            let Some(d) = distances.get(earlier, index)? else {
                distances.pool.pop();
                distances.memo.retain(|&(_, j), _| j != index);
                break 'pool;
            };
            if best.map_or(true, |(i, _, b)| d > b || (d == b && earlier < i)) {
                best = Some((earlier, index, d));
            }
        }
    }
    Ok(best)
}

/// Swap selected test cases for unselected ones while the fitness strictly increases.
fn refine<D: TestCaseDissimilarity>(
    distances: &mut Distances<'_, D>,
    prioritization: Prioritization,
    selected: &mut [usize],
    fitness_history: &mut Vec<f64>,
) -> Result<(), DissimilarityError> {
    let n = distances.pool.len();
    let Some(mut fitness) = fitness_history.last().copied() else {
        return Ok(());
    };
    let mut improved = true;
    while improved {
        improved = false;
        for position in 0..selected.len() {
            for candidate in 0..n {
                if selected.contains(&candidate) {
                    continue;
                }
                let previous = selected[position];
                selected[position] = candidate;
                match distances.fitness(prioritization, selected)? {
                    Some(f) if f > fitness => {
                        trace!(
                            "swap {} for {}: fitness {} -> {}",
                            distances.pool[previous].id(),
                            distances.pool[candidate].id(),
                            fitness,
                            f
                        );
                        fitness = f;
                        fitness_history.push(f);
                        improved = true;
                    }
                    Some(_) => selected[position] = previous,
                    None => {
                        selected[position] = previous;
                        return Ok(());
                    }
                }
            }
        }
    }
    debug!("refinement finished with fitness {}", fitness);
    Ok(())
}

/// Recompute `scores` for the final order of `selected`.
fn rescore<D: TestCaseDissimilarity>(
    distances: &mut Distances<'_, D>,
    prioritization: Prioritization,
    selected: &[usize],
    scores: &mut [f64],
) -> Result<(), DissimilarityError> {
    for k in 1..selected.len() {
        if let Some(score) = distances.score(prioritization, selected[k], &selected[..k])? {
            scores[k] = score;
        }
    }
    // The initial pair shares its mutual distance.
    if scores.len() > 1 {
        scores[0] = scores[1];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::execution::Execution;

    /// Test cases are points on a line; their distance is `|x - y| / 100`.
    struct Line;

    fn position(tc: &TestCase) -> f64 {
        tc.id()[1..].parse().unwrap()
    }

    impl TestCaseDissimilarity for Line {
        fn dissimilarity(&mut self, a: &TestCase, b: &TestCase) -> Result<f64, DissimilarityError> {
            Ok((position(a) - position(b)).abs() / 100.0)
        }
    }

    fn point(p: u32) -> TestCase {
        TestCase::new(format!("p{}", p), Execution::new())
    }

    fn pool(points: &[u32]) -> TestSet {
        points.iter().copied().map(point).collect()
    }

    fn ids(selection: &Selection) -> Vec<&str> {
        selection.test_set.iter().map(|tc| tc.id()).collect()
    }

    #[test]
    fn test_max_min_selection() {
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum)
            .with_config(SelectionConfig::default().with_max_size(3));
        let selection = selector.select(&pool(&[10, 0, 40, 100, 60])).unwrap();
        assert_eq!(ids(&selection), ["p0", "p100", "p40"]);
        assert_eq!(selection.scores, [1.0, 1.0, 0.4]);
        assert!(selection.fitness_history.is_empty());
        assert!(!selection.timed_out);
    }

    #[test]
    fn test_whole_pool_is_prioritised() {
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum);
        let selection = selector.select(&pool(&[10, 0, 40, 100, 60])).unwrap();
        assert_eq!(selection.test_set.len(), 5);
        assert!(selection.scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_average_prioritization() {
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Average)
            .with_config(SelectionConfig::default().with_max_size(3));
        let selection = selector.select(&pool(&[0, 25, 50, 100])).unwrap();
        // All middle points have the same average distance to {0, 100}; the first one wins.
        assert_eq!(ids(&selection), ["p0", "p100", "p25"]);
        assert_eq!(selection.scores[2], 0.5);
    }

    #[test]
    fn test_small_budgets() {
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum)
            .with_config(SelectionConfig::default().with_max_size(1));
        assert_eq!(ids(&selector.select(&pool(&[3, 7])).unwrap()), ["p3"]);
        assert!(selector.select(&TestSet::new()).unwrap().test_set.is_empty());
    }

    #[test]
    fn test_zero_running_time() {
        let config = SelectionConfig::default().with_running_time(Duration::ZERO);
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum).with_config(config);
        let selection = selector.select(&pool(&[1, 2, 3])).unwrap();
        assert!(selection.timed_out);
        assert_eq!(ids(&selection), ["p1"]);
    }

    #[test]
    fn test_refinement_improves_fitness() {
        // Greedy takes the midpoint first, which leaves no room for an even
        // spread of four points; swapping it for 67 does.
        let config = SelectionConfig::default().with_max_size(4).with_refine(true);
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum).with_config(config);
        let selection = selector.select(&pool(&[0, 100, 50, 33, 67])).unwrap();
        assert_eq!(selection.fitness_history.len(), 2);
        assert!(selection.fitness_history.windows(2).all(|w| w[0] < w[1]));
        assert!((selection.fitness_history[1] - 0.33).abs() < 1e-9);
        assert_eq!(ids(&selection), ["p0", "p100", "p67", "p33"]);
        // Scores describe the refined order, not the greedy one (0.5, 0.17).
        assert_eq!(selection.scores, [1.0, 1.0, 0.33, 0.33]);
    }

    #[test]
    fn test_scores_follow_selection_order() {
        let config = SelectionConfig::default().with_max_size(4).with_refine(true);
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Average).with_config(config);
        let selection = selector.select(&pool(&[0, 100, 50, 33, 67, 10])).unwrap();
        let points: Vec<f64> = selection.test_set.iter().map(position).collect();
        for k in 1..points.len() {
            let expected = points[..k].iter().map(|p| (points[k] - p).abs() / 100.0).sum::<f64>() / k as f64;
            assert!((selection.scores[k] - expected).abs() < 1e-9);
        }
        assert_eq!(selection.scores[0], selection.scores[1]);
    }

    #[test]
    fn test_owned_iterator_pool() {
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum)
            .with_config(SelectionConfig::default().with_max_size(3));
        let selection = selector.select(pool(&[10, 0, 40, 100, 60])).unwrap();
        assert_eq!(ids(&selection), ["p0", "p100", "p40"]);
        let lazy = [10, 0, 40, 100, 60].into_iter().map(point);
        assert_eq!(ids(&selector.select(lazy).unwrap()), ["p0", "p100", "p40"]);
    }

    #[test]
    fn test_endless_pool_stops_at_deadline() {
        let config = SelectionConfig::default()
            .with_max_size(3)
            .with_running_time(Duration::from_millis(20));
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum).with_config(config);
        let endless = (0u32..).map(|i| point(i % 101));
        let selection = selector.select(endless).unwrap();
        assert!(selection.timed_out);
        assert_eq!(selection.test_set.len(), 3);
        assert_eq!(selection.scores[0], 1.0);
        assert_eq!(&ids(&selection)[..2], ["p0", "p100"]);
    }

    #[test]
    fn test_single_slot_pulls_one_candidate() {
        let mut selector = DissimilarTestCaseSelector::new(Line, Prioritization::Minimum)
            .with_config(SelectionConfig::default().with_max_size(1));
        let selection = selector.select((7u32..).map(point)).unwrap();
        assert_eq!(ids(&selection), ["p7"]);
        assert!(!selection.timed_out);
    }
}
