//! Similarity-driven test selection for product lines.
//!
//! Test cases are compared by a [`TestCaseDissimilarity`]: either a purely
//! structural one (sets of covered elements, action sequences) or
//! [`FtsTestCaseDissimilarity`], which also weighs how different the
//! products able to run each test case are. [`DissimilarTestCaseSelector`]
//! uses it to pick a small, diverse subset of a pool.
//!
//! ```
//! use fts_rs::execution::{Execution, TestCase, TestSet};
//! use fts_rs::selection::{
//!     ActionSequenceDissimilarity, DissimilarTestCaseSelector, Prioritization, SelectionConfig,
//! };
//! use fts_rs::ts::Transition;
//!
//! let tc = |id: &str, actions: &[&str]| {
//!     let path = actions.iter().map(|&a| Transition::new("s", a, "s"));
//!     TestCase::new(id, Execution::from_transitions(path).unwrap())
//! };
//! let pool: TestSet = [tc("t1", &["a", "b"]), tc("t2", &["a", "b", "b"]), tc("t3", &["c"])]
//!     .into_iter()
//!     .collect();
//!
//! let mut selector = DissimilarTestCaseSelector::new(
//!     ActionSequenceDissimilarity::<fts_rs::selection::Levenshtein>::default(),
//!     Prioritization::Minimum,
//! )
//! .with_config(SelectionConfig::default().with_max_size(2));
//! let selection = selector.select(&pool).unwrap();
//! assert_eq!(selection.test_set.len(), 2);
//! assert!(selection.test_set.get("t3").is_some());
//! ```

pub mod dissimilarity;
pub mod selector;

pub use self::dissimilarity::{
    ActionSequenceDissimilarity, Dice, ElementSetDissimilarity, FtsTestCaseDissimilarity, Jaccard, Levenshtein,
    LongestCommonSubsequence, SequenceDissimilarity, SetDissimilarity, TestCaseDissimilarity,
};
pub use self::selector::{DissimilarTestCaseSelector, Prioritization, Selection, SelectionConfig};
