use fts_rs::coverage::{
    ActionCoverage, StateCoverage, StructuralCoverage, TransitionCoverage, TransitionPair, TransitionPairCoverage,
};
use fts_rs::error::{CoverageError, ExecutionError};
use fts_rs::execution::{Execution, TestCase, TestSet};
use fts_rs::executor::{Executor, FeaturedTransitionSystemExecutor, TransitionSystemExecutor};
use fts_rs::feature_model::{FeatureModel, FeatureModelBuilder, GroupType};
use fts_rs::fexpr::FExpression;
use fts_rs::selection::{
    ActionSequenceDissimilarity, DissimilarTestCaseSelector, ElementSetDissimilarity, FtsTestCaseDissimilarity,
    Prioritization, SelectionConfig, TestCaseDissimilarity,
};
use fts_rs::solver::{SolverFacade, SolverType};
use fts_rs::ts::{
    Action, FeaturedTransitionSystem, FeaturedTransitionSystemBuilder, Transition, TransitionSystem,
    TransitionSystemBuilder,
};
use test_log::test;

fn var(name: &str) -> FExpression {
    FExpression::feature_expr(name)
}

fn path(transitions: &[(&str, &str, &str)]) -> Execution {
    Execution::from_transitions(transitions.iter().map(|&(s, a, t)| Transition::new(s, a, t))).unwrap()
}

fn branching() -> TransitionSystem {
    let mut builder = TransitionSystemBuilder::new("s0");
    builder.add_transition("s0", "a", "s1");
    builder.add_transition("s1", "b", "s2");
    builder.add_transition("s1", "b", "s0");
    builder.build()
}

#[test]
fn test_nondeterministic_execution_covers_all_states() {
    let ts = branching();
    let mut executor = TransitionSystemExecutor::new(&ts);
    executor.execute(&[Action::new("a"), Action::new("b")]).unwrap();

    let executions: Vec<Execution> = executor.current_executions().cloned().collect();
    assert_eq!(
        executions,
        [
            path(&[("s0", "a", "s1"), ("s1", "b", "s2")]),
            path(&[("s0", "a", "s1"), ("s1", "b", "s0")]),
        ]
    );

    let coverage = StructuralCoverage::new(StateCoverage, TransitionSystemExecutor::new(&ts));
    assert_eq!(coverage.coverage_of_executions(&executions), 1.0);
    assert!(coverage.coverage_of_execution(&executions[1]) < 1.0);
}

#[test]
fn test_mandatory_and_optional_children() {
    for solver in [SolverType::Sat, SolverType::Bdd] {
        let mut builder = FeatureModelBuilder::new().with_solver(solver);
        let root = builder.set_root_feature("R").unwrap();
        let g = builder.add_group(root, GroupType::Mandatory).unwrap();
        builder.add_feature(g, "A").unwrap();
        let g = builder.add_group(root, GroupType::Optional).unwrap();
        builder.add_feature(g, "B").unwrap();
        let model = builder.build().unwrap();

        assert_eq!(model.expression(), &FExpression::all([var("R"), var("A"), var("B").or(&var("B").not())]));
        assert_eq!(model.number_of_solutions().unwrap(), 2u32.into());
        let mut seen: Vec<bool> = model
            .solutions()
            .unwrap()
            .map(|c| c.is_selected(&"B".into()))
            .collect();
        seen.sort();
        assert_eq!(seen, [false, true]);
    }
}

#[test]
fn test_optional_children_count() {
    for n in [1u32, 4, 9] {
        let mut builder = FeatureModelBuilder::new().with_solver(SolverType::Bdd);
        let root = builder.set_root_feature("Root").unwrap();
        for i in 0..n {
            let g = builder.add_group(root, GroupType::Optional).unwrap();
            builder.add_feature(g, &format!("F{}", i)).unwrap();
        }
        let model = builder.build().unwrap();
        assert_eq!(model.number_of_solutions().unwrap(), (1u64 << n).into());
    }
}

#[test]
fn test_transition_pair_coverage() {
    let execution = path(&[("s0", "a", "s1"), ("s1", "b", "s0"), ("s0", "a", "s1")]);
    let t = execution.transitions().to_vec();
    let ts = branching();
    let coverage = StructuralCoverage::new(TransitionPairCoverage, TransitionSystemExecutor::new(&ts));

    let pair = |x: &Transition, y: &Transition| TransitionPair {
        first: x.clone(),
        second: y.clone(),
    };
    assert!(coverage.elements_to_cover().contains(&pair(&t[0], &t[1])));
    assert!(coverage.elements_to_cover().contains(&pair(&t[1], &t[2])));
    // The other pair through s1 is not exercised
    let skip = pair(&t[0], &Transition::new("s1", "b", "s2"));
    assert!(coverage.elements_to_cover().contains(&skip));
    assert!((coverage.coverage_of_execution(&execution) - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_empty_coverage_domains() {
    let ts = TransitionSystemBuilder::new("lonely").build();
    let mut actions = StructuralCoverage::new(ActionCoverage, TransitionSystemExecutor::new(&ts));
    assert_eq!(actions.coverage_of_execution(&Execution::new()), 0.0);
    assert_eq!(actions.coverage_of_test_set(&TestSet::new()).unwrap(), 0.0);

    let ts = branching();
    let transitions = StructuralCoverage::new(TransitionCoverage, TransitionSystemExecutor::new(&ts));
    assert_eq!(transitions.coverage_of_execution(&Execution::new()), 0.0);
}

/// A vending machine family: soda is optional, tea and coffee are alternatives.
fn vending() -> (FeatureModel, FeaturedTransitionSystem) {
    let mut builder = FeatureModelBuilder::new().with_solver(SolverType::Bdd);
    let root = builder.set_root_feature("VM").unwrap();
    let g = builder.add_group(root, GroupType::Optional).unwrap();
    builder.add_feature(g, "Soda").unwrap();
    let g = builder.add_group(root, GroupType::Mandatory).unwrap();
    let hot = builder.add_feature(g, "Hot").unwrap();
    let g = builder.add_group(hot, GroupType::Alternative).unwrap();
    builder.add_features(g, ["Tea", "Coffee"]).unwrap();
    let model = builder.build().unwrap();

    let mut fts = FeaturedTransitionSystemBuilder::new("idle");
    fts.add_transition("idle", "pay", "paid", FExpression::true_value());
    fts.add_transition("paid", "serve", "idle", var("Soda"));
    fts.add_transition("paid", "serve", "brewing", var("Tea").or(&var("Coffee")));
    fts.add_transition("brewing", "tea", "idle", var("Tea"));
    fts.add_transition("brewing", "coffee", "idle", var("Coffee"));
    fts.add_transition("paid", "cancel", "idle", FExpression::true_value());
    (model, fts.build())
}

fn vending_tests() -> TestSet {
    [
        TestCase::new("soda", path(&[("idle", "pay", "paid"), ("paid", "serve", "idle")])),
        TestCase::new(
            "tea",
            path(&[("idle", "pay", "paid"), ("paid", "serve", "brewing"), ("brewing", "tea", "idle")]),
        ),
        TestCase::new(
            "coffee",
            path(&[("idle", "pay", "paid"), ("paid", "serve", "brewing"), ("brewing", "coffee", "idle")]),
        ),
        TestCase::new("cancel", path(&[("idle", "pay", "paid"), ("paid", "cancel", "idle")])),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_vending_machine_products() {
    let (mut model, fts) = vending();
    // Soda on/off times tea/coffee
    assert_eq!(model.number_of_solutions().unwrap(), 4u32.into());

    let tests = vending_tests();
    let mut executor = FeaturedTransitionSystemExecutor::new(&fts).with_solver(model.solver_mut());
    let tea = executor.product_constraint(tests.get("tea").unwrap()).unwrap();
    assert_eq!(tea, var("Tea").or(&var("Coffee")).and(&var("Tea")).apply_simplification());
    assert!(executor.product_constraint(tests.get("cancel").unwrap()).unwrap().is_true());
    // `serve` forks into both branches, so the soda test also runs on hot-drink products
    let soda = executor.product_constraint(tests.get("soda").unwrap()).unwrap();
    assert_eq!(soda.features().len(), 3);
    drop(executor);

    let mut products = model.configurations(tea);
    assert_eq!(products.size().unwrap(), 2u32.into());
}

#[test]
fn test_featured_coverage_needs_products() {
    let (mut model, fts) = vending();
    // Remove coffee from the product line
    model.add_solver_constraint(&var("Coffee").not()).unwrap();

    let executor = FeaturedTransitionSystemExecutor::new(&fts).with_solver(model.solver_mut());
    let mut coverage = StructuralCoverage::new(TransitionCoverage, executor);
    let tests = vending_tests();
    let err = coverage.coverage_of_test_case(tests.get("coffee").unwrap()).unwrap_err();
    assert!(matches!(
        err,
        CoverageError::Execution(ExecutionError::NoMatchingTransition { step: 2, .. })
    ));

    // The soda branch dies at the last step and covers nothing
    let tea = coverage.coverage_of_test_case(tests.get("tea").unwrap()).unwrap();
    assert_eq!(tea, 0.5);
}

#[test]
fn test_dissimilarity_is_symmetric() {
    let (mut model, fts) = vending();
    let tests = vending_tests();
    let mut d = FtsTestCaseDissimilarity::new(&fts, model.solver_mut());
    for a in &tests {
        assert_eq!(d.dissimilarity(a, a).unwrap(), 0.0);
        for b in &tests {
            let ab = d.dissimilarity(a, b).unwrap();
            let ba = d.dissimilarity(b, a).unwrap();
            assert_eq!(ab, ba, "{} vs {}", a.id(), b.id());
            assert!((0.0..=1.0).contains(&ab));
        }
    }
    drop(d);
    assert_eq!(model.solver().features().len(), 5);
}

#[test]
fn test_selection_respects_budget() {
    let (mut model, fts) = vending();
    let tests = vending_tests();
    let structural: ElementSetDissimilarity = ElementSetDissimilarity::default();
    let d = FtsTestCaseDissimilarity::with_structural(&fts, model.solver_mut(), structural)
        .with_combiner(|x, y| (x + y) / 2.0);
    for k in 0..=tests.len() + 1 {
        let config = SelectionConfig::default().with_max_size(k);
        let mut selector = DissimilarTestCaseSelector::new(
            ActionSequenceDissimilarity::<fts_rs::selection::Levenshtein>::default(),
            Prioritization::Minimum,
        )
        .with_config(config);
        let selection = selector.select(&tests).unwrap();
        assert_eq!(selection.test_set.len(), k.min(tests.len()));
        assert!(selection.scores.windows(2).all(|w| w[0] >= w[1]));
    }

    let config = SelectionConfig::default().with_max_size(3).with_refine(true);
    let mut selector = DissimilarTestCaseSelector::new(d, Prioritization::Minimum).with_config(config);
    let selection = selector.select(&tests).unwrap();
    assert_eq!(selection.test_set.len(), 3);
    assert!(!selection.fitness_history.is_empty());
    assert!(selection.fitness_history.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_min_pairwise_matches_latest_score() {
    let tests: TestSet = ["a", "ab", "abc", "abcd", "ba", "dcba", "c"]
        .iter()
        .map(|word| {
            let transitions = word.chars().map(|c| Transition::new("s", c.to_string().as_str(), "s"));
            TestCase::new(*word, Execution::from_transitions(transitions).unwrap())
        })
        .collect();
    let mut metric = ActionSequenceDissimilarity::<fts_rs::selection::Levenshtein>::default();

    for k in 2..=tests.len() {
        let config = SelectionConfig::default().with_max_size(k);
        let mut selector = DissimilarTestCaseSelector::new(metric.clone(), Prioritization::Minimum).with_config(config);
        let selection = selector.select(&tests).unwrap();
        let selected: Vec<&TestCase> = selection.test_set.iter().collect();
        let mut min = f64::INFINITY;
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                min = min.min(metric.dissimilarity(a, b).unwrap());
            }
        }
        assert_eq!(Some(&min), selection.scores.last());
    }
}
