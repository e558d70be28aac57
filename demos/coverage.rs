use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::info;

use fts_rs::coverage::{ActionCoverage, StateCoverage, StructuralCoverage, TransitionCoverage, TransitionPairCoverage};
use fts_rs::execution::{Execution, TestCase, TestSet};
use fts_rs::executor::{ExecutorConfig, FeaturedTransitionSystemExecutor};
use fts_rs::feature_model::{FeatureModel, FeatureModelBuilder, GroupType};
use fts_rs::fexpr::FExpression;
use fts_rs::selection::{DissimilarTestCaseSelector, FtsTestCaseDissimilarity, Prioritization, SelectionConfig};
use fts_rs::solver::SolverType;
use fts_rs::stats::TransitionSystemStats;
use fts_rs::ts::{FeaturedTransitionSystem, FeaturedTransitionSystemBuilder, Transition};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Sat,
    Bdd,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Aggregation {
    Minimum,
    Average,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of test cases to select.
    #[arg(value_name = "INT", default_value = "3")]
    budget: usize,

    /// Solver backend for the feature model.
    #[clap(long, value_enum, default_value = "bdd")]
    solver: Backend,

    /// How the score of a candidate is aggregated.
    #[clap(long, value_enum, default_value = "minimum")]
    prioritization: Aggregation,

    /// Time limit for the selection, in milliseconds.
    #[clap(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Improve the greedy selection by swapping test cases.
    #[clap(long)]
    refine: bool,

    /// Simplify product constraints every N steps (0 disables).
    #[clap(long, value_name = "INT", default_value = "1")]
    simplify_every: usize,
}

fn var(name: &str) -> FExpression {
    FExpression::feature_expr(name)
}

/// Vending machines: soda is optional, every machine serves either tea or coffee.
fn vending(solver: SolverType) -> color_eyre::Result<(FeatureModel, FeaturedTransitionSystem)> {
    let mut builder = FeatureModelBuilder::new().with_solver(solver);
    let root = builder.set_root_feature("VendingMachine")?;
    let g = builder.add_group(root, GroupType::Optional)?;
    builder.add_feature(g, "Soda")?;
    let g = builder.add_group(root, GroupType::Mandatory)?;
    let hot = builder.add_feature(g, "Hot")?;
    let g = builder.add_group(hot, GroupType::Alternative)?;
    builder.add_features(g, ["Tea", "Coffee"])?;
    let g = builder.add_group(root, GroupType::Optional)?;
    builder.add_feature(g, "Cancel")?;
    let model = builder.build()?;

    let mut fts = FeaturedTransitionSystemBuilder::new("idle");
    fts.add_transition("idle", "pay", "paid", FExpression::true_value());
    fts.add_transition("paid", "serve", "idle", var("Soda"));
    fts.add_transition("paid", "serve", "brewing", var("Hot"));
    fts.add_transition("brewing", "tea", "idle", var("Tea"));
    fts.add_transition("brewing", "coffee", "idle", var("Coffee"));
    fts.add_transition("paid", "cancel", "returning", var("Cancel"));
    fts.add_transition("returning", "refund", "idle", var("Cancel"));
    Ok((model, fts.build()))
}

fn pool() -> color_eyre::Result<TestSet> {
    let steps: &[(&str, &[(&str, &str, &str)])] = &[
        ("soda", &[("idle", "pay", "paid"), ("paid", "serve", "idle")]),
        ("tea", &[("idle", "pay", "paid"), ("paid", "serve", "brewing"), ("brewing", "tea", "idle")]),
        ("coffee", &[("idle", "pay", "paid"), ("paid", "serve", "brewing"), ("brewing", "coffee", "idle")]),
        ("cancel", &[("idle", "pay", "paid"), ("paid", "cancel", "returning"), ("returning", "refund", "idle")]),
        (
            "soda-cancel",
            &[
                ("idle", "pay", "paid"),
                ("paid", "serve", "idle"),
                ("idle", "pay", "paid"),
                ("paid", "cancel", "returning"),
                ("returning", "refund", "idle"),
            ],
        ),
        (
            "tea-twice",
            &[
                ("idle", "pay", "paid"),
                ("paid", "serve", "brewing"),
                ("brewing", "tea", "idle"),
                ("idle", "pay", "paid"),
                ("paid", "serve", "brewing"),
                ("brewing", "tea", "idle"),
            ],
        ),
    ];
    let mut tests = TestSet::new();
    for (id, path) in steps {
        let execution = Execution::from_transitions(path.iter().map(|&(s, a, t)| Transition::new(s, a, t)))?;
        tests.push(TestCase::new(*id, execution));
    }
    Ok(tests)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let solver = match args.solver {
        Backend::Sat => SolverType::Sat,
        Backend::Bdd => SolverType::Bdd,
    };
    let (mut model, fts) = vending(solver)?;
    println!("feature model = {}", model.expression());
    println!("products = {}", model.number_of_solutions()?);
    println!("core features = {:?}", model.core_features()?);
    println!("stats:\n{}", TransitionSystemStats::compute(fts.ts()));

    let tests = pool()?;
    let executor_config = ExecutorConfig::default().with_simplify_every(args.simplify_every);

    let executor =
        FeaturedTransitionSystemExecutor::with_config(&fts, executor_config).with_solver(model.solver_mut());
    let mut states = StructuralCoverage::new(StateCoverage, executor);
    println!("state coverage = {:.3}", states.coverage_of_test_set(&tests)?);
    let executor = states.into_executor();
    let mut actions = StructuralCoverage::new(ActionCoverage, executor);
    println!("action coverage = {:.3}", actions.coverage_of_test_set(&tests)?);
    let executor = actions.into_executor();
    let mut transitions = StructuralCoverage::new(TransitionCoverage, executor);
    println!("transition coverage = {:.3}", transitions.coverage_of_test_set(&tests)?);
    let executor = transitions.into_executor();
    let mut pairs = StructuralCoverage::new(TransitionPairCoverage, executor);
    println!("transition pair coverage = {:.3}", pairs.coverage_of_test_set(&tests)?);
    drop(pairs);

    let prioritization = match args.prioritization {
        Aggregation::Minimum => Prioritization::Minimum,
        Aggregation::Average => Prioritization::Average,
    };
    let mut config = SelectionConfig::default()
        .with_max_size(args.budget)
        .with_refine(args.refine);
    if let Some(ms) = args.timeout {
        config = config.with_running_time(Duration::from_millis(ms));
    }

    let dissimilarity =
        FtsTestCaseDissimilarity::new(&fts, model.solver_mut()).with_executor_config(executor_config);
    let mut selector = DissimilarTestCaseSelector::new(dissimilarity, prioritization).with_config(config);
    let selection = selector.select(&tests)?;
    info!("Selection finished (timed out: {})", selection.timed_out);

    for (test_case, score) in selection.test_set.iter().zip(&selection.scores) {
        println!("  {:>12}  score = {:.3}  {}", test_case.id(), score, test_case.execution());
    }
    println!("fitness history = {:?}", selection.fitness_history);

    let mut dissimilarity = selector.into_dissimilarity();
    for test_case in &selection.test_set {
        println!("  {} runs on: {}", test_case.id(), dissimilarity.product_constraint(test_case)?);
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
