//! Command-line interface: run a mode, profile a dataset, replay a back-test.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::explore::Explorer;
use crate::orchestrator::{EvaluationReport, Orchestrator, RunOutcome, TrainingReport};
use crate::utils::{split_at, DataLoader};
use tracing::warn;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<22}", key)), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cartcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Basket-value regression with persisted encoders and a grid-searched forest")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit (save_cv) or score (evaluation) on a CSV file
    Run {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// save_cv or evaluation
        #[arg(short, long, default_value = "save_cv")]
        mode: String,

        /// Keep only the first N rows
        #[arg(long, conflicts_with = "tail")]
        head: Option<usize>,

        /// Keep only the last N rows
        #[arg(long)]
        tail: Option<usize>,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print descriptive statistics of a CSV file
    Describe {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Column correlations are measured against
        #[arg(short, long, default_value = "TotalCart")]
        target: String,
    },

    /// Fit on the head of one file, then evaluate on its remainder and on each extra file
    Backtest {
        /// CSV file the model is trained on
        #[arg(long)]
        train: PathBuf,

        /// Rows of the training file used for fitting
        #[arg(long, default_value = "800")]
        train_rows: usize,

        /// Additional period files to evaluate
        #[arg(short, long)]
        evaluate: Vec<PathBuf>,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    })
}

fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    step_run(&format!("Loading {}", path.display()));
    let start = Instant::now();
    let df = DataLoader::new().load_csv(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

fn print_training(report: &TrainingReport) {
    println!();
    println!("  {}", kv("Rows", &report.n_samples.to_string()));
    println!("  {}", kv("Candidates", &report.cv_results.len().to_string()));
    println!("  {}", kv("Best params", &report.best_params.to_string()));
    println!("  {}", kv("CV RMSE", &format!("{:.3}", report.best_score)).bold());

    if let Some(explanation) = &report.explanation {
        section("Feature importance");
        for fi in &explanation.impurity {
            let bar = "█".repeat((fi.importance * 40.0).round() as usize);
            println!("  {:<22} {:>6.3} {}", muted(&fi.feature), fi.importance, accent(&bar));
        }
    }
}

fn print_evaluation(label: &str, report: &EvaluationReport) {
    println!(
        "  {} {}",
        ok("✓"),
        kv(label, &format!("RMSE {} over {} rows", report.rmse, report.n_samples))
    );
}

fn print_outcome(label: &str, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Trained(report) => print_training(report),
        RunOutcome::Evaluated(report) => print_evaluation(label, report),
        RunOutcome::InvalidMode { message, .. } => println!("  {}", message.yellow()),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &Path,
    mode: &str,
    head: Option<usize>,
    tail: Option<usize>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section(&format!("Run {}", mode));

    let config = load_config(config_path)?;
    let mut df = load_data(data_path)?;
    if let Some(n) = head {
        df = df.head(Some(n));
    }
    if let Some(n) = tail {
        df = df.tail(Some(n));
    }

    let orchestrator = Orchestrator::from_config(config);
    let start = Instant::now();
    let outcome = orchestrator.run(&df, mode)?;
    print_outcome("Evaluation", &outcome);

    println!();
    println!("  {}", dim(&format!("finished in {:?}", start.elapsed())));
    Ok(())
}

pub fn cmd_describe(data_path: &Path, target: &str) -> anyhow::Result<()> {
    section("Describe");
    let df = load_data(data_path)?;
    let explorer = Explorer::new(&df).with_target(target);

    section("Numeric columns");
    println!(
        "  {:<22} {:>6} {:>10} {:>10} {:>10} {:>10}",
        muted("column"), muted("count"), muted("mean"), muted("std"), muted("min"), muted("max")
    );
    for s in explorer.global_description()? {
        println!(
            "  {:<22} {:>6} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            s.column, s.count, s.mean, s.std, s.min, s.max
        );
    }

    section("Null counts");
    for (column, nulls) in explorer.null_counts() {
        let count = if nulls == 0 { ok("0") } else { nulls.to_string().yellow() };
        println!("  {:<22} {}", muted(&column), count);
    }

    for dist in explorer.category_distributions()? {
        section(&format!("{} ({} categories)", dist.column, dist.n_distinct));
        for (category, pct) in &dist.shares {
            println!("  {}", kv(category, &format!("{:.1}%", pct)));
        }
    }

    section("Normality (Jarque-Bera)");
    for test in explorer.normality()? {
        let verdict = if test.is_normal() { ok("normal") } else { dim("not normal") };
        println!(
            "  {:<22} JB {:>10.3}  p {:>8.4}  {}",
            muted(&test.column), test.statistic, test.p_value, verdict
        );
    }

    if df.column(target).is_ok() {
        section(&format!("Correlation with {}", target));
        for c in explorer.correlation()? {
            println!("  {}", kv(&c.column, &format!("{:+.3}", c.r)));
        }
    }

    println!();
    Ok(())
}

/// Evaluation of one back-test period, kept even when it failed
pub type PeriodResult = (String, crate::Result<RunOutcome>);

fn print_period(label: &str, result: &crate::Result<RunOutcome>) {
    match result {
        Ok(outcome) => print_outcome(label, outcome),
        Err(e) => println!("  {} {}", "✗".red(), kv(label, &e.to_string())),
    }
}

/// Fit on the first `train_rows` rows of `df`, then score the remaining rows
/// and every period file. A failing period is reported and skipped.
pub fn backtest(
    orchestrator: &Orchestrator,
    df: &DataFrame,
    train_rows: usize,
    evaluate: &[PathBuf],
) -> anyhow::Result<Vec<PeriodResult>> {
    let (train, holdout) = split_at(df, train_rows);

    step_run(&format!("Fitting on {} rows", train.height()));
    let start = Instant::now();
    let outcome = orchestrator.run(&train, "save_cv")?;
    step_done(&format!("{:?}", start.elapsed()));
    print_outcome("Training", &outcome);

    section("Evaluation");
    let mut periods = Vec::with_capacity(evaluate.len() + 1);
    if holdout.height() > 0 {
        let result = orchestrator.run(&holdout, "evaluation");
        print_period("Holdout", &result);
        periods.push(("Holdout".to_string(), result));
    }
    for path in evaluate {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("period")
            .to_string();
        let result = DataLoader::new()
            .load_csv(path)
            .and_then(|period| orchestrator.run(&period, "evaluation"));
        if let Err(e) = &result {
            warn!(period = %label, error = %e, "Period evaluation failed");
        }
        print_period(&label, &result);
        periods.push((label, result));
    }

    Ok(periods)
}

pub fn cmd_backtest(
    train_path: &Path,
    train_rows: usize,
    evaluate: &[PathBuf],
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Back-test");

    let config = load_config(config_path)?;
    let orchestrator = Orchestrator::from_config(config);
    let df = load_data(train_path)?;

    let periods = backtest(&orchestrator, &df, train_rows, evaluate)?;
    let scored = periods.iter().filter(|(_, r)| r.is_ok()).count();

    println!();
    println!("  {}", kv("Scored", &format!("{}/{} periods", scored, periods.len())));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CartcastError;
    use crate::optimizer::{ParamGrid, SearchConfig};
    use crate::schema::Schema;

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig::default()
            .with_schema(Schema::new(
                vec!["Age".to_string(), "Orders".to_string()],
                vec!["TopCategory".to_string()],
                "TotalCart",
            ))
            .with_artifacts_dir(root.join("artifacts"))
            .with_outputs_dir(root.join("outputs"))
            .with_search(SearchConfig::default().with_cv_folds(3).with_n_jobs(Some(2)))
            .with_param_grid(
                ParamGrid::new()
                    .with_param("n_estimators", [5i64])
                    .with_param("max_depth", [3i64]),
            )
    }

    fn train_frame(n: usize) -> DataFrame {
        let categories = ["Beauty", "Clothing"];
        let age: Vec<f64> = (0..n).map(|i| 20.0 + (i * 7 % 40) as f64).collect();
        let orders: Vec<i64> = (0..n).map(|i| (i * 3 % 11) as i64).collect();
        let top: Vec<&str> = (0..n).map(|i| categories[i % 2]).collect();
        let total: Vec<f64> = (0..n)
            .map(|i| 2.0 * age[i] + 10.0 * orders[i] as f64 + (i % 2) as f64 * 15.0)
            .collect();
        df![
            "Age" => age,
            "Orders" => orders,
            "TopCategory" => top,
            "TotalCart" => total,
        ]
        .unwrap()
    }

    fn write_period(path: &Path, category: &str) {
        let mut text = String::from("Age,Orders,TopCategory,TotalCart\n");
        for i in 0..6 {
            let age = 25.0 + 5.0 * i as f64;
            text.push_str(&format!("{:.1},{},{},{:.1}\n", age, i, category, 2.0 * age + 10.0 * i as f64));
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_failing_period_does_not_stop_later_periods() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::from_config(config(dir.path()));

        let unseen = dir.path().join("p1.csv");
        let valid = dir.path().join("p2.csv");
        write_period(&unseen, "Toys");
        write_period(&valid, "Beauty");

        let periods = backtest(&orchestrator, &train_frame(50), 50, &[unseen, valid]).unwrap();
        assert_eq!(periods.len(), 2);

        let (label, result) = &periods[0];
        assert_eq!(label, "p1");
        assert!(matches!(
            result,
            Err(CartcastError::UnseenCategory { value, .. }) if value == "Toys"
        ));

        let (label, result) = &periods[1];
        assert_eq!(label, "p2");
        match result {
            Ok(RunOutcome::Evaluated(report)) => {
                assert_eq!(report.n_samples, 6);
                assert!(report.rmse >= 0.0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_period_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::from_config(config(dir.path()));
        let missing = dir.path().join("p9.csv");

        let periods = backtest(&orchestrator, &train_frame(60), 50, &[missing]).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].0, "Holdout");
        assert!(periods[0].1.is_ok());
        assert!(matches!(periods[1].1, Err(CartcastError::DataError(_))));
    }
}
