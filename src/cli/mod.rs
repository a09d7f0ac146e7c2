//! ra-models CLI Module
//!
//! Command-line interface for fitting the estimator wrappers on a CSV file.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::estimators::{Estimator, EstimatorKind, ElasticNetCVKind, RandomForestClassifierKind, RandomForestRegressorKind};
use crate::optimizer::{FitConfiguration, FitOptions, GridSearchConfig, Scoring};
use crate::utils::load_csv;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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

fn metric_line(name: &str, value: f64) {
    let shown = if value.is_finite() {
        format!("{:.4}", value).white().bold()
    } else {
        "n/a".yellow()
    };
    println!("  {:<22} {}", muted(name), shown);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ra-models")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grid-searched elastic-net and random-forest models on tabular data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Estimator wrapper to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    /// Elastic net with cross-validated alpha
    Encv,
    /// Random forest regressor
    RfRegressor,
    /// Random forest classifier
    RfClassifier,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a model and report its test-set metrics
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        #[arg(short, long, value_enum)]
        model: ModelChoice,

        /// Training fraction of the rows
        #[arg(long, default_value = "0.8")]
        train_split: f64,

        /// Search the parameter grid, then refit with the best combination
        #[arg(long)]
        grid: bool,

        /// Values kept per non-locked grid parameter (0 searches the defaults only)
        #[arg(long, default_value = "0")]
        count: usize,

        /// Grid search folds (model default when omitted)
        #[arg(long)]
        cv: Option<usize>,

        /// Grid search scoring rule, e.g. r2 or accuracy (model default when omitted)
        #[arg(long)]
        scoring: Option<String>,

        /// Worker threads; -1 uses every core
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        n_jobs: i64,

        /// JSON file of parameter overrides for a direct fit
        #[arg(long, conflicts_with = "grid")]
        params: Option<PathBuf>,

        /// Directory receiving the test prediction plot
        #[arg(long)]
        plot_dir: Option<PathBuf>,

        /// File receiving the best grid parameters as JSON
        #[arg(long, requires = "grid")]
        best_params_out: Option<PathBuf>,

        /// Log fit and grid progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a model's parameter table
    Params {
        #[arg(short, long, value_enum)]
        model: ModelChoice,

        /// Number of feature columns the grids are sized for
        #[arg(short, long, default_value = "4")]
        features: usize,
    },
}

/// Settings of one `train` invocation
pub struct TrainArgs {
    pub data: PathBuf,
    pub target: String,
    pub train_split: f64,
    pub grid: bool,
    pub grid_config: GridSearchConfig,
    pub params: Option<PathBuf>,
    pub plot_dir: Option<PathBuf>,
    pub best_params_out: Option<PathBuf>,
    pub verbose: bool,
}

impl TrainArgs {
    /// Collect the `train` subcommand's arguments
    pub fn from_command(command: &Commands) -> anyhow::Result<Option<(ModelChoice, Self)>> {
        let Commands::Train {
            data, target, model, train_split, grid, count, cv, scoring, n_jobs,
            params, plot_dir, best_params_out, verbose,
        } = command
        else {
            return Ok(None);
        };

        let mut grid_config = GridSearchConfig::new().with_count(*count).with_n_jobs(*n_jobs);
        if let Some(folds) = cv {
            grid_config = grid_config.with_cv(*folds);
        }
        if let Some(name) = scoring {
            grid_config = grid_config.with_scoring(name.parse::<Scoring>()?);
        }

        Ok(Some((
            *model,
            Self {
                data: data.clone(),
                target: target.clone(),
                train_split: *train_split,
                grid: *grid,
                grid_config,
                params: params.clone(),
                plot_dir: plot_dir.clone(),
                best_params_out: best_params_out.clone(),
                verbose: *verbose,
            },
        )))
    }
}

/// Load a CSV file
pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "csv" => Ok(load_csv(path)?),
        _ => anyhow::bail!("Unsupported file format: {}", ext),
    }
}

/// Split a frame into the feature frame and the single-column target frame
pub fn split_target(df: &DataFrame, target: &str) -> anyhow::Result<(DataFrame, DataFrame)> {
    if df.column(target).is_err() {
        anyhow::bail!("Target column '{}' not found", target);
    }
    let task = df.drop(target)?;
    let target = df.select([target])?;
    Ok((task, target))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(model: ModelChoice, args: &TrainArgs) -> anyhow::Result<()> {
    match model {
        ModelChoice::Encv => train_with::<ElasticNetCVKind>(args),
        ModelChoice::RfRegressor => train_with::<RandomForestRegressorKind>(args),
        ModelChoice::RfClassifier => train_with::<RandomForestClassifierKind>(args),
    }
}

fn train_with<K: EstimatorKind>(args: &TrainArgs) -> anyhow::Result<()> {
    section(&format!("Train {}", K::NAME));

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(&args.data)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let (task, target) = split_target(&df, &args.target)?;
    let mut estimator = Estimator::<K>::new(&task, &target, args.train_split, args.verbose)?;
    step_ok(&format!(
        "{} train rows, {} test rows, {} features",
        estimator.train_size(),
        estimator.test_size(),
        estimator.feature_names().len()
    ));

    let options = FitOptions::new()
        .with_n_jobs(args.grid_config.n_jobs)
        .with_show(args.verbose);

    if args.grid {
        step_run("Searching grid");
        let start = Instant::now();
        let study = estimator.fit_grid(None, args.grid_config.clone())?;
        step_done(&format!(
            "{} combinations, {} skipped, {:?}",
            study.trials.len(),
            study.n_failed(),
            start.elapsed()
        ));
        println!(
            "  {:<22} {}",
            muted(&format!("best {}", study.scoring)),
            format!("{:.4}", study.best_value().unwrap_or(f64::NAN)).white()
        );
        println!("  {:<22} {}", muted("best params"), estimator.grid_best_params()?.to_string().white());

        if let Some(path) = &args.best_params_out {
            estimator.save_best_params(path)?;
            step_ok(&format!("Best parameters written to {}", path.display()));
        }

        step_run(&format!("Refitting {}", K::NAME.cyan()));
        let start = Instant::now();
        estimator.fit(None, true, options)?;
        step_done(&format!("{:?}", start.elapsed()));
    } else {
        let overrides: Option<FitConfiguration> = match &args.params {
            Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
            None => None,
        };
        step_run(&format!("Training {}", K::NAME.cyan()));
        let start = Instant::now();
        estimator.fit(overrides.as_ref(), false, options)?;
        step_done(&format!("{:?}", start.elapsed()));
    }

    section("Test metrics");
    metric_line("Mean squared error", estimator.mean_squared_error()?);
    metric_line("Mean absolute error", estimator.mean_absolute_error()?);
    metric_line("ROC AUC", estimator.roc_auc_score()?);

    section("Feature importance");
    for (name, importance) in estimator.feature_importance()?.iter().take(10) {
        println!("  {:<22} {}", muted(name), format!("{:.4}", importance).white());
    }

    if let Some(dir) = &args.plot_dir {
        let path = estimator.plot_predictions(dir)?;
        println!();
        step_ok(&format!("Plot written to {}", path.display()));
    }
    println!();

    Ok(())
}

pub fn cmd_params(model: ModelChoice, n_features: usize) -> anyhow::Result<()> {
    match model {
        ModelChoice::Encv => params_with::<ElasticNetCVKind>(n_features),
        ModelChoice::RfRegressor => params_with::<RandomForestRegressorKind>(n_features),
        ModelChoice::RfClassifier => params_with::<RandomForestClassifierKind>(n_features),
    }
}

fn params_with<K: EstimatorKind>(n_features: usize) -> anyhow::Result<()> {
    let table = K::param_table(n_features)?;
    section(&format!("{} parameters ({} features)", K::NAME, n_features));

    for spec in table.specs() {
        let kinds: Vec<String> = spec.kinds.iter().map(ToString::to_string).collect();
        let grid: Vec<String> = spec.grid.iter().map(ToString::to_string).collect();
        let lock = if spec.locked { dim("locked") } else { "".normal() };
        println!(
            "  {:<26} {:<18} {:<10} {}",
            accent(&spec.name),
            muted(&kinds.join(" | ")),
            spec.default.to_string().white(),
            lock
        );
        println!("  {:<26} {}", "", dim(&format!("[{}]", grid.join(", "))));
    }
    println!();

    Ok(())
}
