use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use lex_baseline::data::{
    DEFAULT_MISSING_MARKERS, normalize_missing, read_csv, split_target, train_test_split,
};
use lex_baseline::{
    CandidateResult, EvaluationReport, FullPipeline, GridSearch, ImputeStrategy, LogisticParams,
    Penalty, PipelineConfig, Scoring, SearchConfig, StratifiedKFold, cross_val_score,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// CLI-compatible imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliImputeStrategy {
    /// Fill with the most frequent value of the column
    MostFrequent,
    /// Fill with the literal category "0"
    Zero,
}

impl From<CliImputeStrategy> for ImputeStrategy {
    fn from(cli: CliImputeStrategy) -> Self {
        match cli {
            CliImputeStrategy::MostFrequent => ImputeStrategy::MostFrequent,
            CliImputeStrategy::Zero => ImputeStrategy::ZeroFill,
        }
    }
}

/// CLI-compatible penalty enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPenalty {
    L1,
    L2,
}

impl From<CliPenalty> for Penalty {
    fn from(cli: CliPenalty) -> Self {
        match cli {
            CliPenalty::L1 => Penalty::L1,
            CliPenalty::L2 => Penalty::L2,
        }
    }
}

/// CLI-compatible scoring enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScoring {
    Accuracy,
    RocAuc,
}

impl From<CliScoring> for Scoring {
    fn from(cli: CliScoring) -> Self {
        match cli {
            CliScoring::Accuracy => Scoring::Accuracy,
            CliScoring::RocAuc => Scoring::RocAuc,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Logistic regression baseline for tabular classification",
    long_about = "Trains a preprocessing + logistic regression pipeline on a CSV file,\n\
                  evaluates it on a validation split, tunes it with grid search and\n\
                  saves the fitted pipeline.\n\n\
                  EXAMPLES:\n  \
                  # Adult census income baseline\n  \
                  lex-baseline -i adult.csv --target income\n\n  \
                  # Skip the grid search, write a JSON report\n  \
                  lex-baseline -i adult.csv --skip-search --emit-report"
)]
struct Args {
    /// Path to the CSV file with features and target
    #[arg(short, long)]
    input: String,

    /// Target column (binary)
    #[arg(short, long, default_value = "income")]
    target: String,

    /// Where to save the fitted pipeline
    #[arg(short, long, default_value = "experiments/baseline_model.json")]
    output: PathBuf,

    /// Share of rows used for training; the rest is the validation split
    #[arg(long, default_value = "0.75")]
    train_size: f64,

    /// Seed for the split and the solver
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Categorical columns to impute (comma separated)
    ///
    /// Columns absent from the dataset are skipped. When none remain, every
    /// categorical column is imputed.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "workclass,occupation,native-country"
    )]
    impute_columns: Vec<String>,

    /// Strategy for imputing missing categorical values
    #[arg(long, value_enum, default_value = "most-frequent")]
    impute_strategy: CliImputeStrategy,

    /// Keep an indicator for every category instead of dropping the first
    #[arg(long)]
    keep_first: bool,

    /// Penalty of the baseline model
    #[arg(long, value_enum, default_value = "l2")]
    penalty: CliPenalty,

    /// Inverse regularization strength of the baseline model
    #[arg(short = 'C', long = "c", default_value = "1.0")]
    c: f64,

    /// Maximum solver rounds
    #[arg(long, default_value = "200")]
    max_iter: usize,

    /// Folds for the baseline cross-validation score
    #[arg(long, default_value = "5")]
    cv_folds: usize,

    /// Folds for the grid search
    #[arg(long, default_value = "10")]
    search_folds: usize,

    /// Metric the grid search optimizes
    #[arg(long, value_enum, default_value = "roc-auc")]
    scoring: CliScoring,

    /// Run grid search folds in parallel
    #[arg(long)]
    parallel: bool,

    /// Skip the grid search and save the baseline model
    #[arg(long)]
    skip_search: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and results)
    #[arg(short, long)]
    quiet: bool,

    /// Output the JSON report to stdout instead of a human-readable summary
    #[arg(long)]
    json: bool,

    /// Write the JSON report next to the saved model
    ///
    /// The report will be saved as <model_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds
/// the JSON report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[derive(Debug, Serialize)]
struct CrossValidationSummary {
    folds: usize,
    scores: Vec<f64>,
    mean: f64,
}

#[derive(Debug, Serialize)]
struct SearchSummary {
    scoring: &'static str,
    best_params: LogisticParams,
    best_score: f64,
    results: Vec<CandidateResult>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    input: String,
    target: String,
    train_rows: usize,
    validation_rows: usize,
    feature_count: usize,
    validation: EvaluationReport,
    cross_validation: CrossValidationSummary,
    grid_search: Option<SearchSummary>,
    model_path: String,
    reloaded_accuracy: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading dataset from: {}", args.input);
    let raw = read_csv(&args.input)?;
    let data = normalize_missing(&raw, DEFAULT_MISSING_MARKERS)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let (features, labels) = split_target(&data, &args.target)?;
    let split = train_test_split(&features, &labels, args.train_size, args.seed)?;
    info!(
        "Split: {} training rows, {} validation rows",
        split.train.height(),
        split.test.height()
    );

    let config = build_config(&args, &features)?;
    let mut pipeline = FullPipeline::new(config);

    // Baseline fit and validation
    pipeline.fit(&split.train, &split.train_labels)?;
    let validation = pipeline.evaluate(&split.test, &split.test_labels)?;

    // Baseline cross-validation on the training split
    let cv_scores = cross_val_score(
        &pipeline,
        &split.train,
        &split.train_labels,
        &StratifiedKFold::new(args.cv_folds),
        Scoring::Accuracy,
    )?;
    let cv_mean = cv_scores.iter().sum::<f64>() / cv_scores.len() as f64;

    // Grid search over penalty x C
    let (model, grid_search) = if args.skip_search {
        (pipeline, None)
    } else {
        let search_config = SearchConfig::builder()
            .folds(args.search_folds)
            .scoring(args.scoring.into())
            .seed(args.seed)
            .parallel(args.parallel)
            .build()?;
        let scoring = search_config.scoring;
        let mut search = GridSearch::new(pipeline, search_config);
        search.fit(&split.train, &split.train_labels)?;

        let summary = SearchSummary {
            scoring: scoring.as_str(),
            best_params: search.best_params()?,
            best_score: search.best_score()?,
            results: search.cv_results()?.to_vec(),
        };
        (search.into_best_pipeline()?, Some(summary))
    };

    // Save, reload and rescore
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    model.save(&args.output)?;
    let reloaded = FullPipeline::load(&args.output)?;
    let reloaded_accuracy = reloaded.score(&split.test, &split.test_labels)?;

    let report = RunReport {
        input: args.input.clone(),
        target: args.target.clone(),
        train_rows: split.train.height(),
        validation_rows: split.test.height(),
        feature_count: model.feature_names()?.len(),
        validation,
        cross_validation: CrossValidationSummary {
            folds: args.cv_folds,
            scores: cv_scores,
            mean: cv_mean,
        },
        grid_search,
        model_path: args.output.display().to_string(),
        reloaded_accuracy,
    };

    if args.emit_report {
        let report_path = report_path(&args.output);
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to {}", report_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Pipeline configuration from the CLI flags.
fn build_config(args: &Args, features: &polars::prelude::DataFrame) -> Result<PipelineConfig> {
    let (present, missing): (Vec<String>, Vec<String>) = args
        .impute_columns
        .iter()
        .filter(|name| !name.is_empty())
        .cloned()
        .partition(|name| features.column(name).is_ok());
    if !missing.is_empty() {
        warn!("Imputation columns not in dataset, skipped: {:?}", missing);
    }

    let mut builder = PipelineConfig::builder()
        .impute_strategy(args.impute_strategy.into())
        .drop_first(!args.keep_first)
        .penalty(args.penalty.into())
        .c(args.c)
        .max_iter(args.max_iter)
        .random_seed(args.seed);
    if !present.is_empty() {
        builder = builder.impute_columns(present);
    }

    Ok(builder.build()?)
}

fn report_path(model_path: &Path) -> PathBuf {
    let stem = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "baseline_model".to_string());
    model_path.with_file_name(format!("{}_report.json", stem))
}

/// Print the run results.
///
/// Uses `println!` on purpose: this is the CLI's output, not logging.
fn print_summary(report: &RunReport) {
    println!();
    println!("{}", "=".repeat(80));
    println!("BASELINE LOGISTIC REGRESSION");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Data: {} ({} training rows, {} validation rows, {} features)",
        report.input, report.train_rows, report.validation_rows, report.feature_count
    );
    println!();

    let v = &report.validation;
    println!("VALIDATION");
    println!("{}", "-".repeat(40));
    println!("  Accuracy: {:.2} %", 100.0 * v.accuracy);
    println!("  AUC:      {:.2} %", 100.0 * v.roc_auc);
    let cm = &v.confusion_matrix;
    println!("  Confusion matrix (rows = true, cols = predicted):");
    println!("  {:>12} {:>12} {:>12}", "", cm.classes[0], cm.classes[1]);
    for (label, row) in cm.classes.iter().zip(cm.counts.iter()) {
        println!("  {:>12} {:>12} {:>12}", label, row[0], row[1]);
    }
    println!();

    println!("CROSS-VALIDATION ({} folds)", report.cross_validation.folds);
    println!("{}", "-".repeat(40));
    println!("  Mean accuracy: {:.2} %", 100.0 * report.cross_validation.mean);
    println!();

    if let Some(ref search) = report.grid_search {
        println!("GRID SEARCH ({})", search.scoring);
        println!("{}", "-".repeat(40));
        for result in &search.results {
            println!(
                "  penalty={} C={:<4} mean={:.4} std={:.4} rank={}",
                result.params.penalty.as_str(),
                result.params.c,
                result.mean_score,
                result.std_score,
                result.rank
            );
        }
        println!(
            "  Best params: penalty={} C={}",
            search.best_params.penalty.as_str(),
            search.best_params.c
        );
        println!("  Best score:  {:.3}", search.best_score);
        println!();
    }

    println!("Model saved to: {}", report.model_path);
    println!("Reloaded model test score: {:.2} %", 100.0 * report.reloaded_accuracy);
    println!("{}", "=".repeat(80));
}
