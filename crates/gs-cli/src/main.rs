//! GoFStat CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use gs_core::{ModelOracle, ObservableRange, TestKind};
use gs_inference::{
    BinnedTestConfig, FittableModel, GoodnessOfFit, StudyConfig, ToyConfig, ToyStudy,
};
use std::path::{Path, PathBuf};

mod config;

#[derive(Parser)]
#[command(name = "gofstat")]
#[command(about = "GoFStat - goodness-of-fit tests for unbinned models")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every goodness-of-fit test of a dataset against the tutorial model
    Gof {
        /// Observations (JSON array, or whitespace-separated text)
        #[arg(short, long, conflicts_with = "generate")]
        input: Option<PathBuf>,

        /// Generate this many events from the model instead of reading a file
        #[arg(long)]
        generate: Option<usize>,

        /// Seed for --generate and for the toys
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Test range low edge (defaults to the model support)
        #[arg(long, requires = "hi")]
        lo: Option<f64>,

        /// Test range high edge (defaults to the model support)
        #[arg(long, requires = "lo")]
        hi: Option<f64>,

        /// Number of bins for the chi-square tests
        #[arg(long, default_value_t = gs_unbinned::tutorial::TUTORIAL_BINS)]
        bins: usize,

        /// Minimum expected count per bin after rebinning
        #[arg(long, default_value = "5.0")]
        min_expected: f64,

        /// Refit the model to the data before testing
        #[arg(long)]
        fit: bool,

        /// Toys for AD/KS toy p-values (0 = none)
        #[arg(long, default_value = "0")]
        toys: usize,

        /// Threads for the toys (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Toy study of the tutorial model: generate, test, refit, test
    Toys {
        /// Study configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the number of trials
        #[arg(long)]
        trials: Option<usize>,

        /// Override the base seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of threads (0 = auto)
        #[arg(long)]
        threads: Option<usize>,

        /// Output file for the table (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Gof {
            input,
            generate,
            seed,
            lo,
            hi,
            bins,
            min_expected,
            fit,
            toys,
            threads,
            output,
        } => {
            let range = match (lo, hi) {
                (Some(lo), Some(hi)) => Some(ObservableRange::new(lo, hi)?),
                _ => None,
            };
            let binning = BinnedTestConfig { n_bins: bins, min_expected, rebin: true };
            let opts = GofOptions { seed, range, binning, fit, toys, threads };
            cmd_gof(input.as_deref(), generate, &opts, output.as_ref())
        }
        Commands::Toys { config, trials, seed, threads, output, csv } => {
            cmd_toys(config.as_deref(), trials, seed, threads, output.as_ref(), csv.as_ref())
        }
        Commands::Version => {
            println!("gofstat {}", gs_core::VERSION);
            Ok(())
        }
    }
}

struct GofOptions {
    seed: u64,
    range: Option<ObservableRange>,
    binning: BinnedTestConfig,
    fit: bool,
    toys: usize,
    threads: usize,
}

fn cmd_gof(
    input: Option<&Path>,
    generate: Option<usize>,
    opts: &GofOptions,
    output: Option<&PathBuf>,
) -> Result<()> {
    let mut model = FittableModel::new(gs_unbinned::tutorial_model()?);
    let data = match (input, generate) {
        (Some(path), _) => {
            tracing::info!(path = %path.display(), "loading sample");
            config::read_sample(path)?
        }
        (None, Some(n)) => model.generate(n, opts.seed)?,
        (None, None) => anyhow::bail!("either --input or --generate is required"),
    };
    let range = opts.range.unwrap_or_else(|| model.support());
    tracing::info!(events = data.len(), in_range = data.count_in(&range), "sample ready");

    // The fit sees every event in the model support; the range only selects what is tested.
    let extra_ndf = if opts.fit {
        let snapshot = model.refit(&data)?;
        tracing::info!(parameters = ?snapshot.values(), "refit complete");
        model.parameter_count()
    } else {
        0
    };

    let mut gof = GoodnessOfFit::new(&data, &model, range)?
        .with_binning(opts.binning.clone())?
        .with_extra_ndf(extra_ndf);
    let toy_kinds: Vec<TestKind> = if opts.toys > 0 {
        let n_events = data.count_in(&range).max(1);
        gof = gof.with_toys(ToyConfig {
            n_toys: opts.toys,
            n_events,
            threads: opts.threads,
            seed: opts.seed,
        })?;
        vec![TestKind::AndersonDarling, TestKind::KolmogorovSmirnov]
    } else {
        Vec::new()
    };
    let report = gof.run_all(&toy_kinds);

    let snapshot = model.snapshot();
    let output_json = serde_json::json!({
        "parameter_names": snapshot.names(),
        "parameters": snapshot.values(),
        "fitted": opts.fit,
        "report": report,
    });
    write_json(output, output_json)
}

fn cmd_toys(
    config_path: Option<&Path>,
    trials: Option<usize>,
    seed: Option<u64>,
    threads: Option<usize>,
    output: Option<&PathBuf>,
    csv: Option<&PathBuf>,
) -> Result<()> {
    let mut cfg = match config_path {
        Some(path) => config::read_study_config(path)?,
        None => StudyConfig::default(),
    };
    if let Some(n) = trials {
        cfg.n_trials = n;
    }
    if let Some(s) = seed {
        cfg.seed = s;
    }
    if let Some(t) = threads {
        cfg.threads = t;
    }
    cfg.validate()?;

    let model = FittableModel::new(gs_unbinned::tutorial_model()?);
    let mut study = ToyStudy::new(model, cfg)?;
    tracing::info!(trials = study.config().n_trials, range = %study.range(), "starting toy study");
    let report = study.run()?;
    tracing::info!(
        completed = report.records.len(),
        fit_failures = report.n_fit_failures,
        cancelled = report.cancelled,
        "toy study complete"
    );

    let table = report.table();
    if let Some(path) = csv {
        table.write_csv(std::io::BufWriter::new(std::fs::File::create(path)?))?;
    }
    let output_json = serde_json::json!({
        "config": study.config(),
        "cancelled": report.cancelled,
        "n_fit_failures": report.n_fit_failures,
        "table": table,
    });
    write_json(output, output_json)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
