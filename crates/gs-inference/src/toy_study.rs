//! Toy-study harness: repeated generate / test / refit / test cycles.
//!
//! Every trial works on a private clone of the reference model, reset to the reference
//! parameter values, so trials are independent and can run in parallel. The AD and KS
//! sampling distributions used for the after-fit toy p-values are built once and shared.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chi2::BinnedTestConfig;
use crate::gof::compute_test;
use crate::sampling::{SamplingDistribution, SamplingEngine, ToyConfig, toy_p_value};
use gs_core::{
    Error, ModelOracle, ObservableRange, ParameterSnapshot, Result, TestKind, TestResult,
    UnbinnedSample,
};
use gs_prob::math::derive_seed;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Seed stream of trial datasets.
const TRIAL_STREAM: u64 = 0;

/// Number of tests run per phase.
const N_TESTS: usize = TestKind::ALL.len();

/// Toy-study settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Number of trials.
    pub n_trials: usize,
    /// Events per trial dataset.
    pub n_events: usize,
    /// Toys per AD/KS sampling distribution.
    pub n_toys: usize,
    /// Events per toy (0 = `n_events`).
    pub toy_events: usize,
    /// Minimum expected count per bin after rebinning.
    pub min_expected: f64,
    /// Number of bins over the test range.
    pub n_bins: usize,
    /// Test range (the model support when absent). Refits always use the whole dataset.
    pub range: Option<ObservableRange>,
    /// Worker threads (0 = rayon's global pool).
    pub threads: usize,
    /// Base seed.
    pub seed: u64,
    /// Log progress every this many trials (0 disables).
    pub report_every: usize,
    /// Trials per batch; cancellation is checked between batches.
    pub batch_size: usize,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            n_trials: 1000,
            n_events: 1000,
            n_toys: 1000,
            toy_events: 0,
            min_expected: 5.0,
            n_bins: 100,
            range: None,
            threads: 0,
            seed: 42,
            report_every: 100,
            batch_size: 64,
        }
    }
}

impl StudyConfig {
    /// Check the settings before any trial runs.
    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(Error::Validation("n_trials must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Validation("batch_size must be > 0".into()));
        }
        self.binning().validate()?;
        self.toy_config().validate()
    }

    /// Binning options of the chi-square tests.
    pub fn binning(&self) -> BinnedTestConfig {
        BinnedTestConfig { n_bins: self.n_bins, min_expected: self.min_expected, rebin: true }
    }

    /// Settings of the AD/KS sampling distributions.
    pub fn toy_config(&self) -> ToyConfig {
        let n_events = if self.toy_events == 0 { self.n_events } else { self.toy_events };
        ToyConfig { n_toys: self.n_toys, n_events, threads: self.threads, seed: self.seed }
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; in-flight trials finish.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Steps of one trial, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialPhase {
    /// Restore the reference parameters.
    Reset,
    /// Generate the trial dataset.
    Generate,
    /// Run every test with the reference parameters.
    TestBefore,
    /// Refit the model to the dataset.
    Refit,
    /// Run every test with the fitted parameters.
    TestAfter,
    /// Toy p-values of AD and KS after the fit.
    TestAfterToys,
    /// Done.
    Record,
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of the refit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Refit converged.
    Converged,
    /// Refit failed; after-fit results are NaN.
    Failed,
    /// The trial stopped before the refit.
    Skipped,
}

/// Results of one trial. Missing results are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial index.
    pub trial: usize,
    /// Tests with the reference parameters, in [`TestKind::ALL`] order.
    pub before: [TestResult; N_TESTS],
    /// Tests with the fitted parameters, in [`TestKind::ALL`] order.
    pub after: [TestResult; N_TESTS],
    /// AD p-value after the fit, from the sampling distribution.
    pub ad_pvalue_after_toys: f64,
    /// KS p-value after the fit, from the sampling distribution.
    pub ks_pvalue_after_toys: f64,
    /// Refit outcome.
    pub fit_status: FitStatus,
    /// Phase that stopped the trial early, with its error.
    pub failure: Option<(TrialPhase, String)>,
}

impl TrialRecord {
    fn new(trial: usize) -> Self {
        Self {
            trial,
            before: [TestResult::nan(); N_TESTS],
            after: [TestResult::nan(); N_TESTS],
            ad_pvalue_after_toys: f64::NAN,
            ks_pvalue_after_toys: f64::NAN,
            fit_status: FitStatus::Skipped,
            failure: None,
        }
    }

    /// Result of `kind` before the fit.
    pub fn before(&self, kind: TestKind) -> TestResult {
        self.before[kind.index()]
    }

    /// Result of `kind` after the fit.
    pub fn after(&self, kind: TestKind) -> TestResult {
        self.after[kind.index()]
    }

    fn row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(1 + 4 * N_TESTS + 2);
        row.push(self.trial as f64);
        for (b, a) in self.before.iter().zip(&self.after) {
            row.extend([b.p_value, b.statistic, a.p_value, a.statistic]);
        }
        row.push(self.ad_pvalue_after_toys);
        row.push(self.ks_pvalue_after_toys);
        row
    }
}

/// Column-oriented view of a study: one row per trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyStudyTable {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows, one value per column.
    pub rows: Vec<Vec<f64>>,
}

impl ToyStudyTable {
    /// Column names: `trial`, then `{test}_pvalue_before`, `{test}_stat_before`,
    /// `{test}_pvalue_after`, `{test}_stat_after` per test, then the AD/KS toy p-values.
    pub fn column_names() -> Vec<String> {
        let mut cols = vec!["trial".to_string()];
        for kind in TestKind::ALL {
            for suffix in ["pvalue_before", "stat_before", "pvalue_after", "stat_after"] {
                cols.push(format!("{kind}_{suffix}"));
            }
        }
        cols.push(format!("{}_pvalue_after_toys", TestKind::AndersonDarling));
        cols.push(format!("{}_pvalue_after_toys", TestKind::KolmogorovSmirnov));
        cols
    }

    /// Table of `records`.
    pub fn from_records(records: &[TrialRecord]) -> Self {
        Self { columns: Self::column_names(), rows: records.iter().map(TrialRecord::row).collect() }
    }

    /// Values of column `name`.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write as CSV with a header line; NaN is written as `nan`.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(&self.columns).map_err(csv_error)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|&v| csv_cell(v))).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn csv_cell(v: f64) -> String {
    if v.is_nan() { "nan".to_string() } else { v.to_string() }
}

fn csv_error(e: csv::Error) -> Error {
    Error::Io(e.into())
}

/// Completed trials of a study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToyStudyReport {
    /// Records sorted by trial index.
    pub records: Vec<TrialRecord>,
    /// The study stopped early on request.
    pub cancelled: bool,
    /// Trials whose refit failed.
    pub n_fit_failures: usize,
}

impl ToyStudyReport {
    /// Output table.
    pub fn table(&self) -> ToyStudyTable {
        ToyStudyTable::from_records(&self.records)
    }
}

/// Per-trial state; the dataset moves along with the phase that needs it.
enum State {
    Reset,
    Generate,
    TestBefore(UnbinnedSample),
    Refit(UnbinnedSample),
    TestAfter(UnbinnedSample),
    TestAfterToys,
    Record,
}

impl State {
    fn phase(&self) -> TrialPhase {
        match self {
            State::Reset => TrialPhase::Reset,
            State::Generate => TrialPhase::Generate,
            State::TestBefore(_) => TrialPhase::TestBefore,
            State::Refit(_) => TrialPhase::Refit,
            State::TestAfter(_) => TrialPhase::TestAfter,
            State::TestAfterToys => TrialPhase::TestAfterToys,
            State::Record => TrialPhase::Record,
        }
    }
}

/// Toy study of one model.
pub struct ToyStudy<M: ModelOracle> {
    model: M,
    reference: ParameterSnapshot,
    config: StudyConfig,
    range: ObservableRange,
    ad_distribution: Option<Arc<SamplingDistribution>>,
    ks_distribution: Option<Arc<SamplingDistribution>>,
    cancel: CancelToken,
}

impl<M: ModelOracle> ToyStudy<M> {
    /// Study of `model` at its current parameter values, which become the reference.
    pub fn new(model: M, config: StudyConfig) -> Result<Self> {
        config.validate()?;
        let support = model.support();
        let range = match config.range {
            Some(r) => support.intersect(&r)?,
            None => support,
        };
        Ok(Self {
            reference: model.snapshot(),
            model,
            config,
            range,
            ad_distribution: None,
            ks_distribution: None,
            cancel: CancelToken::new(),
        })
    }

    /// Use prebuilt AD and KS distributions instead of building them.
    pub fn with_distributions(
        mut self,
        ad: Arc<SamplingDistribution>,
        ks: Arc<SamplingDistribution>,
    ) -> Result<Self> {
        for (d, kind) in [(&ad, TestKind::AndersonDarling), (&ks, TestKind::KolmogorovSmirnov)] {
            if d.kind() != kind {
                return Err(Error::DistributionMismatch {
                    expected: kind.to_string(),
                    found: d.kind().to_string(),
                });
            }
        }
        self.ad_distribution = Some(ad);
        self.ks_distribution = Some(ks);
        Ok(self)
    }

    /// Use `token` to stop the study.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the study.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Effective test range.
    pub fn range(&self) -> ObservableRange {
        self.range
    }

    /// Settings.
    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// AD and KS distributions, built from the reference model if not supplied.
    pub fn distributions(&mut self) -> Result<(Arc<SamplingDistribution>, Arc<SamplingDistribution>)> {
        let engine = SamplingEngine::new(self.range, self.config.binning(), self.config.toy_config())?;
        let ad = match &self.ad_distribution {
            Some(d) => Arc::clone(d),
            None => Arc::new(engine.build(&self.model, TestKind::AndersonDarling)?),
        };
        let ks = match &self.ks_distribution {
            Some(d) => Arc::clone(d),
            None => Arc::new(engine.build(&self.model, TestKind::KolmogorovSmirnov)?),
        };
        self.ad_distribution = Some(Arc::clone(&ad));
        self.ks_distribution = Some(Arc::clone(&ks));
        Ok((ad, ks))
    }

    /// Run all trials, or until cancelled.
    pub fn run(&mut self) -> Result<ToyStudyReport> {
        let (ad, ks) = self.distributions()?;
        let pool = if self.config.threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.threads)
                    .build()
                    .map_err(|e| Error::Computation(format!("failed to build thread pool: {e}")))?,
            )
        } else {
            None
        };

        let n_trials = self.config.n_trials;
        let mut records: Vec<TrialRecord> = Vec::with_capacity(n_trials);
        let mut cancelled = false;
        let mut start = 0usize;
        while start < n_trials {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let end = (start + self.config.batch_size).min(n_trials);
            let batch = || -> Vec<TrialRecord> {
                (start..end).into_par_iter().map(|t| self.run_trial(t, &ad, &ks)).collect()
            };
            let done = match &pool {
                Some(p) => p.install(batch),
                None => batch(),
            };
            records.extend(done);

            let every = self.config.report_every;
            if every > 0 && end / every > start / every {
                log::info!("toy study: {end}/{n_trials} trials done");
            }
            start = end;
        }
        if cancelled {
            log::warn!("toy study cancelled after {} of {n_trials} trials", records.len());
        }

        records.sort_by_key(|r| r.trial);
        let n_fit_failures = records.iter().filter(|r| r.fit_status == FitStatus::Failed).count();
        if n_fit_failures > 0 {
            log::warn!("toy study: {n_fit_failures} of {} refits failed", records.len());
        }
        Ok(ToyStudyReport { records, cancelled, n_fit_failures })
    }

    /// Run trial `trial` on a private clone of the model.
    pub fn run_trial(
        &self,
        trial: usize,
        ad: &SamplingDistribution,
        ks: &SamplingDistribution,
    ) -> TrialRecord {
        let mut record = TrialRecord::new(trial);
        let mut model = self.model.clone();
        let mut state = State::Reset;
        loop {
            let phase = state.phase();
            let step: Result<State> = match state {
                State::Reset => model.restore(&self.reference).map(|_| State::Generate),
                State::Generate => {
                    let seed = derive_seed(self.config.seed, TRIAL_STREAM, trial as u64);
                    model.generate(self.config.n_events, seed).map(State::TestBefore)
                }
                State::TestBefore(data) => {
                    record.before = self.run_tests(&data, &model, 0);
                    Ok(State::Refit(data))
                }
                State::Refit(data) => match model.refit(&data) {
                    Ok(_) => {
                        record.fit_status = FitStatus::Converged;
                        Ok(State::TestAfter(data))
                    }
                    Err(e) => {
                        record.fit_status = FitStatus::Failed;
                        Err(e)
                    }
                },
                State::TestAfter(data) => {
                    record.after = self.run_tests(&data, &model, model.parameter_count());
                    Ok(State::TestAfterToys)
                }
                State::TestAfterToys => {
                    let ad_stat = record.after(TestKind::AndersonDarling).statistic;
                    let ks_stat = record.after(TestKind::KolmogorovSmirnov).statistic;
                    record.ad_pvalue_after_toys = toy_p_value(ad, ad_stat).unwrap_or(f64::NAN);
                    record.ks_pvalue_after_toys = toy_p_value(ks, ks_stat).unwrap_or(f64::NAN);
                    Ok(State::Record)
                }
                State::Record => return record,
            };
            state = match step {
                Ok(next) => next,
                Err(e) => {
                    log::debug!("trial {trial}: {phase} failed: {e}");
                    record.failure = Some((phase, e.to_string()));
                    State::Record
                }
            };
        }
    }

    fn run_tests(&self, data: &UnbinnedSample, model: &M, extra_ndf: usize) -> [TestResult; N_TESTS] {
        let binning = self.config.binning();
        TestKind::ALL.map(|kind| {
            compute_test(kind, data, model, &self.range, &binning, extra_ndf).unwrap_or_else(|e| {
                log::debug!("{kind} failed: {e}");
                TestResult::nan()
            })
        })
    }
}
