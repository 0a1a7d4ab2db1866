//! Sampling-distribution engine: Monte Carlo distributions of test statistics.
//!
//! Randomness is deterministic: toy `i` draws its dataset with a seed derived from
//! `(seed, i)`, so a distribution does not depend on the number of worker threads and
//! extending a distribution gives the same values as building a larger one.

use crate::chi2::BinnedTestConfig;
use crate::gof::compute_test;
use gs_core::{Error, ModelOracle, ObservableRange, Result, TestKind};
use gs_prob::math::derive_seed;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Seed stream of toy datasets (trial datasets of a toy study use their own stream).
pub(crate) const TOY_STREAM: u64 = 1;

/// Monte Carlo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToyConfig {
    /// Number of pseudo-datasets.
    pub n_toys: usize,
    /// Events per pseudo-dataset.
    pub n_events: usize,
    /// Worker threads (0 = rayon's global pool).
    pub threads: usize,
    /// Base seed.
    pub seed: u64,
}

impl Default for ToyConfig {
    fn default() -> Self {
        Self { n_toys: 1000, n_events: 1000, threads: 0, seed: 42 }
    }
}

impl ToyConfig {
    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if self.n_toys == 0 {
            return Err(Error::Validation("n_toys must be > 0".into()));
        }
        if self.n_events == 0 {
            return Err(Error::Validation("n_events must be > 0".into()));
        }
        Ok(())
    }
}

/// Empirical distribution of one test statistic over pseudo-datasets.
///
/// Values are kept in toy order. Failed toys are counted but not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingDistribution {
    kind: TestKind,
    values: Vec<f64>,
    n_failed: usize,
}

impl SamplingDistribution {
    /// Empty distribution for `kind`.
    pub fn new(kind: TestKind) -> Self {
        Self { kind, values: Vec::new(), n_failed: 0 }
    }

    /// Statistic kind.
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    /// Stored statistic values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No stored values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Toys that failed to produce a statistic.
    pub fn n_failed(&self) -> usize {
        self.n_failed
    }

    /// Toys attempted (stored + failed); the index of the next toy.
    pub fn n_trials(&self) -> usize {
        self.values.len() + self.n_failed
    }

    /// Append one toy outcome. Non-finite statistics count as failures.
    pub fn push(&mut self, statistic: Result<f64>) {
        match statistic {
            Ok(v) if v.is_finite() => self.values.push(v),
            _ => self.n_failed += 1,
        }
    }

    /// Append every value of `other`, which must be of the same kind.
    pub fn merge(&mut self, other: &SamplingDistribution) -> Result<()> {
        if other.kind != self.kind {
            return Err(Error::DistributionMismatch {
                expected: self.kind.to_string(),
                found: other.kind.to_string(),
            });
        }
        self.values.extend_from_slice(&other.values);
        self.n_failed += other.n_failed;
        Ok(())
    }

    /// Empirical quantile with linear interpolation between order statistics.
    pub fn quantile(&self, q: f64) -> Result<f64> {
        if self.values.is_empty() {
            return Err(Error::DegenerateSample(format!("{} distribution is empty", self.kind)));
        }
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::Validation(format!("quantile must be in [0, 1], got {q}")));
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let idx = q * (sorted.len() - 1) as f64;
        let (lo, hi) = (idx.floor() as usize, idx.ceil() as usize);
        let w = idx - lo as f64;
        Ok(sorted[lo] + w * (sorted[hi] - sorted[lo]))
    }
}

/// Toy p-value: fraction of stored statistics at least as large as `observed`.
///
/// Returns `max(n_ge, 1) / n`, so the smallest reportable p-value is `1/n`. `n` counts the
/// stored values only: failed toys (see [`SamplingDistribution::n_failed`]) are not in the
/// denominator, so with failures the floor is `1/len()` rather than `1/n_toys`.
pub fn toy_p_value(distribution: &SamplingDistribution, observed: f64) -> Result<f64> {
    let n = distribution.len();
    if n == 0 {
        return Err(Error::DegenerateSample(format!(
            "{} distribution is empty",
            distribution.kind()
        )));
    }
    if observed.is_nan() {
        return Err(Error::Computation("observed statistic is NaN".into()));
    }
    let n_ge = distribution.values().iter().filter(|&&v| v >= observed).count();
    Ok(n_ge.max(1) as f64 / n as f64)
}

/// Builds and extends [`SamplingDistribution`]s for one test configuration.
#[derive(Debug, Clone)]
pub struct SamplingEngine {
    range: ObservableRange,
    binning: BinnedTestConfig,
    config: ToyConfig,
}

impl SamplingEngine {
    /// Engine for tests on `range` with the given binning and toy settings.
    pub fn new(range: ObservableRange, binning: BinnedTestConfig, config: ToyConfig) -> Result<Self> {
        binning.validate()?;
        config.validate()?;
        Ok(Self { range, binning, config })
    }

    /// Toy settings.
    pub fn config(&self) -> &ToyConfig {
        &self.config
    }

    /// Generate `config.n_toys` pseudo-datasets from `model` and collect statistic `kind`.
    pub fn build<M: ModelOracle>(&self, model: &M, kind: TestKind) -> Result<SamplingDistribution> {
        let mut dist = SamplingDistribution::new(kind);
        self.extend(&mut dist, model, kind, self.config.n_toys)?;
        Ok(dist)
    }

    /// Add `n_more` toys to `dist`, continuing its toy numbering.
    ///
    /// `kind` must match the distribution.
    pub fn extend<M: ModelOracle>(
        &self,
        dist: &mut SamplingDistribution,
        model: &M,
        kind: TestKind,
        n_more: usize,
    ) -> Result<()> {
        if dist.kind() != kind {
            return Err(Error::DistributionMismatch {
                expected: kind.to_string(),
                found: dist.kind().to_string(),
            });
        }
        let start = dist.n_trials();
        let outcomes = self.run_toys(model, kind, start, start + n_more)?;
        for r in outcomes {
            dist.push(r);
        }
        if dist.is_empty() {
            return Err(Error::Computation(format!("all {n_more} {kind} toys failed")));
        }
        if dist.n_failed() > 0 {
            log::warn!("{kind}: {} of {} toys failed", dist.n_failed(), dist.n_trials());
        }
        log::info!("{kind}: sampling distribution now holds {} toys", dist.len());
        Ok(())
    }

    /// Statistic for toy `index`.
    fn toy_statistic<M: ModelOracle>(&self, model: &M, kind: TestKind, index: usize) -> Result<f64> {
        let seed = derive_seed(self.config.seed, TOY_STREAM, index as u64);
        let toy = model.generate(self.config.n_events, seed)?;
        Ok(compute_test(kind, &toy, model, &self.range, &self.binning, 0)?.statistic)
    }

    /// Outcomes of toys `start..end`, in toy order.
    fn run_toys<M: ModelOracle>(
        &self,
        model: &M,
        kind: TestKind,
        start: usize,
        end: usize,
    ) -> Result<Vec<Result<f64>>> {
        let run = || {
            let mut outcomes: Vec<(usize, Result<f64>)> = (start..end)
                .into_par_iter()
                .with_min_len(8)
                .fold(Vec::new, |mut acc, i| {
                    acc.push((i, self.toy_statistic(model, kind, i)));
                    acc
                })
                .reduce(Vec::new, |mut a, mut b| {
                    a.append(&mut b);
                    a
                });
            outcomes.sort_unstable_by_key(|(i, _)| *i);
            outcomes.into_iter().map(|(_, r)| r).collect()
        };

        if self.config.threads == 0 {
            return Ok(run());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| Error::Computation(format!("failed to build thread pool: {e}")))?;
        Ok(pool.install(run))
    }
}
