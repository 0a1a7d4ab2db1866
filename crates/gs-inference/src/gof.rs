//! Goodness-of-fit facade: one dataset tested against one model on one range.

use std::sync::Arc;

use crate::chi2::{BinnedTestConfig, binned_test};
use crate::edf::{ad_test, ks_test};
use crate::histogram::{self, BinnedHistogram, DEFAULT_CURVE_POINTS, ModelCurve};
use crate::sampling::{SamplingDistribution, SamplingEngine, ToyConfig, toy_p_value};
use gs_core::{Error, ModelOracle, ObservableRange, Result, TestKind, TestResult, UnbinnedSample};
use serde::{Deserialize, Serialize};

/// Curve histogram of `sample` on `range`: the model curve scaled to the events in range.
pub fn curve_histogram<M: ModelOracle>(
    sample: &UnbinnedSample,
    model: &M,
    range: &ObservableRange,
    n_bins: usize,
) -> Result<BinnedHistogram> {
    let edges = histogram::uniform_edges(range, n_bins)?;
    let n_events = sample.count_in(range) as f64;
    let curve = ModelCurve::sample(model, range, n_events, DEFAULT_CURVE_POINTS, &edges)?;
    histogram::build_from_curve(sample, &curve, range, n_bins)
}

/// Run test `kind` of `sample` against `model` on `range`.
///
/// `extra_ndf` only affects the chi-square tests.
pub fn compute_test<M: ModelOracle>(
    kind: TestKind,
    sample: &UnbinnedSample,
    model: &M,
    range: &ObservableRange,
    binning: &BinnedTestConfig,
    extra_ndf: usize,
) -> Result<TestResult> {
    match kind {
        TestKind::AndersonDarling => ad_test(sample, model, range),
        TestKind::KolmogorovSmirnov => ks_test(sample, model, range),
        TestKind::RooFitChi2 => {
            let h = curve_histogram(sample, model, range, binning.n_bins)?;
            binned_test(kind, &h, extra_ndf, binning)
        }
        TestKind::PearsonChi2 | TestKind::NeymanChi2 | TestKind::BakerCousinsChi2 => {
            let h = histogram::build(sample, model, range, binning.n_bins)?;
            binned_test(kind, &h, extra_ndf, binning)
        }
    }
}

/// One line of a [`GofReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GofEntry {
    /// Test that produced the result.
    pub test: TestKind,
    /// Asymptotic result (NaN when the test failed).
    pub asymptotic: TestResult,
    /// Toy p-value, if requested.
    pub toy_p_value: Option<f64>,
    /// Error message of a failed test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Results of every test on one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GofReport {
    /// Test range.
    pub range: ObservableRange,
    /// Events inside the range.
    pub n_events: usize,
    /// Fitted parameters subtracted from the chi-square degrees of freedom.
    pub extra_ndf: usize,
    /// One entry per test, in [`TestKind::ALL`] order.
    pub entries: Vec<GofEntry>,
}

impl GofReport {
    /// Entry for `kind`.
    pub fn get(&self, kind: TestKind) -> Option<&GofEntry> {
        self.entries.iter().find(|e| e.test == kind)
    }
}

/// Binds a dataset, a model and a test range, and runs goodness-of-fit tests on them.
///
/// Toy p-values use sampling distributions that are either supplied by the caller
/// ([`GoodnessOfFit::set_distribution`]) or built on first use and cached. Supplied and
/// cached distributions are shared read-only.
pub struct GoodnessOfFit<'a, M: ModelOracle> {
    data: &'a UnbinnedSample,
    model: &'a M,
    range: ObservableRange,
    binning: BinnedTestConfig,
    toys: ToyConfig,
    extra_ndf: usize,
    distributions: [Option<Arc<SamplingDistribution>>; 6],
}

impl<'a, M: ModelOracle> GoodnessOfFit<'a, M> {
    /// Tests of `data` against `model` on `range`.
    ///
    /// The range must lie inside the model support. Toys default to as many events as
    /// `data` has inside `range`.
    pub fn new(data: &'a UnbinnedSample, model: &'a M, range: ObservableRange) -> Result<Self> {
        let support = model.support();
        if range.lo() < support.lo() || range.hi() > support.hi() {
            return Err(Error::InvalidRange(format!(
                "test range {range} is outside the model support {support}"
            )));
        }
        let toys = ToyConfig { n_events: data.count_in(&range).max(1), ..ToyConfig::default() };
        Ok(Self {
            data,
            model,
            range,
            binning: BinnedTestConfig::default(),
            toys,
            extra_ndf: 0,
            distributions: Default::default(),
        })
    }

    /// Use `binning` for the chi-square tests.
    pub fn with_binning(mut self, binning: BinnedTestConfig) -> Result<Self> {
        binning.validate()?;
        self.binning = binning;
        Ok(self)
    }

    /// Use `toys` for sampling distributions built by this facade.
    pub fn with_toys(mut self, toys: ToyConfig) -> Result<Self> {
        toys.validate()?;
        self.toys = toys;
        Ok(self)
    }

    /// Number of parameters fitted to `data` (0 when the model was not fitted to it).
    pub fn with_extra_ndf(mut self, extra_ndf: usize) -> Self {
        self.extra_ndf = extra_ndf;
        self
    }

    /// Test range.
    pub fn range(&self) -> ObservableRange {
        self.range
    }

    /// Binning options.
    pub fn binning(&self) -> &BinnedTestConfig {
        &self.binning
    }

    /// Histogram of the data with expected counts from the model, before rebinning.
    pub fn histogram(&self) -> Result<BinnedHistogram> {
        histogram::build(self.data, self.model, &self.range, self.binning.n_bins)
    }

    /// Histogram of the data with expected counts from the model curve, before rebinning.
    pub fn curve_histogram(&self) -> Result<BinnedHistogram> {
        curve_histogram(self.data, self.model, &self.range, self.binning.n_bins)
    }

    /// Asymptotic result of test `kind`.
    pub fn test(&self, kind: TestKind) -> Result<TestResult> {
        compute_test(kind, self.data, self.model, &self.range, &self.binning, self.extra_ndf)
    }

    /// Pearson chi-square.
    pub fn pearson(&self) -> Result<TestResult> {
        self.test(TestKind::PearsonChi2)
    }

    /// Neyman chi-square.
    pub fn neyman(&self) -> Result<TestResult> {
        self.test(TestKind::NeymanChi2)
    }

    /// Baker-Cousins chi-square.
    pub fn baker_cousins(&self) -> Result<TestResult> {
        self.test(TestKind::BakerCousinsChi2)
    }

    /// Chi-square against the model curve.
    pub fn roofit(&self) -> Result<TestResult> {
        self.test(TestKind::RooFitChi2)
    }

    /// Anderson-Darling.
    pub fn anderson_darling(&self) -> Result<TestResult> {
        self.test(TestKind::AndersonDarling)
    }

    /// Kolmogorov-Smirnov.
    pub fn kolmogorov_smirnov(&self) -> Result<TestResult> {
        self.test(TestKind::KolmogorovSmirnov)
    }

    /// Supply a prebuilt distribution; it replaces any cached one of the same kind.
    pub fn set_distribution(&mut self, distribution: Arc<SamplingDistribution>) {
        let slot = distribution.kind().index();
        self.distributions[slot] = Some(distribution);
    }

    /// Sampling distribution of `kind`, built from the model on first use.
    pub fn distribution(&mut self, kind: TestKind) -> Result<Arc<SamplingDistribution>> {
        if let Some(d) = &self.distributions[kind.index()] {
            return Ok(Arc::clone(d));
        }
        let engine = SamplingEngine::new(self.range, self.binning.clone(), self.toys.clone())?;
        let dist = Arc::new(engine.build(self.model, kind)?);
        self.distributions[kind.index()] = Some(Arc::clone(&dist));
        Ok(dist)
    }

    /// Test `kind` with its p-value taken from the sampling distribution.
    ///
    /// The statistic and ndf are those of the asymptotic test.
    pub fn toy_test(&mut self, kind: TestKind) -> Result<TestResult> {
        let observed = self.test(kind)?;
        let dist = self.distribution(kind)?;
        Ok(TestResult::new(toy_p_value(&dist, observed.statistic)?, observed.statistic, observed.ndf))
    }

    /// Run every test; failures are reported per entry.
    ///
    /// Toy p-values are computed for the kinds in `toy_kinds`.
    pub fn run_all(&mut self, toy_kinds: &[TestKind]) -> GofReport {
        let mut entries = Vec::with_capacity(TestKind::ALL.len());
        for kind in TestKind::ALL {
            let (asymptotic, mut error) = match self.test(kind) {
                Ok(r) => (r, None),
                Err(e) => {
                    log::warn!("{kind} test failed: {e}");
                    (TestResult::nan(), Some(e.to_string()))
                }
            };
            let toy_p_value = if toy_kinds.contains(&kind) && asymptotic.is_valid() {
                match self.distribution(kind).and_then(|d| toy_p_value(&d, asymptotic.statistic)) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        log::warn!("{kind} toy p-value failed: {e}");
                        if error.is_none() {
                            error = Some(e.to_string());
                        }
                        Some(f64::NAN)
                    }
                }
            } else {
                None
            };
            entries.push(GofEntry { test: kind, asymptotic, toy_p_value, error });
        }
        GofReport {
            range: self.range,
            n_events: self.data.count_in(&self.range),
            extra_ndf: self.extra_ndf,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{UniformOracle, grid};

    #[test]
    fn test_binned_tests_on_ideal_sample() {
        let data = grid(1000);
        let range = ObservableRange::new(0.0, 1.0).unwrap();
        let oracle = UniformOracle::default();
        let gof = GoodnessOfFit::new(&data, &oracle, range)
            .unwrap()
            .with_binning(BinnedTestConfig { n_bins: 10, ..Default::default() })
            .unwrap();
        for r in [gof.pearson(), gof.neyman(), gof.baker_cousins(), gof.roofit()] {
            let r = r.unwrap();
            assert!(r.statistic.abs() < 1e-9, "statistic {}", r.statistic);
            assert_eq!(r.ndf, 9);
        }
        assert!(gof.anderson_darling().unwrap().p_value > 0.99);
        assert!(gof.kolmogorov_smirnov().unwrap().p_value > 0.99);
    }

    #[test]
    fn test_range_outside_support() {
        let data = grid(10);
        let range = ObservableRange::new(-1.0, 1.0).unwrap();
        let oracle = UniformOracle::default();
        assert!(matches!(GoodnessOfFit::new(&data, &oracle, range), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_supplied_distribution_is_used() {
        let data = grid(100);
        let range = ObservableRange::new(0.0, 1.0).unwrap();
        let oracle = UniformOracle::default();
        let mut gof = GoodnessOfFit::new(&data, &oracle, range).unwrap();

        let mut dist = SamplingDistribution::new(TestKind::KolmogorovSmirnov);
        for v in [1.0, 2.0, 3.0, 4.0] {
            dist.push(Ok(v));
        }
        let dist = Arc::new(dist);
        gof.set_distribution(Arc::clone(&dist));

        let r = gof.toy_test(TestKind::KolmogorovSmirnov).unwrap();
        assert_eq!(r.p_value, 1.0);
        assert!(Arc::ptr_eq(&gof.distribution(TestKind::KolmogorovSmirnov).unwrap(), &dist));
    }

    #[test]
    fn test_run_all_reports_failures_per_test() {
        // Two events: the EDF tests work, the binned tests run out of bins.
        let data = UnbinnedSample::new(vec![0.3, 0.7]).unwrap();
        let range = ObservableRange::new(0.0, 1.0).unwrap();
        let oracle = UniformOracle::default();
        let mut gof = GoodnessOfFit::new(&data, &oracle, range).unwrap();
        let report = gof.run_all(&[]);
        assert_eq!(report.entries.len(), 6);
        assert_eq!(report.n_events, 2);
        assert!(report.get(TestKind::AndersonDarling).unwrap().asymptotic.is_valid());
        let pearson = report.get(TestKind::PearsonChi2).unwrap();
        assert!(!pearson.asymptotic.is_valid());
        assert!(pearson.error.is_some());
        assert!(pearson.toy_p_value.is_none());
    }
}
