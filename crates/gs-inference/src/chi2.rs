//! Chi-square goodness-of-fit tests on binned counts.
//!
//! All statistics are referred to a chi-square distribution with
//! `ndf = bins_used - 1 - extra_ndf` (at least 1), where `extra_ndf` is the number of
//! parameters fitted to the same data.

use crate::histogram::{BinnedHistogram, rebin};
use gs_core::{Error, Result, TestKind, TestResult};
use serde::{Deserialize, Serialize};

/// Binning and rebinning options for the binned tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinnedTestConfig {
    /// Number of equal-width bins over the test range.
    pub n_bins: usize,
    /// Minimum expected count per bin after rebinning.
    pub min_expected: f64,
    /// Merge adjacent bins up to `min_expected` before testing.
    pub rebin: bool,
}

impl Default for BinnedTestConfig {
    fn default() -> Self {
        Self { n_bins: 100, min_expected: 5.0, rebin: true }
    }
}

impl BinnedTestConfig {
    /// Check the options.
    pub fn validate(&self) -> Result<()> {
        if self.n_bins == 0 {
            return Err(Error::InvalidRange("n_bins must be > 0".into()));
        }
        if !(self.min_expected.is_finite() && self.min_expected >= 0.0) {
            return Err(Error::Validation(format!(
                "min_expected must be finite and >= 0, got {}",
                self.min_expected
            )));
        }
        Ok(())
    }

    /// Apply the configured rebinning (a copy of `histogram` if disabled).
    pub fn prepare(&self, histogram: &BinnedHistogram) -> Result<BinnedHistogram> {
        if self.rebin { rebin(histogram, self.min_expected) } else { Ok(histogram.clone()) }
    }
}

fn finish(statistic: f64, bins_used: usize, extra_ndf: usize, name: &str) -> Result<TestResult> {
    if bins_used < 2 {
        return Err(Error::InsufficientBins(format!(
            "{name} chi-square needs at least 2 usable bins, got {bins_used}"
        )));
    }
    let ndf = bins_used.saturating_sub(1 + extra_ndf).max(1);
    let p_value = gs_prob::chi_square::sf(statistic, ndf)?;
    Ok(TestResult::new(p_value, statistic, ndf))
}

/// Pearson `Σ (O - E)² / E` over bins with `E > 0`.
pub fn pearson(histogram: &BinnedHistogram, extra_ndf: usize) -> Result<TestResult> {
    let mut stat = 0.0;
    let mut used = 0usize;
    for b in histogram.bins().iter().filter(|b| b.expected > 0.0) {
        stat += (b.observed - b.expected).powi(2) / b.expected;
        used += 1;
    }
    finish(stat, used, extra_ndf, "Pearson")
}

/// Neyman `Σ (O - E)² / O` over bins with `O > 0`.
///
/// Empty bins are skipped, which biases the statistic low when many bins are sparse.
pub fn neyman(histogram: &BinnedHistogram, extra_ndf: usize) -> Result<TestResult> {
    let mut stat = 0.0;
    let mut used = 0usize;
    for b in histogram.bins().iter().filter(|b| b.observed > 0.0) {
        stat += (b.observed - b.expected).powi(2) / b.observed;
        used += 1;
    }
    finish(stat, used, extra_ndf, "Neyman")
}

/// Baker-Cousins Poisson likelihood ratio `2 Σ [O ln(O/E) - (O - E)]`.
///
/// Bins with `E > 0` contribute; an empty bin contributes `2E`.
pub fn baker_cousins(histogram: &BinnedHistogram, extra_ndf: usize) -> Result<TestResult> {
    let mut stat = 0.0;
    let mut used = 0usize;
    for b in histogram.bins().iter().filter(|b| b.expected > 0.0) {
        stat += if b.observed > 0.0 {
            2.0 * (b.observed * (b.observed / b.expected).ln() - (b.observed - b.expected))
        } else {
            2.0 * b.expected
        };
        used += 1;
    }
    finish(stat.max(0.0), used, extra_ndf, "Baker-Cousins")
}

/// Pearson-form chi-square against a curve histogram (see
/// [`crate::histogram::build_from_curve`]): `Σ (O - E_curve)² / E_curve` over `E_curve > 0`.
pub fn roofit(curve_histogram: &BinnedHistogram, extra_ndf: usize) -> Result<TestResult> {
    let mut stat = 0.0;
    let mut used = 0usize;
    for b in curve_histogram.bins().iter().filter(|b| b.expected > 0.0) {
        stat += (b.observed - b.expected).powi(2) / b.expected;
        used += 1;
    }
    finish(stat, used, extra_ndf, "RooFit")
}

/// Run the binned test `kind` on `histogram` after the configured rebinning.
///
/// For [`TestKind::RooFitChi2`] `histogram` must be the curve histogram.
pub fn binned_test(
    kind: TestKind,
    histogram: &BinnedHistogram,
    extra_ndf: usize,
    config: &BinnedTestConfig,
) -> Result<TestResult> {
    let h = config.prepare(histogram)?;
    match kind {
        TestKind::PearsonChi2 => pearson(&h, extra_ndf),
        TestKind::NeymanChi2 => neyman(&h, extra_ndf),
        TestKind::BakerCousinsChi2 => baker_cousins(&h, extra_ndf),
        TestKind::RooFitChi2 => roofit(&h, extra_ndf),
        TestKind::AndersonDarling | TestKind::KolmogorovSmirnov => Err(Error::Validation(
            format!("{kind} is not a binned test"),
        )),
    }
}
