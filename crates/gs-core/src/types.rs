//! Common data types for GoFStat

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed observable interval `[lo, hi]` with `lo < hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct ObservableRange {
    lo: f64,
    hi: f64,
}

impl ObservableRange {
    /// Create a range; both ends must be finite and `lo < hi`.
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        if !lo.is_finite() || !hi.is_finite() || lo.partial_cmp(&hi) != Some(std::cmp::Ordering::Less)
        {
            return Err(Error::InvalidRange(format!("expected finite low < high, got ({lo}, {hi})")));
        }
        Ok(Self { lo, hi })
    }

    /// Lower edge.
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper edge.
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// `hi - lo`.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// Whether `x` lies in the closed interval.
    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lo && x <= self.hi
    }

    /// Intersection with another range, if it is non-empty.
    pub fn intersect(&self, other: &ObservableRange) -> Result<ObservableRange> {
        ObservableRange::new(self.lo.max(other.lo), self.hi.min(other.hi))
    }
}

impl TryFrom<(f64, f64)> for ObservableRange {
    type Error = Error;

    fn try_from((lo, hi): (f64, f64)) -> Result<Self> {
        ObservableRange::new(lo, hi)
    }
}

impl From<ObservableRange> for (f64, f64) {
    fn from(r: ObservableRange) -> Self {
        (r.lo, r.hi)
    }
}

impl fmt::Display for ObservableRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

/// Unbinned sample of scalar observations, kept sorted ascending.
///
/// Serialized as a plain array; deserialization goes through [`UnbinnedSample::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct UnbinnedSample {
    values: Vec<f64>,
}

impl UnbinnedSample {
    /// Build a sample from arbitrary-order values. Non-finite values are rejected.
    pub fn new(mut values: Vec<f64>) -> Result<Self> {
        if values.iter().any(|x| !x.is_finite()) {
            return Err(Error::Validation("sample contains non-finite values".into()));
        }
        values.sort_by(f64::total_cmp);
        Ok(Self { values })
    }

    /// Sorted observations.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the sample has no observations.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observations inside `range` (still sorted).
    pub fn restrict(&self, range: &ObservableRange) -> UnbinnedSample {
        let start = self.values.partition_point(|&x| x < range.lo());
        let end = self.values.partition_point(|&x| x <= range.hi());
        Self { values: self.values[start..end].to_vec() }
    }

    /// Number of observations inside `range`.
    pub fn count_in(&self, range: &ObservableRange) -> usize {
        let start = self.values.partition_point(|&x| x < range.lo());
        let end = self.values.partition_point(|&x| x <= range.hi());
        end - start
    }
}

impl TryFrom<Vec<f64>> for UnbinnedSample {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        UnbinnedSample::new(values)
    }
}

impl From<UnbinnedSample> for Vec<f64> {
    fn from(s: UnbinnedSample) -> Self {
        s.values
    }
}

/// Immutable capture of model parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ParameterSnapshot {
    /// Create a snapshot; `names` and `values` are parallel.
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Parameter names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Parameter values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named parameter.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names.iter().position(|n| n == name).map(|i| self.values[i])
    }
}

/// Goodness-of-fit statistic selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TestKind {
    /// Anderson-Darling `A²` (unbinned).
    AndersonDarling,
    /// Kolmogorov-Smirnov `D` (unbinned).
    KolmogorovSmirnov,
    /// Pearson chi-square (binned).
    PearsonChi2,
    /// Neyman chi-square (binned).
    NeymanChi2,
    /// Baker-Cousins likelihood chi-square (binned).
    BakerCousinsChi2,
    /// Pearson-form chi-square against the plotted model curve (binned).
    RooFitChi2,
}

impl TestKind {
    /// All tests, in output-table order.
    pub const ALL: [TestKind; 6] = [
        TestKind::AndersonDarling,
        TestKind::KolmogorovSmirnov,
        TestKind::PearsonChi2,
        TestKind::NeymanChi2,
        TestKind::BakerCousinsChi2,
        TestKind::RooFitChi2,
    ];

    /// Short name used in table column names.
    pub fn name(self) -> &'static str {
        match self {
            TestKind::AndersonDarling => "AD",
            TestKind::KolmogorovSmirnov => "KS",
            TestKind::PearsonChi2 => "Pearson",
            TestKind::NeymanChi2 => "Neyman",
            TestKind::BakerCousinsChi2 => "BC",
            TestKind::RooFitChi2 => "RooFitChi2",
        }
    }

    /// Whether the statistic is computed from a binned histogram.
    pub fn is_binned(self) -> bool {
        !matches!(self, TestKind::AndersonDarling | TestKind::KolmogorovSmirnov)
    }

    /// Position in [`TestKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TestKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown test '{s}'")))
    }
}

/// Result of one goodness-of-fit test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// p-value in `[0, 1]`, NaN when the test could not be computed.
    pub p_value: f64,
    /// Test statistic.
    pub statistic: f64,
    /// Degrees of freedom (0 for unbinned tests).
    pub ndf: usize,
}

impl TestResult {
    /// Create a result.
    pub fn new(p_value: f64, statistic: f64, ndf: usize) -> Self {
        Self { p_value, statistic, ndf }
    }

    /// Failure sentinel: NaN p-value and statistic.
    pub fn nan() -> Self {
        Self { p_value: f64::NAN, statistic: f64::NAN, ndf: 0 }
    }

    /// Whether this is a computed (non-NaN) result.
    pub fn is_valid(&self) -> bool {
        !self.p_value.is_nan()
    }
}

/// Result of a maximum-likelihood fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Parameter values at the minimum, fixed parameters included
    pub parameters: Vec<f64>,

    /// Negative log-likelihood at minimum
    pub nll: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of optimizer iterations
    pub n_iter: u64,

    /// Number of objective evaluations
    pub n_fev: usize,
}

impl FitResult {
    /// Create a new fit result
    pub fn new(parameters: Vec<f64>, nll: f64, converged: bool, n_iter: u64, n_fev: usize) -> Self {
        Self { parameters, nll, converged, n_iter, n_fev }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validation() {
        assert!(ObservableRange::new(0.0, 1.0).is_ok());
        assert!(matches!(ObservableRange::new(1.0, 1.0), Err(Error::InvalidRange(_))));
        assert!(matches!(ObservableRange::new(2.0, 1.0), Err(Error::InvalidRange(_))));
        assert!(ObservableRange::new(f64::NAN, 1.0).is_err());
        assert!(ObservableRange::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_range_serde_rejects_empty() {
        let r: ObservableRange = serde_json::from_str("[0.0, 10.0]").unwrap();
        assert_eq!(r.width(), 10.0);
        assert!(serde_json::from_str::<ObservableRange>("[3.0, 3.0]").is_err());
    }

    #[test]
    fn test_sample_sorted_and_restricted() {
        let s = UnbinnedSample::new(vec![3.0, -1.0, 2.0, 2.0, 11.0]).unwrap();
        assert_eq!(s.values(), &[-1.0, 2.0, 2.0, 3.0, 11.0]);

        let r = ObservableRange::new(0.0, 3.0).unwrap();
        assert_eq!(s.restrict(&r).values(), &[2.0, 2.0, 3.0]);
        assert_eq!(s.count_in(&r), 3);
    }

    #[test]
    fn test_sample_rejects_nan() {
        assert!(UnbinnedSample::new(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_sample_serde_goes_through_new() {
        let s: UnbinnedSample = serde_json::from_str("[3.0, -1.0, 2.5]").unwrap();
        assert_eq!(s.values(), &[-1.0, 2.5, 3.0]);
        assert_eq!(serde_json::to_string(&s).unwrap(), "[-1.0,2.5,3.0]");
        assert!(serde_yaml_ng::from_str::<UnbinnedSample>("[1.0, .nan]").is_err());
        assert!(serde_yaml_ng::from_str::<UnbinnedSample>("[.inf, 0.5]").is_err());
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in TestKind::ALL {
            assert_eq!(kind.name().parse::<TestKind>().unwrap(), kind);
            assert_eq!(TestKind::ALL[kind.index()], kind);
        }
        assert!("chi3".parse::<TestKind>().is_err());
    }

    #[test]
    fn test_snapshot_lookup() {
        let s = ParameterSnapshot::new(vec!["a0".into(), "a1".into()], vec![0.5, 0.2]);
        assert_eq!(s.get("a1"), Some(0.2));
        assert_eq!(s.get("mean"), None);
    }
}
