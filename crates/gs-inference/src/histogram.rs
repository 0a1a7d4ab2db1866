//! Histogram builder: observed and expected bin counts over a restricted range.
//!
//! Expected counts are the model probability of each bin conditioned on the range, times
//! the number of sample events inside the range. Bin probabilities come from cumulative
//! differences, `(F(b) - F(a)) / (F(hi) - F(lo))`, so they are exact integrals of the
//! density. The curve variant ([`build_from_curve`]) integrates a sampled density instead.

use gs_core::{Error, ModelOracle, ObservableRange, Result, UnbinnedSample};
use serde::{Deserialize, Serialize};

/// Default number of points of a [`ModelCurve`].
pub const DEFAULT_CURVE_POINTS: usize = 1000;

/// One histogram bin `[lo, hi)` (the last bin of a histogram is closed on the right).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    /// Lower edge.
    pub lo: f64,
    /// Upper edge.
    pub hi: f64,
    /// Observed event count.
    pub observed: f64,
    /// Expected event count under the model.
    pub expected: f64,
}

impl Bin {
    /// Bin width.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Ordered, contiguous bins partitioning a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedHistogram {
    bins: Vec<Bin>,
    range: ObservableRange,
}

impl BinnedHistogram {
    /// Validate and wrap `bins`.
    ///
    /// Bins must be non-empty, have increasing finite edges with `lo < hi`, be contiguous,
    /// and carry finite non-negative counts.
    pub fn new(bins: Vec<Bin>) -> Result<Self> {
        if bins.is_empty() {
            return Err(Error::InvalidRange("histogram needs at least one bin".into()));
        }
        for (i, b) in bins.iter().enumerate() {
            if !(b.lo.is_finite() && b.hi.is_finite() && b.lo < b.hi) {
                return Err(Error::InvalidRange(format!(
                    "bin {i} has invalid edges [{}, {}]",
                    b.lo, b.hi
                )));
            }
            if !(b.observed.is_finite() && b.observed >= 0.0) {
                return Err(Error::Validation(format!(
                    "bin {i} observed count must be finite and >= 0, got {}",
                    b.observed
                )));
            }
            if !(b.expected.is_finite() && b.expected >= 0.0) {
                return Err(Error::Validation(format!(
                    "bin {i} expected count must be finite and >= 0, got {}",
                    b.expected
                )));
            }
        }
        for (i, w) in bins.windows(2).enumerate() {
            if w[0].hi != w[1].lo {
                return Err(Error::InvalidRange(format!(
                    "bins {i} and {} are not contiguous: {} != {}",
                    i + 1,
                    w[0].hi,
                    w[1].lo
                )));
            }
        }
        let range = ObservableRange::new(bins[0].lo, bins[bins.len() - 1].hi)?;
        Ok(Self { bins, range })
    }

    /// Bins in increasing order.
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Always `false` for a validated histogram.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Covered range `[first.lo, last.hi]`.
    pub fn range(&self) -> ObservableRange {
        self.range
    }

    /// Bin edges (`len() + 1` values).
    pub fn edges(&self) -> Vec<f64> {
        let mut edges: Vec<f64> = self.bins.iter().map(|b| b.lo).collect();
        edges.push(self.range.hi());
        edges
    }

    /// Sum of observed counts.
    pub fn total_observed(&self) -> f64 {
        self.bins.iter().map(|b| b.observed).sum()
    }

    /// Sum of expected counts.
    pub fn total_expected(&self) -> f64 {
        self.bins.iter().map(|b| b.expected).sum()
    }
}

/// `n_bins + 1` equally spaced edges over `range`.
pub fn uniform_edges(range: &ObservableRange, n_bins: usize) -> Result<Vec<f64>> {
    if n_bins == 0 {
        return Err(Error::InvalidRange("number of bins must be > 0".into()));
    }
    let w = range.width() / n_bins as f64;
    let mut edges: Vec<f64> = (0..n_bins).map(|i| range.lo() + i as f64 * w).collect();
    edges.push(range.hi());
    Ok(edges)
}

fn validate_edges(edges: &[f64]) -> Result<ObservableRange> {
    if edges.len() < 2 {
        return Err(Error::InvalidRange(format!(
            "binning needs at least 2 edges, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::InvalidRange("bin edges must be finite and strictly increasing".into()));
    }
    ObservableRange::new(edges[0], edges[edges.len() - 1])
}

/// Observed counts of a sorted sample in `edges`; the last bin is closed on the right and
/// events outside `[edges[0], edges[last]]` are ignored.
pub fn observed_counts(sample: &UnbinnedSample, edges: &[f64]) -> Vec<f64> {
    let xs = sample.values();
    let n_bins = edges.len().saturating_sub(1);
    (0..n_bins)
        .map(|i| {
            let start = xs.partition_point(|&x| x < edges[i]);
            let end = if i + 1 == n_bins {
                xs.partition_point(|&x| x <= edges[i + 1])
            } else {
                xs.partition_point(|&x| x < edges[i + 1])
            };
            end.saturating_sub(start) as f64
        })
        .collect()
}

/// `(F(lo), F(hi) - F(lo))` for the model on `range`.
fn range_mass<M: ModelOracle>(model: &M, range: &ObservableRange) -> Result<(f64, f64)> {
    let f_lo = model.cumulative(range.lo())?;
    let mass = model.cumulative(range.hi())? - f_lo;
    if !(mass.is_finite() && mass > 0.0) {
        return Err(Error::InvalidRange(format!("model has no probability mass on {range}")));
    }
    Ok((f_lo, mass))
}

/// Equal-width histogram of `sample` over `range` with exact model expectations.
pub fn build<M: ModelOracle>(
    sample: &UnbinnedSample,
    model: &M,
    range: &ObservableRange,
    n_bins: usize,
) -> Result<BinnedHistogram> {
    from_edges(sample, model, &uniform_edges(range, n_bins)?)
}

/// Histogram of `sample` on a given (possibly non-uniform) binning.
pub fn from_edges<M: ModelOracle>(
    sample: &UnbinnedSample,
    model: &M,
    edges: &[f64],
) -> Result<BinnedHistogram> {
    let range = validate_edges(edges)?;
    let (f_lo, mass) = range_mass(model, &range)?;
    let observed = observed_counts(sample, edges);
    let n_in: f64 = observed.iter().sum();

    let mut bins = Vec::with_capacity(observed.len());
    let mut f_prev = f_lo;
    for (i, &obs) in observed.iter().enumerate() {
        let f_next = model.cumulative(edges[i + 1])?;
        let p = ((f_next - f_prev) / mass).max(0.0);
        bins.push(Bin { lo: edges[i], hi: edges[i + 1], observed: obs, expected: n_in * p });
        f_prev = f_next;
    }
    BinnedHistogram::new(bins)
}

/// Model density sampled on a grid and linearly interpolated, in events per unit `x`.
///
/// This is the curve drawn over a histogram: `y(x) = N · p(x) / (F(hi) - F(lo))` for the
/// `N` events of the plotted range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl ModelCurve {
    /// Sample the model on `n_points` equally spaced points over `range`, plus every value of
    /// `breakpoints` inside the range (typically the bin edges).
    pub fn sample<M: ModelOracle>(
        model: &M,
        range: &ObservableRange,
        n_events: f64,
        n_points: usize,
        breakpoints: &[f64],
    ) -> Result<Self> {
        if n_points < 2 {
            return Err(Error::Validation(format!("curve needs at least 2 points, got {n_points}")));
        }
        let (_, mass) = range_mass(model, range)?;
        let scale = n_events / mass;

        let step = range.width() / (n_points - 1) as f64;
        let mut xs: Vec<f64> = (0..n_points - 1).map(|i| range.lo() + i as f64 * step).collect();
        xs.push(range.hi());
        xs.extend(breakpoints.iter().copied().filter(|&x| range.contains(x)));
        xs.sort_by(f64::total_cmp);
        xs.dedup();

        let ys = xs
            .iter()
            .map(|&x| Ok(scale * model.density(x)?))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Self { xs, ys })
    }

    /// Grid points.
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Curve values at [`ModelCurve::xs`].
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Linear interpolation at `x` (clamped to the grid).
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        let j = self.xs.partition_point(|&g| g <= x);
        let (x0, x1) = (self.xs[j - 1], self.xs[j]);
        let t = (x - x0) / (x1 - x0);
        self.ys[j - 1] + t * (self.ys[j] - self.ys[j - 1])
    }

    /// Trapezoidal integral of the interpolated curve over `[a, b]`.
    pub fn integral(&self, a: f64, b: f64) -> f64 {
        if b <= a {
            return 0.0;
        }
        let mut total = 0.0;
        let mut x_prev = a;
        let mut y_prev = self.eval(a);
        let start = self.xs.partition_point(|&g| g <= a);
        for (&x, &y) in self.xs[start..].iter().zip(&self.ys[start..]) {
            if x >= b {
                break;
            }
            total += 0.5 * (x - x_prev) * (y + y_prev);
            x_prev = x;
            y_prev = y;
        }
        total + 0.5 * (b - x_prev) * (self.eval(b) + y_prev)
    }

    /// Mean curve value over `[a, b]`.
    pub fn average(&self, a: f64, b: f64) -> f64 {
        self.integral(a, b) / (b - a)
    }
}

/// Equal-width histogram whose expected counts are integrals of `curve` over each bin.
pub fn build_from_curve(
    sample: &UnbinnedSample,
    curve: &ModelCurve,
    range: &ObservableRange,
    n_bins: usize,
) -> Result<BinnedHistogram> {
    let edges = uniform_edges(range, n_bins)?;
    let observed = observed_counts(sample, &edges);
    let bins = observed
        .iter()
        .enumerate()
        .map(|(i, &obs)| {
            let (lo, hi) = (edges[i], edges[i + 1]);
            Bin { lo, hi, observed: obs, expected: curve.integral(lo, hi).max(0.0) }
        })
        .collect();
    BinnedHistogram::new(bins)
}

/// Merge adjacent bins until each holds at least `min_expected` expected events.
///
/// Greedy left-to-right scan: bins are accumulated until the group reaches the floor; a
/// trailing group below the floor is merged into the previous group. Not globally optimal.
/// A histogram whose total expectation is below the floor collapses to one bin. The input
/// is not modified, and rebinning a rebinned histogram returns it unchanged.
pub fn rebin(histogram: &BinnedHistogram, min_expected: f64) -> Result<BinnedHistogram> {
    if !(min_expected.is_finite() && min_expected >= 0.0) {
        return Err(Error::Validation(format!(
            "min_expected must be finite and >= 0, got {min_expected}"
        )));
    }

    let mut merged: Vec<Bin> = Vec::with_capacity(histogram.len());
    let mut acc: Option<Bin> = None;
    for b in histogram.bins() {
        let group = match acc.take() {
            Some(g) => Bin {
                lo: g.lo,
                hi: b.hi,
                observed: g.observed + b.observed,
                expected: g.expected + b.expected,
            },
            None => *b,
        };
        if group.expected >= min_expected {
            merged.push(group);
        } else {
            acc = Some(group);
        }
    }
    if let Some(tail) = acc {
        match merged.last_mut() {
            Some(prev) => {
                prev.hi = tail.hi;
                prev.observed += tail.observed;
                prev.expected += tail.expected;
            }
            None => merged.push(tail),
        }
    }
    BinnedHistogram::new(merged)
}
