//! Empirical-distribution-function tests: Kolmogorov-Smirnov and Anderson-Darling.
//!
//! Both compare the empirical CDF of a sorted sample with the model CDF conditioned on the
//! test range, `F_r(x) = (F(x) - F(lo)) / (F(hi) - F(lo))`. They are unbinned and carry no
//! degrees of freedom; the asymptotic p-values assume a fully specified model, so after a
//! fit they are conservative (use toy p-values instead).

use gs_core::{Error, ModelOracle, ObservableRange, Result, TestResult, UnbinnedSample};

/// Evaluate `cdf` at every value, checking that the result is usable by an EDF statistic.
fn cdf_values<F>(xs: &[f64], cdf: F) -> Result<Vec<f64>>
where
    F: Fn(f64) -> Result<f64>,
{
    if xs.len() < 2 {
        return Err(Error::DegenerateSample(format!(
            "EDF tests need at least 2 events, got {}",
            xs.len()
        )));
    }
    xs.iter()
        .map(|&x| {
            let u = cdf(x)?;
            if u.is_nan() {
                return Err(Error::Computation(format!("model CDF is NaN at x={x}")));
            }
            if u <= 0.0 || u >= 1.0 {
                return Err(Error::DegenerateSample(format!(
                    "model CDF is {u} at x={x} (event on or beyond the range boundary)"
                )));
            }
            Ok(u)
        })
        .collect()
}

/// Kolmogorov-Smirnov `D = max_i max(i/n - F(x_i), F(x_i) - (i-1)/n)` for ascending `xs`.
pub fn ks_statistic_with<F>(xs: &[f64], cdf: F) -> Result<f64>
where
    F: Fn(f64) -> Result<f64>,
{
    let u = cdf_values(xs, cdf)?;
    let n = u.len() as f64;
    Ok(u.iter().enumerate().fold(0.0f64, |d, (i, &f)| {
        let above = (i as f64 + 1.0) / n - f;
        let below = f - i as f64 / n;
        d.max(above.abs()).max(below.abs())
    }))
}

/// Anderson-Darling `A² = -n - (1/n) Σ (2i-1) [ln F(x_i) + ln(1 - F(x_{n+1-i}))]` for
/// ascending `xs`.
pub fn ad_statistic_with<F>(xs: &[f64], cdf: F) -> Result<f64>
where
    F: Fn(f64) -> Result<f64>,
{
    let u = cdf_values(xs, cdf)?;
    let n = u.len();
    let s: f64 = (0..n)
        .map(|i| (2 * i + 1) as f64 * (u[i].ln() + (-u[n - 1 - i]).ln_1p()))
        .sum();
    Ok(-(n as f64) - s / n as f64)
}

/// Events of `sample` inside `range` and the model CDF conditioned on `range`.
fn conditioned<'a, M: ModelOracle>(
    sample: &UnbinnedSample,
    model: &'a M,
    range: &ObservableRange,
) -> Result<(UnbinnedSample, impl Fn(f64) -> Result<f64> + 'a)> {
    let f_lo = model.cumulative(range.lo())?;
    let mass = model.cumulative(range.hi())? - f_lo;
    if !(mass.is_finite() && mass > 0.0) {
        return Err(Error::InvalidRange(format!("model has no probability mass on {range}")));
    }
    let cdf = move |x: f64| -> Result<f64> { Ok((model.cumulative(x)? - f_lo) / mass) };
    Ok((sample.restrict(range), cdf))
}

/// Kolmogorov-Smirnov test of `sample` against `model` on `range`.
pub fn ks_test<M: ModelOracle>(
    sample: &UnbinnedSample,
    model: &M,
    range: &ObservableRange,
) -> Result<TestResult> {
    let (inside, cdf) = conditioned(sample, model, range)?;
    let d = ks_statistic_with(inside.values(), cdf)?;
    Ok(TestResult::new(gs_prob::kolmogorov::p_value(d, inside.len()), d, 0))
}

/// Anderson-Darling test of `sample` against `model` on `range`.
pub fn ad_test<M: ModelOracle>(
    sample: &UnbinnedSample,
    model: &M,
    range: &ObservableRange,
) -> Result<TestResult> {
    let (inside, cdf) = conditioned(sample, model, range)?;
    let a2 = ad_statistic_with(inside.values(), cdf)?;
    Ok(TestResult::new(gs_prob::anderson_darling::p_value(a2, inside.len()), a2, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::UniformOracle;
    use approx::assert_relative_eq;

    fn uniform(x: f64) -> Result<f64> {
        Ok(x.clamp(0.0, 1.0))
    }

    fn midpoints(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 + 0.5) / n as f64).collect()
    }

    #[test]
    fn test_ks_midpoints() {
        // Ideal sample: D = 1/(2n).
        let d = ks_statistic_with(&midpoints(10), uniform).unwrap();
        assert_relative_eq!(d, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_ks_hand_computed() {
        let d = ks_statistic_with(&[0.1, 0.2, 0.9], uniform).unwrap();
        // i=2: 2/3 - 0.2 = 0.4667 dominates.
        assert_relative_eq!(d, 2.0 / 3.0 - 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_ad_midpoints_small() {
        let xs = midpoints(10);
        let a2 = ad_statistic_with(&xs, uniform).unwrap();
        let n = xs.len();
        let mut s = 0.0;
        for i in 1..=n {
            s += (2 * i - 1) as f64 * (xs[i - 1].ln() + (1.0 - xs[n - i]).ln());
        }
        assert_relative_eq!(a2, -(n as f64) - s / n as f64, epsilon = 1e-12);
        assert!(a2 > 0.0 && a2 < 0.2);
    }

    #[test]
    fn test_ad_detects_shift() {
        let shifted: Vec<f64> = midpoints(200).iter().map(|x| 0.5 * x + 0.25).collect();
        let a2 = ad_statistic_with(&shifted, uniform).unwrap();
        assert!(a2 > 20.0);
        assert!(gs_prob::anderson_darling::p_value(a2, shifted.len()) < 1e-3);
    }

    #[test]
    fn test_boundary_events_are_degenerate() {
        assert!(matches!(ks_statistic_with(&[0.0, 0.5], uniform), Err(Error::DegenerateSample(_))));
        assert!(matches!(ad_statistic_with(&[0.5, 1.0], uniform), Err(Error::DegenerateSample(_))));
        assert!(matches!(ad_statistic_with(&[0.5], uniform), Err(Error::DegenerateSample(_))));
    }

    #[test]
    fn test_two_events_on_the_range_edges() {
        let oracle = UniformOracle::default();
        for (lo, hi) in [(0.0, 1.0), (0.2, 0.6)] {
            let range = ObservableRange::new(lo, hi).unwrap();
            let data = UnbinnedSample::new(vec![lo, hi]).unwrap();
            assert!(matches!(ks_test(&data, &oracle, &range), Err(Error::DegenerateSample(_))));
            assert!(matches!(ad_test(&data, &oracle, &range), Err(Error::DegenerateSample(_))));
        }
    }

    #[test]
    fn test_ks_invariant_under_monotonic_transform() {
        let xs = [0.05, 0.13, 0.37, 0.41, 0.58, 0.77, 0.93];
        let d = ks_statistic_with(&xs, uniform).unwrap();

        // Increasing: y = exp(3x), G(y) = ln(y) / 3.
        let ys: Vec<f64> = xs.iter().map(|x| (3.0 * x).exp()).collect();
        let d_inc = ks_statistic_with(&ys, |y: f64| Ok(y.ln() / 3.0)).unwrap();
        assert_relative_eq!(d, d_inc, epsilon = 1e-12);

        // Decreasing: y = -x (re-sorted ascending), G(y) = 1 - F(-y).
        let mut ys: Vec<f64> = xs.iter().map(|x| -x).collect();
        ys.sort_by(f64::total_cmp);
        let d_dec = ks_statistic_with(&ys, |y: f64| Ok(1.0 + y)).unwrap();
        assert_relative_eq!(d, d_dec, epsilon = 1e-12);
    }
}
