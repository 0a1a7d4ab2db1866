//! Kolmogorov distribution survival function.

/// `-π²/8`
const C1: f64 = -1.233_700_550_136_169_7;
/// `9·C1`
const C2: f64 = -11.103_304_951_225_528;
/// `25·C1`
const C3: f64 = -30.842_513_753_404_244;
/// `sqrt(2π)`
const SQRT_2PI: f64 = 2.506_628_27;

/// Survival function of the Kolmogorov distribution,
/// `Q(z) = 2 Σ_{k>=1} (-1)^{k-1} exp(-2 k² z²)`.
///
/// Piecewise evaluation:
/// - `z < 0.2`: `Q = 1` to double precision
/// - `z < 0.755`: the theta-function dual series `1 - √(2π)/z Σ exp(-(2k-1)² π² / (8 z²))`
/// - `z < 6.8116`: the alternating series, truncated to at most four terms
/// - otherwise `Q = 0`
pub fn sf(z: f64) -> f64 {
    let u = z.abs();
    if u.is_nan() {
        return f64::NAN;
    }
    if u < 0.2 {
        1.0
    } else if u < 0.755 {
        let v = 1.0 / (u * u);
        1.0 - SQRT_2PI * ((C1 * v).exp() + (C2 * v).exp() + (C3 * v).exp()) / u
    } else if u < 6.8116 {
        let v = u * u;
        let max_terms = ((3.0 / u).round() as usize).clamp(1, 4);
        let mut r = [0.0f64; 4];
        for (j, rj) in r.iter_mut().enumerate().take(max_terms) {
            let k = (j + 1) as f64;
            *rj = (-2.0 * k * k * v).exp();
        }
        2.0 * (r[0] - r[1] + r[2] - r[3])
    } else {
        0.0
    }
}

/// Asymptotic p-value of a one-sample KS statistic `d` for sample size `n`, using the
/// Stephens finite-sample scaling `d·(√n + 0.12 + 0.11/√n)`.
pub fn p_value(d: f64, n: usize) -> f64 {
    let sqrt_n = (n as f64).sqrt();
    let z = d * (sqrt_n + 0.12 + 0.11 / sqrt_n);
    crate::math::clamp_prob(sf(z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(z: f64) -> f64 {
        let mut s = 0.0;
        for k in 1..200 {
            let k = k as f64;
            let sign = if (k as i64) % 2 == 1 { 1.0 } else { -1.0 };
            s += sign * (-2.0 * k * k * z * z).exp();
        }
        2.0 * s
    }

    #[test]
    fn test_matches_full_series() {
        for z in [0.8, 1.0, 1.36, 2.0, 3.0] {
            assert_relative_eq!(sf(z), series(z), epsilon = 1e-7);
        }
    }

    #[test]
    fn test_dual_branch_is_continuous() {
        assert_relative_eq!(sf(0.7549999), sf(0.755), epsilon = 1e-6);
        assert_relative_eq!(sf(0.2), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_limits() {
        assert_eq!(sf(0.0), 1.0);
        assert_eq!(sf(10.0), 0.0);
        // Classic 5% critical value of the Kolmogorov distribution.
        assert_relative_eq!(sf(1.358_1), 0.05, epsilon = 1e-4);
    }

    #[test]
    fn test_p_value_in_unit_interval() {
        for d in [0.0, 0.01, 0.05, 0.2, 1.0] {
            let p = p_value(d, 100);
            assert!((0.0..=1.0).contains(&p), "d={d} gave {p}");
        }
    }
}
