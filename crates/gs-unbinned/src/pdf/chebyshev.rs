use crate::pdf::{UnbinnedPdf, check_out_len, u01};
use gs_core::{Error, ObservableRange, Result};

/// Rejection sampling gives up after this many proposals per requested event.
const MAX_PROPOSALS_PER_EVENT: usize = 1000;

/// Chebyshev polynomial PDF on a bounded support, normalized on the observable bounds.
///
/// The unnormalized shape is:
///
/// `f(x) = 1 + Σ_{k=1..m} c_k T_k(x')`
///
/// where `x'` maps the observable bounds `[a,b]` to `[-1,1]`:
///
/// `x' = (2x - (a+b)) / (b-a)`
///
/// and `T_k` is the Chebyshev polynomial of the first kind.
///
/// This PDF requires that `f(x) > 0` on the full support. A lightweight guardrail checks
/// positivity on a fixed grid in `x'` at evaluation time.
#[derive(Debug, Clone)]
pub struct ChebyshevPdf {
    order: usize,
}

impl ChebyshevPdf {
    /// Create a Chebyshev PDF of the given order (number of coefficients `c_1..c_order`).
    pub fn new(order: usize) -> Result<Self> {
        if order == 0 {
            return Err(Error::Validation(
                "ChebyshevPdf order must be >= 1 (provide at least one coefficient)".into(),
            ));
        }
        Ok(Self { order })
    }

    #[inline]
    fn validate_params_len(&self, params: &[f64]) -> Result<()> {
        if params.len() != self.order {
            return Err(Error::Validation(format!(
                "ChebyshevPdf expects {} params (c_1..c_{}), got {}",
                self.order,
                self.order,
                params.len()
            )));
        }
        if params.iter().any(|x| !x.is_finite()) {
            return Err(Error::Validation("ChebyshevPdf params must be finite".into()));
        }
        Ok(())
    }

    #[inline]
    fn xprime(x: f64, support: &ObservableRange) -> f64 {
        // Map [a,b] -> [-1,1].
        let xp = (2.0 * x - (support.lo() + support.hi())) / support.width();
        xp.clamp(-1.0, 1.0)
    }

    /// Fill `out_t[k] = T_k(xp)` for `k=0..out_t.len()`.
    #[inline]
    fn fill_t_values(xp: f64, out_t: &mut [f64]) {
        let m = out_t.len();
        if m == 0 {
            return;
        }
        out_t[0] = 1.0;
        if m == 1 {
            return;
        }
        out_t[1] = xp;
        // Recurrence: T_{k+1}(x) = 2x T_k(x) - T_{k-1}(x)
        for k in 2..m {
            out_t[k] = 2.0 * xp * out_t[k - 1] - out_t[k - 2];
        }
    }

    /// `f(x')` given `tvals[k] = T_k(x')` for `k = 0..=order`.
    #[inline]
    fn unnorm_f_from_t(params: &[f64], tvals: &[f64]) -> f64 {
        let mut f = 1.0f64;
        for (&c, &t) in params.iter().zip(&tvals[1..]) {
            f += c * t;
        }
        f
    }

    /// Primitive of `T_k` (`k >= 1`), given `t[j] = T_j(xp)` for `j <= k + 1`.
    ///
    /// `∫T_1 = t²/2` and `∫T_k = T_{k+1}/(2(k+1)) - T_{k-1}/(2(k-1))` for `k >= 2`.
    #[inline]
    fn primitive(t: &[f64], xp: f64, k: usize) -> f64 {
        if k == 1 {
            0.5 * xp * xp
        } else {
            t[k + 1] / (2.0 * (k as f64 + 1.0)) - t[k - 1] / (2.0 * (k as f64 - 1.0))
        }
    }

    /// Antiderivative `G(x') = ∫_{-1}^{x'} f(t) dt` in the mapped variable.
    ///
    /// `tvals` is scratch space of length `order + 2`.
    fn antiderivative(&self, params: &[f64], xp: f64, tvals: &mut [f64]) -> f64 {
        Self::fill_t_values(xp, tvals);
        let t: &[f64] = tvals;
        let upper: Vec<f64> = (1..=self.order).map(|k| Self::primitive(t, xp, k)).collect();
        Self::fill_t_values(-1.0, tvals);
        let mut g = xp + 1.0;
        for (idx, &c) in params.iter().enumerate() {
            g += c * (upper[idx] - Self::primitive(tvals, -1.0, idx + 1));
        }
        g
    }

    /// `I = ∫_a^b f(x) dx`.
    fn normalization(&self, params: &[f64], support: &ObservableRange) -> Result<f64> {
        // I = w + w * Σ_{k even} c_k / (1-k^2)
        let w = support.width();
        let mut i = w;
        for (idx, &c) in params.iter().enumerate() {
            let k = idx + 1;
            if k % 2 == 0 {
                let denom = 1.0 - (k as f64) * (k as f64);
                i += w * c / denom;
            }
        }
        if !i.is_finite() || i <= 0.0 {
            return Err(Error::Validation(format!(
                "ChebyshevPdf normalization integral is not finite/positive: {i}"
            )));
        }
        Ok(i)
    }

    fn guardrail_check_positive(&self, params: &[f64]) -> Result<()> {
        // Fast conservative check: evaluate f(x') on a small fixed grid in [-1,1].
        // If it goes non-positive anywhere, the PDF is invalid (log undefined).
        let n_grid = 128usize;
        let mut tvals = vec![0.0f64; self.order + 1];
        for i in 0..n_grid {
            let xp = -1.0 + 2.0 * ((i as f64) + 0.5) / (n_grid as f64);
            Self::fill_t_values(xp, &mut tvals);
            let f = Self::unnorm_f_from_t(params, &tvals);
            if !f.is_finite() || f <= 0.0 {
                return Err(Error::Validation(format!(
                    "ChebyshevPdf is non-positive on support (guardrail failed): f(x')={f} at x'={xp}"
                )));
            }
        }
        Ok(())
    }
}

impl UnbinnedPdf for ChebyshevPdf {
    fn n_params(&self) -> usize {
        self.order
    }

    fn log_prob_batch(
        &self,
        xs: &[f64],
        params: &[f64],
        support: &ObservableRange,
        out: &mut [f64],
    ) -> Result<()> {
        self.validate_params_len(params)?;
        self.guardrail_check_positive(params)?;
        check_out_len("ChebyshevPdf", xs.len(), out.len())?;

        // The pdf in x is f(x') / I with I = ∫_a^b f dx.
        let log_i = self.normalization(params, support)?.ln();

        let mut tvals = vec![0.0f64; self.order + 1];
        for (i_evt, &x) in xs.iter().enumerate() {
            if !support.contains(x) {
                out[i_evt] = f64::NEG_INFINITY;
                continue;
            }
            let xp = Self::xprime(x, support);
            Self::fill_t_values(xp, &mut tvals);
            let f = Self::unnorm_f_from_t(params, &tvals);
            if !f.is_finite() || f <= 0.0 {
                return Err(Error::Validation(format!(
                    "ChebyshevPdf is non-positive at data event {i_evt}: f={f} (x={x}, x'={xp})"
                )));
            }
            out[i_evt] = f.ln() - log_i;
        }

        Ok(())
    }

    fn cdf(&self, x: f64, params: &[f64], support: &ObservableRange) -> Result<f64> {
        self.validate_params_len(params)?;
        if x <= support.lo() {
            return Ok(0.0);
        }
        if x >= support.hi() {
            return Ok(1.0);
        }
        let i = self.normalization(params, support)?;
        // dx = (w/2) dx'
        let mut tvals = vec![0.0f64; self.order + 2];
        let g = self.antiderivative(params, Self::xprime(x, support), &mut tvals);
        Ok((0.5 * support.width() * g / i).clamp(0.0, 1.0))
    }

    fn sample(
        &self,
        params: &[f64],
        n_events: usize,
        support: &ObservableRange,
        rng: &mut dyn rand::RngCore,
    ) -> Result<Vec<f64>> {
        self.validate_params_len(params)?;
        self.guardrail_check_positive(params)?;

        // |T_k| <= 1 on [-1,1], so 1 + Σ|c_k| bounds f from above.
        let envelope = 1.0 + params.iter().map(|c| c.abs()).sum::<f64>();
        let mut tvals = vec![0.0f64; self.order + 1];
        let mut xs = Vec::with_capacity(n_events);
        let max_proposals = n_events.saturating_mul(MAX_PROPOSALS_PER_EVENT).max(1);
        let mut proposals = 0usize;
        while xs.len() < n_events {
            proposals += 1;
            if proposals > max_proposals {
                return Err(Error::Computation(format!(
                    "ChebyshevPdf::sample: acceptance too low after {max_proposals} proposals"
                )));
            }
            let xp = 2.0 * u01(rng) - 1.0;
            Self::fill_t_values(xp, &mut tvals);
            let f = Self::unnorm_f_from_t(params, &tvals);
            if u01(rng) * envelope < f {
                let x = 0.5 * (xp * support.width() + support.lo() + support.hi());
                xs.push(x.clamp(support.lo(), support.hi()));
            }
        }
        Ok(xs)
    }
}
