use crate::pdf::{UnbinnedPdf, check_out_len, u01};
use gs_core::{Error, ObservableRange, Result};
use gs_prob::normal::{standard_cdf, standard_quantile};

/// Truncated Gaussian PDF `N(μ, σ)` normalized on the observable bounds.
///
/// Parameters: `[mu, sigma]`.
#[derive(Debug, Clone, Default)]
pub struct GaussianPdf;

impl GaussianPdf {
    /// Create a new Gaussian PDF.
    pub fn new() -> Self {
        Self
    }

    fn validate(params: &[f64]) -> Result<(f64, f64)> {
        if params.len() != 2 {
            return Err(Error::Validation(format!(
                "GaussianPdf expects 2 params (mu, sigma), got {}",
                params.len()
            )));
        }
        let mu = params[0];
        let sigma = params[1];
        if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Err(Error::Validation(format!(
                "GaussianPdf parameters must be finite with sigma > 0, got mu={mu}, sigma={sigma}"
            )));
        }
        Ok((mu, sigma))
    }

    /// `(Phi(z_a), Z)` with `Z = Phi(z_b) - Phi(z_a)` the truncation normalization.
    fn normalization(mu: f64, sigma: f64, support: &ObservableRange) -> Result<(f64, f64)> {
        let cdf_a = standard_cdf((support.lo() - mu) / sigma);
        let cdf_b = standard_cdf((support.hi() - mu) / sigma);
        let z = cdf_b - cdf_a;
        if !z.is_finite() || z <= 0.0 {
            return Err(Error::Computation(format!(
                "GaussianPdf has no probability mass on {support} (mu={mu}, sigma={sigma})"
            )));
        }
        Ok((cdf_a, z))
    }
}

impl UnbinnedPdf for GaussianPdf {
    fn n_params(&self) -> usize {
        2
    }

    fn log_prob_batch(
        &self,
        xs: &[f64],
        params: &[f64],
        support: &ObservableRange,
        out: &mut [f64],
    ) -> Result<()> {
        let (mu, sigma) = Self::validate(params)?;
        check_out_len("GaussianPdf", xs.len(), out.len())?;
        let (_, z) = Self::normalization(mu, sigma, support)?;
        let log_z = z.ln();

        for (o, &x) in out.iter_mut().zip(xs) {
            *o = if support.contains(x) {
                gs_prob::normal::logpdf(x, mu, sigma)? - log_z
            } else {
                f64::NEG_INFINITY
            };
        }
        Ok(())
    }

    fn cdf(&self, x: f64, params: &[f64], support: &ObservableRange) -> Result<f64> {
        let (mu, sigma) = Self::validate(params)?;
        if x <= support.lo() {
            return Ok(0.0);
        }
        if x >= support.hi() {
            return Ok(1.0);
        }
        let (cdf_a, z) = Self::normalization(mu, sigma, support)?;
        Ok(((standard_cdf((x - mu) / sigma) - cdf_a) / z).clamp(0.0, 1.0))
    }

    fn sample(
        &self,
        params: &[f64],
        n_events: usize,
        support: &ObservableRange,
        rng: &mut dyn rand::RngCore,
    ) -> Result<Vec<f64>> {
        let (mu, sigma) = Self::validate(params)?;
        let (cdf_a, z) = Self::normalization(mu, sigma, support)?;

        // Inverse-CDF sampling restricted to [Phi(z_a), Phi(z_b)].
        let mut xs = Vec::with_capacity(n_events);
        for _ in 0..n_events {
            let u = (cdf_a + u01(rng) * z).clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
            let x = mu + sigma * standard_quantile(u)?;
            xs.push(x.clamp(support.lo(), support.hi()));
        }
        Ok(xs)
    }
}
