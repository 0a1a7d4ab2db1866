//! Bounded one-dimensional probability density functions (PDFs).

use gs_core::{ObservableRange, Result};

mod chebyshev;
mod gaussian;
mod mixture;

pub use chebyshev::ChebyshevPdf;
pub use gaussian::GaussianPdf;
pub use mixture::MixturePdf;

/// Trait for normalized PDFs on a bounded observable support.
///
/// Implementations define a **proper density** on the `support` passed to every call: the
/// shape is truncated to `[lo, hi]` and renormalized there.
pub trait UnbinnedPdf: Send + Sync + std::fmt::Debug {
    /// Number of shape parameters for this PDF.
    fn n_params(&self) -> usize;

    /// Evaluate `log p(x | params)` for all events in `xs`.
    ///
    /// `out` must have length `xs.len()`.
    fn log_prob_batch(
        &self,
        xs: &[f64],
        params: &[f64],
        support: &ObservableRange,
        out: &mut [f64],
    ) -> Result<()>;

    /// `P(X <= x | params)` on the support.
    fn cdf(&self, x: f64, params: &[f64], support: &ObservableRange) -> Result<f64>;

    /// Draw `n_events` values from the PDF.
    fn sample(
        &self,
        params: &[f64],
        n_events: usize,
        support: &ObservableRange,
        rng: &mut dyn rand::RngCore,
    ) -> Result<Vec<f64>>;

    /// Evaluate `log p(x | params)` for a single event.
    fn log_prob(&self, x: f64, params: &[f64], support: &ObservableRange) -> Result<f64> {
        let mut out = [0.0f64];
        self.log_prob_batch(&[x], params, support, &mut out)?;
        Ok(out[0])
    }
}

/// Uniform(0,1) from RngCore (open interval).
#[inline]
pub(crate) fn u01(rng: &mut dyn rand::RngCore) -> f64 {
    (rng.next_u64() as f64 + 0.5) * (1.0 / 18446744073709551616.0_f64)
}

pub(crate) fn check_out_len(name: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(gs_core::Error::Validation(format!(
            "{name} out length mismatch: expected {expected}, got {got}"
        )));
    }
    Ok(())
}
