//! Small numerically-stable helpers shared by PDFs and the model.

/// `log(Σ exp(x_i))`, stable for large magnitudes. Returns `-inf` if every term is `-inf`.
#[inline]
pub(crate) fn logsumexp(xs: &[f64]) -> f64 {
    let m = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        return m;
    }
    let s: f64 = xs.iter().map(|&x| (x - m).exp()).sum();
    m + s.ln()
}
