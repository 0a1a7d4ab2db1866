//! Chi-square distribution tail.

use gs_core::{Error, Result};
use statrs::function::gamma::gamma_ur;

/// Upper-tail probability `P(χ²_ndf > x)`.
///
/// Computed as the regularized upper incomplete gamma function `Q(ndf/2, x/2)`.
pub fn sf(x: f64, ndf: usize) -> Result<f64> {
    if ndf == 0 {
        return Err(Error::Validation("chi-square ndf must be >= 1".into()));
    }
    if x.is_nan() {
        return Err(Error::Computation("chi-square statistic is NaN".into()));
    }
    if x <= 0.0 {
        return Ok(1.0);
    }
    if x.is_infinite() {
        return Ok(0.0);
    }
    Ok(gamma_ur(0.5 * ndf as f64, 0.5 * x).clamp(0.0, 1.0))
}
