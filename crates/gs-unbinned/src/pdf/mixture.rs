use crate::math::logsumexp;
use crate::pdf::{UnbinnedPdf, check_out_len};
use gs_core::{Error, ObservableRange, Result};
use rand_distr::{Binomial, Distribution};
use std::sync::Arc;

/// Additive mixture `p(x) = Σ_k f_k p_k(x)` of normalized component PDFs.
///
/// The first `m - 1` parameters are the fractions `f_1..f_{m-1}`; the last component takes
/// `f_m = 1 - Σ f_k`. The remaining parameters are the component shape parameters,
/// concatenated in component order. Components may themselves be mixtures.
#[derive(Debug, Clone)]
pub struct MixturePdf {
    components: Vec<Arc<dyn UnbinnedPdf>>,
    offsets: Vec<usize>,
    n_params: usize,
}

impl MixturePdf {
    /// Create a mixture of at least two components.
    pub fn new(components: Vec<Arc<dyn UnbinnedPdf>>) -> Result<Self> {
        if components.len() < 2 {
            return Err(Error::Validation(format!(
                "MixturePdf requires at least 2 components, got {}",
                components.len()
            )));
        }
        let n_frac = components.len() - 1;
        let mut offsets = Vec::with_capacity(components.len());
        let mut off = n_frac;
        for c in &components {
            offsets.push(off);
            off += c.n_params();
        }
        Ok(Self { components, offsets, n_params: off })
    }

    /// Component PDFs in parameter order.
    pub fn components(&self) -> &[Arc<dyn UnbinnedPdf>] {
        &self.components
    }

    /// Validate `params` and return the full fraction vector (length `m`).
    fn fractions(&self, params: &[f64]) -> Result<Vec<f64>> {
        if params.len() != self.n_params {
            return Err(Error::Validation(format!(
                "MixturePdf expects {} params, got {}",
                self.n_params,
                params.len()
            )));
        }
        let n_frac = self.components.len() - 1;
        let mut fracs = Vec::with_capacity(self.components.len());
        let mut sum = 0.0;
        for &f in &params[..n_frac] {
            if !f.is_finite() || !(0.0..=1.0).contains(&f) {
                return Err(Error::Validation(format!(
                    "MixturePdf fraction must be in [0, 1], got {f}"
                )));
            }
            sum += f;
            fracs.push(f);
        }
        // Allow rounding slack on the sum; the last fraction is clamped at zero.
        if sum > 1.0 + 1e-12 {
            return Err(Error::Validation(format!(
                "MixturePdf fractions sum to {sum} > 1"
            )));
        }
        fracs.push((1.0 - sum).max(0.0));
        Ok(fracs)
    }

    fn component_params<'a>(&self, params: &'a [f64], k: usize) -> &'a [f64] {
        let off = self.offsets[k];
        &params[off..off + self.components[k].n_params()]
    }
}

impl UnbinnedPdf for MixturePdf {
    fn n_params(&self) -> usize {
        self.n_params
    }

    fn log_prob_batch(
        &self,
        xs: &[f64],
        params: &[f64],
        support: &ObservableRange,
        out: &mut [f64],
    ) -> Result<()> {
        let fracs = self.fractions(params)?;
        check_out_len("MixturePdf", xs.len(), out.len())?;

        let n = xs.len();
        let mut logps: Vec<Vec<f64>> = Vec::with_capacity(self.components.len());
        for (k, comp) in self.components.iter().enumerate() {
            let mut lp = vec![f64::NEG_INFINITY; n];
            if fracs[k] > 0.0 {
                comp.log_prob_batch(xs, self.component_params(params, k), support, &mut lp)?;
            }
            logps.push(lp);
        }

        let log_fracs: Vec<f64> =
            fracs.iter().map(|&f| if f > 0.0 { f.ln() } else { f64::NEG_INFINITY }).collect();
        let mut terms = vec![0.0f64; self.components.len()];
        for (i, o) in out.iter_mut().enumerate() {
            for (k, t) in terms.iter_mut().enumerate() {
                *t = log_fracs[k] + logps[k][i];
            }
            *o = logsumexp(&terms);
        }
        Ok(())
    }

    fn cdf(&self, x: f64, params: &[f64], support: &ObservableRange) -> Result<f64> {
        let fracs = self.fractions(params)?;
        let mut c = 0.0;
        for (k, comp) in self.components.iter().enumerate() {
            if fracs[k] > 0.0 {
                c += fracs[k] * comp.cdf(x, self.component_params(params, k), support)?;
            }
        }
        Ok(c.clamp(0.0, 1.0))
    }

    fn sample(
        &self,
        params: &[f64],
        n_events: usize,
        support: &ObservableRange,
        rng: &mut dyn rand::RngCore,
    ) -> Result<Vec<f64>> {
        let fracs = self.fractions(params)?;

        // Multinomial split of the events over components via conditional binomials.
        let mut remaining = n_events as u64;
        let mut mass_left = 1.0f64;
        let mut xs = Vec::with_capacity(n_events);
        for (k, comp) in self.components.iter().enumerate() {
            let last = k + 1 == self.components.len();
            let n_k = if last || remaining == 0 {
                remaining
            } else {
                let p = if mass_left > 0.0 { (fracs[k] / mass_left).clamp(0.0, 1.0) } else { 0.0 };
                Binomial::new(remaining, p)
                    .map_err(|e| Error::Computation(format!("MixturePdf binomial split: {e}")))?
                    .sample(rng)
            };
            remaining -= n_k;
            mass_left -= fracs[k];
            if n_k > 0 {
                xs.extend(comp.sample(
                    self.component_params(params, k),
                    n_k as usize,
                    support,
                    rng,
                )?);
            }
        }
        Ok(xs)
    }
}
