//! Unbinned model: one bounded PDF plus named, bounded parameters.

use crate::pdf::UnbinnedPdf;
use gs_core::{Error, ObservableRange, ParameterSnapshot, Result, UnbinnedSample};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::sync::Arc;

/// Below this many events the NLL is evaluated on the calling thread.
const PAR_NLL_MIN_EVENTS: usize = 8192;

/// A model parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Stable parameter name.
    pub name: String,
    /// Suggested initial value.
    pub init: f64,
    /// Bounds `(low, high)` (LBFGS-B box constraints).
    pub bounds: (f64, f64),
    /// Held at `init` during fits.
    pub fixed: bool,
}

impl Parameter {
    /// Floating parameter with the given bounds.
    pub fn floating(name: impl Into<String>, init: f64, bounds: (f64, f64)) -> Self {
        Self { name: name.into(), init, bounds, fixed: false }
    }

    /// Constant parameter.
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), init: value, bounds: (value, value), fixed: true }
    }
}

/// An unbinned model `p(x | θ)` on a bounded observable.
///
/// `shape_param_indices[j]` is the global parameter feeding PDF parameter slot `j`, so one
/// parameter can drive several slots (for example a mean shared by two Gaussians).
#[derive(Debug, Clone)]
pub struct UnbinnedModel {
    parameters: Vec<Parameter>,
    pdf: Arc<dyn UnbinnedPdf>,
    shape_param_indices: Vec<usize>,
    support: ObservableRange,
}

impl UnbinnedModel {
    /// Create a new unbinned model.
    pub fn new(
        parameters: Vec<Parameter>,
        pdf: Arc<dyn UnbinnedPdf>,
        shape_param_indices: Vec<usize>,
        support: ObservableRange,
    ) -> Result<Self> {
        if shape_param_indices.len() != pdf.n_params() {
            return Err(Error::Validation(format!(
                "shape_param_indices length {} != pdf.n_params() {}",
                shape_param_indices.len(),
                pdf.n_params()
            )));
        }
        for &idx in &shape_param_indices {
            if idx >= parameters.len() {
                return Err(Error::Validation(format!(
                    "shape parameter index out of range: {idx} >= {}",
                    parameters.len()
                )));
            }
        }
        for p in &parameters {
            if !p.init.is_finite() {
                return Err(Error::Validation(format!(
                    "parameter '{}' init is not finite",
                    p.name
                )));
            }
            if p.bounds.0.is_nan() || p.bounds.1.is_nan() || p.bounds.0 > p.bounds.1 {
                return Err(Error::Validation(format!(
                    "parameter '{}' has invalid bounds {:?}",
                    p.name, p.bounds
                )));
            }
            if p.init < p.bounds.0 || p.init > p.bounds.1 {
                return Err(Error::Validation(format!(
                    "parameter '{}' init {} outside bounds {:?}",
                    p.name, p.init, p.bounds
                )));
            }
        }
        for (i, p) in parameters.iter().enumerate() {
            if parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(Error::Validation(format!("duplicate parameter name '{}'", p.name)));
            }
        }
        Ok(Self { parameters, pdf, shape_param_indices, support })
    }

    /// Access parameters.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Observable support.
    pub fn support(&self) -> ObservableRange {
        self.support
    }

    /// Underlying PDF.
    pub fn pdf(&self) -> &Arc<dyn UnbinnedPdf> {
        &self.pdf
    }

    /// Total number of parameters (fixed and floating).
    pub fn dim(&self) -> usize {
        self.parameters.len()
    }

    /// Indices of the floating parameters.
    pub fn free_indices(&self) -> Vec<usize> {
        self.parameters.iter().enumerate().filter(|(_, p)| !p.fixed).map(|(i, _)| i).collect()
    }

    /// Number of floating parameters.
    pub fn n_free(&self) -> usize {
        self.parameters.iter().filter(|p| !p.fixed).count()
    }

    /// Parameter names in order.
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Initial values in order.
    pub fn parameter_init(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.init).collect()
    }

    /// Bounds in order.
    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.bounds).collect()
    }

    /// Capture the initial values as a snapshot.
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot::new(self.parameter_names(), self.parameter_init())
    }

    /// Set initial values from a snapshot, matching by name.
    ///
    /// Values outside a parameter's bounds are rejected.
    pub fn restore(&mut self, snapshot: &ParameterSnapshot) -> Result<()> {
        for p in &mut self.parameters {
            let v = snapshot.get(&p.name).ok_or_else(|| {
                Error::Validation(format!("snapshot has no value for parameter '{}'", p.name))
            })?;
            if !v.is_finite() || v < p.bounds.0 || v > p.bounds.1 {
                return Err(Error::Validation(format!(
                    "snapshot value {v} for '{}' outside bounds {:?}",
                    p.name, p.bounds
                )));
            }
            p.init = v;
        }
        Ok(())
    }

    /// Overwrite the initial values in place (used after a fit).
    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        self.validate_params_len(values.len())?;
        for (p, &v) in self.parameters.iter_mut().zip(values) {
            p.init = v.clamp(p.bounds.0, p.bounds.1);
        }
        Ok(())
    }

    fn validate_params_len(&self, len: usize) -> Result<()> {
        if len != self.parameters.len() {
            return Err(Error::Validation(format!(
                "parameter length mismatch: expected {}, got {}",
                self.parameters.len(),
                len
            )));
        }
        Ok(())
    }

    fn shape_params(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.validate_params_len(params.len())?;
        Ok(self.shape_param_indices.iter().map(|&i| params[i]).collect())
    }

    /// Negative log-likelihood `-Σ log p(x_i | θ)` of the events in `xs`.
    pub fn nll(&self, xs: &[f64], params: &[f64]) -> Result<f64> {
        let shape = self.shape_params(params)?;
        let chunk_nll = |chunk: &[f64]| -> Result<f64> {
            let mut lp = vec![0.0f64; chunk.len()];
            self.pdf.log_prob_batch(chunk, &shape, &self.support, &mut lp)?;
            Ok(-lp.iter().sum::<f64>())
        };
        if xs.len() < PAR_NLL_MIN_EVENTS {
            return chunk_nll(xs);
        }
        xs.par_chunks(PAR_NLL_MIN_EVENTS / 4)
            .map(chunk_nll)
            .try_reduce(|| 0.0, |a, b| Ok(a + b))
    }

    /// Density `p(x | θ)`.
    pub fn density(&self, x: f64, params: &[f64]) -> Result<f64> {
        let shape = self.shape_params(params)?;
        Ok(self.pdf.log_prob(x, &shape, &self.support)?.exp())
    }

    /// Cumulative probability `P(X <= x | θ)`.
    pub fn cdf(&self, x: f64, params: &[f64]) -> Result<f64> {
        let shape = self.shape_params(params)?;
        self.pdf.cdf(x, &shape, &self.support)
    }

    /// Draw `n_events` events, reproducibly for a given `seed`.
    pub fn generate(&self, params: &[f64], n_events: usize, seed: u64) -> Result<UnbinnedSample> {
        let shape = self.shape_params(params)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let xs = self.pdf.sample(&shape, n_events, &self.support, &mut rng)?;
        UnbinnedSample::new(xs)
    }
}
