//! [`ModelOracle`] implementation for unbinned models fitted by maximum likelihood.

use crate::mle::MaximumLikelihoodEstimator;
use gs_core::{Error, ModelOracle, ObservableRange, ParameterSnapshot, Result, UnbinnedSample};
use gs_unbinned::UnbinnedModel;

/// An [`UnbinnedModel`] at its current parameter values, refitted with an MLE.
///
/// The model's `init` values are the current values: a successful [`ModelOracle::refit`]
/// overwrites them with the best fit.
#[derive(Debug, Clone)]
pub struct FittableModel {
    model: UnbinnedModel,
    mle: MaximumLikelihoodEstimator,
}

impl FittableModel {
    /// Wrap a model with the default estimator.
    pub fn new(model: UnbinnedModel) -> Self {
        Self { model, mle: MaximumLikelihoodEstimator::new() }
    }

    /// Wrap a model with a custom estimator.
    pub fn with_estimator(model: UnbinnedModel, mle: MaximumLikelihoodEstimator) -> Self {
        Self { model, mle }
    }

    /// Underlying model.
    pub fn model(&self) -> &UnbinnedModel {
        &self.model
    }

    /// Current parameter values.
    pub fn values(&self) -> Vec<f64> {
        self.model.parameter_init()
    }
}

impl ModelOracle for FittableModel {
    fn density(&self, x: f64) -> Result<f64> {
        self.model.density(x, &self.values())
    }

    fn cumulative(&self, x: f64) -> Result<f64> {
        self.model.cdf(x, &self.values())
    }

    fn generate(&self, n: usize, seed: u64) -> Result<UnbinnedSample> {
        self.model.generate(&self.values(), n, seed)
    }

    fn refit(&mut self, data: &UnbinnedSample) -> Result<ParameterSnapshot> {
        let fit = match self.mle.fit(&self.model, data) {
            Ok(fit) => fit,
            Err(e @ Error::FitNonConvergence(_)) => return Err(e),
            Err(e) => return Err(Error::FitNonConvergence(e.to_string())),
        };
        if !fit.converged {
            return Err(Error::FitNonConvergence(format!(
                "optimizer stopped after {} iterations (nll={})",
                fit.n_iter, fit.nll
            )));
        }
        self.model.set_values(&fit.parameters)?;
        Ok(self.model.snapshot())
    }

    fn parameter_count(&self) -> usize {
        self.model.n_free()
    }

    fn snapshot(&self) -> ParameterSnapshot {
        self.model.snapshot()
    }

    fn restore(&mut self, snapshot: &ParameterSnapshot) -> Result<()> {
        self.model.restore(snapshot)
    }

    fn support(&self) -> ObservableRange {
        self.model.support()
    }
}
