//! Maximum Likelihood Estimation for unbinned models.

use crate::optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizerConfig};
use gs_core::{Error, FitResult, Result, UnbinnedSample};
use gs_unbinned::UnbinnedModel;

/// NLL reported for parameter points where the PDF is invalid (for example a Chebyshev
/// shape that turns negative). Keeps the line search inside the valid region.
const INVALID_NLL: f64 = 1e30;

/// Maximum Likelihood Estimator
///
/// Fits an [`UnbinnedModel`] to a sample by minimizing the negative log-likelihood over the
/// floating parameters; fixed parameters stay at their current values.
#[derive(Debug, Clone, Default)]
pub struct MaximumLikelihoodEstimator {
    config: OptimizerConfig,
}

/// NLL over the free parameters only; fixed ones are taken from `base`.
struct FreeNll<'a> {
    model: &'a UnbinnedModel,
    xs: &'a [f64],
    free: &'a [usize],
    base: &'a [f64],
}

impl FreeNll<'_> {
    fn expand(&self, free_values: &[f64]) -> Vec<f64> {
        let mut full = self.base.to_vec();
        for (&i, &v) in self.free.iter().zip(free_values) {
            full[i] = v;
        }
        full
    }
}

impl ObjectiveFunction for FreeNll<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        match self.model.nll(self.xs, &self.expand(params)) {
            Ok(nll) if nll.is_finite() => Ok(nll),
            Ok(_) | Err(Error::Validation(_)) => Ok(INVALID_NLL),
            Err(e) => Err(e),
        }
    }
}

impl MaximumLikelihoodEstimator {
    /// Create a new MLE with default configuration
    pub fn new() -> Self {
        Self { config: OptimizerConfig::default() }
    }

    /// Create MLE with custom optimizer configuration
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Access the optimizer configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fit starting from the model's current parameter values.
    ///
    /// Only events inside the model support enter the likelihood. The returned
    /// [`FitResult::parameters`] has one entry per model parameter (fixed ones included).
    pub fn fit(&self, model: &UnbinnedModel, data: &UnbinnedSample) -> Result<FitResult> {
        let inside = data.restrict(&model.support());
        if inside.is_empty() {
            return Err(Error::Validation(format!(
                "no events inside the model support {}",
                model.support()
            )));
        }

        let base = model.parameter_init();
        let bounds_all = model.parameter_bounds();
        let free = model.free_indices();
        let init: Vec<f64> = free.iter().map(|&i| base[i]).collect();
        let bounds: Vec<(f64, f64)> = free.iter().map(|&i| bounds_all[i]).collect();

        let objective = FreeNll { model, xs: inside.values(), free: &free, base: &base };
        let opt = LbfgsbOptimizer::new(self.config.clone()).minimize(&objective, &init, &bounds)?;
        let parameters = objective.expand(&opt.parameters);

        if opt.fval >= INVALID_NLL {
            return Err(Error::FitNonConvergence(format!(
                "fit ended in an invalid parameter region ({})",
                opt.message
            )));
        }
        if !opt.converged {
            log::warn!("unbinned fit did not converge: {opt}");
        }

        Ok(FitResult::new(parameters, opt.fval, opt.converged, opt.n_iter, opt.n_fev))
    }
}
