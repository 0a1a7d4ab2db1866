//! Oracles shared by the unit tests.

use gs_core::{Error, ModelOracle, ObservableRange, ParameterSnapshot, Result, UnbinnedSample};
use rand::{Rng, SeedableRng};

/// Uniform model on `[0, 1]` without parameters; refit and generation can be made to fail.
#[derive(Debug, Clone, Default)]
pub(crate) struct UniformOracle {
    pub(crate) fail_refit: bool,
    pub(crate) fail_generate: bool,
}

impl ModelOracle for UniformOracle {
    fn density(&self, x: f64) -> Result<f64> {
        Ok(if (0.0..=1.0).contains(&x) { 1.0 } else { 0.0 })
    }

    fn cumulative(&self, x: f64) -> Result<f64> {
        Ok(x.clamp(0.0, 1.0))
    }

    fn generate(&self, n: usize, seed: u64) -> Result<UnbinnedSample> {
        if self.fail_generate {
            return Err(Error::Computation("generation disabled".into()));
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        UnbinnedSample::new((0..n).map(|_| rng.random::<f64>()).collect())
    }

    fn refit(&mut self, _data: &UnbinnedSample) -> Result<ParameterSnapshot> {
        if self.fail_refit {
            return Err(Error::FitNonConvergence("refit disabled".into()));
        }
        Ok(self.snapshot())
    }

    fn parameter_count(&self) -> usize {
        0
    }

    fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot::new(vec![], vec![])
    }

    fn restore(&mut self, _snapshot: &ParameterSnapshot) -> Result<()> {
        Ok(())
    }

    fn support(&self) -> ObservableRange {
        ObservableRange::new(0.0, 1.0).unwrap()
    }
}

/// Sorted regular grid `(i + 0.5) / n`.
pub(crate) fn grid(n: usize) -> UnbinnedSample {
    UnbinnedSample::new((0..n).map(|i| (i as f64 + 0.5) / n as f64).collect()).unwrap()
}
