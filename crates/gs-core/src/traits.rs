//! Core traits for GoFStat
//!
//! The goodness-of-fit engine treats the fitted model purely as an oracle: it asks for
//! densities, cumulative probabilities and pseudo-samples, and asks the model to refit
//! itself. How the model is built and fitted stays behind this trait.

use crate::types::{ObservableRange, ParameterSnapshot, UnbinnedSample};
use crate::Result;

/// Probability model consumed by the goodness-of-fit engine.
///
/// Implementations are cheap to clone relative to a fit: the toy-study harness gives every
/// trial a private clone so that concurrent trials never observe each other's parameters.
pub trait ModelOracle: Clone + Send + Sync {
    /// Normalized density on [`ModelOracle::support`] at the current parameter values.
    fn density(&self, x: f64) -> Result<f64>;

    /// Cumulative probability `P(X <= x)` on the support, in `[0, 1]`.
    fn cumulative(&self, x: f64) -> Result<f64>;

    /// Draw `n` events at the current parameter values.
    ///
    /// The same `(n, seed)` pair must always produce the same sample.
    fn generate(&self, n: usize, seed: u64) -> Result<UnbinnedSample>;

    /// Fit the floating parameters to `data` and keep the result as current values.
    ///
    /// Returns [`crate::Error::FitNonConvergence`] when the fit fails.
    fn refit(&mut self, data: &UnbinnedSample) -> Result<ParameterSnapshot>;

    /// Number of floating (fitted) parameters.
    fn parameter_count(&self) -> usize;

    /// Capture the current parameter values.
    fn snapshot(&self) -> ParameterSnapshot;

    /// Reset parameter values from a snapshot taken on the same model.
    fn restore(&mut self, snapshot: &ParameterSnapshot) -> Result<()>;

    /// Observable interval on which the model is normalized.
    fn support(&self) -> ObservableRange;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// Uniform model on `[0, 1]` with no parameters.
    #[derive(Clone)]
    struct DummyOracle;

    impl ModelOracle for DummyOracle {
        fn density(&self, x: f64) -> Result<f64> {
            Ok(if (0.0..=1.0).contains(&x) { 1.0 } else { 0.0 })
        }

        fn cumulative(&self, x: f64) -> Result<f64> {
            Ok(x.clamp(0.0, 1.0))
        }

        fn generate(&self, n: usize, _seed: u64) -> Result<UnbinnedSample> {
            UnbinnedSample::new((0..n).map(|i| (i as f64 + 0.5) / n as f64).collect())
        }

        fn refit(&mut self, _data: &UnbinnedSample) -> Result<ParameterSnapshot> {
            Err(Error::FitNonConvergence("nothing to fit".into()))
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

    #[test]
    fn test_dummy_oracle() {
        let mut oracle = DummyOracle;
        assert_eq!(oracle.parameter_count(), 0);
        assert_eq!(oracle.cumulative(0.25).unwrap(), 0.25);
        let sample = oracle.generate(4, 1).unwrap();
        assert_eq!(sample.len(), 4);
        assert!(matches!(oracle.refit(&sample), Err(Error::FitNonConvergence(_))));
    }
}
