//! # gs-inference
//!
//! Goodness-of-fit testing for GoFStat.
//!
//! This crate provides:
//! - Histograms of unbinned samples with model expectations ([`histogram`])
//! - Chi-square tests: Pearson, Neyman, Baker-Cousins and the curve chi-square ([`chi2`])
//! - Anderson-Darling and Kolmogorov-Smirnov tests ([`edf`])
//! - Monte Carlo sampling distributions and toy p-values ([`sampling`])
//! - The [`GoodnessOfFit`] facade and the [`ToyStudy`] harness
//! - An unbinned maximum-likelihood fitter used by [`FittableModel`]
//!
//! ## Architecture
//!
//! The tests only see the model through the `ModelOracle` trait from gs-core.
//! [`FittableModel`] is the implementation for `gs_unbinned::UnbinnedModel`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Chi-square test family.
pub mod chi2;
/// Empirical-distribution-function tests.
pub mod edf;
/// Goodness-of-fit facade.
pub mod gof;
/// Binned histograms and model curves.
pub mod histogram;
/// Unbinned maximum-likelihood estimation.
pub mod mle;
/// Generic numerical optimizer (L-BFGS-B backend).
pub mod optimizer;
/// Model oracle backed by an unbinned model and the MLE.
pub mod oracle;
/// Sampling distributions of test statistics.
pub mod sampling;
/// Toy-study harness.
pub mod toy_study;

#[cfg(test)]
mod testing;

pub use chi2::BinnedTestConfig;
pub use gof::{GofEntry, GofReport, GoodnessOfFit};
pub use histogram::{Bin, BinnedHistogram, ModelCurve};
pub use mle::MaximumLikelihoodEstimator;
pub use optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use oracle::FittableModel;
pub use sampling::{SamplingDistribution, SamplingEngine, ToyConfig, toy_p_value};
pub use toy_study::{
    CancelToken, FitStatus, StudyConfig, ToyStudy, ToyStudyReport, ToyStudyTable, TrialPhase,
    TrialRecord,
};
