//! Probability building blocks for GoFStat.
//!
//! This crate hosts the reusable probability math behind the goodness-of-fit engine:
//! - the normal distribution used by the Gaussian PDF
//! - asymptotic tails of the test statistics (chi-square, Kolmogorov, Anderson-Darling)
//! - deterministic seed derivation for parallel Monte Carlo

pub mod anderson_darling;
pub mod chi_square;
pub mod kolmogorov;
pub mod math;
pub mod normal;
