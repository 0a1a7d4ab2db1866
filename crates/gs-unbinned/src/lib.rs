//! # gs-unbinned
//!
//! Bounded one-dimensional (unbinned) probability models for GoFStat.
//!
//! This crate provides:
//! - Parametric PDFs normalized on a bounded support ([`GaussianPdf`], [`ChebyshevPdf`])
//!   and a nestable additive [`MixturePdf`].
//! - [`UnbinnedModel`]: a PDF plus named, bounded parameters, with NLL evaluation and
//!   reproducible event generation, fitted via `gs-inference`.
//! - The composite [`tutorial`] model used by the CLI and the integration tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod model;
pub mod pdf;
pub mod tutorial;

mod math;

pub use model::{Parameter, UnbinnedModel};
pub use pdf::{ChebyshevPdf, GaussianPdf, MixturePdf, UnbinnedPdf};
pub use tutorial::tutorial_model;

#[cfg(test)]
mod tests;
