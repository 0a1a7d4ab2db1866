//! # gs-core
//!
//! Core types, traits and the error type shared by every GoFStat crate.
//!
//! The goodness-of-fit engine (`gs-inference`) depends on the [`traits::ModelOracle`]
//! trait only, never on a concrete model implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::ModelOracle;
pub use types::{
    FitResult, ObservableRange, ParameterSnapshot, TestKind, TestResult, UnbinnedSample,
};

/// Workspace version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
