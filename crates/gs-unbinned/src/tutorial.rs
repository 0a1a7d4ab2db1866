//! Composite tutorial model: Chebyshev background plus a double-Gaussian signal.
//!
//! `model = bkgfrac·bkg + (1 - bkgfrac)·sig` with
//! `sig = sig1frac·N(mean, sigma1) + (1 - sig1frac)·N(mean, sigma2)` and
//! `bkg = Chebyshev(a0, a1)` on `x ∈ [0, 10]`.

use crate::model::{Parameter, UnbinnedModel};
use crate::pdf::{ChebyshevPdf, GaussianPdf, MixturePdf, UnbinnedPdf};
use gs_core::{ObservableRange, Result};
use std::sync::Arc;

/// Observable range of the tutorial model.
pub const TUTORIAL_RANGE: (f64, f64) = (0.0, 10.0);

/// Number of equal-width bins used for the binned tests.
pub const TUTORIAL_BINS: usize = 100;

/// Build the tutorial model at its generation values.
///
/// Floating: `a0`, `a1`, `bkgfrac`, `sig1frac`. Fixed: `mean`, `sigma1`, `sigma2`.
pub fn tutorial_model() -> Result<UnbinnedModel> {
    let parameters = vec![
        Parameter::floating("a0", 0.5, (0.0, 1.0)),
        Parameter::floating("a1", 0.2, (0.0, 1.0)),
        Parameter::floating("bkgfrac", 0.5, (0.0, 1.0)),
        Parameter::floating("sig1frac", 0.8, (0.0, 1.0)),
        Parameter::fixed("mean", 5.0),
        Parameter::fixed("sigma1", 0.5),
        Parameter::fixed("sigma2", 1.0),
    ];

    let sig: Arc<dyn UnbinnedPdf> = Arc::new(MixturePdf::new(vec![
        Arc::new(GaussianPdf::new()),
        Arc::new(GaussianPdf::new()),
    ])?);
    let bkg: Arc<dyn UnbinnedPdf> = Arc::new(ChebyshevPdf::new(2)?);
    let model = MixturePdf::new(vec![bkg, sig])?;

    // Slots: [bkgfrac | a0, a1 | sig1frac, mean, sigma1, mean, sigma2]
    let shape_param_indices = vec![2, 0, 1, 3, 4, 5, 4, 6];
    UnbinnedModel::new(
        parameters,
        Arc::new(model),
        shape_param_indices,
        ObservableRange::new(TUTORIAL_RANGE.0, TUTORIAL_RANGE.1)?,
    )
}
