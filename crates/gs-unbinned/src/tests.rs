use crate::model::{Parameter, UnbinnedModel};
use crate::pdf::{ChebyshevPdf, GaussianPdf, MixturePdf, UnbinnedPdf};
use crate::tutorial::{TUTORIAL_RANGE, tutorial_model};
use approx::assert_relative_eq;
use gs_core::ObservableRange;
use rand::prelude::*;
use std::sync::Arc;

fn support() -> ObservableRange {
    ObservableRange::new(0.0, 10.0).unwrap()
}

/// Midpoint-rule integral of `exp(log_prob)` over the support.
fn integrate_density(pdf: &dyn UnbinnedPdf, params: &[f64], support: &ObservableRange) -> f64 {
    let n = 20_000usize;
    let h = support.width() / n as f64;
    let xs: Vec<f64> = (0..n).map(|i| support.lo() + (i as f64 + 0.5) * h).collect();
    let mut lp = vec![0.0f64; n];
    pdf.log_prob_batch(&xs, params, support, &mut lp).unwrap();
    lp.iter().map(|l| l.exp()).sum::<f64>() * h
}

fn all_pdfs() -> Vec<(Arc<dyn UnbinnedPdf>, Vec<f64>)> {
    vec![
        (Arc::new(ChebyshevPdf::new(1).unwrap()), vec![0.0]),
        (Arc::new(GaussianPdf::new()), vec![4.0, 1.3]),
        (Arc::new(GaussianPdf::new()), vec![-1.0, 2.0]),
        (Arc::new(ChebyshevPdf::new(2).unwrap()), vec![0.5, 0.2]),
        (Arc::new(ChebyshevPdf::new(3).unwrap()), vec![-0.3, 0.1, 0.2]),
        (
            Arc::new(
                MixturePdf::new(vec![
                    Arc::new(ChebyshevPdf::new(1).unwrap()),
                    Arc::new(GaussianPdf::new()),
                ])
                .unwrap(),
            ),
            vec![0.3, 0.4, 6.0, 0.7],
        ),
    ]
}

#[test]
fn test_pdfs_are_normalized_on_support() {
    let s = support();
    for (pdf, params) in all_pdfs() {
        let integral = integrate_density(pdf.as_ref(), &params, &s);
        assert_relative_eq!(integral, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_cdf_matches_integrated_density() {
    let s = support();
    for (pdf, params) in all_pdfs() {
        assert_eq!(pdf.cdf(s.lo(), &params, &s).unwrap(), 0.0);
        assert_eq!(pdf.cdf(s.hi(), &params, &s).unwrap(), 1.0);
        for &x in &[1.0, 3.7, 5.0, 8.2] {
            let sub = ObservableRange::new(s.lo(), x).unwrap();
            let n = 20_000usize;
            let h = sub.width() / n as f64;
            let xs: Vec<f64> = (0..n).map(|i| sub.lo() + (i as f64 + 0.5) * h).collect();
            let mut lp = vec![0.0f64; n];
            pdf.log_prob_batch(&xs, &params, &s, &mut lp).unwrap();
            let partial = lp.iter().map(|l| l.exp()).sum::<f64>() * h;
            assert_relative_eq!(pdf.cdf(x, &params, &s).unwrap(), partial, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_log_prob_outside_support_is_neg_inf() {
    let s = support();
    for (pdf, params) in all_pdfs() {
        assert_eq!(pdf.log_prob(-0.5, &params, &s).unwrap(), f64::NEG_INFINITY);
    }
}

#[test]
fn test_samples_follow_cdf() {
    let s = support();
    let mut rng = StdRng::seed_from_u64(2024);
    for (pdf, params) in all_pdfs() {
        let n = 4000;
        let xs = pdf.sample(&params, n, &s, &mut rng).unwrap();
        assert_eq!(xs.len(), n);
        assert!(xs.iter().all(|&x| s.contains(x)));
        // Fraction below the model median should be close to 1/2.
        let mut sorted = xs.clone();
        sorted.sort_by(f64::total_cmp);
        let below = sorted.iter().filter(|&&x| pdf.cdf(x, &params, &s).unwrap() < 0.5).count();
        let frac = below as f64 / n as f64;
        assert!((frac - 0.5).abs() < 0.04, "{pdf:?}: frac={frac}");
    }
}

#[test]
fn test_chebyshev_rejects_negative_shape() {
    let pdf = ChebyshevPdf::new(1).unwrap();
    let mut out = [0.0];
    assert!(pdf.log_prob_batch(&[1.0], &[1.5], &support(), &mut out).is_err());
}

#[test]
fn test_model_rejects_bad_parameters() {
    let pdf: Arc<dyn UnbinnedPdf> = Arc::new(GaussianPdf::new());
    let s = support();
    let ok = vec![Parameter::floating("mu", 5.0, (0.0, 10.0)), Parameter::fixed("sigma", 1.0)];
    assert!(UnbinnedModel::new(ok.clone(), pdf.clone(), vec![0, 1], s).is_ok());
    assert!(UnbinnedModel::new(ok.clone(), pdf.clone(), vec![0], s).is_err());
    assert!(UnbinnedModel::new(ok, pdf.clone(), vec![0, 2], s).is_err());

    let outside = vec![Parameter::floating("mu", 11.0, (0.0, 10.0)), Parameter::fixed("sigma", 1.0)];
    assert!(UnbinnedModel::new(outside, pdf.clone(), vec![0, 1], s).is_err());

    let dup = vec![Parameter::floating("mu", 5.0, (0.0, 10.0)), Parameter::fixed("mu", 1.0)];
    assert!(UnbinnedModel::new(dup, pdf, vec![0, 1], s).is_err());
}

#[test]
fn test_model_nll_matches_sum_of_log_prob() {
    let model = tutorial_model().unwrap();
    let params = model.parameter_init();
    let sample = model.generate(&params, 10_000, 11).unwrap();
    let nll = model.nll(sample.values(), &params).unwrap();
    let direct: f64 =
        sample.values().iter().map(|&x| -model.density(x, &params).unwrap().ln()).sum();
    assert_relative_eq!(nll, direct, max_relative = 1e-10);
}

#[test]
fn test_generate_is_reproducible() {
    let model = tutorial_model().unwrap();
    let params = model.parameter_init();
    let a = model.generate(&params, 500, 99).unwrap();
    let b = model.generate(&params, 500, 99).unwrap();
    let c = model.generate(&params, 500, 100).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.values().windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_tutorial_model_layout() {
    let model = tutorial_model().unwrap();
    assert_eq!(model.dim(), 7);
    assert_eq!(model.free_indices(), vec![0, 1, 2, 3]);
    assert_eq!(model.support().lo(), TUTORIAL_RANGE.0);
    assert_eq!(model.support().hi(), TUTORIAL_RANGE.1);

    // Symmetric signal: half of the signal mass below the shared mean.
    let params = model.parameter_init();
    let bkg_below = ChebyshevPdf::new(2).unwrap().cdf(5.0, &[0.5, 0.2], &support()).unwrap();
    let expected = 0.5 * bkg_below + 0.5 * 0.5;
    assert_relative_eq!(model.cdf(5.0, &params).unwrap(), expected, epsilon = 1e-12);
}

#[test]
fn test_snapshot_restore_roundtrip() {
    let mut model = tutorial_model().unwrap();
    let snap = model.snapshot();
    model.set_values(&[0.1, 0.1, 0.2, 0.3, 5.0, 0.5, 1.0]).unwrap();
    assert_ne!(model.parameter_init(), snap.values());
    model.restore(&snap).unwrap();
    assert_eq!(model.parameter_init(), snap.values());
}
