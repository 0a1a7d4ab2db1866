//! Optimization algorithms
//!
//! Bounded minimization on top of argmin's L-BFGS with a More-Thuente line search.
//! The solver works in unconstrained internal coordinates; every bounded parameter is
//! mapped into its box (sine transform for two-sided bounds, square-root transform for
//! one-sided ones), so no trial point can leave the box. Convergence is confirmed with
//! the projected gradient at the best point.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use gs_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configuration for the bounded L-BFGS optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for gradient norm
    pub tol: f64,
    /// Number of corrections to approximate inverse Hessian
    pub m: usize,
    /// Largest projected-gradient component, in units of `sqrt(max(|f|, 1))`, at which
    /// the best point is reported as converged.
    pub accept_tol: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10, accept_tol: 1e-3 }
    }
}

/// Result of optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective (cost) evaluations, including finite-difference steps.
    pub n_fev: usize,
    /// Number of gradient evaluations.
    pub n_gev: usize,
    /// Largest projected-gradient component at the best point.
    pub pgrad: f64,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, pgrad={:.3e}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.pgrad, self.converged
        )
    }
}

/// Objective function trait for optimization
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate function at given parameters
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Analytic gradient, if the objective has one.
    ///
    /// `None` (the default) makes the optimizer use bound-aware finite differences.
    fn gradient(&self, _params: &[f64]) -> Option<Result<Vec<f64>>> {
        None
    }
}

/// Smallest distance, as a fraction of the half-width, kept from a bound when a start
/// value is mapped to internal coordinates. Exactly at a bound the transform is flat.
const EDGE: f64 = 1e-8;

/// Map between an unconstrained internal coordinate and a bounded parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundTransform {
    Fixed(f64),
    Free,
    Lower(f64),
    Upper(f64),
    Double(f64, f64),
}

impl BoundTransform {
    fn new((lo, hi): (f64, f64)) -> Self {
        if hi <= lo {
            return Self::Fixed(lo);
        }
        match (lo.is_finite(), hi.is_finite()) {
            (true, true) => Self::Double(lo, hi),
            (true, false) => Self::Lower(lo),
            (false, true) => Self::Upper(hi),
            (false, false) => Self::Free,
        }
    }

    fn external(self, u: f64) -> f64 {
        match self {
            Self::Fixed(v) => v,
            Self::Free => u,
            Self::Lower(lo) => lo - 1.0 + (u * u + 1.0).sqrt(),
            Self::Upper(hi) => hi + 1.0 - (u * u + 1.0).sqrt(),
            Self::Double(lo, hi) => (lo + 0.5 * (hi - lo) * (u.sin() + 1.0)).clamp(lo, hi),
        }
    }

    fn internal(self, x: f64) -> f64 {
        match self {
            Self::Fixed(_) => 0.0,
            Self::Free => x,
            Self::Lower(lo) => {
                let t = (x - lo).max(EDGE) + 1.0;
                (t * t - 1.0).sqrt()
            }
            Self::Upper(hi) => {
                let t = (hi - x).max(EDGE) + 1.0;
                (t * t - 1.0).sqrt()
            }
            Self::Double(lo, hi) => {
                let s = 2.0 * (x - lo) / (hi - lo) - 1.0;
                s.clamp(-1.0 + EDGE, 1.0 - EDGE).asin()
            }
        }
    }

    /// `dx/du`
    fn derivative(self, u: f64) -> f64 {
        match self {
            Self::Fixed(_) => 0.0,
            Self::Free => 1.0,
            Self::Lower(_) => u / (u * u + 1.0).sqrt(),
            Self::Upper(_) => -u / (u * u + 1.0).sqrt(),
            Self::Double(lo, hi) => 0.5 * (hi - lo) * u.cos(),
        }
    }
}

fn to_external(transforms: &[BoundTransform], u: &[f64]) -> Vec<f64> {
    transforms.iter().zip(u).map(|(t, &ui)| t.external(ui)).collect()
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

/// Finite-difference gradient that never evaluates outside `bounds`.
///
/// Central differences in the interior; one-sided at an active bound; zero for a
/// parameter whose bounds coincide.
fn numerical_gradient(
    objective: &dyn ObjectiveFunction,
    params: &[f64],
    bounds: &[(f64, f64)],
) -> Result<(Vec<f64>, usize)> {
    let mut grad = vec![0.0; params.len()];
    let mut n_eval = 0usize;
    let mut f0: Option<f64> = None;
    let mut shifted = params.to_vec();

    for (i, &(lo, hi)) in bounds.iter().enumerate() {
        if hi <= lo {
            continue;
        }
        // eps = sqrt(machine_epsilon) * max(|x_i|, 1), limited by the box width.
        let eps = (1e-8 * params[i].abs().max(1.0)).min(0.5 * (hi - lo));
        let up = params[i] + eps <= hi;
        let down = params[i] - eps >= lo;

        let (f_plus, h_plus) = if up {
            shifted[i] = params[i] + eps;
            n_eval += 1;
            (objective.eval(&shifted)?, eps)
        } else {
            (center_value(objective, params, &mut f0, &mut n_eval)?, 0.0)
        };
        let (f_minus, h_minus) = if down {
            shifted[i] = params[i] - eps;
            n_eval += 1;
            (objective.eval(&shifted)?, eps)
        } else {
            (center_value(objective, params, &mut f0, &mut n_eval)?, 0.0)
        };
        shifted[i] = params[i];
        grad[i] = (f_plus - f_minus) / (h_plus + h_minus);
    }

    Ok((grad, n_eval))
}

fn center_value(
    objective: &dyn ObjectiveFunction,
    params: &[f64],
    cache: &mut Option<f64>,
    n_eval: &mut usize,
) -> Result<f64> {
    if let Some(v) = *cache {
        return Ok(v);
    }
    *n_eval += 1;
    let v = objective.eval(params)?;
    *cache = Some(v);
    Ok(v)
}

/// Gradient in external coordinates, analytic when available.
fn external_gradient(
    objective: &dyn ObjectiveFunction,
    params: &[f64],
    bounds: &[(f64, f64)],
    counts: &FuncCounts,
) -> Result<Vec<f64>> {
    counts.grad.fetch_add(1, Ordering::Relaxed);
    match objective.gradient(params) {
        Some(g) => g,
        None => numerical_gradient(objective, params, bounds).map(|(g, n)| {
            counts.cost.fetch_add(n, Ordering::Relaxed);
            g
        }),
    }
}

/// Largest component of `P(x - g) - x`, with `P` the projection onto the box.
///
/// Zero at a box-constrained stationary point, `|g_i|` for interior parameters.
fn projected_gradient_inf(params: &[f64], grad: &[f64], bounds: &[(f64, f64)]) -> f64 {
    params
        .iter()
        .zip(grad)
        .zip(bounds)
        .filter(|(_, (lo, hi))| hi > lo)
        .map(|((&x, &g), &(lo, hi))| ((x - g).clamp(lo, hi) - x).abs())
        .fold(0.0, f64::max)
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Wrapper to make ObjectiveFunction compatible with argmin, in internal coordinates.
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    transforms: &'a [BoundTransform],
    counts: Arc<FuncCounts>,
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let x = to_external(self.transforms, params);
        self.objective.eval(&x).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        let x = to_external(self.transforms, params);
        let g = external_gradient(self.objective, &x, self.bounds, &self.counts)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        Ok(g.iter()
            .zip(self.transforms.iter().zip(params))
            .map(|(&gi, (t, &ui))| gi * t.derivative(ui))
            .collect())
    }
}

/// L-BFGS optimizer with box constraints
#[derive(Debug, Clone, Default)]
pub struct LbfgsbOptimizer {
    config: OptimizerConfig,
}

impl LbfgsbOptimizer {
    /// Create new optimizer with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize `objective` inside `bounds`, starting from `init_params`.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }
        if init_params.is_empty() {
            let fval = objective.eval(init_params)?;
            return Ok(OptimizationResult {
                parameters: Vec::new(),
                fval,
                n_iter: 0,
                n_fev: 1,
                n_gev: 0,
                pgrad: 0.0,
                converged: true,
                message: "no free parameters".into(),
            });
        }

        let transforms: Vec<BoundTransform> =
            bounds.iter().map(|&b| BoundTransform::new(b)).collect();
        let init_internal: Vec<f64> = transforms
            .iter()
            .zip(clamp_params(init_params, bounds))
            .map(|(t, x)| t.internal(x))
            .collect();
        let counts = Arc::new(FuncCounts::default());
        let problem =
            ArgminProblem { objective, bounds, transforms: &transforms, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // Argmin's default cost tolerance (~EPS) is too strict for NLL scales.
        let tol_cost =
            if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Validation(format!("Invalid optimizer configuration (tol): {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| {
                Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}"))
            })?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_internal).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("Optimization failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("No best parameters found".to_string()))?;
        let parameters = to_external(&transforms, best);
        let fval = state.get_best_cost();
        let termination = state.get_termination_status();
        let solver_converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        let grad = external_gradient(objective, &parameters, bounds, &counts)?;
        let pgrad = projected_gradient_inf(&parameters, &grad, bounds);
        let pgrad_tol = self.config.accept_tol * fval.abs().max(1.0).sqrt();
        let converged = solver_converged && pgrad <= pgrad_tol;
        let message = if solver_converged && !converged {
            format!("{termination}; projected gradient {pgrad:.3e} above {pgrad_tol:.3e}")
        } else {
            termination.to_string()
        };

        Ok(OptimizationResult {
            parameters,
            fval,
            n_iter: state.get_iter(),
            n_fev: counts.cost.load(Ordering::Relaxed),
            n_gev: counts.grad.load(Ordering::Relaxed),
            pgrad,
            converged,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // f(x, y) = (x - 2)^2 + (y - 3)^2, minimum at (2, 3)
    struct Quadratic;

    impl ObjectiveFunction for Quadratic {
        fn eval(&self, params: &[f64]) -> Result<f64> {
            Ok((params[0] - 2.0).powi(2) + (params[1] - 3.0).powi(2))
        }

        fn gradient(&self, params: &[f64]) -> Option<Result<Vec<f64>>> {
            Some(Ok(vec![2.0 * (params[0] - 2.0), 2.0 * (params[1] - 3.0)]))
        }
    }

    // Same function without an analytic gradient.
    struct QuadraticNumerical;

    impl ObjectiveFunction for QuadraticNumerical {
        fn eval(&self, params: &[f64]) -> Result<f64> {
            Quadratic.eval(params)
        }
    }

    #[test]
    fn test_optimizer_quadratic() {
        let optimizer = LbfgsbOptimizer::new(OptimizerConfig {
            max_iter: 100,
            tol: 1e-6,
            m: 10,
            ..Default::default()
        });
        let result =
            optimizer.minimize(&Quadratic, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)]).unwrap();

        assert!(result.converged, "Optimizer should converge: {result}");
        assert_relative_eq!(result.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.parameters[1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(result.fval, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_optimizer_numerical_gradient() {
        let optimizer = LbfgsbOptimizer::default();
        let result = optimizer
            .minimize(&QuadraticNumerical, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)])
            .unwrap();

        assert!(result.converged, "Optimizer should converge: {result}");
        assert_relative_eq!(result.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.parameters[1], 3.0, epsilon = 1e-4);
        assert!(result.n_fev > result.n_gev);
    }

    #[test]
    fn test_optimizer_converges_at_bound() {
        // Constrained optimum of the quadratic inside x in [3, 5], y in [0, 2] is (3, 2).
        let optimizer = LbfgsbOptimizer::default();
        let result =
            optimizer.minimize(&QuadraticNumerical, &[4.0, 1.0], &[(3.0, 5.0), (0.0, 2.0)]).unwrap();

        assert_relative_eq!(result.parameters[0], 3.0, epsilon = 1e-6);
        assert_relative_eq!(result.parameters[1], 2.0, epsilon = 1e-6);
        assert_relative_eq!(result.fval, 2.0, epsilon = 1e-6);
        assert!(result.converged, "should converge at the boundary: {}", result.message);
    }

    #[test]
    fn test_numerical_gradient_stays_inside_bounds() {
        struct Guarded;
        impl ObjectiveFunction for Guarded {
            fn eval(&self, params: &[f64]) -> Result<f64> {
                if params[0] < 0.0 || params[0] > 1.0 {
                    return Err(Error::Validation(format!("out of box: {}", params[0])));
                }
                Ok((params[0] - 0.3).powi(2))
            }
        }

        let bounds = [(0.0, 1.0)];
        let (g, _) = numerical_gradient(&Guarded, &[0.0], &bounds).unwrap();
        assert_relative_eq!(g[0], -0.6, epsilon = 1e-6);
        let (g, _) = numerical_gradient(&Guarded, &[1.0], &bounds).unwrap();
        assert_relative_eq!(g[0], 1.4, epsilon = 1e-6);
    }

    #[test]
    fn test_trial_points_never_leave_the_box() {
        // Minimum far outside the box on both axes; the objective rejects points outside it.
        struct Walled;
        impl ObjectiveFunction for Walled {
            fn eval(&self, params: &[f64]) -> Result<f64> {
                let (mu, sigma) = (params[0], params[1]);
                if !(-5.0..=5.0).contains(&mu) || !(0.1..=10.0).contains(&sigma) {
                    return Err(Error::Validation(format!("evaluated outside: {params:?}")));
                }
                Ok((mu - 8.0).powi(2) + (sigma - 20.0).powi(2))
            }
        }

        let result = LbfgsbOptimizer::default()
            .minimize(&Walled, &[0.0, 1.0], &[(-5.0, 5.0), (0.1, 10.0)])
            .unwrap();
        assert_relative_eq!(result.parameters[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(result.parameters[1], 10.0, epsilon = 1e-6);
        assert!(result.converged, "{}", result.message);
    }

    #[test]
    fn test_interior_minimum_is_not_pinned_to_bounds() {
        // Gaussian-like NLL with a wide box and a start far from the optimum.
        struct Nll;
        impl ObjectiveFunction for Nll {
            fn eval(&self, params: &[f64]) -> Result<f64> {
                let (mu, sigma) = (params[0], params[1]);
                let n = 5000.0;
                Ok(n * sigma.ln() + n * (4.0 + (mu - 1.5).powi(2)) / (2.0 * sigma * sigma))
            }
        }

        let result = LbfgsbOptimizer::default()
            .minimize(&Nll, &[0.0, 1.0], &[(-5.0, 5.0), (0.1, 10.0)])
            .unwrap();
        assert!(result.converged, "{}", result.message);
        assert_relative_eq!(result.parameters[0], 1.5, epsilon = 1e-3);
        assert_relative_eq!(result.parameters[1], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_iteration_limit_is_not_convergence() {
        let optimizer = LbfgsbOptimizer::new(OptimizerConfig { max_iter: 1, ..Default::default() });
        let result = optimizer
            .minimize(&QuadraticNumerical, &[-9.0, 9.0], &[(-10.0, 10.0), (-10.0, 10.0)])
            .unwrap();
        assert!(!result.converged);
    }

    #[test]
    fn test_bound_transforms_map_into_the_box() {
        let cases = [(-5.0, 5.0), (0.1, f64::INFINITY), (f64::NEG_INFINITY, 2.0)];
        for bounds in cases {
            let t = BoundTransform::new(bounds);
            for u in [-40.0, -1.3, 0.0, 0.7, 25.0] {
                let x = t.external(u);
                assert!(x >= bounds.0 && x <= bounds.1, "{bounds:?}: u={u} -> x={x}");
            }
            let x0 = 1.0;
            assert_relative_eq!(t.external(t.internal(x0)), x0, epsilon = 1e-12);
        }
        assert_eq!(BoundTransform::new((3.0, 3.0)).external(7.0), 3.0);
    }

    #[test]
    fn test_projected_gradient_at_bounds() {
        let bounds = [(0.0, 1.0), (0.0, 1.0)];
        // Pushing outward at an active bound is stationary.
        assert_eq!(projected_gradient_inf(&[0.0, 1.0], &[2.0, -3.0], &bounds), 0.0);
        // Pulling inward from a bound is not.
        assert_relative_eq!(projected_gradient_inf(&[0.0, 0.5], &[-0.25, 0.0], &bounds), 0.25);
        // Interior: plain gradient magnitude.
        assert_relative_eq!(projected_gradient_inf(&[0.5, 0.5], &[0.1, -0.2], &bounds), 0.2);
    }

    #[test]
    fn test_no_free_parameters() {
        struct Constant;
        impl ObjectiveFunction for Constant {
            fn eval(&self, _params: &[f64]) -> Result<f64> {
                Ok(4.0)
            }
        }
        let result = LbfgsbOptimizer::default().minimize(&Constant, &[], &[]).unwrap();
        assert!(result.converged);
        assert_eq!(result.fval, 4.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(LbfgsbOptimizer::default().minimize(&Quadratic, &[0.0], &[]).is_err());
    }
}
