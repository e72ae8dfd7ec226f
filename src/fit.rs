//! Bounded minimization of a fit statistic over a model's free parameters.

use crate::error::FitError;
use crate::model::Model;
use crate::profile::Profile;
use crate::stat::{FitData, FitObjective, Statistic};

use cobyla::{RhoBeg, StopTols, minimize};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Infinite parameter bounds are clamped here for the bounded algorithms.
const DEFAULT_BOUND: f64 = 1e12;

/// Raw outcome of one minimization run.
#[derive(Clone, Debug)]
pub struct MinimizeResult {
    pub x: Vec<f64>,
    pub value: f64,
    pub converged: bool,
    pub message: String,
}

/// Whether a constraint holds with equality or as a one-sided bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// `g(values) == 0` at a feasible point.
    Equality,
    /// `g(values) >= 0` at a feasible point.
    Inequality,
}

/// A general constraint over the full parameter vector, frozen entries
/// included.
pub struct Constraint<'a> {
    kind: ConstraintKind,
    function: Box<dyn Fn(&[f64]) -> f64 + 'a>,
}

impl<'a> Constraint<'a> {
    pub fn equality(function: impl Fn(&[f64]) -> f64 + 'a) -> Self {
        Self {
            kind: ConstraintKind::Equality,
            function: Box::new(function),
        }
    }

    pub fn inequality(function: impl Fn(&[f64]) -> f64 + 'a) -> Self {
        Self {
            kind: ConstraintKind::Inequality,
            function: Box::new(function),
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        (self.function)(values)
    }
}

/// A bounded minimizer of a value+gradient objective.
///
/// `objective` returns the statistic and its gradient over the free
/// parameter vector; derivative-free algorithms ignore the gradient.
/// `constraints` act on the same vector as the objective; algorithms
/// reporting `supports_constraints() == false` must only be given an
/// empty slice.
#[enum_dispatch]
pub trait CurveFitTrait {
    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> (f64, Vec<f64>),
        x0: &[f64],
        bounds: &[(f64, f64)],
        constraints: &[Constraint<'_>],
    ) -> MinimizeResult;

    /// Whether the algorithm honors general (in)equality constraints in
    /// addition to box bounds.
    fn supports_constraints(&self) -> bool;
}

#[enum_dispatch(CurveFitTrait)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CurveFitAlgorithm {
    Cobyla(CobylaFit),
    Gradient(GradientFit),
}

impl Default for CurveFitAlgorithm {
    fn default() -> Self {
        Self::Cobyla(CobylaFit::default())
    }
}

/// COBYLA (Constrained Optimization BY Linear Approximations), a
/// derivative-free bounded minimizer. Robust to rough objectives; the
/// gradient half of the objective goes unused.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Cobyla")]
pub struct CobylaFit {
    /// Maximum number of objective evaluations.
    pub niterations: u32,
    /// Initial simplex size in parameter units.
    pub rhobeg: f64,
    /// Relative objective tolerance for convergence.
    pub ftol_rel: f64,
}

impl CobylaFit {
    pub fn new(niterations: u32, rhobeg: f64, ftol_rel: f64) -> Self {
        assert!(niterations > 0, "niterations must be positive");
        assert!(rhobeg > 0.0 && rhobeg.is_finite(), "rhobeg must be positive and finite");
        assert!(
            ftol_rel >= 0.0 && ftol_rel.is_finite(),
            "ftol_rel must be non-negative and finite"
        );
        Self {
            niterations,
            rhobeg,
            ftol_rel,
        }
    }
}

impl Default for CobylaFit {
    fn default() -> Self {
        Self::new(1000, 0.5, 1e-6)
    }
}

impl CurveFitTrait for CobylaFit {
    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> (f64, Vec<f64>),
        x0: &[f64],
        bounds: &[(f64, f64)],
        constraints: &[Constraint<'_>],
    ) -> MinimizeResult {
        // COBYLA wants a Fn objective; the gradient is dropped.
        let objective = RefCell::new(objective);
        let value_only = |x: &[f64], _: &mut ()| -> f64 { (*objective.borrow_mut())(x).0 };

        // COBYLA takes g >= 0 constraints only; an equality becomes the
        // pair g >= 0 and -g >= 0.
        let signed: Vec<(f64, &Constraint<'_>)> = constraints
            .iter()
            .flat_map(|c| match c.kind() {
                ConstraintKind::Inequality => vec![(1.0, c)],
                ConstraintKind::Equality => vec![(1.0, c), (-1.0, c)],
            })
            .collect();
        let cobyla_constraints: Vec<_> = signed
            .iter()
            .map(|&(sign, constraint)| {
                move |x: &[f64], _: &mut ()| sign * constraint.evaluate(x)
            })
            .collect();

        let stop_tol = StopTols {
            ftol_rel: self.ftol_rel,
            ..StopTols::default()
        };
        let result = minimize(
            value_only,
            x0,
            bounds,
            &cobyla_constraints,
            (),
            self.niterations as usize,
            RhoBeg::All(self.rhobeg),
            Some(stop_tol),
        );
        match result {
            Ok((status, x, value)) => MinimizeResult {
                converged: matches!(
                    status,
                    cobyla::SuccessStatus::Success
                        | cobyla::SuccessStatus::FtolReached
                        | cobyla::SuccessStatus::XtolReached
                ),
                message: format!("{status:?}"),
                x,
                value,
            },
            Err((status, x, value)) => MinimizeResult {
                converged: false,
                message: format!("{status:?}"),
                x,
                value,
            },
        }
    }

    fn supports_constraints(&self) -> bool {
        true
    }
}

/// Projected-gradient minimizer with Barzilai–Borwein steps and an Armijo
/// backtracking line search.
///
/// Uses the analytic gradient, so it needs far fewer objective evaluations
/// than COBYLA on smooth statistics; box bounds are handled by projection.
/// General (in)equality constraints are not supported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Gradient")]
pub struct GradientFit {
    /// Maximum number of accepted steps.
    pub niterations: u32,
    /// Relative objective decrease below which the run stops.
    pub ftol_rel: f64,
    /// Projected-gradient infinity norm declaring stationarity.
    pub gtol: f64,
}

impl GradientFit {
    pub fn new(niterations: u32, ftol_rel: f64, gtol: f64) -> Self {
        assert!(niterations > 0, "niterations must be positive");
        assert!(
            ftol_rel >= 0.0 && ftol_rel.is_finite(),
            "ftol_rel must be non-negative and finite"
        );
        assert!(gtol >= 0.0 && gtol.is_finite(), "gtol must be non-negative and finite");
        Self {
            niterations,
            ftol_rel,
            gtol,
        }
    }
}

impl Default for GradientFit {
    fn default() -> Self {
        Self::new(500, 1e-10, 1e-8)
    }
}

fn project(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&xi, &(lo, hi))| xi.clamp(lo, hi))
        .collect()
}

impl CurveFitTrait for GradientFit {
    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> (f64, Vec<f64>),
        x0: &[f64],
        bounds: &[(f64, f64)],
        _constraints: &[Constraint<'_>],
    ) -> MinimizeResult {
        const ARMIJO: f64 = 1e-4;
        const MIN_STEP: f64 = 1e-16;

        let mut x = project(x0, bounds);
        let (mut value, mut gradient) = objective(&x);
        let mut step = 1.0;

        for _ in 0..self.niterations {
            let stationarity = x
                .iter()
                .zip(&gradient)
                .zip(bounds)
                .map(|((&xi, &gi), &(lo, hi))| (xi - (xi - gi).clamp(lo, hi)).abs())
                .fold(0.0, f64::max);
            if stationarity <= self.gtol {
                return MinimizeResult {
                    x,
                    value,
                    converged: true,
                    message: "projected gradient below tolerance".into(),
                };
            }

            // Backtracking along the projected-gradient arc.
            let mut trial_step = step;
            let (candidate, candidate_value, candidate_gradient) = loop {
                let candidate: Vec<f64> = x
                    .iter()
                    .zip(&gradient)
                    .zip(bounds)
                    .map(|((&xi, &gi), &(lo, hi))| (xi - trial_step * gi).clamp(lo, hi))
                    .collect();
                let decrease: f64 = gradient
                    .iter()
                    .zip(&candidate)
                    .zip(&x)
                    .map(|((&gi, &ci), &xi)| gi * (xi - ci))
                    .sum();
                let (candidate_value, candidate_gradient) = objective(&candidate);
                if candidate_value <= value - ARMIJO * decrease {
                    break (candidate, candidate_value, candidate_gradient);
                }
                trial_step /= 2.0;
                if trial_step < MIN_STEP {
                    // No step reduces the objective at floating-point
                    // resolution, yet the projected gradient is still above
                    // tolerance: a stall, not convergence.
                    return MinimizeResult {
                        x,
                        value,
                        converged: false,
                        message: "line search stalled above gradient tolerance".into(),
                    };
                }
            };

            let decrease = value - candidate_value;
            // Barzilai-Borwein step for the next iteration.
            let (mut ss, mut sy) = (0.0, 0.0);
            for ((&ci, &xi), (&gci, &gi)) in candidate
                .iter()
                .zip(&x)
                .zip(candidate_gradient.iter().zip(&gradient))
            {
                let s = ci - xi;
                ss += s * s;
                sy += s * (gci - gi);
            }
            step = if sy > 0.0 {
                (ss / sy).clamp(1e-12, 1e12)
            } else {
                1.0
            };

            x = candidate;
            gradient = candidate_gradient;
            let previous = value;
            value = candidate_value;
            if decrease <= self.ftol_rel * (previous.abs() + f64::MIN_POSITIVE) {
                return MinimizeResult {
                    x,
                    value,
                    converged: true,
                    message: "objective decrease below tolerance".into(),
                };
            }
        }

        MinimizeResult {
            x,
            value,
            converged: false,
            message: "iteration limit reached".into(),
        }
    }

    fn supports_constraints(&self) -> bool {
        false
    }
}

/// Result of a successful fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit values of all parameters, frozen ones included, in model
    /// order.
    pub values: Vec<f64>,
    /// Statistic at the best fit.
    pub statistic: f64,
    /// Statistic per degree of freedom (bins minus free parameters); NaN
    /// when there are no degrees of freedom left.
    pub reduced_statistic: f64,
}

/// Fit configuration: algorithm, statistic, and radial fit range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fitter {
    pub algorithm: CurveFitAlgorithm,
    pub statistic: Statistic,
    /// Lower radial bound of the fit range, arcmin; unbounded if `None`.
    pub min_range: Option<f64>,
    /// Upper radial bound of the fit range, arcmin; unbounded if `None`.
    pub max_range: Option<f64>,
}

impl Fitter {
    /// Fit `model` to `profile`, updating the free parameter values in
    /// place on success.
    ///
    /// Frozen parameters keep their values and stay out of the
    /// optimization vector. On non-convergence the model is left untouched
    /// and the solver diagnostic is reported through
    /// [`FitError::NotConverged`].
    pub fn fit(&self, profile: &Profile, model: &mut Model) -> Result<FitResult, FitError> {
        self.fit_constrained(profile, model, &[])
    }

    /// Like [`Fitter::fit`], additionally imposing general (in)equality
    /// constraints over the full parameter vector.
    ///
    /// Fails with [`FitError::ConstraintsUnsupported`] when the selected
    /// algorithm only handles box bounds.
    pub fn fit_constrained(
        &self,
        profile: &Profile,
        model: &mut Model,
        constraints: &[Constraint<'_>],
    ) -> Result<FitResult, FitError> {
        if !constraints.is_empty() && !self.algorithm.supports_constraints() {
            return Err(FitError::ConstraintsUnsupported);
        }
        let min_range = self.min_range.unwrap_or(0.0);
        let max_range = self.max_range.unwrap_or(f64::INFINITY);
        let data = FitData::from_profile(profile, min_range, max_range)?;

        let template = model.values();
        let kind = model.kind();
        let free: Vec<usize> = model
            .parameters()
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.frozen)
            .map(|(i, _)| i)
            .collect();
        if free.is_empty() {
            return Err(FitError::NoFreeParameters);
        }
        let x0: Vec<f64> = free.iter().map(|&i| template[i]).collect();
        let bounds: Vec<(f64, f64)> = free
            .iter()
            .map(|&i| {
                let p = &model.parameters()[i];
                (p.min.max(-DEFAULT_BOUND), p.max.min(DEFAULT_BOUND))
            })
            .collect();

        let statistic = self.statistic;
        let mut objective = |x: &[f64]| {
            let mut values = template.clone();
            for (&i, &xi) in free.iter().zip(x) {
                values[i] = xi;
            }
            let (value, gradient) = statistic.value_and_gradient(&data, kind, &values);
            let free_gradient: Vec<f64> = free.iter().map(|&i| gradient[i]).collect();
            (value, free_gradient)
        };

        // Constraints act on the full parameter vector; remap them onto
        // the free one the optimizer sees.
        let free_constraints: Vec<Constraint<'_>> = constraints
            .iter()
            .map(|constraint| {
                let template = template.clone();
                let free = free.clone();
                let remapped = move |x: &[f64]| {
                    let mut values = template.clone();
                    for (&i, &xi) in free.iter().zip(x) {
                        values[i] = xi;
                    }
                    constraint.evaluate(&values)
                };
                match constraint.kind() {
                    ConstraintKind::Equality => Constraint::equality(remapped),
                    ConstraintKind::Inequality => Constraint::inequality(remapped),
                }
            })
            .collect();

        let result = self
            .algorithm
            .minimize(&mut objective, &x0, &bounds, &free_constraints);
        if !result.converged {
            return Err(FitError::NotConverged {
                message: result.message,
            });
        }
        for (&i, &xi) in free.iter().zip(&result.x) {
            model.parameters_mut()[i].value = xi;
        }
        let dof = data.len().saturating_sub(free.len());
        let reduced_statistic = if dof > 0 {
            result.value / dof as f64
        } else {
            f64::NAN
        };
        log::info!(
            "fit converged: statistic {:.4} over {} bins, {} free parameters",
            result.value,
            data.len(),
            free.len(),
        );
        Ok(FitResult {
            values: model.values(),
            statistic: result.value,
            reduced_statistic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{ModelFunction, model_by_name};
    use crate::profile::ProfileEntry;
    use crate::stat::{Cash, Chi2};

    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    fn entry(radius: f64, width: f64, net_rate: f64, err: f64, t_raw: f64) -> ProfileEntry {
        ProfileEntry {
            radius,
            width,
            n_pixels: 100,
            raw_cts: net_rate * t_raw,
            bkg_cts: 0.0,
            net_cts: net_rate * t_raw,
            raw_rate: net_rate,
            bkg_rate: 0.0,
            net_rate,
            err_raw_rate: err,
            err_bkg_rate: 0.0,
            err_net_rate: err,
            t_raw,
            t_bkg: t_raw,
            degenerate: false,
        }
    }

    fn beta_profile(truth: &[f64; 3], noise: f64, seed: u64) -> Profile {
        let mut rng = StdRng::seed_from_u64(seed);
        let beta = model_by_name("beta").unwrap();
        let entries = (1..=30)
            .map(|i| {
                let r = 0.1 * i as f64;
                let rate = beta.kind().brightness(r, truth);
                let err = noise * rate;
                let eps: f64 = rng.sample(StandardNormal);
                entry(r, 0.05, rate + err * eps, err, 1.0e5)
            })
            .collect();
        Profile::from_entries(entries)
    }

    #[test]
    fn cobyla_recovers_beta_parameters() {
        let truth = [0.6, 1.2, 3.0e-2];
        let profile = beta_profile(&truth, 0.02, 0);
        let mut model = model_by_name("beta").unwrap();
        let fitter = Fitter {
            algorithm: CobylaFit::new(4000, 0.3, 1e-10).into(),
            ..Default::default()
        };
        let result = fitter.fit(&profile, &mut model).unwrap();
        assert_abs_diff_eq!(result.values[0], truth[0], epsilon = 0.1);
        assert_abs_diff_eq!(result.values[1], truth[1], epsilon = 0.2);
        assert_abs_diff_eq!(result.values[2], truth[2], epsilon = 5e-3);
        assert!(result.reduced_statistic < 3.0);
        // Best-fit values are written back into the model.
        assert_eq!(model.values(), result.values);
    }

    #[test]
    fn gradient_descent_recovers_beta_parameters() {
        let truth = [0.6, 1.2, 3.0e-2];
        let profile = beta_profile(&truth, 0.02, 1);
        let mut model = model_by_name("beta").unwrap();
        let fitter = Fitter {
            algorithm: GradientFit::default().into(),
            ..Default::default()
        };
        let result = fitter.fit(&profile, &mut model).unwrap();
        assert_abs_diff_eq!(result.values[0], truth[0], epsilon = 0.1);
        assert_abs_diff_eq!(result.values[1], truth[1], epsilon = 0.2);
        assert_abs_diff_eq!(result.values[2], truth[2], epsilon = 5e-3);
    }

    #[test]
    fn cash_fit_recovers_a_constant_rate() {
        // Source-only counts scattered around an exact mean rate: the Cash
        // optimum for a constant model sits at the count-weighted mean,
        // total raw_cts / total t_raw.
        let rate = 4.0e-3;
        let entries = (1..=8)
            .map(|i| {
                let wiggle = if i % 2 == 0 { 1.01 } else { 0.99 };
                entry(0.5 * i as f64, 0.0, rate * wiggle, 1e-4, 2.0e5)
            })
            .collect();
        let profile = Profile::from_entries(entries);
        let mut model = model_by_name("const").unwrap();
        let fitter = Fitter {
            algorithm: GradientFit::default().into(),
            statistic: Cash.into(),
            ..Default::default()
        };
        let result = fitter.fit(&profile, &mut model).unwrap();
        assert_abs_diff_eq!(result.values[0], rate, epsilon = 1e-6);
    }

    #[test]
    fn frozen_parameters_stay_put() {
        let truth = [0.6, 1.2, 3.0e-2];
        let profile = beta_profile(&truth, 0.02, 2);
        let mut model = model_by_name("beta").unwrap();
        model.parameter_mut("beta").unwrap().freeze();
        let result = Fitter::default().fit(&profile, &mut model).unwrap();
        assert_eq!(result.values[0], 0.7);
        assert_eq!(model.parameters()[0].value, 0.7);
        assert_abs_diff_eq!(result.values[2], truth[2], epsilon = 1e-2);
    }

    #[test]
    fn all_frozen_is_an_error() {
        let profile = beta_profile(&[0.6, 1.2, 3.0e-2], 0.02, 3);
        let mut model = model_by_name("beta").unwrap();
        for p in model.parameters_mut() {
            p.freeze();
        }
        let err = Fitter::default().fit(&profile, &mut model).unwrap_err();
        assert_eq!(err, FitError::NoFreeParameters);
    }

    #[test]
    fn starved_solver_reports_non_convergence() {
        let profile = beta_profile(&[0.6, 1.2, 3.0e-2], 0.02, 4);
        let mut model = model_by_name("beta").unwrap();
        let before = model.values();
        let fitter = Fitter {
            algorithm: CobylaFit::new(2, 0.5, 0.0).into(),
            ..Default::default()
        };
        let err = fitter.fit(&profile, &mut model).unwrap_err();
        assert!(matches!(err, FitError::NotConverged { .. }));
        // The model keeps its starting values.
        assert_eq!(model.values(), before);
    }

    #[test]
    fn range_clipping_can_empty_the_fit() {
        let profile = beta_profile(&[0.6, 1.2, 3.0e-2], 0.02, 5);
        let mut model = model_by_name("beta").unwrap();
        let fitter = Fitter {
            min_range: Some(100.0),
            ..Default::default()
        };
        let err = fitter.fit(&profile, &mut model).unwrap_err();
        assert!(matches!(err, FitError::EmptyFitRange { .. }));
    }

    #[test]
    fn gradient_solver_respects_bounds() {
        // Quadratic with the unconstrained minimum outside the box.
        let mut objective = |x: &[f64]| {
            let d = x[0] - 3.0;
            (d * d, vec![2.0 * d])
        };
        let result =
            GradientFit::default().minimize(&mut objective, &[0.5], &[(0.0, 2.0)], &[]);
        assert!(result.converged);
        assert_abs_diff_eq!(result.x[0], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn stalled_line_search_is_not_convergence() {
        // Flat value with a non-zero reported gradient: no step can ever
        // satisfy the sufficient-decrease test.
        let mut objective = |_x: &[f64]| (1.0, vec![1.0]);
        let result = GradientFit::default().minimize(
            &mut objective,
            &[0.0],
            &[(-10.0, 10.0)],
            &[],
        );
        assert!(!result.converged);
    }

    #[test]
    fn cobyla_honors_inequality_constraints() {
        // Unconstrained chi-square optimum at 4e-3; cap the rate at 3e-3.
        let rate = 4.0e-3;
        let entries = (1..=8)
            .map(|i| entry(0.5 * i as f64, 0.0, rate, 1e-4, 2.0e5))
            .collect();
        let profile = Profile::from_entries(entries);
        let mut model = model_by_name("const").unwrap();
        let fitter = Fitter {
            algorithm: CobylaFit::new(4000, 0.1, 1e-10).into(),
            ..Default::default()
        };
        let cap = Constraint::inequality(|values: &[f64]| 3.0e-3 - values[0]);
        let result = fitter
            .fit_constrained(&profile, &mut model, &[cap])
            .unwrap();
        assert_abs_diff_eq!(result.values[0], 3.0e-3, epsilon = 1e-4);
    }

    #[test]
    fn cobyla_honors_equality_constraints() {
        // Quadratic with the unconstrained minimum at 3, pinned to 1.
        let mut objective = |x: &[f64]| {
            let d = x[0] - 3.0;
            (d * d, vec![2.0 * d])
        };
        let pin = Constraint::equality(|x: &[f64]| x[0] - 1.0);
        let result = CobylaFit::default().minimize(
            &mut objective,
            &[0.0],
            &[(-10.0, 10.0)],
            &[pin],
        );
        assert!(result.converged);
        assert_abs_diff_eq!(result.x[0], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn gradient_algorithm_rejects_constraints() {
        let profile = beta_profile(&[0.6, 1.2, 3.0e-2], 0.02, 6);
        let mut model = model_by_name("beta").unwrap();
        let fitter = Fitter {
            algorithm: GradientFit::default().into(),
            ..Default::default()
        };
        let positive = Constraint::inequality(|values: &[f64]| values[2]);
        let err = fitter
            .fit_constrained(&profile, &mut model, &[positive])
            .unwrap_err();
        assert_eq!(err, FitError::ConstraintsUnsupported);
    }

    #[test]
    fn fitter_serde_round_trip() {
        let fitter = Fitter {
            algorithm: GradientFit::new(100, 1e-8, 1e-6).into(),
            statistic: Chi2.into(),
            min_range: Some(0.1),
            max_range: Some(5.0),
        };
        let json = serde_json::to_string(&fitter).unwrap();
        assert_eq!(serde_json::from_str::<Fitter>(&json).unwrap(), fitter);
    }
}
