use crate::model::{FitParameter, ModelFunction};

use serde::{Deserialize, Serialize};

/// Isothermal beta model, `s0 * (1 + (r / rc)^2)^(0.5 - 3 beta)`.
///
/// Parameters in order: `beta` (slope), `rc` (core radius, arcmin), `s0`
/// (central surface brightness).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beta;

impl Beta {
    const BETA: usize = 0;
    const RC: usize = 1;
    const S0: usize = 2;
}

impl ModelFunction for Beta {
    fn brightness(&self, r: f64, params: &[f64]) -> f64 {
        let (beta, rc, s0) = (params[Self::BETA], params[Self::RC], params[Self::S0]);
        let u = (r / rc).powi(2);
        s0 * (1.0 + u).powf(0.5 - 3.0 * beta)
    }

    fn derivative(&self, r: f64, params: &[f64], index: usize) -> f64 {
        let (beta, rc, s0) = (params[Self::BETA], params[Self::RC], params[Self::S0]);
        let u = (r / rc).powi(2);
        let exponent = 0.5 - 3.0 * beta;
        match index {
            Self::BETA => -3.0 * s0 * (1.0 + u).powf(exponent) * (1.0 + u).ln(),
            Self::RC => s0 * exponent * (1.0 + u).powf(exponent - 1.0) * (-2.0 * u / rc),
            Self::S0 => (1.0 + u).powf(exponent),
            _ => unreachable!("beta model has three parameters"),
        }
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["beta", "rc", "s0"]
    }

    fn default_parameters(&self) -> Vec<FitParameter> {
        vec![
            FitParameter::new("beta", 0.7),
            FitParameter::new("rc", 1.0).with_bounds(0.0, f64::INFINITY),
            FitParameter::new("s0", 1e-2).with_bounds(0.0, f64::INFINITY),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const PARAMS: [f64; 3] = [0.65, 2.3, 4.2e-2];

    #[test]
    fn central_brightness_is_s0() {
        assert_relative_eq!(Beta.brightness(0.0, &PARAMS), PARAMS[2]);
    }

    #[test]
    fn profile_declines_for_positive_beta() {
        let mut previous = Beta.brightness(0.0, &PARAMS);
        for i in 1..20 {
            let value = Beta.brightness(0.5 * i as f64, &PARAMS);
            assert!(value < previous);
            previous = value;
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let step = 1e-6;
        for r in [0.0, 0.3, 2.3, 11.0] {
            for index in 0..3 {
                let mut up = PARAMS;
                let mut down = PARAMS;
                up[index] += step;
                down[index] -= step;
                let numeric =
                    (Beta.brightness(r, &up) - Beta.brightness(r, &down)) / (2.0 * step);
                assert_relative_eq!(
                    Beta.derivative(r, &PARAMS, index),
                    numeric,
                    epsilon = 1e-7,
                    max_relative = 1e-5
                );
            }
        }
    }
}
