use crate::model::{FitParameter, ModelFunction};

use serde::{Deserialize, Serialize};

/// Power-law profile, `norm * r^-alpha`.
///
/// Only defined for `r > 0`; profile bin radii are always positive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLaw;

impl PowerLaw {
    const ALPHA: usize = 0;
    const NORM: usize = 1;
}

impl ModelFunction for PowerLaw {
    fn brightness(&self, r: f64, params: &[f64]) -> f64 {
        params[Self::NORM] * r.powf(-params[Self::ALPHA])
    }

    fn derivative(&self, r: f64, params: &[f64], index: usize) -> f64 {
        let (alpha, norm) = (params[Self::ALPHA], params[Self::NORM]);
        match index {
            Self::ALPHA => -norm * r.powf(-alpha) * r.ln(),
            Self::NORM => r.powf(-alpha),
            _ => unreachable!("power-law model has two parameters"),
        }
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["alpha", "norm"]
    }

    fn default_parameters(&self) -> Vec<FitParameter> {
        vec![
            FitParameter::new("alpha", 1.0),
            FitParameter::new("norm", 1e-2).with_bounds(0.0, f64::INFINITY),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const PARAMS: [f64; 2] = [1.4, 3.0e-2];

    #[test]
    fn unit_radius_gives_norm() {
        assert_relative_eq!(PowerLaw.brightness(1.0, &PARAMS), PARAMS[1]);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let step = 1e-7;
        for r in [0.2, 1.0, 7.5] {
            for index in 0..2 {
                let mut up = PARAMS;
                let mut down = PARAMS;
                up[index] += step;
                down[index] -= step;
                let numeric =
                    (PowerLaw.brightness(r, &up) - PowerLaw.brightness(r, &down)) / (2.0 * step);
                assert_relative_eq!(
                    PowerLaw.derivative(r, &PARAMS, index),
                    numeric,
                    max_relative = 1e-5
                );
            }
        }
    }
}
