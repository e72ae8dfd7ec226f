//! Fit statistics: objective values with analytic gradients.
//!
//! Both statistics compare the bin-averaged model with the data, the
//! average taken by 5-point Gauss–Legendre quadrature across the bin
//! width. Chi-square works on net rates; the Cash statistic works on the
//! raw source and background counts jointly, profiling the background out
//! through the closed-form root of the joint-Poisson likelihood.

use crate::error::FitError;
use crate::model::{ModelFunction, ModelKind};
use crate::profile::Profile;

use enum_dispatch::enum_dispatch;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

const GL_NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683_1,
    0.0,
    0.538_469_310_105_683_1,
    0.906_179_845_938_664,
];
const GL_WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189_1,
    0.478_628_670_499_366_5,
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
];

/// Mean of `f` over `[r - w, r + w]`, point evaluation for zero-width bins.
fn bin_mean(f: impl Fn(f64) -> f64, r: f64, w: f64) -> f64 {
    if w <= 0.0 {
        return f(r);
    }
    GL_NODES
        .iter()
        .zip(GL_WEIGHTS)
        .map(|(&node, weight)| weight * f(r + w * node))
        .sum::<f64>()
        / 2.0
}

/// Profile columns a statistic consumes, clipped to the fit range.
///
/// Degenerate bins are dropped; `t_raw`/`t_bkg` are the equivalent
/// exposures turning rates into expected counts.
#[derive(Clone, Debug)]
pub struct FitData {
    pub r: Array1<f64>,
    pub w: Array1<f64>,
    pub net_rate: Array1<f64>,
    pub err_net_rate: Array1<f64>,
    pub raw_cts: Array1<f64>,
    pub bkg_cts: Array1<f64>,
    pub t_raw: Array1<f64>,
    pub t_bkg: Array1<f64>,
}

impl FitData {
    /// Select the profile bins with `min_range <= r <= max_range`.
    pub fn from_profile(
        profile: &Profile,
        min_range: f64,
        max_range: f64,
    ) -> Result<Self, FitError> {
        let selected: Vec<_> = profile
            .entries()
            .iter()
            .filter(|e| !e.degenerate && e.radius >= min_range && e.radius <= max_range)
            .collect();
        if selected.is_empty() {
            return Err(FitError::EmptyFitRange {
                min_range,
                max_range,
            });
        }
        let column = |f: fn(&crate::profile::ProfileEntry) -> f64| {
            selected.iter().map(|e| f(e)).collect::<Array1<f64>>()
        };
        Ok(Self {
            r: column(|e| e.radius),
            w: column(|e| e.width),
            net_rate: column(|e| e.net_rate),
            err_net_rate: column(|e| e.err_net_rate),
            raw_cts: column(|e| e.raw_cts),
            bkg_cts: column(|e| e.bkg_cts),
            t_raw: column(|e| e.t_raw),
            t_bkg: column(|e| e.t_bkg),
        })
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Bin-averaged model and per-parameter derivatives for bin `i`.
    fn bin_model(&self, kind: ModelKind, values: &[f64], i: usize) -> (f64, Vec<f64>) {
        let (r, w) = (self.r[i], self.w[i]);
        let m = bin_mean(|x| kind.brightness(x, values), r, w);
        let dm = (0..values.len())
            .map(|k| bin_mean(|x| kind.derivative(x, values, k), r, w))
            .collect();
        (m, dm)
    }
}

/// A fit objective: value plus analytic gradient over all parameters.
#[enum_dispatch]
pub trait FitObjective {
    fn value_and_gradient(&self, data: &FitData, kind: ModelKind, values: &[f64])
    -> (f64, Vec<f64>);
}

/// Available fit statistics.
#[enum_dispatch(FitObjective)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Statistic {
    Chi2(Chi2),
    Cash(Cash),
}

impl Default for Statistic {
    fn default() -> Self {
        Self::Chi2(Chi2)
    }
}

/// Chi-square over net rates.
///
/// Bins with zero uncertainty carry no information and are skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chi2;

impl FitObjective for Chi2 {
    fn value_and_gradient(
        &self,
        data: &FitData,
        kind: ModelKind,
        values: &[f64],
    ) -> (f64, Vec<f64>) {
        let mut value = 0.0;
        let mut gradient = vec![0.0; values.len()];
        for i in 0..data.len() {
            let err = data.err_net_rate[i];
            if err == 0.0 {
                continue;
            }
            let (m, dm) = data.bin_model(kind, values, i);
            let resid = data.net_rate[i] - m;
            value += (resid / err).powi(2);
            for (g, dm_k) in gradient.iter_mut().zip(&dm) {
                *g -= 2.0 * resid / (err * err) * dm_k;
            }
        }
        (value, gradient)
    }
}

/// Cash statistic with profiled background (the W statistic).
///
/// Per bin, with `s` raw counts over equivalent exposure `ts` and `b`
/// background counts over `tb`, the background rate is profiled out
/// analytically; the zero-count corners get their exact closed forms
/// instead of the generic expression, which degenerates there. Gradient
/// branch selection mirrors the value's exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cash;

impl Cash {
    /// Per-bin contribution and its derivative with respect to the
    /// bin-mean model rate `m`.
    fn term(s: f64, b: f64, ts: f64, tb: f64, m: f64) -> (f64, f64) {
        // Negative model rates have no Poisson meaning.
        let m = m.max(0.0);
        let tt = ts + tb;
        if s == 0.0 && b == 0.0 {
            return (ts * m, ts);
        }
        if s == 0.0 {
            return (ts * m - b * (tb / tt).ln(), ts);
        }
        if b == 0.0 {
            // Background rate estimate hits its zero floor when the model
            // under-predicts the source counts.
            return if m < s / tt {
                (-tb * m - s * (ts / tt).ln(), -tb)
            } else {
                (ts * m + s * (s.ln() - (ts * m).ln() - 1.0), ts - s / m)
            };
        }
        let c = tt * m - s - b;
        let d = (c * c + 4.0 * tt * b * m).sqrt();
        let f = (s + b - tt * m + d) / (2.0 * tt);
        let fp = 0.5 * ((tt * m - s + b) / d - 1.0);
        let value = ts * m + tt * f
            - s * (ts * m + ts * f).ln()
            - b * (tb * f).ln()
            - s * (1.0 - s.ln())
            - b * (1.0 - b.ln());
        let derivative = ts + tt * fp - s * (1.0 + fp) / (m + f) - b * fp / f;
        (value, derivative)
    }
}

impl FitObjective for Cash {
    fn value_and_gradient(
        &self,
        data: &FitData,
        kind: ModelKind,
        values: &[f64],
    ) -> (f64, Vec<f64>) {
        let mut value = 0.0;
        let mut gradient = vec![0.0; values.len()];
        for i in 0..data.len() {
            let (m, dm) = data.bin_model(kind, values, i);
            let (term, dterm) = Self::term(
                data.raw_cts[i],
                data.bkg_cts[i],
                data.t_raw[i],
                data.t_bkg[i],
                m,
            );
            value += 2.0 * term;
            for (g, dm_k) in gradient.iter_mut().zip(&dm) {
                *g += 2.0 * dterm * dm_k;
            }
        }
        (value, gradient)
    }
}
