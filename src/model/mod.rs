//! Parametric radial models.
//!
//! A [`Model`] pairs a model function with an ordered list of
//! [`FitParameter`]s. Functions evaluate brightness and its analytic
//! parameter derivatives at a radius; everything the fit driver needs is
//! expressed through the [`ModelFunction`] trait.

use crate::error::{UnknownModelError, UnknownParameterError};

use enum_dispatch::enum_dispatch;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod beta;
pub use beta::Beta;

mod power_law;
pub use power_law::PowerLaw;

/// One model parameter with its box bounds.
///
/// Freezing pins the bounds to the current value so every consumer agrees
/// the parameter cannot move; thawing restores an unbounded interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    pub name: String,
    pub value: f64,
    pub frozen: bool,
    pub min: f64,
    pub max: f64,
}

impl FitParameter {
    /// Free parameter with unbounded range.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            frozen: false,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
        self.min = self.value;
        self.max = self.value;
    }

    pub fn thaw(&mut self) {
        self.frozen = false;
        self.min = f64::NEG_INFINITY;
        self.max = f64::INFINITY;
    }
}

/// Evaluation contract of a radial model function.
///
/// `params` always holds the full ordered parameter vector, frozen entries
/// included, in the order of [`ModelFunction::parameter_names`].
#[enum_dispatch]
pub trait ModelFunction {
    /// Surface brightness at radius `r`.
    fn brightness(&self, r: f64, params: &[f64]) -> f64;

    /// Partial derivative of the brightness with respect to parameter
    /// `index`.
    fn derivative(&self, r: f64, params: &[f64], index: usize) -> f64;

    fn parameter_names(&self) -> &'static [&'static str];

    fn default_parameters(&self) -> Vec<FitParameter>;
}

/// Constant surface-brightness level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant;

impl ModelFunction for Constant {
    fn brightness(&self, _r: f64, params: &[f64]) -> f64 {
        params[0]
    }

    fn derivative(&self, _r: f64, _params: &[f64], index: usize) -> f64 {
        match index {
            0 => 1.0,
            _ => unreachable!("constant model has one parameter"),
        }
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["c"]
    }

    fn default_parameters(&self) -> Vec<FitParameter> {
        vec![FitParameter::new("c", 1e-3).with_bounds(0.0, f64::INFINITY)]
    }
}

/// The set of built-in model functions.
#[enum_dispatch(ModelFunction)]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ModelKind {
    Beta(Beta),
    Constant(Constant),
    PowerLaw(PowerLaw),
}

/// A model function bound to a concrete parameter list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    kind: ModelKind,
    parameters: Vec<FitParameter>,
}

impl Model {
    /// New model with the function's default parameters.
    pub fn new(kind: ModelKind) -> Self {
        Self {
            parameters: kind.default_parameters(),
            kind,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn parameters(&self) -> &[FitParameter] {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut [FitParameter] {
        &mut self.parameters
    }

    /// Look a parameter up by name.
    pub fn parameter_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut FitParameter, UnknownParameterError> {
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| UnknownParameterError(name.into()))
    }

    /// Current parameter values in declaration order.
    pub fn values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.value).collect()
    }

    /// Brightness at `r` with the current parameter values.
    pub fn brightness(&self, r: f64) -> f64 {
        self.kind.brightness(r, &self.values())
    }
}

/// Name→function lookup for building models from text descriptions.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    functions: HashMap<&'static str, ModelKind>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, kind: ModelKind) {
        self.functions.insert(name, kind);
    }

    pub fn create(&self, name: &str) -> Result<Model, UnknownModelError> {
        self.functions
            .get(name)
            .map(|&kind| Model::new(kind))
            .ok_or_else(|| UnknownModelError(name.into()))
    }
}

lazy_static! {
    static ref DEFAULT_REGISTRY: ModelRegistry = {
        let mut registry = ModelRegistry::new();
        registry.register("beta", Beta.into());
        registry.register("const", Constant.into());
        registry.register("powerlaw", PowerLaw.into());
        registry
    };
}

/// Build a model by name from the built-in registry.
pub fn model_by_name(name: &str) -> Result<Model, UnknownModelError> {
    DEFAULT_REGISTRY.create(name)
}
