/// Errors raised while constructing a region or binning it into a profile.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegionError {
    #[error(
        "too few net counts in the region: accumulated {accumulated:.1} of the required \
         minimum {minimum:.1}; enlarge the region or lower the minimum count threshold"
    )]
    InsufficientCounts { accumulated: f64, minimum: f64 },

    #[error("invalid region parameters: {0}")]
    InvalidParameters(String),

    #[error("unknown region shape {0:?}")]
    UnknownShape(String),
}

/// Unusable input images: mismatched array shapes or bad metadata.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SizeError {
    #[error("{plane} plane shape {actual:?} does not match counts plane shape {expected:?}")]
    ShapeMismatch {
        plane: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("image set must contain at least one observation")]
    EmptySet,

    #[error("{plane} plane exposure must be positive and finite, got {exposure}")]
    InvalidExposure { plane: &'static str, exposure: f64 },

    #[error("background normalization must be positive and finite, got {0}")]
    InvalidNorm(f64),
}

/// Errors raised by the fit driver.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FitError {
    #[error("optimizer failed to converge: {message}")]
    NotConverged { message: String },

    #[error("model has no free parameters to fit")]
    NoFreeParameters,

    #[error("the selected algorithm does not support general constraints")]
    ConstraintsUnsupported,

    #[error("no usable profile bins within the radial range [{min_range}, {max_range}]")]
    EmptyFitRange { min_range: f64, max_range: f64 },
}

/// Returned when a model name is absent from the registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("model {0:?} is not implemented")]
pub struct UnknownModelError(pub String);

/// Returned when a parameter name is absent from a model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("parameter {0:?} does not exist")]
pub struct UnknownParameterError(pub String);

/// Any failure of profile extraction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProfileError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Size(#[from] SizeError),
}
