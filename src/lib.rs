#![doc = include_str!("../README.md")]

mod binning;
pub use binning::{Bin, distribute_pixels, merge_bins};

mod edges;
pub use edges::{EdgeSpacing, make_edges, merge_subpixel_bins};

mod error;
pub use error::{
    FitError, ProfileError, RegionError, SizeError, UnknownModelError, UnknownParameterError,
};

mod fit;
pub use fit::{
    CobylaFit, Constraint, ConstraintKind, CurveFitAlgorithm, CurveFitTrait, FitResult, Fitter,
    GradientFit, MinimizeResult,
};

mod geom;
pub use geom::Point;

mod image;
pub use image::{ImageMeta, ImagePlane, ImageSet, Observation};

mod model;
pub use model::{
    Beta, Constant, FitParameter, Model, ModelFunction, ModelKind, ModelRegistry, PowerLaw,
    model_by_name,
};

mod profile;
pub use profile::{BinConfig, Profile, ProfileEntry};

mod region;
pub use region::{BoxRegion, EllipticalSector, PixelBounds, Region, RegionShape};

mod stat;
pub use stat::{Cash, Chi2, FitData, FitObjective, Statistic};
