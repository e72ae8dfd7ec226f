//! Input image planes and their validation.
//!
//! A profile is extracted from one or more co-registered observations, each
//! a counts plane with an optional background plane and an optional
//! exposure map. All shape checking happens eagerly at construction so the
//! extraction loops can index without further validation.

use crate::error::SizeError;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Header-level metadata of an image plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Nominal exposure time, seconds.
    pub exposure: f64,
    /// Pixel scale, degrees per pixel.
    pub pixel_scale: f64,
    /// Background normalization; `None` means the header carried no value
    /// and a factor of 1 is applied.
    pub bkg_norm: Option<f64>,
}

/// A 2-D pixel array with its metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlane {
    data: Array2<f64>,
    meta: ImageMeta,
}

impl ImagePlane {
    pub fn new(data: Array2<f64>, meta: ImageMeta) -> Self {
        Self { data, meta }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// One observation: counts, optional background, optional exposure map.
#[derive(Clone, Debug)]
pub struct Observation {
    counts: ImagePlane,
    background: Option<ImagePlane>,
    exposure_map: Option<Array2<f64>>,
    bkg_corr: f64,
}

impl Observation {
    /// Assemble an observation, checking that the background plane and
    /// exposure map match the counts plane's shape and that the exposure
    /// metadata is usable.
    ///
    /// The background count correction `exposure * bkg_norm / bkg_exposure`
    /// is fixed here; a missing normalization defaults to 1. Non-positive
    /// nominal exposures or normalizations are rejected so the correction
    /// stays finite.
    pub fn new(
        counts: ImagePlane,
        background: Option<ImagePlane>,
        exposure_map: Option<Array2<f64>>,
    ) -> Result<Self, SizeError> {
        let shape = counts.shape();
        check_exposure("counts", counts.meta().exposure)?;
        if let Some(bkg) = &background {
            if bkg.shape() != shape {
                return Err(SizeError::ShapeMismatch {
                    plane: "background",
                    expected: shape,
                    actual: bkg.shape(),
                });
            }
            check_exposure("background", bkg.meta().exposure)?;
            if let Some(norm) = bkg.meta().bkg_norm {
                if !(norm > 0.0 && norm.is_finite()) {
                    return Err(SizeError::InvalidNorm(norm));
                }
            }
        }
        if let Some(map) = &exposure_map {
            if map.dim() != shape {
                return Err(SizeError::ShapeMismatch {
                    plane: "exposure map",
                    expected: shape,
                    actual: map.dim(),
                });
            }
        }
        let bkg_corr = match &background {
            Some(bkg) => {
                let norm = bkg.meta().bkg_norm.unwrap_or_else(|| {
                    log::info!("no background normalization given, using 1");
                    1.0
                });
                counts.meta().exposure * norm / bkg.meta().exposure
            }
            None => 1.0,
        };
        Ok(Self {
            counts,
            background,
            exposure_map,
            bkg_corr,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.counts.shape()
    }

    pub fn meta(&self) -> &ImageMeta {
        self.counts.meta()
    }

    pub fn counts_at(&self, row: usize, col: usize) -> f64 {
        self.counts.data()[(row, col)]
    }

    /// Background counts at a pixel, 0 without a background plane.
    pub fn background_at(&self, row: usize, col: usize) -> f64 {
        self.background
            .as_ref()
            .map_or(0.0, |bkg| bkg.data()[(row, col)])
    }

    /// Effective exposure at a pixel: the exposure-map value when a map is
    /// present, the nominal exposure time otherwise.
    pub fn exposure_at(&self, row: usize, col: usize) -> f64 {
        self.exposure_map
            .as_ref()
            .map_or(self.counts.meta().exposure, |map| map[(row, col)])
    }

    /// Multiplier scaling background counts onto the source exposure,
    /// `exposure * bkg_norm / bkg_exposure`.
    pub fn bkg_correction(&self) -> f64 {
        self.bkg_corr
    }
}

fn check_exposure(plane: &'static str, exposure: f64) -> Result<(), SizeError> {
    if exposure > 0.0 && exposure.is_finite() {
        Ok(())
    } else {
        Err(SizeError::InvalidExposure { plane, exposure })
    }
}

/// One or more co-registered observations accumulated into a single
/// profile.
#[derive(Clone, Debug)]
pub struct ImageSet {
    observations: Vec<Observation>,
}

impl ImageSet {
    /// Collect observations, requiring at least one and a common shape.
    pub fn new(observations: Vec<Observation>) -> Result<Self, SizeError> {
        let first = observations.first().ok_or(SizeError::EmptySet)?;
        let shape = first.shape();
        for obs in &observations[1..] {
            if obs.shape() != shape {
                return Err(SizeError::ShapeMismatch {
                    plane: "observation",
                    expected: shape,
                    actual: obs.shape(),
                });
            }
        }
        Ok(Self { observations })
    }

    pub fn single(observation: Observation) -> Self {
        Self {
            observations: vec![observation],
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn shape(&self) -> (usize, usize) {
        self.observations[0].shape()
    }

    /// Pixel scale of the set, arcmin per pixel.
    pub fn pixel_scale_arcmin(&self) -> f64 {
        self.observations[0].meta().pixel_scale * 60.0
    }
}
