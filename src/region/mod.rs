//! Region shapes a profile can be extracted from.
//!
//! A region defines a 2-D footprint on the pixel lattice together with a
//! radial coordinate along which the profile is accumulated. For a box the
//! radial coordinate runs from the lower edge of the unrotated box along its
//! height; for an elliptical sector it is the distance from the sector center.

use crate::error::RegionError;
use crate::geom::Point;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

mod box_region;
pub use box_region::BoxRegion;

mod sector;
pub use sector::EllipticalSector;

/// Inclusive integer pixel box enclosing a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

#[enum_dispatch]
pub trait RegionShape {
    /// Shape center in 0-based image coordinates.
    fn center(&self) -> Point;

    /// Pixel-center membership test.
    ///
    /// Boundary pixels follow a half-open convention: a pixel exactly on the
    /// lower/left boundary of the shape-local interval is inside, one exactly
    /// on the upper/right boundary is outside.
    fn contains(&self, pixel: Point) -> bool;

    /// Integer pixel box enclosing the shape, bounding the classification
    /// search space.
    fn bounds(&self) -> PixelBounds;

    /// Radial coordinate of a point, in `[0, max_radius())` for interior
    /// points.
    fn radius_of(&self, pixel: Point) -> f64;

    /// Upper limit of the radial coordinate.
    fn max_radius(&self) -> f64;
}

/// A profile extraction region.
#[enum_dispatch(RegionShape)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Region {
    Box(BoxRegion),
    Sector(EllipticalSector),
}

impl Region {
    /// Build a region from a shape name and its parameter list.
    ///
    /// Parameters follow the region-file convention: 1-based pixel
    /// coordinates and angles in degrees, counter-clockwise.
    ///
    /// - `box`: `x, y, width, height, angle`
    /// - `circle`: `x, y, radius`
    /// - `ellipse`: `x, y, major, minor, angle`
    /// - `panda` / `epanda`: `x, y, start_angle, end_angle, major, minor, angle`
    pub fn from_params(shape: &str, params: &[f64]) -> Result<Self, RegionError> {
        match shape {
            "box" => {
                let [x, y, width, height, angle] = expect_params(shape, params)?;
                Ok(BoxRegion::new(
                    Point::new(x - 1.0, y - 1.0),
                    width,
                    height,
                    angle.to_radians(),
                )?
                .into())
            }
            "circle" => {
                let [x, y, r] = expect_params(shape, params)?;
                Ok(
                    EllipticalSector::new(Point::new(x - 1.0, y - 1.0), 0.0, TAU, r, r, 0.0)?
                        .into(),
                )
            }
            "ellipse" => {
                let [x, y, major, minor, angle] = expect_params(shape, params)?;
                Ok(EllipticalSector::new(
                    Point::new(x - 1.0, y - 1.0),
                    0.0,
                    TAU,
                    major,
                    minor,
                    angle.to_radians(),
                )?
                .into())
            }
            "panda" | "epanda" => {
                let [x, y, start, end, major, minor, angle] = expect_params(shape, params)?;
                Ok(EllipticalSector::new(
                    Point::new(x - 1.0, y - 1.0),
                    start.to_radians(),
                    end.to_radians(),
                    major,
                    minor,
                    angle.to_radians(),
                )?
                .into())
            }
            _ => Err(RegionError::UnknownShape(shape.into())),
        }
    }
}

fn expect_params<const N: usize>(shape: &str, params: &[f64]) -> Result<[f64; N], RegionError> {
    params.try_into().map_err(|_| {
        RegionError::InvalidParameters(format!(
            "shape {:?} takes {} parameters, got {}",
            shape,
            N,
            params.len()
        ))
    })
}
