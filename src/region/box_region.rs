use crate::error::RegionError;
use crate::geom::{Point, normalize_angle, rotate_point};
use crate::region::{PixelBounds, RegionShape};

use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

/// Rotated rectangular region.
///
/// The radial coordinate runs from the lower edge of the unrotated box
/// upward along its height, so profile bins stack bottom-up across the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxRegion {
    center: Point,
    width: f64,
    height: f64,
    angle: f64,
}

impl BoxRegion {
    /// New box from its center (0-based image coordinates), side lengths in
    /// pixels, and counter-clockwise rotation in radians.
    pub fn new(center: Point, width: f64, height: f64, angle: f64) -> Result<Self, RegionError> {
        if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
            return Err(RegionError::InvalidParameters(format!(
                "box sides must be positive and finite, got width {width}, height {height}"
            )));
        }
        Ok(Self {
            center,
            width,
            height,
            angle: normalize_angle(angle),
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Corners of the rotated box in image coordinates.
    pub fn corners(&self) -> [Point; 4] {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        [
            Point::new(-half_w, -half_h),
            Point::new(-half_w, half_h),
            Point::new(half_w, half_h),
            Point::new(half_w, -half_h),
        ]
        .map(|corner| rotate_point(self.center, corner, self.angle))
    }

    /// Map an image point into the box's own unrotated frame, relative to
    /// the box center.
    fn to_local(&self, p: Point) -> Point {
        rotate_point(
            Point::new(0.0, 0.0),
            Point::new(p.x - self.center.x, p.y - self.center.y),
            -self.angle,
        )
    }
}

impl RegionShape for BoxRegion {
    fn center(&self) -> Point {
        self.center
    }

    fn contains(&self, pixel: Point) -> bool {
        // Half-open on the upper/right boundary so that edges falling exactly
        // on pixel centers classify each boundary pixel exactly once.
        let local = self.to_local(pixel);
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        local.x >= -half_w && local.x < half_w && local.y >= -half_h && local.y < half_h
    }

    fn bounds(&self) -> PixelBounds {
        let corners = self.corners();
        let (x_min, x_max) = match corners.iter().map(|c| c.x).minmax() {
            MinMaxResult::MinMax(min, max) => (min, max),
            _ => unreachable!("a box has four corners"),
        };
        let (y_min, y_max) = match corners.iter().map(|c| c.y).minmax() {
            MinMaxResult::MinMax(min, max) => (min, max),
            _ => unreachable!("a box has four corners"),
        };
        PixelBounds {
            x_min: x_min.floor() as i64,
            x_max: x_max.ceil() as i64,
            y_min: y_min.floor() as i64,
            y_max: y_max.ceil() as i64,
        }
    }

    fn radius_of(&self, pixel: Point) -> f64 {
        self.to_local(pixel).y + self.height / 2.0
    }

    fn max_radius(&self) -> f64 {
        self.height
    }
}
