use crate::error::RegionError;
use crate::geom::{Point, normalize_angle, position_angle, rotate_point};
use crate::region::{PixelBounds, RegionShape};

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Sector of a rotated ellipse, covering circles, full ellipses, and
/// panda/epanda annular sectors.
///
/// Membership requires the pixel to satisfy the normalized ellipse equation
/// in the ellipse's own frame and its polar angle to fall inside
/// `[start_angle, end_angle]`. The radial coordinate is the Euclidean
/// distance from the sector center.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EllipticalSector {
    center: Point,
    start_angle: f64,
    end_angle: f64,
    major_axis: f64,
    minor_axis: f64,
    rotation: f64,
}

impl EllipticalSector {
    /// New sector from its center (0-based image coordinates), angular range
    /// and rotation in radians, and semi-axes in pixels.
    ///
    /// Angles are normalized into `[0, 2π)` except the end angle, which maps
    /// 0 to 2π so that a `0..=360°` input covers the full ellipse. A start
    /// angle greater than the end angle denotes a range wrapping through 0.
    pub fn new(
        center: Point,
        start_angle: f64,
        end_angle: f64,
        major_axis: f64,
        minor_axis: f64,
        rotation: f64,
    ) -> Result<Self, RegionError> {
        if !(major_axis >= minor_axis && minor_axis > 0.0) || !major_axis.is_finite() {
            return Err(RegionError::InvalidParameters(format!(
                "ellipse axes must satisfy major >= minor > 0, got major {major_axis}, \
                 minor {minor_axis}"
            )));
        }
        let end_angle = match normalize_angle(end_angle) {
            a if a == 0.0 => TAU,
            a => a,
        };
        Ok(Self {
            center,
            start_angle: normalize_angle(start_angle),
            end_angle,
            major_axis,
            minor_axis,
            rotation: normalize_angle(rotation),
        })
    }

    pub fn major_axis(&self) -> f64 {
        self.major_axis
    }

    pub fn minor_axis(&self) -> f64 {
        self.minor_axis
    }

    fn angle_in_range(&self, angle: f64) -> bool {
        if self.start_angle <= self.end_angle {
            self.start_angle <= angle && angle <= self.end_angle
        } else {
            angle >= self.start_angle || angle <= self.end_angle
        }
    }
}

impl RegionShape for EllipticalSector {
    fn center(&self) -> Point {
        self.center
    }

    fn contains(&self, pixel: Point) -> bool {
        let local = rotate_point(
            Point::new(0.0, 0.0),
            Point::new(pixel.x - self.center.x, pixel.y - self.center.y),
            -self.rotation,
        );
        let ellipse_eq = (local.x / self.major_axis).powi(2) + (local.y / self.minor_axis).powi(2);
        if ellipse_eq > 1.0 {
            return false;
        }
        // The center pixel has no defined polar angle; give it the start
        // angle so it always lands in the sector.
        let angle = if local.x == 0.0 && local.y == 0.0 {
            self.start_angle
        } else {
            position_angle(local.x, local.y)
        };
        self.angle_in_range(angle)
    }

    fn bounds(&self) -> PixelBounds {
        PixelBounds {
            x_min: (self.center.x - self.major_axis).floor() as i64,
            x_max: (self.center.x + self.major_axis).ceil() as i64,
            y_min: (self.center.y - self.major_axis).floor() as i64,
            y_max: (self.center.y + self.major_axis).ceil() as i64,
        }
    }

    fn radius_of(&self, pixel: Point) -> f64 {
        let dx = pixel.x - self.center.x;
        let dy = pixel.y - self.center.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn max_radius(&self) -> f64 {
        self.major_axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::f64::consts::PI;

    fn pixel_count(sector: &EllipticalSector) -> usize {
        let bounds = sector.bounds();
        let mut n = 0;
        for x in bounds.x_min..=bounds.x_max {
            for y in bounds.y_min..=bounds.y_max {
                if sector.contains(Point::new(x as f64, y as f64)) {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn circle_membership_is_rotation_independent() {
        let reference = EllipticalSector::new(Point::new(10.0, 10.0), 0.0, TAU, 8.0, 8.0, 0.0)
            .unwrap();
        let n_ref = pixel_count(&reference);
        for rotation in [0.3, 1.2, PI, 5.0] {
            let rotated =
                EllipticalSector::new(Point::new(10.0, 10.0), 0.0, TAU, 8.0, 8.0, rotation)
                    .unwrap();
            let bounds = rotated.bounds();
            let mut n = 0;
            for x in bounds.x_min..=bounds.x_max {
                for y in bounds.y_min..=bounds.y_max {
                    let p = Point::new(x as f64, y as f64);
                    assert_eq!(reference.contains(p), rotated.contains(p));
                    if rotated.contains(p) {
                        n += 1;
                    }
                }
            }
            assert_eq!(n, n_ref);
        }
    }

    #[test]
    fn half_plane_sector_takes_half_the_pixels() {
        let full =
            EllipticalSector::new(Point::new(10.0, 10.0), 0.0, TAU, 8.0, 8.0, 0.0).unwrap();
        let half = EllipticalSector::new(Point::new(10.0, 10.0), 0.0, PI, 8.0, 8.0, 0.0).unwrap();
        let n_full = pixel_count(&full) as f64;
        let n_half = pixel_count(&half) as f64;
        // The dy == 0 row belongs entirely to the half sector (angles 0 and
        // π), so allow one boundary row of slack.
        assert!((2.0 * n_half - n_full).abs() <= 2.0 * 8.0 + 2.0);
    }

    #[test]
    fn wrapping_angular_range() {
        let sector =
            EllipticalSector::new(Point::new(0.0, 0.0), 1.5 * PI, 0.5 * PI, 6.0, 6.0, 0.0)
                .unwrap();
        assert!(sector.contains(Point::new(4.0, 0.0)));
        assert!(sector.contains(Point::new(3.0, 3.0)));
        assert!(sector.contains(Point::new(3.0, -3.0)));
        assert!(!sector.contains(Point::new(-4.0, 0.0)));
    }

    #[test]
    fn center_pixel_assigned_to_start_angle() {
        let in_range =
            EllipticalSector::new(Point::new(5.0, 5.0), 0.0, PI, 4.0, 4.0, 0.0).unwrap();
        assert!(in_range.contains(Point::new(5.0, 5.0)));
    }

    #[test]
    fn ellipse_respects_minor_axis() {
        let sector =
            EllipticalSector::new(Point::new(0.0, 0.0), 0.0, TAU, 10.0, 2.0, 0.0).unwrap();
        assert!(sector.contains(Point::new(9.0, 0.0)));
        assert!(!sector.contains(Point::new(0.0, 3.0)));
        // Rotated by 90°, the long axis points along y.
        let rotated =
            EllipticalSector::new(Point::new(0.0, 0.0), 0.0, TAU, 10.0, 2.0, PI / 2.0).unwrap();
        assert!(rotated.contains(Point::new(0.0, 9.0)));
        assert!(!rotated.contains(Point::new(3.0, 0.0)));
    }

    #[test]
    fn swapped_axes_are_rejected() {
        assert!(EllipticalSector::new(Point::new(0.0, 0.0), 0.0, TAU, 2.0, 5.0, 0.0).is_err());
        assert!(EllipticalSector::new(Point::new(0.0, 0.0), 0.0, TAU, 5.0, 0.0, 0.0).is_err());
    }
}
