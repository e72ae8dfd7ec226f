use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Real-valued image-plane coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rotate the offset `point` counter-clockwise by `angle` radians and
/// translate it to `origin`.
///
/// `point` is given relative to the rotation center, the result in absolute
/// coordinates. This is used both to place shape corners and, with a negated
/// angle, to map image pixels into a shape's own unrotated frame.
pub fn rotate_point(origin: Point, point: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    Point::new(
        origin.x + point.x * cos - point.y * sin,
        origin.y + point.x * sin + point.y * cos,
    )
}

/// Normalize an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a < 0.0 { a + TAU } else { a }
}

/// Polar angle of the offset `(dx, dy)`, normalized into `[0, 2π)`.
///
/// Quadrant correction comes from `atan2`; the degenerate zero offset is the
/// caller's responsibility.
pub fn position_angle(dx: f64, dy: f64) -> f64 {
    normalize_angle(dy.atan2(dx))
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn rotate_point_quarter_turn() {
        let p = rotate_point(Point::new(2.0, 3.0), Point::new(1.0, 0.0), FRAC_PI_2);
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn rotate_point_inverse_round_trip() {
        let origin = Point::new(-1.5, 7.25);
        let offset = Point::new(3.0, -2.0);
        let rotated = rotate_point(origin, offset, 0.7);
        let local = rotate_point(
            Point::new(0.0, 0.0),
            Point::new(rotated.x - origin.x, rotated.y - origin.y),
            -0.7,
        );
        assert_relative_eq!(local.x, offset.x, epsilon = 1e-12);
        assert_relative_eq!(local.y, offset.y, epsilon = 1e-12);
    }

    #[test]
    fn normalize_angle_wraps_negative() {
        assert_relative_eq!(normalize_angle(-FRAC_PI_2), 1.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(2.5 * TAU), 0.5 * TAU, epsilon = 1e-12);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn position_angle_quadrants() {
        assert_relative_eq!(position_angle(1.0, 0.0), 0.0);
        assert_relative_eq!(position_angle(0.0, 1.0), FRAC_PI_2);
        assert_relative_eq!(position_angle(-1.0, 0.0), PI);
        assert_relative_eq!(position_angle(0.0, -1.0), 1.5 * PI);
    }
}
