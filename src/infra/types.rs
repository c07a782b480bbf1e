use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

/// Metres per working length unit. The dynamics bridge reports positions and
/// velocities in metres; everything inside the crate is divided by this.
pub const SCALE_FACTOR: f64 = 20.0;

pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

/// Converts nautical miles into working length units.
pub fn nm(miles: f64) -> f64 {
    miles * METERS_PER_NAUTICAL_MILE / SCALE_FACTOR
}

/// Converts working length units back into nautical miles.
pub fn to_nm(units: f64) -> f64 {
    units * SCALE_FACTOR / METERS_PER_NAUTICAL_MILE
}

/// Wraps an angle into (-PI, PI].
pub fn wrap_angle(angle: f64) -> f64 {
    let mut wrapped = angle % (2.0 * PI);
    if wrapped <= -PI {
        wrapped += 2.0 * PI;
    } else if wrapped > PI {
        wrapped -= 2.0 * PI;
    }
    wrapped
}

/// Planar vector. `x` points along heading 0, `y` points to starboard.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `heading`.
    pub fn from_heading(heading: f64) -> Self {
        Self::new(heading.cos(), heading.sin())
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: &Vec2) -> f64 {
        (*other - *self).length()
    }

    pub fn dot(&self, other: &Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product of two planar vectors.
    pub fn cross(&self, other: &Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Projects the vector onto the body frame of a hull pointing along
    /// `heading`, returning `(forward, lateral)` with lateral positive to
    /// starboard.
    pub fn to_body_frame(&self, heading: f64) -> (f64, f64) {
        let (sin, cos) = heading.sin_cos();
        let forward = self.x * cos + self.y * sin;
        let lateral = -self.x * sin + self.y * cos;
        (forward, lateral)
    }

    /// Inverse of [`Vec2::to_body_frame`].
    pub fn from_body_frame(forward: f64, lateral: f64, heading: f64) -> Self {
        let (sin, cos) = heading.sin_cos();
        Self::new(forward * cos - lateral * sin, forward * sin + lateral * cos)
    }

    /// Unsigned angle between two vectors in radians.
    pub fn angle_to(&self, other: &Vec2) -> f64 {
        self.cross(other).atan2(self.dot(other)).abs()
    }

    /// Heading of the vector in the crate's frame.
    pub fn heading(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-12);
        assert!((wrap_angle(-3.0 * PI / 2.0) - FRAC_PI_2).abs() < 1e-12);
        assert!(wrap_angle(0.0).abs() < 1e-12);
    }

    #[test]
    fn test_body_frame_starboard_is_positive() {
        // Heading north, a point due east is on the starboard beam.
        let (forward, lateral) = Vec2::new(0.0, 10.0).to_body_frame(0.0);
        assert!(forward.abs() < 1e-9);
        assert!((lateral - 10.0).abs() < 1e-9);

        // Heading east, the same point is dead ahead.
        let (forward, lateral) = Vec2::new(0.0, 10.0).to_body_frame(FRAC_PI_2);
        assert!((forward - 10.0).abs() < 1e-9);
        assert!(lateral.abs() < 1e-9);
    }

    #[test]
    fn test_body_frame_roundtrip() {
        let v = Vec2::new(3.0, -4.0);
        let (f, l) = v.to_body_frame(0.7);
        let back = Vec2::from_body_frame(f, l, 0.7);
        assert!((back.x - v.x).abs() < 1e-9);
        assert!((back.y - v.y).abs() < 1e-9);
    }

    #[test]
    fn test_nautical_mile_conversion() {
        assert!((nm(1.0) - 92.6).abs() < 1e-9);
        assert!((to_nm(nm(2.5)) - 2.5).abs() < 1e-12);
    }
}
