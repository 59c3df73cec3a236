use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A 2D Euclidean vector. Also used as a point in the plane.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

/// Points and displacements share the same representation.
pub type Position = Vec2;

impl Vec2 {
    /// Creates a new Vec2.
    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Creates a zero vector.
    pub const fn zero() -> Self {
        Vec2 { x: 0.0, y: 0.0 }
    }

    /// Returns the coordinate along `dimension` (0 = x, 1 = y).
    pub fn coordinate(&self, dimension: usize) -> Option<f64> {
        match dimension {
            0 => Some(self.x),
            1 => Some(self.y),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Calculates the squared length (magnitude) of the vector.
    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Calculates the length (magnitude) of the vector.
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns a unit vector with the same direction.
    /// Returns a zero vector if the vector's length is exactly zero or not finite.
    pub fn normalize_or_zero(&self) -> Self {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Vec2 { x: self.x / len, y: self.y / len }
        } else {
            Vec2::zero()
        }
    }

    /// Calculates the dot product with another vector.
    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Calculates the squared distance to another point.
    pub fn distance_squared(&self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Calculates the distance to another point.
    pub fn distance(&self, other: Vec2) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Scales the vector by a scalar value.
    pub fn scale(&self, scalar: f64) -> Self {
        Vec2 { x: self.x * scalar, y: self.y * scalar }
    }

    /// Unit vector pointing from `self` towards `other`, or `None` when the two points coincide.
    pub fn direction_to(&self, other: Vec2) -> Option<Vec2> {
        let delta = other - *self;
        let len = delta.length();
        if len > 0.0 {
            Some(Vec2::new(delta.x / len, delta.y / len))
        } else {
            None
        }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

impl From<(f64, f64)> for Vec2 {
    fn from((x, y): (f64, f64)) -> Self {
        Vec2::new(x, y)
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Vec2::new(x, y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_direction_and_zero_stays_zero() {
        let v = Vec2::new(3.0, 4.0).normalize_or_zero();
        assert!((v.x - 0.6).abs() < 1e-15);
        assert!((v.y - 0.8).abs() < 1e-15);
        assert_eq!(Vec2::zero().normalize_or_zero(), Vec2::zero());
        assert_eq!(Vec2::new(f64::NAN, 1.0).normalize_or_zero(), Vec2::zero());
    }

    #[test]
    fn direction_to_coincident_point_is_none() {
        let p = Vec2::new(1.0, 1.0);
        assert_eq!(p.direction_to(p), None);
        let d = p.direction_to(Vec2::new(1.0, 3.0)).unwrap();
        assert_eq!(d, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn operators_match_named_methods() {
        let a = Vec2::new(0.5, -1.0);
        let b = Vec2::new(2.0, 4.0);
        assert_eq!(a + b, Vec2::new(2.5, 3.0));
        assert_eq!(b - a, Vec2::new(1.5, 5.0));
        assert_eq!(a * 2.0, a.scale(2.0));
        assert_eq!(-a, Vec2::new(-0.5, 1.0));
        assert_eq!(a.distance(b), (b - a).length());
        assert_eq!(b.coordinate(1), Some(4.0));
        assert_eq!(b.coordinate(2), None);
    }
}
