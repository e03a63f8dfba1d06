//! Planar geometry for entity placement.

use core::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A point (or offset) in world space.
///
/// Serialized as a two-element array `[x, y]`, matching what clients
/// expect for `pos` and `scale` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate (screen space, grows downward).
    pub y: f32,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a point from its coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Offset of `length` units in direction `angle` (radians).
    pub fn from_angle(angle: f32, length: f32) -> Self {
        Self {
            x: angle.cos() * length,
            y: angle.sin() * length,
        }
    }

    /// Squared Euclidean length.
    pub fn sqr_magnitude(self) -> f32 {
        self.x.mul_add(self.x, self.y * self.y)
    }

    /// Euclidean length.
    pub fn magnitude(self) -> f32 {
        self.sqr_magnitude().sqrt()
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let p = Point::new(1.0, 2.0) + Point::new(-8.0, 4.0);
        assert!((p.x - -7.0).abs() < f32::EPSILON);
        assert!((p.y - 6.0).abs() < f32::EPSILON);
        let q = p - Point::new(-7.0, 6.0);
        assert!(q.magnitude() < f32::EPSILON);
    }

    #[test]
    fn from_angle_has_requested_length() {
        let p = Point::from_angle(0.7, 5.0);
        assert!((p.magnitude() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Point = serde_json::from_str("[3, 4]").unwrap();
        assert!((back.magnitude() - 5.0).abs() < 1e-6);
    }
}
