//! Epsilon-comparable 3D vectors.

use std::fmt;

use nalgebra::Vector3;

use crate::error::{GeomError, Result};
use crate::WIGGLE_ROOM;

/// The underlying nalgebra vector type.
pub type Vec3 = Vector3<f64>;

/// Sign test used by the point-in-triangle edge functions.
///
/// Zero counts as negative, so a point exactly on an edge always lands on
/// the same side for identical inputs.
#[inline]
pub fn sign(x: f64) -> bool {
    x > 0.0
}

/// An immutable 3D vector.
///
/// Equality is tolerant: two vectors are equal when the magnitude of their
/// difference is below [`WIGGLE_ROOM`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Vector(Vec3);

impl Vector {
    /// Create a vector from its components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vec3::new(x, y, z))
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self(Vec3::zeros())
    }

    /// X component.
    #[inline]
    pub fn x(&self) -> f64 {
        self.0.x
    }

    /// Y component.
    #[inline]
    pub fn y(&self) -> f64 {
        self.0.y
    }

    /// Z component.
    #[inline]
    pub fn z(&self) -> f64 {
        self.0.z
    }

    /// Components as an array.
    pub fn to_array(&self) -> [f64; 3] {
        [self.0.x, self.0.y, self.0.z]
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Vector) -> f64 {
        self.0.dot(&other.0)
    }

    /// Cross product (right-handed).
    #[inline]
    pub fn cross(&self, other: &Vector) -> Vector {
        Self(self.0.cross(&other.0))
    }

    /// Multiply every component by `k`.
    #[inline]
    pub fn scale(&self, k: f64) -> Vector {
        Self(self.0 * k)
    }

    /// Component-wise sum.
    #[inline]
    pub fn add(&self, other: &Vector) -> Vector {
        Self(self.0 + other.0)
    }

    /// `self - other`.
    #[inline]
    pub fn difference(&self, other: &Vector) -> Vector {
        Self(self.0 - other.0)
    }

    /// Euclidean length.
    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.0.norm()
    }

    /// The unit vector pointing the same way.
    ///
    /// Fails with [`GeomError::DegenerateVector`] for a zero-length input;
    /// callers decide what a degenerate direction means for them.
    pub fn unit_length(&self) -> Result<Vector> {
        let m = self.magnitude();
        if m == 0.0 || !m.is_finite() {
            return Err(GeomError::DegenerateVector);
        }
        Ok(self.scale(1.0 / m))
    }

    /// Exact (non-tolerant) zero test.
    pub fn is_zero(&self) -> bool {
        self.0.x == 0.0 && self.0.y == 0.0 && self.0.z == 0.0
    }

    /// Borrow the nalgebra representation.
    pub fn as_vec3(&self) -> &Vec3 {
        &self.0
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.difference(other).magnitude() < WIGGLE_ROOM
    }
}

impl From<Vec3> for Vector {
    fn from(v: Vec3) -> Self {
        Self(v)
    }
}

impl From<[f64; 3]> for Vector {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

impl From<[f32; 3]> for Vector {
    fn from(a: [f32; 3]) -> Self {
        Self::new(a[0] as f64, a[1] as f64, a[2] as f64)
    }
}

impl From<Vector> for Vec3 {
    fn from(v: Vector) -> Self {
        v.0
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{},{}>", self.0.x, self.0.y, self.0.z)
    }
}
