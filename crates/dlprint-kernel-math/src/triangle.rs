//! Triangles with a precomputed plane equation.
//!
//! The fabrication axis is x: scanlines are rays parallel to x at fixed
//! `(y, z)`, and the sign of a triangle's normal along x tells whether the
//! ray enters or leaves the solid there.

use crate::bbox::BoundingBox;
use crate::vector::{sign, Vector};
use crate::WIGGLE_ROOM;

/// A ray/triangle hit along the fabrication axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// Intersection point.
    pub point: Vector,
    /// Normal of the triangle that was hit.
    pub normal: Vector,
}

impl Crossing {
    /// The ray enters the solid here (normal points against +x).
    #[inline]
    pub fn is_begin(&self) -> bool {
        self.normal.x() < 0.0
    }

    /// The ray leaves the solid here (normal points along +x).
    #[inline]
    pub fn is_end(&self) -> bool {
        self.normal.x() > 0.0
    }
}

/// A triangle with its plane `normal · p = k`, edge vectors and bounding box.
#[derive(Debug, Clone)]
pub struct Triangle {
    vertices: [Vector; 3],
    normal: Vector,
    k: f64,
    /// `v2 - v1`, `v3 - v2`, `v1 - v3`.
    edges: [Vector; 3],
    bbox: BoundingBox,
}

impl Triangle {
    /// Build a triangle from three ordered vertices.
    ///
    /// A missing or zero `normal` is replaced by the right-hand-rule unit
    /// normal `(v2 - v1) × (v3 - v2)`. A degenerate (zero-area) triangle ends
    /// up with a zero normal and never reports an intersection.
    pub fn new(v1: Vector, v2: Vector, v3: Vector, normal: Option<Vector>) -> Self {
        let edges = [v2.difference(&v1), v3.difference(&v2), v1.difference(&v3)];
        let normal = match normal {
            Some(n) if !n.is_zero() => n,
            _ => edges[0]
                .cross(&edges[1])
                .unit_length()
                .unwrap_or_else(|_| Vector::zero()),
        };
        let vertices = [v1, v2, v3];
        Self {
            vertices,
            normal,
            k: normal.dot(&v1),
            edges,
            bbox: BoundingBox::from_points(&vertices),
        }
    }

    /// The three vertices in winding order.
    pub fn vertices(&self) -> &[Vector; 3] {
        &self.vertices
    }

    /// Unit normal (zero for degenerate triangles).
    pub fn normal(&self) -> Vector {
        self.normal
    }

    /// Plane offset `normal · v1`.
    pub fn plane_offset(&self) -> f64 {
        self.k
    }

    /// Axis-aligned bounds of the vertices.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// True when the triangle has no usable normal.
    pub fn is_degenerate(&self) -> bool {
        self.normal.is_zero()
    }

    /// Arithmetic mean of the vertices.
    pub fn centroid(&self) -> Vector {
        self.vertices[0]
            .add(&self.vertices[1])
            .add(&self.vertices[2])
            .scale(1.0 / 3.0)
    }

    /// Point membership: on the plane and inside all three edges.
    ///
    /// The edge test is the same-side test lifted to 3D through the normal,
    /// so it accepts either winding as long as all three signs agree.
    pub fn contains(&self, p: &Vector) -> bool {
        if (self.normal.dot(p) - self.k).abs() >= WIGGLE_ROOM {
            return false;
        }
        let side = |i: usize| {
            let rel = p.difference(&self.vertices[i]);
            sign(self.normal.dot(&self.edges[i].cross(&rel)))
        };
        let (a, b, c) = (side(0), side(1), side(2));
        a == b && b == c
    }

    /// Intersect with the line parallel to x through `(y, z)`.
    ///
    /// Returns `None` when the normal has an exactly zero x component (the
    /// line is parallel to the plane, so axis-aligned vertical faces never
    /// produce crossings) or when the solved point lies outside the triangle.
    pub fn intersect_along_axis(&self, y: f64, z: f64) -> Option<Crossing> {
        let n = self.normal;
        if n.x() == 0.0 {
            return None;
        }
        let x = (self.k - n.y() * y - n.z() * z) / n.x();
        let point = Vector::new(x, y, z);
        if !self.bbox.contains(&point) {
            return None;
        }
        if !self.contains(&point) {
            return None;
        }
        Some(Crossing { point, normal: n })
    }
}

impl PartialEq for Triangle {
    fn eq(&self, other: &Self) -> bool {
        self.normal == other.normal && self.vertices == other.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v(x: f64, y: f64, z: f64) -> Vector {
        Vector::new(x, y, z)
    }

    fn wall() -> Triangle {
        Triangle::new(v(-20.0, -15.0, 0.0), v(-20.0, -15.0, 20.0), v(-20.0, -9.0, 0.0), None)
    }

    #[test]
    fn test_right_hand_normal() {
        let t = wall();
        assert_eq!(t.normal(), v(-1.0, 0.0, 0.0));
        assert_relative_eq!(t.plane_offset(), 20.0);
    }

    #[test]
    fn test_supplied_normal_is_kept() {
        let t = Triangle::new(
            v(-20.0, -15.0, 0.0),
            v(-20.0, -15.0, 20.0),
            v(-20.0, -9.0, 0.0),
            Some(v(-1.0, 0.0, 0.0)),
        );
        assert_eq!(t, wall());
    }

    #[test]
    fn test_zero_normal_is_reconstructed() {
        let t = Triangle::new(
            v(-20.0, -15.0, 0.0),
            v(-20.0, -15.0, 20.0),
            v(-20.0, -9.0, 0.0),
            Some(Vector::zero()),
        );
        assert_eq!(t.normal(), v(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_contains() {
        let t = wall();
        assert!(t.contains(&v(-20.0, -12.0, 5.0)));
        assert!(!t.contains(&v(-20.0, -16.0, 5.0)));
        assert!(!t.contains(&v(-20.0, -12.0, 20.0)));
        // Off the plane.
        assert!(!t.contains(&v(-20.0001, -12.0, 5.0)));
    }

    #[test]
    fn test_contains_is_deterministic_on_edges() {
        let t = wall();
        let on_edge = v(-20.0, -15.0, 10.0);
        let first = t.contains(&on_edge);
        for _ in 0..10 {
            assert_eq!(t.contains(&on_edge), first);
        }
    }

    #[test]
    fn test_contains_either_winding() {
        let a = v(0.0, 0.0, 0.0);
        let b = v(1.0, 0.0, 0.0);
        let c = v(0.0, 1.0, 0.0);
        let p = v(0.25, 0.25, 0.0);
        assert!(Triangle::new(a, b, c, None).contains(&p));
        assert!(Triangle::new(a, c, b, None).contains(&p));
        assert!(!Triangle::new(a, c, b, None).contains(&v(0.75, 0.75, 0.0)));
    }

    #[test]
    fn test_intersect_axis_aligned() {
        let t = Triangle::new(v(1.0, 1.0, 0.0), v(1.0, 0.0, 0.0), v(1.0, 0.0, 1.0), None);
        let hit = t.intersect_along_axis(0.4, 0.4).unwrap();
        assert_eq!(hit.point, v(1.0, 0.4, 0.4));
        assert_eq!(hit.normal, v(-1.0, 0.0, 0.0));
        assert!(hit.is_begin());
        assert!(t.intersect_along_axis(0.6, 0.6).is_none());
    }

    #[test]
    fn test_intersect_slanted() {
        let t = Triangle::new(v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(0.0, 0.0, 1.0), None);
        let hit = t.intersect_along_axis(0.00001, 0.00001).unwrap();
        assert_relative_eq!(hit.point.x(), 0.99998, epsilon = 1e-12);
        assert!(hit.is_end());
        assert_relative_eq!(t.intersect_along_axis(0.2, 0.2).unwrap().point.x(), 0.6, epsilon = 1e-12);
        assert_relative_eq!(t.intersect_along_axis(0.4, 0.4).unwrap().point.x(), 0.2, epsilon = 1e-12);
        assert!(t.intersect_along_axis(0.6, 0.6).is_none());
    }

    #[test]
    fn test_parallel_face_never_intersects() {
        // Normal is -y: the ray runs inside the plane.
        let t = Triangle::new(v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 0.0, 1.0), None);
        assert_eq!(t.normal().x(), 0.0);
        assert!(t.intersect_along_axis(0.0, 0.25).is_none());
    }

    #[test]
    fn test_degenerate_triangle() {
        let t = Triangle::new(v(0.0, 0.0, 0.0), v(1.0, 1.0, 1.0), v(2.0, 2.0, 2.0), None);
        assert!(t.is_degenerate());
        assert!(t.intersect_along_axis(1.0, 1.0).is_none());
    }

    #[test]
    fn test_centroid_round_trip() {
        let triangles = [
            Triangle::new(v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(0.0, 0.0, 1.0), None),
            Triangle::new(v(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0), v(0.0, 1.0, 0.0), None),
            Triangle::new(v(3.0, -1.0, 2.0), v(-2.0, 4.0, 0.5), v(1.5, 2.0, 7.0), None),
            Triangle::new(v(-5.0, 0.0, 0.0), v(5.0, 1.0, 0.0), v(0.0, 0.5, 3.0), None),
        ];
        for t in &triangles {
            assert!(t.normal().x() != 0.0);
            let c = t.centroid();
            let hit = t.intersect_along_axis(c.y(), c.z()).unwrap();
            assert_eq!(hit.point, c);
        }
    }
}
