//! Triangle meshes loaded from STL.

use std::path::Path;

use dlprint_kernel_math::{BoundingBox, Triangle};

use crate::error::StlError;
use crate::stl::parse_binary_stl;

/// An immutable triangle soup with its bounding box.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    triangles: Vec<Triangle>,
    bbox: BoundingBox,
    preamble: String,
}

impl Mesh {
    /// Build a mesh from triangles, folding their boxes into the mesh box.
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        Self::with_preamble(triangles, String::new())
    }

    /// Build a mesh carrying an STL preamble.
    pub fn with_preamble(triangles: Vec<Triangle>, preamble: String) -> Self {
        let bbox = triangles
            .iter()
            .fold(BoundingBox::empty(), |acc, t| acc.expand(t.bbox()));
        Self {
            triangles,
            bbox,
            preamble,
        }
    }

    /// Read a binary STL file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StlError> {
        let data = std::fs::read(path.as_ref())?;
        parse_binary_stl(&data)
    }

    /// Triangles in file order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Union of all triangle boxes.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// STL preamble with NUL bytes removed.
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// True if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of zero-area facets (they never intersect a scanline).
    pub fn degenerate_count(&self) -> usize {
        self.triangles.iter().filter(|t| t.is_degenerate()).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dlprint_kernel_math::Vector;

    /// Unit corner tetrahedron with outward normals.
    pub(crate) fn tetrahedron() -> Mesh {
        let a = Vector::new(0.0, 0.0, 0.0);
        let b = Vector::new(1.0, 0.0, 0.0);
        let c = Vector::new(0.0, 1.0, 0.0);
        let d = Vector::new(0.0, 0.0, 1.0);
        Mesh::with_preamble(
            vec![
                Triangle::new(a, b, d, None),
                Triangle::new(a, c, b, None),
                Triangle::new(a, d, c, None),
                Triangle::new(b, c, d, None),
            ],
            "tetrahedron".into(),
        )
    }

    /// Closed axis-aligned box built from 12 outward-facing triangles.
    pub(crate) fn cuboid(min: [f64; 3], max: [f64; 3]) -> Mesh {
        let p = |i: usize| {
            Vector::new(
                if i & 1 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 4 == 0 { min[2] } else { max[2] },
            )
        };
        // Each face as a counter-clockwise quad seen from outside.
        let quads = [
            [0, 4, 6, 2], // -x
            [1, 3, 7, 5], // +x
            [0, 1, 5, 4], // -y
            [2, 6, 7, 3], // +y
            [0, 2, 3, 1], // -z
            [4, 5, 7, 6], // +z
        ];
        let mut tris = Vec::new();
        for q in quads {
            tris.push(Triangle::new(p(q[0]), p(q[1]), p(q[2]), None));
            tris.push(Triangle::new(p(q[0]), p(q[2]), p(q[3]), None));
        }
        Mesh::from_triangles(tris)
    }

    #[test]
    fn test_tetrahedron_normals_point_outward() {
        let mesh = tetrahedron();
        let n: Vec<Vector> = mesh.triangles().iter().map(|t| t.normal()).collect();
        let s = (1.0f64 / 3.0).sqrt();
        assert_eq!(n[0], Vector::new(0.0, -1.0, 0.0));
        assert_eq!(n[1], Vector::new(0.0, 0.0, -1.0));
        assert_eq!(n[2], Vector::new(-1.0, 0.0, 0.0));
        assert_eq!(n[3], Vector::new(s, s, s));
    }

    #[test]
    fn test_bbox_is_union() {
        let mesh = tetrahedron();
        assert_eq!(mesh.bbox().min(), Some(Vector::new(0.0, 0.0, 0.0)));
        assert_eq!(mesh.bbox().max(), Some(Vector::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_cuboid_normals_point_outward() {
        let mesh = cuboid([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let center = Vector::new(1.0, 1.0, 1.0);
        for t in mesh.triangles() {
            let out = t.centroid().difference(&center);
            assert!(t.normal().dot(&out) > 0.0);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Mesh::load("/nonexistent/dlprint/model.stl").unwrap_err();
        assert!(matches!(err, StlError::Io(_)));
    }
}
