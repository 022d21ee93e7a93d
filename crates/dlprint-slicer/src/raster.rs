//! Scanline rasterization of mesh cross-sections.
//!
//! A layer at height `z` is sampled on a `width × height` grid over the
//! mesh's letterboxed bounding box. For each grid row a ray parallel to x
//! is cast through `(y, z)`; the crossings it collects, sorted by x, pair up
//! into begin/end runs and every sample inside a run is marked.

use dlprint_kernel_math::{BoundingBox, Crossing, GeomError, Vector};
use tracing::{debug, trace};

use crate::canvas::{Canvas, LayerColor};
use crate::error::{Result, SlicerError};
use crate::mesh::Mesh;

/// A closed interval `[start, end]` of solid material along a scanline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    /// x of the begin crossing.
    pub start: f64,
    /// x of the end crossing.
    pub end: f64,
}

/// Solid runs along one scanline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanlineFill {
    /// Runs in ascending x.
    pub runs: Vec<Run>,
    /// The crossings did not pair up; everything after the first bad pair
    /// was dropped.
    pub truncated: bool,
}

impl ScanlineFill {
    /// Whether `x` lies inside any run (bounds inclusive).
    pub fn is_marked(&self, x: f64) -> bool {
        self.runs.iter().any(|r| r.start <= x && x <= r.end)
    }
}

/// One rasterized layer.
#[derive(Debug, Clone)]
pub struct LayerRaster {
    /// The image; row 0 is the lowest sampled y.
    pub canvas: Canvas,
    /// Scanlines whose crossings did not pair up.
    pub truncated_scanlines: usize,
}

/// All crossings of the ray through `(y, z)` parallel to x, ascending in x.
///
/// Triangles whose box misses `(y, z)` are culled before intersecting. The
/// sort is stable, so ties keep mesh order.
pub fn points_at_scanline(mesh: &Mesh, y: f64, z: f64) -> Vec<Crossing> {
    let mut points: Vec<Crossing> = mesh
        .triangles()
        .iter()
        .filter(|t| t.bbox().contains_yz(y, z))
        .filter_map(|t| t.intersect_along_axis(y, z))
        .collect();
    points.sort_by(|a, b| a.point.x().total_cmp(&b.point.x()));
    points
}

/// Pair sorted crossings into runs.
///
/// Pairs `(j, j+1)` are taken in order; a pair counts only when it is a
/// begin followed by an end. The first pair that is not, or a trailing
/// unpaired crossing, marks the scanline truncated and stops it.
pub fn fill_scanline(points: &[Crossing]) -> ScanlineFill {
    let mut fill = ScanlineFill::default();
    for pair in points.chunks(2) {
        match pair {
            [a, b] if a.is_begin() && b.is_end() => fill.runs.push(Run {
                start: a.point.x(),
                end: b.point.x(),
            }),
            _ => {
                fill.truncated = true;
                break;
            }
        }
    }
    fill
}

/// Grow `bbox` so that its y:x size ratio matches `height:width`.
///
/// Only the under-filled axis is padded, symmetrically about the center.
pub fn fit_aspect(bbox: &BoundingBox, width: usize, height: usize) -> Result<BoundingBox> {
    check_frame_size(width, height)?;
    let size = bbox.size().ok_or(GeomError::EmptyBox)?;
    let desired = height as f64 / width as f64;

    let (sx, sy) = if size.y() < desired * size.x() {
        (size.x(), (desired * size.x()).max(size.y()))
    } else {
        ((size.y() / desired).max(size.x()), size.y())
    };

    let mut fitted = *bbox;
    fitted.set_size(Vector::new(sx, sy, size.z()))?;
    Ok(fitted)
}

/// Rasterize the cross-section of `mesh` at height `z`.
///
/// `bbox` is the sampling window (normally the output of [`fit_aspect`]);
/// it gets `height` rows and `width` columns of samples, endpoints included.
pub fn rasterize_layer(
    mesh: &Mesh,
    z: f64,
    width: usize,
    height: usize,
    bbox: &BoundingBox,
    color: LayerColor,
) -> Result<LayerRaster> {
    check_frame_size(width, height)?;
    let rgb = color.rgb();
    let mut canvas = Canvas::new(width, height);
    let mut truncated_scanlines = 0;

    let xs = bbox.x_samples(width)?;
    for (row, y) in bbox.y_samples(height)?.enumerate() {
        let points = points_at_scanline(mesh, y, z);
        let fill = fill_scanline(&points);
        if fill.truncated {
            truncated_scanlines += 1;
            trace!(y, z, crossings = points.len(), "non-manifold scanline truncated");
        }
        if fill.runs.is_empty() {
            continue;
        }
        for (col, x) in xs.clone().enumerate() {
            if fill.is_marked(x) {
                canvas.set_pixel(col, row, rgb);
            }
        }
    }

    if truncated_scanlines > 0 {
        debug!(z, truncated_scanlines, "layer has unpaired crossings");
    }
    Ok(LayerRaster {
        canvas,
        truncated_scanlines,
    })
}

/// Rasterizes layers of one mesh at a fixed resolution and color.
#[derive(Debug, Clone)]
pub struct LayerRasterizer {
    width: usize,
    height: usize,
    color: LayerColor,
    window: BoundingBox,
}

impl LayerRasterizer {
    /// Letterbox `mesh`'s box to `width × height`.
    pub fn for_mesh(mesh: &Mesh, width: usize, height: usize, color: LayerColor) -> Result<Self> {
        if mesh.is_empty() {
            return Err(SlicerError::EmptyMesh);
        }
        Ok(Self {
            width,
            height,
            color,
            window: fit_aspect(mesh.bbox(), width, height)?,
        })
    }

    /// Sampling window after letterboxing.
    pub fn window(&self) -> &BoundingBox {
        &self.window
    }

    /// Rasterize the layer at `z`.
    pub fn rasterize(&self, mesh: &Mesh, z: f64) -> Result<LayerRaster> {
        rasterize_layer(mesh, z, self.width, self.height, &self.window, self.color)
    }
}

fn check_frame_size(width: usize, height: usize) -> Result<()> {
    if width < 2 || height < 2 {
        return Err(SlicerError::InvalidFrameSize { width, height });
    }
    Ok(())
}
