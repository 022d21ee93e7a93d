//! Printable models: anything that can produce a layer image at a height.

use dlprint_kernel_math::{BoundingBox, Vector, WIGGLE_ROOM};

use crate::canvas::{Canvas, LayerColor};
use crate::error::{Result, SlicerError};
use crate::mesh::Mesh;
use crate::raster::{LayerRaster, LayerRasterizer};

/// A source of layer images.
///
/// `render_layer` returning `Ok(None)` means there is nothing at or above
/// `z`; the print job ends there.
pub trait Model: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Extent of the model in model units.
    fn bounds(&self) -> BoundingBox;

    /// Render the cross-section at height `z` into a `width × height` image.
    fn render_layer(
        &self,
        z: f64,
        width: usize,
        height: usize,
        color: LayerColor,
    ) -> Result<Option<LayerRaster>>;
}

/// A loaded mesh sliced by scanline rasterization.
#[derive(Debug, Clone)]
pub struct MeshModel {
    name: String,
    mesh: Mesh,
}

impl MeshModel {
    /// Wrap a mesh; empty meshes are refused.
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Result<Self> {
        if mesh.is_empty() {
            return Err(SlicerError::EmptyMesh);
        }
        Ok(Self {
            name: name.into(),
            mesh,
        })
    }

    /// The wrapped mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

impl Model for MeshModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> BoundingBox {
        *self.mesh.bbox()
    }

    fn render_layer(
        &self,
        z: f64,
        width: usize,
        height: usize,
        color: LayerColor,
    ) -> Result<Option<LayerRaster>> {
        match self.mesh.bbox().max() {
            Some(top) if z <= top.z() + WIGGLE_ROOM => {}
            _ => return Ok(None),
        }
        let rasterizer = LayerRasterizer::for_mesh(&self.mesh, width, height, color)?;
        rasterizer.rasterize(&self.mesh, z).map(Some)
    }
}

/// Procedural octahedral support lattice.
///
/// Model units are layers: height `z` draws integer layer `⌊z⌋`. Four
/// struts run out from the center and back, crossed by a hollow diamond
/// ring around the equator. Drawn at 3 pixels per unit about the image
/// center.
#[derive(Debug, Clone, Copy, Default)]
pub struct Octahedron;

impl Octahedron {
    /// Pixels per model unit.
    pub const SCALE: f64 = 3.0;
    /// First layer past the top.
    pub const LAYERS: i64 = 80;

    fn draw(canvas: &mut Canvas, layer: i64, rgb: [u8; 3]) {
        // Struts move outward to the equator, then back in.
        let offset = if layer < 40 { layer } else { Self::LAYERS - layer };
        let offset = offset as f64;
        canvas.rectangle(-offset, 0.0, 10.0, 7.0, rgb);
        canvas.rectangle(offset, 0.0, 10.0, 7.0, rgb);
        canvas.rectangle(0.0, -offset, 7.0, 10.0, rgb);
        canvas.rectangle(0.0, offset, 7.0, 10.0, rgb);
        if (36..43).contains(&layer) {
            canvas.hollow_diamond(0.0, 0.0, 40.0, 7.0, rgb);
        }
    }
}

impl Model for Octahedron {
    fn name(&self) -> &str {
        "octahedron"
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&[
            Vector::new(-45.0, -45.0, 0.0),
            Vector::new(45.0, 45.0, Self::LAYERS as f64),
        ])
    }

    fn render_layer(
        &self,
        z: f64,
        width: usize,
        height: usize,
        color: LayerColor,
    ) -> Result<Option<LayerRaster>> {
        let layer = z.floor();
        if !(0.0..Self::LAYERS as f64).contains(&layer) {
            return Ok(None);
        }
        let mut canvas = Canvas::new(width, height).with_scale(Self::SCALE);
        Self::draw(&mut canvas, layer as i64, color.rgb());
        Ok(Some(LayerRaster {
            canvas,
            truncated_scanlines: 0,
        }))
    }
}

/// Procedural calibration cylinder: a solid disc on every layer.
///
/// Model units are layers, drawn at [`Octahedron::SCALE`] pixels per unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    /// Disc radius in model units.
    pub radius: f64,
    /// Number of layers.
    pub layers: i64,
}

impl Default for Cylinder {
    fn default() -> Self {
        Self {
            radius: 20.0,
            layers: 40,
        }
    }
}

impl Model for Cylinder {
    fn name(&self) -> &str {
        "cylinder"
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&[
            Vector::new(-self.radius, -self.radius, 0.0),
            Vector::new(self.radius, self.radius, self.layers as f64),
        ])
    }

    fn render_layer(
        &self,
        z: f64,
        width: usize,
        height: usize,
        color: LayerColor,
    ) -> Result<Option<LayerRaster>> {
        let layer = z.floor();
        if !(0.0..self.layers as f64).contains(&layer) {
            return Ok(None);
        }
        let mut canvas = Canvas::new(width, height).with_scale(Octahedron::SCALE);
        canvas.circle(0.0, 0.0, self.radius, color.rgb());
        Ok(Some(LayerRaster {
            canvas,
            truncated_scanlines: 0,
        }))
    }
}
