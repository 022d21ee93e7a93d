#![warn(missing_docs)]

//! Layer slicer for DLP resin printing.
//!
//! Loads binary STL meshes and rasterizes their cross-sections into RGB
//! frames for a projector. Each layer is sampled on a letterboxed grid over
//! the mesh bounds; rays parallel to x collect begin/end crossings and the
//! samples between them are lit.
//!
//! # Example
//!
//! ```ignore
//! use dlprint_slicer::{LayerColor, Mesh, MeshModel, Model};
//!
//! let mesh = Mesh::load("part.stl")?;
//! let model = MeshModel::new("part", mesh)?;
//! if let Some(layer) = model.render_layer(0.5, 1024, 768, LayerColor::Normal)? {
//!     println!("{} pixels lit", layer.canvas.count_marked());
//! }
//! ```

pub mod canvas;
pub mod error;
pub mod mesh;
pub mod model;
pub mod raster;
pub mod stl;

pub use canvas::{Canvas, Frame, LayerColor};
pub use error::{Result, SlicerError, StlError};
pub use mesh::Mesh;
pub use model::{Cylinder, MeshModel, Model, Octahedron};
pub use raster::{
    fill_scanline, fit_aspect, points_at_scanline, rasterize_layer, LayerRaster, LayerRasterizer,
    Run, ScanlineFill,
};
pub use stl::{parse_binary_stl, write_binary_stl};

/// Default projector width in pixels.
pub const DEFAULT_WIDTH: usize = 1024;

/// Default projector height in pixels.
pub const DEFAULT_HEIGHT: usize = 768;
