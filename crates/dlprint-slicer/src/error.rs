//! Error types for STL loading and slicing.

use dlprint_kernel_math::GeomError;
use thiserror::Error;

/// Errors raised while reading a binary STL file.
#[derive(Error, Debug)]
pub enum StlError {
    /// The input is not a binary STL this reader understands.
    #[error("unsupported STL: {0}")]
    Unsupported(String),

    /// The input ended before the declared data.
    #[error("truncated STL: {0}")]
    Truncated(String),

    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while slicing.
#[derive(Error, Debug)]
pub enum SlicerError {
    /// Failed to load the mesh.
    #[error(transparent)]
    Stl(#[from] StlError),

    /// The mesh has no triangles.
    #[error("empty mesh: nothing to slice")]
    EmptyMesh,

    /// Frame dimensions are unusable.
    #[error("invalid frame size {width}x{height}: both sides need at least 2 pixels")]
    InvalidFrameSize {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },

    /// A geometric operation failed.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeomError),
}

/// Result type for slicer operations.
pub type Result<T> = std::result::Result<T, SlicerError>;
