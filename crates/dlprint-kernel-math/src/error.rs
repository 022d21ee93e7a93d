//! Error types for the geometry kernel.

use thiserror::Error;

/// Errors raised by geometric constructors and operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// Attempted to normalize a zero-length vector.
    #[error("cannot normalize a zero-length vector")]
    DegenerateVector,

    /// A minimum corner exceeds the maximum corner on some axis.
    #[error("invalid bounds: min {min:?} exceeds max {max:?}")]
    InvalidBounds {
        /// Requested minimum corner.
        min: [f64; 3],
        /// Requested maximum corner.
        max: [f64; 3],
    },

    /// A resize would shrink the box on at least one axis.
    #[error("cannot shrink bounding box from {current:?} to {requested:?}")]
    Shrink {
        /// Current size.
        current: [f64; 3],
        /// Requested size.
        requested: [f64; 3],
    },

    /// The operation needs a non-empty box.
    #[error("bounding box is empty")]
    EmptyBox,

    /// Axis sampling needs at least two samples.
    #[error("axis sampling needs at least 2 samples, got {0}")]
    InvalidSampleCount(usize),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeomError>;
