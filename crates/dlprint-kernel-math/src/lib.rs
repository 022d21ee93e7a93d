#![warn(missing_docs)]

//! Geometry kernel for the dlprint slicer.
//!
//! Thin wrappers around nalgebra providing the types the rasterizer needs:
//! an epsilon-comparable [`Vector`], an axis-aligned [`BoundingBox`] with
//! evenly spaced sample iterators, and a [`Triangle`] with a precomputed
//! plane equation that can be intersected with rays along the fabrication
//! axis.

pub mod bbox;
pub mod error;
pub mod triangle;
pub mod vector;

pub use bbox::{AxisSamples, BoundingBox};
pub use error::{GeomError, Result};
pub use triangle::{Crossing, Triangle};
pub use vector::{sign, Vec3, Vector};

/// Absolute tolerance used for every geometric equality and containment test.
///
/// Absorbs the floating-point noise of the ray/plane solve.
pub const WIGGLE_ROOM: f64 = 1.0e-10;
