//! Axis-aligned bounding boxes with tolerant containment.
//!
//! Used both as the per-triangle broadphase filter for scanline queries and
//! as the sampling domain that fixes raster resolution independently of the
//! model's scale.

use crate::error::{GeomError, Result};
use crate::vector::Vector;
use crate::WIGGLE_ROOM;

/// Axis-aligned bounding box, possibly empty.
///
/// An empty box contains nothing and is the identity for [`expand`].
///
/// [`expand`]: BoundingBox::expand
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    bounds: Option<(Vector, Vector)>,
}

/// Open-interval membership on bounds pushed outward by [`WIGGLE_ROOM`].
#[inline]
fn within(v: f64, lo: f64, hi: f64) -> bool {
    lo - WIGGLE_ROOM < v && v < hi + WIGGLE_ROOM
}

impl BoundingBox {
    /// Create a box from its minimum and maximum corners.
    pub fn new(min: Vector, max: Vector) -> Result<Self> {
        if min.x() > max.x() || min.y() > max.y() || min.z() > max.z() {
            return Err(GeomError::InvalidBounds {
                min: min.to_array(),
                max: max.to_array(),
            });
        }
        Ok(Self {
            bounds: Some((min, max)),
        })
    }

    /// The empty box.
    pub fn empty() -> Self {
        Self { bounds: None }
    }

    /// Smallest box holding every point, or the empty box for no points.
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Vector>,
    {
        let mut bounds: Option<([f64; 3], [f64; 3])> = None;
        for p in points {
            let p = p.to_array();
            bounds = Some(match bounds {
                None => (p, p),
                Some((mut lo, mut hi)) => {
                    for i in 0..3 {
                        lo[i] = lo[i].min(p[i]);
                        hi[i] = hi[i].max(p[i]);
                    }
                    (lo, hi)
                }
            });
        }
        Self {
            bounds: bounds.map(|(lo, hi)| (Vector::from(lo), Vector::from(hi))),
        }
    }

    /// True for the empty box.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Minimum corner.
    pub fn min(&self) -> Option<Vector> {
        self.bounds.map(|(min, _)| min)
    }

    /// Maximum corner.
    pub fn max(&self) -> Option<Vector> {
        self.bounds.map(|(_, max)| max)
    }

    /// Edge lengths along each axis.
    pub fn size(&self) -> Option<Vector> {
        self.bounds.map(|(min, max)| max.difference(&min))
    }

    /// Center point.
    pub fn center(&self) -> Option<Vector> {
        self.bounds.map(|(min, max)| min.add(&max).scale(0.5))
    }

    /// Tolerant membership on the x axis.
    pub fn contains_x(&self, x: f64) -> bool {
        self.bounds
            .is_some_and(|(min, max)| within(x, min.x(), max.x()))
    }

    /// Tolerant membership on the y axis.
    pub fn contains_y(&self, y: f64) -> bool {
        self.bounds
            .is_some_and(|(min, max)| within(y, min.y(), max.y()))
    }

    /// Tolerant membership on the z axis.
    pub fn contains_z(&self, z: f64) -> bool {
        self.bounds
            .is_some_and(|(min, max)| within(z, min.z(), max.z()))
    }

    /// Tolerant membership of the box's projection onto the yz plane.
    ///
    /// This is the cull test for a scanline running along x.
    pub fn contains_yz(&self, y: f64, z: f64) -> bool {
        self.bounds.is_some_and(|(min, max)| {
            within(y, min.y(), max.y()) && within(z, min.z(), max.z())
        })
    }

    /// Tolerant point membership.
    pub fn contains(&self, p: &Vector) -> bool {
        self.contains_x(p.x()) && self.contains_y(p.y()) && self.contains_z(p.z())
    }

    /// Union of two boxes.
    pub fn expand(&self, other: &BoundingBox) -> BoundingBox {
        match (self.bounds, other.bounds) {
            (None, _) => *other,
            (_, None) => *self,
            (Some((amin, amax)), Some((bmin, bmax))) => BoundingBox {
                bounds: Some((
                    Vector::new(
                        amin.x().min(bmin.x()),
                        amin.y().min(bmin.y()),
                        amin.z().min(bmin.z()),
                    ),
                    Vector::new(
                        amax.x().max(bmax.x()),
                        amax.y().max(bmax.y()),
                        amax.z().max(bmax.z()),
                    ),
                )),
            },
        }
    }

    /// Grow the box to `new_size`, keeping its center fixed.
    ///
    /// Every component of `new_size` must be at least the current size.
    pub fn set_size(&mut self, new_size: Vector) -> Result<()> {
        let (min, max) = self.bounds.ok_or(GeomError::EmptyBox)?;
        let current = max.difference(&min);
        let pad = new_size.difference(&current).scale(0.5);
        if pad.x() < 0.0 || pad.y() < 0.0 || pad.z() < 0.0 {
            return Err(GeomError::Shrink {
                current: current.to_array(),
                requested: new_size.to_array(),
            });
        }
        self.bounds = Some((min.difference(&pad), max.add(&pad)));
        Ok(())
    }

    /// `count` evenly spaced samples from `min` to `max` inclusive.
    pub fn axis_samples(min: f64, max: f64, count: usize) -> Result<AxisSamples> {
        if count < 2 {
            return Err(GeomError::InvalidSampleCount(count));
        }
        if max < min {
            return Err(GeomError::InvalidBounds {
                min: [min, 0.0, 0.0],
                max: [max, 0.0, 0.0],
            });
        }
        Ok(AxisSamples {
            min,
            max,
            step: (max - min) / (count - 1) as f64,
            count,
            next: 0,
        })
    }

    /// Samples spanning the x extent; empty for the empty box.
    pub fn x_samples(&self, count: usize) -> Result<AxisSamples> {
        self.samples_along(count, |v| v.x())
    }

    /// Samples spanning the y extent; empty for the empty box.
    pub fn y_samples(&self, count: usize) -> Result<AxisSamples> {
        self.samples_along(count, |v| v.y())
    }

    /// Samples spanning the z extent; empty for the empty box.
    pub fn z_samples(&self, count: usize) -> Result<AxisSamples> {
        self.samples_along(count, |v| v.z())
    }

    fn samples_along(&self, count: usize, axis: impl Fn(&Vector) -> f64) -> Result<AxisSamples> {
        match self.bounds {
            Some((min, max)) => Self::axis_samples(axis(&min), axis(&max), count),
            None => Ok(AxisSamples::none()),
        }
    }
}

/// Lazy, restartable sequence of evenly spaced samples along one axis.
///
/// Clone it to iterate again from the start.
#[derive(Debug, Clone)]
pub struct AxisSamples {
    min: f64,
    max: f64,
    step: f64,
    count: usize,
    next: usize,
}

impl AxisSamples {
    fn none() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            step: 0.0,
            count: 0,
            next: 0,
        }
    }

    /// Distance between consecutive samples.
    pub fn step(&self) -> f64 {
        self.step
    }
}

impl Iterator for AxisSamples {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next >= self.count {
            return None;
        }
        let i = self.next;
        self.next += 1;
        // Pin the last sample so the range is inclusive despite rounding.
        if i + 1 == self.count {
            Some(self.max)
        } else {
            Some(self.min + self.step * i as f64)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for AxisSamples {}
