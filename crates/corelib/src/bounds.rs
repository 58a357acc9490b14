//! Axis-aligned bounds and the camera framing derived from them.

use crate::{CoreError, CoreResult, Vec3};

/// Outward offset of the axes marker, as a fraction of the model size.
pub const AXES_PADDING: f32 = 0.2;

/// Minimal axis-aligned box containing a set of points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bounds of all points. Fails on an empty iterator.
    pub fn from_points<I>(points: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next().ok_or(CoreError::EmptyBounds)?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Ok(Self { min, max })
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest of the three side lengths.
    #[inline]
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }
}

/// Camera placement and helper offsets derived once from model bounds.
///
/// The eye sits on the `(-1, -1, 1)` diagonal at distance `max_size` per
/// axis, so the model is framed the same way regardless of its scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Framing {
    pub eye: Vec3,
    pub target: Vec3,
    pub max_size: f32,
    pub axes_position: Vec3,
}

impl Framing {
    pub fn from_bounds(bounds: &Aabb) -> Self {
        let size = bounds.size();
        let max_size = bounds.max_extent();
        let min = bounds.min;
        Self {
            eye: Vec3::new(-max_size, -max_size, max_size),
            target: bounds.center(),
            max_size,
            axes_position: Vec3::new(
                min.x - AXES_PADDING * size.x,
                min.y - AXES_PADDING * size.y,
                min.z,
            ),
        }
    }
}
