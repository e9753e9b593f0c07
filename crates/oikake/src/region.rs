//! Tracked regions and tracker observations.
//!
//! All regions handled here live in the tracker's normalized coordinate space: the unit square
//! covering the whole frame, with its origin in the *bottom left* corner and Y pointing *up*. A
//! region's [`Rect::x`]/[`Rect::y`] therefore name its lower left corner.

use oikake_image::{Rect, Resolution};
use thiserror::Error;

/// Tolerance for rounding errors when checking that a region lies inside the unit square.
const BOUNDS_EPSILON: f32 = 1e-4;

/// Errors produced when constructing a [`TrackedRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RegionError {
    #[error("region {0:?} has non-finite coordinates")]
    NotFinite(Rect),
    #[error("region {0:?} exceeds the normalized unit square")]
    OutOfBounds(Rect),
}

/// A normalized rectangle describing where the tracked object was last seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedRegion {
    rect: Rect,
}

impl TrackedRegion {
    /// Creates a region from a normalized rectangle.
    ///
    /// The rectangle has to lie inside the unit square. Tiny excursions caused by rounding are
    /// clamped away.
    pub fn new(rect: Rect) -> Result<Self, RegionError> {
        if !rect.is_finite() {
            return Err(RegionError::NotFinite(rect));
        }

        let min = rect.top_left();
        let max = rect.bottom_right();
        let lo = -BOUNDS_EPSILON;
        let hi = 1.0 + BOUNDS_EPSILON;
        if min.x < lo || min.y < lo || max.x > hi || max.y > hi {
            return Err(RegionError::OutOfBounds(rect));
        }

        Ok(Self {
            rect: rect.clamp_to(&unit_square()),
        })
    }

    /// Creates a region from the `x`, `y`, `width` and `height` of a normalized rectangle.
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Result<Self, RegionError> {
        if !(width >= 0.0 && height >= 0.0) {
            return Err(RegionError::OutOfBounds(Rect::from_top_left(x, y, 0.0, 0.0)));
        }
        Self::new(Rect::from_top_left(x, y, width, height))
    }

    /// Creates a region by clamping an arbitrary rectangle into the unit square.
    ///
    /// Parts of `rect` that lie outside of the frame are cut off. A rectangle entirely outside of
    /// the frame results in an empty region on the closest frame edge.
    pub fn clamped(rect: Rect) -> Result<Self, RegionError> {
        if !rect.is_finite() {
            return Err(RegionError::NotFinite(rect));
        }
        Ok(Self {
            rect: rect.clamp_to(&unit_square()),
        })
    }

    /// Creates a region from a rectangle in pixel coordinates of a frame with resolution `res`.
    ///
    /// Pixel coordinates use a top left origin, so the Y axis is flipped.
    pub fn from_pixels(rect: Rect, res: Resolution) -> Result<Self, RegionError> {
        let (w, h) = (res.width() as f32, res.height() as f32);
        Self::clamped(Rect::from_top_left(
            rect.x() / w,
            1.0 - (rect.y() + rect.height()) / h,
            rect.width() / w,
            rect.height() / h,
        ))
    }

    /// Returns the normalized rectangle.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Converts this region to pixel coordinates (top left origin) of a frame with resolution
    /// `res`.
    pub fn to_pixels(&self, res: Resolution) -> Rect {
        let (w, h) = (res.width() as f32, res.height() as f32);
        let r = self.rect;
        Rect::from_top_left(
            r.x() * w,
            (1.0 - r.y() - r.height()) * h,
            r.width() * w,
            r.height() * h,
        )
    }
}

fn unit_square() -> Rect {
    Rect::from_top_left(0.0, 0.0, 1.0, 1.0)
}

/// The result of running the tracker on a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    region: TrackedRegion,
    confidence: f32,
}

impl Observation {
    /// Creates an observation.
    ///
    /// `confidence` is clamped to the range 0.0 to 1.0. NaN is treated as 0.0.
    pub fn new(region: TrackedRegion, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { region, confidence }
    }

    #[inline]
    pub fn region(&self) -> TrackedRegion {
        self.region
    }

    /// Confidence of the tracker that [`Observation::region`] contains the tracked object.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// The region currently being tracked, if any.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Region {
    /// Nothing is tracked: no region has been drawn yet, or it was cleared.
    #[default]
    Absent,
    /// A region is being tracked.
    Present(TrackedRegion),
}

impl Region {
    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Region::Present(_))
    }

    #[inline]
    pub fn get(&self) -> Option<&TrackedRegion> {
        match self {
            Region::Absent => None,
            Region::Present(region) => Some(region),
        }
    }

    /// Clears `self`, returning the previous region.
    pub fn take(&mut self) -> Option<TrackedRegion> {
        match std::mem::take(self) {
            Region::Absent => None,
            Region::Present(region) => Some(region),
        }
    }
}

impl From<TrackedRegion> for Region {
    fn from(region: TrackedRegion) -> Self {
        Region::Present(region)
    }
}

impl From<Option<TrackedRegion>> for Region {
    fn from(region: Option<TrackedRegion>) -> Self {
        region.map_or(Region::Absent, Region::Present)
    }
}
