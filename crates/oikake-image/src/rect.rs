//! Axis-aligned rectangles.
//!
//! [`Rect`] is used for pixel regions, on-screen overlay geometry and normalized tracking regions
//! alike. It does not know which coordinate system it lives in; that is up to the user.

use std::fmt;

use approx::{AbsDiffEq, RelativeEq};
use nalgebra::{Point2, Vector2};

use crate::AspectRatio;

/// An axis-aligned rectangle, stored as its minimum corner and its size.
///
/// Width and height may be zero, but never negative.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    origin: Point2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    /// Creates a rectangle from its minimum corner and its size.
    ///
    /// With a top-left origin (pixels, surface points) the minimum corner is the top left one.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is negative.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        assert!(
            !(width < 0.0) && !(height < 0.0),
            "negative rectangle size {width}x{height}"
        );
        Self {
            origin: Point2::new(x, y),
            size: Vector2::new(width, height),
        }
    }

    #[inline]
    pub fn from_center(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(x - width * 0.5, y - height * 0.5, width, height)
    }

    /// Creates the rectangle spanning from `min` to `max`.
    ///
    /// # Panics
    ///
    /// Panics if `max` is smaller than `min` along either axis.
    pub fn from_corners(min: Point2<f32>, max: Point2<f32>) -> Self {
        let size = max - min;
        Self::from_top_left(min.x, min.y, size.x, size.y)
    }

    /// The empty rectangle at the origin.
    #[inline]
    pub fn zero() -> Self {
        Self::from_top_left(0.0, 0.0, 0.0, 0.0)
    }

    /// Centers a rectangle of the given aspect ratio on `self`, growing one side until `self` is
    /// covered.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        let width = self.height() * aspect.as_f32();
        if width >= self.width() {
            self.resize_centered(width, self.height())
        } else {
            self.resize_centered(self.width(), self.width() / aspect.as_f32())
        }
    }

    /// Centers the largest rectangle of the given aspect ratio that fits inside `self` on it.
    #[must_use]
    pub fn shrink_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        let width = self.height() * aspect.as_f32();
        if width <= self.width() {
            self.resize_centered(width, self.height())
        } else {
            self.resize_centered(self.width(), self.width() / aspect.as_f32())
        }
    }

    fn resize_centered(&self, width: f32, height: f32) -> Self {
        let center = self.center();
        Self::from_center(center.x, center.y, width, height)
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.origin.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.origin.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn top_left(&self) -> Point2<f32> {
        self.origin
    }

    #[inline]
    pub fn bottom_right(&self) -> Point2<f32> {
        self.origin + self.size
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.origin + self.size * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Returns whether `self` has zero width or zero height.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.x == 0.0 || self.size.y == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.origin.iter().chain(self.size.iter()).all(|c| c.is_finite())
    }

    /// Moves the rectangle's minimum corner to `(x, y)`, keeping its size.
    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Rect {
        Rect::from_top_left(x, y, self.width(), self.height())
    }

    /// Returns the overlap of `self` and `other`, or [`None`] if they are disjoint.
    ///
    /// Rectangles that only touch along an edge overlap in an empty rectangle.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = self.bottom_right().inf(&other.bottom_right());
        if min.x > max.x || min.y > max.y {
            return None;
        }

        Some(Rect::from_corners(min, max))
    }

    /// Moves and shrinks `self` so that it lies entirely within `bounds`.
    ///
    /// If `self` does not overlap `bounds` at all, the result is an empty rectangle on the edge of
    /// `bounds` closest to `self`.
    #[must_use]
    pub fn clamp_to(&self, bounds: &Rect) -> Rect {
        match self.intersection(bounds) {
            Some(rect) => rect,
            None => {
                let corner = self.top_left().sup(&bounds.top_left());
                let corner = corner.inf(&bounds.bottom_right());
                Rect::from_top_left(corner.x, corner.y, 0.0, 0.0)
            }
        }
    }

    /// Intersection over union of two rectangles, in `[0, 1]`.
    ///
    /// Returns 0 if the union is empty.
    pub fn iou(&self, other: &Self) -> f32 {
        let overlap = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - overlap;
        if union <= 0.0 {
            0.0
        } else {
            overlap / union
        }
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

impl AbsDiffEq for Rect {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.origin.abs_diff_eq(&other.origin, epsilon)
            && self.size.abs_diff_eq(&other.size, epsilon)
    }
}

impl RelativeEq for Rect {
    fn default_max_relative() -> f32 {
        f32::EPSILON
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.origin.relative_eq(&other.origin, epsilon, max_relative)
            && self.size.relative_eq(&other.size, epsilon, max_relative)
    }
}
