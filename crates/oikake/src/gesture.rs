//! Drag gestures used to draw the initial tracking box.

use nalgebra::Point2;
use oikake_image::Rect;
use thiserror::Error;

use crate::region::RegionError;

/// State of a continuous gesture, as reported by the host's gesture recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    /// The recognizer has not recognized a gesture yet.
    Possible,
    Began,
    Changed,
    Ended,
    Cancelled,
    Failed,
}

/// A single update of a drag gesture, with its location in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub phase: GesturePhase,
    pub location: Point2<f32>,
}

impl GestureEvent {
    pub fn new(phase: GesturePhase, x: f32, y: f32) -> Self {
        Self {
            phase,
            location: Point2::new(x, y),
        }
    }

    pub fn began(x: f32, y: f32) -> Self {
        Self::new(GesturePhase::Began, x, y)
    }

    pub fn changed(x: f32, y: f32) -> Self {
        Self::new(GesturePhase::Changed, x, y)
    }

    pub fn ended(x: f32, y: f32) -> Self {
        Self::new(GesturePhase::Ended, x, y)
    }
}

/// Errors caused by gesture events that cannot be applied.
///
/// None of these are fatal; the offending event is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GestureError {
    #[error("unexpected gesture phase {0:?}")]
    UnrecognizedPhase(GesturePhase),
    #[error("drag update received without a preceding drag start")]
    NoAnchor,
    #[error("gesture location {0:?} is not finite")]
    InvalidLocation(Point2<f32>),
    #[error("drawn rectangle cannot be tracked: {0}")]
    Region(#[from] RegionError),
}

/// Controls how the rectangle between the drag anchor and the current touch location is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragRectMode {
    /// The anchor is always the rectangle's top left corner, and its size is the absolute
    /// distance travelled along each axis.
    ///
    /// Dragging up or left therefore grows the rectangle down and right, mirrored at the anchor.
    #[default]
    Anchored,
    /// The rectangle spans the anchor and the touch location, whichever way the drag goes.
    Spanning,
}

/// Computes the overlay rectangle for a drag from `anchor` to `point`.
pub fn drag_rect(anchor: Point2<f32>, point: Point2<f32>, mode: DragRectMode) -> Rect {
    let delta = point - anchor;
    match mode {
        DragRectMode::Anchored => {
            Rect::from_top_left(anchor.x, anchor.y, delta.x.abs(), delta.y.abs())
        }
        DragRectMode::Spanning => Rect::from_top_left(
            anchor.x.min(point.x),
            anchor.y.min(point.y),
            delta.x.abs(),
            delta.y.abs(),
        ),
    }
}
