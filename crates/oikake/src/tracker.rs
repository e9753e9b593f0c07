//! The single-object tracker interface.

mod template;

pub use template::TemplateTracker;

use oikake_image::Rect;
use thiserror::Error;

use crate::{
    frame::Frame,
    region::{Observation, TrackedRegion},
};

/// Speed/robustness trade-off of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingLevel {
    /// Cheaper, less robust tracking.
    Fast,
    /// Slower, but copes better with fast motion and appearance changes.
    #[default]
    Accurate,
}

/// A tracker failed to produce an [`Observation`] for a frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("region {0:?} is too small to track")]
    RegionTooSmall(Rect),
    #[error("region {0:?} lies outside of the frame")]
    OutsideFrame(Rect),
    #[error("{0}")]
    Other(String),
}

/// A single-object tracker.
///
/// Given where the object was last seen and a new frame, a tracker estimates where the object is
/// now, and how confident it is about that estimate.
///
/// Implementations may keep state between invocations (eg. an appearance model), but must
/// handle the seed jumping to a completely different place: that happens whenever the user draws
/// a new region.
pub trait Tracker {
    fn track(&mut self, seed: &TrackedRegion, frame: &Frame) -> Result<Observation, TrackError>;
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn track(&mut self, seed: &TrackedRegion, frame: &Frame) -> Result<Observation, TrackError> {
        (**self).track(seed, frame)
    }
}

impl<T: Tracker + ?Sized> Tracker for &mut T {
    fn track(&mut self, seed: &TrackedRegion, frame: &Frame) -> Result<Observation, TrackError> {
        (**self).track(seed, frame)
    }
}

/// Creates a [`Tracker`] from a closure.
pub fn from_fn<F>(f: F) -> FnTracker<F>
where
    F: FnMut(&TrackedRegion, &Frame) -> Result<Observation, TrackError>,
{
    FnTracker(f)
}

/// A [`Tracker`] backed by a closure. Returned by [`from_fn`].
pub struct FnTracker<F>(F);

impl<F> Tracker for FnTracker<F>
where
    F: FnMut(&TrackedRegion, &Frame) -> Result<Observation, TrackError>,
{
    fn track(&mut self, seed: &TrackedRegion, frame: &Frame) -> Result<Observation, TrackError> {
        (self.0)(seed, frame)
    }
}
