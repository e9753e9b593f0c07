//! Frame sources.
//!
//! A [`FrameSource`] yields the frames the tracking loop runs on, one at a time and in order.

mod anim;
mod sequence;
mod synthetic;

pub use anim::{Animation, AnimationFormat};
pub use sequence::ImageSequence;
pub use synthetic::SyntheticScene;

use oikake_image::Resolution;

use crate::frame::Frame;

/// A source of consecutive [`Frame`]s.
pub trait FrameSource {
    /// Returns the next frame, or [`None`] once the source is exhausted.
    ///
    /// May block until a frame is available.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;

    /// Returns the resolution of the frames yielded by this source.
    fn resolution(&self) -> Resolution;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }
}
