//! Camera frames.

use std::{sync::Arc, time::Duration};

use oikake_image::{Resolution, RgbaImage};

/// A single frame delivered by a [`FrameSource`][crate::source::FrameSource].
///
/// Cloning a [`Frame`] is cheap: the pixel data is shared.
#[derive(Clone)]
pub struct Frame {
    image: Arc<RgbaImage>,
    index: u64,
    timestamp: Duration,
}

impl Frame {
    pub fn new(image: RgbaImage, index: u64, timestamp: Duration) -> Self {
        Self {
            image: Arc::new(image),
            index,
            timestamp,
        }
    }

    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Returns the pixel dimensions of the frame.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// Returns the sequence number of this frame within its source.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns the capture time of this frame, relative to the start of its source.
    #[inline]
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Creates a writable copy of the pixel data, eg. for drawing an overlay onto.
    pub fn to_image(&self) -> RgbaImage {
        (*self.image).clone()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("resolution", &self.resolution())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
