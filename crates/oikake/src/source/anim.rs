//! Animated images.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    time::Duration,
};

use anyhow::bail;
use image::{
    codecs::{gif::GifDecoder, png::PngDecoder},
    AnimationDecoder, RgbaImage,
};
use oikake_image::Resolution;

use crate::frame::Frame;

use super::FrameSource;

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum AnimationFormat {
    Gif,
    Apng,
}

/// A timed sequence of images, played back as a [`FrameSource`].
///
/// Frames are timestamped with the sum of the display durations of all frames before them.
pub struct Animation {
    frames: Vec<(RgbaImage, Duration)>,
    resolution: Resolution,
    next: usize,
    elapsed: Duration,
    looping: bool,
    index: u64,
}

impl Animation {
    /// Loads an animation from the filesystem.
    ///
    /// The path must have a supported extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) => {
                let format = if ext == "gif" {
                    AnimationFormat::Gif
                } else if ext == "apng" || ext == "png" {
                    AnimationFormat::Apng
                } else {
                    bail!(
                        "file extension `{}` is not supported for animations",
                        ext.to_string_lossy()
                    );
                };

                Self::from_reader(BufReader::new(File::open(path)?), format)
            }
            _ => bail!("animation path must have a supported extension"),
        }
    }

    /// Loads an animation from an in-memory byte slice.
    pub fn from_data(data: &[u8], format: AnimationFormat) -> anyhow::Result<Self> {
        Self::from_reader(data, format)
    }

    /// Loads an animation from a [`BufRead`] implementor.
    pub fn from_reader<R: BufRead>(mut reader: R, format: AnimationFormat) -> anyhow::Result<Self> {
        Self::from_reader_impl(&mut reader, format)
    }

    fn from_reader_impl(reader: &mut dyn BufRead, format: AnimationFormat) -> anyhow::Result<Self> {
        let frames = match format {
            AnimationFormat::Gif => GifDecoder::new(reader)?.into_frames(),
            AnimationFormat::Apng => {
                let dec = PngDecoder::new(reader)?;
                if !dec.is_apng() {
                    bail!("attempted to load APNG animation from still image PNG");
                }
                dec.apng().into_frames()
            }
        };

        let frames = frames
            .map(|res| {
                let frame = res?;
                let dur = Duration::from(frame.delay());
                Ok((frame.into_buffer(), dur))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Self::from_frames(frames)
    }

    /// Creates an animation from decoded images and their display durations.
    ///
    /// All images must have the same size, and there has to be at least one.
    pub fn from_frames<I>(frames: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (RgbaImage, Duration)>,
    {
        let frames = frames.into_iter().collect::<Vec<_>>();
        let Some((first, _)) = frames.first() else {
            bail!("animation does not contain any frames");
        };
        let resolution = Resolution::new(first.width(), first.height());
        if let Some(pos) = frames
            .iter()
            .position(|(image, _)| image.dimensions() != first.dimensions())
        {
            bail!(
                "animation frame {pos} is {}x{}, but the first frame is {resolution}",
                frames[pos].0.width(),
                frames[pos].0.height(),
            );
        }

        log::debug!("loaded {resolution} animation with {} frames", frames.len());

        Ok(Self {
            frames,
            resolution,
            next: 0,
            elapsed: Duration::ZERO,
            looping: false,
            index: 0,
        })
    }

    /// Sets whether playback restarts from the first frame after the last one.
    ///
    /// Frame indices and timestamps keep increasing across loops.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Returns the number of distinct frames in the animation.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for Animation {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        if self.next == self.frames.len() {
            if !self.looping {
                return Ok(None);
            }
            self.next = 0;
        }

        let (image, duration) = &self.frames[self.next];
        let frame = Frame::new(image.clone(), self.index, self.elapsed);
        self.elapsed += *duration;
        self.next += 1;
        self.index += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}
