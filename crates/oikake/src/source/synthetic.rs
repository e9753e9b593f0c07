use std::time::Duration;

use image::{imageops, Rgba, RgbaImage};
use nalgebra::{Point2, Vector2};
use oikake_image::{Rect, Resolution};

use crate::{frame::Frame, region::TrackedRegion};

use super::FrameSource;

/// Side length of the uniformly colored cells that make up the target's texture.
const CELL_SIZE: u32 = 6;

/// A generated scene: a textured square bouncing around on a noisy background.
///
/// Scenes are deterministic for a given seed, and know where their target is in every frame,
/// which makes them useful for testing and demonstrating trackers.
pub struct SyntheticScene {
    resolution: Resolution,
    background: RgbaImage,
    texture: RgbaImage,
    start: Point2<f32>,
    velocity: Vector2<f32>,
    frame_interval: Duration,
    len: Option<u64>,
    next: u64,
    seed: u64,
}

impl SyntheticScene {
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

    /// Creates an endless scene of the given resolution.
    ///
    /// The target starts out in the center, with a side length of a quarter of the shorter frame
    /// dimension.
    pub fn new(resolution: Resolution, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let background = RgbaImage::from_fn(resolution.width(), resolution.height(), |_, _| {
            let v = rng.u8(64..=192);
            Rgba([v, v, v, 255])
        });

        let side = (resolution.width().min(resolution.height()) / 4).max(1);
        let mut this = Self {
            resolution,
            background,
            texture: RgbaImage::new(1, 1),
            start: Point2::origin(),
            velocity: Vector2::new(2.0, 1.5),
            frame_interval: Self::DEFAULT_FRAME_INTERVAL,
            len: None,
            next: 0,
            seed,
        };
        this = this.target_size(side, side);
        let (w, h) = this.texture.dimensions();
        this.start(
            (resolution.width().saturating_sub(w) / 2) as f32,
            (resolution.height().saturating_sub(h) / 2) as f32,
        )
    }

    /// Sets the size of the target, in pixels.
    ///
    /// # Panics
    ///
    /// Panics if the target would be empty or not fit inside the frame.
    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        assert!(
            width > 0
                && height > 0
                && width <= self.resolution.width()
                && height <= self.resolution.height(),
            "target size {width}x{height} does not fit in {}",
            self.resolution,
        );

        // Derived from the scene seed, so the texture doesn't depend on the call order.
        let mut rng = fastrand::Rng::with_seed(self.seed.wrapping_add(1));
        let cols = (width + CELL_SIZE - 1) / CELL_SIZE;
        let rows = (height + CELL_SIZE - 1) / CELL_SIZE;
        let cells = (0..cols * rows)
            .map(|_| [rng.u8(..), rng.u8(..), rng.u8(..)])
            .collect::<Vec<_>>();
        self.texture = RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = cells[((y / CELL_SIZE) * cols + x / CELL_SIZE) as usize];
            Rgba([r, g, b, 255])
        });
        self
    }

    /// Sets the position of the target's top left corner in the first frame.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is not finite.
    pub fn start(mut self, x: f32, y: f32) -> Self {
        assert!(x.is_finite() && y.is_finite(), "non-finite start position");
        self.start = Point2::new(x, y);
        self
    }

    /// Sets the distance the target moves between two frames, in pixels.
    ///
    /// The target bounces off the frame edges.
    ///
    /// # Panics
    ///
    /// Panics if `dx` or `dy` is not finite.
    pub fn velocity(mut self, dx: f32, dy: f32) -> Self {
        assert!(dx.is_finite() && dy.is_finite(), "non-finite velocity");
        self.velocity = Vector2::new(dx, dy);
        self
    }

    /// Limits the scene to `count` frames.
    pub fn frames(mut self, count: u64) -> Self {
        self.len = Some(count);
        self
    }

    /// Sets the time between two consecutive frames.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Returns the pixel rectangle covered by the target in frame number `index`.
    pub fn target_rect(&self, index: u64) -> Rect {
        let (w, h) = self.texture.dimensions();
        let pos = self.start + self.velocity * index as f32;
        let max_x = (self.resolution.width() - w) as f32;
        let max_y = (self.resolution.height() - h) as f32;
        Rect::from_top_left(
            bounce(pos.x, max_x).round(),
            bounce(pos.y, max_y).round(),
            w as f32,
            h as f32,
        )
    }

    /// Returns the normalized region covered by the target in frame number `index`.
    pub fn target_region(&self, index: u64) -> TrackedRegion {
        TrackedRegion::from_pixels(self.target_rect(index), self.resolution)
            .expect("scene geometry is always finite")
    }

    /// Renders frame number `index`.
    pub fn render(&self, index: u64) -> RgbaImage {
        let rect = self.target_rect(index);
        let mut image = self.background.clone();
        imageops::replace(&mut image, &self.texture, rect.x() as i64, rect.y() as i64);
        image
    }

    /// Renders frame number `index` as a [`Frame`].
    pub fn frame(&self, index: u64) -> Frame {
        Frame::new(
            self.render(index),
            index,
            self.frame_interval * index as u32,
        )
    }
}

impl FrameSource for SyntheticScene {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        if self.len.map_or(false, |len| self.next >= len) {
            return Ok(None);
        }
        let frame = self.frame(self.next);
        self.next += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Reflects `pos` back and forth between 0 and `max`.
fn bounce(pos: f32, max: f32) -> f32 {
    if max <= 0.0 {
        return 0.0;
    }
    let period = 2.0 * max;
    let pos = pos.rem_euclid(period);
    if pos > max {
        period - pos
    } else {
        pos
    }
}
