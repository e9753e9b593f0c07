//! The tracking overlay and the [`Renderer`] trait that displays it.

use std::sync::{Arc, Mutex};

use oikake_image::{draw, Color, Rect, RgbaImage};

/// Visual style of the tracking overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayStyle {
    /// The tracker is confident about the displayed region (or the user just drew it).
    #[default]
    Confident,
    /// The last observation fell below the confidence threshold.
    LowConfidence,
}

impl OverlayStyle {
    pub const BORDER_WIDTH: u32 = 2;
    pub const CORNER_RADIUS: u32 = 6;

    pub fn border_color(&self) -> Color {
        match self {
            OverlayStyle::Confident => Color::GREEN,
            OverlayStyle::LowConfidence => Color::GRAY,
        }
    }

    pub fn fill_color(&self) -> Color {
        match self {
            OverlayStyle::Confident => Color::GREEN.with_opacity(0.2),
            OverlayStyle::LowConfidence => Color::WHITE.with_opacity(0.2),
        }
    }
}

/// The highlight rectangle shown on top of the camera preview, in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub rect: Rect,
    pub style: OverlayStyle,
}

impl Overlay {
    /// The zero-size overlay at the origin, in confident style.
    pub fn hidden() -> Self {
        Self {
            rect: Rect::zero(),
            style: OverlayStyle::Confident,
        }
    }

    /// Returns whether the overlay has zero size (and thus isn't visible).
    pub fn is_hidden(&self) -> bool {
        self.rect.is_empty()
    }

    /// Draws the overlay onto `image`, treating surface coordinates as pixel coordinates.
    pub fn draw(&self, image: &mut RgbaImage) {
        draw::rect(image, self.rect)
            .color(self.style.border_color())
            .fill(self.style.fill_color())
            .stroke_width(OverlayStyle::BORDER_WIDTH)
            .corner_radius(OverlayStyle::CORNER_RADIUS);
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::hidden()
    }
}

/// Receives overlay updates and puts them on screen.
///
/// `render` is only ever called from the UI context that owns the tracking controller.
pub trait Renderer {
    fn render(&mut self, overlay: &Overlay);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, overlay: &Overlay) {
        (**self).render(overlay);
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, overlay: &Overlay) {
        (**self).render(overlay);
    }
}

/// A [`Renderer`] that only logs overlay changes.
#[derive(Default)]
pub struct LogRenderer {
    last: Option<Overlay>,
}

impl Renderer for LogRenderer {
    fn render(&mut self, overlay: &Overlay) {
        if self.last.as_ref() != Some(overlay) {
            log::debug!("overlay: {:?} ({:?})", overlay.rect, overlay.style);
            self.last = Some(*overlay);
        }
    }
}

/// A [`Renderer`] that publishes the latest overlay so that another thread can draw it.
///
/// Cloning yields another handle to the same overlay.
#[derive(Clone, Default)]
pub struct SharedOverlay {
    inner: Arc<Mutex<Overlay>>,
}

impl SharedOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently rendered overlay.
    pub fn get(&self) -> Overlay {
        *self.inner.lock().unwrap()
    }
}

impl Renderer for SharedOverlay {
    fn render(&mut self, overlay: &Overlay) {
        *self.inner.lock().unwrap() = *overlay;
    }
}
