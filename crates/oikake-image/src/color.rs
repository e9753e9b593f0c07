use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};

/// An 8-bit RGBA color.
///
/// Colors are always in the non-linear sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NONE: Self = Self([0, 0, 0, 0]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const GRAY: Self = Self([128, 128, 128, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    #[must_use]
    pub const fn with_alpha(mut self, a: u8) -> Color {
        self.0[3] = a;
        self
    }

    /// Returns this color with its alpha set to `opacity` (0.0 to 1.0) of full opacity.
    #[must_use]
    pub fn with_opacity(self, opacity: f32) -> Color {
        self.with_alpha((opacity.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Composites `self` over an opaque or translucent `dest` pixel ("source over").
    pub fn blend_over(self, dest: [u8; 4]) -> [u8; 4] {
        let alpha = u32::from(self.a());
        match alpha {
            0 => dest,
            255 => self.0,
            _ => {
                let inv = 255 - alpha;
                let mix = |s: u8, d: u8| {
                    ((u32::from(s) * alpha + u32::from(d) * inv + 127) / 255) as u8
                };
                [
                    mix(self.r(), dest[0]),
                    mix(self.g(), dest[1]),
                    mix(self.b(), dest[2]),
                    (alpha + u32::from(dest[3]) * inv / 255) as u8,
                ]
            }
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(c: Color) -> Self {
        image::Rgba(c.0)
    }
}

// lets `draw` hand colors straight to embedded-graphics styles
impl PixelColor for Color {
    type Raw = RawU32;
}
