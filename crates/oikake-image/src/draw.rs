//! Drawing of tracking overlays onto RGBA images.
//!
//! Every function returns a guard object that allows customizing the drawn shape and performs
//! the drawing when dropped.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    prelude::*,
    primitives::{PrimitiveStyleBuilder, Rectangle, RoundedRectangle, StrokeAlignment},
    text::{Baseline, Text},
};
use image::RgbaImage;

use crate::{Color, Rect};

/// Guard returned by [`rect`]; draws the rectangle when dropped and allows customization.
pub struct DrawRect<'a> {
    image: &'a mut RgbaImage,
    rect: Rect,
    color: Color,
    fill: Color,
    stroke_width: u32,
    corner_radius: u32,
}

impl DrawRect<'_> {
    /// Sets the border color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the fill color.
    ///
    /// By default, the rectangle is not filled. Translucent colors are blended with the image.
    pub fn fill(&mut self, color: Color) -> &mut Self {
        self.fill = color;
        self
    }

    /// Sets the border's stroke width. The border is drawn inside of the rectangle.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Rounds the corners of the rectangle with the given radius (in pixels).
    pub fn corner_radius(&mut self, radius: u32) -> &mut Self {
        self.corner_radius = radius;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        if self.rect.is_empty() || !self.rect.is_finite() {
            return;
        }

        let mut style = PrimitiveStyleBuilder::new()
            .stroke_alignment(StrokeAlignment::Inside)
            .stroke_width(self.stroke_width)
            .stroke_color(self.color);
        if self.fill.a() != 0 {
            style = style.fill_color(self.fill);
        }

        let rectangle = Rectangle::new(
            Point::new(self.rect.x().round() as i32, self.rect.y().round() as i32),
            Size::new(
                self.rect.width().round() as u32,
                self.rect.height().round() as u32,
            ),
        );
        let radius = Size::new_equal(self.corner_radius);
        match RoundedRectangle::with_equal_corners(rectangle, radius)
            .into_styled(style.build())
            .draw(&mut Target(self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut RgbaImage,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let style = MonoTextStyle::new(&FONT_6X10, self.color);
        match Text::with_baseline(self.text, Point::new(self.x, self.y), style, Baseline::Top)
            .draw(&mut Target(self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a rectangle onto an image.
///
/// Coordinates are rounded to the nearest pixel. Empty rectangles are not drawn at all.
pub fn rect(image: &mut RgbaImage, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        image,
        rect,
        color: Color::RED,
        fill: Color::NONE,
        stroke_width: 1,
        corner_radius: 0,
    }
}

/// Draws a line of text onto an image, with its top left corner at `x`/`y`.
pub fn text<'a>(image: &'a mut RgbaImage, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::WHITE,
    }
}

struct Target<'a>(&'a mut RgbaImage);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size {
                width: self.0.width(),
                height: self.0.height(),
            },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0
                && (pos.x as u32) < self.0.width()
                && pos.y >= 0
                && (pos.y as u32) < self.0.height()
            {
                let px = self.0.get_pixel_mut(pos.x as u32, pos.y as u32);
                px.0 = color.blend_over(px.0);
            }
        }

        Ok(())
    }
}
