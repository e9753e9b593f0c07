//! Geometry, color and drawing primitives for oikake.
//!
//! # Coordinates
//!
//! [`Rect`] itself is agnostic of the coordinate system it is used in. Pixel and surface
//! rectangles use a top-left origin with Y pointing down; the tracker's normalized space is
//! described in the `oikake` crate.
//!
//! Images are plain [`image::RgbaImage`]s. The [`draw`] module contains a few primitive drawing
//! operations, mainly meant for visualizing tracking overlays.

pub mod draw;
pub mod num;
pub mod rect;

mod color;
mod resolution;

pub use color::Color;
pub use image::RgbaImage;
pub use rect::Rect;
pub use resolution::{AspectRatio, Resolution};
