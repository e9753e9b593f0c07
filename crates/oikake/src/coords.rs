//! Conversion between rendering-surface coordinates and the tracker's normalized space.
//!
//! Two coordinate systems are involved:
//!
//! - The **surface** the overlay is drawn on uses points with the origin in the top left corner
//!   and Y pointing down. The camera frame is displayed somewhere on the surface, depending on
//!   the [`Gravity`].
//! - The **tracker** uses the normalized unit square of the frame, with the origin in the bottom
//!   left corner and Y pointing up (see [`crate::region`]).
//!
//! Getting from one to the other takes a vertical flip (`y' = 1 - y`, applied to both
//! horizontal edges of a rectangle) followed by scaling and offsetting the unit square to where
//! the frame ends up on the surface.
//!
//! Rectangles are mirrored as a whole. A surface rectangle with top edge `y` and height `h`
//! becomes a region whose *bottom* edge is at `1 - (y + h) / H`. Flipping only the origin
//! (`1 - y / H`) would leave the region offset by its own height, pointing the tracker at the
//! area directly above the drawn box. Both steps are affine, so the whole mapping is a single
//! [`Matrix3`] and its inverse.

use nalgebra::{Matrix3, Point2};
use oikake_image::{Rect, Resolution};
use thiserror::Error;

use crate::region::{RegionError, TrackedRegion};

/// Describes how camera frames are fitted onto the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    /// The frame is stretched to fill the surface, ignoring its aspect ratio.
    Resize,
    /// The frame is scaled to fit inside the surface, preserving its aspect ratio. This can add
    /// letterboxing or pillarboxing.
    ResizeAspect,
    /// The frame is scaled to cover the whole surface, preserving its aspect ratio. Parts of the
    /// frame are cropped off.
    #[default]
    ResizeAspectFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MappingError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSurface { width: f32, height: f32 },
    #[error("frame resolution {0} is empty")]
    EmptyFrame(Resolution),
    #[error("surface mapping is not invertible")]
    Degenerate,
}

/// Bidirectional mapping between surface rectangles and normalized tracker regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMapping {
    surface: Rect,
    frame: Resolution,
    gravity: Gravity,
    to_surface: Matrix3<f32>,
    to_tracker: Matrix3<f32>,
}

impl SurfaceMapping {
    /// Creates a mapping for frames of resolution `frame` displayed on a surface of the given
    /// size.
    pub fn new(
        surface_width: f32,
        surface_height: f32,
        frame: Resolution,
        gravity: Gravity,
    ) -> Result<Self, MappingError> {
        if !(surface_width.is_finite()
            && surface_height.is_finite()
            && surface_width > 0.0
            && surface_height > 0.0)
        {
            return Err(MappingError::InvalidSurface {
                width: surface_width,
                height: surface_height,
            });
        }
        let aspect = frame.aspect_ratio().ok_or(MappingError::EmptyFrame(frame))?;

        let surface = Rect::from_top_left(0.0, 0.0, surface_width, surface_height);
        let content = match gravity {
            Gravity::Resize => surface,
            Gravity::ResizeAspect => surface.shrink_to_fit_aspect(aspect),
            Gravity::ResizeAspectFill => surface.grow_to_fit_aspect(aspect),
        };

        #[rustfmt::skip]
        let flip = Matrix3::new(
            1.0,  0.0, 0.0,
            0.0, -1.0, 1.0,
            0.0,  0.0, 1.0,
        );
        #[rustfmt::skip]
        let place = Matrix3::new(
            content.width(), 0.0,              content.x(),
            0.0,             content.height(), content.y(),
            0.0,             0.0,              1.0,
        );
        let to_surface = place * flip;
        let to_tracker = to_surface.try_inverse().ok_or(MappingError::Degenerate)?;

        log::debug!(
            "surface mapping: {frame} frames on {surface_width}x{surface_height} surface \
             ({gravity:?}), content at {content:?}"
        );

        Ok(Self {
            surface,
            frame,
            gravity,
            to_surface,
            to_tracker,
        })
    }

    /// Returns the bounds of the rendering surface.
    pub fn surface(&self) -> Rect {
        self.surface
    }

    pub fn frame_resolution(&self) -> Resolution {
        self.frame
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    /// Maps a normalized tracker rectangle to surface coordinates.
    ///
    /// The result may extend past the surface bounds when [`Gravity::ResizeAspectFill`] crops
    /// the frame.
    pub fn rect_to_surface(&self, rect: Rect) -> Rect {
        map_rect(&self.to_surface, rect)
    }

    /// Maps a surface rectangle to the tracker's normalized space.
    ///
    /// This is the exact inverse of [`SurfaceMapping::rect_to_surface`]; the result is not
    /// clamped to the unit square.
    pub fn rect_to_tracker(&self, rect: Rect) -> Rect {
        map_rect(&self.to_tracker, rect)
    }

    /// Maps a tracked region to the surface rectangle the overlay should be placed at.
    pub fn to_surface(&self, region: &TrackedRegion) -> Rect {
        self.rect_to_surface(region.rect())
    }

    /// Converts an on-surface rectangle into a tracked region.
    ///
    /// Parts of the rectangle that fall outside of the camera frame are cut off.
    pub fn to_tracker(&self, rect: Rect) -> Result<TrackedRegion, RegionError> {
        TrackedRegion::clamped(self.rect_to_tracker(rect))
    }
}

fn map_rect(m: &Matrix3<f32>, rect: Rect) -> Rect {
    let a: Point2<f32> = m.transform_point(&rect.top_left());
    let b: Point2<f32> = m.transform_point(&rect.bottom_right());
    // The flip swaps the top and bottom edge.
    let min = a.inf(&b);
    let max = a.sup(&b);
    Rect::from_top_left(min.x, min.y, max.x - min.x, max.y - min.y)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const PHONE: (f32, f32) = (390.0, 844.0);

    fn mapping(gravity: Gravity) -> SurfaceMapping {
        SurfaceMapping::new(PHONE.0, PHONE.1, Resolution::RES_1080P, gravity).unwrap()
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(matches!(
            SurfaceMapping::new(0.0, 10.0, Resolution::RES_720P, Gravity::Resize),
            Err(MappingError::InvalidSurface { .. })
        ));
        assert!(matches!(
            SurfaceMapping::new(f32::NAN, 10.0, Resolution::RES_720P, Gravity::Resize),
            Err(MappingError::InvalidSurface { .. })
        ));
        assert_eq!(
            SurfaceMapping::new(10.0, 10.0, Resolution::new(0, 10), Gravity::Resize),
            Err(MappingError::EmptyFrame(Resolution::new(0, 10)))
        );
    }

    #[test]
    fn resize_flips_vertically() {
        let m = SurfaceMapping::new(200.0, 100.0, Resolution::new(64, 64), Gravity::Resize).unwrap();

        // lower left quarter of the frame is the lower left quarter of the surface
        let region = TrackedRegion::from_xywh(0.0, 0.0, 0.5, 0.5).unwrap();
        assert_relative_eq!(
            m.to_surface(&region),
            Rect::from_top_left(0.0, 50.0, 100.0, 50.0)
        );

        // and the top strip of the surface is the top strip of the frame
        let region = m.to_tracker(Rect::from_top_left(0.0, 0.0, 200.0, 10.0)).unwrap();
        assert_relative_eq!(region.rect(), Rect::from_top_left(0.0, 0.9, 1.0, 0.1), epsilon = 1e-6);
    }

    #[test]
    fn flip_mirrors_both_edges() {
        let m = SurfaceMapping::new(100.0, 100.0, Resolution::new(64, 64), Gravity::Resize).unwrap();

        // surface rows 20..50 are normalized rows 0.5..0.8, not 0.8..1.1
        let region = m.to_tracker(Rect::from_top_left(10.0, 20.0, 40.0, 30.0)).unwrap();
        assert_relative_eq!(region.rect(), Rect::from_top_left(0.1, 0.5, 0.4, 0.3), epsilon = 1e-6);
        assert_relative_eq!(region.rect().bottom_right().y, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn aspect_fill_crops_sides() {
        let m = mapping(Gravity::ResizeAspectFill);
        let full = TrackedRegion::from_xywh(0.0, 0.0, 1.0, 1.0).unwrap();
        let on_surface = m.to_surface(&full);
        assert_relative_eq!(on_surface.height(), PHONE.1, epsilon = 1e-3);
        assert!(on_surface.width() > PHONE.0);
        assert_relative_eq!(on_surface.center(), m.surface().center(), epsilon = 1e-3);

        // the whole surface only shows a vertical slice of the frame
        let visible = m.to_tracker(m.surface()).unwrap();
        assert_relative_eq!(visible.rect().height(), 1.0, epsilon = 1e-5);
        assert!(visible.rect().width() < 1.0);
    }

    #[test]
    fn aspect_letterboxes() {
        let m = mapping(Gravity::ResizeAspect);
        let full = TrackedRegion::from_xywh(0.0, 0.0, 1.0, 1.0).unwrap();
        let on_surface = m.to_surface(&full);
        assert_relative_eq!(on_surface.width(), PHONE.0, epsilon = 1e-3);
        assert_relative_eq!(on_surface.height(), PHONE.0 * 9.0 / 16.0, epsilon = 1e-3);
    }

    #[test]
    fn round_trip() {
        let mut rng = fastrand::Rng::with_seed(42);
        for gravity in [Gravity::Resize, Gravity::ResizeAspect, Gravity::ResizeAspectFill] {
            let m = mapping(gravity);

            let drawn = Rect::from_top_left(100.0, 100.0, 50.0, 30.0);
            let back = m.rect_to_surface(m.rect_to_tracker(drawn));
            assert_relative_eq!(back, drawn, epsilon = 1e-3);

            for _ in 0..100 {
                let x = rng.f32() * 0.8;
                let y = rng.f32() * 0.8;
                let region = TrackedRegion::from_xywh(x, y, rng.f32() * 0.2, rng.f32() * 0.2)
                    .unwrap();
                let back = m.rect_to_tracker(m.to_surface(&region));
                assert_relative_eq!(back, region.rect(), epsilon = 1e-5);
            }
        }
    }
}
