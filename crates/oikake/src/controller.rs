//! The tracking loop controller.
//!
//! [`TrackingController`] owns the currently tracked region and the overlay that shows it. It is
//! driven by three kinds of events, all of which must be delivered from the same context (see
//! [`crate::session`] for a threaded setup that guarantees this):
//!
//! - New frames ([`TrackingController::on_frame`]), which run the tracker on the current region.
//!   Trackers that run elsewhere use [`TrackingController::seed`] and
//!   [`TrackingController::apply_completion`] instead.
//! - Drag gestures, which replace the region with a user-drawn rectangle.
//! - [`TrackingController::reset`], which stops tracking.

use nalgebra::Point2;

use crate::{
    coords::SurfaceMapping,
    frame::Frame,
    gesture::{drag_rect, GestureError, GestureEvent, GesturePhase},
    options::TrackingOptions,
    overlay::{Overlay, OverlayStyle, Renderer},
    region::{Observation, Region, TrackedRegion},
    tracker::{TrackError, Tracker},
};

/// Tracking status, as indicated by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// No region is being tracked.
    #[default]
    Inactive,
    /// The region was just drawn, or the last observation was confident.
    Confident,
    /// The last observation fell below the confidence threshold.
    LowConfidence,
}

/// Snapshot of a [`TrackingController`]'s observable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub region: Region,
    pub overlay: Overlay,
    pub tracking: TrackingState,
}

/// A region to run the tracker on, tagged with the epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub epoch: u64,
    pub region: TrackedRegion,
}

/// What happened to a tracker request.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No region is tracked; the tracker was not run.
    Inactive,
    /// The user redrew or cleared the region while the tracker was running. The result was
    /// discarded.
    Stale,
    /// The tracker failed. Region and overlay are unchanged.
    Failed(TrackError),
    /// The region was updated and the overlay moved to it.
    Confident(Observation),
    /// The region was updated, but the overlay stays where it was.
    LowConfidence(Observation),
}

/// Maintains the tracked region and its overlay.
pub struct TrackingController<R: Renderer> {
    options: TrackingOptions,
    mapping: SurfaceMapping,
    renderer: R,
    region: Region,
    overlay: Overlay,
    anchor: Option<Point2<f32>>,
    tracking: TrackingState,
    /// Bumped whenever the user replaces or clears the region.
    epoch: u64,
}

impl<R: Renderer> TrackingController<R> {
    pub fn new(mapping: SurfaceMapping, options: TrackingOptions, renderer: R) -> Self {
        Self {
            options,
            mapping,
            renderer,
            region: Region::Absent,
            overlay: Overlay::hidden(),
            anchor: None,
            tracking: TrackingState::Inactive,
            epoch: 0,
        }
    }

    pub fn options(&self) -> &TrackingOptions {
        &self.options
    }

    pub fn mapping(&self) -> &SurfaceMapping {
        &self.mapping
    }

    /// Replaces the surface mapping, eg. after the rendering surface was resized.
    ///
    /// A confidently tracked region's overlay is moved to its new on-surface location.
    pub fn set_mapping(&mut self, mapping: SurfaceMapping) {
        self.mapping = mapping;
        if let (Some(region), TrackingState::Confident) = (self.region.get(), self.tracking) {
            self.overlay.rect = self.mapping.to_surface(region);
            self.renderer.render(&self.overlay);
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn state(&self) -> ControllerState {
        ControllerState {
            region: self.region,
            overlay: self.overlay,
            tracking: self.tracking,
        }
    }

    /// Returns the region the tracker should be run on next, or [`None`] if nothing is tracked.
    pub fn seed(&self) -> Option<Seed> {
        self.region.get().map(|&region| Seed {
            epoch: self.epoch,
            region,
        })
    }

    /// Runs `tracker` on `frame` and applies the result.
    ///
    /// If no region is tracked, this does nothing: the tracker is not invoked and the overlay is
    /// left alone.
    pub fn on_frame<T: Tracker + ?Sized>(&mut self, frame: &Frame, tracker: &mut T) -> FrameOutcome {
        let Some(seed) = self.seed() else {
            return FrameOutcome::Inactive;
        };
        let result = tracker.track(&seed.region, frame);
        self.apply_completion(seed.epoch, result)
    }

    /// Applies the result of running the tracker on a [`Seed`] issued in `epoch`.
    ///
    /// Results for seeds from an earlier epoch are discarded. Failures are logged and leave
    /// everything unchanged. Successful observations always replace the tracked region, but only
    /// move the overlay if their confidence reaches the configured threshold.
    pub fn apply_completion(
        &mut self,
        epoch: u64,
        result: Result<Observation, TrackError>,
    ) -> FrameOutcome {
        if epoch != self.epoch || !self.region.is_present() {
            log::trace!("discarding tracking result from epoch {epoch} (now {})", self.epoch);
            return FrameOutcome::Stale;
        }

        let observation = match result {
            Ok(observation) => observation,
            Err(e) => {
                log::warn!("tracking failed: {e}");
                return FrameOutcome::Failed(e);
            }
        };

        self.region = Region::Present(observation.region());
        if observation.confidence() >= self.options.get_confidence_threshold() {
            self.tracking = TrackingState::Confident;
            self.overlay = Overlay {
                rect: self.mapping.to_surface(&observation.region()),
                style: OverlayStyle::Confident,
            };
            self.renderer.render(&self.overlay);
            FrameOutcome::Confident(observation)
        } else {
            self.tracking = TrackingState::LowConfidence;
            self.overlay.style = OverlayStyle::LowConfidence;
            self.renderer.render(&self.overlay);
            FrameOutcome::LowConfidence(observation)
        }
    }

    /// Dispatches a gesture event to the matching drag handler.
    ///
    /// Phases other than [`GesturePhase::Began`], [`GesturePhase::Changed`] and
    /// [`GesturePhase::Ended`] are rejected without changing any state.
    pub fn on_gesture(&mut self, event: GestureEvent) -> Result<(), GestureError> {
        match event.phase {
            GesturePhase::Began => self.on_drag_begin(event.location),
            GesturePhase::Changed => self.on_drag_changed(event.location),
            GesturePhase::Ended => self.on_drag_end(),
            phase @ (GesturePhase::Possible | GesturePhase::Cancelled | GesturePhase::Failed) => {
                log::debug!("ignoring gesture in phase {phase:?}");
                Err(GestureError::UnrecognizedPhase(phase))
            }
        }
    }

    /// Starts drawing a new region at `point`, discarding the tracked one.
    pub fn on_drag_begin(&mut self, point: Point2<f32>) -> Result<(), GestureError> {
        check_location(point)?;
        log::trace!("drag begin at {point}");

        self.region = Region::Absent;
        self.tracking = TrackingState::Inactive;
        self.overlay = Overlay::hidden();
        self.anchor = Some(point);
        self.epoch += 1;
        self.renderer.render(&self.overlay);
        Ok(())
    }

    /// Updates the overlay to the rectangle drawn from the drag anchor to `point`.
    pub fn on_drag_changed(&mut self, point: Point2<f32>) -> Result<(), GestureError> {
        check_location(point)?;
        let anchor = self.anchor.ok_or(GestureError::NoAnchor)?;

        self.overlay.rect = drag_rect(anchor, point, self.options.get_drag_mode());
        self.renderer.render(&self.overlay);
        Ok(())
    }

    /// Finishes drawing: the drawn rectangle becomes the tracked region.
    ///
    /// Parts of the rectangle outside of the camera frame are cut off.
    pub fn on_drag_end(&mut self) -> Result<(), GestureError> {
        if self.anchor.is_none() {
            return Err(GestureError::NoAnchor);
        }
        let region = self.mapping.to_tracker(self.overlay.rect)?;
        log::debug!(
            "tracking region {:?} (drawn at {:?})",
            region.rect(),
            self.overlay.rect
        );

        self.anchor = None;
        self.region = Region::Present(region);
        self.tracking = TrackingState::Confident;
        self.epoch += 1;
        Ok(())
    }

    /// Stops tracking and hides the overlay.
    ///
    /// Calling this repeatedly has the same effect as calling it once.
    pub fn reset(&mut self) {
        if self.region.take().is_some() {
            log::debug!("tracking reset");
            self.epoch += 1;
        }
        self.anchor = None;
        self.tracking = TrackingState::Inactive;
        if self.overlay != Overlay::hidden() {
            self.overlay = Overlay::hidden();
            self.renderer.render(&self.overlay);
        }
    }
}

fn check_location(point: Point2<f32>) -> Result<(), GestureError> {
    if point.x.is_finite() && point.y.is_finite() {
        Ok(())
    } else {
        Err(GestureError::InvalidLocation(point))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;
    use oikake_image::{Rect, Resolution, RgbaImage};

    use crate::{
        coords::Gravity,
        gesture::DragRectMode,
        tracker::{self, TrackError},
    };

    use super::*;

    /// Remembers every overlay it was asked to render.
    #[derive(Default)]
    struct Recorder(Vec<Overlay>);

    impl Renderer for Recorder {
        fn render(&mut self, overlay: &Overlay) {
            self.0.push(*overlay);
        }
    }

    fn controller(options: TrackingOptions) -> TrackingController<Recorder> {
        let mapping =
            SurfaceMapping::new(390.0, 844.0, Resolution::RES_1080P, options.get_gravity())
                .unwrap();
        TrackingController::new(mapping, options, Recorder::default())
    }

    fn frame() -> Frame {
        Frame::new(RgbaImage::new(4, 4), 0, Duration::ZERO)
    }

    /// Draws a region by dragging from (100,100) to (150,130).
    fn draw(ctrl: &mut TrackingController<Recorder>) {
        ctrl.on_gesture(GestureEvent::began(100.0, 100.0)).unwrap();
        ctrl.on_gesture(GestureEvent::changed(150.0, 130.0)).unwrap();
        ctrl.on_gesture(GestureEvent::ended(150.0, 130.0)).unwrap();
    }

    fn observation(x: f32, y: f32, confidence: f32) -> Observation {
        Observation::new(TrackedRegion::from_xywh(x, y, 0.1, 0.1).unwrap(), confidence)
    }

    #[test]
    fn inactive_frames_are_ignored() {
        let mut ctrl = controller(TrackingOptions::default());
        let mut calls = 0;
        let mut tracker = tracker::from_fn(|_, _| {
            calls += 1;
            Err(TrackError::Other("should not run".into()))
        });

        for _ in 0..3 {
            assert_eq!(ctrl.on_frame(&frame(), &mut tracker), FrameOutcome::Inactive);
        }
        drop(tracker);
        assert_eq!(calls, 0);
        assert!(ctrl.renderer().0.is_empty());
        assert_eq!(ctrl.state().tracking, TrackingState::Inactive);
    }

    #[test]
    fn drag_draws_and_seeds() {
        let mut ctrl = controller(TrackingOptions::default().gravity(Gravity::Resize));
        ctrl.on_drag_begin(Point2::new(100.0, 100.0)).unwrap();
        ctrl.on_drag_changed(Point2::new(150.0, 130.0)).unwrap();

        let state = ctrl.state();
        assert_eq!(state.overlay.rect, Rect::from_top_left(100.0, 100.0, 50.0, 30.0));
        assert_eq!(state.overlay.style, OverlayStyle::Confident);
        assert_eq!(state.region, Region::Absent);
        assert!(ctrl.seed().is_none());

        ctrl.on_drag_end().unwrap();
        let state = ctrl.state();
        assert_eq!(state.tracking, TrackingState::Confident);
        let region = *state.region.get().unwrap();
        assert_eq!(ctrl.seed().unwrap().region, region);

        // mapping the region back yields the drawn rectangle
        assert_relative_eq!(
            ctrl.mapping().to_surface(&region),
            Rect::from_top_left(100.0, 100.0, 50.0, 30.0),
            epsilon = 1e-3
        );
        // with a stretched preview, surface y 100..130 of 844 is the region's top..bottom
        assert_relative_eq!(
            region.rect(),
            Rect::from_top_left(100.0 / 390.0, 1.0 - 130.0 / 844.0, 50.0 / 390.0, 30.0 / 844.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn drag_round_trip_with_default_gravity() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let region = *ctrl.state().region.get().unwrap();
        assert_relative_eq!(
            ctrl.mapping().to_surface(&region),
            ctrl.state().overlay.rect,
            epsilon = 1e-3
        );
    }

    #[test]
    fn anchored_and_spanning_drags() {
        let mut ctrl = controller(TrackingOptions::default());
        ctrl.on_gesture(GestureEvent::began(100.0, 100.0)).unwrap();
        ctrl.on_gesture(GestureEvent::changed(60.0, 80.0)).unwrap();
        assert_eq!(
            ctrl.state().overlay.rect,
            Rect::from_top_left(100.0, 100.0, 40.0, 20.0)
        );

        let mut ctrl = controller(TrackingOptions::default().drag_mode(DragRectMode::Spanning));
        ctrl.on_gesture(GestureEvent::began(100.0, 100.0)).unwrap();
        ctrl.on_gesture(GestureEvent::changed(60.0, 80.0)).unwrap();
        assert_eq!(
            ctrl.state().overlay.rect,
            Rect::from_top_left(60.0, 80.0, 40.0, 20.0)
        );
    }

    #[test]
    fn confidence_gates_overlay() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let drawn = ctrl.state().overlay;

        // below the threshold: region updated, overlay stays put
        let low = observation(0.5, 0.5, 0.29);
        let epoch = ctrl.seed().unwrap().epoch;
        assert_eq!(
            ctrl.apply_completion(epoch, Ok(low)),
            FrameOutcome::LowConfidence(low)
        );
        let state = ctrl.state();
        assert_eq!(state.region, Region::Present(low.region()));
        assert_eq!(state.overlay.rect, drawn.rect);
        assert_eq!(state.overlay.style, OverlayStyle::LowConfidence);
        assert_eq!(state.tracking, TrackingState::LowConfidence);
        assert_eq!(ctrl.seed().unwrap().region, low.region());

        // exactly at the threshold counts as confident
        let ok = observation(0.4, 0.4, 0.3);
        assert_eq!(ctrl.apply_completion(epoch, Ok(ok)), FrameOutcome::Confident(ok));
        let state = ctrl.state();
        assert_eq!(state.region, Region::Present(ok.region()));
        assert_eq!(state.overlay.style, OverlayStyle::Confident);
        assert_eq!(state.overlay.rect, ctrl.mapping().to_surface(&ok.region()));
        assert_eq!(state.tracking, TrackingState::Confident);
        assert_eq!(ctrl.renderer().0.last(), Some(&state.overlay));
    }

    #[test]
    fn custom_threshold() {
        let mut ctrl = controller(TrackingOptions::default().confidence_threshold(0.8));
        draw(&mut ctrl);
        let epoch = ctrl.seed().unwrap().epoch;
        let obs = observation(0.5, 0.5, 0.5);
        assert_eq!(
            ctrl.apply_completion(epoch, Ok(obs)),
            FrameOutcome::LowConfidence(obs)
        );
    }

    #[test]
    fn runs_tracker_on_frames() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let drawn = *ctrl.state().region.get().unwrap();

        let mut seeds = Vec::new();
        let mut tracker = tracker::from_fn(|seed: &TrackedRegion, _: &Frame| {
            seeds.push(*seed);
            Ok(observation(0.2, 0.3, 0.9))
        });
        ctrl.on_frame(&frame(), &mut tracker);
        ctrl.on_frame(&frame(), &mut tracker);
        drop(tracker);

        // the tracker's output is fed back as the next seed
        assert_eq!(seeds, [drawn, observation(0.2, 0.3, 0.9).region()]);
    }

    #[test]
    fn failures_change_nothing() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let before = ctrl.state();
        let renders = ctrl.renderer().0.len();

        let mut tracker = tracker::from_fn(|_, _| Err(TrackError::Other("lost".into())));
        assert_eq!(
            ctrl.on_frame(&frame(), &mut tracker),
            FrameOutcome::Failed(TrackError::Other("lost".into()))
        );
        assert_eq!(ctrl.state(), before);
        assert_eq!(ctrl.renderer().0.len(), renders);
    }

    /// Runs a frame through any [`Tracker`], taken by value.
    fn track_with<T: Tracker>(
        ctrl: &mut TrackingController<Recorder>,
        mut tracker: T,
    ) -> FrameOutcome {
        ctrl.on_frame(&frame(), &mut tracker)
    }

    #[test]
    fn tracking_resumes_after_failure() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let drawn = ctrl.state();

        let mut seeds = Vec::new();
        let mut tracker = tracker::from_fn(|seed: &TrackedRegion, _: &Frame| {
            seeds.push(*seed);
            if seeds.len() == 1 {
                Err(TrackError::Other("lost".into()))
            } else {
                Ok(observation(0.2, 0.3, 0.9))
            }
        });

        // borrowed trackers keep their state across frames
        assert!(matches!(
            track_with(&mut ctrl, &mut tracker),
            FrameOutcome::Failed(_)
        ));
        assert_eq!(ctrl.state(), drawn);
        assert_eq!(
            track_with(&mut ctrl, &mut tracker),
            FrameOutcome::Confident(observation(0.2, 0.3, 0.9))
        );
        drop(tracker);

        let region = *drawn.region.get().unwrap();
        assert_eq!(seeds, [region, region]);
        assert_eq!(ctrl.state().tracking, TrackingState::Confident);
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let seed = ctrl.seed().unwrap();

        // the user starts drawing while the tracker runs
        ctrl.on_gesture(GestureEvent::began(10.0, 10.0)).unwrap();
        let obs = observation(0.5, 0.5, 1.0);
        assert_eq!(ctrl.apply_completion(seed.epoch, Ok(obs)), FrameOutcome::Stale);
        assert_eq!(ctrl.state().region, Region::Absent);

        // ... or finishes drawing a new region
        ctrl.on_gesture(GestureEvent::changed(50.0, 50.0)).unwrap();
        ctrl.on_gesture(GestureEvent::ended(50.0, 50.0)).unwrap();
        let drawn = ctrl.state();
        assert_eq!(ctrl.apply_completion(seed.epoch, Ok(obs)), FrameOutcome::Stale);
        assert_eq!(ctrl.state(), drawn);

        // ... or resets
        let seed = ctrl.seed().unwrap();
        ctrl.reset();
        assert_eq!(ctrl.apply_completion(seed.epoch, Ok(obs)), FrameOutcome::Stale);
        assert_eq!(ctrl.state().region, Region::Absent);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut ctrl = controller(TrackingOptions::default());
        ctrl.reset();
        let cleared = ctrl.state();
        assert_eq!(
            cleared,
            ControllerState {
                region: Region::Absent,
                overlay: Overlay::hidden(),
                tracking: TrackingState::Inactive,
            }
        );

        draw(&mut ctrl);
        let epoch = ctrl.seed().unwrap().epoch;
        ctrl.apply_completion(epoch, Ok(observation(0.1, 0.1, 0.1)));
        ctrl.reset();
        assert_eq!(ctrl.state(), cleared);
        ctrl.reset();
        assert_eq!(ctrl.state(), cleared);

        // a reset in the middle of a drag drops the anchor
        ctrl.on_gesture(GestureEvent::began(5.0, 5.0)).unwrap();
        ctrl.reset();
        assert_eq!(ctrl.state(), cleared);
        assert_eq!(
            ctrl.on_gesture(GestureEvent::changed(9.0, 9.0)),
            Err(GestureError::NoAnchor)
        );
        assert_eq!(ctrl.state(), cleared);
    }

    #[test]
    fn unrecognized_phases_change_nothing() {
        let mut ctrl = controller(TrackingOptions::default());
        draw(&mut ctrl);
        let before = ctrl.state();
        let renders = ctrl.renderer().0.len();

        for phase in [
            GesturePhase::Possible,
            GesturePhase::Cancelled,
            GesturePhase::Failed,
        ] {
            assert_eq!(
                ctrl.on_gesture(GestureEvent::new(phase, 1.0, 1.0)),
                Err(GestureError::UnrecognizedPhase(phase))
            );
        }
        assert_eq!(ctrl.state(), before);
        assert_eq!(ctrl.renderer().0.len(), renders);
    }

    #[test]
    fn drag_without_anchor() {
        let mut ctrl = controller(TrackingOptions::default());
        assert_eq!(
            ctrl.on_drag_changed(Point2::new(1.0, 2.0)),
            Err(GestureError::NoAnchor)
        );
        assert_eq!(ctrl.on_drag_end(), Err(GestureError::NoAnchor));
        assert_eq!(ctrl.state(), controller(TrackingOptions::default()).state());
    }

    #[test]
    fn rejects_non_finite_locations() {
        let mut ctrl = controller(TrackingOptions::default());
        assert!(matches!(
            ctrl.on_drag_begin(Point2::new(f32::NAN, 2.0)),
            Err(GestureError::InvalidLocation(_))
        ));
        ctrl.on_drag_begin(Point2::new(1.0, 2.0)).unwrap();
        assert!(matches!(
            ctrl.on_drag_changed(Point2::new(3.0, f32::INFINITY)),
            Err(GestureError::InvalidLocation(_))
        ));
        assert!(ctrl.state().overlay.is_hidden());
    }

    #[test]
    fn zero_size_drag_is_tracked() {
        let mut ctrl = controller(TrackingOptions::default());
        ctrl.on_gesture(GestureEvent::began(100.0, 100.0)).unwrap();
        ctrl.on_gesture(GestureEvent::ended(100.0, 100.0)).unwrap();
        let region = *ctrl.state().region.get().unwrap();
        assert!(region.rect().is_empty());
    }

    #[test]
    fn drawing_outside_the_frame_is_clamped() {
        let mut ctrl = controller(TrackingOptions::default().gravity(Gravity::ResizeAspect));
        // the 16:9 frame is letterboxed in the middle of the tall surface
        ctrl.on_gesture(GestureEvent::began(10.0, 10.0)).unwrap();
        ctrl.on_gesture(GestureEvent::changed(100.0, 430.0)).unwrap();
        ctrl.on_gesture(GestureEvent::ended(100.0, 430.0)).unwrap();

        let region = ctrl.state().region.get().unwrap().rect();
        assert!(region.y() + region.height() <= 1.0);
        assert_relative_eq!(region.y() + region.height(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn surface_resize_moves_overlay() {
        let mut ctrl = controller(TrackingOptions::default().gravity(Gravity::Resize));
        draw(&mut ctrl);
        let region = *ctrl.state().region.get().unwrap();

        let bigger =
            SurfaceMapping::new(780.0, 1688.0, Resolution::RES_1080P, Gravity::Resize).unwrap();
        ctrl.set_mapping(bigger);
        assert_relative_eq!(
            ctrl.state().overlay.rect,
            Rect::from_top_left(200.0, 200.0, 100.0, 60.0),
            epsilon = 1e-2
        );
        assert_eq!(ctrl.state().region, Region::Present(region));
    }
}
