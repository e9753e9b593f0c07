use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use oikake::{
    controller::{FrameOutcome, TrackingController, TrackingState},
    coords::{Gravity, SurfaceMapping},
    frame::Frame,
    gesture::GestureEvent,
    options::TrackingOptions,
    overlay::{Overlay, Renderer},
    region::{Observation, Region, TrackedRegion},
    session::{Session, SessionError},
    tracker::{self, TrackError},
};
use oikake_image::{Resolution, RgbaImage};

const RES: Resolution = Resolution::new(64, 48);

/// Asserts that it is only ever used from the session's UI thread.
#[derive(Clone, Default)]
struct UiThreadRenderer {
    renders: Arc<AtomicUsize>,
}

impl Renderer for UiThreadRenderer {
    fn render(&mut self, _: &Overlay) {
        assert_eq!(thread::current().name(), Some("ui context"));
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}

fn controller<R: Renderer>(renderer: R) -> TrackingController<R> {
    let mapping = SurfaceMapping::new(640.0, 480.0, RES, Gravity::Resize).unwrap();
    TrackingController::new(mapping, TrackingOptions::default(), renderer)
}

fn frame(index: u64) -> Frame {
    Frame::new(RgbaImage::new(RES.width(), RES.height()), index, Duration::ZERO)
}

fn draw(session: &Session, x: f32, y: f32) -> Result<(), SessionError> {
    let ui = session.handle();
    ui.gesture(GestureEvent::began(x, y))?;
    ui.gesture(GestureEvent::changed(x + 100.0, y + 80.0))?;
    ui.gesture(GestureEvent::ended(x + 100.0, y + 80.0))
}

#[test]
fn single_outstanding_request() {
    let in_flight = Arc::new(AtomicBool::new(false));
    let processed = Arc::new(Mutex::new(Vec::new()));

    let mut session = {
        let in_flight = in_flight.clone();
        let processed = processed.clone();
        Session::spawn(
            controller(UiThreadRenderer::default()),
            tracker::from_fn(move |seed: &TrackedRegion, frame: &Frame| {
                assert!(
                    !in_flight.swap(true, Ordering::SeqCst),
                    "tracker invoked while another request is in flight"
                );
                thread::sleep(Duration::from_millis(2));
                processed.lock().unwrap().push(frame.index());
                in_flight.store(false, Ordering::SeqCst);
                Ok(Observation::new(*seed, 0.9))
            }),
        )
        .unwrap()
    };
    draw(&session, 100.0, 100.0).unwrap();

    for index in 0..20 {
        session.submit(frame(index));
        // Accepting a frame means the previous one has been fully processed.
        let done = processed.lock().unwrap().len() as u64;
        assert!(done >= index, "frame {index} accepted with only {done} processed");
    }
    drop(session);

    assert_eq!(*processed.lock().unwrap(), (0..20).collect::<Vec<_>>());
}

#[test]
fn concurrent_gestures_and_frames() {
    let renderer = UiThreadRenderer::default();
    let renders = renderer.renders.clone();
    let mut session = Session::spawn(
        controller(renderer),
        tracker::from_fn(|seed: &TrackedRegion, frame: &Frame| {
            // alternate between confident and unsure observations
            let confidence = if frame.index() % 2 == 0 { 0.9 } else { 0.1 };
            Ok(Observation::new(*seed, confidence))
        }),
    )
    .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let gesturers = (0..3)
        .map(|i| {
            let ui = session.handle();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut n = 0;
                while !stop.load(Ordering::SeqCst) {
                    let x = (i * 100 + n % 50) as f32;
                    // Drags from different threads interleave, so some of these get rejected.
                    ui.gesture(GestureEvent::began(x, 10.0)).ok();
                    ui.gesture(GestureEvent::changed(x + 40.0, 60.0)).ok();
                    ui.gesture(GestureEvent::ended(x + 40.0, 60.0)).ok();
                    if n % 7 == 0 {
                        ui.reset().unwrap();
                    }

                    let state = ui.state().unwrap();
                    match state.region {
                        Region::Absent => assert_eq!(state.tracking, TrackingState::Inactive),
                        Region::Present(_) => {
                            assert_ne!(state.tracking, TrackingState::Inactive)
                        }
                    }
                    n += 1;
                }
            })
        })
        .collect::<Vec<_>>();

    for index in 0..200 {
        session.track(frame(index)).unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    for gesturer in gesturers {
        gesturer.join().unwrap();
    }

    // Leave the session in a known state.
    let ui = session.handle();
    ui.reset().unwrap();
    let state = ui.state().unwrap();
    assert_eq!(state.region, Region::Absent);
    assert!(state.overlay.is_hidden());
    assert!(renders.load(Ordering::SeqCst) > 0);
}

#[test]
fn frames_without_region_skip_tracker() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut session = {
        let calls = calls.clone();
        Session::spawn(
            controller(UiThreadRenderer::default()),
            tracker::from_fn(move |seed: &TrackedRegion, _: &Frame| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Observation::new(*seed, 1.0))
            }),
        )
        .unwrap()
    };

    for index in 0..4 {
        session.submit(frame(index));
    }
    assert_eq!(session.track(frame(4)), Ok(FrameOutcome::Inactive));
    draw(&session, 0.0, 0.0).unwrap();
    session.track(frame(5)).unwrap();
    session.handle().reset().unwrap();
    session.track(frame(6)).unwrap();
    drop(session);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn tracking_resumes_after_failure() {
    let seeds = Arc::new(Mutex::new(Vec::new()));
    let moved = TrackedRegion::from_xywh(0.25, 0.25, 0.25, 0.25).unwrap();
    let mut session = {
        let seeds = seeds.clone();
        Session::spawn(
            controller(UiThreadRenderer::default()),
            tracker::from_fn(move |seed: &TrackedRegion, frame: &Frame| {
                seeds.lock().unwrap().push(*seed);
                if frame.index() == 0 {
                    Err(TrackError::Other("target lost".into()))
                } else {
                    Ok(Observation::new(moved, 0.9))
                }
            }),
        )
        .unwrap()
    };
    draw(&session, 100.0, 100.0).unwrap();
    let ui = session.handle();
    let drawn = ui.state().unwrap();

    assert!(matches!(
        session.track(frame(0)),
        Ok(FrameOutcome::Failed(_))
    ));
    assert_eq!(ui.state().unwrap(), drawn);

    assert_eq!(
        session.track(frame(1)),
        Ok(FrameOutcome::Confident(Observation::new(moved, 0.9)))
    );
    let region = *drawn.region.get().unwrap();
    assert_eq!(*seeds.lock().unwrap(), [region, region]);

    let state = ui.state().unwrap();
    assert_eq!(state.region, Region::Present(moved));
    assert_eq!(state.tracking, TrackingState::Confident);
}
