//! Tracking demo.
//!
//! Plays back a frame source, draws a box around an object the way a user would, and tracks it.
//!
//! Without configuration, a synthetic scene is played and the tracking quality is logged. Set
//! `OIKAKE_INPUT` to a directory of images or to a GIF/APNG file to track something else (the
//! center of the first frame is selected), and `OIKAKE_OUTPUT` to a directory to write annotated
//! frames to.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use oikake::{
    controller::{FrameOutcome, TrackingController},
    coords::SurfaceMapping,
    gesture::GestureEvent,
    options::TrackingOptions,
    overlay::SharedOverlay,
    session::Session,
    source::{Animation, FrameSource, ImageSequence, SyntheticScene},
    timer::FpsCounter,
    tracker::TemplateTracker,
};
use oikake_image::{draw, Color, Rect, Resolution};

const ENV_VAR_INPUT: &str = "OIKAKE_INPUT";
const ENV_VAR_OUTPUT: &str = "OIKAKE_OUTPUT";

const SYNTHETIC_FRAMES: u64 = 150;

fn main() -> anyhow::Result<()> {
    oikake::init_logger!();

    let options = TrackingOptions::from_env()?;
    let (mut source, truth) = open_source()?;
    let res = source.resolution();

    let output = env::var_os(ENV_VAR_OUTPUT).map(PathBuf::from);
    if let Some(dir) = &output {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    }

    // The preview fills a surface with the frame's dimensions, so surface and pixel coordinates
    // coincide.
    let mapping = SurfaceMapping::new(
        res.width() as f32,
        res.height() as f32,
        res,
        options.get_gravity(),
    )?;
    let overlay = SharedOverlay::new();
    let controller = TrackingController::new(mapping, options, overlay.clone());
    let mut session = Session::spawn(
        controller,
        TemplateTracker::new(options.get_tracking_level()),
    )?;
    let ui = session.handle();

    let target = match &truth {
        Some(scene) => scene.target_rect(0),
        None => Rect::from_center(
            res.width() as f32 / 2.0,
            res.height() as f32 / 2.0,
            res.width() as f32 / 4.0,
            res.height() as f32 / 4.0,
        ),
    };
    drag(&session, target)?;

    let mut fps = FpsCounter::new("demo");
    let (mut total, mut confident) = (0, 0);
    while let Some(frame) = source.next_frame()? {
        let outcome = session.track(frame.clone())?;
        total += 1;
        if let FrameOutcome::Confident(_) = outcome {
            confident += 1;
        }

        let state = ui.state()?;
        match (&truth, state.region.get()) {
            (Some(scene), Some(region)) => {
                let iou = region.to_pixels(res).iou(&scene.target_rect(frame.index()));
                log::debug!("frame {}: {outcome:?}, IoU {iou:.2}", frame.index());
            }
            _ => log::debug!("frame {}: {outcome:?}", frame.index()),
        }

        if let Some(dir) = &output {
            let mut image = frame.to_image();
            overlay.get().draw(&mut image);
            draw::text(&mut image, 4, 4, &format!("#{}", frame.index())).color(Color::YELLOW);
            let path = dir.join(format!("{:05}.png", frame.index()));
            image
                .save(&path)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
        }

        fps.tick();
    }

    log::info!("tracked {total} frames, {confident} of them confidently");
    Ok(())
}

fn open_source() -> anyhow::Result<(Box<dyn FrameSource>, Option<SyntheticScene>)> {
    match env::var_os(ENV_VAR_INPUT) {
        Some(input) => {
            let path = Path::new(&input);
            log::info!("reading frames from '{}'", path.display());
            let source: Box<dyn FrameSource> = if path.is_dir() {
                Box::new(ImageSequence::open(path)?)
            } else {
                Box::new(Animation::from_path(path)?)
            };
            Ok((source, None))
        }
        None => {
            // Ground truth comes from a second, identical scene.
            let scene = || {
                SyntheticScene::new(Resolution::new(320, 240), 1)
                    .target_size(48, 48)
                    .velocity(2.5, 1.5)
                    .frames(SYNTHETIC_FRAMES)
            };
            let source: Box<dyn FrameSource> = Box::new(scene());
            Ok((source, Some(scene())))
        }
    }
}

/// Drags out `rect` on the session's surface.
fn drag(session: &Session, rect: Rect) -> anyhow::Result<()> {
    let ui = session.handle();
    let start = rect.top_left();
    let end = rect.bottom_right();
    let mid = start + (end - start) / 2.0;

    ui.gesture(GestureEvent::began(start.x, start.y))?;
    ui.gesture(GestureEvent::changed(mid.x, mid.y))?;
    ui.gesture(GestureEvent::changed(end.x, end.y))?;
    ui.gesture(GestureEvent::ended(end.x, end.y))?;
    log::info!("selected {rect:?}");
    Ok(())
}
