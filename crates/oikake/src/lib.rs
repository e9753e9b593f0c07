//! Single-object tracking loop.
//!
//! oikake follows a user-drawn region across a live sequence of frames: the user drags out a box
//! on top of the camera preview, a [`Tracker`][tracker::Tracker] estimates where the boxed object
//! went in every new frame (starting from where it was in the previous one), and the estimate is
//! shown as an [`Overlay`][overlay::Overlay].
//!
//! The heart of the crate is the [`TrackingController`][controller::TrackingController]. The
//! [`session`] module runs one on a dedicated UI thread, fed by a frame worker.
//!
//! # Coordinates
//!
//! Trackers work in normalized frame coordinates with the origin in the *bottom left* corner and
//! Y pointing up. Gestures and overlays use the coordinates of the rendering surface, which have
//! their origin in the top left corner, Y pointing down, and are measured in points. The
//! [`coords`] module converts between both.
//!
//! # Environment Variables
//!
//! [`TrackingOptions::from_env`][options::TrackingOptions::from_env] reads the following
//! variables:
//!
//! * `OIKAKE_TRACKING_LEVEL`: `fast` or `accurate` (the default).
//! * `OIKAKE_DRAG_MODE`: `anchored` (the default) builds the drawn rectangle from the drag start
//!   towards positive X and Y, no matter the drag direction. `spanning` spans drag start and end.
//! * `OIKAKE_CONFIDENCE_THRESHOLD`: the confidence (0 to 1) an observation needs to move the
//!   overlay. Defaults to 0.3.

use log::LevelFilter;

pub mod controller;
pub mod coords;
pub mod frame;
pub mod gesture;
pub mod options;
pub mod overlay;
pub mod region;
pub mod session;
pub mod source;
pub mod timer;
pub mod tracker;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and oikake will log at *trace* level.
/// Otherwise, they will log at *debug* level. `RUST_LOG` can be used to override this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
