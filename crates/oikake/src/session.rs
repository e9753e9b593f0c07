//! A threaded tracking session.
//!
//! A [`Session`] splits the tracking loop across two threads:
//!
//! - The **UI context** owns the [`TrackingController`] and its [`Renderer`]. Every read and write
//!   of the tracked region and the overlay happens on this thread, in the order the messages
//!   arrive. Gestures and resets are delivered to it through [`SessionHandle`]s.
//! - The **frame worker** owns the [`Tracker`]. For every submitted frame it asks the UI context
//!   for the current seed, runs the tracker, and hands the result back to the UI context, waiting
//!   until it has been applied before accepting the next frame.
//!
//! Since frames are handed to the worker through a rendezvous channel, there is never more than
//! one tracker request in flight: [`Session::submit`] blocks until the previous frame has been
//! completely processed.

use std::{
    io,
    panic::resume_unwind,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{self, Receiver, Sender};
use pawawwewism::{promise, Promise, Worker};
use thiserror::Error;

use crate::{
    controller::{ControllerState, FrameOutcome, Seed, TrackingController},
    frame::Frame,
    gesture::{GestureError, GestureEvent},
    overlay::Renderer,
    region::Observation,
    timer::{FpsCounter, Timer},
    tracker::{TrackError, Tracker},
};

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SessionError {
    #[error("tracking session has shut down")]
    Closed,
    #[error(transparent)]
    Gesture(#[from] GestureError),
}

enum UiMsg {
    Gesture(GestureEvent, Promise<Result<(), GestureError>>),
    Reset,
    Seed(Promise<Option<Seed>>),
    Completed {
        epoch: u64,
        result: Result<Observation, TrackError>,
        outcome: Promise<FrameOutcome>,
    },
    State(Promise<ControllerState>),
    Shutdown,
}

struct FrameMsg {
    frame: Frame,
    outcome: Option<Promise<FrameOutcome>>,
}

/// A running tracking loop.
///
/// Dropping the session waits for the frame in flight (if any), then stops both threads. If
/// either of them panicked, the panic is propagated to the dropping thread.
pub struct Session {
    frames: Option<Worker<FrameMsg>>,
    handle: SessionHandle,
    ui: Option<JoinHandle<()>>,
}

impl Session {
    /// Starts a session driving `controller` with `tracker`.
    pub fn spawn<R, T>(controller: TrackingController<R>, tracker: T) -> io::Result<Self>
    where
        R: Renderer + Send + 'static,
        T: Tracker + Send + 'static,
    {
        let (sender, recv) = channel::unbounded();
        let ui = thread::Builder::new()
            .name("ui context".into())
            .spawn(move || ui_context(controller, recv))?;
        let handle = SessionHandle { sender };
        let frames = frame_worker(tracker, handle.clone())?;

        Ok(Self {
            frames: Some(frames),
            handle,
            ui: Some(ui),
        })
    }

    /// Returns a handle for delivering gestures to the session from any thread.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Submits a frame for tracking.
    ///
    /// Blocks until the worker has finished processing the previous frame.
    pub fn submit(&mut self, frame: Frame) {
        self.send(FrameMsg {
            frame,
            outcome: None,
        });
    }

    /// Submits a frame for tracking and waits for the result to be applied.
    pub fn track(&mut self, frame: Frame) -> Result<FrameOutcome, SessionError> {
        let (outcome, handle) = promise();
        self.send(FrameMsg {
            frame,
            outcome: Some(outcome),
        });
        handle.block().map_err(|_| SessionError::Closed)
    }

    fn send(&mut self, msg: FrameMsg) {
        if let Some(frames) = &mut self.frames {
            frames.send(msg);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The frame worker talks to the UI context, so it has to go first.
        drop(self.frames.take());

        self.handle.sender.send(UiMsg::Shutdown).ok();
        if let Some(ui) = self.ui.take() {
            if let Err(payload) = ui.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

/// A cloneable handle to a [`Session`]'s UI context.
///
/// All methods fail with [`SessionError::Closed`] once the session has been dropped.
#[derive(Clone)]
pub struct SessionHandle {
    sender: Sender<UiMsg>,
}

impl SessionHandle {
    /// Delivers a drag gesture event and waits until it has been applied.
    pub fn gesture(&self, event: GestureEvent) -> Result<(), SessionError> {
        let (result, handle) = promise();
        self.send(UiMsg::Gesture(event, result))?;
        Ok(handle.block().map_err(|_| SessionError::Closed)??)
    }

    /// Stops tracking. Takes effect before any message sent afterwards.
    pub fn reset(&self) -> Result<(), SessionError> {
        self.send(UiMsg::Reset)
    }

    /// Returns a snapshot of the controller state.
    pub fn state(&self) -> Result<ControllerState, SessionError> {
        let (state, handle) = promise();
        self.send(UiMsg::State(state))?;
        handle.block().map_err(|_| SessionError::Closed)
    }

    fn seed(&self) -> Result<Option<Seed>, SessionError> {
        let (seed, handle) = promise();
        self.send(UiMsg::Seed(seed))?;
        handle.block().map_err(|_| SessionError::Closed)
    }

    fn complete(
        &self,
        epoch: u64,
        result: Result<Observation, TrackError>,
    ) -> Result<FrameOutcome, SessionError> {
        let (outcome, handle) = promise();
        self.send(UiMsg::Completed {
            epoch,
            result,
            outcome,
        })?;
        handle.block().map_err(|_| SessionError::Closed)
    }

    fn send(&self, msg: UiMsg) -> Result<(), SessionError> {
        self.sender.send(msg).map_err(|_| SessionError::Closed)
    }
}

fn ui_context<R: Renderer>(mut controller: TrackingController<R>, recv: Receiver<UiMsg>) {
    log::trace!("ui context starting");
    for msg in recv {
        match msg {
            UiMsg::Gesture(event, result) => result.fulfill(controller.on_gesture(event)),
            UiMsg::Reset => controller.reset(),
            UiMsg::Seed(seed) => seed.fulfill(controller.seed()),
            UiMsg::Completed {
                epoch,
                result,
                outcome,
            } => outcome.fulfill(controller.apply_completion(epoch, result)),
            UiMsg::State(state) => state.fulfill(controller.state()),
            UiMsg::Shutdown => break,
        }
    }
    log::trace!("ui context exiting");
}

fn frame_worker<T: Tracker + Send + 'static>(
    mut tracker: T,
    ui: SessionHandle,
) -> io::Result<Worker<FrameMsg>> {
    let mut fps = FpsCounter::new("tracking");
    let t_track = Timer::new("track");

    Worker::builder()
        .name("frame worker")
        .spawn(move |FrameMsg { frame, outcome }| {
            let Ok(seed) = ui.seed() else { return };
            let result = match seed {
                Some(seed) => {
                    let result = t_track.time(|| tracker.track(&seed.region, &frame));
                    ui.complete(seed.epoch, result)
                }
                None => Ok(FrameOutcome::Inactive),
            };

            match (result, outcome) {
                (Ok(result), Some(outcome)) => outcome.fulfill(result),
                (Ok(result), None) => log::trace!("frame {}: {result:?}", frame.index()),
                (Err(_), _) => return,
            }

            fps.tick_with([&t_track]);
        })
}
