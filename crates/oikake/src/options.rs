//! Tracking loop configuration.

use std::env::{self, VarError};

use anyhow::bail;

use crate::{coords::Gravity, gesture::DragRectMode, tracker::TrackingLevel};

const ENV_VAR_TRACKING_LEVEL: &str = "OIKAKE_TRACKING_LEVEL";
const ENV_VAR_DRAG_MODE: &str = "OIKAKE_DRAG_MODE";
const ENV_VAR_CONFIDENCE_THRESHOLD: &str = "OIKAKE_CONFIDENCE_THRESHOLD";

/// Options controlling a [`TrackingController`][crate::controller::TrackingController].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingOptions {
    confidence_threshold: f32,
    drag_mode: DragRectMode,
    tracking_level: TrackingLevel,
    gravity: Gravity,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
            drag_mode: DragRectMode::default(),
            tracking_level: TrackingLevel::default(),
            gravity: Gravity::default(),
        }
    }
}

impl TrackingOptions {
    /// Observations with at least this confidence move the overlay.
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;

    /// Creates options from the defaults, overridden by any `OIKAKE_*` environment variables that
    /// are set.
    ///
    /// See the [crate documentation][crate] for the supported variables. Invalid values result in
    /// an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_vars(|name| env::var(name))
    }

    fn with_vars(
        mut self,
        var: impl Fn(&str) -> Result<String, VarError>,
    ) -> anyhow::Result<Self> {
        if let Some(value) = lookup(&var, ENV_VAR_TRACKING_LEVEL)? {
            self.tracking_level = match value.as_str() {
                "fast" => TrackingLevel::Fast,
                "accurate" => TrackingLevel::Accurate,
                _ => bail!(
                    "invalid value set for `{ENV_VAR_TRACKING_LEVEL}` variable: '{value}' \
                     (expected `fast` or `accurate`)"
                ),
            };
        }
        if let Some(value) = lookup(&var, ENV_VAR_DRAG_MODE)? {
            self.drag_mode = match value.as_str() {
                "anchored" => DragRectMode::Anchored,
                "spanning" => DragRectMode::Spanning,
                _ => bail!(
                    "invalid value set for `{ENV_VAR_DRAG_MODE}` variable: '{value}' \
                     (expected `anchored` or `spanning`)"
                ),
            };
        }
        if let Some(value) = lookup(&var, ENV_VAR_CONFIDENCE_THRESHOLD)? {
            match value.parse::<f32>() {
                Ok(threshold) if (0.0..=1.0).contains(&threshold) => {
                    self.confidence_threshold = threshold;
                }
                _ => bail!(
                    "invalid value set for `{ENV_VAR_CONFIDENCE_THRESHOLD}` variable: '{value}' \
                     (expected a number between 0 and 1)"
                ),
            }
        }
        Ok(self)
    }

    /// Sets the confidence at or above which observations are shown as confident.
    ///
    /// By default, [`TrackingOptions::DEFAULT_CONFIDENCE_THRESHOLD`] is used.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is not in the range 0.0 to 1.0.
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "confidence threshold {threshold} out of range"
        );
        self.confidence_threshold = threshold;
        self
    }

    /// Selects how a drag gesture is turned into a rectangle.
    pub fn drag_mode(mut self, mode: DragRectMode) -> Self {
        self.drag_mode = mode;
        self
    }

    /// Selects the tracker's speed/robustness trade-off.
    pub fn tracking_level(mut self, level: TrackingLevel) -> Self {
        self.tracking_level = level;
        self
    }

    /// Selects how frames are laid out on the rendering surface.
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn get_confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn get_drag_mode(&self) -> DragRectMode {
        self.drag_mode
    }

    pub fn get_tracking_level(&self) -> TrackingLevel {
        self.tracking_level
    }

    pub fn get_gravity(&self) -> Gravity {
        self.gravity
    }
}

fn lookup(
    var: impl Fn(&str) -> Result<String, VarError>,
    name: &str,
) -> anyhow::Result<Option<String>> {
    match var(name) {
        Ok(value) => {
            log::debug!("option override: `{name}` is set to '{value}'");
            Ok(Some(value))
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(s)) => bail!(
            "invalid value set for `{name}` variable: {}",
            s.to_string_lossy()
        ),
    }
}
