//! A tracker based on normalized cross-correlation template matching.

use image::{
    imageops::{self, FilterType},
    GrayImage, Pixel,
};
use itertools::iproduct;
use oikake_image::{num::TotalF32, Rect, Resolution};

use crate::{
    frame::Frame,
    region::{Observation, TrackedRegion},
    timer::Timer,
};

use super::{TrackError, Tracker, TrackingLevel};

/// Smallest region width or height (in frame pixels) that can be tracked.
const MIN_REGION_SIZE: f32 = 2.0;

/// Variance below which an image patch is considered flat (and impossible to match).
const FLAT_EPSILON: f32 = 1e-6;

struct Params {
    /// Maximum side length of the template, in working pixels. Larger regions are downscaled.
    template_size: f32,
    /// How far to search around the last position, relative to the region size.
    search_margin: f32,
    /// Distance between candidate positions of the coarse search, in working pixels.
    stride: usize,
}

impl Params {
    fn for_level(level: TrackingLevel) -> Self {
        match level {
            TrackingLevel::Fast => Self {
                template_size: 24.0,
                search_margin: 0.5,
                stride: 2,
            },
            TrackingLevel::Accurate => Self {
                template_size: 48.0,
                search_margin: 0.75,
                stride: 1,
            },
        }
    }
}

/// Tracks a region by searching each new frame for the appearance it had in the previous one.
///
/// When handed a seed it did not produce itself (ie. the user drew a new region), the tracker
/// captures the seed's contents as its template and reports the seed back with full confidence.
/// On subsequent frames, a window around the previous location is searched for the position that
/// correlates best with the template. The correlation coefficient is reported as the
/// observation's confidence, and the template is refreshed whenever it is at least
/// [`TemplateTracker::DEFAULT_UPDATE_THRESHOLD`] (or the value set with
/// [`TemplateTracker::set_update_threshold`]).
///
/// Matching is done on a grayscale, downscaled copy of the search window. Only translation is
/// estimated: the region keeps the size it was seeded with.
pub struct TemplateTracker {
    level: TrackingLevel,
    params: Params,
    update_thresh: f32,
    model: Option<Model>,
    t_sample: Timer,
    t_search: Timer,
}

struct Model {
    template: Template,
    /// Working pixels per frame pixel.
    scale: f32,
    /// Pixel rectangle the template was last matched at.
    rect: Rect,
    resolution: Resolution,
    /// The region reported by the last call to `track`.
    last: TrackedRegion,
}

impl TemplateTracker {
    pub const DEFAULT_UPDATE_THRESHOLD: f32 = 0.7;

    pub fn new(level: TrackingLevel) -> Self {
        Self {
            level,
            params: Params::for_level(level),
            update_thresh: Self::DEFAULT_UPDATE_THRESHOLD,
            model: None,
            t_sample: Timer::new("sample"),
            t_search: Timer::new("search"),
        }
    }

    pub fn level(&self) -> TrackingLevel {
        self.level
    }

    /// Sets the confidence at or above which the template is replaced with the latest match.
    ///
    /// Higher values make the tracker less prone to drifting off the object, but also less able
    /// to follow appearance changes.
    pub fn set_update_threshold(&mut self, threshold: f32) {
        self.update_thresh = threshold;
    }

    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_sample, &self.t_search]
    }

    fn capture(&mut self, seed: &TrackedRegion, frame: &Frame) -> Result<Observation, TrackError> {
        let res = frame.resolution();
        let px = seed.to_pixels(res);
        if px.width() < MIN_REGION_SIZE || px.height() < MIN_REGION_SIZE {
            return Err(TrackError::RegionTooSmall(px));
        }
        let area = PixelArea::clamped(px, res).ok_or(TrackError::OutsideFrame(px))?;

        let scale = (self.params.template_size / px.width().max(px.height())).min(1.0);
        let patch = self.t_sample.time(|| Plane::sample(frame, area, scale));
        let template = Template::new(patch);
        log::trace!(
            "TemplateTracker: captured {}x{} template at {:?} (scale {scale})",
            template.patch.width,
            template.patch.height,
            area.rect(),
        );

        self.model = Some(Model {
            template,
            scale,
            rect: area.rect(),
            resolution: res,
            last: *seed,
        });
        Ok(Observation::new(*seed, 1.0))
    }
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(TrackingLevel::default())
    }
}

impl Tracker for TemplateTracker {
    fn track(&mut self, seed: &TrackedRegion, frame: &Frame) -> Result<Observation, TrackError> {
        let res = frame.resolution();
        // Taken out while matching: on errors, the next call starts over from its seed.
        let mut model = match self.model.take() {
            Some(model) if model.last == *seed && model.resolution == res => model,
            Some(model) if model.resolution != res => {
                log::debug!(
                    "TemplateTracker: resolution changed from {} to {res}, recapturing",
                    model.resolution,
                );
                return self.capture(seed, frame);
            }
            _ => return self.capture(seed, frame),
        };

        let margin = model.rect.size() * self.params.search_margin;
        let window = Rect::from_top_left(
            model.rect.x() - margin.x,
            model.rect.y() - margin.y,
            model.rect.width() + 2.0 * margin.x,
            model.rect.height() + 2.0 * margin.y,
        );
        let area = PixelArea::clamped(window, res).ok_or(TrackError::OutsideFrame(model.rect))?;
        let plane = self.t_sample.time(|| Plane::sample(frame, area, model.scale));

        let template = &model.template;
        let (tw, th) = (template.patch.width, template.patch.height);
        if plane.width < tw || plane.height < th {
            return Err(TrackError::OutsideFrame(model.rect));
        }

        let (best_x, best_y, score) = if template.is_flat() {
            // Nothing to match against, stay put.
            let x = ((model.rect.x() - area.x as f32) * model.scale).round() as usize;
            let y = ((model.rect.y() - area.y as f32) * model.scale).round() as usize;
            (x.min(plane.width - tw), y.min(plane.height - th), 0.0)
        } else {
            self.t_search
                .time(|| search(&plane, template, self.params.stride))
        };

        let rect = model.rect.move_to(
            area.x as f32 + best_x as f32 / model.scale,
            area.y as f32 + best_y as f32 / model.scale,
        );
        let region = TrackedRegion::from_pixels(rect, res)
            .map_err(|e| TrackError::Other(e.to_string()))?;

        if score >= self.update_thresh {
            model.template = Template::new(plane.crop(best_x, best_y, tw, th));
        } else {
            log::trace!(
                "TemplateTracker: confidence {score}, update threshold {} -> keeping template",
                self.update_thresh,
            );
        }
        model.rect = rect;
        model.last = region;
        self.model = Some(model);

        Ok(Observation::new(region, score))
    }
}

/// Finds the position in `plane` where `template` correlates best.
///
/// With a `stride` above 1, a coarse grid is searched first and its best match refined.
fn search(plane: &Plane, template: &Template, stride: usize) -> (usize, usize, f32) {
    let (tw, th) = (template.patch.width, template.patch.height);
    let max_x = plane.width - tw;
    let max_y = plane.height - th;

    let best_in = |xs: std::ops::RangeInclusive<usize>,
                   ys: std::ops::RangeInclusive<usize>,
                   step: usize| {
        iproduct!(ys.step_by(step), xs.step_by(step))
            .map(|(y, x)| (x, y, template.correlate(plane, x, y)))
            .max_by_key(|&(_, _, score)| TotalF32(score))
    };

    let Some(coarse) = best_in(0..=max_x, 0..=max_y, stride) else {
        return (0, 0, 0.0);
    };
    if stride <= 1 {
        return coarse;
    }

    let (cx, cy, _) = coarse;
    let r = stride - 1;
    best_in(
        cx.saturating_sub(r)..=(cx + r).min(max_x),
        cy.saturating_sub(r)..=(cy + r).min(max_y),
        1,
    )
    .unwrap_or(coarse)
}

/// An integer pixel rectangle that is fully contained in a frame.
#[derive(Debug, Clone, Copy)]
struct PixelArea {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl PixelArea {
    /// Rounds `rect` outwards to whole pixels and cuts it down to the frame.
    ///
    /// Returns [`None`] if no pixel of the frame is covered.
    fn clamped(rect: Rect, res: Resolution) -> Option<Self> {
        let (w, h) = (res.width() as f32, res.height() as f32);
        let x0 = rect.x().floor().clamp(0.0, w);
        let y0 = rect.y().floor().clamp(0.0, h);
        let x1 = (rect.x() + rect.width()).ceil().clamp(0.0, w);
        let y1 = (rect.y() + rect.height()).ceil().clamp(0.0, h);
        if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
            return None;
        }

        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    fn rect(&self) -> Rect {
        Rect::from_top_left(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

/// A grayscale image with intensities in the range 0.0 to 1.0.
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    /// Extracts `area` from `frame`, converts it to grayscale and scales it by `scale`.
    fn sample(frame: &Frame, area: PixelArea, scale: f32) -> Self {
        let image = frame.image();
        let gray = GrayImage::from_fn(area.width, area.height, |x, y| {
            image.get_pixel(area.x + x, area.y + y).to_luma()
        });
        let width = ((area.width as f32 * scale).round() as u32).max(1);
        let height = ((area.height as f32 * scale).round() as u32).max(1);
        let gray = if (width, height) == gray.dimensions() {
            gray
        } else {
            imageops::resize(&gray, width, height, FilterType::Triangle)
        };

        Self {
            width: width as usize,
            height: height as usize,
            data: gray.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect(),
        }
    }

    fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Self {
        let data = (y..y + height)
            .flat_map(|row| &self.data[row * self.width + x..][..width])
            .copied()
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    fn row(&self, x: usize, y: usize, len: usize) -> &[f32] {
        &self.data[y * self.width + x..][..len]
    }
}

/// A zero-mean image patch to correlate against.
struct Template {
    patch: Plane,
    /// Euclidean norm of the zero-mean patch.
    norm: f32,
}

impl Template {
    fn new(mut patch: Plane) -> Self {
        let mean = patch.data.iter().sum::<f32>() / patch.data.len() as f32;
        patch.data.iter_mut().for_each(|v| *v -= mean);
        let norm = patch.data.iter().map(|v| v * v).sum::<f32>().sqrt();
        Self { patch, norm }
    }

    fn is_flat(&self) -> bool {
        self.norm * self.norm <= FLAT_EPSILON
    }

    /// Computes the zero-mean normalized cross-correlation of the template and the window of
    /// `image` whose top left corner is at `x`,`y`.
    ///
    /// Returns a value between -1.0 and 1.0. Flat windows correlate with nothing and yield 0.0.
    fn correlate(&self, image: &Plane, x: usize, y: usize) -> f32 {
        let (w, h) = (self.patch.width, self.patch.height);
        let n = (w * h) as f32;

        let (mut sum, mut sum_sq, mut dot) = (0.0, 0.0, 0.0);
        for row in 0..h {
            let pixels = image.row(x, y + row, w);
            let weights = self.patch.row(0, row, w);
            for (&p, &t) in pixels.iter().zip(weights) {
                sum += p;
                sum_sq += p * p;
                dot += p * t;
            }
        }

        // `dot` needs no mean correction: the template sums to zero.
        let var = sum_sq - sum * sum / n;
        if var <= FLAT_EPSILON || self.is_flat() {
            return 0.0;
        }
        dot / (var.sqrt() * self.norm)
    }
}
