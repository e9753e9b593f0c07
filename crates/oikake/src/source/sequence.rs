use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use image::RgbaImage;
use oikake_image::Resolution;

use crate::{frame::Frame, timer::Timer};

use super::FrameSource;

/// Plays back a directory of still images, ordered by file name.
///
/// Files with an extension other than `jpg`, `jpeg`, `png` or `gif` are ignored. All images must
/// have the same resolution.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    resolution: Resolution,
    /// The first image, decoded eagerly to learn the resolution.
    first: Option<RgbaImage>,
    frame_interval: Duration,
    t_decode: Timer,
}

impl ImageSequence {
    /// Nominal time between two frames, used to timestamp them.
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

    /// Opens the image sequence stored in the directory at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        Self::open_impl(dir.as_ref())
    }

    fn open_impl(dir: &Path) -> anyhow::Result<Self> {
        let mut paths = fs::read_dir(dir)
            .with_context(|| format!("failed to read directory '{}'", dir.display()))?
            .map(|entry| Ok(entry?.path()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        paths.retain(|path| path.is_file() && is_supported(path));
        paths.sort();

        let Some(first) = paths.first() else {
            bail!("no supported images found in '{}'", dir.display());
        };
        let first = load(first)?;
        let resolution = Resolution::new(first.width(), first.height());
        log::debug!(
            "opened image sequence '{}': {} frames at {resolution}",
            dir.display(),
            paths.len(),
        );

        Ok(Self {
            paths,
            next: 0,
            resolution,
            first: Some(first),
            frame_interval: Self::DEFAULT_FRAME_INTERVAL,
            t_decode: Timer::new("decode"),
        })
    }

    /// Sets the time between two consecutive frames.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns profiling timers for image decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_decode].into_iter()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let image = match self.first.take() {
            Some(image) => image,
            None => self.t_decode.time(|| load(path))?,
        };
        if image.dimensions() != (self.resolution.width(), self.resolution.height()) {
            bail!(
                "'{}' is {}x{}, but the sequence is {}",
                path.display(),
                image.width(),
                image.height(),
                self.resolution,
            );
        }

        let index = self.next as u64;
        self.next += 1;
        Ok(Some(Frame::new(
            image,
            index,
            self.frame_interval * index as u32,
        )))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("jpg" | "jpeg" | "png" | "gif")
    )
}

fn load(path: &Path) -> anyhow::Result<RgbaImage> {
    let image = image::open(path).with_context(|| format!("failed to load '{}'", path.display()))?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("oikake-{name}-{}", std::process::id()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.0).ok();
        }
    }

    #[test]
    fn plays_sorted_images() {
        let dir = TempDir::new("sequence");
        for (name, value) in [("b.png", 200), ("a.png", 100), ("c.png", 50)] {
            RgbaImage::from_pixel(4, 3, Rgba([value, 0, 0, 255]))
                .save(dir.0.join(name))
                .unwrap();
        }
        fs::write(dir.0.join("notes.txt"), "not an image").unwrap();

        let mut seq = ImageSequence::open(&dir.0)
            .unwrap()
            .frame_interval(Duration::from_millis(10));
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.resolution(), Resolution::new(4, 3));

        let mut reds = Vec::new();
        while let Some(frame) = seq.next_frame().unwrap() {
            assert_eq!(
                frame.timestamp(),
                Duration::from_millis(10 * frame.index())
            );
            reds.push(frame.image().get_pixel(0, 0).0[0]);
        }
        assert_eq!(reds, [100, 200, 50]);
    }

    #[test]
    fn rejects_resolution_change() {
        let dir = TempDir::new("sequence-mismatch");
        RgbaImage::new(4, 3).save(dir.0.join("0.png")).unwrap();
        RgbaImage::new(3, 4).save(dir.0.join("1.png")).unwrap();

        let mut seq = ImageSequence::open(&dir.0).unwrap();
        assert!(seq.next_frame().unwrap().is_some());
        assert!(seq.next_frame().is_err());
    }

    #[test]
    fn rejects_empty_directory() {
        let dir = TempDir::new("sequence-empty");
        assert!(ImageSequence::open(&dir.0).is_err());
    }
}
