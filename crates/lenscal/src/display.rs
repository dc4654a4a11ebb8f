//! Operator preview sinks.

use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Key code that stops collection or the live loop.
pub const KEY_ESCAPE: u32 = 27;

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Shows preview frames and reports operator key presses.
pub trait Display {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<(), DisplayError>;

    /// Key pressed within `timeout_ms`, if any.
    fn poll_key(&mut self, timeout_ms: u64) -> Option<u32>;
}

impl<D: Display + ?Sized> Display for &mut D {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<(), DisplayError> {
        (**self).show(window, image)
    }

    fn poll_key(&mut self, timeout_ms: u64) -> Option<u32> {
        (**self).poll_key(timeout_ms)
    }
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<(), DisplayError> {
        (**self).show(window, image)
    }

    fn poll_key(&mut self, timeout_ms: u64) -> Option<u32> {
        (**self).poll_key(timeout_ms)
    }
}

/// Discards every frame; never reports a key.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn show(&mut self, _window: &str, _image: &RgbImage) -> Result<(), DisplayError> {
        Ok(())
    }

    fn poll_key(&mut self, _timeout_ms: u64) -> Option<u32> {
        None
    }
}

/// Writes every shown frame as `<window>_<nnnnn>.png` into a directory.
#[derive(Debug, Clone)]
pub struct ImageDirDisplay {
    dir: PathBuf,
    shown: u64,
}

impl ImageDirDisplay {
    /// Create `dir` if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, DisplayError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, shown: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of frames written so far.
    pub fn shown(&self) -> u64 {
        self.shown
    }

    fn frame_path(&self, window: &str) -> PathBuf {
        let stem: String = window
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        self.dir.join(format!("{stem}_{:05}.png", self.shown))
    }
}

impl Display for ImageDirDisplay {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<(), DisplayError> {
        let path = self.frame_path(window);
        image.save_with_format(&path, image::ImageFormat::Png)?;
        self.shown += 1;
        Ok(())
    }

    fn poll_key(&mut self, _timeout_ms: u64) -> Option<u32> {
        None
    }
}
