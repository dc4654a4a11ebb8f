//! Frame sources standing in for the capture device.

use image::RgbImage;
use log::debug;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("frame directory {} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("frame directory {} contains no images", .0.display())]
    Empty(PathBuf),
    #[error("frame source is not ready")]
    NotReady,
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Delivers colour frames one at a time.
///
/// `Ok(None)` marks the end of the stream and is not an error.
pub trait FrameSource {
    fn is_ready(&self) -> bool;
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        (**self).next_frame()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        (**self).next_frame()
    }
}

/// Replays the images of a directory in file-name order.
#[derive(Debug, Clone)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    /// Index the images under `dir`. A missing or image-less directory is
    /// reported as an unavailable device.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SourceError::Missing(dir.to_path_buf()));
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }
        paths.sort();
        debug!("{} frames in {}", paths.len(), dir.display());
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Frames not yet delivered.
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn is_ready(&self) -> bool {
        !self.paths.is_empty()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let frame = image::open(path).map_err(|source| SourceError::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(frame.to_rgb8()))
    }
}

/// In-memory frame sequence.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    frames: VecDeque<RgbImage>,
}

impl FrameQueue {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: RgbImage) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameQueue {
    fn is_ready(&self) -> bool {
        true
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        Ok(self.frames.pop_front())
    }
}
