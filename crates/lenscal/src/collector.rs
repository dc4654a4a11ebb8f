use crate::clock::{Clock, Debouncer};
use crate::display::{Display, KEY_ESCAPE};
use crate::source::FrameSource;
use crate::CalibError;
use image::{imageops, RgbImage};
use lenscal_chessboard::{draw_corners, CornerDetector, DetectionScale};
use lenscal_core::{BoardGeometry, CalibrationSample, ImageSize, SampleSet};
use log::{debug, info, warn};
use nalgebra::Point2;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Window name of the collection preview.
pub const COLLECTION_WINDOW: &str = "Calibration";

/// Key poll timeout between frames, in milliseconds.
pub const KEY_POLL_MS: u64 = 30;

/// What happened to one frame during collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No complete board in the frame.
    Missed,
    /// Board found, but too soon after the last accepted sample.
    Debounced,
    /// Board found and stored; `collected` samples so far.
    Accepted { collected: usize },
}

/// Accumulates debounced board observations until `target` samples exist.
pub struct SampleCollector<D, C> {
    board: BoardGeometry,
    target: usize,
    scale: DetectionScale,
    detector: D,
    clock: C,
    debouncer: Debouncer,
    samples: SampleSet,
    image_size: Option<ImageSize>,
    last_points: Option<Vec<Point2<f32>>>,
}

impl<D: CornerDetector, C: Clock> SampleCollector<D, C> {
    pub fn new(
        board: BoardGeometry,
        target: usize,
        min_interval: Duration,
        scale: DetectionScale,
        detector: D,
        clock: C,
    ) -> Self {
        Self {
            board,
            target,
            scale,
            detector,
            clock,
            debouncer: Debouncer::new(min_interval),
            samples: SampleSet::with_capacity(target),
            image_size: None,
            last_points: None,
        }
    }

    pub fn board(&self) -> BoardGeometry {
        self.board
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn collected(&self) -> usize {
        self.samples.len()
    }

    pub fn is_done(&self) -> bool {
        self.samples.len() >= self.target
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// Resolution of the processed frames (before detection-time scaling).
    ///
    /// Fixed by the first accepted sample; later frames of another size are
    /// treated as misses.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    /// Full-resolution corners of the most recent successful detection
    /// in the most recent frame, if it had one.
    pub fn last_points(&self) -> Option<&[Point2<f32>]> {
        self.last_points.as_deref()
    }

    /// Detect, debounce and possibly store one frame.
    ///
    /// The clock is read once per call. Frames arriving after the target
    /// was reached are ignored as misses.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, frame),
            fields(collected = self.samples.len())
        )
    )]
    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameOutcome {
        let now = self.clock.now();
        self.last_points = None;
        if self.is_done() {
            return FrameOutcome::Missed;
        }
        let size = ImageSize::new(frame.width(), frame.height());
        match self.image_size {
            Some(expected) if expected != size && !self.samples.is_empty() => {
                warn!("frame size {size} differs from the collected samples ({expected})");
                return FrameOutcome::Missed;
            }
            _ => self.image_size = Some(size),
        }

        let gray = imageops::grayscale(frame);
        let small = self.scale.downscale(&gray);
        let Some(points) = self.detector.detect(&small, self.board) else {
            return FrameOutcome::Missed;
        };
        if points.len() != self.board.corner_count() {
            warn!(
                "detector returned {} points for a {} board; treating as a miss",
                points.len(),
                self.board
            );
            return FrameOutcome::Missed;
        }
        let full = self.scale.to_full_resolution(&points);
        self.last_points = Some(
            full.iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect(),
        );

        if !self.debouncer.admit(now) {
            return FrameOutcome::Debounced;
        }
        match CalibrationSample::for_board(&self.board, full) {
            Ok(sample) => {
                self.samples.push(sample);
                let collected = self.samples.len();
                info!("collected {} of {} boards", collected, self.target);
                FrameOutcome::Accepted { collected }
            }
            Err(err) => {
                warn!("dropping detection: {err}");
                FrameOutcome::Missed
            }
        }
    }

    /// Pull frames until `target` samples are collected.
    ///
    /// Every frame is previewed with its detected corners; an accepted
    /// frame is shown inverted. ESC aborts, and running out of frames first
    /// is [`CalibError::StreamEnded`].
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(target = self.target, board = %self.board))
    )]
    pub fn run<S, W>(
        mut self,
        source: &mut S,
        display: &mut W,
    ) -> Result<(SampleSet, ImageSize), CalibError>
    where
        S: FrameSource + ?Sized,
        W: Display + ?Sized,
    {
        let mut frames = 0usize;
        while !self.is_done() {
            let Some(frame) = source.next_frame()? else {
                warn!("frame source ended after {frames} frames");
                return Err(CalibError::StreamEnded {
                    collected: self.collected(),
                    target: self.target,
                });
            };
            frames += 1;
            let outcome = self.process_frame(&frame);
            debug!("frame {frames}: {outcome:?}");

            let preview = self.preview(frame, outcome);
            display.show(COLLECTION_WINDOW, &preview)?;
            if display.poll_key(KEY_POLL_MS) == Some(KEY_ESCAPE) && !self.is_done() {
                return Err(CalibError::Aborted {
                    collected: self.collected(),
                    target: self.target,
                });
            }
        }
        let size = self.image_size.ok_or(CalibError::StreamEnded {
            collected: self.collected(),
            target: self.target,
        })?;
        Ok((self.samples, size))
    }

    fn preview(&self, mut frame: RgbImage, outcome: FrameOutcome) -> RgbImage {
        if let Some(points) = &self.last_points {
            draw_corners(&mut frame, self.board, points, true);
        }
        if matches!(outcome, FrameOutcome::Accepted { .. }) {
            imageops::invert(&mut frame);
        }
        frame
    }
}
