use crate::collector::{SampleCollector, KEY_POLL_MS};
use crate::config::CalibrationConfig;
use crate::display::{Display, KEY_ESCAPE};
use crate::source::{FrameSource, SourceError};
use crate::store::IntrinsicsStore;
use crate::CalibError;
use lenscal_chessboard::{
    default_chess_config, ChessCornerDetector, ChessboardDetector, CornerDetector,
};
use lenscal_core::IntrinsicModel;
use lenscal_optim::{Calibration, CalibrationSolver};
use lenscal_undistort::{build_undistortion_map, LiveCorrector};
use log::{info, warn};
use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Window name of the live corrected preview.
pub const LIVE_WINDOW: &str = "Undistorted";

/// Outcome of [`Pipeline::calibrate`].
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    /// Solver output, including the in-memory model.
    pub calibration: Calibration,
    /// Model as read back from `output_path`.
    pub model: IntrinsicModel,
    pub output_path: PathBuf,
    /// `true` when the reprojection error exceeds the configured threshold.
    pub poor_fit: bool,
    /// Remap built from the read-back model.
    pub corrector: LiveCorrector,
}

/// Collect -> solve -> persist -> build map, then correct live frames.
pub struct Pipeline<D> {
    config: CalibrationConfig,
    detector: D,
}

impl Pipeline<ChessCornerDetector> {
    /// Pipeline using the ChESS corner detector with the configured grid parameters.
    pub fn with_chess_detector(config: CalibrationConfig) -> Result<Self, CalibError> {
        let grid = ChessboardDetector::new(config.chessboard.clone());
        Self::new(config, ChessCornerDetector::new(default_chess_config(), grid))
    }
}

impl<D: CornerDetector> Pipeline<D> {
    pub fn new(config: CalibrationConfig, detector: D) -> Result<Self, CalibError> {
        config.validate()?;
        Ok(Self { config, detector })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Run the calibration phase against `source`.
    ///
    /// Nothing is written when collection or the solve fails. The returned
    /// corrector is built from the model read back from disk.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(board = %self.config.board, n_boards = self.config.n_boards)
        )
    )]
    pub fn calibrate<S, W>(
        &self,
        source: &mut S,
        display: &mut W,
    ) -> Result<CalibrationReport, CalibError>
    where
        S: FrameSource + ?Sized,
        W: Display + ?Sized,
    {
        if !source.is_ready() {
            return Err(SourceError::NotReady.into());
        }
        let config = &self.config;
        let collector = SampleCollector::new(
            config.board,
            config.n_boards,
            config.debounce_interval(),
            config.detection_scale()?,
            &self.detector,
            config.clock()?,
        );
        let (samples, image_size) = collector.run(source, display)?;

        info!("calibrating {} boards at {}", samples.len(), image_size);
        let solver = CalibrationSolver::new(config.solver.clone());
        let calibration = solver.solve(&samples, image_size)?;
        info!("reprojection error {:.4} px", calibration.rms);
        let poor_fit = calibration.rms > config.max_rms_px;
        if poor_fit {
            warn!(
                "reprojection error {:.4} px exceeds {:.4} px; consider recalibrating",
                calibration.rms, config.max_rms_px
            );
        }

        let store = IntrinsicsStore::new(&config.output_path);
        let model = store.write_verified(&calibration.model)?;
        info!("stored intrinsics in {}", store.path().display());

        let corrector = LiveCorrector::new(build_undistortion_map(&model));
        Ok(CalibrationReport {
            calibration,
            model,
            output_path: config.output_path.clone(),
            poor_fit,
            corrector,
        })
    }

    /// Correct and show frames until the stream ends or ESC is pressed.
    ///
    /// Returns the number of corrected frames. End of stream is a normal
    /// exit.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn run_live<S, W>(
        &self,
        source: &mut S,
        display: &mut W,
        corrector: &LiveCorrector,
    ) -> Result<usize, CalibError>
    where
        S: FrameSource + ?Sized,
        W: Display + ?Sized,
    {
        let mut frames = 0usize;
        while let Some(frame) = source.next_frame()? {
            let corrected = corrector.correct(&frame)?;
            frames += 1;
            display.show(LIVE_WINDOW, &corrected)?;
            if display.poll_key(KEY_POLL_MS) == Some(KEY_ESCAPE) {
                info!("live correction stopped by the operator");
                break;
            }
        }
        info!("corrected {frames} live frames");
        Ok(frames)
    }
}
