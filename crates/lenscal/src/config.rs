//! JSON-loadable configuration of a calibration run.

use crate::clock::{Clock, FrameClock, WallClock};
use crate::CalibError;
use lenscal_chessboard::{ChessboardParams, DetectionScale};
use lenscal_core::BoardGeometry;
use lenscal_optim::SolverConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<ConfigIoError> for CalibError {
    fn from(err: ConfigIoError) -> Self {
        CalibError::Configuration(err.to_string())
    }
}

/// How the debounce interval is measured.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DebounceTiming {
    /// Process wall clock.
    #[default]
    WallClock,
    /// Nominal frame period of a stream delivering `fps` frames per second.
    FrameRate { fps: f64 },
}

fn default_delay_s() -> f64 {
    1.0
}

fn default_image_scale() -> f32 {
    0.5
}

fn default_output_path() -> PathBuf {
    PathBuf::from("intrinsics.json")
}

fn default_max_rms_px() -> f64 {
    1.0
}

/// Everything a calibration run needs besides its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub board: BoardGeometry,
    /// Samples to collect before solving.
    pub n_boards: usize,
    /// Minimum time between accepted samples, in seconds.
    #[serde(default = "default_delay_s")]
    pub delay_s: f64,
    /// Detection-time resampling factor.
    #[serde(default = "default_image_scale")]
    pub image_scale: f32,
    #[serde(default)]
    pub timing: DebounceTiming,
    #[serde(default)]
    pub chessboard: ChessboardParams,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Reprojection error above which the result is flagged as poor.
    #[serde(default = "default_max_rms_px")]
    pub max_rms_px: f64,
}

impl CalibrationConfig {
    pub fn new(board: BoardGeometry, n_boards: usize) -> Self {
        Self {
            board,
            n_boards,
            delay_s: default_delay_s(),
            image_scale: default_image_scale(),
            timing: DebounceTiming::default(),
            chessboard: ChessboardParams::default(),
            solver: SolverConfig::default(),
            output_path: default_output_path(),
            max_rms_px: default_max_rms_px(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CalibError> {
        if self.n_boards == 0 {
            return Err(CalibError::config("n_boards must be positive"));
        }
        let need = self.solver.min_samples.max(1);
        if self.n_boards < need {
            return Err(CalibError::config(format!(
                "n_boards must be at least {need} to calibrate (got {})",
                self.n_boards
            )));
        }
        if Duration::try_from_secs_f64(self.delay_s).is_err() {
            return Err(CalibError::config(format!(
                "delay must be a non-negative, representable number of seconds (got {})",
                self.delay_s
            )));
        }
        self.detection_scale()?;
        if let DebounceTiming::FrameRate { fps } = self.timing {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(CalibError::config(format!(
                    "frame rate must be positive (got {fps})"
                )));
            }
        }
        if !self.max_rms_px.is_finite() || self.max_rms_px < 0.0 {
            return Err(CalibError::config(format!(
                "max_rms_px must be a non-negative number (got {})",
                self.max_rms_px
            )));
        }
        Ok(())
    }

    /// `delay_s` as a duration; out-of-range delays saturate (rejected by
    /// [`Self::validate`]).
    pub fn debounce_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_s.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn detection_scale(&self) -> Result<DetectionScale, CalibError> {
        DetectionScale::new(self.image_scale).map_err(|e| CalibError::config(e.to_string()))
    }

    /// Fresh clock for the configured timing policy.
    pub fn clock(&self) -> Result<Box<dyn Clock>, CalibError> {
        match self.timing {
            DebounceTiming::WallClock => Ok(Box::new(WallClock::new())),
            DebounceTiming::FrameRate { fps } => FrameClock::new(fps)
                .map(|c| Box::new(c) as Box<dyn Clock>)
                .ok_or_else(|| {
                    CalibError::config(format!("frame rate must be positive (got {fps})"))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> BoardGeometry {
        BoardGeometry::new(9, 6).unwrap()
    }

    #[test]
    fn defaults_follow_the_command_line() {
        let cfg = CalibrationConfig::new(board(), 10);
        assert_eq!(cfg.delay_s, 1.0);
        assert_eq!(cfg.image_scale, 0.5);
        assert_eq!(cfg.timing, DebounceTiming::WallClock);
        assert_eq!(cfg.output_path, PathBuf::from("intrinsics.json"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let cfg: CalibrationConfig =
            serde_json::from_str(r#"{"board": {"columns": 7, "rows": 5}, "n_boards": 12}"#)
                .unwrap();
        assert_eq!(cfg.board.corner_count(), 35);
        assert_eq!(cfg.n_boards, 12);
        assert_eq!(cfg.debounce_interval(), Duration::from_secs(1));
        assert_eq!(cfg.solver.distortion_len, 5);
    }

    #[test]
    fn frame_rate_timing_parses() {
        let cfg: CalibrationConfig = serde_json::from_str(
            r#"{"board": {"columns": 9, "rows": 6}, "n_boards": 10,
                "timing": {"kind": "frame_rate", "fps": 30.0}}"#,
        )
        .unwrap();
        assert_eq!(cfg.timing, DebounceTiming::FrameRate { fps: 30.0 });
        assert!(cfg.clock().is_ok());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut cfg = CalibrationConfig::new(board(), 0);
        assert!(matches!(cfg.validate(), Err(CalibError::Configuration(_))));

        cfg.n_boards = 2;
        assert!(cfg.validate().is_err(), "fewer boards than the solver minimum");

        cfg.n_boards = 10;
        cfg.image_scale = 0.0;
        assert!(cfg.validate().is_err());

        cfg.image_scale = 0.5;
        cfg.delay_s = -1.0;
        assert!(cfg.validate().is_err());

        cfg.delay_s = 0.0;
        cfg.timing = DebounceTiming::FrameRate { fps: 0.0 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_delays_beyond_duration_range() {
        let mut cfg = CalibrationConfig::new(board(), 10);
        for delay in [1e20, f64::INFINITY, f64::NAN] {
            cfg.delay_s = delay;
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("delay"), "{err}");
        }
        cfg.delay_s = 1e20;
        assert_eq!(cfg.debounce_interval(), Duration::MAX);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calib.json");
        let mut cfg = CalibrationConfig::new(board(), 15);
        cfg.delay_s = 0.25;
        cfg.timing = DebounceTiming::FrameRate { fps: 25.0 };
        cfg.write_json(&path).unwrap();

        let loaded = CalibrationConfig::load_json(&path).unwrap();
        assert_eq!(loaded.n_boards, 15);
        assert_eq!(loaded.delay_s, 0.25);
        assert_eq!(loaded.timing, cfg.timing);
        assert_eq!(loaded.board, cfg.board);
    }
}
