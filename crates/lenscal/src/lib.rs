//! Checkerboard camera calibration with live lens undistortion.
//!
//! `lenscal` ties the workspace together:
//! - a [`SampleCollector`] pulls frames from a [`FrameSource`], runs a
//!   [`CornerDetector`] on a downscaled copy, debounces detections with a
//!   [`Clock`] and stores full-resolution correspondences;
//! - [`CalibrationSolver`] estimates focal lengths and radial distortion
//!   with the principal point fixed at the image centre;
//! - [`IntrinsicsStore`] persists the model as JSON and verifies the
//!   read-back;
//! - [`LiveCorrector`] undistorts every following frame.
//!
//! [`Pipeline`] runs those stages in order.
//!
//! ```no_run
//! use lenscal::{BoardGeometry, CalibrationConfig, ImageDirSource, NullDisplay, Pipeline};
//!
//! let config = CalibrationConfig::new(BoardGeometry::new(9, 6)?, 10);
//! let pipeline = Pipeline::with_chess_detector(config)?;
//! let mut source = ImageDirSource::open("frames")?;
//! let report = pipeline.calibrate(&mut source, &mut NullDisplay)?;
//! println!("rms {:.3} px", report.calibration.rms);
//! pipeline.run_live(&mut source, &mut NullDisplay, &report.corrector)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod clock;
mod collector;
mod config;
mod display;
mod error;
mod pipeline;
mod source;
mod store;

pub use clock::{Clock, Debouncer, FrameClock, WallClock};
pub use collector::{FrameOutcome, SampleCollector, COLLECTION_WINDOW, KEY_POLL_MS};
pub use config::{CalibrationConfig, ConfigIoError, DebounceTiming};
pub use display::{Display, DisplayError, ImageDirDisplay, NullDisplay, KEY_ESCAPE};
pub use error::CalibError;
pub use pipeline::{CalibrationReport, Pipeline, LIVE_WINDOW};
pub use source::{FrameQueue, FrameSource, ImageDirSource, SourceError};
pub use store::{IntrinsicsStore, StoreError};

pub use lenscal_chessboard::{ChessboardParams, CornerDetector, DetectionScale};
pub use lenscal_core::{BoardGeometry, CalibrationSample, ImageSize, IntrinsicModel, SampleSet};
pub use lenscal_optim::{Calibration, CalibrationSolver, SolveError, SolverConfig};
pub use lenscal_undistort::{build_undistortion_map, LiveCorrector, UndistortionMap};

pub use lenscal_chessboard as chessboard;
pub use lenscal_core as core;
pub use lenscal_optim as optim;
pub use lenscal_undistort as undistort;
