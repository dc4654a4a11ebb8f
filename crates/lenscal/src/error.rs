use crate::{DisplayError, SourceError, StoreError};
use lenscal_optim::SolveError;
use lenscal_undistort::UndistortError;
use std::path::PathBuf;

/// Failures of the calibration pipeline.
///
/// A frame without a detectable board is not an error; it shows up as
/// [`crate::FrameOutcome::Missed`].
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("frame source: {0}")]
    Device(#[from] SourceError),
    #[error("frame stream ended after {collected} of {target} boards")]
    StreamEnded { collected: usize, target: usize },
    #[error("collection aborted by the operator after {collected} of {target} boards")]
    Aborted { collected: usize, target: usize },
    #[error("calibration failed: {0}")]
    Solve(#[from] SolveError),
    #[error("intrinsics read back from {} do not match the written model", path.display())]
    SerializationMismatch { path: PathBuf },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("undistortion: {0}")]
    Undistort(#[from] UndistortError),
    #[error("display: {0}")]
    Display(#[from] DisplayError),
}

impl CalibError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
