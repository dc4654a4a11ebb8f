use lenscal_core::ModelError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("not enough samples for calibration (got {got}, need at least {need})")]
    NotEnoughSamples { got: usize, need: usize },
    #[error("degenerate calibration views: {0}")]
    DegenerateViews(&'static str),
    #[error("calibration diverged after {iterations} iterations (rms {rms:.4} px)")]
    Diverged { iterations: usize, rms: f64 },
    #[error("invalid image size {width}x{height}")]
    ImageSize { width: u32, height: u32 },
    #[error(transparent)]
    Model(#[from] ModelError),
}
