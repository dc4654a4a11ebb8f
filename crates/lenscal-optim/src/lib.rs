//! Nonlinear least-squares calibration of camera intrinsics.
//!
//! [`CalibrationSolver`] turns a [`lenscal_core::SampleSet`] into an
//! [`lenscal_core::IntrinsicModel`]:
//! 1. a homography per sample (normalised DLT),
//! 2. focal lengths from the homographies with the principal point held at
//!    the image centre,
//! 3. a board pose per sample from its homography,
//! 4. joint Levenberg-Marquardt refinement of focal lengths, radial
//!    distortion and all poses, minimising the pixel reprojection error.
//!
//! The solver is generic over [`NllsProblem`], so the LM backend can be
//! reused for other least-squares fits.

mod error;
pub mod init;
mod lm;
mod planar_intrinsics;
mod problem;

pub use error::SolveError;
pub use lm::{LevenbergMarquardt, SolveOptions, SolveReport, Termination};
pub use planar_intrinsics::{
    Calibration, CalibrationSolver, ModelConstraints, PlanarIntrinsicsProblem, SolverConfig,
};
pub use problem::{forward_difference_jacobian, NllsProblem};
