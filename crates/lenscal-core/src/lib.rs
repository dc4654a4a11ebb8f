//! Core types and utilities for single-camera intrinsic calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, image type or solver backend.
//!
//! ## Quickstart
//!
//! ```
//! use lenscal_core::{BoardGeometry, CalibrationSample, SampleSet};
//! use nalgebra::Point2;
//!
//! let board = BoardGeometry::new(9, 6)?;
//! let object = board.object_points();
//! assert_eq!(object.len(), 54);
//!
//! // Pretend a detector returned exactly one pixel per corner.
//! let pixels: Vec<Point2<f64>> = object
//!     .iter()
//!     .map(|p| Point2::new(p.y * 10.0, p.x * 10.0))
//!     .collect();
//! let mut samples = SampleSet::new();
//! samples.push(CalibrationSample::for_board(&board, pixels)?);
//! assert!(samples.is_complete(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## API map
//! - [`BoardGeometry`]: interior-corner layout and the fixed object point generator.
//! - [`CalibrationSample`] / [`SampleSet`]: index-aligned 3D/2D correspondences.
//! - [`IntrinsicModel`]: camera matrix + distortion vector + calibration resolution.
//! - [`Distortion`] / [`PinholeCamera`]: the forward projection model.
//! - [`Homography`]: normalised DLT used for initialisation.
//! - [`GridTransform`]: dihedral symmetries of the integer grid.

mod board;
mod camera;
mod corner;
mod grid_transform;
mod homography;
mod logger;
mod model;
mod sample;

pub use board::{BoardError, BoardGeometry};
pub use camera::{Distortion, PinholeCamera};
pub use corner::Corner;
pub use grid_transform::{GridTransform, GRID_TRANSFORMS_D4};
pub use homography::{estimate_homography, Homography};
pub use model::{ImageSize, IntrinsicModel, ModelError};
pub use sample::{CalibrationSample, SampleError, SampleSet};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, parse_level, LevelParseError};
