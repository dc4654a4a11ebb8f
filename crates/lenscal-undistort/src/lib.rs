//! Lens undistortion for live frames.
//!
//! [`build_undistortion_map`] turns an [`lenscal_core::IntrinsicModel`] into a
//! per-pixel lookup table once; [`LiveCorrector`] then applies it to every
//! incoming frame with bilinear interpolation and a constant border.
//!
//! ```
//! use lenscal_core::IntrinsicModel;
//! use lenscal_undistort::{build_undistortion_map, LiveCorrector};
//! use nalgebra::Matrix3;
//!
//! let k = Matrix3::new(300.0, 0.0, 79.5, 0.0, 300.0, 59.5, 0.0, 0.0, 1.0);
//! let model = IntrinsicModel::new(160, 120, k, vec![-0.2, 0.03, 0.0, 0.0, 0.0])?;
//! let corrector = LiveCorrector::new(build_undistortion_map(&model));
//!
//! let frame = image::RgbImage::new(160, 120);
//! let corrected = corrector.correct(&frame)?;
//! assert_eq!(corrected.dimensions(), (160, 120));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod map;
mod points;
mod remap;

pub use error::UndistortError;
pub use map::{build_undistortion_map, build_undistortion_map_with, UndistortionMap};
pub use points::undistort_points;
pub use remap::LiveCorrector;
