//! Chessboard corner detection for intrinsic calibration.
//!
//! The detector is split in two layers:
//! - [`ChessCornerDetector`] runs the ChESS response detector from
//!   `chess-corners` on a grayscale frame (feature `image`, on by default);
//! - [`ChessboardDetector`] turns the resulting corner cloud into the
//!   board's interior corners in row-major order, or reports a miss.
//!
//! Both sit behind the [`CornerDetector`] trait so the calibration pipeline
//! can be driven by any detector, including scripted ones in tests.
//!
//! Grid algorithm:
//! 1. Filter strong corners.
//! 2. Estimate spacing from nearest-neighbour distances and the grid axis
//!    from corner orientations.
//! 3. For each corner, keep at most one neighbour per axis direction.
//! 4. BFS connected components into integer coordinates.
//! 5. Accept a complete `columns x rows` component and canonicalise its
//!    orientation with the dihedral grid transforms.

mod detect;
mod detector;
mod draw;
mod geom;
mod gridgraph;
mod params;
mod scale;

#[cfg(feature = "image")]
pub use detect::{default_chess_config, ChessCornerDetector};
pub use detect::CornerDetector;
pub use detector::ChessboardDetector;
pub use draw::draw_corners;
pub use gridgraph::{GridGraph, NeighborDirection};
pub use params::{ChessboardParams, GridGraphParams};
pub use scale::{DetectionScale, ScaleError};
