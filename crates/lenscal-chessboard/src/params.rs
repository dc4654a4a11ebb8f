use serde::{Deserialize, Serialize};

/// Neighbour search parameters for the corner graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 50.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Parameters of the chessboard grid detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// Minimal corner strength to consider.
    pub min_strength: f32,

    /// Accepted neighbour distance, relative to the median nearest-neighbour
    /// distance: `[median * (1 - tol), median * (1 + tol)]`.
    pub spacing_tolerance: f32,

    /// Candidates queried from the kd-tree per corner.
    pub k_neighbors: usize,

    /// Tolerance on the 45 degree relation between corner orientation and edge.
    pub orientation_tolerance_deg: f32,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            spacing_tolerance: 0.6,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

impl ChessboardParams {
    /// Graph parameters for a board whose corners are roughly `spacing` pixels apart.
    pub fn graph_params(&self, spacing: f32) -> GridGraphParams {
        let tol = self.spacing_tolerance.clamp(0.0, 0.95);
        GridGraphParams {
            min_spacing_pix: spacing * (1.0 - tol),
            max_spacing_pix: spacing * (1.0 + tol),
            k_neighbors: self.k_neighbors,
            orientation_tolerance_deg: self.orientation_tolerance_deg,
        }
    }
}
