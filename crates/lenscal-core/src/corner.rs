use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Raw X-junction reported by a corner detector, before any grid reasoning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    /// Subpixel position in image pixels.
    pub position: Point2<f32>,
    /// Dominant edge orientation in radians, defined modulo `PI`.
    pub orientation: f32,
    /// Detector response; larger is more confident.
    pub strength: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32, orientation: f32, strength: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
            strength,
        }
    }
}
