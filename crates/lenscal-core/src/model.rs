use crate::{Distortion, PinholeCamera};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("image resolution must be positive (got {width}x{height})")]
    InvalidResolution { width: u32, height: u32 },
    #[error("camera matrix must be upper-triangular with K[2][2] = 1")]
    NotUpperTriangular,
    #[error("focal lengths must be finite and positive (fx={fx}, fy={fy})")]
    InvalidFocalLength { fx: f64, fy: f64 },
    #[error("model contains non-finite values")]
    NonFinite,
    #[error("unsupported distortion coefficient count {0} (expected 4, 5, 8, 12 or 14)")]
    UnsupportedDistortionLength(usize),
    #[error("thin-prism and tilt distortion terms are not supported and must be zero")]
    UnsupportedDistortionTerms,
}

/// Image resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Geometric image centre `((w - 1) / 2, (h - 1) / 2)` in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.width as f64 - 1.0) * 0.5,
            (self.height as f64 - 1.0) * 0.5,
        )
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Calibrated intrinsic camera model.
///
/// Invariants (checked on construction):
/// - positive resolution,
/// - `camera_matrix` upper-triangular with `K[2][2] == 1` and positive focal lengths,
/// - `distortion_coeffs` in one of the OpenCV layouts (see [`Distortion::from_coeffs`]).
#[derive(Clone, Debug, PartialEq)]
pub struct IntrinsicModel {
    image_width: u32,
    image_height: u32,
    camera_matrix: Matrix3<f64>,
    distortion_coeffs: Vec<f64>,
    distortion: Distortion,
}

impl IntrinsicModel {
    pub fn new(
        image_width: u32,
        image_height: u32,
        camera_matrix: Matrix3<f64>,
        distortion_coeffs: Vec<f64>,
    ) -> Result<Self, ModelError> {
        if image_width == 0 || image_height == 0 {
            return Err(ModelError::InvalidResolution {
                width: image_width,
                height: image_height,
            });
        }
        validate_camera_matrix(&camera_matrix)?;
        let distortion = Distortion::from_coeffs(&distortion_coeffs)?;
        Ok(Self {
            image_width,
            image_height,
            camera_matrix,
            distortion_coeffs,
            distortion,
        })
    }

    /// Build a model from a camera and the number of coefficients to persist.
    pub fn from_camera(
        size: ImageSize,
        camera: &PinholeCamera,
        coeff_len: usize,
    ) -> Result<Self, ModelError> {
        Self::new(
            size.width,
            size.height,
            camera.matrix(),
            camera.distortion.to_coeffs(coeff_len),
        )
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.image_width, self.image_height)
    }

    pub fn camera_matrix(&self) -> &Matrix3<f64> {
        &self.camera_matrix
    }

    pub fn distortion_coeffs(&self) -> &[f64] {
        &self.distortion_coeffs
    }

    pub fn distortion(&self) -> Distortion {
        self.distortion
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    pub fn camera(&self) -> PinholeCamera {
        PinholeCamera::from_matrix(&self.camera_matrix, self.distortion)
    }

    /// Element-wise comparison with a relative tolerance.
    pub fn approx_eq(&self, other: &IntrinsicModel, rel_tol: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= rel_tol * (1.0 + a.abs().max(b.abs()));
        self.image_width == other.image_width
            && self.image_height == other.image_height
            && self.distortion_coeffs.len() == other.distortion_coeffs.len()
            && self
                .camera_matrix
                .iter()
                .zip(other.camera_matrix.iter())
                .all(|(&a, &b)| close(a, b))
            && self
                .distortion_coeffs
                .iter()
                .zip(other.distortion_coeffs.iter())
                .all(|(&a, &b)| close(a, b))
    }
}

fn validate_camera_matrix(k: &Matrix3<f64>) -> Result<(), ModelError> {
    if k.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite);
    }
    if k[(1, 0)] != 0.0 || k[(2, 0)] != 0.0 || k[(2, 1)] != 0.0 || k[(2, 2)] != 1.0 {
        return Err(ModelError::NotUpperTriangular);
    }
    let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
    if fx <= 0.0 || fy <= 0.0 {
        return Err(ModelError::InvalidFocalLength { fx, fy });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 319.5, 0.0, 790.0, 239.5, 0.0, 0.0, 1.0)
    }

    #[test]
    fn validates_camera_matrix() {
        assert!(IntrinsicModel::new(640, 480, k(), vec![0.0; 5]).is_ok());

        let mut bad = k();
        bad[(2, 2)] = 2.0;
        assert_eq!(
            IntrinsicModel::new(640, 480, bad, vec![0.0; 5]),
            Err(ModelError::NotUpperTriangular)
        );

        let mut negative = k();
        negative[(0, 0)] = -1.0;
        assert!(matches!(
            IntrinsicModel::new(640, 480, negative, vec![0.0; 5]),
            Err(ModelError::InvalidFocalLength { .. })
        ));

        assert!(matches!(
            IntrinsicModel::new(0, 480, k(), vec![0.0; 5]),
            Err(ModelError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn approx_eq_tolerates_rounding_only() {
        let a = IntrinsicModel::new(640, 480, k(), vec![-0.2, 0.05, 0.0, 0.0, 0.01]).unwrap();
        let mut k2 = k();
        k2[(0, 0)] += 1e-10;
        let b = IntrinsicModel::new(640, 480, k2, vec![-0.2, 0.05, 0.0, 0.0, 0.01]).unwrap();
        assert!(a.approx_eq(&b, 1e-9));

        let c = IntrinsicModel::new(640, 480, k(), vec![-0.21, 0.05, 0.0, 0.0, 0.01]).unwrap();
        assert!(!a.approx_eq(&c, 1e-9));
    }

    #[test]
    fn image_center_is_pixel_centered() {
        assert_eq!(ImageSize::new(640, 480).center(), (319.5, 239.5));
    }
}
