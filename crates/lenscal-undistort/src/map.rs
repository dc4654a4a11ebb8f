use crate::UndistortError;
use lenscal_core::{Distortion, ImageSize, IntrinsicModel};
use log::debug;
use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-pixel lookup table: destination pixel `(u, v)` samples the source
/// frame at `(map_x[i], map_y[i])`, `i = v * width + u`.
#[derive(Clone, Debug, PartialEq)]
pub struct UndistortionMap {
    width: u32,
    height: u32,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortionMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source coordinates for destination pixel `(u, v)`.
    #[inline]
    pub fn source_coords(&self, u: u32, v: u32) -> Option<(f32, f32)> {
        if u >= self.width || v >= self.height {
            return None;
        }
        let i = v as usize * self.width as usize + u as usize;
        Some((self.map_x[i], self.map_y[i]))
    }
}

/// Undistortion map at the calibration resolution, keeping the calibrated
/// camera matrix for the corrected view.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(model), fields(size = %model.image_size()))
)]
pub fn build_undistortion_map(model: &IntrinsicModel) -> UndistortionMap {
    let size = model.image_size();
    let k = *model.camera_matrix();
    // K is validated upper-triangular with positive focal lengths, hence invertible.
    let k_inv = upper_triangular_inverse(&k);
    fill_map(&k, model.distortion(), &k_inv, size)
}

/// Undistortion map for an arbitrary corrected camera matrix and output size.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(model, new_camera_matrix, size), fields(size = %size))
)]
pub fn build_undistortion_map_with(
    model: &IntrinsicModel,
    new_camera_matrix: &Matrix3<f64>,
    size: ImageSize,
) -> Result<UndistortionMap, UndistortError> {
    if size.is_empty() {
        return Err(UndistortError::EmptySize {
            width: size.width,
            height: size.height,
        });
    }
    let new_inv = new_camera_matrix
        .try_inverse()
        .filter(|m| m.iter().all(|v| v.is_finite()))
        .ok_or(UndistortError::SingularCameraMatrix)?;
    Ok(fill_map(model.camera_matrix(), model.distortion(), &new_inv, size))
}

fn upper_triangular_inverse(k: &Matrix3<f64>) -> Matrix3<f64> {
    let (fx, s, cx) = (k[(0, 0)], k[(0, 1)], k[(0, 2)]);
    let (fy, cy) = (k[(1, 1)], k[(1, 2)]);
    Matrix3::new(
        1.0 / fx,
        -s / (fx * fy),
        (s * cy - cx * fy) / (fx * fy),
        0.0,
        1.0 / fy,
        -cy / fy,
        0.0,
        0.0,
        1.0,
    )
}

fn fill_map(
    k: &Matrix3<f64>,
    distortion: Distortion,
    new_k_inv: &Matrix3<f64>,
    size: ImageSize,
) -> UndistortionMap {
    let (fx, s, cx) = (k[(0, 0)], k[(0, 1)], k[(0, 2)]);
    let (fy, cy) = (k[(1, 1)], k[(1, 2)]);

    let n = size.pixel_count();
    let mut map_x = Vec::with_capacity(n);
    let mut map_y = Vec::with_capacity(n);

    for v in 0..size.height {
        for u in 0..size.width {
            let ray = new_k_inv * Vector3::new(u as f64, v as f64, 1.0);
            let (x, y) = (ray.x / ray.z, ray.y / ray.z);
            let (xd, yd) = distortion.distort(x, y);
            map_x.push((fx * xd + s * yd + cx) as f32);
            map_y.push((fy * yd + cy) as f32);
        }
    }

    debug!("built {} undistortion map", size);
    UndistortionMap {
        width: size.width,
        height: size.height,
        map_x,
        map_y,
    }
}
